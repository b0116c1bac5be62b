/*
    Copyright (C) 2023  Rafal Michalski

    This file is part of SLOTBANK, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
use crate::memory::ADDRESS_SPACE;
use super::AttributedMemory;

/// A fragment of memory, optionally with captured data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemRange {
    pub address: u16,
    pub size: usize,
    /// Captured values, present only after [MemoryRanges::capture].
    pub data: Option<Box<[u8]>>
}

impl MemRange {
    fn new(address: usize, size: usize) -> Self {
        MemRange { address: address as u16, size, data: None }
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.address as usize
    }
    /// Returns the address past the last one in the range, at most `0x10000`.
    #[inline]
    pub fn end(&self) -> usize {
        self.address as usize + self.size
    }
}

/// Ordered, non overlapping fragments of memory.
///
/// Ranges that touch or overlap are merged into one when added. A merge discards the
/// captured data of the merged ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryRanges {
    ranges: Vec<MemRange>
}

impl MemoryRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ranges(&self) -> &[MemRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn clear(&mut self) {
        self.ranges.clear()
    }
    /// Adds `size` addresses starting from `address`.
    ///
    /// A range crossing the end of the address space is split in two. The size is limited
    /// to `0x10000`.
    pub fn add_range(&mut self, address: u16, size: usize) {
        let mut start = address as usize;
        let mut size = size.min(ADDRESS_SPACE);
        if start + size > ADDRESS_SPACE {
            let head = ADDRESS_SPACE - start;
            self.insert(start, head);
            size -= head;
            start = 0;
        }
        self.insert(start, size);
    }
    /// Adds ranges of the same `size` starting from each of `addresses`.
    pub fn add_ranges_with_size(&mut self, addresses: &[u16], size: usize) {
        for &address in addresses.iter() {
            self.add_range(address, size);
        }
    }

    fn insert(&mut self, start: usize, size: usize) {
        if size == 0 {
            return
        }
        let end = start + size;
        let index = match self.ranges.iter().position(|range| start <= range.end()) {
            Some(index) => index,
            None => return self.ranges.push(MemRange::new(start, size))
        };
        if end < self.ranges[index].start() {
            return self.ranges.insert(index, MemRange::new(start, size))
        }
        let last = index + self.ranges[index + 1..].iter()
                                .take_while(|range| range.start() <= end)
                                .count();
        let merged_start = start.min(self.ranges[index].start());
        let merged_end = end.max(self.ranges[last].end());
        self.ranges.drain(index + 1..=last);
        self.ranges[index] = MemRange::new(merged_start, merged_end - merged_start);
    }
    /// Captures the current values of all ranges from the `memory`.
    pub fn capture<M: AttributedMemory>(&mut self, memory: &M) {
        for range in self.ranges.iter_mut() {
            let data = (0..range.size).map(|offset| memory.value_at(range.address.wrapping_add(offset as u16)))
                                      .collect();
            range.data = Some(data);
        }
    }
    /// Returns the captured value at `address`.
    ///
    /// Returns `None` if the address isn't in any range or the range has no captured data.
    pub fn value_at(&self, address: u16) -> Option<u8> {
        let address = address as usize;
        let range = self.ranges.iter().find(|range| address < range.end())?;
        if address < range.start() {
            return None
        }
        range.data.as_ref()?.get(address - range.start()).copied()
    }
    /// Compares `size` captured values starting from `address` with the `memory`.
    ///
    /// Returns `false` if any value differs, is missing or is unused in the `memory`.
    pub fn is_memory_equal<M: AttributedMemory>(&self, memory: &M, address: u16, size: usize) -> bool {
        (0..size).map(|offset| address.wrapping_add(offset as u16)).all(|addr| {
            !memory.attribute_at(addr).is_unused() &&
            self.value_at(addr) == Some(memory.value_at(addr))
        })
    }
    /// Compares blocks of the same `size` starting from each of `addresses` with the `memory`.
    pub fn is_memory_equal_for_blocks<M: AttributedMemory>(
            &self,
            memory: &M,
            addresses: &[u16],
            size: usize
        ) -> bool
    {
        addresses.iter().all(|&address| self.is_memory_equal(memory, address, size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(ranges: &MemoryRanges) -> Vec<(u16, usize)> {
        ranges.ranges().iter().map(|r| (r.address, r.size)).collect()
    }

    #[test]
    fn add_range_merges() {
        let mut ranges = MemoryRanges::new();
        ranges.add_range(0x100, 0x10);
        ranges.add_range(0x110, 0x10);
        assert_eq!(spans(&ranges), vec![(0x100, 0x20)]);
        ranges.add_range(0x200, 0x10);
        ranges.add_range(0x080, 0x10);
        assert_eq!(spans(&ranges), vec![(0x080, 0x10), (0x100, 0x20), (0x200, 0x10)]);
        ranges.add_range(0x0F0, 0x110);
        assert_eq!(spans(&ranges), vec![(0x080, 0x10), (0x0F0, 0x120)]);
        ranges.add_range(0x090, 0);
        assert_eq!(spans(&ranges), vec![(0x080, 0x10), (0x0F0, 0x120)]);
        ranges.add_range(0x085, 0x6B);
        assert_eq!(spans(&ranges), vec![(0x080, 0x190)]);
        ranges.add_range(0x100, 0x10);
        assert_eq!(spans(&ranges), vec![(0x080, 0x190)]);
        ranges.add_range(0x000, 0x10);
        assert_eq!(spans(&ranges), vec![(0x000, 0x10), (0x080, 0x190)]);
    }

    #[test]
    fn add_range_wraps() {
        let mut ranges = MemoryRanges::new();
        ranges.add_range(0xFFF8, 0x10);
        assert_eq!(spans(&ranges), vec![(0x0000, 0x8), (0xFFF8, 0x8)]);
        ranges.add_range(0x0000, 0x20000);
        assert_eq!(spans(&ranges), vec![(0x0000, 0x10000)]);
        assert_eq!(ranges.ranges()[0].end(), 0x10000);
        ranges.clear();
        assert!(ranges.is_empty());
        ranges.add_ranges_with_size(&[0x4000, 0x4004, 0x8000], 4);
        assert_eq!(spans(&ranges), vec![(0x4000, 0x8), (0x8000, 0x4)]);
    }

    #[test]
    fn value_at_needs_captured_data() {
        let mut ranges = MemoryRanges::new();
        ranges.add_range(0x10, 4);
        assert_eq!(ranges.value_at(0x10), None);
        let mut disasm = crate::disasm::DisasmMemory::new();
        disasm.set_memory(0x10, &[1, 2, 3, 4, 5]);
        ranges.capture(&disasm);
        assert_eq!(ranges.value_at(0x0F), None);
        assert_eq!(ranges.value_at(0x13), Some(4));
        assert_eq!(ranges.value_at(0x14), None);
        ranges.add_range(0x14, 1);
        assert_eq!(ranges.value_at(0x10), None);
    }
}
