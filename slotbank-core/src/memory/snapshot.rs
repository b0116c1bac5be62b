/*
    Copyright (C) 2023  Rafal Michalski

    This file is part of SLOTBANK, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The binary memory snapshot.
//!
//! The layout is:
//!
//! | size             | content                                   |
//! |------------------|-------------------------------------------|
//! | 1                | the number of slots `n`                   |
//! | n                | the bank number wired to each slot        |
//! | 4                | the memory size `m` as a little-endian u32 |
//! | m                | the memory of all banks                   |
//!
//! Neither the populated flags nor the watchpoints or the visual memory are a part of the snapshot.
use std::io::{Read, Write};

use log::debug;

use super::{SimulatedMemory, MemoryError, Result};

impl SimulatedMemory {
    /// Returns the size of the binary snapshot in bytes.
    pub fn serialized_size(&self) -> usize {
        1 + self.slot_count() + 4 + self.store_size()
    }
    /// Writes the binary snapshot of the slot wiring and the memory of all banks.
    pub fn serialize<W: Write>(&self, mut wr: W) -> Result<()> {
        wr.write_all(&[self.slots.len() as u8])?;
        wr.write_all(&self.slots)?;
        wr.write_all(&(self.mem.len() as u32).to_le_bytes())?;
        wr.write_all(&self.mem)?;
        Ok(())
    }
    /// Restores the slot wiring and the memory of all banks from the binary snapshot.
    ///
    /// The memory is left untouched on error. On success the visual memory is cleared.
    ///
    /// # Errors
    /// The number of slots and the memory size in the snapshot must be the same as of this memory
    /// and all bank numbers must be in range.
    pub fn deserialize<R: Read>(&mut self, mut rd: R) -> Result<()> {
        let mut byte = [0u8];
        rd.read_exact(&mut byte)?;
        let slot_count = byte[0] as usize;
        if slot_count != self.slot_count() {
            return Err(MemoryError::SnapshotSlotMismatch { expected: self.slot_count(), found: slot_count })
        }
        let mut slots = vec![0u8; slot_count];
        rd.read_exact(&mut slots)?;
        if let Some(&bank) = slots.iter().find(|&&bank| bank as usize >= self.bank_count()) {
            return Err(MemoryError::InvalidBankIndex(bank as usize))
        }
        let mut size = [0u8;4];
        rd.read_exact(&mut size)?;
        let size = u32::from_le_bytes(size) as usize;
        if size != self.store_size() {
            return Err(MemoryError::SnapshotSizeMismatch { expected: self.store_size(), found: size })
        }
        let mut mem = vec![0u8; size].into_boxed_slice();
        rd.read_exact(&mut mem)?;
        debug!("memory snapshot restored: {} slots, {} bytes", slot_count, size);
        self.slots.as_mut_slice().copy_from_slice(&slots);
        self.mem = mem;
        self.visual.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};
    use crate::memory::*;

    fn memory() -> SimulatedMemory {
        let mut mem = SimulatedMemory::new(4, 6).unwrap();
        mem.set_slot(1, 5).unwrap();
        mem.set_slot(3, 4).unwrap();
        for (n, p) in (0..0x10000).map(|n| n as u16).enumerate() {
            mem.set_memory8(p, (n * 7) as u8);
        }
        mem
    }

    #[test]
    fn snapshot_works() {
        let mut mem = memory();
        let mut buf = Vec::new();
        mem.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), mem.serialized_size());
        assert_eq!(buf.len(), 1 + 4 + 4 + 6 * 0x4000);
        assert_eq!(&buf[..9], &[4, 0, 5, 2, 4, 0x00, 0x80, 0x01, 0x00]);

        let mut other = SimulatedMemory::new(4, 6).unwrap();
        other.read8(0x1000);
        other.deserialize(Cursor::new(&buf)).unwrap();
        assert_eq!(other.slots(), mem.slots());
        assert_eq!(other.mem_ref(), mem.mem_ref());
        assert!(other.visual_memory().iter().all(|&v| v == VisualAccess::None));

        mem.write8(0x4000, 0xAA);
        mem.set_slot(1, 0).unwrap();
        mem.deserialize(&buf[..]).unwrap();
        assert_eq!(mem.slots(), &[0, 5, 2, 4]);
        assert_eq!(mem.get_memory8(0x4000), 0);
        assert_eq!(mem.get_memory8(0x4001), 7);
    }

    #[test]
    fn snapshot_mismatch_is_fatal() {
        let mem = memory();
        let mut buf = Vec::new();
        mem.serialize(&mut buf).unwrap();

        let mut other = SimulatedMemory::new(4, 4).unwrap();
        other.write8(0, 1);
        match other.deserialize(&buf[..]) {
            Err(MemoryError::InvalidBankIndex(5)) => {}
            res => panic!("unexpected result: {:?}", res)
        }
        let mut other = SimulatedMemory::new(4, 8).unwrap();
        other.write8(0, 1);
        match other.deserialize(&buf[..]) {
            Err(MemoryError::SnapshotSizeMismatch { expected: 0x20000, found: 0x18000 }) => {}
            res => panic!("unexpected result: {:?}", res)
        }
        assert_eq!(other.slots(), &[0, 1, 2, 3]);
        assert_eq!(other.get_memory8(0), 1);

        let mut other = SimulatedMemory::new(8, 12).unwrap();
        assert!(matches!(other.deserialize(&buf[..]),
                         Err(MemoryError::SnapshotSlotMismatch { expected: 8, found: 4 })));

        let mut other = SimulatedMemory::new(4, 6).unwrap();
        other.write8(0, 1);
        match other.deserialize(&buf[..buf.len() - 1]) {
            Err(MemoryError::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof),
            res => panic!("unexpected result: {:?}", res)
        }
        assert_eq!(other.get_memory8(0), 1);
    }
}
