//! Tests of capturing memory fragments and comparing them with the live memory.
use rand::prelude::*;
use slotbank::disasm::*;
use slotbank::memory::{MachineMemory, SimulatedMemory};
use slotbank::model::MemoryModelPreset;

#[test]
fn test_ranges_match_live_memory() {
    let mut rng = SmallRng::seed_from_u64(0x5EED);
    let mut mem = SimulatedMemory::new(4, 8).unwrap();
    let mut data = vec![0u8; 0x10000];
    rng.fill(&mut data[..]);
    mem.write_block(0, &data);

    let blocks = [0x8000u16, 0x8100, 0xFFF0];
    let mut ranges = MemoryRanges::new();
    ranges.add_ranges_with_size(&blocks, 0x20);
    assert_eq!(ranges.ranges().len(), 4);
    ranges.capture(&mem);
    assert_eq!(ranges.value_at(0xFFFF), Some(data[0xFFFF]));
    assert_eq!(ranges.value_at(0x000F), Some(data[0x000F]));
    assert_eq!(ranges.value_at(0x0010), None);
    assert!(ranges.is_memory_equal_for_blocks(&mem, &blocks, 0x20));
    assert!(ranges.is_memory_equal(&mem, 0xFFF8, 0x10));
    // not captured
    assert!(!ranges.is_memory_equal(&mem, 0x8000, 0x21));

    mem.write8(0x8105, !data[0x8105]);
    assert!(ranges.is_memory_equal(&mem, 0x8000, 0x20));
    assert!(!ranges.is_memory_equal_for_blocks(&mem, &blocks, 0x20));

    // a different bank with the same content
    mem.write_bank(6, &data[0x8000..0xC000]).unwrap();
    mem.set_slot(2, 6).unwrap();
    assert!(ranges.is_memory_equal_for_blocks(&mem, &blocks, 0x20));
}

#[test]
fn test_unused_memory_is_never_equal() {
    let mut mem = MachineMemory::from_preset(MemoryModelPreset::Zx16k, "").unwrap();
    let mut ranges = MemoryRanges::new();
    ranges.add_range(0x7FF0, 0x20);
    ranges.capture(&mem);
    assert_eq!(ranges.value_at(0x8000), Some(0xFF));
    assert!(ranges.is_memory_equal(&mem, 0x7FF0, 0x10));
    assert!(!ranges.is_memory_equal(&mem, 0x7FF0, 0x20));
    assert!(!ranges.is_memory_equal(&mem, 0x8000, 1));

    let mut disasm = DisasmMemory::new();
    ranges.clear();
    ranges.add_range(0x100, 0x10);
    ranges.capture(&disasm);
    assert_eq!(ranges.value_at(0x100), Some(0));
    assert!(!ranges.is_memory_equal(&disasm, 0x100, 0x10));
    disasm.set_memory(0x100, &[0;0x10]);
    assert!(ranges.is_memory_equal(&disasm, 0x100, 0x10));
    disasm.add_attribute_at(0x100, 3, MemAttribute::CODE|MemAttribute::CODE_FIRST);
    assert!(ranges.is_memory_equal(&disasm, 0x100, 0x10));

    mem.write8(0x4000, 1);
    let disasm = DisasmMemory::from_memory(&mem);
    assert_eq!(disasm.value_at(0x4000), 1);
    assert_eq!(disasm.attribute_at(0x4000), MemAttribute::ASSIGNED);
    assert_eq!(disasm.attribute_at(0x8000), MemAttribute::UNUSED);
}
