// cargo +nightly bench --bench memory -- --nocapture
#![feature(test)]
extern crate test;
use test::{black_box, Bencher};

use slotbank::memory::*;
use slotbank::model::MemoryModelPreset;
use rand::prelude::*;

fn random_addresses(count: usize) -> Vec<u16> {
    let mut rng = SmallRng::seed_from_u64(0xBE7C);
    (0..count).map(|_| rng.gen()).collect()
}

#[bench]
fn bench_read8(ben: &mut Bencher) {
    let mut mem = MachineMemory::from_preset(MemoryModelPreset::ZxNext, "").unwrap();
    let addrs = random_addresses(0x1000);
    ben.iter(|| {
        let mut sum = 0u32;
        for &addr in addrs.iter() {
            sum += mem.read8(addr) as u32;
        }
        black_box(sum)
    });
}

#[bench]
fn bench_write8(ben: &mut Bencher) {
    let mut mem = MachineMemory::from_preset(MemoryModelPreset::Zx128k, "").unwrap();
    let addrs = random_addresses(0x1000);
    ben.iter(|| {
        for &addr in addrs.iter() {
            mem.write8(addr, addr as u8);
        }
        black_box(&mem);
    });
}

#[bench]
fn bench_read8_watched(ben: &mut Bencher) {
    let mut mem = SimulatedMemory::new(8, 256).unwrap();
    mem.set_watchpoint(0x8000, 0x4000, WatchAccess::READ);
    let addrs = random_addresses(0x1000);
    ben.iter(|| {
        let mut sum = 0u32;
        for &addr in addrs.iter() {
            sum += mem.read8(addr) as u32;
            mem.clear_hit();
        }
        black_box(sum)
    });
}

#[bench]
fn bench_read_block(ben: &mut Bencher) {
    let mem = MachineMemory::from_preset(MemoryModelPreset::ZxNext, "").unwrap();
    ben.iter(|| {
        black_box(mem.read_block(0x1F00, 0xC000))
    });
}
