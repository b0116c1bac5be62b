/*
    Copyright (C) 2023  Rafal Michalski

    This file is part of SLOTBANK, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Predefined memory models of the ZX Spectrum family.
use core::fmt;
use core::str::FromStr;
use std::path::Path;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use super::{
    BankDef, MemoryModel, MemoryModelDef, ModelError, PagingRule, PortMatch, BankSelect,
    Result, RomImage, SlotDef, UlaBanks
};

/// The file name of the 16k/48k ROM image.
pub const ROM48_FILE: &str = "48.rom";
/// The file name of the 128k editor ROM image.
pub const ROM128_FILE: &str = "128.rom";
/// The number of RAM banks of the ZX Spectrum 128k.
pub const ZX128K_RAM_BANKS: u8 = 8;
/// The number of 8k RAM banks of the expanded ZX Spectrum Next.
pub const ZXNEXT_RAM_BANKS: u8 = 224;

/// Memory model presets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(try_from = "String", into = "String"))]
pub enum MemoryModelPreset {
    /// Nothing is known about the memory, a single 64kb RAM bank.
    Unknown,
    /// A single 64kb RAM bank.
    AllRam,
    /// 16kb ROM + 16kb RAM, nothing above `0x7FFF`.
    Zx16k,
    /// 16kb ROM + 48kb RAM.
    Zx48k,
    /// 2 ROM banks and 8 RAM banks of 16kb, switched with port `0x7FFD`.
    Zx128k,
    /// 8 slots of 8kb, 224 RAM banks and 4 ROM banks.
    ZxNext
}

impl MemoryModelPreset {
    pub const ALL: [MemoryModelPreset;6] = [
        MemoryModelPreset::Unknown,
        MemoryModelPreset::AllRam,
        MemoryModelPreset::Zx16k,
        MemoryModelPreset::Zx48k,
        MemoryModelPreset::Zx128k,
        MemoryModelPreset::ZxNext
    ];

    pub fn name(self) -> &'static str {
        match self {
            MemoryModelPreset::Unknown => "UNKNOWN",
            MemoryModelPreset::AllRam => "RAM",
            MemoryModelPreset::Zx16k => "ZX16K",
            MemoryModelPreset::Zx48k => "ZX48K",
            MemoryModelPreset::Zx128k => "ZX128K",
            MemoryModelPreset::ZxNext => "ZXNEXT",
        }
    }
    /// Returns the preset definition with ROM image paths relative to `rom_dir`.
    pub fn definition<P: AsRef<Path>>(self, rom_dir: P) -> MemoryModelDef {
        let rom_dir = rom_dir.as_ref();
        let rom48 = |offset| RomImage::new(rom_dir.join(ROM48_FILE), offset);
        let rom128 = |offset| RomImage::new(rom_dir.join(ROM128_FILE), offset);
        let name = self.name().to_string();
        match self {
            MemoryModelPreset::Unknown|MemoryModelPreset::AllRam => {
                let bank_name = if self == MemoryModelPreset::Unknown { "UNKNOWN" } else { "RAM" };
                MemoryModelDef {
                    name,
                    slots: vec![SlotDef::new(0x0000..=0xFFFF, vec![BankDef::named(0, bank_name)])],
                    ..Default::default()
                }
            }
            MemoryModelPreset::Zx16k|MemoryModelPreset::Zx48k => {
                let ramtop = if self == MemoryModelPreset::Zx16k { 0x7FFF } else { 0xFFFF };
                MemoryModelDef {
                    name,
                    slots: vec![
                        SlotDef::new(0x0000..=0x3FFF, vec![BankDef::rom(0, "ROM", "ROM", rom48(0))]),
                        SlotDef::new(0x4000..=ramtop, vec![BankDef::named(1, "RAM")])
                    ],
                    io_mmu: Vec::new(),
                    ula_banks: Some(UlaBanks { primary: 1, shadow: 1 })
                }
            }
            MemoryModelPreset::Zx128k => zx128k_definition(rom_dir, ZX128K_RAM_BANKS),
            MemoryModelPreset::ZxNext => {
                let ram = || BankDef::ram(0..=ZXNEXT_RAM_BANKS - 1);
                let mut slots = vec![
                    SlotDef::new(0x0000..=0x1FFF, vec![
                        ram(),
                        BankDef::rom(0xFC, "ROM0", "R0a", rom128(0)),
                        BankDef::rom(0xFE, "ROM1", "R1a", rom48(0))
                    ]).with_initial_bank(0xFE),
                    SlotDef::new(0x2000..=0x3FFF, vec![
                        ram(),
                        BankDef::rom(0xFD, "ROM0", "R0b", rom128(0x2000)),
                        BankDef::rom(0xFF, "ROM1", "R1b", rom48(0x2000))
                    ]).with_initial_bank(0xFF)
                ];
                let initial = [10, 11, 4, 5, 0, 1];
                for (n, &bank) in initial.iter().enumerate() {
                    let start = 0x4000 + n as u16 * 0x2000;
                    // the first RAM slot may page in any bank, ROMs included
                    let banks = if n == 0 { BankDef::ram(0..=0xFF) } else { ram() };
                    slots.push(SlotDef::new(start..=start + 0x1FFF, vec![banks])
                               .with_initial_bank(bank));
                }
                MemoryModelDef {
                    name,
                    slots,
                    // slot registers are handled by the machine's next registers, not by a port rule
                    io_mmu: Vec::new(),
                    ula_banks: Some(UlaBanks { primary: 2*5, shadow: 2*7 })
                }
            }
        }
    }
    /// Resolves the preset with ROM image paths relative to `rom_dir`.
    pub fn resolve<P: AsRef<Path>>(self, rom_dir: P) -> Result<MemoryModel> {
        MemoryModel::resolve(&self.definition(rom_dir))
    }
}

/// Returns the definition of a ZX Spectrum 128k compatible machine with `ram_banks` 16kb RAM banks.
///
/// ROM banks are numbered `ram_banks` (editor ROM) and `ram_banks + 1` (48k BASIC ROM).
/// `ram_banks` should be at least `8` and less than `255`. The paging port selects only the
/// first 8 RAM banks.
pub fn zx128k_definition<P: AsRef<Path>>(rom_dir: P, ram_banks: u8) -> MemoryModelDef {
    let rom_dir = rom_dir.as_ref();
    let rom0 = ram_banks;
    let rom1 = ram_banks.wrapping_add(1);
    MemoryModelDef {
        name: MemoryModelPreset::Zx128k.name().to_string(),
        slots: vec![
            SlotDef::new(0x0000..=0x3FFF, vec![
                BankDef::rom(rom0, "ROM0", "R0", RomImage::new(rom_dir.join(ROM128_FILE), 0)),
                BankDef::rom(rom1, "ROM1", "R1", RomImage::new(rom_dir.join(ROM48_FILE), 0))
            ]).with_name("slotROM").with_initial_bank(rom0),
            SlotDef::new(0x4000..=0x7FFF, vec![BankDef::ram(5)]),
            SlotDef::new(0x8000..=0xBFFF, vec![BankDef::ram(2)]),
            SlotDef::new(0xC000..=0xFFFF, vec![BankDef::ram(0..=ram_banks.wrapping_sub(1))])
                .with_name("slotC000").with_initial_bank(0)
        ],
        io_mmu: vec![
            PagingRule {
                port: PortMatch::new(0x8002, 0x7FFD),
                selects: vec![
                    BankSelect { slot: 3, value_mask: 0b0000_0111, bank_base: 0 },
                    BankSelect { slot: 0, value_mask: 0b0001_0000, bank_base: rom0 }
                ],
                lock_mask: 0b0010_0000
            }
        ],
        ula_banks: Some(UlaBanks { primary: 5, shadow: 7 })
    }
}

impl fmt::Display for MemoryModelPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MemoryModelPreset {
    type Err = ModelError;

    fn from_str(name: &str) -> Result<Self> {
        MemoryModelPreset::ALL.iter().copied()
            .find(|preset| preset.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| ModelError::UnknownPreset(name.to_string()))
    }
}

impl core::convert::TryFrom<String> for MemoryModelPreset {
    type Error = ModelError;

    fn try_from(name: String) -> Result<Self> {
        name.parse()
    }
}

impl From<MemoryModelPreset> for String {
    fn from(preset: MemoryModelPreset) -> Self {
        preset.name().to_string()
    }
}
