/*
    Copyright (C) 2023  Rafal Michalski

    This file is part of SLOTBANK, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Memory model definitions.
//!
//! A [MemoryModelDef] is a plain description of a machine's memory: an ordered list of address
//! slots, each with a list of candidate banks, and an optional list of [PagingRule]s describing
//! how writes to I/O ports rewire slots at runtime.
//!
//! The definition is resolved once into a [MemoryModel], which has a uniform bank size, a slot
//! table covering the whole 64kb address space and a bank table indexed by the bank number.
//!
//! The bank size is the largest power of two dividing all declared slot boundaries. A declared
//! slot spanning more than one bank size must have a single fixed bank `n`, which is expanded
//! into consecutive banks `n, n+1, ...`.
use core::fmt;
use core::ops::RangeInclusive;
use std::io;
use std::path::PathBuf;

use log::{debug, info};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

mod paging;
mod presets;

pub use paging::*;
pub use presets::*;

/// The size of the CPU address space.
pub const ADDRESS_SPACE: usize = 0x10000;
/// The maximum number of slots a model may be resolved into.
pub const MAX_SLOTS: usize = 128;
/// The maximum number of banks, bank numbers are single bytes.
pub const MAX_BANKS: usize = 256;

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelError {
    /// The definition has no slots.
    NoSlots,
    /// The slot's range is empty.
    InvalidSlotRange(usize),
    /// The slot's range overlaps with the previous slot.
    SlotOverlap(usize),
    /// The resolved bank size would produce more than [MAX_SLOTS] slots.
    TooManySlots,
    /// The slot declares an index range with the first index above the last one.
    InvalidBankRange(usize),
    /// The slot declares a bank number which doesn't fit in the bank table.
    InvalidBankIndex(usize),
    /// The bank is declared more than once with different attributes.
    BankCollision(u8),
    /// A slot spanning more than one bank size must have exactly one fixed bank.
    MultiSlotSwitchable(usize),
    /// The slot's initial bank is not one of its candidates.
    UnknownInitialBank(usize),
    /// The paging rule refers to a slot that doesn't exist or spans more than one bank size.
    InvalidPagingSlot(usize),
    /// The paging rule may select a bank which doesn't exist.
    InvalidPagingBank(usize),
    /// The screen banks don't exist.
    InvalidUlaBank,
    /// The name doesn't name any of the presets.
    UnknownPreset(String)
}

impl std::error::Error for ModelError {}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::NoSlots => f.write_str("Memory model has no slots"),
            ModelError::InvalidSlotRange(i) => write!(f, "Slot #{} has an empty address range", i),
            ModelError::SlotOverlap(i) => write!(f, "Slot #{} overlaps with another slot", i),
            ModelError::TooManySlots => write!(f,
                "Memory model would require more than {} slots", MAX_SLOTS),
            ModelError::InvalidBankRange(i) => write!(f, "Slot #{} has an invalid bank index range", i),
            ModelError::InvalidBankIndex(i) => write!(f, "Slot #{} has a bank index out of range", i),
            ModelError::BankCollision(bank) => write!(f,
                "Bank {} is declared more than once with different attributes", bank),
            ModelError::MultiSlotSwitchable(i) => write!(f,
                "Slot #{} spans more than one bank and must have exactly one fixed bank", i),
            ModelError::UnknownInitialBank(i) => write!(f,
                "Slot #{} initial bank is not one of its banks", i),
            ModelError::InvalidPagingSlot(i) => write!(f,
                "Paging rule #{} refers to an invalid slot", i),
            ModelError::InvalidPagingBank(i) => write!(f,
                "Paging rule #{} may select a bank out of range", i),
            ModelError::InvalidUlaBank => f.write_str("Screen bank is out of range"),
            ModelError::UnknownPreset(name) => write!(f, "Unknown memory model: {}", name),
        }
    }
}

impl From<ModelError> for io::Error {
    fn from(err: ModelError) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, err)
    }
}

/// A type returned by the model resolving functions.
pub type Result<T> = core::result::Result<T, ModelError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum MemoryKind {
    Rom,
    Ram
}

impl Default for MemoryKind {
    fn default() -> Self {
        MemoryKind::Ram
    }
}

/// A single bank number or an inclusive range of bank numbers.
///
/// Serialized as a number or a `[first, last]` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(untagged))]
pub enum BankIndex {
    Single(u8),
    Range(u8, u8)
}

impl BankIndex {
    /// Returns the first bank number.
    pub fn first(self) -> u8 {
        match self {
            BankIndex::Single(index)|BankIndex::Range(index, _) => index
        }
    }
    /// Returns an iterator over all bank numbers.
    pub fn iter(self) -> RangeInclusive<u8> {
        match self {
            BankIndex::Single(index) => index..=index,
            BankIndex::Range(first, last) => first..=last
        }
    }

    fn is_valid(self) -> bool {
        match self {
            BankIndex::Single(..) => true,
            BankIndex::Range(first, last) => first <= last
        }
    }
}

impl From<u8> for BankIndex {
    fn from(index: u8) -> Self {
        BankIndex::Single(index)
    }
}

impl From<RangeInclusive<u8>> for BankIndex {
    fn from(range: RangeInclusive<u8>) -> Self {
        BankIndex::Range(*range.start(), *range.end())
    }
}

/// Where the ROM bank contents come from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
pub struct RomImage {
    /// A path to the image file.
    pub path: PathBuf,
    /// The byte offset into the image, where the bank contents begin.
    #[cfg_attr(feature = "snapshot", serde(default))]
    pub offset: usize
}

impl RomImage {
    pub fn new<P: Into<PathBuf>>(path: P, offset: usize) -> Self {
        RomImage { path: path.into(), offset }
    }
}

/// A bank candidate of a slot.
///
/// Banks with a [RomImage] are read-only, all others are RAM.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
pub struct BankDef {
    pub index: BankIndex,
    #[cfg_attr(feature = "snapshot", serde(default, skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    #[cfg_attr(feature = "snapshot", serde(default, skip_serializing_if = "Option::is_none"))]
    pub short_name: Option<String>,
    #[cfg_attr(feature = "snapshot", serde(default, skip_serializing_if = "Option::is_none"))]
    pub rom: Option<RomImage>
}

impl BankDef {
    /// Creates an anonymous RAM bank definition.
    pub fn ram<I: Into<BankIndex>>(index: I) -> Self {
        BankDef { index: index.into(), name: None, short_name: None, rom: None }
    }
    /// Creates a named bank definition.
    pub fn named<I: Into<BankIndex>>(index: I, name: &str) -> Self {
        BankDef { name: Some(name.into()), ..BankDef::ram(index) }
    }
    /// Creates a named ROM bank definition backed by a `rom` image.
    pub fn rom<I: Into<BankIndex>>(index: I, name: &str, short_name: &str, rom: RomImage) -> Self {
        BankDef {
            index: index.into(),
            name: Some(name.into()),
            short_name: Some(short_name.into()),
            rom: Some(rom)
        }
    }
}

/// A declared address window and its bank candidates.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
pub struct SlotDef {
    /// The first and the last address of the slot.
    pub range: (u16, u16),
    #[cfg_attr(feature = "snapshot", serde(default, skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    /// The bank wired at startup. If not given the first bank candidate is used.
    #[cfg_attr(feature = "snapshot", serde(default, skip_serializing_if = "Option::is_none"))]
    pub initial_bank: Option<u8>,
    pub banks: Vec<BankDef>
}

impl SlotDef {
    pub fn new(range: RangeInclusive<u16>, banks: Vec<BankDef>) -> Self {
        SlotDef { range: (*range.start(), *range.end()), name: None, initial_bank: None, banks }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_initial_bank(mut self, bank: u8) -> Self {
        self.initial_bank = Some(bank);
        self
    }

    fn size(&self) -> usize {
        let (start, end) = self.range;
        (end as usize + 1).saturating_sub(start as usize)
    }
}

/// The screen memory banks, selected by the video output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct UlaBanks {
    pub primary: u8,
    pub shadow: u8
}

impl UlaBanks {
    /// Returns the bank number of the primary or the `shadow` screen.
    #[inline]
    pub fn bank(self, shadow: bool) -> u8 {
        if shadow { self.shadow } else { self.primary }
    }
}

/// A declarative memory model definition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
pub struct MemoryModelDef {
    #[cfg_attr(feature = "snapshot", serde(default))]
    pub name: String,
    pub slots: Vec<SlotDef>,
    #[cfg_attr(feature = "snapshot", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub io_mmu: Vec<PagingRule>,
    #[cfg_attr(feature = "snapshot", serde(default, skip_serializing_if = "Option::is_none"))]
    pub ula_banks: Option<UlaBanks>
}

/// Resolved metadata of a single bank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BankInfo {
    pub index: u8,
    pub name: String,
    pub short_name: String,
    pub kind: MemoryKind,
    pub rom: Option<RomImage>
}

impl BankInfo {
    fn anonymous(index: u8) -> Self {
        BankInfo {
            index,
            name: format!("BANK{}", index),
            short_name: index.to_string(),
            kind: MemoryKind::Ram,
            rom: None
        }
    }

    #[inline]
    pub fn is_rom(&self) -> bool {
        self.kind == MemoryKind::Rom
    }
    /// Returns `true` if the bank has neither a name nor a ROM image.
    pub fn is_anonymous(&self) -> bool {
        *self == BankInfo::anonymous(self.index)
    }
}

/// Resolved metadata of a single slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotInfo {
    pub start: u16,
    pub end: u16,
    pub name: Option<String>,
    /// The bank wired at startup or `None` if the slot is not populated.
    pub initial_bank: Option<u8>,
    /// All banks that may be wired into this slot.
    pub banks: Vec<u8>
}

impl SlotInfo {
    #[inline]
    pub fn is_populated(&self) -> bool {
        self.initial_bank.is_some()
    }
    /// Returns `true` if the `bank` is one of this slot's candidates.
    pub fn accepts(&self, bank: u8) -> bool {
        self.banks.binary_search(&bank).is_ok()
    }
}

/// A memory model resolved from a [MemoryModelDef].
///
/// The address space is divided into `slot_count` slots of `bank_size` bytes. Slots not covered
/// by any declared slot are not populated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryModel {
    name: String,
    bank_size: usize,
    slots: Vec<SlotInfo>,
    banks: Vec<BankInfo>,
    paging: Vec<PagingRule>,
    ula_banks: Option<UlaBanks>
}

impl MemoryModel {
    /// Resolves the model from the given definition.
    pub fn resolve(def: &MemoryModelDef) -> Result<Self> {
        if def.slots.is_empty() {
            return Err(ModelError::NoSlots)
        }
        // geometry
        let mut order: Vec<usize> = (0..def.slots.len()).collect();
        order.sort_by_key(|&i| def.slots[i].range.0);
        let mut next_free = 0usize;
        let mut bank_size = ADDRESS_SPACE;
        for &i in order.iter() {
            let slot = &def.slots[i];
            let size = slot.size();
            if size == 0 {
                return Err(ModelError::InvalidSlotRange(i))
            }
            if (slot.range.0 as usize) < next_free {
                return Err(ModelError::SlotOverlap(i))
            }
            next_free = slot.range.1 as usize + 1;
            // the largest power of two dividing all slot boundaries
            bank_size = bank_size.min(1 << size.trailing_zeros());
            if slot.range.0 != 0 {
                bank_size = bank_size.min(1 << slot.range.0.trailing_zeros());
            }
        }
        let slot_count = ADDRESS_SPACE / bank_size;
        if slot_count > MAX_SLOTS {
            return Err(ModelError::TooManySlots)
        }

        let mut slots: Vec<SlotInfo> = (0..slot_count).map(|n| {
            let start = n * bank_size;
            SlotInfo {
                start: start as u16,
                end: (start + bank_size - 1) as u16,
                name: None,
                initial_bank: None,
                banks: Vec::new()
            }
        }).collect();

        let mut banks: Vec<Option<BankInfo>> = vec![None; MAX_BANKS];
        let mut engine_slot_of = Vec::with_capacity(def.slots.len());

        for (i, slot) in def.slots.iter().enumerate() {
            let first_slot = slot.range.0 as usize / bank_size;
            let span = slot.size() / bank_size;
            engine_slot_of.push((first_slot, span));
            let mut candidates = Vec::new();
            if span > 1 {
                let bank = match slot.banks.as_slice() {
                    [bank @ BankDef { index: BankIndex::Single(..), .. }] => bank,
                    _ => return Err(ModelError::MultiSlotSwitchable(i))
                };
                let first = bank.index.first() as usize;
                if first + span > MAX_BANKS {
                    return Err(ModelError::InvalidBankIndex(i))
                }
                for n in 0..span {
                    let index = (first + n) as u8;
                    let rom = bank.rom.as_ref().map(|rom|
                        RomImage::new(rom.path.clone(), rom.offset + n * bank_size));
                    register_bank(&mut banks, bank_info(index, bank, rom))?;
                    let info = &mut slots[first_slot + n];
                    info.name = slot.name.clone();
                    info.initial_bank = Some(index);
                    info.banks = vec![index];
                }
                if let Some(initial) = slot.initial_bank {
                    if initial as usize != first {
                        return Err(ModelError::UnknownInitialBank(i))
                    }
                }
                continue
            }
            for bank in slot.banks.iter() {
                if !bank.index.is_valid() {
                    return Err(ModelError::InvalidBankRange(i))
                }
                for index in bank.index.iter() {
                    register_bank(&mut banks, bank_info(index, bank, bank.rom.clone()))?;
                    candidates.push(index);
                }
            }
            let initial = match slot.initial_bank.or_else(|| slot.banks.first().map(|b| b.index.first())) {
                Some(initial) if candidates.contains(&initial) => Some(initial),
                Some(..) => return Err(ModelError::UnknownInitialBank(i)),
                None => None
            };
            candidates.sort_unstable();
            candidates.dedup();
            let info = &mut slots[first_slot];
            info.name = slot.name.clone();
            info.initial_bank = initial;
            info.banks = candidates;
        }

        let declared = banks.iter().rposition(Option::is_some).map(|n| n + 1).unwrap_or(0);
        let bank_count = declared.max(slot_count);
        let banks: Vec<BankInfo> = banks.into_iter().take(bank_count).enumerate()
            .map(|(n, info)| info.unwrap_or_else(|| BankInfo::anonymous(n as u8)))
            .collect();

        let mut paging = Vec::with_capacity(def.io_mmu.len());
        for (r, rule) in def.io_mmu.iter().enumerate() {
            let mut rule = rule.clone();
            for select in rule.selects.iter_mut() {
                match engine_slot_of.get(select.slot) {
                    Some(&(slot, 1)) => select.slot = slot,
                    _ => return Err(ModelError::InvalidPagingSlot(r))
                }
                if select.max_bank() as usize >= bank_count {
                    return Err(ModelError::InvalidPagingBank(r))
                }
            }
            paging.push(rule);
        }

        if let Some(UlaBanks { primary, shadow }) = def.ula_banks {
            if primary as usize >= bank_count || shadow as usize >= bank_count {
                return Err(ModelError::InvalidUlaBank)
            }
        }

        info!("memory model {:?}: {} slots of {:#x} bytes, {} banks",
                def.name, slot_count, bank_size, bank_count);
        Ok(MemoryModel {
            name: def.name.clone(),
            bank_size,
            slots,
            banks,
            paging,
            ula_banks: def.ula_banks
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn bank_count(&self) -> usize {
        self.banks.len()
    }

    #[inline]
    pub fn bank_size(&self) -> usize {
        self.bank_size
    }

    pub fn slots(&self) -> &[SlotInfo] {
        &self.slots
    }

    pub fn banks(&self) -> &[BankInfo] {
        &self.banks
    }

    pub fn bank(&self, bank: u8) -> Option<&BankInfo> {
        self.banks.get(bank as usize)
    }

    /// Returns the resolved bank switching rules, their slot indices refer to [MemoryModel::slots].
    pub fn paging_rules(&self) -> &[PagingRule] {
        &self.paging
    }

    pub fn ula_banks(&self) -> Option<UlaBanks> {
        self.ula_banks
    }

    /// Returns the bank number of the primary or the `shadow` screen output.
    ///
    /// Returns `None` if the model has no screen memory.
    pub fn ula_bank(&self, shadow: bool) -> Option<u8> {
        self.ula_banks.map(|banks| banks.bank(shadow))
    }

    /// Returns the index of the slot the `address` belongs to.
    #[inline]
    pub fn slot_index_at(&self, address: u16) -> usize {
        address as usize / self.bank_size
    }

    /// Returns an iterator of banks that need to be loaded from ROM images.
    pub fn rom_banks(&self) -> impl Iterator<Item=&BankInfo> {
        self.banks.iter().filter(|info| info.rom.is_some())
    }
}

impl core::convert::TryFrom<&MemoryModelDef> for MemoryModel {
    type Error = ModelError;

    fn try_from(def: &MemoryModelDef) -> Result<Self> {
        MemoryModel::resolve(def)
    }
}

fn bank_info(index: u8, def: &BankDef, rom: Option<RomImage>) -> BankInfo {
    let mut info = BankInfo::anonymous(index);
    if let Some(name) = &def.name {
        info.short_name = def.short_name.clone().unwrap_or_else(|| name.clone());
        info.name = name.clone();
    }
    if rom.is_some() {
        info.kind = MemoryKind::Rom;
    }
    info.rom = rom;
    info
}

/// Registers the bank metadata.
///
/// An anonymous bank never overrides metadata declared elsewhere and is itself overridden by
/// a named or a ROM declaration. Two different explicit declarations of the same bank collide.
fn register_bank(banks: &mut [Option<BankInfo>], info: BankInfo) -> Result<()> {
    let index = info.index;
    let slot = &mut banks[index as usize];
    match slot {
        Some(existing) if *existing == info => Ok(()),
        Some(..) if info.is_anonymous() => Ok(()),
        Some(existing) if !existing.is_anonymous() => Err(ModelError::BankCollision(index)),
        _ => {
            debug!("bank {}: {} {:?}", index, info.name, info.kind);
            *slot = Some(info);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_slots(banks0: Vec<BankDef>, banks1: Vec<BankDef>) -> MemoryModelDef {
        MemoryModelDef {
            name: "TEST".into(),
            slots: vec![
                SlotDef::new(0x0000..=0x7FFF, banks0),
                SlotDef::new(0x8000..=0xFFFF, banks1)
            ],
            ..Default::default()
        }
    }

    #[test]
    fn resolves_uniform_slots() {
        let def = two_slots(vec![BankDef::named(0, "LO")], vec![BankDef::ram(1..=3)]);
        let model = MemoryModel::resolve(&def).unwrap();
        assert_eq!(model.slot_count(), 2);
        assert_eq!(model.bank_size(), 0x8000);
        assert_eq!(model.bank_count(), 4);
        assert_eq!(model.slots()[0].initial_bank, Some(0));
        assert_eq!(model.slots()[1].initial_bank, Some(1));
        assert_eq!(model.slots()[1].banks, vec![1, 2, 3]);
        assert!(model.slots()[1].accepts(3));
        assert!(!model.slots()[1].accepts(0));
        assert_eq!(model.bank(0).unwrap().name, "LO");
        assert_eq!(model.bank(0).unwrap().short_name, "LO");
        assert_eq!(model.bank(2).unwrap().name, "BANK2");
        assert_eq!(model.bank(2).unwrap().short_name, "2");
        assert_eq!(model.slot_index_at(0x7FFF), 0);
        assert_eq!(model.slot_index_at(0x8000), 1);
    }

    #[test]
    fn multi_slot_region_expands_into_consecutive_banks() {
        let def = MemoryModelDef {
            slots: vec![
                SlotDef::new(0x0000..=0x3FFF,
                    vec![BankDef::rom(0, "ROM", "ROM", RomImage::new("a.rom", 0))]),
                SlotDef::new(0x4000..=0x7FFF, vec![BankDef::named(1, "RAM")]),
                SlotDef::new(0x8000..=0xFFFF,
                    vec![BankDef::rom(2, "EXT", "X", RomImage::new("ext.rom", 0x100))])
            ],
            ..Default::default()
        };
        let model = MemoryModel::resolve(&def).unwrap();
        assert_eq!(model.slot_count(), 4);
        assert_eq!(model.bank_count(), 4);
        let initial: Vec<_> = model.slots().iter().map(|s| s.initial_bank).collect();
        assert_eq!(initial, vec![Some(0), Some(1), Some(2), Some(3)]);
        assert_eq!(model.bank(3).unwrap().name, "EXT");
        assert_eq!(model.bank(3).unwrap().rom, Some(RomImage::new("ext.rom", 0x4100)));
        assert_eq!(model.rom_banks().map(|b| b.index).collect::<Vec<_>>(), vec![0, 2, 3]);
    }

    #[test]
    fn gaps_are_not_populated_and_banks_are_padded() {
        let def = MemoryModelDef {
            slots: vec![SlotDef::new(0x4000..=0x7FFF, vec![BankDef::ram(0)])],
            ..Default::default()
        };
        let model = MemoryModel::resolve(&def).unwrap();
        assert_eq!(model.slot_count(), 4);
        assert_eq!(model.bank_count(), 4);
        assert!(!model.slots()[0].is_populated());
        assert!(model.slots()[1].is_populated());
        assert!(!model.slots()[2].is_populated());
        assert_eq!(model.slots()[3].start, 0xC000);
        assert_eq!(model.slots()[3].end, 0xFFFF);
    }

    #[test]
    fn rejects_invalid_geometry() {
        let mut def = two_slots(vec![BankDef::ram(0)], vec![BankDef::ram(1)]);
        def.slots[0].range = (0x0100, 0x00FF);
        assert_eq!(MemoryModel::resolve(&def), Err(ModelError::InvalidSlotRange(0)));
        def.slots[0].range = (0x4000, 0x7FFF);
        def.slots[1].range = (0x0000, 0x7FFF);
        assert_eq!(MemoryModel::resolve(&def), Err(ModelError::SlotOverlap(0)));
        def.slots[0].range = (0x0000, 0x00FF);
        def.slots[1].range = (0x8000, 0xFFFF);
        assert_eq!(MemoryModel::resolve(&def), Err(ModelError::TooManySlots));
        assert_eq!(MemoryModel::resolve(&MemoryModelDef::default()), Err(ModelError::NoSlots));
    }

    #[test]
    fn anonymous_banks_keep_declared_metadata() {
        let rom = || BankDef::rom(2, "ROM", "R", RomImage::new("a.rom", 0));
        for &(banks0, banks1) in [(true, false), (false, true)].iter() {
            let (lo, hi) = if banks0 { (vec![rom()], vec![BankDef::ram(0..=3)]) }
                           else { (vec![BankDef::ram(0..=3)], vec![rom()]) };
            let model = MemoryModel::resolve(&two_slots(lo, hi)).unwrap();
            let bank = model.bank(2).unwrap();
            assert_eq!((bank.name.as_str(), bank.short_name.as_str()), ("ROM", "R"));
            assert!(bank.is_rom());
            assert!(!bank.is_anonymous());
            assert!(model.bank(3).unwrap().is_anonymous());
            assert!(model.slots()[usize::from(banks0)].accepts(2));
        }
        let def = two_slots(vec![BankDef::named(1, "A"), BankDef::ram(0..=1)],
                            vec![BankDef::ram(1), BankDef::named(1, "A")]);
        assert_eq!(MemoryModel::resolve(&def).unwrap().bank(1).unwrap().name, "A");
        let def = two_slots(vec![BankDef::ram(0..=3)], vec![rom(), BankDef::named(2, "RAM")]);
        assert_eq!(MemoryModel::resolve(&def), Err(ModelError::BankCollision(2)));
    }

    #[test]
    fn rejects_invalid_banks() {
        let def = two_slots(vec![BankDef::ram(BankIndex::Range(3, 1))], vec![BankDef::ram(0)]);
        assert_eq!(MemoryModel::resolve(&def), Err(ModelError::InvalidBankRange(0)));
        let def = two_slots(vec![BankDef::named(0, "A")], vec![BankDef::named(0, "B")]);
        assert_eq!(MemoryModel::resolve(&def), Err(ModelError::BankCollision(0)));
        let mut def = two_slots(vec![BankDef::ram(0..=3)], vec![BankDef::ram(1)]);
        def.slots[0].initial_bank = Some(7);
        assert_eq!(MemoryModel::resolve(&def), Err(ModelError::UnknownInitialBank(0)));
        let def = MemoryModelDef {
            slots: vec![
                SlotDef::new(0x0000..=0x3FFF, vec![BankDef::ram(0)]),
                SlotDef::new(0x8000..=0xFFFF, vec![BankDef::ram(1..=2)])
            ],
            ..Default::default()
        };
        assert_eq!(MemoryModel::resolve(&def), Err(ModelError::MultiSlotSwitchable(1)));
        let def = MemoryModelDef {
            slots: vec![SlotDef::new(0x0000..=0xFFFF, vec![BankDef::ram(0)])],
            ula_banks: Some(UlaBanks { primary: 0, shadow: 1 }),
            ..Default::default()
        };
        assert_eq!(MemoryModel::resolve(&def), Err(ModelError::InvalidUlaBank));
    }

    #[test]
    fn resolves_paging_slots() {
        let mut def = two_slots(vec![BankDef::ram(0)], vec![BankDef::ram(1..=7)]);
        def.io_mmu.push(PagingRule {
            port: PortMatch::new(0x00FF, 0x0042),
            selects: vec![BankSelect { slot: 1, value_mask: 0b0000_0111, bank_base: 0 }],
            lock_mask: 0
        });
        let model = MemoryModel::resolve(&def).unwrap();
        assert_eq!(model.paging_rules()[0].selects[0].slot, 1);
        def.io_mmu[0].selects[0].slot = 2;
        assert_eq!(MemoryModel::resolve(&def), Err(ModelError::InvalidPagingSlot(0)));
        def.io_mmu[0].selects[0].slot = 1;
        def.io_mmu[0].selects[0].value_mask = 0b0000_1111;
        assert_eq!(MemoryModel::resolve(&def), Err(ModelError::InvalidPagingBank(0)));
    }

    #[cfg(feature = "snapshot")]
    #[test]
    fn model_definition_from_json() {
        let json = r#"{
            "name": "CUSTOM",
            "slots": [
                {"range": [0, 32767], "banks": [{"index": 0, "name": "ROM", "rom": {"path": "custom.rom"}}]},
                {"range": [32768, 65535], "name": "upper", "initialBank": 2,
                 "banks": [{"index": [1, 3]}]}
            ],
            "ioMmu": [
                {"port": {"mask": 255, "bits": 31},
                 "selects": [{"slot": 1, "valueMask": 1, "bankBase": 1}]}
            ],
            "ulaBanks": {"primary": 1, "shadow": 3}
        }"#;
        let def: MemoryModelDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.slots[0].banks[0].rom, Some(RomImage::new("custom.rom", 0)));
        assert_eq!(def.slots[1].banks[0].index, BankIndex::Range(1, 3));
        assert_eq!(def.io_mmu[0].lock_mask, 0);
        let model = MemoryModel::resolve(&def).unwrap();
        assert_eq!(model.name(), "CUSTOM");
        assert_eq!(model.slots()[1].name.as_deref(), Some("upper"));
        assert_eq!(model.slots()[1].initial_bank, Some(2));
        assert!(model.bank(0).unwrap().is_rom());
        assert_eq!(model.ula_bank(true), Some(3));
        let json2 = serde_json::to_string(&def).unwrap();
        assert_eq!(serde_json::from_str::<MemoryModelDef>(&json2).unwrap(), def);
    }
}
