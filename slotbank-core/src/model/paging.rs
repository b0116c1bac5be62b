/*
    Copyright (C) 2023  Rafal Michalski

    This file is part of SLOTBANK, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Bank switching rules triggered by writes to I/O ports.
use log::{debug, warn};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

/// Matches I/O port addresses.
///
/// Relevant address bits should be set to 1 in `mask`. Bits from `bits` are matching only if
/// `mask` contains 1 for bits in the same positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct PortMatch {
    pub mask: u16,
    pub bits: u16
}

impl PortMatch {
    pub const fn new(mask: u16, bits: u16) -> Self {
        PortMatch { mask, bits }
    }
    /// Returns `true` if a provided `port` masked with `mask` matches `bits`.
    #[inline]
    pub fn matches(self, port: u16) -> bool {
        port & self.mask == self.bits & self.mask
    }
}

/// Selects a bank for a slot from the bits of the value written to the port.
///
/// The selected bank is `bank_base + ((value & value_mask) >> value_mask.trailing_zeros())`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
pub struct BankSelect {
    /// The index of the slot being rewired.
    ///
    /// In a [super::MemoryModelDef] this is the index of the declared slot, in a resolved
    /// [super::MemoryModel] it's the index of the engine slot.
    pub slot: usize,
    pub value_mask: u8,
    #[cfg_attr(feature = "snapshot", serde(default))]
    pub bank_base: u8
}

impl BankSelect {
    /// Returns the bank selected by the written `value`.
    #[inline]
    pub fn bank(self, value: u8) -> u8 {
        let bits = (value & self.value_mask)
                   .checked_shr(self.value_mask.trailing_zeros())
                   .unwrap_or(0);
        self.bank_base.wrapping_add(bits)
    }
    /// Returns the largest bank number this selection may produce.
    pub fn max_bank(self) -> u16 {
        let bits = self.value_mask.checked_shr(self.value_mask.trailing_zeros()).unwrap_or(0);
        self.bank_base as u16 + bits as u16
    }
}

/// A bank switching rule.
///
/// When a value is written to a port matching `port`, each of the `selects` rewires its slot
/// with a bank selected by the value bits. If the written value has any of the `lock_mask` bits
/// set, the rule is disabled after being applied and ignores further writes until reset.
///
/// E.g. the ZX Spectrum 128k port `0x7FFD` selects the RAM bank at `0xC000` with bits 0-2,
/// the ROM bank at `0x0000` with bit 4 and locks paging with bit 5.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
pub struct PagingRule {
    pub port: PortMatch,
    pub selects: Vec<BankSelect>,
    #[cfg_attr(feature = "snapshot", serde(default))]
    pub lock_mask: u8
}

/// The runtime state of the bank switching rules: the lock latch of each rule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct PagingState {
    locked: Vec<bool>
}

impl PagingState {
    /// Creates the state for the given `rules`, all unlocked.
    pub fn new(rules: &[PagingRule]) -> Self {
        PagingState { locked: vec![false; rules.len()] }
    }
    /// Unlocks all rules.
    pub fn reset(&mut self) {
        for locked in self.locked.iter_mut() {
            *locked = false;
        }
    }
    /// Returns `true` if the rule at `index` is locked.
    pub fn is_locked(&self, index: usize) -> bool {
        self.locked.get(index).copied().unwrap_or(false)
    }
    /// Evaluates `rules` against the `value` written to the `port`.
    ///
    /// Rules are evaluated in order. Each matching and unlocked rule calls `map_bank`
    /// with the slot index and the selected bank for every one of its selections.
    ///
    /// Returns `true` if any rule has been applied.
    pub fn write_io<F>(&mut self, rules: &[PagingRule], port: u16, value: u8, mut map_bank: F) -> bool
        where F: FnMut(usize, u8)
    {
        if self.locked.len() < rules.len() {
            self.locked.resize(rules.len(), false);
        }
        let mut applied = false;
        for (rule, locked) in rules.iter().zip(self.locked.iter_mut()) {
            if !rule.port.matches(port) {
                continue
            }
            if *locked {
                warn!("write to a locked paging port: {:04x} {:02x}", port, value);
                continue
            }
            for select in rule.selects.iter() {
                let bank = select.bank(value);
                debug!("port {:04x} {:02x}: slot {} <- bank {}", port, value, select.slot, bank);
                map_bank(select.slot, bank);
            }
            if value & rule.lock_mask != 0 {
                debug!("port {:04x} {:02x}: paging locked", port, value);
                *locked = true;
            }
            applied = true;
        }
        applied
    }
}
