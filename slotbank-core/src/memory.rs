/*
    Copyright (C) 2023  Rafal Michalski

    This file is part of SLOTBANK, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Simulated memory API.
//!
//! [SimulatedMemory] maps the 16-bit address space onto `slot_count` slots of equal size.
//! Each slot is wired to one of `bank_count` banks of the same size, all banks are stored in
//! one continuous block of memory.
use core::fmt;
use std::io;

use arrayvec::ArrayVec;
use log::{debug, trace};

mod snapshot;
mod visual;
mod watch;
#[cfg(feature = "snapshot")] pub mod serde;

pub use visual::*;
pub use watch::*;
#[cfg(feature = "snapshot")] pub use self::serde::MemoryImage;

pub use crate::model::{MemoryKind, ADDRESS_SPACE, MAX_SLOTS, MAX_BANKS};
use crate::model::MemoryModel;

/// Not populated memory reads as `0xFF` from the data bus.
pub const NOT_POPULATED_VALUE: u8 = 0xFF;
pub const NOT_POPULATED_VALUE_16: u16 = 0xFFFF;
pub const NOT_POPULATED_VALUE_32: u32 = 0xFFFF_FFFF;

#[non_exhaustive]
#[derive(Debug)]
pub enum MemoryError {
    /// The slot count is zero, not a power of two or greater than [MAX_SLOTS].
    InvalidSlotCount(usize),
    /// There are less banks than slots.
    TooFewBanks { slots: usize, banks: usize },
    /// There are more banks than [MAX_BANKS].
    TooManyBanks(usize),
    InvalidSlotIndex(usize),
    InvalidBankIndex(usize),
    /// The data length is different than the bank size.
    InvalidBankSize { expected: usize, found: usize },
    /// The ROM image is too short to fill the bank.
    RomImageTooShort { bank: u8, required: usize, found: usize },
    /// The snapshot was made with a different number of slots.
    SnapshotSlotMismatch { expected: usize, found: usize },
    /// The snapshot's memory size is different than the size of all banks.
    SnapshotSizeMismatch { expected: usize, found: usize },
    /// The memory model couldn't be resolved.
    Model(crate::model::ModelError),
    Io(io::Error)
}

impl std::error::Error for MemoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MemoryError::Model(err) => Some(err),
            MemoryError::Io(err) => Some(err),
            _ => None
        }
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::InvalidSlotCount(count) => write!(f,
                "Slot count must be a power of two not greater than {}, got: {}", MAX_SLOTS, count),
            MemoryError::TooFewBanks { slots, banks } => write!(f,
                "At least {} banks are required, got: {}", slots, banks),
            MemoryError::TooManyBanks(count) => write!(f,
                "At most {} banks are supported, got: {}", MAX_BANKS, count),
            MemoryError::InvalidSlotIndex(slot) => write!(f, "Memory slot index {} is out of range", slot),
            MemoryError::InvalidBankIndex(bank) => write!(f, "Memory bank index {} is out of range", bank),
            MemoryError::InvalidBankSize { expected, found } => write!(f,
                "Bank data length must be {} bytes, got: {}", expected, found),
            MemoryError::RomImageTooShort { bank, required, found } => write!(f,
                "ROM image for bank {} must be at least {} bytes, got: {}", bank, required, found),
            MemoryError::SnapshotSlotMismatch { expected, found } => write!(f,
                "Memory snapshot has {} slots, expected: {}", found, expected),
            MemoryError::SnapshotSizeMismatch { expected, found } => write!(f,
                "Memory snapshot has {} bytes, expected: {}", found, expected),
            MemoryError::Model(err) => err.fmt(f),
            MemoryError::Io(err) => err.fmt(f)
        }
    }
}

impl From<MemoryError> for io::Error {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::Io(err) => err,
            e => io::Error::new(io::ErrorKind::InvalidInput, e)
        }
    }
}

impl From<io::Error> for MemoryError {
    fn from(err: io::Error) -> Self {
        MemoryError::Io(err)
    }
}

impl From<crate::model::ModelError> for MemoryError {
    fn from(err: crate::model::ModelError) -> Self {
        MemoryError::Model(err)
    }
}

/// A type returned by some of [SimulatedMemory] methods.
pub type Result<T> = core::result::Result<T, MemoryError>;

/// The simulated memory of the emulated CPU.
///
/// All reads and writes go through the slot table: `bank = slots[address >> shift]`, and the
/// byte is stored at `bank * bank_size + (address & (bank_size - 1))`.
///
/// Reads from not populated slots return [NOT_POPULATED_VALUE]. Writes to ROM banks or not
/// populated slots are silently ignored.
///
/// The CPU accessors [SimulatedMemory::read8] and [SimulatedMemory::write8] also check the
/// watchpoints and update the visual memory, the `get_memory*`, `set_memory*` and block
/// accessors don't.
#[derive(Clone)]
#[cfg_attr(feature = "snapshot", derive(::serde::Deserialize))]
#[cfg_attr(feature = "snapshot", serde(try_from = "MemoryImage"))]
pub struct SimulatedMemory {
    mem: Box<[u8]>,
    slots: ArrayVec<u8, MAX_SLOTS>,
    populated: ArrayVec<bool, MAX_SLOTS>,
    rom_banks: Box<[bool]>,
    bank_size: usize,
    shift: u32,
    watchpoints: Watchpoints,
    visual: VisualMemory,
    hit: Option<WatchpointHit>
}

impl fmt::Debug for SimulatedMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedMemory")
            .field("slots", &self.slots)
            .field("populated", &self.populated)
            .field("bank_count", &self.bank_count())
            .field("bank_size", &self.bank_size)
            .field("hit", &self.hit)
            .finish()
    }
}

/// A part of an address range that fits in a single slot, yielded by [SlotChunks].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SlotChunk {
    slot: usize,
    /// An offset into the slot's bank.
    offset: usize,
    len: usize
}

/// Iterates over an address range split at slot boundaries, wrapping at the end of the address space.
struct SlotChunks {
    cursor: usize,
    remaining: usize,
    bank_size: usize,
    shift: u32
}

impl Iterator for SlotChunks {
    type Item = SlotChunk;

    fn next(&mut self) -> Option<SlotChunk> {
        if self.remaining == 0 {
            return None
        }
        let address = self.cursor & (ADDRESS_SPACE - 1);
        let slot = address >> self.shift;
        let offset = address & (self.bank_size - 1);
        let len = (self.bank_size - offset).min(self.remaining);
        self.cursor = address + len;
        self.remaining -= len;
        Some(SlotChunk { slot, offset, len })
    }
}

impl SimulatedMemory {
    /// Creates the memory with `slot_count` slots and `bank_count` RAM banks.
    ///
    /// The bank size is `0x10000 / slot_count`. Slot `n` is initially wired to bank `n`.
    ///
    /// # Errors
    /// The `slot_count` must be a power of two not greater than [MAX_SLOTS], the `bank_count`
    /// must not be less than `slot_count` nor greater than [MAX_BANKS].
    pub fn new(slot_count: usize, bank_count: usize) -> Result<Self> {
        if slot_count == 0 || !slot_count.is_power_of_two() || slot_count > MAX_SLOTS {
            return Err(MemoryError::InvalidSlotCount(slot_count))
        }
        if bank_count < slot_count {
            return Err(MemoryError::TooFewBanks { slots: slot_count, banks: bank_count })
        }
        if bank_count > MAX_BANKS {
            return Err(MemoryError::TooManyBanks(bank_count))
        }
        let bank_size = ADDRESS_SPACE / slot_count;
        let shift = 16 - slot_count.trailing_zeros();
        let mem = vec![0u8; bank_count * bank_size].into_boxed_slice();
        let slots = (0..slot_count).map(|n| n as u8).collect();
        let populated = (0..slot_count).map(|_| true).collect();
        let rom_banks = vec![false; bank_count].into_boxed_slice();
        debug!("simulated memory: {} slots, {} banks of {:#x} bytes", slot_count, bank_count, bank_size);
        Ok(SimulatedMemory {
            mem,
            slots,
            populated,
            rom_banks,
            bank_size,
            shift,
            watchpoints: Watchpoints::default(),
            visual: VisualMemory::default(),
            hit: None
        })
    }
    /// Creates the memory in the shape of the given `model`.
    ///
    /// Banks are marked as ROM and slots are wired to their initial banks according to the model.
    /// Slots without an initial bank are not populated.
    pub fn with_model(model: &MemoryModel) -> Result<Self> {
        let mut memory = SimulatedMemory::new(model.slot_count(), model.bank_count())?;
        for info in model.banks().iter() {
            memory.rom_banks[info.index as usize] = info.is_rom();
        }
        memory.wire_initial_slots(model)?;
        Ok(memory)
    }
    /// Wires all slots to their initial banks according to the `model`.
    pub fn wire_initial_slots(&mut self, model: &MemoryModel) -> Result<()> {
        for (slot, info) in model.slots().iter().enumerate() {
            match info.initial_bank {
                Some(bank) => self.set_slot(slot, bank as usize)?,
                None => self.set_as_not_populated_slot(slot)?
            }
        }
        Ok(())
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn bank_count(&self) -> usize {
        self.rom_banks.len()
    }

    #[inline]
    pub fn bank_size(&self) -> usize {
        self.bank_size
    }
    /// Returns the size of all banks in bytes.
    #[inline]
    pub fn store_size(&self) -> usize {
        self.mem.len()
    }
    /// Returns the bank numbers wired to each slot.
    ///
    /// The bank number of a not populated slot is meaningless.
    pub fn slots(&self) -> &[u8] {
        &self.slots
    }
    /// Returns the populated flag of each slot.
    pub fn populated_slots(&self) -> &[bool] {
        &self.populated
    }
    /// Provides a continuous view into the whole memory (all banks).
    pub fn mem_ref(&self) -> &[u8] {
        &self.mem
    }
    /// Returns a view of the `bank`.
    pub fn bank_ref(&self, bank: usize) -> Result<&[u8]> {
        if bank >= self.bank_count() {
            return Err(MemoryError::InvalidBankIndex(bank))
        }
        let offset = bank * self.bank_size;
        Ok(&self.mem[offset..offset + self.bank_size])
    }
    /// Returns the kind of the `bank` or `None` if the bank doesn't exist.
    pub fn bank_kind(&self, bank: usize) -> Option<MemoryKind> {
        self.rom_banks.get(bank).map(|&rom| if rom { MemoryKind::Rom } else { MemoryKind::Ram })
    }
    /// Changes the kind of the `bank`. Writes to ROM banks are ignored.
    pub fn set_bank_kind(&mut self, bank: usize, kind: MemoryKind) -> Result<()> {
        let rom = self.rom_banks.get_mut(bank).ok_or(MemoryError::InvalidBankIndex(bank))?;
        *rom = kind == MemoryKind::Rom;
        Ok(())
    }
    /// Returns the index of the slot the `addr` belongs to.
    #[inline(always)]
    pub fn slot_index_at(&self, addr: u16) -> usize {
        addr as usize >> self.shift
    }
    /// Returns `true` if the slot at `addr` is populated.
    #[inline]
    pub fn is_populated_at(&self, addr: u16) -> bool {
        self.populated[self.slot_index_at(addr)]
    }
    /// Returns the bank wired at `addr` or `None` if the slot is not populated.
    pub fn bank_at(&self, addr: u16) -> Option<u8> {
        let slot = self.slot_index_at(addr);
        if self.populated[slot] { Some(self.slots[slot]) } else { None }
    }

    #[inline(always)]
    fn flat_offset(&self, slot: usize, addr: u16) -> usize {
        self.slots[slot] as usize * self.bank_size + (addr as usize & (self.bank_size - 1))
    }

    #[inline(always)]
    fn is_writable(&self, slot: usize) -> bool {
        self.populated[slot] && !self.rom_banks[self.slots[slot] as usize]
    }

    fn chunks(&self, start: u16, size: usize) -> SlotChunks {
        SlotChunks { cursor: start as usize, remaining: size, bank_size: self.bank_size, shift: self.shift }
    }
    /// Reads a byte as the CPU does.
    ///
    /// Records a watchpoint hit if the `addr` is watched for reading and no other hit has been
    /// recorded since the last [SimulatedMemory::clear_hit].
    #[inline]
    pub fn read8(&mut self, addr: u16) -> u8 {
        if self.hit.is_none() && self.watchpoints.is_read_watched(addr) {
            trace!("read watchpoint hit: {:04x}", addr);
            self.hit = Some(WatchpointHit { address: addr, access: WatchAccess::READ });
        }
        self.visual.mark(addr, VisualAccess::Read);
        self.get_memory8(addr)
    }
    /// Writes a byte as the CPU does.
    ///
    /// Records a watchpoint hit if the `addr` is watched for writing and no other hit has been
    /// recorded since the last [SimulatedMemory::clear_hit].
    #[inline]
    pub fn write8(&mut self, addr: u16, val: u8) {
        if self.hit.is_none() && self.watchpoints.is_write_watched(addr) {
            trace!("write watchpoint hit: {:04x}", addr);
            self.hit = Some(WatchpointHit { address: addr, access: WatchAccess::WRITE });
        }
        self.visual.mark(addr, VisualAccess::Write);
        let slot = self.slot_index_at(addr);
        if self.is_writable(slot) {
            let offset = self.flat_offset(slot, addr);
            self.mem[offset] = val;
        }
    }
    /// Marks the visual memory at `addr` as an instruction fetch.
    #[inline]
    pub fn set_visual_prog(&mut self, addr: u16) {
        self.visual.mark(addr, VisualAccess::Prog);
    }
    /// Reads a byte without side effects.
    #[inline]
    pub fn get_memory8(&self, addr: u16) -> u8 {
        let slot = self.slot_index_at(addr);
        if !self.populated[slot] {
            return NOT_POPULATED_VALUE
        }
        self.mem[self.flat_offset(slot, addr)]
    }
    /// Reads a little-endian word without side effects.
    pub fn get_memory16(&self, addr: u16) -> u16 {
        let offset = addr as usize & (self.bank_size - 1);
        if offset < self.bank_size - 1 {
            let slot = self.slot_index_at(addr);
            if !self.populated[slot] {
                return NOT_POPULATED_VALUE_16
            }
            let index = self.flat_offset(slot, addr);
            u16::from_le_bytes([self.mem[index], self.mem[index + 1]])
        }
        else {
            let lo = self.get_memory8(addr);
            let hi = self.get_memory8(addr.wrapping_add(1));
            u16::from_le_bytes([lo, hi])
        }
    }
    /// Reads a little-endian double word without side effects.
    pub fn get_memory32(&self, addr: u16) -> u32 {
        let offset = addr as usize & (self.bank_size - 1);
        if offset < self.bank_size - 3 {
            let slot = self.slot_index_at(addr);
            if !self.populated[slot] {
                return NOT_POPULATED_VALUE_32
            }
            let index = self.flat_offset(slot, addr);
            let mut bytes = [0u8;4];
            bytes.copy_from_slice(&self.mem[index..index + 4]);
            u32::from_le_bytes(bytes)
        }
        else {
            let mut bytes = [0u8;4];
            for (n, byte) in bytes.iter_mut().enumerate() {
                *byte = self.get_memory8(addr.wrapping_add(n as u16));
            }
            u32::from_le_bytes(bytes)
        }
    }
    /// Writes a byte without side effects.
    ///
    /// Unlike [SimulatedMemory::write8] this also alters ROM banks. Writes to not populated slots
    /// are ignored.
    #[inline]
    pub fn set_memory8(&mut self, addr: u16, val: u8) {
        let slot = self.slot_index_at(addr);
        if self.populated[slot] {
            let offset = self.flat_offset(slot, addr);
            self.mem[offset] = val;
        }
    }
    /// Writes a little-endian word without side effects.
    ///
    /// See [SimulatedMemory::set_memory8].
    pub fn set_memory16(&mut self, addr: u16, val: u16) {
        let offset = addr as usize & (self.bank_size - 1);
        if offset < self.bank_size - 1 {
            let slot = self.slot_index_at(addr);
            if self.populated[slot] {
                let index = self.flat_offset(slot, addr);
                self.mem[index..index + 2].copy_from_slice(&val.to_le_bytes());
            }
        }
        else {
            let [lo, hi] = val.to_le_bytes();
            self.set_memory8(addr, lo);
            self.set_memory8(addr.wrapping_add(1), hi);
        }
    }
    /// Reads `size` bytes starting from `start`, wrapping at the end of the address space.
    ///
    /// Bytes from not populated slots read as [NOT_POPULATED_VALUE].
    pub fn read_block(&self, start: u16, size: usize) -> Vec<u8> {
        let mut block = Vec::with_capacity(size);
        for SlotChunk { slot, offset, len } in self.chunks(start, size) {
            if self.populated[slot] {
                let index = self.slots[slot] as usize * self.bank_size + offset;
                block.extend_from_slice(&self.mem[index..index + len]);
            }
            else {
                block.resize(block.len() + len, NOT_POPULATED_VALUE);
            }
        }
        block
    }
    /// Writes the `block` starting from `start`, wrapping at the end of the address space.
    ///
    /// Parts of the block falling into ROM banks or not populated slots are ignored.
    pub fn write_block(&mut self, start: u16, block: &[u8]) {
        let mut data = block;
        for SlotChunk { slot, offset, len } in self.chunks(start, block.len()) {
            let (part, rest) = data.split_at(len);
            if self.is_writable(slot) {
                let index = self.slots[slot] as usize * self.bank_size + offset;
                self.mem[index..index + len].copy_from_slice(part);
            }
            data = rest;
        }
    }
    /// Replaces the contents of the `bank` regardless of its kind.
    ///
    /// # Errors
    /// The `data` length must be equal to the bank size.
    pub fn write_bank(&mut self, bank: usize, data: &[u8]) -> Result<()> {
        if bank >= self.bank_count() {
            return Err(MemoryError::InvalidBankIndex(bank))
        }
        if data.len() != self.bank_size {
            return Err(MemoryError::InvalidBankSize { expected: self.bank_size, found: data.len() })
        }
        let offset = bank * self.bank_size;
        self.mem[offset..offset + self.bank_size].copy_from_slice(data);
        Ok(())
    }
    /// Writes `data` directly into the memory of all banks at the given `offset`.
    ///
    /// Data exceeding the memory is truncated.
    pub fn write_memory_data(&mut self, offset: usize, data: &[u8]) {
        if let Some(target) = self.mem.get_mut(offset..) {
            let len = target.len().min(data.len());
            target[..len].copy_from_slice(&data[..len]);
        }
    }
    /// Clears the memory of all banks with zeroes.
    pub fn clear(&mut self) {
        for p in self.mem.iter_mut() {
            *p = 0;
        }
    }
    /// Wires the `slot` to the `bank`. The slot becomes populated.
    pub fn set_slot(&mut self, slot: usize, bank: usize) -> Result<()> {
        if slot >= self.slot_count() {
            return Err(MemoryError::InvalidSlotIndex(slot))
        }
        if bank >= self.bank_count() {
            return Err(MemoryError::InvalidBankIndex(bank))
        }
        self.slots[slot] = bank as u8;
        self.populated[slot] = true;
        Ok(())
    }
    /// Marks the `slot` as not populated: it reads as [NOT_POPULATED_VALUE] and ignores writes.
    pub fn set_as_not_populated_slot(&mut self, slot: usize) -> Result<()> {
        let populated = self.populated.get_mut(slot).ok_or(MemoryError::InvalidSlotIndex(slot))?;
        *populated = false;
        Ok(())
    }
    /// Adds a watchpoint over `size` addresses starting from `address`.
    pub fn set_watchpoint(&mut self, address: u16, size: usize, access: WatchAccess) {
        self.watchpoints.add(address, size, access)
    }
    /// Removes a watchpoint over `size` addresses starting from `address`.
    pub fn remove_watchpoint(&mut self, address: u16, size: usize, access: WatchAccess) {
        self.watchpoints.remove(address, size, access)
    }
    /// Returns the watchpoint counters at `address`.
    pub fn watchpoint_at(&self, address: u16) -> WatchCounters {
        self.watchpoints.counters(address)
    }
    /// Removes all watchpoints.
    pub fn clear_watchpoints(&mut self) {
        self.watchpoints.clear()
    }
    /// Returns the first watchpoint hit recorded since the last [SimulatedMemory::clear_hit].
    #[inline]
    pub fn watchpoint_hit(&self) -> Option<WatchpointHit> {
        self.hit
    }
    /// Forgets the recorded watchpoint hit. Should be called before each CPU step.
    #[inline]
    pub fn clear_hit(&mut self) {
        self.hit = None;
    }
    /// Clears the visual memory.
    pub fn clear_visual_memory(&mut self) {
        self.visual.clear()
    }
    /// Returns the most recent access kind of each visual memory bucket.
    pub fn visual_memory(&self) -> &[VisualAccess] {
        self.visual.as_slice()
    }
}
