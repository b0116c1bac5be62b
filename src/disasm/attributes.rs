/*
    Copyright (C) 2023  Rafal Michalski

    This file is part of SLOTBANK, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
use bitflags::bitflags;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use crate::memory::{SimulatedMemory, MachineMemory, ADDRESS_SPACE};

bitflags! {
    /// What is known about a memory address.
    ///
    /// No flags means the address is unused: its value is unknown.
    #[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
    #[derive(Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
    pub struct MemAttribute: u8 {
        /// The value is known.
        const ASSIGNED   = 0b0001;
        /// The address belongs to an instruction.
        const CODE       = 0b0010;
        /// The address is the first byte of an instruction.
        const CODE_FIRST = 0b0100;
        /// The address is accessed as data.
        const DATA       = 0b1000;
    }
}

impl MemAttribute {
    pub const UNUSED: MemAttribute = MemAttribute::empty();

    #[inline]
    pub fn is_unused(self) -> bool {
        self.is_empty()
    }
}

/// A read only view of memory values and their attributes.
pub trait AttributedMemory {
    /// Returns the value at `address`. The value of an unused address is meaningless.
    fn value_at(&self, address: u16) -> u8;
    fn attribute_at(&self, address: u16) -> MemAttribute;
    /// Returns the little-endian word at `address`.
    fn word_value_at(&self, address: u16) -> u16 {
        u16::from_le_bytes([self.value_at(address), self.value_at(address.wrapping_add(1))])
    }
}

impl AttributedMemory for SimulatedMemory {
    #[inline]
    fn value_at(&self, address: u16) -> u8 {
        self.get_memory8(address)
    }
    /// Addresses of not populated slots are unused.
    #[inline]
    fn attribute_at(&self, address: u16) -> MemAttribute {
        if self.is_populated_at(address) {
            MemAttribute::ASSIGNED
        }
        else {
            MemAttribute::UNUSED
        }
    }
}

impl AttributedMemory for MachineMemory {
    #[inline]
    fn value_at(&self, address: u16) -> u8 {
        self.memory().value_at(address)
    }

    #[inline]
    fn attribute_at(&self, address: u16) -> MemAttribute {
        self.memory().attribute_at(address)
    }
}

impl<'a, M: AttributedMemory + ?Sized> AttributedMemory for &'a M {
    fn value_at(&self, address: u16) -> u8 {
        M::value_at(self, address)
    }

    fn attribute_at(&self, address: u16) -> MemAttribute {
        M::attribute_at(self, address)
    }
}

/// The 64kb memory of a disassembler.
///
/// Values are written as memory dumps are being loaded, attributes are added as the code is
/// being analyzed.
#[derive(Clone)]
pub struct DisasmMemory {
    values: Box<[u8]>,
    attributes: Box<[MemAttribute]>
}

impl Default for DisasmMemory {
    fn default() -> Self {
        DisasmMemory {
            values: vec![0; ADDRESS_SPACE].into_boxed_slice(),
            attributes: vec![MemAttribute::UNUSED; ADDRESS_SPACE].into_boxed_slice()
        }
    }
}

impl DisasmMemory {
    pub fn new() -> Self {
        Self::default()
    }
    /// Copies all populated addresses of the `memory`.
    pub fn from_memory<M: AttributedMemory>(memory: &M) -> Self {
        let mut disasm = DisasmMemory::new();
        for address in 0..=u16::MAX {
            if !memory.attribute_at(address).is_unused() {
                disasm.values[address as usize] = memory.value_at(address);
                disasm.attributes[address as usize] = MemAttribute::ASSIGNED;
            }
        }
        disasm
    }
    /// Writes `data` starting from `address` and marks it as [MemAttribute::ASSIGNED].
    ///
    /// Data wraps around at the end of the address space.
    pub fn set_memory(&mut self, address: u16, data: &[u8]) {
        for (offset, &value) in data.iter().enumerate() {
            let index = (address as usize + offset) & (ADDRESS_SPACE - 1);
            self.values[index] = value;
            self.attributes[index] |= MemAttribute::ASSIGNED;
        }
    }
    /// Adds `attr` to `size` addresses starting from `address`.
    pub fn add_attribute_at(&mut self, address: u16, size: usize, attr: MemAttribute) {
        for offset in 0..size.min(ADDRESS_SPACE) {
            self.attributes[(address as usize + offset) & (ADDRESS_SPACE - 1)] |= attr;
        }
    }
    /// Removes `attr` from `size` addresses starting from `address`.
    pub fn remove_attribute_at(&mut self, address: u16, size: usize, attr: MemAttribute) {
        for offset in 0..size.min(ADDRESS_SPACE) {
            self.attributes[(address as usize + offset) & (ADDRESS_SPACE - 1)] &= !attr;
        }
    }
    /// Removes all attributes but [MemAttribute::ASSIGNED].
    pub fn clear_analysis(&mut self) {
        for attr in self.attributes.iter_mut() {
            *attr &= MemAttribute::ASSIGNED;
        }
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }

    pub fn attributes(&self) -> &[MemAttribute] {
        &self.attributes
    }
}

impl AttributedMemory for DisasmMemory {
    #[inline]
    fn value_at(&self, address: u16) -> u8 {
        self.values[address as usize]
    }

    #[inline]
    fn attribute_at(&self, address: u16) -> MemAttribute {
        self.attributes[address as usize]
    }
}
