/*
    Copyright (C) 2023  Rafal Michalski

    This file is part of SLOTBANK, a Rust library for building emulators.

    SLOTBANK is free software: you can redistribute it and/or modify it under
    the terms of the GNU Lesser General Public License (LGPL) as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    SLOTBANK is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Lesser General Public License for more details.

    You should have received a copy of the GNU Lesser General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.

    Author contact information: see Cargo.toml file, section [package.authors].
*/
//! SLOTBANK is a library for building banked memory of emulated ZX Spectrum class 8-bit machines.
//!
//! The memory of a machine is described by a [model::MemoryModelDef], either taken from one of
//! the [model::MemoryModelPreset]s or assembled by hand. The definition is resolved into a
//! [model::MemoryModel] which determines the shape of the [memory::SimulatedMemory].
//!
//! [memory::MachineMemory] puts the two together: it wires the initial banks, loads ROM images
//! and switches banks when the CPU writes to the paging I/O ports.
//!
//! ```
//! use slotbank::memory::MachineMemory;
//! use slotbank::model::MemoryModelPreset;
//!
//! let mut mem = MachineMemory::from_preset(MemoryModelPreset::Zx128k, "roms").unwrap();
//! mem.write8(0xC000, 42);
//! assert!(mem.write_io(0x7FFD, 1));
//! assert_eq!(mem.read8(0xC000), 0);
//! assert!(mem.write_io(0x7FFD, 0));
//! assert_eq!(mem.read8(0xC000), 42);
//! ```
pub mod disasm;
pub mod memory;

pub use slotbank_core::model;
