/*
    Copyright (C) 2023  Rafal Michalski

    This file is part of SLOTBANK, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Memory views for disassemblers.
//!
//! [AttributedMemory] is a read only interface that reports values together with what is known
//! about them. It is implemented by the emulated memory, where every populated address is
//! [MemAttribute::ASSIGNED], and by [DisasmMemory] which keeps the knowledge a disassembler
//! gathers about a memory dump.
//!
//! [MemoryRanges] captures sparse fragments of memory and later checks whether they are still
//! the same in the live memory.
mod attributes;
mod ranges;

pub use attributes::*;
pub use ranges::*;
