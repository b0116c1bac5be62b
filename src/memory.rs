/*
    Copyright (C) 2023  Rafal Michalski

    This file is part of SLOTBANK, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Memory API.
pub use slotbank_core::memory::*;

mod machine;

pub use machine::*;
