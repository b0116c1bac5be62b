/*
    Copyright (C) 2023  Rafal Michalski

    This file is part of SLOTBANK, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

/// The number of visual memory buckets.
pub const VISUAL_MEMORY_SIZE: usize = 256;
/// Each bucket covers `1 << VISUAL_MEMORY_SHIFT` addresses.
pub const VISUAL_MEMORY_SHIFT: u32 = 8;

/// The most recent kind of access to a range of addresses.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VisualAccess {
    None = 0,
    Read = 1,
    Write = 2,
    /// An instruction fetch.
    Prog = 3
}

impl Default for VisualAccess {
    fn default() -> Self {
        VisualAccess::None
    }
}

impl From<VisualAccess> for u8 {
    fn from(access: VisualAccess) -> u8 {
        access as u8
    }
}

#[derive(Clone)]
pub(super) struct VisualMemory {
    buckets: [VisualAccess; VISUAL_MEMORY_SIZE]
}

impl Default for VisualMemory {
    fn default() -> Self {
        VisualMemory { buckets: [VisualAccess::None; VISUAL_MEMORY_SIZE] }
    }
}

impl VisualMemory {
    #[inline(always)]
    pub fn mark(&mut self, address: u16, access: VisualAccess) {
        self.buckets[(address >> VISUAL_MEMORY_SHIFT) as usize] = access;
    }

    pub fn clear(&mut self) {
        self.buckets = [VisualAccess::None; VISUAL_MEMORY_SIZE];
    }

    pub fn as_slice(&self) -> &[VisualAccess] {
        &self.buckets
    }
}
