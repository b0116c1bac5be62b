/*
    Copyright (C) 2023  Rafal Michalski

    This file is part of SLOTBANK, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
use core::fmt;
use core::str::FromStr;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use bitflags::bitflags;

use super::ADDRESS_SPACE;

bitflags! {
    /// The kind of memory access a watchpoint is triggered by.
    #[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
    #[derive(Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
    pub struct WatchAccess: u8 {
        const READ  = 0b01;
        const WRITE = 0b10;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseWatchAccessError;

/// The first watchpoint triggered since the hit has been cleared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatchpointHit {
    pub address: u16,
    /// Either [WatchAccess::READ] or [WatchAccess::WRITE].
    pub access: WatchAccess
}

/// Reference counters of watchpoints covering a single address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct WatchCounters {
    pub read: u32,
    pub write: u32
}

/// Watchpoint counters for every address.
///
/// Overlapping watchpoints are counted, so an address stops being watched only when every
/// watchpoint covering it has been removed.
#[derive(Clone)]
pub(super) struct Watchpoints {
    counters: Box<[WatchCounters]>
}

impl Default for Watchpoints {
    fn default() -> Self {
        Watchpoints { counters: vec![WatchCounters::default(); ADDRESS_SPACE].into_boxed_slice() }
    }
}

impl WatchCounters {
    #[inline]
    pub fn is_watched(self) -> bool {
        self.read != 0 || self.write != 0
    }
}

impl Watchpoints {
    #[inline(always)]
    pub fn is_read_watched(&self, address: u16) -> bool {
        self.counters[address as usize].read != 0
    }

    #[inline(always)]
    pub fn is_write_watched(&self, address: u16) -> bool {
        self.counters[address as usize].write != 0
    }

    pub fn counters(&self, address: u16) -> WatchCounters {
        self.counters[address as usize]
    }

    pub fn add(&mut self, address: u16, size: usize, access: WatchAccess) {
        self.update(address, size, |counters| {
            if access.contains(WatchAccess::READ) {
                counters.read = counters.read.saturating_add(1);
            }
            if access.contains(WatchAccess::WRITE) {
                counters.write = counters.write.saturating_add(1);
            }
        })
    }
    /// Counters never fall below zero.
    pub fn remove(&mut self, address: u16, size: usize, access: WatchAccess) {
        self.update(address, size, |counters| {
            if access.contains(WatchAccess::READ) {
                counters.read = counters.read.saturating_sub(1);
            }
            if access.contains(WatchAccess::WRITE) {
                counters.write = counters.write.saturating_sub(1);
            }
        })
    }

    pub fn clear(&mut self) {
        for counters in self.counters.iter_mut() {
            *counters = WatchCounters::default();
        }
    }

    fn update<F: FnMut(&mut WatchCounters)>(&mut self, address: u16, size: usize, mut f: F) {
        let start = address as usize;
        for offset in 0..size.min(ADDRESS_SPACE) {
            f(&mut self.counters[(start + offset) & (ADDRESS_SPACE - 1)]);
        }
    }
}

impl std::error::Error for ParseWatchAccessError {}

impl fmt::Display for ParseWatchAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "cannot parse `WatchAccess`: expected one of \"r\", \"w\" or \"rw\"".fmt(f)
    }
}

impl FromStr for WatchAccess {
    type Err = ParseWatchAccessError;
    fn from_str(access: &str) -> core::result::Result<Self, Self::Err> {
        if access.eq_ignore_ascii_case("r") {
            Ok(WatchAccess::READ)
        }
        else if access.eq_ignore_ascii_case("w") {
            Ok(WatchAccess::WRITE)
        }
        else if access.eq_ignore_ascii_case("rw") || access.eq_ignore_ascii_case("wr") {
            Ok(WatchAccess::all())
        }
        else {
            Err(ParseWatchAccessError)
        }
    }
}

impl fmt::Display for WatchAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.contains(WatchAccess::READ) {
            f.write_str("r")?;
        }
        if self.contains(WatchAccess::WRITE) {
            f.write_str("w")?;
        }
        Ok(())
    }
}
