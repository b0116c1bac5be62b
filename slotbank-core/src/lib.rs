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
//! The core components of the SLOTBANK library.
//!
//! * [model] describes the slot and bank geometry of a machine in a declarative way.
//! * [memory] implements the simulated, bank switched memory of the emulated CPU.
pub mod memory;
pub mod model;
