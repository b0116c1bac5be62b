/*
    Copyright (C) 2023  Rafal Michalski

    This file is part of SLOTBANK, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
use core::ops::{Deref, DerefMut};
use std::collections::HashMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use slotbank_core::memory::{SimulatedMemory, MemoryError, Result};
use slotbank_core::model::{MemoryModel, MemoryModelDef, MemoryModelPreset, PagingState};

/// The memory of a concrete machine.
///
/// Combines [SimulatedMemory] with the [MemoryModel] it was created from. Provides the initial
/// bank wiring, ROM image loading, bank switching by the I/O port writes and the screen bank
/// selection.
///
/// All of the [SimulatedMemory] methods are accessible via [Deref].
#[derive(Clone, Debug)]
pub struct MachineMemory {
    memory: SimulatedMemory,
    model: MemoryModel,
    paging: PagingState,
    ula_shadow: bool
}

impl Deref for MachineMemory {
    type Target = SimulatedMemory;
    fn deref(&self) -> &SimulatedMemory {
        &self.memory
    }
}

impl DerefMut for MachineMemory {
    fn deref_mut(&mut self) -> &mut SimulatedMemory {
        &mut self.memory
    }
}

impl MachineMemory {
    /// Creates the memory of the machine described by the `model`.
    ///
    /// ROM banks are left empty, use one of the `load_*` methods to fill them.
    pub fn new(model: MemoryModel) -> Result<Self> {
        let memory = SimulatedMemory::with_model(&model)?;
        let paging = PagingState::new(model.paging_rules());
        Ok(MachineMemory { memory, model, paging, ula_shadow: false })
    }
    /// Resolves the model from `def` and creates the memory.
    pub fn from_definition(def: &MemoryModelDef) -> Result<Self> {
        let model = MemoryModel::resolve(def)?;
        Self::new(model)
    }
    /// Creates the memory of one of the preset machines.
    ///
    /// ROM image paths are relative to `rom_dir`, no images are being read by this method.
    pub fn from_preset<P: AsRef<Path>>(preset: MemoryModelPreset, rom_dir: P) -> Result<Self> {
        let model = preset.resolve(rom_dir)?;
        Self::new(model)
    }

    pub fn model(&self) -> &MemoryModel {
        &self.model
    }

    pub fn paging_state(&self) -> &PagingState {
        &self.paging
    }
    /// Returns a reference to the underlying memory.
    pub fn memory(&self) -> &SimulatedMemory {
        &self.memory
    }
    /// Returns the underlying memory, dropping the model.
    pub fn into_memory(self) -> SimulatedMemory {
        self.memory
    }
    /// Restores the initial bank wiring, unlocks paging and selects the primary screen.
    ///
    /// The memory content is left intact.
    pub fn reset(&mut self) -> Result<()> {
        self.memory.wire_initial_slots(&self.model)?;
        self.paging.reset();
        self.ula_shadow = false;
        debug!("{} memory reset", self.model.name());
        Ok(())
    }
    /// Loads all ROM banks from images provided by `fetch`.
    ///
    /// `fetch` is called once for each distinct image path. Each ROM bank receives `bank_size`
    /// bytes of its image starting at the bank's image offset.
    ///
    /// # Errors
    /// Returns the error of `fetch` or [MemoryError::RomImageTooShort] if an image doesn't cover
    /// the bank.
    pub fn load_roms<F>(&mut self, mut fetch: F) -> Result<()>
        where F: FnMut(&Path) -> io::Result<Vec<u8>>
    {
        let bank_size = self.memory.bank_size();
        let mut images: HashMap<PathBuf, (Vec<u8>, usize)> = HashMap::new();
        for info in self.model.rom_banks() {
            let rom = match info.rom.as_ref() {
                Some(rom) => rom,
                None => continue
            };
            if !images.contains_key(&rom.path) {
                let data = fetch(&rom.path)?;
                info!("ROM image {} loaded: {} bytes", rom.path.display(), data.len());
                images.insert(rom.path.clone(), (data, 0));
            }
            let (data, used) = match images.get_mut(&rom.path) {
                Some(image) => image,
                None => continue
            };
            let end = rom.offset + bank_size;
            let chunk = data.get(rom.offset..end).ok_or(MemoryError::RomImageTooShort {
                bank: info.index, required: end, found: data.len()
            })?;
            self.memory.write_bank(info.index as usize, chunk)?;
            debug!("bank {} ({}) <- {} at {:#x}", info.index, info.name, rom.path.display(), rom.offset);
            *used = end.max(*used);
        }
        for (path, (data, used)) in images.iter() {
            if data.len() > *used {
                warn!("ROM image {} has {} unused bytes", path.display(), data.len() - used);
            }
        }
        Ok(())
    }
    /// Loads all ROM banks reading images from the file system.
    pub fn load_roms_from_files(&mut self) -> Result<()> {
        self.load_roms(|path| std::fs::read(path))
    }
    /// Fills the `bank` with data from the reader, regardless of the bank kind.
    ///
    /// # Errors
    /// Results in an error when the reader provides less data than the bank size.
    pub fn load_rom_bank<R: Read>(&mut self, bank: u8, mut rd: R) -> Result<()> {
        let mut data = vec![0u8; self.memory.bank_size()];
        rd.read_exact(&mut data)?;
        self.memory.write_bank(bank as usize, &data)
    }
    /// Applies the model's bank switching rules to the `value` written to the I/O `port`.
    ///
    /// Returns `true` if the slot wiring has been changed by any rule.
    pub fn write_io(&mut self, port: u16, value: u8) -> bool {
        let MachineMemory { memory, model, paging, .. } = self;
        paging.write_io(model.paging_rules(), port, value, |slot, bank| {
            if let Err(err) = memory.set_slot(slot, bank as usize) {
                warn!("port {:04x} {:02x}: {}", port, value, err);
            }
        })
    }
    /// Selects the primary or the `shadow` screen bank.
    pub fn switch_ula_bank(&mut self, shadow: bool) {
        self.ula_shadow = shadow;
    }

    pub fn is_ula_shadow(&self) -> bool {
        self.ula_shadow
    }
    /// Returns the number of the currently selected screen bank or `None` if the model has
    /// no screen memory.
    pub fn ula_bank(&self) -> Option<u8> {
        self.model.ula_bank(self.ula_shadow)
    }
    /// Returns a view of the currently selected screen bank.
    pub fn screen_ref(&self) -> Option<&[u8]> {
        self.ula_bank().and_then(|bank| self.memory.bank_ref(bank as usize).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotbank_core::model::MemoryKind;

    #[test]
    fn machine_memory_works() {
        let mut mem = MachineMemory::from_preset(MemoryModelPreset::Zx48k, "roms").unwrap();
        assert_eq!(mem.model().name(), "ZX48K");
        assert_eq!(mem.slots(), &[0, 1, 2, 3]);
        assert_eq!(mem.bank_kind(0), Some(MemoryKind::Rom));
        mem.load_rom_bank(0, &[0xF3u8;0x4000][..]).unwrap();
        assert_eq!(mem.read8(0x0000), 0xF3);
        mem.write8(0x0000, 0);
        assert_eq!(mem.read8(0x0000), 0xF3);
        assert!(mem.load_rom_bank(0, &[0u8;0x3FFF][..]).is_err());
        assert!(!mem.write_io(0x7FFD, 0x07));
        assert_eq!(mem.ula_bank(), Some(1));
        mem.switch_ula_bank(true);
        assert_eq!(mem.ula_bank(), Some(1));
        mem.write8(0x4000, 0x55);
        assert_eq!(mem.screen_ref().unwrap()[0], 0x55);
    }

    #[test]
    fn paging_and_reset_work() {
        let mut mem = MachineMemory::from_preset(MemoryModelPreset::Zx128k, "roms").unwrap();
        assert_eq!(mem.slots(), &[8, 5, 2, 0]);
        assert!(mem.write_io(0x7FFD, 0x17));
        assert_eq!(mem.slots(), &[9, 5, 2, 7]);
        assert!(mem.write_io(0x7FFD, 0x23));
        assert_eq!(mem.slots(), &[8, 5, 2, 3]);
        assert!(mem.paging_state().is_locked(0));
        assert!(!mem.write_io(0x7FFD, 0x00));
        assert_eq!(mem.slots(), &[8, 5, 2, 3]);
        mem.switch_ula_bank(true);
        assert_eq!(mem.ula_bank(), Some(7));
        mem.reset().unwrap();
        assert_eq!(mem.slots(), &[8, 5, 2, 0]);
        assert!(!mem.paging_state().is_locked(0));
        assert_eq!(mem.ula_bank(), Some(5));
    }
}
