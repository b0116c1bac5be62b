/*
    Copyright (C) 2023  Rafal Michalski

    This file is part of SLOTBANK, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Utilities for serializing memory as base64 strings or just bytes in binary serializers.
use core::convert::TryFrom;
use core::fmt;
use std::borrow::Cow;
#[cfg(feature = "compression")] use core::iter::FromIterator;
#[cfg(feature = "compression")] use compression::prelude::*;
#[cfg(feature = "compression")] use serde::ser;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{
    Serialize, Serializer, Deserialize, Deserializer,
    de::{self, Visitor}
};

use super::{SimulatedMemory, MemoryError};

/// The serialized state of [SimulatedMemory].
///
/// The memory of all banks is serialized with [serialize_mem] and gzip compressed when the
/// `compression` feature is enabled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryImage {
    pub slots: Vec<u8>,
    pub populated: Vec<bool>,
    pub rom_banks: Vec<bool>,
    #[serde(serialize_with = "serialize_mem", deserialize_with = "deserialize_mem")]
    pub mem: Box<[u8]>
}

impl From<SimulatedMemory> for MemoryImage {
    fn from(memory: SimulatedMemory) -> Self {
        MemoryImage {
            slots: memory.slots.to_vec(),
            populated: memory.populated.to_vec(),
            rom_banks: memory.rom_banks.into_vec(),
            mem: memory.mem
        }
    }
}

/// Serializes like [MemoryImage] without copying the memory.
#[derive(Serialize)]
#[serde(rename = "MemoryImage", rename_all = "camelCase")]
struct MemoryImageRef<'a> {
    slots: &'a [u8],
    populated: &'a [bool],
    rom_banks: &'a [bool],
    #[serde(serialize_with = "serialize_mem")]
    mem: &'a Box<[u8]>
}

impl Serialize for SimulatedMemory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        MemoryImageRef {
            slots: &self.slots,
            populated: &self.populated,
            rom_banks: &self.rom_banks,
            mem: &self.mem
        }.serialize(serializer)
    }
}

impl TryFrom<MemoryImage> for SimulatedMemory {
    type Error = MemoryError;

    fn try_from(image: MemoryImage) -> Result<Self, Self::Error> {
        let MemoryImage { slots, populated, rom_banks, mem } = image;
        let mut memory = SimulatedMemory::new(slots.len(), rom_banks.len())?;
        if mem.len() != memory.store_size() {
            return Err(MemoryError::SnapshotSizeMismatch { expected: memory.store_size(), found: mem.len() })
        }
        if populated.len() != slots.len() {
            return Err(MemoryError::SnapshotSlotMismatch { expected: slots.len(), found: populated.len() })
        }
        for (slot, (&bank, &populated)) in slots.iter().zip(populated.iter()).enumerate() {
            memory.set_slot(slot, bank as usize)?;
            if !populated {
                memory.set_as_not_populated_slot(slot)?;
            }
        }
        memory.rom_banks = rom_banks.into_boxed_slice();
        memory.mem = mem;
        Ok(memory)
    }
}

pub fn serialize_mem<T, S>(mem: &T, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer,
          T: MemSerExt
{
    #[cfg(not(feature = "compression"))]
    {
        serialize_mem_slice(mem.as_slice(), serializer)
    }
    #[cfg(feature = "compression")]
    {
        let compr = mem.as_slice().iter().copied()
            .encode(&mut GZipEncoder::new(), Action::Finish)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ser::Error::custom)?;
        serialize_mem_slice(&compr, serializer)
    }
}

pub fn serialize_mem_slice<S>(slice: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer
{
    if serializer.is_human_readable() {
        serializer.serialize_str(&BASE64.encode(slice))
    }
    else {
        serializer.serialize_bytes(slice)
    }
}

pub fn deserialize_mem<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where T: MemDeExt,
          D: Deserializer<'de>
{
    if deserializer.is_human_readable() {
        Deserialize::deserialize(deserializer).and_then(|string: Cow<str>|
            BASE64.decode(&*string).map_err(de::Error::custom)
        )
        .and_then(T::try_from_byte_buf)
    }
    else {
        deserializer.deserialize_byte_buf(ByteBufVisitor)
                    .and_then(T::try_from_byte_buf)
    }
}

pub trait MemSerExt: Sized {
    fn as_slice(&self) -> &[u8];
}

pub trait MemDeExt: Sized {
    fn try_from_byte_buf<E: de::Error>(buf: Vec<u8>) -> Result<Self, E>;
}

impl MemSerExt for Box<[u8]> {
    fn as_slice(&self) -> &[u8] {
        &self[..]
    }
}

impl MemDeExt for Box<[u8]> {
    #[allow(unused_mut)]
    fn try_from_byte_buf<E: de::Error>(mut buf: Vec<u8>) -> Result<Self, E> {
        #[cfg(feature = "compression")]
        {
            if is_compressed(&buf) {
                buf = decompress(&buf)?;
            }
        }
        Ok(buf.into_boxed_slice())
    }
}

impl<'a, T: MemSerExt> MemSerExt for &'a T {
    fn as_slice(&self) -> &[u8] {
        T::as_slice(self)
    }
}

struct ByteBufVisitor;

impl<'de> Visitor<'de> for ByteBufVisitor {
    type Value = Vec<u8>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a byte array")
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(v)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(Vec::from(v))
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut buf = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(byte) = seq.next_element()? {
            buf.push(byte);
        }
        Ok(buf)
    }
}

#[cfg(feature = "compression")]
fn is_compressed(data: &[u8]) -> bool {
    matches!(data.get(0..3), Some(&[0x1f, 0x8b, 0x08]))
}

#[cfg(feature = "compression")]
fn decompress<T: FromIterator<u8>, E: de::Error>(data: &[u8]) -> Result<T, E> {
    data.iter().copied()
        .decode(&mut GZipDecoder::new())
        .collect::<Result<T, _>>()
        .map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKind;

    fn memory() -> SimulatedMemory {
        let mut mem = SimulatedMemory::new(8, 12).unwrap();
        mem.write_bank(11, &[0x3E;0x2000]).unwrap();
        mem.set_bank_kind(11, MemoryKind::Rom).unwrap();
        mem.set_slot(0, 11).unwrap();
        mem.set_slot(7, 9).unwrap();
        mem.set_as_not_populated_slot(5).unwrap();
        mem.write_block(0x4000, b"Hello world!");
        mem
    }

    fn assert_same(a: &SimulatedMemory, b: &SimulatedMemory) {
        assert_eq!(a.slots(), b.slots());
        assert_eq!(a.populated_slots(), b.populated_slots());
        assert_eq!(a.mem_ref(), b.mem_ref());
        for bank in 0..a.bank_count() {
            assert_eq!(a.bank_kind(bank), b.bank_kind(bank));
        }
    }

    #[test]
    fn memory_serde_json_works() {
        let mem = memory();
        let json = serde_json::to_string(&mem).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["mem"].is_string());
        assert_eq!(value["romBanks"].as_array().unwrap().len(), 12);
        let mem2: SimulatedMemory = serde_json::from_str(&json).unwrap();
        assert_same(&mem, &mem2);
        assert_eq!(mem2.read_block(0x4000, 12), b"Hello world!");
        assert_eq!(mem2.get_memory8(0xA000), 0xFF);
    }

    #[test]
    fn memory_serde_bincode_works() {
        let mem = memory();
        let bin = bincode::serialize(&mem).unwrap();
        let mem2: SimulatedMemory = bincode::deserialize(&bin).unwrap();
        assert_same(&mem, &mem2);
    }

    #[test]
    fn memory_serializes_as_image() {
        let mem = memory();
        let image = MemoryImage::from(mem.clone());
        assert_eq!(serde_json::to_value(&mem).unwrap(), serde_json::to_value(&image).unwrap());
        let bin = bincode::serialize(&mem).unwrap();
        assert_eq!(bin, bincode::serialize(&image).unwrap());
        let image2: MemoryImage = bincode::deserialize(&bin).unwrap();
        assert_eq!(image2, image);
    }

    #[test]
    fn memory_image_is_validated() {
        let image = MemoryImage::from(memory());
        let mut bad = image.clone();
        bad.rom_banks.pop();
        assert!(matches!(SimulatedMemory::try_from(bad),
                         Err(MemoryError::SnapshotSizeMismatch { expected: 0x16000, found: 0x18000 })));
        let mut bad = image.clone();
        bad.populated.pop();
        assert!(SimulatedMemory::try_from(bad).is_err());
        let mut bad = image.clone();
        bad.slots[3] = 12;
        assert!(matches!(SimulatedMemory::try_from(bad), Err(MemoryError::InvalidBankIndex(12))));
        let mut bad = image.clone();
        bad.slots.push(0);
        bad.populated.push(true);
        assert!(matches!(SimulatedMemory::try_from(bad), Err(MemoryError::InvalidSlotCount(9))));
        let json = serde_json::to_string(&image).unwrap()
                   .replace("\"mem\":\"", "\"mem\":\"AAAA");
        assert!(serde_json::from_str::<SimulatedMemory>(&json).is_err());
        assert!(SimulatedMemory::try_from(image).is_ok());
    }
}
