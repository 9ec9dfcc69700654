//! Bit-exact persisted layout.
//!
//! Every bank starts with a 16-byte [`BankHeader`]:
//!
//! ```text
//! 0        4        8        12    14    16
//! ┌────────┬────────┬────────┬─────┬─────┐
//! │ magic1 │ magic2 │counter │ rsv │ crc │
//! └────────┴────────┴────────┴─────┴─────┘
//! ```
//!
//! followed by packed records, each a 16-byte [`DataHeader`] plus payload,
//! padded to the configured alignment:
//!
//! ```text
//! 0        4        8    10    12       16
//! ┌────────┬────────┬────┬─────┬────────┬──────────────┐
//! │ magic1 │ magic2 │ id │ crc │  size  │ payload ...  │
//! └────────┴────────┴────┴─────┴────────┴──────────────┘
//! ```
//!
//! All fields are little-endian. The record magic words are programmed
//! last and seal the record.

use crate::mfs::{
    BankState,
    crc::crc16,
    fields::{FieldReader, FieldWriter},
};

pub const BANK_MAGIC_1: u32 = 0xEC70_5ADE;
pub const BANK_MAGIC_2: u32 = 0xF033_9CC5;
pub const RECORD_MAGIC_1: u32 = 0x5FAE_45F0;
pub const RECORD_MAGIC_2: u32 = 0xF45F_AE48;

/// Size of the bank header in bytes.
pub const BANK_HEADER_SIZE: usize = 16;
/// Size of a record header in bytes.
pub const DATA_HEADER_SIZE: usize = 16;
/// Size of the sealing magic words at the start of a record header.
pub const MAGIC_SIZE: usize = 8;

/// Rounds `n` up to a multiple of `alignment` (a power of two).
#[inline]
pub fn align_up(n: u32, alignment: u32) -> Option<u32> {
    debug_assert!(alignment.is_power_of_two());
    let mask = alignment - 1;
    n.checked_add(mask).map(|v| v & !mask)
}

/// Validation header at the start of a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankHeader {
    pub counter: u32,
}

impl BankHeader {
    /// Serializes the header, filling the reserved field with the erased value.
    pub fn to_bytes(&self, erased_word: u32) -> [u8; BANK_HEADER_SIZE] {
        let mut raw = [0u8; BANK_HEADER_SIZE];
        let mut w = FieldWriter::new(&mut raw);
        w.write_u32_at(0, BANK_MAGIC_1);
        w.write_u32_at(4, BANK_MAGIC_2);
        w.write_u32_at(8, self.counter);
        w.write_u16_at(12, erased_word as u16);
        let crc = crc16(&raw[..BANK_HEADER_SIZE - 2]);
        FieldWriter::new(&mut raw).write_u16_at(14, crc);
        raw
    }

    /// Classifies raw header bytes.
    ///
    /// Returns the state and the counter field; the counter is only
    /// meaningful when the state is [`BankState::Ok`].
    pub fn classify(raw: &[u8; BANK_HEADER_SIZE], erased_word: u32) -> (BankState, u32) {
        let r = FieldReader::new(raw);
        let counter = r.read_u32_at(8);

        if r.words_equal(4, erased_word) {
            return (BankState::Erased, counter);
        }

        if r.read_u32_at(0) != BANK_MAGIC_1
            || r.read_u32_at(4) != BANK_MAGIC_2
            || counter == erased_word
            || r.read_u16_at(12) != erased_word as u16
        {
            return (BankState::Garbage, counter);
        }

        if crc16(&raw[..BANK_HEADER_SIZE - 2]) != r.read_u16_at(14) {
            return (BankState::Garbage, counter);
        }

        (BankState::Ok, counter)
    }
}

/// Header prefixing every record instance.
///
/// A `size` of zero marks an erased record (tombstone).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    pub id: u16,
    pub crc: u16,
    pub size: u32,
}

impl DataHeader {
    /// Tombstone header for `id`; its CRC is the CRC of an empty payload.
    pub fn tombstone(id: u16) -> Self {
        Self {
            id,
            crc: crc16(&[]),
            size: 0,
        }
    }

    /// Serializes the full, sealed header.
    pub fn to_bytes(&self) -> [u8; DATA_HEADER_SIZE] {
        let mut raw = [0u8; DATA_HEADER_SIZE];
        let mut w = FieldWriter::new(&mut raw);
        w.write_u32_at(0, RECORD_MAGIC_1);
        w.write_u32_at(4, RECORD_MAGIC_2);
        w.write_u16_at(8, self.id);
        w.write_u16_at(10, self.crc);
        w.write_u32_at(12, self.size);
        raw
    }

    /// The sealing magic words alone.
    pub fn magic_bytes() -> [u8; MAGIC_SIZE] {
        let mut raw = [0u8; MAGIC_SIZE];
        let mut w = FieldWriter::new(&mut raw);
        w.write_u32_at(0, RECORD_MAGIC_1);
        w.write_u32_at(4, RECORD_MAGIC_2);
        raw
    }
}

/// Result of decoding a record header during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawDataHeader {
    /// The id/crc/magic words all hold the erased value: write frontier.
    Erased,
    /// Magic words present.
    Sealed(DataHeader),
    /// Not erased, but the magic words do not match.
    Unsealed,
}

impl RawDataHeader {
    pub fn decode(raw: &[u8; DATA_HEADER_SIZE], erased_word: u32) -> Self {
        let r = FieldReader::new(raw);

        // The size word is not part of the erased check.
        if r.words_equal(3, erased_word) {
            return RawDataHeader::Erased;
        }

        if r.read_u32_at(0) != RECORD_MAGIC_1 || r.read_u32_at(4) != RECORD_MAGIC_2 {
            return RawDataHeader::Unsealed;
        }

        RawDataHeader::Sealed(DataHeader {
            id: r.read_u16_at(8),
            crc: r.read_u16_at(10),
            size: r.read_u32_at(12),
        })
    }
}
