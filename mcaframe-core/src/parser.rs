//! Low-level field access for the 14-byte record layout.
//!
//! Records are packed little-endian with no padding between fields.

use crate::types::{RawEventRecord, RECORD_SIZE};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::{self, Write};

// ============================================================================
// Record layout
// Bytes: [0..8] trigger_time u64 | [8..10] energy i16 | [10..14] extras u32
// ============================================================================

const TRIGGER_TIME: std::ops::Range<usize> = 0..8;
const ENERGY: std::ops::Range<usize> = 8..10;
const EXTRAS: std::ops::Range<usize> = 10..14;

/// Extracts the trigger time from an encoded record.
#[inline]
pub fn get_trigger_time(record: &[u8]) -> u64 {
    LittleEndian::read_u64(&record[TRIGGER_TIME])
}

/// Extracts the raw energy from an encoded record.
#[inline]
pub fn get_energy(record: &[u8]) -> i16 {
    LittleEndian::read_i16(&record[ENERGY])
}

/// Extracts the extras flags from an encoded record.
#[inline]
pub fn get_extras(record: &[u8]) -> u32 {
    LittleEndian::read_u32(&record[EXTRAS])
}

/// Parses one record.
///
/// `record` must hold at least [`RECORD_SIZE`] bytes; callers slice with
/// `chunks_exact(RECORD_SIZE)`.
#[inline]
pub fn parse_record(record: &[u8]) -> RawEventRecord {
    RawEventRecord {
        trigger_time: get_trigger_time(record),
        energy: get_energy(record),
        extras: get_extras(record),
    }
}

/// Encodes `record` into the first [`RECORD_SIZE`] bytes of `out`.
#[inline]
pub fn encode_record(record: &RawEventRecord, out: &mut [u8; RECORD_SIZE]) {
    LittleEndian::write_u64(&mut out[TRIGGER_TIME], record.trigger_time);
    LittleEndian::write_i16(&mut out[ENERGY], record.energy);
    LittleEndian::write_u32(&mut out[EXTRAS], record.extras);
}

/// Writes `record` to a byte sink in wire order.
pub fn write_record<W: Write>(writer: &mut W, record: &RawEventRecord) -> io::Result<()> {
    writer.write_u64::<LittleEndian>(record.trigger_time)?;
    writer.write_i16::<LittleEndian>(record.energy)?;
    writer.write_u32::<LittleEndian>(record.extras)?;
    Ok(())
}

/// Encodes a sequence of records into a freshly allocated buffer.
pub fn encode_records<'a, I>(records: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a RawEventRecord>,
{
    let iter = records.into_iter();
    let mut buf = Vec::with_capacity(iter.size_hint().0 * RECORD_SIZE);
    for record in iter {
        buf.extend_from_slice(&record.encode());
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_offsets() {
        let bytes: [u8; RECORD_SIZE] = [
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, // trigger_time
            0xF4, 0x01, // energy = 500
            0x08, 0x00, 0x00, 0x00, // extras = 0x8
        ];
        assert_eq!(get_trigger_time(&bytes), 0x0807_0605_0403_0201);
        assert_eq!(get_energy(&bytes), 500);
        assert_eq!(get_extras(&bytes), 0x8);
    }

    #[test]
    fn test_negative_energy() {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[8] = 0xFF;
        bytes[9] = 0xFF;
        assert_eq!(get_energy(&bytes), -1);
    }

    #[test]
    fn test_encode_matches_writer() {
        let record = RawEventRecord::new(123_456_789, -42, 0x8000);
        let mut written = Vec::new();
        write_record(&mut written, &record).unwrap();
        assert_eq!(written.as_slice(), &record.encode()[..]);
        assert_eq!(parse_record(&written), record);
    }

    #[test]
    fn test_encode_records_length() {
        let records = [RawEventRecord::marker(1), RawEventRecord::new(2, 3, 0)];
        let buf = encode_records(&records);
        assert_eq!(buf.len(), 2 * RECORD_SIZE);
        assert_eq!(parse_record(&buf[RECORD_SIZE..]), records[1]);
    }
}
