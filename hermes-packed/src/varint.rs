//! Variable-length integer primitives for the block-packed wire format.
//!
//! Three encodings appear in block streams:
//!
//! | Name  | Payload | Encoding                                              |
//! |-------|---------|-------------------------------------------------------|
//! | vint  | u32     | 7-bit groups, low group first, 0x80 continuation      |
//! | vlong | u64     | same groups, capped at 9 bytes (9th byte is raw 8 bits)|
//! | zlong | i64     | zig-zag mapped, uncapped groups (10 bytes max)        |
//!
//! The vlong cap keeps the worst case one byte shorter than a plain LEB128
//! u64; the zlong terminal byte of a 10-byte encoding can only be 0 or 1,
//! anything else is reported as corruption.

use std::io::{self, Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::bits::{zigzag_decode, zigzag_encode};
use crate::error::{Error, Result};

/// Write a variable-length u32.
pub fn write_vint<W: Write + ?Sized>(writer: &mut W, mut value: u32) -> io::Result<()> {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            return writer.write_u8(byte);
        }
        writer.write_u8(byte | 0x80)?;
    }
}

/// Read a variable-length u32.
pub fn read_vint<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    let mut result = 0u32;
    let mut shift = 0;
    loop {
        let byte = reader.read_u8()?;
        result |= ((byte & 0x7F) as u32) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 32 {
            return Err(Error::Corruption("vint longer than 5 bytes".to_string()));
        }
    }
}

/// Write a u64 in 7-bit groups, at most 9 bytes: after 8 continuation
/// bytes the 9th byte carries the remaining 8 bits raw.
pub fn write_vlong<W: Write + ?Sized>(writer: &mut W, mut value: u64) -> io::Result<()> {
    let mut k = 0;
    while value & !0x7F != 0 && k < 8 {
        writer.write_u8(((value & 0x7F) | 0x80) as u8)?;
        value >>= 7;
        k += 1;
    }
    writer.write_u8(value as u8)
}

/// Inverse of [`write_vlong`]; a 9th byte is taken whole.
pub fn read_vlong<R: Read + ?Sized>(reader: &mut R) -> Result<u64> {
    let mut result = 0u64;
    for k in 0..8 {
        let byte = reader.read_u8()?;
        result |= ((byte & 0x7F) as u64) << (7 * k);
        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }
    let byte = reader.read_u8()?;
    Ok(result | ((byte as u64) << 56))
}

/// Zig-zag a signed value and write it in uncapped 7-bit groups.
pub fn write_zlong<W: Write + ?Sized>(writer: &mut W, value: i64) -> io::Result<()> {
    let mut value = zigzag_encode(value);
    while value & !0x7F != 0 {
        writer.write_u8(((value & 0x7F) | 0x80) as u8)?;
        value >>= 7;
    }
    writer.write_u8(value as u8)
}

/// Inverse of [`write_zlong`].
pub fn read_zlong<R: Read + ?Sized>(reader: &mut R) -> Result<i64> {
    let mut result = 0u64;
    for k in 0..9 {
        let byte = reader.read_u8()?;
        result |= ((byte & 0x7F) as u64) << (7 * k);
        if byte & 0x80 == 0 {
            return Ok(zigzag_decode(result));
        }
    }
    let byte = reader.read_u8()?;
    if byte > 1 {
        return Err(Error::Corruption(
            "zlong spans more than 64 bits".to_string(),
        ));
    }
    Ok(zigzag_decode(result | ((byte as u64) << 63)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vint_round_trip(value: u32) -> usize {
        let mut buf = Vec::new();
        write_vint(&mut buf, value).unwrap();
        let len = buf.len();
        assert_eq!(read_vint(&mut buf.as_slice()).unwrap(), value);
        len
    }

    fn vlong_round_trip(value: u64) -> usize {
        let mut buf = Vec::new();
        write_vlong(&mut buf, value).unwrap();
        let len = buf.len();
        assert_eq!(read_vlong(&mut buf.as_slice()).unwrap(), value);
        len
    }

    fn zlong_round_trip(value: i64) -> usize {
        let mut buf = Vec::new();
        write_zlong(&mut buf, value).unwrap();
        let len = buf.len();
        assert_eq!(read_zlong(&mut buf.as_slice()).unwrap(), value);
        len
    }

    #[test]
    fn test_vint() {
        assert_eq!(vint_round_trip(0), 1);
        assert_eq!(vint_round_trip(127), 1);
        assert_eq!(vint_round_trip(128), 2);
        assert_eq!(vint_round_trip(16383), 2);
        assert_eq!(vint_round_trip(16384), 3);
        assert_eq!(vint_round_trip(u32::MAX), 5);
    }

    #[test]
    fn test_vlong_cap() {
        assert_eq!(vlong_round_trip(0), 1);
        assert_eq!(vlong_round_trip(127), 1);
        assert_eq!(vlong_round_trip(128), 2);
        assert_eq!(vlong_round_trip(1 << 56), 9);
        assert_eq!(vlong_round_trip(u64::MAX), 9);
    }

    #[test]
    fn test_zlong() {
        assert_eq!(zlong_round_trip(0), 1);
        assert_eq!(zlong_round_trip(-1), 1);
        assert_eq!(zlong_round_trip(63), 1);
        assert_eq!(zlong_round_trip(64), 2);
        assert_eq!(zlong_round_trip(i64::MAX), 10);
        assert_eq!(zlong_round_trip(i64::MIN), 10);
    }

    #[test]
    fn test_zlong_overlong_rejected() {
        // 9 continuation bytes followed by a terminal byte above 1
        let mut buf = vec![0x80u8; 9];
        buf.push(2);
        assert!(matches!(
            read_zlong(&mut buf.as_slice()),
            Err(Error::Corruption(_))
        ));
    }

    #[test]
    fn test_vint_overlong_rejected() {
        let buf = vec![0x80u8; 6];
        assert!(matches!(
            read_vint(&mut buf.as_slice()),
            Err(Error::Corruption(_))
        ));
    }

    #[test]
    fn test_truncated_input() {
        let buf = vec![0x80u8; 2];
        assert!(read_vlong(&mut buf.as_slice()).is_err());
        assert!(read_zlong(&mut buf.as_slice()).is_err());
    }
}
