//! Stateless random-access readers over packed byte regions.
//!
//! Both readers decode `get(index)` straight from an immutable byte region
//! with no per-call state, so a shared region can serve concurrent reads.
//!
//! [`DirectReader`] handles a hand-picked set of widths where every value
//! can be fetched with one fixed-size big-endian read plus a shift and a
//! mask. [`DirectPackedReader`] handles every width from 1 to 64 by
//! composing a one-to-nine byte window around the value's bit span. Either
//! works over a region of exactly `ceil(n * bits / 8)` bytes, as produced
//! by the streaming writer: fixed windows that would poke past the end
//! fall back to a zero-padded tail read.

use byteorder::{BigEndian, ByteOrder};

use crate::bits::max_value;
use crate::bytes::OwnedBytes;
use crate::error::{Error, Result};
use crate::format::Format;

/// Widths [`DirectReader`] can decode with a single fixed-size read.
pub const SUPPORTED_BITS_PER_VALUE: [u32; 14] =
    [1, 2, 4, 8, 12, 16, 20, 24, 28, 32, 40, 48, 56, 64];

// ── Fixed-window reader ──────────────────────────────────────────────────

/// Random-access reader for the enumerated widths.
pub struct DirectReader {
    bytes: OwnedBytes,
    value_count: usize,
    bits_per_value: u32,
}

impl DirectReader {
    pub fn new(bytes: OwnedBytes, value_count: usize, bits_per_value: u32) -> Result<Self> {
        if !SUPPORTED_BITS_PER_VALUE.contains(&bits_per_value) {
            return Err(Error::Unsupported(format!(
                "direct reader does not support {} bits per value",
                bits_per_value
            )));
        }
        Ok(DirectReader {
            bytes,
            value_count,
            bits_per_value,
        })
    }

    /// Smallest supported width at or above `bits`.
    pub fn round_bits(bits: u32) -> u32 {
        debug_assert!((1..=64).contains(&bits));
        for &candidate in SUPPORTED_BITS_PER_VALUE.iter() {
            if candidate >= bits {
                return candidate;
            }
        }
        64
    }

    pub fn len(&self) -> usize {
        self.value_count
    }

    pub fn is_empty(&self) -> bool {
        self.value_count == 0
    }

    pub fn bits_per_value(&self) -> u32 {
        self.bits_per_value
    }

    pub fn get(&self, index: usize) -> u64 {
        debug_assert!(index < self.value_count);
        match self.bits_per_value {
            1 => (self.byte(index >> 3) >> (7 - (index & 7) as u32)) & 0x1,
            2 => (self.byte(index >> 2) >> ((3 - (index & 3) as u32) << 1)) & 0x3,
            4 => (self.byte(index >> 1) >> ((((index + 1) & 1) as u32) << 2)) & 0xf,
            8 => self.byte(index),
            12 => {
                let shift = (((index + 1) & 1) as u32) << 2;
                (self.window(index * 12 >> 3, 2) >> shift) & 0xfff
            }
            16 => self.window(index * 2, 2),
            20 => {
                let shift = 8 + ((((index + 1) & 1) as u32) << 2);
                (self.window(index * 20 >> 3, 4) >> shift) & 0xfffff
            }
            24 => self.window(index * 3, 3),
            28 => {
                let shift = (((index + 1) & 1) as u32) << 2;
                (self.window(index * 28 >> 3, 4) >> shift) & 0xfff_ffff
            }
            32 => self.window(index * 4, 4),
            40 => self.window(index * 5, 5),
            48 => self.window(index * 6, 6),
            56 => self.window(index * 7, 7),
            64 => self.window(index * 8, 8),
            _ => unreachable!(),
        }
    }

    fn byte(&self, pos: usize) -> u64 {
        self.bytes.as_slice()[pos] as u64
    }

    /// Big-endian read of `len` bytes at `pos`, zero-padding past the end
    /// of the region.
    fn window(&self, pos: usize, len: usize) -> u64 {
        let data = self.bytes.as_slice();
        if pos + len <= data.len() {
            BigEndian::read_uint(&data[pos..pos + len], len)
        } else {
            let mut tail = [0u8; 8];
            tail[..data.len() - pos].copy_from_slice(&data[pos..]);
            BigEndian::read_uint(&tail[..len], len)
        }
    }
}

// ── Any-width reader ─────────────────────────────────────────────────────

/// Random-access reader for any width from 1 to 64.
///
/// Slower than [`DirectReader`] on the widths both support, since the
/// window geometry is computed per call instead of being baked into a
/// dedicated arm.
pub struct DirectPackedReader {
    bytes: OwnedBytes,
    value_count: usize,
    bits_per_value: u32,
    mask: u64,
}

impl DirectPackedReader {
    pub fn new(bytes: OwnedBytes, value_count: usize, bits_per_value: u32) -> Result<Self> {
        Format::Packed.check_bits_per_value(bits_per_value)?;
        Ok(DirectPackedReader {
            mask: max_value(bits_per_value),
            bytes,
            value_count,
            bits_per_value,
        })
    }

    pub fn len(&self) -> usize {
        self.value_count
    }

    pub fn is_empty(&self) -> bool {
        self.value_count == 0
    }

    pub fn bits_per_value(&self) -> u32 {
        self.bits_per_value
    }

    pub fn get(&self, index: usize) -> u64 {
        debug_assert!(index < self.value_count);
        let major_bit = index as u64 * self.bits_per_value as u64;
        let byte_pos = (major_bit >> 3) as usize;
        let bit_pos = (major_bit & 7) as u32;
        // Smallest whole-byte window covering the value's bit span.
        let rounded = (bit_pos + self.bits_per_value + 7) & !7;
        let shift = rounded - bit_pos - self.bits_per_value;
        let data = self.bytes.as_slice();
        let window = (rounded >> 3) as usize;
        if window <= 8 {
            (BigEndian::read_uint(&data[byte_pos..byte_pos + window], window) >> shift) & self.mask
        } else {
            // Nine bytes: an eight-byte read plus the trailing byte.
            let high = BigEndian::read_u64(&data[byte_pos..byte_pos + 8]);
            let low = data[byte_pos + 8] as u64;
            ((high << (8 - shift)) | (low >> shift)) & self.mask
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
