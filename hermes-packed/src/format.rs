//! Storage formats for packed integer arrays.
//!
//! Two layouts are available; both serialize as big-endian bytes:
//!
//! | Format            | ID | Description                                      |
//! |-------------------|----|--------------------------------------------------|
//! | Packed            |  0 | Continuous bitstream, values may straddle 64-bit |
//! |                   |    | word boundaries                                  |
//! | PackedSingleBlock |  1 | `64 / bits_per_value` values per word, filled    |
//! |                   |    | from the most-significant bits down              |
//!
//! `Packed` stores exactly `ceil(n * bits / 8)` bytes for any width in
//! `1..=64`. `PackedSingleBlock` only accepts widths that divide 64, so a
//! word always holds a whole number of values and a single shift + mask
//! recovers any of them; storage rounds up to whole 64-bit words.

use crate::error::{Error, Result};

// ── Format tag ───────────────────────────────────────────────────────────

/// Identifies how values are laid out in words and on the wire.
///
/// The numeric ID is for callers that persist array metadata themselves;
/// nothing in this crate writes it to a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Format {
    Packed = 0,
    PackedSingleBlock = 1,
}

impl Format {
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Packed),
            1 => Some(Self::PackedSingleBlock),
            _ => None,
        }
    }

    pub fn id(self) -> u32 {
        self as u32
    }

    /// Whether this format can store values of the given width.
    pub fn is_supported(self, bits_per_value: u32) -> bool {
        if bits_per_value == 0 || bits_per_value > 64 {
            return false;
        }
        match self {
            Format::Packed => true,
            Format::PackedSingleBlock => 64 % bits_per_value == 0,
        }
    }

    /// Like [`is_supported`](Self::is_supported), but says what was wrong.
    pub fn check_bits_per_value(self, bits_per_value: u32) -> Result<()> {
        if bits_per_value == 0 || bits_per_value > 64 {
            return Err(Error::InvalidBitsPerValue(bits_per_value));
        }
        if self == Format::PackedSingleBlock && 64 % bits_per_value != 0 {
            return Err(Error::Unsupported(format!(
                "single-block arrays need a width dividing 64, got {}",
                bits_per_value
            )));
        }
        Ok(())
    }

    /// Bytes occupied by `value_count` serialized values.
    pub fn byte_count(self, value_count: usize, bits_per_value: u32) -> u64 {
        debug_assert!(self.is_supported(bits_per_value));
        match self {
            Format::Packed => (value_count as u64 * bits_per_value as u64).div_ceil(8),
            Format::PackedSingleBlock => {
                8 * self.word_count(value_count, bits_per_value) as u64
            }
        }
    }

    /// 64-bit words needed to hold `value_count` values in memory.
    pub fn word_count(self, value_count: usize, bits_per_value: u32) -> usize {
        debug_assert!(self.is_supported(bits_per_value));
        match self {
            Format::Packed => self.byte_count(value_count, bits_per_value).div_ceil(8) as usize,
            Format::PackedSingleBlock => {
                let values_per_word = (64 / bits_per_value) as usize;
                value_count.div_ceil(values_per_word)
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_accepts_any_width() {
        for bits in 1..=64 {
            assert!(Format::Packed.is_supported(bits));
        }
        assert!(!Format::Packed.is_supported(0));
        assert!(!Format::Packed.is_supported(65));
    }

    #[test]
    fn single_block_needs_divisor_of_64() {
        for bits in [1, 2, 4, 8, 16, 32, 64] {
            assert!(Format::PackedSingleBlock.is_supported(bits));
        }
        for bits in [0, 3, 5, 7, 12, 21, 31, 63, 65] {
            assert!(!Format::PackedSingleBlock.is_supported(bits));
        }
    }

    #[test]
    fn check_reports_the_failure() {
        assert!(matches!(
            Format::Packed.check_bits_per_value(0),
            Err(Error::InvalidBitsPerValue(0))
        ));
        assert!(matches!(
            Format::PackedSingleBlock.check_bits_per_value(65),
            Err(Error::InvalidBitsPerValue(65))
        ));
        assert!(matches!(
            Format::PackedSingleBlock.check_bits_per_value(12),
            Err(Error::Unsupported(_))
        ));
        assert!(Format::Packed.check_bits_per_value(64).is_ok());
        assert!(Format::PackedSingleBlock.check_bits_per_value(32).is_ok());
    }

    #[test]
    fn packed_byte_count_rounds_up_bits() {
        assert_eq!(Format::Packed.byte_count(0, 13), 0);
        assert_eq!(Format::Packed.byte_count(1, 13), 2);
        assert_eq!(Format::Packed.byte_count(8, 13), 13);
        assert_eq!(Format::Packed.byte_count(65, 4), 33);
        assert_eq!(Format::Packed.byte_count(10, 64), 80);
    }

    #[test]
    fn single_block_byte_count_rounds_up_words() {
        assert_eq!(Format::PackedSingleBlock.byte_count(0, 4), 0);
        assert_eq!(Format::PackedSingleBlock.byte_count(16, 4), 8);
        assert_eq!(Format::PackedSingleBlock.byte_count(17, 4), 16);
        assert_eq!(Format::PackedSingleBlock.byte_count(65, 4), 40);
        assert_eq!(Format::PackedSingleBlock.byte_count(3, 64), 24);
    }

    #[test]
    fn word_count_covers_byte_count() {
        for bits in [1, 7, 13, 33, 64] {
            for count in [0usize, 1, 63, 64, 65, 1000] {
                let words = Format::Packed.word_count(count, bits) as u64;
                let bytes = Format::Packed.byte_count(count, bits);
                assert!(8 * words >= bytes);
                assert!(words == 0 || 8 * (words - 1) < bytes);
            }
        }
    }

    #[test]
    fn id_round_trip() {
        for format in [Format::Packed, Format::PackedSingleBlock] {
            assert_eq!(Format::from_id(format.id()), Some(format));
        }
        assert_eq!(Format::from_id(2), None);
    }
}
