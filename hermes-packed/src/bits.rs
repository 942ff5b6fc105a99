//! Bit arithmetic shared by every codec: minimal widths, masks, zig-zag
//! transforms, and power-of-two size validation.

use crate::error::{Error, Result};

/// Number of bits needed to store `value`, at least 1.
///
/// The floor of 1 matches the packed formats: a sequence of zeros still
/// occupies one bit per value unless a higher layer elides the payload
/// entirely (block streams write a zero bit-width instead).
#[inline]
pub fn bits_required(value: u64) -> u32 {
    (64 - value.leading_zeros()).max(1)
}

/// Largest value representable with `bits_per_value` bits.
#[inline]
pub fn max_value(bits_per_value: u32) -> u64 {
    if bits_per_value == 64 {
        u64::MAX
    } else {
        (1u64 << bits_per_value) - 1
    }
}

/// Zigzag-encode an i64 so that small magnitudes stay small.
#[inline]
pub fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// Zigzag-decode a u64 back to i64.
#[inline]
pub fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// Validate a power-of-two block/page size within `[min, max]` and return
/// its shift (log2).
pub fn check_block_size(block_size: usize, min: usize, max: usize) -> Result<u32> {
    if block_size < min || block_size > max {
        return Err(Error::InvalidArgument(format!(
            "block size must be in [{}, {}], got {}",
            min, max, block_size
        )));
    }
    if !block_size.is_power_of_two() {
        return Err(Error::InvalidArgument(format!(
            "block size must be a power of two, got {}",
            block_size
        )));
    }
    Ok(block_size.trailing_zeros())
}

/// Number of `block_size` blocks needed to cover `size` values.
pub fn num_blocks(size: u64, block_size: usize) -> Result<usize> {
    let blocks = size / block_size as u64 + u64::from(size % block_size as u64 != 0);
    let covered = blocks.checked_mul(block_size as u64);
    match (usize::try_from(blocks), covered) {
        (Ok(blocks), Some(covered)) if covered >= size => Ok(blocks),
        _ => Err(Error::Capacity(format!(
            "size {} needs more than {} blocks of {}",
            size,
            usize::MAX,
            block_size
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_required() {
        assert_eq!(bits_required(0), 1);
        assert_eq!(bits_required(1), 1);
        assert_eq!(bits_required(2), 2);
        assert_eq!(bits_required(255), 8);
        assert_eq!(bits_required(256), 9);
        assert_eq!(bits_required(u64::MAX), 64);
        assert_eq!(bits_required(u64::MAX >> 1), 63);
    }

    #[test]
    fn test_max_value() {
        assert_eq!(max_value(1), 1);
        assert_eq!(max_value(8), 255);
        assert_eq!(max_value(63), u64::MAX >> 1);
        assert_eq!(max_value(64), u64::MAX);
    }

    #[test]
    fn test_zigzag_round_trip() {
        for v in [0i64, 1, -1, 63, -64, i64::MAX, i64::MIN, 123456789, -987654321] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }
        // small magnitudes map to small codes
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
    }

    #[test]
    fn test_check_block_size() {
        assert_eq!(check_block_size(64, 64, 1 << 27).unwrap(), 6);
        assert_eq!(check_block_size(1024, 64, 1 << 27).unwrap(), 10);
        assert!(check_block_size(63, 64, 1 << 27).is_err());
        assert!(check_block_size(96, 64, 1 << 27).is_err());
        assert!(check_block_size(1 << 28, 64, 1 << 27).is_err());
    }

    #[test]
    fn test_num_blocks() {
        assert_eq!(num_blocks(0, 64).unwrap(), 0);
        assert_eq!(num_blocks(1, 64).unwrap(), 1);
        assert_eq!(num_blocks(64, 64).unwrap(), 1);
        assert_eq!(num_blocks(65, 64).unwrap(), 2);
    }
}
