//! Bulk codecs that move whole iterations of values between packed blocks
//! and integer lanes.
//!
//! Every (format, width) pair gets one codec. An iteration is the smallest
//! run where blocks and values line up evenly, on the word side and on the
//! byte side independently:
//!
//! | bits | word blocks | word values | byte blocks | byte values |
//! |------|-------------|-------------|-------------|-------------|
//! | 1    | 1           | 64          | 1           | 8           |
//! | 12   | 3           | 16          | 3           | 2           |
//! | 13   | 13          | 64          | 13          | 8           |
//! | 64   | 1           | 1           | 8           | 1           |
//!
//! Byte-aligned widths and the sub-byte powers of two decode through
//! dedicated shift/mask paths; every other width goes through a generic
//! accumulator that carries bits across block boundaries. The byte form is
//! always the big-endian serialization of the word form, so data written
//! through one can be read back through the other.

use byteorder::{BigEndian, ByteOrder};

use crate::bits::max_value;
use crate::error::{Error, Result};
use crate::format::Format;

// ── Codec geometry ───────────────────────────────────────────────────────

/// Encoder/decoder for one format and bit-width, operating on whole
/// iterations.
///
/// Callers size their buffers as a multiple of the per-iteration counts and
/// hand matching block/value slices to the codec. Slices may be longer than
/// one call needs; only the leading `iterations` worth is touched.
#[derive(Debug, Clone, Copy)]
pub struct BulkCodec {
    format: Format,
    bits_per_value: u32,
    mask: u64,
    word_block_count: usize,
    word_value_count: usize,
    byte_block_count: usize,
    byte_value_count: usize,
}

impl BulkCodec {
    pub fn of(format: Format, bits_per_value: u32) -> Result<Self> {
        format.check_bits_per_value(bits_per_value)?;
        Ok(Self::build(format, bits_per_value))
    }

    /// Packed-format codec for an already validated width.
    pub(crate) fn packed(bits_per_value: u32) -> Self {
        debug_assert!((1..=64).contains(&bits_per_value));
        Self::build(Format::Packed, bits_per_value)
    }

    fn build(format: Format, bits_per_value: u32) -> Self {
        let (word_block_count, word_value_count, byte_block_count, byte_value_count) =
            match format {
                Format::Packed => {
                    // Strip factors of two so that `word_block_count` words
                    // hold a whole number of values.
                    let mut word_blocks = bits_per_value as usize;
                    while word_blocks & 1 == 0 {
                        word_blocks >>= 1;
                    }
                    let word_values = 64 * word_blocks / bits_per_value as usize;
                    let mut byte_blocks = 8 * word_blocks;
                    let mut byte_values = word_values;
                    while byte_blocks & 1 == 0 && byte_values & 1 == 0 {
                        byte_blocks >>= 1;
                        byte_values >>= 1;
                    }
                    (word_blocks, word_values, byte_blocks, byte_values)
                }
                Format::PackedSingleBlock => {
                    let values_per_word = (64 / bits_per_value) as usize;
                    (1, values_per_word, 8, values_per_word)
                }
            };
        BulkCodec {
            format,
            bits_per_value,
            mask: max_value(bits_per_value),
            word_block_count,
            word_value_count,
            byte_block_count,
            byte_value_count,
        }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn bits_per_value(&self) -> u32 {
        self.bits_per_value
    }

    /// 64-bit blocks consumed/produced per iteration.
    pub fn word_block_count(&self) -> usize {
        self.word_block_count
    }

    /// Values consumed/produced per word-form iteration.
    pub fn word_value_count(&self) -> usize {
        self.word_value_count
    }

    /// Byte blocks consumed/produced per iteration.
    pub fn byte_block_count(&self) -> usize {
        self.byte_block_count
    }

    /// Values consumed/produced per byte-form iteration.
    pub fn byte_value_count(&self) -> usize {
        self.byte_value_count
    }

    /// How many iterations fit a `ram_budget` of bytes, counting one byte
    /// block plus one 64-bit value lane per value.
    ///
    /// At least 1, and no more than it takes to cover `value_count`.
    pub fn compute_iterations(&self, value_count: usize, ram_budget: usize) -> usize {
        let iterations = ram_budget / (self.byte_block_count + 8 * self.byte_value_count);
        if iterations == 0 {
            1
        } else if (iterations - 1) * self.byte_value_count >= value_count {
            value_count.div_ceil(self.byte_value_count)
        } else {
            iterations
        }
    }

    // ── Word-oriented form ───────────────────────────────────────────────

    pub fn decode_words(&self, blocks: &[u64], values: &mut [u64], iterations: usize) {
        debug_assert!(blocks.len() >= iterations * self.word_block_count);
        debug_assert!(values.len() >= iterations * self.word_value_count);
        match self.format {
            Format::Packed => self.decode_words_packed(blocks, values, iterations),
            Format::PackedSingleBlock => self.decode_words_single(blocks, values, iterations),
        }
    }

    pub fn encode_words(&self, values: &[u64], blocks: &mut [u64], iterations: usize) {
        debug_assert!(values.len() >= iterations * self.word_value_count);
        debug_assert!(blocks.len() >= iterations * self.word_block_count);
        match self.format {
            Format::Packed => self.encode_words_packed(values, blocks, iterations),
            Format::PackedSingleBlock => self.encode_words_single(values, blocks, iterations),
        }
    }

    fn decode_words_packed(&self, blocks: &[u64], values: &mut [u64], iterations: usize) {
        let bits = self.bits_per_value;
        let mut block = 0;
        let mut bits_left = 64u32;
        for value in values[..iterations * self.word_value_count].iter_mut() {
            if bits_left >= bits {
                bits_left -= bits;
                *value = (blocks[block] >> bits_left) & self.mask;
                if bits_left == 0 {
                    block += 1;
                    bits_left = 64;
                }
            } else {
                // Value straddles two blocks: `bits_left` high bits come
                // from the tail of the current one, the rest from the head
                // of the next.
                let carry = bits - bits_left;
                let high = (blocks[block] & ((1 << bits_left) - 1)) << carry;
                block += 1;
                bits_left = 64 - carry;
                *value = high | (blocks[block] >> bits_left);
            }
        }
    }

    fn encode_words_packed(&self, values: &[u64], blocks: &mut [u64], iterations: usize) {
        let bits = self.bits_per_value;
        let mut block = 0;
        let mut next_block = 0u64;
        let mut bits_left = 64u32;
        for &value in values[..iterations * self.word_value_count].iter() {
            debug_assert!(value <= self.mask);
            if bits_left > bits {
                bits_left -= bits;
                next_block |= value << bits_left;
            } else if bits_left == bits {
                blocks[block] = next_block | value;
                block += 1;
                next_block = 0;
                bits_left = 64;
            } else {
                let carry = bits - bits_left;
                blocks[block] = next_block | (value >> carry);
                block += 1;
                bits_left = 64 - carry;
                next_block = (value & ((1 << carry) - 1)) << bits_left;
            }
        }
        // An iteration always ends on a block boundary.
        debug_assert_eq!(bits_left, 64);
    }

    fn decode_words_single(&self, blocks: &[u64], values: &mut [u64], iterations: usize) {
        let bits = self.bits_per_value;
        let per_word = self.word_value_count as u32;
        let mut v = 0;
        for &word in blocks[..iterations].iter() {
            for j in 0..per_word {
                values[v] = (word >> (64 - (j + 1) * bits)) & self.mask;
                v += 1;
            }
        }
    }

    fn encode_words_single(&self, values: &[u64], blocks: &mut [u64], iterations: usize) {
        let bits = self.bits_per_value;
        let per_word = self.word_value_count as u32;
        let mut v = 0;
        for block in blocks[..iterations].iter_mut() {
            let mut word = 0u64;
            for j in 0..per_word {
                debug_assert!(values[v] <= self.mask);
                word |= values[v] << (64 - (j + 1) * bits);
                v += 1;
            }
            *block = word;
        }
    }

    // ── Byte-oriented form ───────────────────────────────────────────────

    pub fn decode_bytes(&self, blocks: &[u8], values: &mut [u64], iterations: usize) {
        debug_assert!(blocks.len() >= iterations * self.byte_block_count);
        debug_assert!(values.len() >= iterations * self.byte_value_count);
        match self.format {
            Format::Packed => self.decode_bytes_packed(blocks, values, iterations),
            Format::PackedSingleBlock => self.decode_bytes_single(blocks, values, iterations),
        }
    }

    pub fn encode_bytes(&self, values: &[u64], blocks: &mut [u8], iterations: usize) {
        debug_assert!(values.len() >= iterations * self.byte_value_count);
        debug_assert!(blocks.len() >= iterations * self.byte_block_count);
        match self.format {
            Format::Packed => self.encode_bytes_packed(values, blocks, iterations),
            Format::PackedSingleBlock => self.encode_bytes_single(values, blocks, iterations),
        }
    }

    /// Decodes byte blocks into 32-bit lanes.
    ///
    /// Only widths up to 32 fit; wider codecs must decode through the
    /// 64-bit destination form.
    pub fn decode_bytes_u32(
        &self,
        blocks: &[u8],
        values: &mut [u32],
        iterations: usize,
    ) -> Result<()> {
        if self.bits_per_value > 32 {
            return Err(Error::Unsupported(format!(
                "cannot decode {} bits per value into 32-bit lanes",
                self.bits_per_value
            )));
        }
        debug_assert!(blocks.len() >= iterations * self.byte_block_count);
        debug_assert!(values.len() >= iterations * self.byte_value_count);
        match self.format {
            Format::Packed => self.decode_bytes_u32_packed(blocks, values, iterations),
            Format::PackedSingleBlock => {
                let bits = self.bits_per_value;
                let per_word = self.byte_value_count as u32;
                let mut v = 0;
                for chunk in blocks[..8 * iterations].chunks_exact(8) {
                    let word = BigEndian::read_u64(chunk);
                    for j in 0..per_word {
                        values[v] = ((word >> (64 - (j + 1) * bits)) & self.mask) as u32;
                        v += 1;
                    }
                }
            }
        }
        Ok(())
    }

    fn decode_bytes_packed(&self, blocks: &[u8], values: &mut [u64], iterations: usize) {
        match self.bits_per_value {
            1 => {
                let mut v = 0;
                for &byte in blocks[..iterations * self.byte_block_count].iter() {
                    let b = byte as u64;
                    values[v] = (b >> 7) & 1;
                    values[v + 1] = (b >> 6) & 1;
                    values[v + 2] = (b >> 5) & 1;
                    values[v + 3] = (b >> 4) & 1;
                    values[v + 4] = (b >> 3) & 1;
                    values[v + 5] = (b >> 2) & 1;
                    values[v + 6] = (b >> 1) & 1;
                    values[v + 7] = b & 1;
                    v += 8;
                }
            }
            2 => {
                let mut v = 0;
                for &byte in blocks[..iterations * self.byte_block_count].iter() {
                    let b = byte as u64;
                    values[v] = (b >> 6) & 3;
                    values[v + 1] = (b >> 4) & 3;
                    values[v + 2] = (b >> 2) & 3;
                    values[v + 3] = b & 3;
                    v += 4;
                }
            }
            4 => {
                let mut v = 0;
                for &byte in blocks[..iterations * self.byte_block_count].iter() {
                    let b = byte as u64;
                    values[v] = b >> 4;
                    values[v + 1] = b & 15;
                    v += 2;
                }
            }
            bits if bits % 8 == 0 => {
                let width = (bits / 8) as usize;
                for (i, value) in values[..iterations * self.byte_value_count]
                    .iter_mut()
                    .enumerate()
                {
                    *value = BigEndian::read_uint(&blocks[i * width..(i + 1) * width], width);
                }
            }
            _ => self.decode_bytes_generic(blocks, values, iterations),
        }
    }

    fn decode_bytes_generic(&self, blocks: &[u8], values: &mut [u64], iterations: usize) {
        let bits = self.bits_per_value;
        let mut next_value = 0u64;
        let mut bits_pending = bits;
        let mut v = 0;
        for &byte in blocks[..iterations * self.byte_block_count].iter() {
            let byte = byte as u64;
            if bits_pending > 8 {
                // The whole byte belongs to the value under construction.
                bits_pending -= 8;
                next_value |= byte << bits_pending;
            } else {
                // This byte completes a value, may contain whole values,
                // and its tail starts the next one.
                let mut spare = 8 - bits_pending;
                values[v] = next_value | (byte >> spare);
                v += 1;
                while spare >= bits {
                    spare -= bits;
                    values[v] = (byte >> spare) & self.mask;
                    v += 1;
                }
                bits_pending = bits - spare;
                next_value = if spare == 0 {
                    0
                } else {
                    (byte & ((1 << spare) - 1)) << bits_pending
                };
            }
        }
        debug_assert_eq!(v, iterations * self.byte_value_count);
    }

    fn decode_bytes_u32_packed(&self, blocks: &[u8], values: &mut [u32], iterations: usize) {
        let bits = self.bits_per_value;
        let mut next_value = 0u64;
        let mut bits_pending = bits;
        let mut v = 0;
        for &byte in blocks[..iterations * self.byte_block_count].iter() {
            let byte = byte as u64;
            if bits_pending > 8 {
                bits_pending -= 8;
                next_value |= byte << bits_pending;
            } else {
                let mut spare = 8 - bits_pending;
                values[v] = (next_value | (byte >> spare)) as u32;
                v += 1;
                while spare >= bits {
                    spare -= bits;
                    values[v] = ((byte >> spare) & self.mask) as u32;
                    v += 1;
                }
                bits_pending = bits - spare;
                next_value = if spare == 0 {
                    0
                } else {
                    (byte & ((1 << spare) - 1)) << bits_pending
                };
            }
        }
        debug_assert_eq!(v, iterations * self.byte_value_count);
    }

    fn encode_bytes_packed(&self, values: &[u64], blocks: &mut [u8], iterations: usize) {
        let bits = self.bits_per_value;
        if bits % 8 == 0 {
            let width = (bits / 8) as usize;
            for (i, &value) in values[..iterations * self.byte_value_count].iter().enumerate() {
                BigEndian::write_uint(&mut blocks[i * width..(i + 1) * width], value, width);
            }
            return;
        }
        let mut next_block = 0u64;
        let mut bits_left = 8u32;
        let mut b = 0;
        for &value in values[..iterations * self.byte_value_count].iter() {
            debug_assert!(value <= self.mask);
            if bits < bits_left {
                next_block |= value << (bits_left - bits);
                bits_left -= bits;
            } else {
                let mut spare = bits - bits_left;
                blocks[b] = (next_block | (value >> spare)) as u8;
                b += 1;
                while spare >= 8 {
                    spare -= 8;
                    blocks[b] = (value >> spare) as u8;
                    b += 1;
                }
                bits_left = 8 - spare;
                next_block = (value & ((1 << spare) - 1)) << bits_left;
            }
        }
        debug_assert_eq!(bits_left, 8);
    }

    fn decode_bytes_single(&self, blocks: &[u8], values: &mut [u64], iterations: usize) {
        let bits = self.bits_per_value;
        let per_word = self.byte_value_count as u32;
        let mut v = 0;
        for chunk in blocks[..8 * iterations].chunks_exact(8) {
            let word = BigEndian::read_u64(chunk);
            for j in 0..per_word {
                values[v] = (word >> (64 - (j + 1) * bits)) & self.mask;
                v += 1;
            }
        }
    }

    fn encode_bytes_single(&self, values: &[u64], blocks: &mut [u8], iterations: usize) {
        let bits = self.bits_per_value;
        let per_word = self.byte_value_count as u32;
        let mut v = 0;
        for chunk in blocks[..8 * iterations].chunks_exact_mut(8) {
            let mut word = 0u64;
            for j in 0..per_word {
                debug_assert!(values[v] <= self.mask);
                word |= values[v] << (64 - (j + 1) * bits);
                v += 1;
            }
            BigEndian::write_u64(chunk, word);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
