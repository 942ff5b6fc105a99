//! Dense mutable array of fixed-width packed values.
//!
//! Values live in a `Vec<u64>` as one continuous bitstream, high bits
//! first, so a value may straddle two words. `get`/`set` do the two-word
//! shift dance directly; the range forms hand whole aligned iterations to
//! the bulk codec and fall back to scalar access at the edges.

use byteorder::{BigEndian, ByteOrder};

use crate::bits::max_value;
use crate::bulk::BulkCodec;
use crate::error::Result;
use crate::format::Format;

/// Common surface of the mutable packed arrays.
///
/// [`copy_values`] and the paged wrappers work against this so that
/// fixed-width and auto-widening storage interchange freely.
pub trait Mutable {
    fn len(&self) -> usize;
    fn bits_per_value(&self) -> u32;
    fn get(&self, index: usize) -> u64;
    fn set(&mut self, index: usize, value: u64);
    /// Reads up to `dest.len()` values at `index`; returns how many, at
    /// least one.
    fn get_range(&self, index: usize, dest: &mut [u64]) -> usize;
    /// Writes up to `values.len()` values at `index`; returns how many, at
    /// least one.
    fn set_range(&mut self, index: usize, values: &[u64]) -> usize;
}

/// Fixed-width mutable packed array in the continuous-bitstream layout.
#[derive(Debug, Clone)]
pub struct PackedArray {
    blocks: Vec<u64>,
    value_count: usize,
    bits_per_value: u32,
    mask: u64,
    codec: BulkCodec,
}

impl PackedArray {
    /// Zero-filled array of `value_count` values of `bits_per_value` bits.
    pub fn new(value_count: usize, bits_per_value: u32) -> Result<Self> {
        Format::Packed.check_bits_per_value(bits_per_value)?;
        Ok(Self::with_width(value_count, bits_per_value))
    }

    /// Infallible form for widths the caller has already validated.
    pub(crate) fn with_width(value_count: usize, bits_per_value: u32) -> Self {
        let codec = BulkCodec::packed(bits_per_value);
        let words = Format::Packed.word_count(value_count, bits_per_value);
        PackedArray {
            blocks: vec![0; words],
            value_count,
            bits_per_value,
            mask: max_value(bits_per_value),
            codec,
        }
    }

    /// Builds an array over a serialized payload of exactly
    /// `Format::Packed.byte_count(value_count, bits_per_value)` bytes.
    ///
    /// Words are big-endian; a trailing partial word is left-aligned so the
    /// in-memory layout matches what the streaming writer produced.
    pub(crate) fn from_packed_bytes(payload: &[u8], value_count: usize, bits_per_value: u32) -> Self {
        debug_assert_eq!(
            payload.len() as u64,
            Format::Packed.byte_count(value_count, bits_per_value)
        );
        let mut array = Self::with_width(value_count, bits_per_value);
        let mut chunks = payload.chunks_exact(8);
        for (word, chunk) in array.blocks.iter_mut().zip(&mut chunks) {
            *word = BigEndian::read_u64(chunk);
        }
        let tail = chunks.remainder();
        if !tail.is_empty() {
            let mut last = [0u8; 8];
            last[..tail.len()].copy_from_slice(tail);
            if let Some(word) = array.blocks.last_mut() {
                *word = BigEndian::read_u64(&last);
            }
        }
        array
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
        let word = (major_bit >> 6) as usize;
        // Bits of the value that spill into the following word.
        let end_bits = (major_bit & 63) as i64 + self.bits_per_value as i64 - 64;
        if end_bits <= 0 {
            (self.blocks[word] >> -end_bits) & self.mask
        } else {
            ((self.blocks[word] << end_bits) | (self.blocks[word + 1] >> (64 - end_bits)))
                & self.mask
        }
    }

    pub fn set(&mut self, index: usize, value: u64) {
        debug_assert!(index < self.value_count);
        debug_assert!(value <= self.mask);
        let major_bit = index as u64 * self.bits_per_value as u64;
        let word = (major_bit >> 6) as usize;
        let end_bits = (major_bit & 63) as i64 + self.bits_per_value as i64 - 64;
        if end_bits <= 0 {
            self.blocks[word] =
                self.blocks[word] & !(self.mask << -end_bits) | (value << -end_bits);
        } else {
            self.blocks[word] =
                self.blocks[word] & !(self.mask >> end_bits) | (value >> end_bits);
            self.blocks[word + 1] = self.blocks[word + 1] & (u64::MAX >> end_bits)
                | (value << (64 - end_bits));
        }
    }

    /// Reads up to `dest.len()` values starting at `index` into `dest`.
    ///
    /// Returns how many were read, at least one; callers loop to cover a
    /// full range. The aligned middle is bulk-decoded.
    pub fn get_range(&self, index: usize, dest: &mut [u64]) -> usize {
        debug_assert!(index < self.value_count);
        debug_assert!(!dest.is_empty());
        let len = dest.len().min(self.value_count - index);
        let dest = &mut dest[..len];

        let per_iteration = self.codec.word_value_count();
        let misalign = index % per_iteration;
        let mut index = index;
        let mut copied = 0;
        if misalign != 0 {
            let head = (per_iteration - misalign).min(len);
            for slot in dest[..head].iter_mut() {
                *slot = self.get(index);
                index += 1;
            }
            copied = head;
            if copied == len {
                return copied;
            }
        }
        debug_assert_eq!(index % per_iteration, 0);
        let iterations = (len - copied) / per_iteration;
        if iterations > 0 {
            let word = index * self.bits_per_value as usize / 64;
            self.codec
                .decode_words(&self.blocks[word..], &mut dest[copied..], iterations);
            copied += iterations * per_iteration;
            index += iterations * per_iteration;
        }
        if copied > 0 {
            copied
        } else {
            // Aligned start shorter than one iteration.
            for slot in dest.iter_mut() {
                *slot = self.get(index);
                index += 1;
            }
            len
        }
    }

    /// Writes up to `values.len()` values starting at `index`.
    ///
    /// Returns how many were written, at least one; callers loop to cover
    /// a full range. The aligned middle is bulk-encoded.
    pub fn set_range(&mut self, index: usize, values: &[u64]) -> usize {
        debug_assert!(index < self.value_count);
        debug_assert!(!values.is_empty());
        let len = values.len().min(self.value_count - index);
        let values = &values[..len];

        let per_iteration = self.codec.word_value_count();
        let misalign = index % per_iteration;
        let mut index = index;
        let mut consumed = 0;
        if misalign != 0 {
            let head = (per_iteration - misalign).min(len);
            for &value in values[..head].iter() {
                self.set(index, value);
                index += 1;
            }
            consumed = head;
            if consumed == len {
                return consumed;
            }
        }
        debug_assert_eq!(index % per_iteration, 0);
        let iterations = (len - consumed) / per_iteration;
        if iterations > 0 {
            let word = index * self.bits_per_value as usize / 64;
            self.codec
                .encode_words(&values[consumed..], &mut self.blocks[word..], iterations);
            consumed += iterations * per_iteration;
            index += iterations * per_iteration;
        }
        if consumed > 0 {
            consumed
        } else {
            for &value in values.iter() {
                self.set(index, value);
                index += 1;
            }
            len
        }
    }

    /// Sets every index in `from..to` to `value`.
    pub fn fill(&mut self, from: usize, to: usize, value: u64) {
        debug_assert!(from <= to && to <= self.value_count);
        debug_assert!(value <= self.mask);

        let aligned_values = self.codec.word_value_count();
        if to - from <= 3 * aligned_values {
            for i in from..to {
                self.set(i, value);
            }
            return;
        }

        // Head: scalar up to the next word-aligned run.
        let mut from = from;
        let misalign = from % aligned_values;
        if misalign != 0 {
            for _ in misalign..aligned_values {
                self.set(from, value);
                from += 1;
            }
        }
        debug_assert_eq!(from % aligned_values, 0);

        // Middle: filled words repeat with a period of `word_block_count`,
        // so build one period and stamp it without any shifting.
        let aligned_blocks = self.codec.word_block_count();
        let mut pattern = PackedArray::with_width(aligned_values, self.bits_per_value);
        for i in 0..aligned_values {
            pattern.set(i, value);
        }
        let start_block = from * self.bits_per_value as usize / 64;
        let end_block = to * self.bits_per_value as usize / 64;
        for block in start_block..end_block {
            self.blocks[block] = pattern.blocks[block % aligned_blocks];
        }

        // Tail: first value not fully inside the stamped words, onwards.
        for i in end_block * 64 / self.bits_per_value as usize..to {
            self.set(i, value);
        }
    }

    /// Resets every value to zero.
    pub fn clear(&mut self) {
        self.blocks.fill(0);
    }
}

impl Mutable for PackedArray {
    fn len(&self) -> usize {
        PackedArray::len(self)
    }

    fn bits_per_value(&self) -> u32 {
        PackedArray::bits_per_value(self)
    }

    fn get(&self, index: usize) -> u64 {
        PackedArray::get(self, index)
    }

    fn set(&mut self, index: usize, value: u64) {
        PackedArray::set(self, index, value)
    }

    fn get_range(&self, index: usize, dest: &mut [u64]) -> usize {
        PackedArray::get_range(self, index, dest)
    }

    fn set_range(&mut self, index: usize, values: &[u64]) -> usize {
        PackedArray::set_range(self, index, values)
    }
}

/// Moves `len` values from `src` starting at `src_pos` to `dest` starting
/// at `dest_pos`, staging through the caller-owned `buf`.
///
/// An empty `buf` degrades to scalar copying. Source and destination may
/// use different bit-widths; values must fit the destination's width.
pub fn copy_values<S: Mutable, D: Mutable>(
    src: &S,
    src_pos: usize,
    dest: &mut D,
    dest_pos: usize,
    len: usize,
    buf: &mut [u64],
) {
    debug_assert!(src_pos + len <= src.len());
    debug_assert!(dest_pos + len <= dest.len());
    if buf.is_empty() {
        for i in 0..len {
            dest.set(dest_pos + i, src.get(src_pos + i));
        }
        return;
    }

    let mut src_pos = src_pos;
    let mut dest_pos = dest_pos;
    let mut len = len;
    let mut pending = 0;
    while len > 0 {
        let chunk = len.min(buf.len() - pending);
        let read = src.get_range(src_pos, &mut buf[pending..pending + chunk]);
        src_pos += read;
        len -= read;
        pending += read;
        let written = dest.set_range(dest_pos, &buf[..pending]);
        dest_pos += written;
        if written < pending {
            buf.copy_within(written..pending, 0);
        }
        pending -= written;
    }
    while pending > 0 {
        let written = dest.set_range(dest_pos, &buf[..pending]);
        dest_pos += written;
        buf.copy_within(written..pending, 0);
        pending -= written;
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
