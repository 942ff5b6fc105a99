//! Block-packed streams of signed values.
//!
//! A stream is a sequence of fixed-size blocks, each modeled independently
//! and packed to the least width its residuals need:
//!
//! | Stream    | Per-block header                     | Residual            |
//! |-----------|--------------------------------------|---------------------|
//! | delta     | token byte, zig-zag min unless zero  | `value - min`       |
//! | monotonic | zlong min, f32 slope, vint width     | `value - model(i)`  |
//!
//! where `model(i) = min + trunc(slope * i)`. A residual width of zero
//! means the header alone reproduces the whole block and no payload
//! follows, so runs of equal values (delta) or evenly spaced values
//! (monotonic) cost a few header bytes per block.
//!
//! Delta streams are consumed through [`BlockPackedReaderIterator`] or at
//! random through [`BlockPackedReader`]; monotonic streams through
//! [`MonotonicBlockPackedReader`]. The random-access readers parse every
//! header up front and either decode each payload eagerly or keep the byte
//! region and decode per lookup.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::bits::{
    bits_required, check_block_size, max_value, num_blocks, zigzag_decode, zigzag_encode,
};
use crate::bulk::BulkCodec;
use crate::bytes::OwnedBytes;
use crate::direct::DirectPackedReader;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::mutable::PackedArray;
use crate::varint::{read_vint, read_vlong, read_zlong, write_vint, write_vlong, write_zlong};

/// Smallest allowed number of values per block.
pub const MIN_BLOCK_SIZE: usize = 64;
/// Largest allowed number of values per block.
pub const MAX_BLOCK_SIZE: usize = 1 << 27;

const BPV_SHIFT: u32 = 1;
const MIN_VALUE_EQUALS_0: u8 = 1;

/// Which revision of the monotonic wire format a stream was written with.
///
/// Older streams stored each block minimum as a plain vlong and zig-zagged
/// every residual; current streams zig-zag the minimum once and store the
/// residuals raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStreamVersion {
    Legacy,
    Current,
}

fn check_stored_bits(bits: u32) -> Result<()> {
    if bits > 64 {
        return Err(Error::Corruption(format!(
            "{} bits per value in block header",
            bits
        )));
    }
    Ok(())
}

fn parse_token(token: u8) -> Result<(u32, bool)> {
    let bits = (token >> BPV_SHIFT) as u32;
    check_stored_bits(bits)?;
    Ok((bits, token & MIN_VALUE_EQUALS_0 != 0))
}

/// Value the linear model predicts at `index`.
pub(crate) fn expected(origin: i64, slope: f32, index: usize) -> i64 {
    origin.wrapping_add((slope * index as f32) as i64)
}

/// Packs `residuals` (tail already zeroed) and writes the first
/// `byte_count(written, bits)` bytes, staging through `bytes`.
fn write_residuals<W: Write>(
    out: &mut W,
    residuals: &[u64],
    written: usize,
    bits: u32,
    bytes: &mut Vec<u8>,
) -> Result<()> {
    let codec = BulkCodec::packed(bits);
    let iterations = residuals.len() / codec.byte_value_count();
    let needed = iterations * codec.byte_block_count();
    if bytes.len() < needed {
        bytes.resize(needed, 0);
    }
    codec.encode_bytes(residuals, &mut bytes[..needed], iterations);
    let byte_len = Format::Packed.byte_count(written, bits) as usize;
    out.write_all(&bytes[..byte_len])?;
    Ok(())
}

// ── Writers ──────────────────────────────────────────────────────────────

/// Writes a sequence of i64 values as delta blocks: each block stores its
/// minimum and the packed non-negative offsets from it.
pub struct BlockPackedWriter<W: Write> {
    out: W,
    values: Vec<i64>,
    residuals: Vec<u64>,
    bytes: Vec<u8>,
    off: usize,
    ord: u64,
    finished: bool,
}

impl<W: Write> BlockPackedWriter<W> {
    pub fn new(out: W, block_size: usize) -> Result<Self> {
        check_block_size(block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE)?;
        Ok(BlockPackedWriter {
            out,
            values: vec![0; block_size],
            residuals: vec![0; block_size],
            bytes: Vec::new(),
            off: 0,
            ord: 0,
            finished: false,
        })
    }

    /// Starts over against a fresh output, returning the previous one. The
    /// block size is unchanged.
    pub fn reset(&mut self, out: W) -> W {
        self.off = 0;
        self.ord = 0;
        self.finished = false;
        std::mem::replace(&mut self.out, out)
    }

    pub fn add(&mut self, value: i64) -> Result<()> {
        if self.finished {
            return Err(Error::IllegalState("writer is finished".to_string()));
        }
        if self.off == self.values.len() {
            self.flush()?;
        }
        self.values[self.off] = value;
        self.off += 1;
        self.ord += 1;
        Ok(())
    }

    /// Flushes the pending partial block. The writer is unusable afterwards
    /// until [`reset`](Self::reset).
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Err(Error::IllegalState("writer is finished".to_string()));
        }
        if self.off > 0 {
            self.flush()?;
        }
        self.finished = true;
        Ok(())
    }

    /// Number of values added so far.
    pub fn ord(&self) -> u64 {
        self.ord
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush(&mut self) -> Result<()> {
        debug_assert!(self.off > 0);
        let mut min = i64::MAX;
        let mut max = i64::MIN;
        for &value in self.values[..self.off].iter() {
            min = min.min(value);
            max = max.max(value);
        }

        let delta = max.wrapping_sub(min) as u64;
        let bits = if delta == 0 { 0 } else { bits_required(delta) };
        if bits == 64 {
            // Residuals span the full word anyway, store the raw values.
            min = 0;
        } else if min > 0 {
            // Keep min as small as its vlong allows without widening the
            // residuals.
            min = (max - max_value(bits) as i64).max(0);
        }

        let token = ((bits as u8) << BPV_SHIFT) | if min == 0 { MIN_VALUE_EQUALS_0 } else { 0 };
        self.out.write_u8(token)?;
        if min != 0 {
            write_vlong(&mut self.out, zigzag_encode(min) - 1)?;
        }
        if bits > 0 {
            for i in 0..self.off {
                self.residuals[i] = self.values[i].wrapping_sub(min) as u64;
            }
            self.residuals[self.off..].fill(0);
            write_residuals(&mut self.out, &self.residuals, self.off, bits, &mut self.bytes)?;
        }
        self.off = 0;
        Ok(())
    }
}

/// Writes a non-decreasing sequence of non-negative i64 values, modeling
/// each block with a linear function and packing the offsets from it.
pub struct MonotonicBlockPackedWriter<W: Write> {
    out: W,
    values: Vec<i64>,
    residuals: Vec<u64>,
    bytes: Vec<u8>,
    off: usize,
    ord: u64,
    finished: bool,
}

impl<W: Write> MonotonicBlockPackedWriter<W> {
    pub fn new(out: W, block_size: usize) -> Result<Self> {
        check_block_size(block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE)?;
        Ok(MonotonicBlockPackedWriter {
            out,
            values: vec![0; block_size],
            residuals: vec![0; block_size],
            bytes: Vec::new(),
            off: 0,
            ord: 0,
            finished: false,
        })
    }

    /// Starts over against a fresh output, returning the previous one. The
    /// block size is unchanged.
    pub fn reset(&mut self, out: W) -> W {
        self.off = 0;
        self.ord = 0;
        self.finished = false;
        std::mem::replace(&mut self.out, out)
    }

    pub fn add(&mut self, value: i64) -> Result<()> {
        if self.finished {
            return Err(Error::IllegalState("writer is finished".to_string()));
        }
        if value < 0 {
            return Err(Error::InvalidArgument(format!(
                "monotonic streams hold non-negative values, got {}",
                value
            )));
        }
        if self.off == self.values.len() {
            self.flush()?;
        }
        self.values[self.off] = value;
        self.off += 1;
        self.ord += 1;
        Ok(())
    }

    /// Flushes the pending partial block. The writer is unusable afterwards
    /// until [`reset`](Self::reset).
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Err(Error::IllegalState("writer is finished".to_string()));
        }
        if self.off > 0 {
            self.flush()?;
        }
        self.finished = true;
        Ok(())
    }

    /// Number of values added so far.
    pub fn ord(&self) -> u64 {
        self.ord
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush(&mut self) -> Result<()> {
        debug_assert!(self.off > 0);
        let slope = if self.off == 1 {
            0f32
        } else {
            (self.values[self.off - 1] - self.values[0]) as f32 / (self.off - 1) as f32
        };

        // Lower the origin until the model never overshoots an actual
        // value, so every residual is non-negative.
        let mut min = self.values[0];
        for i in 1..self.off {
            let actual = self.values[i];
            let predicted = expected(min, slope, i);
            if predicted > actual {
                min = min.wrapping_sub(predicted.wrapping_sub(actual));
            }
        }

        let mut max_residual = 0u64;
        for i in 0..self.off {
            let residual = self.values[i].wrapping_sub(expected(min, slope, i)) as u64;
            self.residuals[i] = residual;
            max_residual = max_residual.max(residual);
        }

        write_zlong(&mut self.out, min)?;
        self.out.write_u32::<BigEndian>(slope.to_bits())?;
        if max_residual == 0 {
            write_vint(&mut self.out, 0)?;
        } else {
            let bits = bits_required(max_residual);
            write_vint(&mut self.out, bits)?;
            self.residuals[self.off..].fill(0);
            write_residuals(&mut self.out, &self.residuals, self.off, bits, &mut self.bytes)?;
        }
        self.off = 0;
        Ok(())
    }
}

// ── Sequential reader ────────────────────────────────────────────────────

/// Streams a delta block sequence back, one buffered block at a time.
pub struct BlockPackedReaderIterator<R: Read> {
    input: R,
    block_size: usize,
    value_count: u64,
    values: Vec<i64>,
    residuals: Vec<u64>,
    bytes: Vec<u8>,
    off: usize,
    ord: u64,
}

impl<R: Read> BlockPackedReaderIterator<R> {
    pub fn new(input: R, block_size: usize, value_count: u64) -> Result<Self> {
        check_block_size(block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE)?;
        Ok(BlockPackedReaderIterator {
            input,
            block_size,
            value_count,
            values: vec![0; block_size],
            residuals: vec![0; block_size],
            bytes: Vec::new(),
            off: block_size,
            ord: 0,
        })
    }

    /// Rewinds onto a fresh input, returning the previous one. The block
    /// size is unchanged.
    pub fn reset(&mut self, input: R, value_count: u64) -> R {
        self.value_count = value_count;
        self.off = self.block_size;
        self.ord = 0;
        std::mem::replace(&mut self.input, input)
    }

    /// Number of values consumed so far.
    pub fn ord(&self) -> u64 {
        self.ord
    }

    pub fn next(&mut self) -> Result<i64> {
        if self.ord == self.value_count {
            return Err(Error::EndOfStream);
        }
        if self.off == self.block_size {
            self.refill()?;
        }
        let value = self.values[self.off];
        self.off += 1;
        self.ord += 1;
        Ok(value)
    }

    /// Returns a window of up to `count` decoded values, clamped to the
    /// buffered block and to the declared stream length.
    pub fn next_batch(&mut self, count: usize) -> Result<&[i64]> {
        debug_assert!(count > 0);
        if self.ord == self.value_count {
            return Err(Error::EndOfStream);
        }
        if self.off == self.block_size {
            self.refill()?;
        }
        let count = (count as u64)
            .min((self.block_size - self.off) as u64)
            .min(self.value_count - self.ord) as usize;
        let start = self.off;
        self.off += count;
        self.ord += count as u64;
        Ok(&self.values[start..start + count])
    }

    /// Advances past `count` values, reading only block headers for the
    /// whole blocks in between.
    pub fn skip(&mut self, count: u64) -> Result<()> {
        match self.ord.checked_add(count) {
            Some(target) if target <= self.value_count => {}
            _ => return Err(Error::EndOfStream),
        }

        // Values already decoded into the buffer.
        let buffered = count.min((self.block_size - self.off) as u64);
        self.off += buffered as usize;
        self.ord += buffered;
        let mut count = count - buffered;
        if count == 0 {
            return Ok(());
        }

        // Whole blocks: consume the header and jump over the payload.
        debug_assert_eq!(self.off, self.block_size);
        while count >= self.block_size as u64 {
            let (bits, min_is_zero) = parse_token(self.input.read_u8()?)?;
            if !min_is_zero {
                read_vlong(&mut self.input)?;
            }
            if bits != 0 {
                self.skip_bytes(Format::Packed.byte_count(self.block_size, bits))?;
            }
            self.ord += self.block_size as u64;
            count -= self.block_size as u64;
        }
        if count == 0 {
            return Ok(());
        }

        debug_assert!(count < self.block_size as u64);
        self.refill()?;
        self.ord += count;
        self.off += count as usize;
        Ok(())
    }

    fn skip_bytes(&mut self, count: u64) -> Result<()> {
        if self.bytes.len() < self.block_size {
            self.bytes.resize(self.block_size, 0);
        }
        let mut skipped = 0u64;
        while skipped < count {
            let step = (count - skipped).min(self.bytes.len() as u64) as usize;
            self.input.read_exact(&mut self.bytes[..step])?;
            skipped += step as u64;
        }
        Ok(())
    }

    fn refill(&mut self) -> Result<()> {
        let (bits, min_is_zero) = parse_token(self.input.read_u8()?)?;
        let min_value = if min_is_zero {
            0
        } else {
            zigzag_decode(read_vlong(&mut self.input)?.wrapping_add(1))
        };

        if bits == 0 {
            self.values.fill(min_value);
        } else {
            let codec = BulkCodec::packed(bits);
            let iterations = self.block_size / codec.byte_value_count();
            let needed = iterations * codec.byte_block_count();
            if self.bytes.len() < needed {
                self.bytes.resize(needed, 0);
            }
            // The final block may be partial; its payload is sized by the
            // remaining count, the decoded tail is unused.
            let count = (self.value_count - self.ord).min(self.block_size as u64) as usize;
            let byte_len = Format::Packed.byte_count(count, bits) as usize;
            self.input.read_exact(&mut self.bytes[..byte_len])?;
            self.bytes[byte_len..needed].fill(0);
            codec.decode_bytes(&self.bytes[..needed], &mut self.residuals, iterations);
            for (slot, &residual) in self.values.iter_mut().zip(self.residuals.iter()) {
                *slot = min_value.wrapping_add(residual as i64);
            }
        }
        self.off = 0;
        Ok(())
    }
}

// ── Random access ────────────────────────────────────────────────────────

/// How a random-access block reader materializes residual payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReadMode {
    /// Decode every block into memory up front.
    Eager,
    /// Keep the byte region and decode values on each lookup.
    Direct,
}

enum BlockStore {
    AllZero,
    Eager(PackedArray),
    Direct(DirectPackedReader),
}

impl BlockStore {
    fn get(&self, slot: usize) -> u64 {
        match self {
            BlockStore::AllZero => 0,
            BlockStore::Eager(array) => array.get(slot),
            BlockStore::Direct(reader) => reader.get(slot),
        }
    }
}

/// Tracks how far header parsing has advanced through a byte region.
struct RegionCursor<'a> {
    total: usize,
    rest: &'a [u8],
}

impl<'a> RegionCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        RegionCursor { total: data.len(), rest: data }
    }

    fn position(&self) -> usize {
        self.total - self.rest.len()
    }

    /// Marks `len` bytes consumed and returns their region offset.
    fn take(&mut self, len: usize) -> Result<usize> {
        if len > self.rest.len() {
            return Err(Error::Corruption(
                "block stream ends inside a residual payload".to_string(),
            ));
        }
        let offset = self.position();
        self.rest = &self.rest[len..];
        Ok(offset)
    }
}

fn load_block(
    bytes: &OwnedBytes,
    cursor: &mut RegionCursor<'_>,
    len: usize,
    bits: u32,
    mode: BlockReadMode,
) -> Result<BlockStore> {
    let byte_len = Format::Packed.byte_count(len, bits) as usize;
    let offset = cursor.take(byte_len)?;
    Ok(match mode {
        BlockReadMode::Eager => BlockStore::Eager(PackedArray::from_packed_bytes(
            &bytes.as_slice()[offset..offset + byte_len],
            len,
            bits,
        )),
        BlockReadMode::Direct => BlockStore::Direct(DirectPackedReader::new(
            bytes.slice(offset..offset + byte_len),
            len,
            bits,
        )?),
    })
}

fn block_len(value_count: u64, block_size: usize, block: usize) -> usize {
    (value_count - block as u64 * block_size as u64).min(block_size as u64) as usize
}

/// Random access over a delta block stream laid out in a byte region.
pub struct BlockPackedReader {
    block_shift: u32,
    block_mask: u64,
    value_count: u64,
    min_values: Option<Vec<i64>>,
    blocks: Vec<BlockStore>,
}

impl BlockPackedReader {
    pub fn new(
        bytes: OwnedBytes,
        block_size: usize,
        value_count: u64,
        mode: BlockReadMode,
    ) -> Result<Self> {
        let block_shift = check_block_size(block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE)?;
        let block_count = num_blocks(value_count, block_size)?;
        let mut cursor = RegionCursor::new(bytes.as_slice());
        let mut min_values: Option<Vec<i64>> = None;
        let mut blocks = Vec::with_capacity(block_count);
        for i in 0..block_count {
            let (bits, min_is_zero) = parse_token(cursor.rest.read_u8()?)?;
            if !min_is_zero {
                let min = zigzag_decode(read_vlong(&mut cursor.rest)?.wrapping_add(1));
                min_values.get_or_insert_with(|| vec![0; block_count])[i] = min;
            }
            if bits == 0 {
                blocks.push(BlockStore::AllZero);
            } else {
                let len = block_len(value_count, block_size, i);
                blocks.push(load_block(&bytes, &mut cursor, len, bits, mode)?);
            }
        }
        log::debug!(
            "parsed {} delta block headers covering {} values ({:?})",
            block_count,
            value_count,
            mode
        );
        Ok(BlockPackedReader {
            block_shift,
            block_mask: (block_size - 1) as u64,
            value_count,
            min_values,
            blocks,
        })
    }

    pub fn get(&self, index: u64) -> i64 {
        debug_assert!(index < self.value_count);
        let block = (index >> self.block_shift) as usize;
        let slot = (index & self.block_mask) as usize;
        let min = self.min_values.as_ref().map_or(0, |mins| mins[block]);
        min.wrapping_add(self.blocks[block].get(slot) as i64)
    }

    /// Number of values in the stream.
    pub fn size(&self) -> u64 {
        self.value_count
    }
}

/// Random access over a monotonic block stream laid out in a byte region.
pub struct MonotonicBlockPackedReader {
    version: BlockStreamVersion,
    block_shift: u32,
    block_mask: u64,
    value_count: u64,
    min_values: Vec<i64>,
    slopes: Vec<f32>,
    blocks: Vec<BlockStore>,
}

impl MonotonicBlockPackedReader {
    pub fn new(
        bytes: OwnedBytes,
        version: BlockStreamVersion,
        block_size: usize,
        value_count: u64,
        mode: BlockReadMode,
    ) -> Result<Self> {
        let block_shift = check_block_size(block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE)?;
        let block_count = num_blocks(value_count, block_size)?;
        let mut cursor = RegionCursor::new(bytes.as_slice());
        let mut min_values = vec![0i64; block_count];
        let mut slopes = vec![0f32; block_count];
        let mut blocks = Vec::with_capacity(block_count);
        for i in 0..block_count {
            min_values[i] = match version {
                BlockStreamVersion::Legacy => read_vlong(&mut cursor.rest)? as i64,
                BlockStreamVersion::Current => read_zlong(&mut cursor.rest)?,
            };
            slopes[i] = f32::from_bits(cursor.rest.read_u32::<BigEndian>()?);
            let bits = read_vint(&mut cursor.rest)?;
            check_stored_bits(bits)?;
            if bits == 0 {
                blocks.push(BlockStore::AllZero);
            } else {
                let len = block_len(value_count, block_size, i);
                blocks.push(load_block(&bytes, &mut cursor, len, bits, mode)?);
            }
        }
        Ok(MonotonicBlockPackedReader {
            version,
            block_shift,
            block_mask: (block_size - 1) as u64,
            value_count,
            min_values,
            slopes,
            blocks,
        })
    }

    pub fn get(&self, index: u64) -> i64 {
        debug_assert!(index < self.value_count);
        let block = (index >> self.block_shift) as usize;
        let slot = (index & self.block_mask) as usize;
        let residual = match self.version {
            BlockStreamVersion::Legacy => zigzag_decode(self.blocks[block].get(slot)),
            BlockStreamVersion::Current => self.blocks[block].get(slot) as i64,
        };
        expected(self.min_values[block], self.slopes[block], slot).wrapping_add(residual)
    }

    /// Number of values in the stream.
    pub fn size(&self) -> u64 {
        self.value_count
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
