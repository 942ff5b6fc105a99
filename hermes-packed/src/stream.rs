//! Streaming writer and iterator for packed value streams.
//!
//! The writer buffers values in whole codec iterations, bulk-encodes when
//! the buffer fills, and on a partial flush writes only as many bytes as
//! the buffered values occupy, so a finished stream is exactly
//! `format.byte_count(value_count, bits)` bytes with zero padding bits in
//! the last byte. The iterator mirrors it: it reads chunks sized to a
//! caller-set memory budget, zero-fills the final partial chunk before
//! decoding, and hands out windows into one reusable value buffer.

use std::io::{Read, Write};

use crate::bits::max_value;
use crate::bulk::BulkCodec;
use crate::error::{Error, Result};
use crate::format::Format;

/// Default encode/decode memory budget, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

// ── Writer ───────────────────────────────────────────────────────────────

/// Writes exactly `value_count` fixed-width values to an output stream.
pub struct PackedWriter<W: Write> {
    out: W,
    codec: BulkCodec,
    value_count: usize,
    bits_per_value: u32,
    mask: u64,
    iterations: usize,
    next_blocks: Vec<u8>,
    next_values: Vec<u64>,
    off: usize,
    written: usize,
    finished: bool,
}

impl<W: Write> PackedWriter<W> {
    pub fn new(
        out: W,
        format: Format,
        value_count: usize,
        bits_per_value: u32,
        ram_budget: usize,
    ) -> Result<Self> {
        let codec = BulkCodec::of(format, bits_per_value)?;
        let iterations = codec.compute_iterations(value_count, ram_budget);
        Ok(PackedWriter {
            out,
            codec,
            value_count,
            bits_per_value,
            mask: max_value(bits_per_value),
            iterations,
            next_blocks: vec![0; iterations * codec.byte_block_count()],
            next_values: vec![0; iterations * codec.byte_value_count()],
            off: 0,
            written: 0,
            finished: false,
        })
    }

    pub fn bits_per_value(&self) -> u32 {
        self.bits_per_value
    }

    /// Index of the last value added, -1 before the first.
    pub fn ord(&self) -> i64 {
        self.written as i64 - 1
    }

    pub fn add(&mut self, value: u64) -> Result<()> {
        if self.finished {
            return Err(Error::IllegalState("writer is finished".to_string()));
        }
        if value > self.mask {
            return Err(Error::InvalidArgument(format!(
                "{} does not fit in {} bits",
                value, self.bits_per_value
            )));
        }
        if self.written >= self.value_count {
            return Err(Error::EndOfStream);
        }
        self.next_values[self.off] = value;
        self.off += 1;
        if self.off == self.next_values.len() {
            self.flush()?;
        }
        self.written += 1;
        Ok(())
    }

    /// Pads the stream with zeros up to the declared value count and
    /// flushes. The writer accepts no further values.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Err(Error::IllegalState("writer is finished".to_string()));
        }
        while self.written < self.value_count {
            self.add(0)?;
        }
        self.flush()?;
        self.finished = true;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush(&mut self) -> Result<()> {
        // The value buffer tail past `off` is still zero, so encoding all
        // iterations is sound; only the bytes the real values occupy are
        // written out.
        self.codec
            .encode_bytes(&self.next_values, &mut self.next_blocks, self.iterations);
        let byte_count = self
            .codec
            .format()
            .byte_count(self.off, self.bits_per_value) as usize;
        self.out.write_all(&self.next_blocks[..byte_count])?;
        self.next_values.fill(0);
        self.off = 0;
        Ok(())
    }
}

// ── Iterator ─────────────────────────────────────────────────────────────

/// Reads back a stream produced by [`PackedWriter`], in order.
pub struct PackedReaderIterator<R: Read> {
    input: R,
    codec: BulkCodec,
    value_count: usize,
    bits_per_value: u32,
    iterations: usize,
    next_blocks: Vec<u8>,
    next_values: Vec<u64>,
    values_offset: usize,
    values_len: usize,
    position: i64,
}

impl<R: Read> PackedReaderIterator<R> {
    pub fn new(
        input: R,
        format: Format,
        value_count: usize,
        bits_per_value: u32,
        ram_budget: usize,
    ) -> Result<Self> {
        let codec = BulkCodec::of(format, bits_per_value)?;
        let iterations = codec.compute_iterations(value_count, ram_budget);
        let next_values = vec![0u64; iterations * codec.byte_value_count()];
        Ok(PackedReaderIterator {
            input,
            codec,
            value_count,
            bits_per_value,
            iterations,
            next_blocks: vec![0; iterations * codec.byte_block_count()],
            // Start exhausted so the first call refills.
            values_offset: next_values.len(),
            next_values,
            values_len: 0,
            position: -1,
        })
    }

    pub fn bits_per_value(&self) -> u32 {
        self.bits_per_value
    }

    /// Index of the last value yielded, -1 before the first.
    pub fn ord(&self) -> i64 {
        self.position
    }

    pub fn next(&mut self) -> Result<u64> {
        let window = self.next_batch(1)?;
        let value = window[0];
        self.values_offset += 1;
        self.values_len -= 1;
        Ok(value)
    }

    /// Yields a window of at most `count` values.
    ///
    /// The window may be shorter than `count` near a buffer edge or the
    /// end of the stream; it is never empty. Borrows the internal buffer,
    /// valid until the next call.
    pub fn next_batch(&mut self, count: usize) -> Result<&[u64]> {
        debug_assert!(count > 0);
        self.values_offset += self.values_len;
        self.values_len = 0;

        let remaining = self.value_count as i64 - self.position - 1;
        if remaining <= 0 {
            return Err(Error::EndOfStream);
        }
        let count = count.min(remaining as usize);

        if self.values_offset == self.next_values.len() {
            let remaining_bytes = self
                .codec
                .format()
                .byte_count(remaining as usize, self.bits_per_value);
            let to_read = (remaining_bytes as usize).min(self.next_blocks.len());
            self.input.read_exact(&mut self.next_blocks[..to_read])?;
            self.next_blocks[to_read..].fill(0);
            self.codec
                .decode_bytes(&self.next_blocks, &mut self.next_values, self.iterations);
            self.values_offset = 0;
        }

        self.values_len = (self.next_values.len() - self.values_offset).min(count);
        self.position += self.values_len as i64;
        Ok(&self.next_values[self.values_offset..self.values_offset + self.values_len])
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
