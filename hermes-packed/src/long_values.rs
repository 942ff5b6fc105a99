//! Compact in-memory sequences of i64 values.
//!
//! An append-only [`LongValuesBuilder`] buffers one page of raw values at a
//! time; when a page fills up it is modeled, reduced to residuals, and
//! packed at the least width those residuals need. [`build`] packs the
//! final partial page and freezes the whole sequence into a [`LongValues`]
//! reader.
//!
//! Three per-page models trade construction cost for density:
//!
//! | Model     | Page metadata | Residual                          |
//! |-----------|---------------|-----------------------------------|
//! | plain     | none          | `value`                           |
//! | delta     | min           | `value - min`                     |
//! | monotonic | min, slope    | `value - (min + trunc(slope*i))`  |
//!
//! A page whose residuals are all zero stores no array at all. Values are
//! signed throughout; a plain page containing a negative value falls back
//! to full 64-bit storage.
//!
//! [`build`]: LongValuesBuilder::build

use crate::bits::{bits_required, check_block_size};
use crate::block::expected;
use crate::error::Result;
use crate::mutable::PackedArray;

/// Smallest allowed page size.
pub const MIN_PAGE_SIZE: usize = 64;
/// Largest allowed page size. Pages are staging buffers, so there is no
/// point in making them much larger than the packing granularity.
pub const MAX_PAGE_SIZE: usize = 1 << 20;
/// Page size used by [`LongValuesBuilder::new`].
pub const DEFAULT_PAGE_SIZE: usize = 1024;

/// How each page models its values before packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Values stored as-is.
    Plain,
    /// Values stored as offsets from the page minimum.
    Delta,
    /// Values stored as offsets from a per-page linear model; best for
    /// sequences that grow at a roughly constant rate.
    Monotonic,
}

enum Page {
    Zero { len: usize },
    Packed(PackedArray),
}

impl Page {
    fn len(&self) -> usize {
        match self {
            Page::Zero { len } => *len,
            Page::Packed(array) => array.len(),
        }
    }

    fn get(&self, slot: usize) -> u64 {
        match self {
            Page::Zero { .. } => 0,
            Page::Packed(array) => array.get(slot),
        }
    }
}

// ── Builder ──────────────────────────────────────────────────────────────

/// Append-only accumulator for a [`LongValues`] sequence.
pub struct LongValuesBuilder {
    model: ModelKind,
    page_shift: u32,
    page_mask: u64,
    pending: Vec<i64>,
    pending_off: usize,
    size: u64,
    pages: Vec<Page>,
    mins: Vec<i64>,
    slopes: Vec<f32>,
}

impl LongValuesBuilder {
    /// Builder with the default page size.
    pub fn new(model: ModelKind) -> Self {
        Self::with_pages(model, DEFAULT_PAGE_SIZE)
    }

    /// Builder with an explicit power-of-two page size within
    /// [`MIN_PAGE_SIZE`]..=[`MAX_PAGE_SIZE`].
    pub fn with_page_size(model: ModelKind, page_size: usize) -> Result<Self> {
        check_block_size(page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE)?;
        Ok(Self::with_pages(model, page_size))
    }

    fn with_pages(model: ModelKind, page_size: usize) -> Self {
        LongValuesBuilder {
            model,
            page_shift: page_size.trailing_zeros(),
            page_mask: (page_size - 1) as u64,
            pending: vec![0; page_size],
            pending_off: 0,
            size: 0,
            pages: Vec::new(),
            mins: Vec::new(),
            slopes: Vec::new(),
        }
    }

    pub fn add(&mut self, value: i64) {
        if self.pending_off == self.pending.len() {
            self.pack_page();
        }
        self.pending[self.pending_off] = value;
        self.pending_off += 1;
        self.size += 1;
    }

    /// Number of values added so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Packs the pending partial page and freezes the sequence.
    pub fn build(mut self) -> LongValues {
        if self.pending_off > 0 {
            self.pack_page();
        }
        LongValues {
            model: self.model,
            page_shift: self.page_shift,
            page_mask: self.page_mask,
            size: self.size,
            pages: self.pages,
            mins: self.mins,
            slopes: self.slopes,
        }
    }

    /// Reduces the pending values to residuals per the model, then packs
    /// them at the least sufficient width.
    fn pack_page(&mut self) {
        debug_assert!(self.pending_off > 0);
        let pending = &mut self.pending[..self.pending_off];

        if self.model == ModelKind::Monotonic {
            let count = pending.len();
            let slope = if count == 1 {
                0f32
            } else {
                (pending[count - 1].wrapping_sub(pending[0])) as f32 / (count - 1) as f32
            };
            for (i, value) in pending.iter_mut().enumerate() {
                *value = value.wrapping_sub(expected(0, slope, i));
            }
            self.slopes.push(slope);
        }
        if matches!(self.model, ModelKind::Delta | ModelKind::Monotonic) {
            let min = pending.iter().copied().min().unwrap_or(0);
            for value in pending.iter_mut() {
                *value = value.wrapping_sub(min);
            }
            self.mins.push(min);
        }

        let min = pending.iter().copied().min().unwrap_or(0);
        let max = pending.iter().copied().max().unwrap_or(0);
        let page = if min == 0 && max == 0 {
            Page::Zero { len: pending.len() }
        } else {
            // A leftover negative residual (plain model, or wrap-around)
            // needs the full word.
            let bits = if min < 0 { 64 } else { bits_required(max as u64) };
            let mut array = PackedArray::with_width(pending.len(), bits);
            for (i, &value) in pending.iter().enumerate() {
                array.set(i, value as u64);
            }
            Page::Packed(array)
        };
        self.pages.push(page);
        self.pending_off = 0;
    }
}

// ── Reader ───────────────────────────────────────────────────────────────

/// Immutable packed sequence of i64 values, read by index or iterated.
pub struct LongValues {
    model: ModelKind,
    page_shift: u32,
    page_mask: u64,
    size: u64,
    pages: Vec<Page>,
    mins: Vec<i64>,
    slopes: Vec<f32>,
}

impl LongValues {
    /// Number of values in the sequence.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn get(&self, index: u64) -> i64 {
        debug_assert!(index < self.size);
        let page = (index >> self.page_shift) as usize;
        let slot = (index & self.page_mask) as usize;
        let raw = self.pages[page].get(slot) as i64;
        match self.model {
            ModelKind::Plain => raw,
            ModelKind::Delta => self.mins[page].wrapping_add(raw),
            ModelKind::Monotonic => {
                expected(self.mins[page], self.slopes[page], slot).wrapping_add(raw)
            }
        }
    }

    pub fn iter(&self) -> LongValuesIter<'_> {
        let page_size = (self.page_mask + 1) as usize;
        let mut iter = LongValuesIter {
            values: self,
            raw: vec![0; page_size],
            decoded: vec![0; page_size],
            page: 0,
            slot: 0,
            filled: 0,
        };
        iter.fill_page();
        iter
    }

    /// Decodes one whole page into `dest`, returning its length.
    fn decode_page(&self, page: usize, raw: &mut [u64], dest: &mut [i64]) -> usize {
        let len = self.pages[page].len();
        match &self.pages[page] {
            Page::Zero { .. } => dest[..len].fill(0),
            Page::Packed(array) => {
                let mut off = 0;
                while off < len {
                    off += array.get_range(off, &mut raw[off..len]);
                }
                for (slot, value) in dest[..len].iter_mut().enumerate() {
                    *value = raw[slot] as i64;
                }
            }
        }
        match self.model {
            ModelKind::Plain => {}
            ModelKind::Delta => {
                let min = self.mins[page];
                for value in dest[..len].iter_mut() {
                    *value = value.wrapping_add(min);
                }
            }
            ModelKind::Monotonic => {
                let min = self.mins[page];
                let slope = self.slopes[page];
                for (slot, value) in dest[..len].iter_mut().enumerate() {
                    *value = value.wrapping_add(expected(min, slope, slot));
                }
            }
        }
        len
    }
}

/// Iterates a [`LongValues`] sequence, decoding one page at a time.
pub struct LongValuesIter<'a> {
    values: &'a LongValues,
    raw: Vec<u64>,
    decoded: Vec<i64>,
    page: usize,
    slot: usize,
    filled: usize,
}

impl LongValuesIter<'_> {
    fn fill_page(&mut self) {
        if self.page == self.values.pages.len() {
            self.filled = 0;
        } else {
            self.filled = self
                .values
                .decode_page(self.page, &mut self.raw, &mut self.decoded);
        }
    }
}

impl Iterator for LongValuesIter<'_> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if self.slot == self.filled {
            return None;
        }
        let value = self.decoded[self.slot];
        self.slot += 1;
        if self.slot == self.filled {
            self.page += 1;
            self.slot = 0;
            self.fill_page();
        }
        Some(value)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
