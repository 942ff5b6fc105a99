//! Paged mutable arrays for index spaces beyond a single allocation.
//!
//! A paged array splits its indices into power-of-two pages, each an
//! independent packed array with its own width. [`PagedMutable`] keeps
//! every page at the construction width; [`PagedGrowableWriter`] lets each
//! page widen on its own, so one outlier value only costs its page.

use crate::bits::{check_block_size, num_blocks};
use crate::error::Result;
use crate::format::Format;
use crate::growable::GrowableWriter;
use crate::mutable::{copy_values, Mutable, PackedArray};

/// Smallest allowed page size.
pub const MIN_PAGE_SIZE: usize = 1 << 6;
/// Largest allowed page size.
pub const MAX_PAGE_SIZE: usize = 1 << 30;

/// Storage for one page, at an already validated width.
pub trait Page: Mutable {
    fn with_width(value_count: usize, bits_per_value: u32) -> Self;
}

impl Page for PackedArray {
    fn with_width(value_count: usize, bits_per_value: u32) -> Self {
        PackedArray::with_width(value_count, bits_per_value)
    }
}

impl Page for GrowableWriter {
    fn with_width(value_count: usize, bits_per_value: u32) -> Self {
        GrowableWriter::with_width(value_count, bits_per_value)
    }
}

/// Fixed-width paged array.
pub type PagedMutable = Paged<PackedArray>;

/// Paged array whose pages widen independently on demand.
pub type PagedGrowableWriter = Paged<GrowableWriter>;

pub struct Paged<P: Page> {
    pages: Vec<P>,
    size: usize,
    page_shift: u32,
    page_mask: usize,
    bits_per_value: u32,
}

impl<P: Page> Paged<P> {
    /// Array of `size` values split into `page_size` chunks, all pages
    /// starting at `bits_per_value` bits. The last page only allocates
    /// what `size` leaves it.
    pub fn new(size: usize, page_size: usize, bits_per_value: u32) -> Result<Self> {
        Format::Packed.check_bits_per_value(bits_per_value)?;
        let page_shift = check_block_size(page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE)?;
        let num_pages = num_blocks(size as u64, page_size)?;
        let mut pages = Vec::with_capacity(num_pages);
        for i in 0..num_pages {
            let value_count = if i == num_pages - 1 {
                last_page_size(size, page_size)
            } else {
                page_size
            };
            pages.push(P::with_width(value_count, bits_per_value));
        }
        Ok(Paged {
            pages,
            size,
            page_shift,
            page_mask: page_size - 1,
            bits_per_value,
        })
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Width new pages start at; existing pages may have widened past it.
    pub fn bits_per_value(&self) -> u32 {
        self.bits_per_value
    }

    fn page_size(&self) -> usize {
        self.page_mask + 1
    }

    pub fn get(&self, index: usize) -> u64 {
        debug_assert!(index < self.size);
        self.pages[index >> self.page_shift].get(index & self.page_mask)
    }

    pub fn set(&mut self, index: usize, value: u64) {
        debug_assert!(index < self.size);
        self.pages[index >> self.page_shift].set(index & self.page_mask, value);
    }

    /// Fresh array of `new_size` values: pages shared with the old index
    /// space keep their width and values, new high pages start zero-filled
    /// at the construction width.
    pub fn resize(&self, new_size: usize) -> Result<Self> {
        let page_size = self.page_size();
        let num_pages = num_blocks(new_size as u64, page_size)?;
        log::debug!(
            "resizing paged array from {} to {} values ({} pages)",
            self.size,
            new_size,
            num_pages
        );
        let common = num_pages.min(self.pages.len());
        let mut buf = vec![0u64; 1024];
        let mut pages = Vec::with_capacity(num_pages);
        for i in 0..num_pages {
            let value_count = if i == num_pages - 1 {
                last_page_size(new_size, page_size)
            } else {
                page_size
            };
            let bits = if i < common {
                self.pages[i].bits_per_value()
            } else {
                self.bits_per_value
            };
            let mut page = P::with_width(value_count, bits);
            if i < common {
                let copy_len = value_count.min(self.pages[i].len());
                copy_values(&self.pages[i], 0, &mut page, 0, copy_len, &mut buf);
            }
            pages.push(page);
        }
        Ok(Paged {
            pages,
            size: new_size,
            page_shift: self.page_shift,
            page_mask: self.page_mask,
            bits_per_value: self.bits_per_value,
        })
    }

    /// Resizes with an eighth of headroom once `min_size` exceeds the
    /// current size; hands the array back unchanged otherwise.
    pub fn grow(self, min_size: usize) -> Result<Self> {
        if min_size <= self.size {
            return Ok(self);
        }
        let extra = (min_size >> 3).max(3);
        self.resize(min_size + extra)
    }
}

fn last_page_size(size: usize, page_size: usize) -> usize {
    let tail = size & (page_size - 1);
    if tail == 0 { page_size } else { tail }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::bits::max_value;

    #[test]
    fn spans_pages() {
        let page_size = 64;
        let size = 3 * page_size + 7;
        let mut paged = PagedMutable::new(size, page_size, 17).unwrap();
        for i in 0..size {
            paged.set(i, (i as u64 * 31) & max_value(17));
        }
        for i in 0..size {
            assert_eq!(paged.get(i), (i as u64 * 31) & max_value(17), "index {}", i);
        }
    }

    #[test]
    fn resize_preserves_values_and_page_widths() {
        let page_size = 128;
        let size = 3 * page_size + 7;
        let mut paged = PagedGrowableWriter::new(size, page_size, 4).unwrap();
        let mut rng = StdRng::seed_from_u64(0x9a6e);
        let values: Vec<u64> = (0..size).map(|_| rng.random_range(0..16)).collect();
        for (i, &value) in values.iter().enumerate() {
            paged.set(i, value);
        }
        // One page widens on its own.
        paged.set(page_size + 3, u64::MAX);

        let resized = paged.resize(5 * page_size - 1).unwrap();
        assert_eq!(resized.len(), 5 * page_size - 1);
        for (i, &value) in values.iter().enumerate() {
            let expected = if i == page_size + 3 { u64::MAX } else { value };
            assert_eq!(resized.get(i), expected, "index {}", i);
        }
        for i in size..5 * page_size - 1 {
            assert_eq!(resized.get(i), 0);
        }

        let shrunk = resized.resize(2 * page_size + 1).unwrap();
        assert_eq!(shrunk.len(), 2 * page_size + 1);
        assert_eq!(shrunk.get(0), values[0]);
        assert_eq!(shrunk.get(page_size + 3), u64::MAX);
        assert_eq!(shrunk.get(2 * page_size), values[2 * page_size]);
    }

    #[test]
    fn growable_pages_widen_independently() {
        let mut paged = PagedGrowableWriter::new(256, 64, 2).unwrap();
        for i in 0..256 {
            paged.set(i, 3);
        }
        paged.set(70, 1 << 40);
        assert_eq!(paged.get(70), 1 << 40);
        for i in 0..256 {
            if i != 70 {
                assert_eq!(paged.get(i), 3, "index {}", i);
            }
        }
        assert_eq!(paged.bits_per_value(), 2);
    }

    #[test]
    fn grow_is_noop_until_needed() {
        let paged = PagedMutable::new(200, 64, 8).unwrap();
        let same = paged.grow(150).unwrap();
        assert_eq!(same.len(), 200);
        let bigger = same.grow(201).unwrap();
        assert!(bigger.len() >= 201 + 3);
    }

    #[test]
    fn empty_array() {
        let paged = PagedMutable::new(0, 64, 8).unwrap();
        assert!(paged.is_empty());
        let grown = paged.grow(1).unwrap();
        assert_eq!(grown.len(), 4);
        assert_eq!(grown.get(0), 0);
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(PagedMutable::new(100, 32, 8).is_err());
        assert!(PagedMutable::new(100, 100, 8).is_err());
        assert!(PagedMutable::new(100, 1 << 31, 8).is_err());
        assert!(PagedMutable::new(100, 64, 0).is_err());
        assert!(PagedMutable::new(100, 64, 65).is_err());
    }
}
