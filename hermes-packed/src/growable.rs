//! Mutable packed array that widens itself as values demand.
//!
//! Storage starts at the caller's initial width and is rebuilt at the
//! first wider value: a fresh array at the required width is allocated,
//! existing values are copied across, and the old storage is dropped.
//! Narrowing never happens.

use crate::bits::{bits_required, max_value};
use crate::error::Result;
use crate::mutable::{copy_values, Mutable, PackedArray};
use crate::stream::DEFAULT_BUFFER_SIZE;

pub struct GrowableWriter {
    current: PackedArray,
    current_mask: u64,
}

impl GrowableWriter {
    pub fn new(value_count: usize, start_bits_per_value: u32) -> Result<Self> {
        let current = PackedArray::new(value_count, start_bits_per_value)?;
        Ok(GrowableWriter {
            current_mask: max_value(start_bits_per_value),
            current,
        })
    }

    pub(crate) fn with_width(value_count: usize, bits_per_value: u32) -> Self {
        GrowableWriter {
            current_mask: max_value(bits_per_value),
            current: PackedArray::with_width(value_count, bits_per_value),
        }
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn bits_per_value(&self) -> u32 {
        self.current.bits_per_value()
    }

    pub fn get(&self, index: usize) -> u64 {
        self.current.get(index)
    }

    pub fn get_range(&self, index: usize, dest: &mut [u64]) -> usize {
        self.current.get_range(index, dest)
    }

    pub fn set(&mut self, index: usize, value: u64) {
        self.ensure_capacity(value);
        self.current.set(index, value);
    }

    pub fn set_range(&mut self, index: usize, values: &[u64]) -> usize {
        let mut max = 0;
        for &value in values {
            // The or of all values needs exactly as many bits as the widest.
            max |= value;
        }
        self.ensure_capacity(max);
        self.current.set_range(index, values)
    }

    pub fn fill(&mut self, from: usize, to: usize, value: u64) {
        self.ensure_capacity(value);
        self.current.fill(from, to, value);
    }

    pub fn clear(&mut self) {
        self.current.clear();
    }

    /// Fresh writer of `new_size` values at the current width, with the
    /// overlapping prefix copied over.
    pub fn resize(&self, new_size: usize) -> GrowableWriter {
        let mut next = GrowableWriter::with_width(new_size, self.bits_per_value());
        let limit = self.len().min(new_size);
        let mut buf = vec![0u64; (DEFAULT_BUFFER_SIZE / 8).min(limit)];
        copy_values(&self.current, 0, &mut next.current, 0, limit, &mut buf);
        next
    }

    fn ensure_capacity(&mut self, value: u64) {
        if value & self.current_mask == value {
            return;
        }
        let bits_required = bits_required(value);
        debug_assert!(bits_required > self.current.bits_per_value());
        let value_count = self.current.len();
        let mut next = PackedArray::with_width(value_count, bits_required);
        let mut buf = vec![0u64; (DEFAULT_BUFFER_SIZE / 8).min(value_count)];
        copy_values(&self.current, 0, &mut next, 0, value_count, &mut buf);
        log::trace!(
            "widened growable array from {} to {} bits per value ({} values)",
            self.current.bits_per_value(),
            bits_required,
            value_count
        );
        self.current = next;
        self.current_mask = max_value(bits_required);
    }
}

impl Mutable for GrowableWriter {
    fn len(&self) -> usize {
        GrowableWriter::len(self)
    }

    fn bits_per_value(&self) -> u32 {
        GrowableWriter::bits_per_value(self)
    }

    fn get(&self, index: usize) -> u64 {
        GrowableWriter::get(self, index)
    }

    fn set(&mut self, index: usize, value: u64) {
        GrowableWriter::set(self, index, value)
    }

    fn get_range(&self, index: usize, dest: &mut [u64]) -> usize {
        GrowableWriter::get_range(self, index, dest)
    }

    fn set_range(&mut self, index: usize, values: &[u64]) -> usize {
        GrowableWriter::set_range(self, index, values)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn widens_through_the_ladder() {
        let mut writer = GrowableWriter::new(100, 1).unwrap();
        let ladder = [
            0u64,
            (1u64 << 8) - 1,
            (1u64 << 16) - 1,
            (1u64 << 32) - 1,
            (1u64 << 63) - 1,
        ];
        for (i, &value) in ladder.iter().enumerate() {
            writer.set(i, value);
            for (j, &earlier) in ladder[..=i].iter().enumerate() {
                assert_eq!(writer.get(j), earlier, "after widening for {}", value);
            }
        }
        assert_eq!(writer.bits_per_value(), 63);
        writer.set(5, u64::MAX);
        assert_eq!(writer.bits_per_value(), 64);
        assert_eq!(writer.get(5), u64::MAX);
        assert_eq!(writer.get(4), (1u64 << 63) - 1);
    }

    #[test]
    fn never_narrows() {
        let mut writer = GrowableWriter::new(10, 1).unwrap();
        writer.set(0, 1 << 20);
        let wide = writer.bits_per_value();
        writer.set(1, 1);
        assert_eq!(writer.bits_per_value(), wide);
    }

    #[test]
    fn bulk_set_widens_once_for_the_batch() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut writer = GrowableWriter::new(1000, 2).unwrap();
        let values: Vec<u64> = (0..1000).map(|_| rng.random::<u64>() >> rng.random_range(1..63)).collect();
        let mut index = 0;
        while index < values.len() {
            index += writer.set_range(index, &values[index..]);
        }
        for (i, &value) in values.iter().enumerate() {
            assert_eq!(writer.get(i), value, "index {}", i);
        }
        let widest = values.iter().fold(0u64, |acc, &v| acc | v);
        assert_eq!(writer.bits_per_value(), bits_required(widest).max(2));
    }

    #[test]
    fn fill_widens() {
        let mut writer = GrowableWriter::new(500, 4).unwrap();
        writer.fill(100, 400, 1 << 30);
        for i in 0..500 {
            let expected = if (100..400).contains(&i) { 1 << 30 } else { 0 };
            assert_eq!(writer.get(i), expected);
        }
    }

    #[test]
    fn resize_copies_prefix() {
        let mut writer = GrowableWriter::new(300, 7).unwrap();
        for i in 0..300 {
            writer.set(i, (i as u64) % 100);
        }
        let grown = writer.resize(500);
        assert_eq!(grown.len(), 500);
        for i in 0..300 {
            assert_eq!(grown.get(i), (i as u64) % 100);
        }
        for i in 300..500 {
            assert_eq!(grown.get(i), 0);
        }

        let shrunk = writer.resize(120);
        assert_eq!(shrunk.len(), 120);
        for i in 0..120 {
            assert_eq!(shrunk.get(i), (i as u64) % 100);
        }
    }
}
