//! Shared immutable byte regions backing the random-access readers.
//!
//! Packed payloads are decoded either from a sequential `io::Read` stream
//! or from an [`OwnedBytes`] region. The region is reference counted and
//! cheap to clone or slice, so several readers (and several threads) can
//! decode from the same buffer without copying it.

use std::ops::Range;
use std::sync::Arc;

/// A shared, immutable slice of bytes.
#[derive(Debug, Clone)]
pub struct OwnedBytes {
    data: Arc<Vec<u8>>,
    range: Range<usize>,
}

impl OwnedBytes {
    pub fn new(data: Vec<u8>) -> Self {
        let len = data.len();
        Self {
            data: Arc::new(data),
            range: 0..len,
        }
    }

    pub fn empty() -> Self {
        Self {
            data: Arc::new(Vec::new()),
            range: 0..0,
        }
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Narrow the region to `range` (relative to this region's start).
    pub fn slice(&self, range: Range<usize>) -> Self {
        let start = self.range.start + range.start;
        let end = self.range.start + range.end;
        assert!(end <= self.range.end, "slice out of bounds");
        Self {
            data: Arc::clone(&self.data),
            range: start..end,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.range.clone()]
    }
}

impl AsRef<[u8]> for OwnedBytes {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl std::ops::Deref for OwnedBytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl From<Vec<u8>> for OwnedBytes {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_is_relative() {
        let bytes = OwnedBytes::new((0u8..16).collect());
        let inner = bytes.slice(4..12);
        assert_eq!(inner.len(), 8);
        assert_eq!(inner[0], 4);
        let deeper = inner.slice(2..4);
        assert_eq!(deeper.as_slice(), &[6, 7]);
    }

    #[test]
    fn test_clone_shares_storage() {
        let bytes = OwnedBytes::new(vec![1, 2, 3]);
        let copy = bytes.clone();
        assert_eq!(bytes.as_slice(), copy.as_slice());
    }
}
