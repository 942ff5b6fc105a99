//! Packed integer arrays and streams.
//!
//! Bit-level compression for sequences of 64-bit integers:
//! - Two storage formats: a continuous bitstream and a word-aligned
//!   single-block layout
//! - A streaming writer and iterator over any `io::Write` / `io::Read`
//! - Delta and monotonic block streams with header-only skipping
//! - Dense, auto-widening, and paged mutable arrays
//! - Stateless random-access readers over shared byte regions
//! - Compact in-memory i64 sequences with per-page modeling
//!
//! Payloads carry no self-describing header; callers persist the format
//! id, bit-width, and value count themselves and hand them back when
//! constructing a reader.

pub mod bits;
pub mod block;
pub mod bulk;
pub mod bytes;
pub mod direct;
pub mod error;
pub mod format;
pub mod growable;
pub mod long_values;
pub mod mutable;
pub mod paged;
pub mod stream;
pub mod varint;

// Re-exports from the codec core
pub use bits::{bits_required, max_value, zigzag_decode, zigzag_encode};
pub use bulk::BulkCodec;
pub use bytes::OwnedBytes;
pub use error::{Error, Result};
pub use format::Format;

// Re-exports from the streaming layer
pub use stream::{PackedReaderIterator, PackedWriter, DEFAULT_BUFFER_SIZE};

// Re-exports from the mutable arrays
pub use growable::GrowableWriter;
pub use mutable::{copy_values, Mutable, PackedArray};
pub use paged::{PagedGrowableWriter, PagedMutable};

// Re-exports from the random-access readers
pub use direct::{DirectPackedReader, DirectReader, SUPPORTED_BITS_PER_VALUE};

// Re-exports from the block-packed streams
pub use block::{
    BlockPackedReader, BlockPackedReaderIterator, BlockPackedWriter, BlockReadMode,
    BlockStreamVersion, MonotonicBlockPackedReader, MonotonicBlockPackedWriter,
};

// Re-exports from the in-memory sequences
pub use long_values::{LongValues, LongValuesBuilder, LongValuesIter, ModelKind};
