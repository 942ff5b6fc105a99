//! Error types for the packed-integer codecs.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Bits per value out of range: {0} (expected 1..=64)")]
    InvalidBitsPerValue(u32),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Data corruption: {0}")]
    Corruption(String),

    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    #[error("Unexpected end of stream")]
    EndOfStream,
}

pub type Result<T> = std::result::Result<T, Error>;
