//! Error types for embedded block operations

use thiserror::Error;

/// Reason a scanned header was rejected during validation.
///
/// Corrupt headers are filtered out of [`BlockStore::blocks`](crate::BlockStore::blocks)
/// rather than reported, so one damaged region never hides the others.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptKind {
    #[error("invalid header magic")]
    InvalidMagic,

    #[error("header truncated by end of file")]
    Truncated,

    #[error("reserved header fields are not zero")]
    ReservedNotZero,

    #[error("data capacity extends past end of file")]
    CapacityOutOfBounds,

    #[error("short read of live data")]
    ShortData,

    #[error("invalid data length")]
    InvalidDataLength,

    #[error("invalid header crc32")]
    HeaderChecksum,

    #[error("invalid data checksum")]
    DataChecksum,
}

#[derive(Error, Debug)]
pub enum EmbedError {
    /// Seek, read, write, flush, open or close failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Signature shorter than a header
    #[error("Invalid signature size: {len} bytes (minimum {min})")]
    InvalidSize { len: usize, min: usize },

    /// Signature already claimed by this context
    #[error("Block already allocated for this signature")]
    AlreadyAllocated,

    #[error("Block not found: {0}")]
    NotFound(String),

    #[error("Data too large: {len} bytes exceeds block capacity {cap}")]
    DataTooLarge { len: usize, cap: u32 },

    #[error("Corrupt header: {0}")]
    CorruptHeader(#[from] CorruptKind),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EmbedError>;
