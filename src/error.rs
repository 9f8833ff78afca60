use std::io;

use thiserror::Error;

use crate::disk::PageId;

/// Unified error type for the storage engine.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error from disk operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Data corruption detected (bad checksum, malformed log line, etc).
    #[error("Corruption: {0}")]
    Corruption(String),
    /// The caller broke an API contract (empty value, unsorted input, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// A serialized page did not have exactly `PAGE_SIZE` bytes.
    #[error("invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },
    /// Read past the last page of a page file.
    #[error("page {0} does not exist")]
    PageNotFound(PageId),
}

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
