//! Per-request failures.

use thiserror::Error;

/// A request that cannot be answered with content.
///
/// The `Display` text is what the client sees in the type `3` error line.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// Selector line missing, too long or not UTF-8
    #[error("invalid request")]
    Invalid,
    /// Resolved path does not exist or cannot be inspected
    #[error("not found")]
    NotFound,
    /// Path is a regular file that could not be opened
    #[error("couldn't open file")]
    Open,
}
