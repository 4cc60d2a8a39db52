//! View Error Types
//!
//! Structured errors using `exn` for automatic location tracking. Argument
//! problems are detected before the backing source is touched; anything the
//! source itself reports is wrapped as [`ErrorKind::Store`] with the source's
//! own error kept as a child in the error tree.

use derive_more::{Display, Error};

/// A view error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for view operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Malformed request (zero stride, zero page size).
    #[display("invalid argument: {_0}")]
    InvalidArgument(#[error(not(source))] &'static str),
    /// Single-index lookup outside `[0, len)`.
    #[display("index {index} is out of range for a view of length {len}")]
    OutOfRange { index: u64, len: u64 },
    /// The backing source failed to produce a page or a length.
    #[display("backing store failure")]
    Store,
}

impl ErrorKind {
    /// Returns `true` if retrying with corrected input might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::OutOfRange { .. })
    }
}
