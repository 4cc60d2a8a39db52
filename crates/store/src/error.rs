//! Store Error Types
//!
//! Structured errors using `exn` for automatic location tracking. Write
//! operations classify their failures so that a caller can tell a rejected
//! request (fix the input and try again) from a broken store (give up).

use derive_more::{Display, Error};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The database failed for reasons outside of the caller's control.
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// The request is malformed (missing identifier, inverted dates).
    #[display("invalid argument: {_0}")]
    InvalidArgument(#[error(not(source))] &'static str),
    /// The write would break a uniqueness, reference or loan interval rule.
    #[display("conflict: {_0}")]
    Conflict(#[error(not(source))] &'static str),
    #[display("{entity} #{id} does not exist")]
    NotFound { entity: &'static str, id: i64 },
}

impl ErrorKind {
    /// Returns `true` if retrying with corrected input might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::Conflict(_) | Self::NotFound { .. })
    }
}

/// Classify a failed statement, keeping the driver error as the child frame.
///
/// Constraint violations reported by SQLite are the caller's problem (the
/// explicit checks in the repositories should normally catch them first);
/// anything else is a store failure.
pub(crate) fn database(err: sqlx::Error) -> Error {
    use sqlx::error::ErrorKind as Violation;
    let kind = match err.as_database_error().map(|e| e.kind()) {
        Some(Violation::UniqueViolation) => ErrorKind::Conflict("identifier is already in use"),
        Some(Violation::ForeignKeyViolation) => ErrorKind::Conflict("record is referenced by other records"),
        Some(Violation::CheckViolation | Violation::NotNullViolation) => {
            ErrorKind::InvalidArgument("value rejected by a store constraint")
        },
        _ => ErrorKind::Database,
    };
    exn::Exn::from(err).raise(kind)
}
