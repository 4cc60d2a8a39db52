//! Command Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    /// The circulation store failed for reasons outside of the user's control.
    #[display("circulation store error")]
    Store,
    /// The store or a listing refused the request as given.
    #[display("request rejected")]
    Rejected,
    #[display("invalid argument: {_0}")]
    InvalidArgument(#[error(not(source))] &'static str),
    #[display("{entity} #{id} does not exist")]
    NotFound { entity: &'static str, id: i64 },
    /// Writing the report or listing failed.
    #[display("could not write output")]
    Output,
}

impl ErrorKind {
    /// Returns `true` if re-running the command might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Config | Self::Rejected | Self::InvalidArgument(_) | Self::NotFound { .. })
    }
}

/// Wrap a store error, keeping apart what the user can fix from what they cannot.
pub fn store(err: shelf_store::error::Error) -> Error {
    let kind = if err.is_retryable() { ErrorKind::Rejected } else { ErrorKind::Store };
    err.raise(kind)
}

/// Wrap a listing error the same way as [`store`].
pub fn listing(err: shelf_view::error::Error) -> Error {
    let kind = if err.is_retryable() { ErrorKind::Rejected } else { ErrorKind::Store };
    err.raise(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use shelf_store::error::ErrorKind as StoreKind;
    use shelf_view::error::ErrorKind as ViewKind;

    #[rstest]
    #[case(StoreKind::Conflict("overlap"), true)]
    #[case(StoreKind::NotFound { entity: "loan", id: 1 }, true)]
    #[case(StoreKind::InvalidArgument("dates"), true)]
    #[case(StoreKind::Database, false)]
    #[case(StoreKind::Migration, false)]
    fn test_store_errors_are_classified(#[case] kind: StoreKind, #[case] rejected: bool) {
        let err = store(exn::Exn::from(kind));
        assert_eq!(matches!(&*err, ErrorKind::Rejected), rejected);
        assert_eq!(err.is_retryable(), rejected);
    }

    #[rstest]
    #[case(ViewKind::InvalidArgument("stride"), true)]
    #[case(ViewKind::OutOfRange { index: 4, len: 2 }, true)]
    #[case(ViewKind::Store, false)]
    fn test_listing_errors_are_classified(#[case] kind: ViewKind, #[case] rejected: bool) {
        let err = listing(exn::Exn::from(kind));
        assert_eq!(matches!(&*err, ErrorKind::Rejected), rejected);
    }
}
