//! Configuration Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A configuration source could not be read or parsed.
    #[display("could not load configuration")]
    Load,
    /// The given configuration file is missing or in an unknown format.
    #[display("could not read configuration file {}", _0.display())]
    File(#[error(not(source))] PathBuf),
    /// A setting was read but holds an unusable value.
    #[display("invalid configuration value for `{_0}`")]
    Invalid(#[error(not(source))] &'static str),
    /// The platform has no per-user configuration or data directory.
    #[display("could not determine the user's configuration directory")]
    NoConfigDirectory,
}
