//! CLI Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("catalogue error: {_0}")]
    Catalogue(#[error(not(source))] String),
    /// The arguments parsed but do not form a valid request.
    #[display("{_0}")]
    Usage(#[error(not(source))] &'static str),
}
