//! Catalogue Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. The kinds mirror how callers must react: user errors
//! are surfaced verbatim and never retried, lost connections are recovered
//! by the retry wrapper, inconsistencies are fatal.

use derive_more::{Display, Error};
use exn::ResultExt;

/// A catalogue error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalogue operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong
/// internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Unclassified database failure.
    #[display("database error")]
    Database,
    /// The backend connection was lost mid-operation. Safe to retry: every
    /// multi-step operation commits all-or-nothing.
    #[display("lost connection to the catalogue database")]
    LostConnection,
    #[display("database migration error")]
    Migration,
    /// A value could not cross the model/row boundary.
    #[display("invalid catalogue data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    #[display("archive file {_0} does not exist in the catalogue")]
    ArchiveFileNotFound(#[error(not(source))] u64),
    #[display("storage class {_0} does not exist")]
    NoSuchStorageClass(#[error(not(source))] String),
    #[display("tape {_0} does not exist")]
    NoSuchTape(#[error(not(source))] String),
    /// A delete request disagreed with the catalogue's record of the file.
    #[display("cannot recycle archive file {archive_file_id}: request {field} does not match the catalogue")]
    DeleteRequestMismatch { archive_file_id: u64, field: &'static str },
    #[display("no file in the recycle log matches the search criteria")]
    NoRecycleLogMatch,
    #[display("more than one file in the recycle log matches the search criteria")]
    AmbiguousRecycleLogMatch,
    /// A live tape copy already occupies the copy number being restored.
    #[display("cannot restore copy {copy_nb} of archive file {archive_file_id}: a tape file with the same copy number already exists")]
    ConflictingTapeCopy { archive_file_id: u64, copy_nb: u32 },
    #[display("file size mismatch for archive file {archive_file_id}: expected {expected}, actual {actual}")]
    FileSizeMismatch { archive_file_id: u64, expected: u64, actual: u64 },
    #[display("checksum mismatch for archive file {archive_file_id}")]
    ChecksumMismatch { archive_file_id: u64 },
    /// The backend variant does not support this operation.
    #[display("not implemented: {_0}")]
    NotImplemented(#[error(not(source))] &'static str),
    /// Impossible state: a bug or out-of-band corruption, never retried.
    #[display("internal inconsistency: {_0}")]
    Inconsistency(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LostConnection)
    }

    /// Returns `true` if the failure was caused by the caller's input and
    /// should be surfaced verbatim.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::ArchiveFileNotFound(_)
                | Self::NoSuchStorageClass(_)
                | Self::NoSuchTape(_)
                | Self::DeleteRequestMismatch { .. }
                | Self::NoRecycleLogMatch
                | Self::AmbiguousRecycleLogMatch
                | Self::ConflictingTapeCopy { .. }
        )
    }

    fn from_sqlx(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::LostConnection,
            _ => Self::Database,
        }
    }
}

/// Classify sqlx failures before raising them, so the retry wrapper can
/// tell a dropped connection from a genuine database error.
pub(crate) trait DbResultExt<T> {
    fn or_db_err(self) -> Result<T>;
}
impl<T> DbResultExt<T> for std::result::Result<T, sqlx::Error> {
    #[track_caller]
    fn or_db_err(self) -> Result<T> {
        match self {
            Ok(value) => Ok(value),
            Err(source) => {
                let kind = ErrorKind::from_sqlx(&source);
                Err(source).or_raise(|| kind)
            },
        }
    }
}
