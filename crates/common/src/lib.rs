//! Shared data structures for the tapecat catalogue.
//!
//! These are plain domain types with no database knowledge: the catalogue
//! crate owns the row representations and the conversions between the two.
//! Everything here is serde-serializable so operator tooling can print or
//! export records without reaching into the catalogue crate.

mod archive;
mod criteria;
mod recycle;
mod request;
mod summary;

pub use crate::archive::{ArchiveFile, TapeFile, TapeFileWritten};
pub use crate::criteria::{ArchiveFileSearchCriteria, RecycleTapeFileSearchCriteria};
pub use crate::recycle::FileRecycleLog;
pub use crate::request::DeleteArchiveRequest;
pub use crate::summary::{ArchiveFileQueueCriteria, TapeFileSummary};
