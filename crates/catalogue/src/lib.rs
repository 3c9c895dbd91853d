//! Tape-archive metadata catalogue.
//!
//! This crate tracks the files a tape archive holds: each logical
//! `ArchiveFile`, its physical `TapeFile` copies, and the recycle log that
//! soft-deleted copies pass through before being restored or purged for
//! good. The database is the source of truth for metadata only - file
//! content lives on tape and is never touched here.
//!
//! # Architecture
//! Callers hold a [`CatalogueHandle`] to a [`Catalogue`] implementation,
//! usually an [`RdbmsCatalogue`] wrapped in a [`RetryingCatalogue`]. The
//! facade composes two stores:
//! - **Archive file store**: live archive files and tape copies, lookups,
//!   repack paging, the atomic move into the recycle log.
//! - **Recycle log store**: search, restore, and permanent purge of
//!   soft-deleted copies.
//!
//! Per-engine differences (id allocation, dirty-flag propagation) are
//! bundled in a [`Dialect`] chosen at construction.

mod archive;
mod catalogue;
mod db;
mod dialect;
mod dummy;
pub mod error;
pub mod id;
mod models;
mod rdbms;
mod recycle;
mod retry;

pub use crate::catalogue::{ArchiveFileStream, Catalogue, CatalogueHandle, FileRecycleLogStream};
pub use crate::db::Database;
pub use crate::dialect::Dialect;
pub use crate::dummy::DummyCatalogue;
pub use crate::rdbms::RdbmsCatalogue;
pub use crate::recycle::{CopyNbResolution, KeepRecycledCopyNb, RepackCopyNbResolution};
pub use crate::retry::{retry_on_lost_connection, RetryingCatalogue, DEFAULT_MAX_TRIES};
