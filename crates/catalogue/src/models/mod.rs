//! Database Row Models
//!
//! Private row structs mirroring query result sets, plus the conversions
//! between them and the shared domain types. SQLite stores every integer
//! as a signed 64-bit value, so each conversion narrows with an explicit
//! check instead of an `as` cast.

mod archive;
mod recycle;

pub(crate) use archive::{ArchiveFileJoinRow, ArchiveFileRowFolder};
pub(crate) use recycle::FileRecycleLogRow;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;

#[track_caller]
pub(crate) fn to_u64(value: i64, what: &'static str) -> Result<u64> {
    u64::try_from(value).or_raise(|| ErrorKind::InvalidData(what))
}

#[track_caller]
pub(crate) fn to_u32(value: i64, what: &'static str) -> Result<u32> {
    u32::try_from(value).or_raise(|| ErrorKind::InvalidData(what))
}

#[track_caller]
pub(crate) fn to_i64(value: u64, what: &'static str) -> Result<i64> {
    i64::try_from(value).or_raise(|| ErrorKind::InvalidData(what))
}
