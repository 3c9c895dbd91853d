use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Routing information the scheduler needs to queue an archive request:
/// which tape pool receives each copy of a storage class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveFileQueueCriteria {
    /// Copy number to tape-pool name, one entry per expected copy.
    pub copy_to_pool_map: BTreeMap<u32, String>,
}

/// Aggregate over the tape files matching a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeFileSummary {
    pub total_bytes: u64,
    pub total_files: u64,
}
