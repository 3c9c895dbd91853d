use serde::{Deserialize, Serialize};

/// Search filters for recycle-log listings and restores.
///
/// Every field is optional; set fields are combined with AND and match
/// exactly (no wildcards). An empty criteria matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecycleTapeFileSearchCriteria {
    pub archive_file_id: Option<u64>,
    pub disk_instance: Option<String>,
    pub vid: Option<String>,
    /// Disk file ids as decimal strings, matched against the id the file
    /// had when it was deleted.
    pub disk_file_ids: Option<Vec<String>>,
    pub copy_nb: Option<u32>,
    /// Inclusive lower bound on the recycle timestamp, unix epoch seconds.
    pub recycle_log_time_min: Option<u64>,
    /// Inclusive upper bound on the recycle timestamp, unix epoch seconds.
    pub recycle_log_time_max: Option<u64>,
    /// Virtual organization, resolved through the storage class.
    pub vo: Option<String>,
}

impl RecycleTapeFileSearchCriteria {
    /// Returns `true` if no filter is set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Search filters for archive-file listings and summaries.
///
/// Same semantics as [`RecycleTapeFileSearchCriteria`]: optional fields,
/// AND-combined, exact match only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveFileSearchCriteria {
    pub archive_file_id: Option<u64>,
    pub disk_instance: Option<String>,
    /// Matches archive files with at least one tape copy on this volume.
    pub vid: Option<String>,
    pub disk_file_ids: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_criteria() {
        assert!(RecycleTapeFileSearchCriteria::default().is_empty());
        let criteria = RecycleTapeFileSearchCriteria {
            vid: Some("V001".to_string()),
            ..Default::default()
        };
        assert!(!criteria.is_empty());
    }
}
