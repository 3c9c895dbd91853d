use serde::{Deserialize, Serialize};

/// A soft-deleted tape copy, held in the recycle log until it is either
/// restored or purged.
///
/// The row carries everything needed to reconstruct the [`TapeFile`] it came
/// from bit-for-bit, plus enough of the owning archive file to recreate that
/// too when no live archive file exists at restore time.
///
/// [`TapeFile`]: crate::TapeFile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecycleLog {
    pub file_recycle_log_id: u64,
    pub vid: String,
    pub fseq: u64,
    pub block_id: u64,
    pub copy_nb: u32,
    /// Creation time of the original tape copy, unix epoch seconds.
    pub tape_file_creation_time: u64,
    pub archive_file_id: u64,
    pub disk_instance_name: String,
    /// The disk file id the archive file had when it was created.
    pub disk_file_id: String,
    /// The disk file id at the moment of deletion. Usually the same as
    /// `disk_file_id`, but the disk side may have renumbered the file.
    pub disk_file_id_when_deleted: String,
    pub disk_file_path: Option<String>,
    pub storage_class: String,
    pub size_in_bytes: u64,
    pub checksum_adler32: u32,
    /// Creation time of the original archive file, unix epoch seconds.
    pub archive_file_creation_time: u64,
    /// Human-readable record of why the copy was recycled.
    pub reason_log: String,
    /// When the copy entered the recycle log, unix epoch seconds.
    pub recycle_log_time: u64,
}
