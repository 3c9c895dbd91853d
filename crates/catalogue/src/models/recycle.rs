use super::{to_u32, to_u64};
use crate::error::Result;
use tapecat_common::FileRecycleLog;

/// One row of the recycle log joined to its storage class.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FileRecycleLogRow {
    pub file_recycle_log_id: i64,
    pub vid: String,
    pub fseq: i64,
    pub block_id: i64,
    pub copy_nb: i64,
    pub tape_file_creation_time: i64,
    pub archive_file_id: i64,
    pub disk_instance_name: String,
    pub disk_file_id: String,
    pub disk_file_id_when_deleted: String,
    pub disk_file_path: Option<String>,
    pub storage_class_name: String,
    pub size_in_bytes: i64,
    pub checksum_adler32: i64,
    pub archive_file_creation_time: i64,
    pub reason_log: String,
    pub recycle_log_time: i64,
}

impl TryFrom<FileRecycleLogRow> for FileRecycleLog {
    type Error = crate::error::Error;

    fn try_from(row: FileRecycleLogRow) -> Result<Self> {
        Ok(Self {
            file_recycle_log_id: to_u64(row.file_recycle_log_id, "file_recycle_log_id")?,
            vid: row.vid,
            fseq: to_u64(row.fseq, "file_recycle_log.fseq")?,
            block_id: to_u64(row.block_id, "file_recycle_log.block_id")?,
            copy_nb: to_u32(row.copy_nb, "file_recycle_log.copy_nb")?,
            tape_file_creation_time: to_u64(row.tape_file_creation_time, "tape_file_creation_time")?,
            archive_file_id: to_u64(row.archive_file_id, "file_recycle_log.archive_file_id")?,
            disk_instance_name: row.disk_instance_name,
            disk_file_id: row.disk_file_id,
            disk_file_id_when_deleted: row.disk_file_id_when_deleted,
            disk_file_path: row.disk_file_path,
            storage_class: row.storage_class_name,
            size_in_bytes: to_u64(row.size_in_bytes, "file_recycle_log.size_in_bytes")?,
            checksum_adler32: to_u32(row.checksum_adler32, "file_recycle_log.checksum_adler32")?,
            archive_file_creation_time: to_u64(
                row.archive_file_creation_time,
                "archive_file_creation_time",
            )?,
            reason_log: row.reason_log,
            recycle_log_time: to_u64(row.recycle_log_time, "recycle_log_time")?,
        })
    }
}
