//! Recycle Log Store
//!
//! Soft-deleted tape copies live in the `file_recycle_log` table until
//! they are restored to live tape files or permanently purged by volume.
//! The store exposes the row-level pieces; the restore state machine that
//! orders them lives in the facade.

use crate::error::{DbResultExt, ErrorKind, Result};
use crate::id::IdAllocator;
use async_stream::try_stream;
use exn::OptionExt;
use futures::StreamExt;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::sync::Arc;
use tapecat_common::{ArchiveFile, FileRecycleLog, RecycleTapeFileSearchCriteria, TapeFile};

use crate::catalogue::FileRecycleLogStream;
use crate::models::{to_i64, FileRecycleLogRow};

/// Decides which copy number a restored tape file takes.
pub trait CopyNbResolution: Send + Sync {
    fn resolve(&self, entry: &FileRecycleLog, live_file: Option<&ArchiveFile>) -> u32;
}

/// Default resolution: the restored copy keeps the number it was recycled
/// with.
pub struct KeepRecycledCopyNb;

impl CopyNbResolution for KeepRecycledCopyNb {
    fn resolve(&self, entry: &FileRecycleLog, _live_file: Option<&ArchiveFile>) -> u32 {
        entry.copy_nb
    }
}

/// Repack-aware resolution: when a live copy records the recycled volume
/// in `superseded_by_vid`, the restored file takes over that copy's
/// number; otherwise it falls back to the recycled one.
pub struct RepackCopyNbResolution;

impl CopyNbResolution for RepackCopyNbResolution {
    fn resolve(&self, entry: &FileRecycleLog, live_file: Option<&ArchiveFile>) -> u32 {
        live_file
            .and_then(|file| {
                file.tape_files
                    .iter()
                    .find(|tf| tf.superseded_by_vid.as_deref() == Some(entry.vid.as_str()))
            })
            .map_or(entry.copy_nb, |tf| tf.copy_nb)
    }
}

/// Row-level operations on the recycle log.
#[derive(Clone)]
pub(crate) struct RecycleLogStore {
    pool: SqlitePool,
    ids: Arc<dyn IdAllocator>,
}

impl RecycleLogStore {
    pub(crate) fn new(pool: SqlitePool, ids: Arc<dyn IdAllocator>) -> Self {
        Self { pool, ids }
    }

    /// Stream recycle-log entries matching `criteria`, ordered by
    /// recycle-log id.
    ///
    /// The stream owns its pooled connection, so acquiring it here keeps
    /// stream creation retryable while iteration itself is not.
    pub(crate) async fn itor(
        &self,
        criteria: RecycleTapeFileSearchCriteria,
    ) -> Result<FileRecycleLogStream> {
        let mut conn = self.pool.acquire().await.or_db_err()?;
        let stream = try_stream! {
            let mut builder =
                QueryBuilder::new(include_str!("../queries/select_file_recycle_log.sql"));
            push_recycle_filters(&mut builder, &criteria)?;
            builder.push(" ORDER BY frl.file_recycle_log_id ASC");
            let mut rows = builder.build_query_as::<FileRecycleLogRow>().fetch(&mut *conn);
            while let Some(row) = rows.next().await {
                yield FileRecycleLog::try_from(row.or_db_err()?)?;
            }
        };
        Ok(Box::pin(stream))
    }

    /// Insert one recycle-log row for a tape copy being soft-deleted, on
    /// the caller's transaction connection.
    pub(crate) async fn insert_recycled_copy(
        &self,
        conn: &mut SqliteConnection,
        file: &ArchiveFile,
        tape_file: &TapeFile,
        deleted_disk_file_id: &str,
        disk_file_path: Option<&str>,
        reason: &str,
        now: u64,
    ) -> Result<u64> {
        let id = self.ids.next_id(conn).await?;
        let storage_class_id = storage_class_id(conn, &file.storage_class).await?;
        sqlx::query(include_str!("../queries/insert_file_recycle_log.sql"))
            .bind(to_i64(id, "file_recycle_log_id")?)
            .bind(&tape_file.vid)
            .bind(to_i64(tape_file.fseq, "fseq")?)
            .bind(to_i64(tape_file.block_id, "block_id")?)
            .bind(i64::from(tape_file.copy_nb))
            .bind(to_i64(tape_file.creation_time, "tape_file_creation_time")?)
            .bind(to_i64(file.archive_file_id, "archive_file_id")?)
            .bind(&file.disk_instance_name)
            .bind(&file.disk_file_id)
            .bind(deleted_disk_file_id)
            .bind(disk_file_path)
            .bind(storage_class_id)
            .bind(to_i64(file.size_in_bytes, "size_in_bytes")?)
            .bind(i64::from(file.checksum_adler32))
            .bind(to_i64(file.creation_time, "archive_file_creation_time")?)
            .bind(reason)
            .bind(to_i64(now, "recycle_log_time")?)
            .execute(conn)
            .await
            .or_db_err()?;
        tracing::debug!(
            file_recycle_log_id = id,
            archive_file_id = file.archive_file_id,
            vid = %tape_file.vid,
            fseq = tape_file.fseq,
            copy_nb = tape_file.copy_nb,
            "copied tape file to recycle log",
        );
        Ok(id)
    }

    /// Convert a recycle-log entry back into a live tape file and remove
    /// it from the log, on the caller's transaction connection.
    pub(crate) async fn restore_copy(
        &self,
        conn: &mut SqliteConnection,
        entry: &FileRecycleLog,
        copy_nb: u32,
    ) -> Result<()> {
        sqlx::query(include_str!("../queries/insert_tape_file.sql"))
            .bind(to_i64(entry.archive_file_id, "archive_file_id")?)
            .bind(&entry.vid)
            .bind(to_i64(entry.fseq, "fseq")?)
            .bind(to_i64(entry.block_id, "block_id")?)
            .bind(i64::from(copy_nb))
            .bind(to_i64(entry.size_in_bytes, "logical_size_in_bytes")?)
            .bind(to_i64(entry.tape_file_creation_time, "creation_time")?)
            .bind(Option::<String>::None)
            .execute(&mut *conn)
            .await
            .or_db_err()?;
        let deleted = sqlx::query(include_str!("../queries/delete_file_recycle_log_by_id.sql"))
            .bind(to_i64(entry.file_recycle_log_id, "file_recycle_log_id")?)
            .execute(conn)
            .await
            .or_db_err()?;
        if deleted.rows_affected() != 1 {
            exn::bail!(ErrorKind::Inconsistency(
                "recycle-log row disappeared while being restored"
            ));
        }
        tracing::info!(
            file_recycle_log_id = entry.file_recycle_log_id,
            archive_file_id = entry.archive_file_id,
            vid = %entry.vid,
            fseq = entry.fseq,
            copy_nb,
            "restored tape file from recycle log",
        );
        Ok(())
    }

    /// Recreate the archive-file row a recycled copy belonged to, under a
    /// caller-supplied disk file id, on the caller's transaction
    /// connection.
    pub(crate) async fn recreate_archive_file(
        &self,
        conn: &mut SqliteConnection,
        entry: &FileRecycleLog,
        new_disk_file_id: &str,
    ) -> Result<()> {
        let storage_class_id = storage_class_id(conn, &entry.storage_class).await?;
        sqlx::query(include_str!("../queries/insert_archive_file.sql"))
            .bind(to_i64(entry.archive_file_id, "archive_file_id")?)
            .bind(&entry.disk_instance_name)
            .bind(new_disk_file_id)
            .bind(storage_class_id)
            .bind(to_i64(entry.size_in_bytes, "size_in_bytes")?)
            .bind(i64::from(entry.checksum_adler32))
            .bind(to_i64(entry.archive_file_creation_time, "creation_time")?)
            .execute(conn)
            .await
            .or_db_err()?;
        tracing::info!(
            archive_file_id = entry.archive_file_id,
            disk_file_id = new_disk_file_id,
            "recreated archive file from recycle-log metadata",
        );
        Ok(())
    }

    /// Purge every recycle-log entry for `vid`. Returns the number of rows
    /// removed; zero is success, which is what makes the purge idempotent.
    pub(crate) async fn delete_by_vid(&self, vid: &str) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/delete_file_recycle_log_by_vid.sql"))
            .bind(vid)
            .execute(&self.pool)
            .await
            .or_db_err()?;
        tracing::info!(vid, rows = result.rows_affected(), "purged recycle log for volume");
        Ok(result.rows_affected())
    }
}

/// Resolve a storage class name to its row id.
pub(crate) async fn storage_class_id(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(include_str!("../queries/select_storage_class_id.sql"))
        .bind(name)
        .fetch_optional(conn)
        .await
        .or_db_err()?
        .ok_or_raise(|| ErrorKind::NoSuchStorageClass(name.to_string()))
}

fn push_recycle_filters(
    builder: &mut QueryBuilder<'_, Sqlite>,
    criteria: &RecycleTapeFileSearchCriteria,
) -> Result<()> {
    builder.push(" WHERE 1 = 1");
    if let Some(archive_file_id) = criteria.archive_file_id {
        builder.push(" AND frl.archive_file_id = ");
        builder.push_bind(to_i64(archive_file_id, "archive_file_id")?);
    }
    if let Some(disk_instance) = &criteria.disk_instance {
        builder.push(" AND frl.disk_instance_name = ");
        builder.push_bind(disk_instance.clone());
    }
    if let Some(vid) = &criteria.vid {
        builder.push(" AND frl.vid = ");
        builder.push_bind(vid.clone());
    }
    if let Some(disk_file_ids) = &criteria.disk_file_ids {
        builder.push(" AND frl.disk_file_id_when_deleted IN (");
        let mut ids = builder.separated(", ");
        for disk_file_id in disk_file_ids {
            ids.push_bind(disk_file_id.clone());
        }
        builder.push(")");
    }
    if let Some(copy_nb) = criteria.copy_nb {
        builder.push(" AND frl.copy_nb = ");
        builder.push_bind(i64::from(copy_nb));
    }
    if let Some(min) = criteria.recycle_log_time_min {
        builder.push(" AND frl.recycle_log_time >= ");
        builder.push_bind(to_i64(min, "recycle_log_time_min")?);
    }
    if let Some(max) = criteria.recycle_log_time_max {
        builder.push(" AND frl.recycle_log_time <= ");
        builder.push_bind(to_i64(max, "recycle_log_time_max")?);
    }
    if let Some(vo) = &criteria.vo {
        builder.push(" AND sc.vo = ");
        builder.push_bind(vo.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(vid: &str, copy_nb: u32) -> FileRecycleLog {
        FileRecycleLog {
            file_recycle_log_id: 1,
            vid: vid.to_string(),
            fseq: 7,
            block_id: 42,
            copy_nb,
            tape_file_creation_time: 1_700_000_100,
            archive_file_id: 42,
            disk_instance_name: "eos-ctaeos".to_string(),
            disk_file_id: "123".to_string(),
            disk_file_id_when_deleted: "123".to_string(),
            disk_file_path: None,
            storage_class: "single_copy".to_string(),
            size_in_bytes: 1234,
            checksum_adler32: 0x0badf00d,
            archive_file_creation_time: 1_700_000_000,
            reason_log: "deleted".to_string(),
            recycle_log_time: 1_700_000_200,
        }
    }

    fn live_file(superseded_by: Option<&str>) -> ArchiveFile {
        ArchiveFile {
            archive_file_id: 42,
            disk_instance_name: "eos-ctaeos".to_string(),
            disk_file_id: "123".to_string(),
            storage_class: "single_copy".to_string(),
            size_in_bytes: 1234,
            checksum_adler32: 0x0badf00d,
            creation_time: 1_700_000_000,
            tape_files: vec![TapeFile {
                vid: "V900".to_string(),
                fseq: 1,
                block_id: 1,
                copy_nb: 3,
                logical_size_in_bytes: 1234,
                creation_time: 1_700_000_300,
                superseded_by_vid: superseded_by.map(str::to_string),
            }],
        }
    }

    #[test]
    fn test_default_resolution_keeps_recycled_copy_nb() {
        let entry = entry("V001", 2);
        assert_eq!(KeepRecycledCopyNb.resolve(&entry, None), 2);
        assert_eq!(KeepRecycledCopyNb.resolve(&entry, Some(&live_file(None))), 2);
    }

    #[test]
    fn test_repack_resolution_reuses_superseding_copy_nb() {
        let entry = entry("V001", 2);
        let file = live_file(Some("V001"));
        assert_eq!(RepackCopyNbResolution.resolve(&entry, Some(&file)), 3);
    }

    #[test]
    fn test_repack_resolution_falls_back_without_superseding_copy() {
        let entry = entry("V001", 2);
        assert_eq!(RepackCopyNbResolution.resolve(&entry, None), 2);
        assert_eq!(RepackCopyNbResolution.resolve(&entry, Some(&live_file(Some("V777")))), 2);
    }
}
