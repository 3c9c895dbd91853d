//! Archive File Store
//!
//! Query and mutation operations on the live side of the catalogue: the
//! `archive_file` and `tape_file` tables, the storage classes and routes
//! they reference, and the tapes the copies live on.
//!
//! Lookups always join on `tape_file`, so an archive-file row with zero
//! tape copies does not exist as far as callers are concerned.

use crate::catalogue::ArchiveFileStream;
use crate::error::{DbResultExt, ErrorKind, Result};
use crate::id::IdAllocator;
use crate::models::{to_i64, to_u64, ArchiveFileJoinRow, ArchiveFileRowFolder};
use crate::recycle::{storage_class_id, RecycleLogStore};
use async_stream::try_stream;
use exn::{OptionExt, ResultExt};
use futures::StreamExt;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::BTreeSet;
use std::sync::Arc;
use tapecat_common::{
    ArchiveFile, ArchiveFileQueueCriteria, ArchiveFileSearchCriteria, DeleteArchiveRequest,
    TapeFileSummary, TapeFileWritten,
};

/// Load an archive file with all its tape copies, ordered by copy number.
///
/// Returns `None` both when no row exists and when the row has no tape
/// copies left.
pub(crate) async fn fetch_archive_file(
    executor: impl sqlx::SqliteExecutor<'_>,
    archive_file_id: u64,
) -> Result<Option<ArchiveFile>> {
    let rows: Vec<ArchiveFileJoinRow> =
        sqlx::query_as(include_str!("../queries/select_archive_file_by_id.sql"))
            .bind(to_i64(archive_file_id, "archive_file_id")?)
            .fetch_all(executor)
            .await
            .or_db_err()?;
    let mut folder = ArchiveFileRowFolder::default();
    for row in &rows {
        if folder.push(row)?.is_some() {
            exn::bail!(ErrorKind::Inconsistency(
                "lookup by archive-file id returned more than one file"
            ));
        }
    }
    Ok(folder.finish())
}

/// Flag a tape so the next consistency check re-reconciles it.
pub(crate) async fn set_tape_dirty(conn: &mut SqliteConnection, vid: &str) -> Result<()> {
    let result = sqlx::query(include_str!("../queries/set_tape_dirty.sql"))
        .bind(vid)
        .execute(conn)
        .await
        .or_db_err()?;
    if result.rows_affected() == 0 {
        exn::bail!(ErrorKind::NoSuchTape(vid.to_string()));
    }
    Ok(())
}

// Extra columns in the result set are ignored by the derive.
#[derive(Debug, sqlx::FromRow)]
struct ArchiveFileOnlyRow {
    disk_instance_name: String,
    disk_file_id: String,
    size_in_bytes: i64,
    checksum_adler32: i64,
}

/// Operations on live archive files and their tape copies.
#[derive(Clone)]
pub(crate) struct ArchiveFileStore {
    pool: SqlitePool,
    ids: Arc<dyn IdAllocator>,
}

impl ArchiveFileStore {
    pub(crate) fn new(pool: SqlitePool, ids: Arc<dyn IdAllocator>) -> Self {
        Self { pool, ids }
    }

    /// Allocate the next archive-file id. Runs in its own transaction, so
    /// the id is burned even if the caller never uses it.
    pub(crate) async fn next_archive_file_id(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await.or_db_err()?;
        let id = self.ids.next_id(&mut tx).await?;
        tx.commit().await.or_db_err()?;
        Ok(id)
    }

    pub(crate) async fn by_id(&self, archive_file_id: u64) -> Result<ArchiveFile> {
        fetch_archive_file(&self.pool, archive_file_id)
            .await?
            .ok_or_raise(|| ErrorKind::ArchiveFileNotFound(archive_file_id))
    }

    /// Stream archive files matching `criteria`, ordered by archive-file
    /// id with copies ordered by copy number.
    pub(crate) async fn itor(
        &self,
        criteria: ArchiveFileSearchCriteria,
    ) -> Result<ArchiveFileStream> {
        let mut conn = self.pool.acquire().await.or_db_err()?;
        let stream = try_stream! {
            let mut builder = QueryBuilder::new(include_str!("../queries/select_archive_file.sql"));
            push_archive_filters(&mut builder, &criteria)?;
            builder.push(" ORDER BY af.archive_file_id ASC, tf.copy_nb ASC");
            let mut folder = ArchiveFileRowFolder::default();
            {
                let mut rows = builder.build_query_as::<ArchiveFileJoinRow>().fetch(&mut *conn);
                while let Some(row) = rows.next().await {
                    if let Some(file) = folder.push(&row.or_db_err()?)? {
                        yield file;
                    }
                }
            }
            if let Some(file) = folder.finish() {
                yield file;
            }
        };
        Ok(Box::pin(stream))
    }

    /// Load the archive file a delete request refers to, failing with a
    /// user error when the request disagrees with the catalogue.
    pub(crate) async fn for_deletion(&self, request: &DeleteArchiveRequest) -> Result<ArchiveFile> {
        let file = self.by_id(request.archive_file_id).await?;
        verify_delete_request(&file, request)?;
        Ok(file)
    }

    /// Soft-delete an archive file: copy every tape file into the recycle
    /// log, mark the affected tapes dirty, and delete the live rows, all
    /// in one transaction.
    ///
    /// A request for an archive file that does not exist is a logged
    /// no-op: deletion already happened, or never needed to.
    pub(crate) async fn move_to_recycle_log(
        &self,
        recycle: &RecycleLogStore,
        request: &DeleteArchiveRequest,
        reason: &str,
        now: u64,
    ) -> Result<()> {
        let Some(file) = fetch_archive_file(&self.pool, request.archive_file_id).await? else {
            tracing::warn!(
                archive_file_id = request.archive_file_id,
                disk_instance = %request.disk_instance,
                "ignoring request to recycle a non-existent archive file",
            );
            return Ok(());
        };
        verify_delete_request(&file, request)?;

        let mut tx = self.pool.begin().await.or_db_err()?;
        for tape_file in &file.tape_files {
            recycle
                .insert_recycled_copy(
                    &mut tx,
                    &file,
                    tape_file,
                    &request.disk_file_id,
                    request.disk_file_path.as_deref(),
                    reason,
                    now,
                )
                .await?;
        }
        let vids: BTreeSet<&str> = file.tape_files.iter().map(|tf| tf.vid.as_str()).collect();
        for vid in vids {
            set_tape_dirty(&mut tx, vid).await?;
        }
        let archive_file_id = to_i64(file.archive_file_id, "archive_file_id")?;
        sqlx::query(include_str!("../queries/delete_tape_files_of_archive_file.sql"))
            .bind(archive_file_id)
            .execute(&mut *tx)
            .await
            .or_db_err()?;
        sqlx::query(include_str!("../queries/delete_archive_file.sql"))
            .bind(archive_file_id)
            .execute(&mut *tx)
            .await
            .or_db_err()?;
        tx.commit().await.or_db_err()?;
        tracing::info!(
            archive_file_id = file.archive_file_id,
            copies = file.tape_files.len(),
            "moved archive file to recycle log",
        );
        Ok(())
    }

    /// Page of archive files with a tape copy on `vid` at or after
    /// `start_fseq`, ordered by fseq.
    pub(crate) async fn files_for_repack(
        &self,
        vid: &str,
        start_fseq: u64,
        max_files: u64,
    ) -> Result<Vec<ArchiveFile>> {
        let pages: Vec<(i64, i64)> =
            sqlx::query_as(include_str!("../queries/select_files_for_repack.sql"))
                .bind(vid)
                .bind(to_i64(start_fseq, "start_fseq")?)
                .bind(to_i64(max_files, "max_files")?)
                .fetch_all(&self.pool)
                .await
                .or_db_err()?;
        let mut files = Vec::with_capacity(pages.len());
        let mut seen = BTreeSet::new();
        for (archive_file_id, _fseq) in pages {
            let archive_file_id = to_u64(archive_file_id, "archive_file_id")?;
            // A file with several copies on the volume pages once per copy.
            if !seen.insert(archive_file_id) {
                continue;
            }
            let file = fetch_archive_file(&self.pool, archive_file_id)
                .await?
                .ok_or_raise(|| {
                    ErrorKind::Inconsistency("tape file references a missing archive file")
                })?;
            files.push(file);
        }
        Ok(files)
    }

    /// Total bytes and file count over the tape files matching `criteria`.
    pub(crate) async fn tape_file_summary(
        &self,
        criteria: &ArchiveFileSearchCriteria,
    ) -> Result<TapeFileSummary> {
        let mut builder = QueryBuilder::new(
            "SELECT COALESCE(SUM(tf.logical_size_in_bytes), 0) AS total_bytes, \
             COUNT(*) AS total_files \
             FROM tape_file AS tf \
             INNER JOIN archive_file AS af ON af.archive_file_id = tf.archive_file_id \
             WHERE 1 = 1",
        );
        if let Some(archive_file_id) = criteria.archive_file_id {
            builder.push(" AND af.archive_file_id = ");
            builder.push_bind(to_i64(archive_file_id, "archive_file_id")?);
        }
        if let Some(disk_instance) = &criteria.disk_instance {
            builder.push(" AND af.disk_instance_name = ");
            builder.push_bind(disk_instance.clone());
        }
        if let Some(vid) = &criteria.vid {
            builder.push(" AND tf.vid = ");
            builder.push_bind(vid.clone());
        }
        if let Some(disk_file_ids) = &criteria.disk_file_ids {
            builder.push(" AND af.disk_file_id IN (");
            let mut ids = builder.separated(", ");
            for disk_file_id in disk_file_ids {
                ids.push_bind(disk_file_id.clone());
            }
            builder.push(")");
        }
        let (total_bytes, total_files): (i64, i64) =
            builder.build_query_as().fetch_one(&self.pool).await.or_db_err()?;
        Ok(TapeFileSummary {
            total_bytes: to_u64(total_bytes, "total_bytes")?,
            total_files: to_u64(total_files, "total_files")?,
        })
    }

    /// Copy-number to tape-pool routing for a storage class.
    pub(crate) async fn queue_criteria(
        &self,
        storage_class: &str,
    ) -> Result<ArchiveFileQueueCriteria> {
        let mut conn = self.pool.acquire().await.or_db_err()?;
        storage_class_id(&mut conn, storage_class).await?;
        let routes: Vec<(i64, String)> =
            sqlx::query_as(include_str!("../queries/select_archive_routes.sql"))
                .bind(storage_class)
                .fetch_all(&mut *conn)
                .await
                .or_db_err()?;
        if routes.is_empty() {
            exn::bail!(ErrorKind::Inconsistency("storage class has no archive routes"));
        }
        let mut criteria = ArchiveFileQueueCriteria::default();
        for (copy_nb, tape_pool) in routes {
            let copy_nb = u32::try_from(copy_nb)
                .or_raise(|| ErrorKind::InvalidData("archive_route.copy_nb"))?;
            criteria.copy_to_pool_map.insert(copy_nb, tape_pool);
        }
        Ok(criteria)
    }

    pub(crate) async fn modify_storage_class(
        &self,
        archive_file_id: u64,
        storage_class: &str,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await.or_db_err()?;
        let storage_class_id = storage_class_id(&mut conn, storage_class).await?;
        let result =
            sqlx::query("UPDATE archive_file SET storage_class_id = ? WHERE archive_file_id = ?")
                .bind(storage_class_id)
                .bind(to_i64(archive_file_id, "archive_file_id")?)
                .execute(&mut *conn)
                .await
                .or_db_err()?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::ArchiveFileNotFound(archive_file_id));
        }
        Ok(())
    }

    /// Re-point an archive file at a new disk identity given the
    /// hexadecimal file id used on the disk side.
    pub(crate) async fn modify_fxid_and_disk_instance(
        &self,
        archive_file_id: u64,
        fxid: &str,
        disk_instance: &str,
    ) -> Result<()> {
        let disk_file_id = u64::from_str_radix(fxid.trim_start_matches("0x"), 16)
            .or_raise(|| ErrorKind::InvalidData("fxid is not a hexadecimal file id"))?
            .to_string();
        self.update_disk_file_id_inner(archive_file_id, disk_instance, &disk_file_id).await
    }

    pub(crate) async fn update_disk_file_id(
        &self,
        archive_file_id: u64,
        disk_instance: &str,
        disk_file_id: &str,
    ) -> Result<()> {
        self.update_disk_file_id_inner(archive_file_id, disk_instance, disk_file_id).await
    }

    async fn update_disk_file_id_inner(
        &self,
        archive_file_id: u64,
        disk_instance: &str,
        disk_file_id: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE archive_file SET disk_instance_name = ?, disk_file_id = ? \
             WHERE archive_file_id = ?",
        )
        .bind(disk_instance)
        .bind(disk_file_id)
        .bind(to_i64(archive_file_id, "archive_file_id")?)
        .execute(&self.pool)
        .await
        .or_db_err()?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::ArchiveFileNotFound(archive_file_id));
        }
        Ok(())
    }

    /// Record a tape copy reported by the write workflow.
    ///
    /// The first copy written creates the archive-file row; later copies
    /// must agree with it on size and checksum. Idempotent at the
    /// archive-file level, not at the tape-file level: re-reporting the
    /// same copy is a constraint violation.
    pub(crate) async fn tape_file_written(&self, event: &TapeFileWritten, now: u64) -> Result<()> {
        let mut tx = self.pool.begin().await.or_db_err()?;
        let existing: Option<ArchiveFileOnlyRow> =
            sqlx::query_as(include_str!("../queries/select_archive_file_row_by_id.sql"))
                .bind(to_i64(event.archive_file_id, "archive_file_id")?)
                .fetch_optional(&mut *tx)
                .await
                .or_db_err()?;
        match existing {
            None => {
                let storage_class_id = storage_class_id(&mut tx, &event.storage_class).await?;
                sqlx::query(include_str!("../queries/insert_archive_file.sql"))
                    .bind(to_i64(event.archive_file_id, "archive_file_id")?)
                    .bind(&event.disk_instance_name)
                    .bind(&event.disk_file_id)
                    .bind(storage_class_id)
                    .bind(to_i64(event.size_in_bytes, "size_in_bytes")?)
                    .bind(i64::from(event.checksum_adler32))
                    .bind(to_i64(now, "creation_time")?)
                    .execute(&mut *tx)
                    .await
                    .or_db_err()?;
            },
            Some(row) => {
                let size = to_u64(row.size_in_bytes, "size_in_bytes")?;
                if size != event.size_in_bytes {
                    exn::bail!(ErrorKind::FileSizeMismatch {
                        archive_file_id: event.archive_file_id,
                        expected: size,
                        actual: event.size_in_bytes,
                    });
                }
                let checksum = to_u64(row.checksum_adler32, "checksum_adler32")?;
                if checksum != u64::from(event.checksum_adler32) {
                    exn::bail!(ErrorKind::ChecksumMismatch {
                        archive_file_id: event.archive_file_id,
                    });
                }
                if row.disk_instance_name != event.disk_instance_name
                    || row.disk_file_id != event.disk_file_id
                {
                    exn::bail!(ErrorKind::Inconsistency(
                        "tape copies of one archive file report different disk identities"
                    ));
                }
            },
        }
        let tape_exists: Option<i64> =
            sqlx::query_scalar(include_str!("../queries/select_tape_dirty.sql"))
                .bind(&event.vid)
                .fetch_optional(&mut *tx)
                .await
                .or_db_err()?;
        if tape_exists.is_none() {
            exn::bail!(ErrorKind::NoSuchTape(event.vid.clone()));
        }
        sqlx::query(include_str!("../queries/insert_tape_file.sql"))
            .bind(to_i64(event.archive_file_id, "archive_file_id")?)
            .bind(&event.vid)
            .bind(to_i64(event.fseq, "fseq")?)
            .bind(to_i64(event.block_id, "block_id")?)
            .bind(i64::from(event.copy_nb))
            .bind(to_i64(event.size_in_bytes, "logical_size_in_bytes")?)
            .bind(to_i64(now, "creation_time")?)
            .bind(Option::<String>::None)
            .execute(&mut *tx)
            .await
            .or_db_err()?;
        tx.commit().await.or_db_err()?;
        tracing::debug!(
            archive_file_id = event.archive_file_id,
            vid = %event.vid,
            fseq = event.fseq,
            copy_nb = event.copy_nb,
            "recorded tape file written",
        );
        Ok(())
    }

    pub(crate) async fn create_storage_class(
        &self,
        name: &str,
        nb_copies: u32,
        vo: &str,
    ) -> Result<()> {
        sqlx::query("INSERT INTO storage_class (storage_class_name, nb_copies, vo) VALUES (?, ?, ?)")
            .bind(name)
            .bind(i64::from(nb_copies))
            .bind(vo)
            .execute(&self.pool)
            .await
            .or_db_err()?;
        Ok(())
    }

    pub(crate) async fn create_archive_route(
        &self,
        storage_class: &str,
        copy_nb: u32,
        tape_pool: &str,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await.or_db_err()?;
        let storage_class_id = storage_class_id(&mut conn, storage_class).await?;
        sqlx::query("INSERT INTO archive_route (storage_class_id, copy_nb, tape_pool) VALUES (?, ?, ?)")
            .bind(storage_class_id)
            .bind(i64::from(copy_nb))
            .bind(tape_pool)
            .execute(&mut *conn)
            .await
            .or_db_err()?;
        Ok(())
    }

    pub(crate) async fn create_tape(&self, vid: &str) -> Result<()> {
        sqlx::query("INSERT INTO tape (vid) VALUES (?)")
            .bind(vid)
            .execute(&self.pool)
            .await
            .or_db_err()?;
        Ok(())
    }

    pub(crate) async fn is_tape_dirty(&self, vid: &str) -> Result<bool> {
        let dirty: Option<i64> =
            sqlx::query_scalar(include_str!("../queries/select_tape_dirty.sql"))
                .bind(vid)
                .fetch_optional(&self.pool)
                .await
                .or_db_err()?;
        let dirty = dirty.ok_or_raise(|| ErrorKind::NoSuchTape(vid.to_string()))?;
        Ok(dirty != 0)
    }
}

/// Check a delete request against the catalogue's record of the file.
///
/// Recycling with mismatched parameters would destroy the wrong metadata
/// irrecoverably, so every mismatch is fatal to the request.
fn verify_delete_request(file: &ArchiveFile, request: &DeleteArchiveRequest) -> Result<()> {
    if file.disk_instance_name != request.disk_instance {
        exn::bail!(ErrorKind::DeleteRequestMismatch {
            archive_file_id: file.archive_file_id,
            field: "disk instance",
        });
    }
    if file.disk_file_id != request.disk_file_id {
        exn::bail!(ErrorKind::DeleteRequestMismatch {
            archive_file_id: file.archive_file_id,
            field: "disk file id",
        });
    }
    if let Some(size) = request.disk_file_size {
        if size != file.size_in_bytes {
            exn::bail!(ErrorKind::FileSizeMismatch {
                archive_file_id: file.archive_file_id,
                expected: file.size_in_bytes,
                actual: size,
            });
        }
    }
    if let Some(checksum) = request.checksum_adler32 {
        if checksum != file.checksum_adler32 {
            exn::bail!(ErrorKind::ChecksumMismatch { archive_file_id: file.archive_file_id });
        }
    }
    Ok(())
}

fn push_archive_filters(
    builder: &mut QueryBuilder<'_, Sqlite>,
    criteria: &ArchiveFileSearchCriteria,
) -> Result<()> {
    builder.push(" WHERE 1 = 1");
    if let Some(archive_file_id) = criteria.archive_file_id {
        builder.push(" AND af.archive_file_id = ");
        builder.push_bind(to_i64(archive_file_id, "archive_file_id")?);
    }
    if let Some(disk_instance) = &criteria.disk_instance {
        builder.push(" AND af.disk_instance_name = ");
        builder.push_bind(disk_instance.clone());
    }
    if let Some(vid) = &criteria.vid {
        // The file matches when any copy is on the volume, but all of its
        // copies are still streamed.
        builder.push(
            " AND EXISTS (SELECT 1 FROM tape_file AS tf2 \
             WHERE tf2.archive_file_id = af.archive_file_id AND tf2.vid = ",
        );
        builder.push_bind(vid.clone());
        builder.push(")");
    }
    if let Some(disk_file_ids) = &criteria.disk_file_ids {
        builder.push(" AND af.disk_file_id IN (");
        let mut ids = builder.separated(", ");
        for disk_file_id in disk_file_ids {
            ids.push_bind(disk_file_id.clone());
        }
        builder.push(")");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn file() -> ArchiveFile {
        ArchiveFile {
            archive_file_id: 42,
            disk_instance_name: "eos-ctaeos".to_string(),
            disk_file_id: "123".to_string(),
            storage_class: "single_copy".to_string(),
            size_in_bytes: 1234,
            checksum_adler32: 0x0badf00d,
            creation_time: 1_700_000_000,
            tape_files: Vec::new(),
        }
    }

    fn request() -> DeleteArchiveRequest {
        DeleteArchiveRequest {
            archive_file_id: 42,
            disk_instance: "eos-ctaeos".to_string(),
            disk_file_id: "123".to_string(),
            disk_file_path: None,
            disk_file_size: None,
            checksum_adler32: None,
        }
    }

    #[test]
    fn test_matching_delete_request_passes() {
        assert!(verify_delete_request(&file(), &request()).is_ok());
        let full = DeleteArchiveRequest {
            disk_file_size: Some(1234),
            checksum_adler32: Some(0x0badf00d),
            ..request()
        };
        assert!(verify_delete_request(&file(), &full).is_ok());
    }

    #[rstest]
    #[case::wrong_instance(DeleteArchiveRequest { disk_instance: "other".to_string(), ..request() })]
    #[case::wrong_disk_file_id(DeleteArchiveRequest { disk_file_id: "999".to_string(), ..request() })]
    #[case::wrong_size(DeleteArchiveRequest { disk_file_size: Some(1), ..request() })]
    #[case::wrong_checksum(DeleteArchiveRequest { checksum_adler32: Some(1), ..request() })]
    fn test_mismatched_delete_request_fails(#[case] bad: DeleteArchiveRequest) {
        assert!(verify_delete_request(&file(), &bad).is_err());
    }
}
