//! Relational Catalogue Implementation
//!
//! Composes the archive-file and recycle-log stores over one database
//! handle. The restore state machine lives here because its copy-number
//! conflict check spans both stores.

use crate::archive::{fetch_archive_file, set_tape_dirty, ArchiveFileStore};
use crate::catalogue::{ArchiveFileStream, Catalogue, FileRecycleLogStream};
use crate::db::Database;
use crate::dialect::Dialect;
use crate::error::{DbResultExt, ErrorKind, Result};
use crate::id::IdAllocator;
use crate::recycle::{CopyNbResolution, KeepRecycledCopyNb, RecycleLogStore};
use async_trait::async_trait;
use exn::ResultExt;
use futures::StreamExt;
use std::sync::Arc;
use tapecat_common::{
    ArchiveFile, ArchiveFileQueueCriteria, ArchiveFileSearchCriteria, DeleteArchiveRequest,
    RecycleTapeFileSearchCriteria, TapeFileSummary, TapeFileWritten,
};
use time::OffsetDateTime;

fn unix_now() -> Result<u64> {
    u64::try_from(OffsetDateTime::now_utc().unix_timestamp())
        .or_raise(|| ErrorKind::InvalidData("system clock is before the unix epoch"))
}

/// The catalogue backed by a relational database.
pub struct RdbmsCatalogue {
    db: Database,
    archive: ArchiveFileStore,
    recycle: RecycleLogStore,
    dirty_on_restore: bool,
    copy_nb_resolution: Arc<dyn CopyNbResolution>,
}

impl RdbmsCatalogue {
    /// Build a catalogue over `db`, taking id allocation and dirty-flag
    /// behaviour from `dialect`.
    pub fn new(db: Database, dialect: Dialect) -> Self {
        let pool = db.pool().clone();
        Self {
            archive: ArchiveFileStore::new(pool.clone(), dialect.archive_file_id_allocator()),
            recycle: RecycleLogStore::new(pool, dialect.recycle_log_id_allocator()),
            dirty_on_restore: dialect.marks_tape_dirty_on_restore(),
            copy_nb_resolution: Arc::new(KeepRecycledCopyNb),
            db,
        }
    }

    /// Override whether a restore marks the destination tape dirty.
    pub fn with_dirty_on_restore(mut self, dirty_on_restore: bool) -> Self {
        self.dirty_on_restore = dirty_on_restore;
        self
    }

    /// Override how restored copies pick their copy number.
    pub fn with_copy_nb_resolution(mut self, resolution: Arc<dyn CopyNbResolution>) -> Self {
        self.copy_nb_resolution = resolution;
        self
    }

    /// Override the id allocation strategies picked by the dialect.
    pub fn with_id_allocators(
        self,
        archive_file_ids: Arc<dyn IdAllocator>,
        recycle_log_ids: Arc<dyn IdAllocator>,
    ) -> Self {
        let pool = self.db.pool().clone();
        Self {
            archive: ArchiveFileStore::new(pool.clone(), archive_file_ids),
            recycle: RecycleLogStore::new(pool, recycle_log_ids),
            ..self
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Resolve the criteria to exactly one recycle-log entry.
    ///
    /// The stream is fully dropped before returning so its connection is
    /// back in the pool when the caller opens the restore transaction.
    async fn single_recycle_log_match(
        &self,
        criteria: RecycleTapeFileSearchCriteria,
    ) -> Result<tapecat_common::FileRecycleLog> {
        let mut itor = self.recycle.itor(criteria).await?;
        let Some(first) = itor.next().await else {
            exn::bail!(ErrorKind::NoRecycleLogMatch);
        };
        let entry = first?;
        match itor.next().await {
            None => Ok(entry),
            Some(Ok(_)) => exn::bail!(ErrorKind::AmbiguousRecycleLogMatch),
            Some(Err(err)) => Err(err),
        }
    }
}

#[async_trait]
impl Catalogue for RdbmsCatalogue {
    async fn check_and_get_next_archive_file_id(&self) -> Result<u64> {
        self.archive.next_archive_file_id().await
    }

    async fn archive_file_queue_criteria(
        &self,
        storage_class: &str,
    ) -> Result<ArchiveFileQueueCriteria> {
        self.archive.queue_criteria(storage_class).await
    }

    async fn archive_files_itor(
        &self,
        criteria: ArchiveFileSearchCriteria,
    ) -> Result<ArchiveFileStream> {
        self.archive.itor(criteria).await
    }

    async fn archive_file_for_deletion(
        &self,
        request: &DeleteArchiveRequest,
    ) -> Result<ArchiveFile> {
        self.archive.for_deletion(request).await
    }

    async fn files_for_repack(
        &self,
        vid: &str,
        start_fseq: u64,
        max_files: u64,
    ) -> Result<Vec<ArchiveFile>> {
        self.archive.files_for_repack(vid, start_fseq, max_files).await
    }

    async fn tape_file_summary(
        &self,
        criteria: &ArchiveFileSearchCriteria,
    ) -> Result<TapeFileSummary> {
        self.archive.tape_file_summary(criteria).await
    }

    async fn archive_file_by_id(&self, archive_file_id: u64) -> Result<ArchiveFile> {
        self.archive.by_id(archive_file_id).await
    }

    async fn modify_archive_file_storage_class(
        &self,
        archive_file_id: u64,
        storage_class: &str,
    ) -> Result<()> {
        self.archive.modify_storage_class(archive_file_id, storage_class).await
    }

    async fn modify_archive_file_fxid_and_disk_instance(
        &self,
        archive_file_id: u64,
        fxid: &str,
        disk_instance: &str,
    ) -> Result<()> {
        self.archive.modify_fxid_and_disk_instance(archive_file_id, fxid, disk_instance).await
    }

    async fn update_disk_file_id(
        &self,
        archive_file_id: u64,
        disk_instance: &str,
        disk_file_id: &str,
    ) -> Result<()> {
        self.archive.update_disk_file_id(archive_file_id, disk_instance, disk_file_id).await
    }

    async fn move_archive_file_to_recycle_log(&self, request: &DeleteArchiveRequest) -> Result<()> {
        let reason = format!("deleted on request of disk instance {}", request.disk_instance);
        self.archive.move_to_recycle_log(&self.recycle, request, &reason, unix_now()?).await
    }

    async fn file_recycle_log_itor(
        &self,
        criteria: RecycleTapeFileSearchCriteria,
    ) -> Result<FileRecycleLogStream> {
        self.recycle.itor(criteria).await
    }

    async fn restore_file_in_recycle_log(
        &self,
        criteria: RecycleTapeFileSearchCriteria,
        new_disk_file_id: &str,
    ) -> Result<()> {
        let entry = self.single_recycle_log_match(criteria).await?;

        let mut tx = self.db.pool().begin().await.or_db_err()?;
        let live = fetch_archive_file(&mut *tx, entry.archive_file_id).await?;
        let copy_nb = self.copy_nb_resolution.resolve(&entry, live.as_ref());
        match live {
            None => {
                self.recycle.recreate_archive_file(&mut tx, &entry, new_disk_file_id).await?;
            },
            Some(file) => {
                // The recycle-log row is left untouched on conflict so the
                // caller can retry with different parameters.
                if file.tape_copy(copy_nb).is_some() {
                    exn::bail!(ErrorKind::ConflictingTapeCopy {
                        archive_file_id: entry.archive_file_id,
                        copy_nb,
                    });
                }
            },
        }
        self.recycle.restore_copy(&mut tx, &entry, copy_nb).await?;
        if self.dirty_on_restore {
            set_tape_dirty(&mut tx, &entry.vid).await?;
        }
        tx.commit().await.or_db_err()
    }

    async fn delete_files_from_recycle_log(&self, vid: &str) -> Result<()> {
        self.recycle.delete_by_vid(vid).await?;
        Ok(())
    }

    async fn tape_file_written(&self, event: &TapeFileWritten) -> Result<()> {
        self.archive.tape_file_written(event, unix_now()?).await
    }

    async fn create_storage_class(&self, name: &str, nb_copies: u32, vo: &str) -> Result<()> {
        self.archive.create_storage_class(name, nb_copies, vo).await
    }

    async fn create_archive_route(
        &self,
        storage_class: &str,
        copy_nb: u32,
        tape_pool: &str,
    ) -> Result<()> {
        self.archive.create_archive_route(storage_class, copy_nb, tape_pool).await
    }

    async fn create_tape(&self, vid: &str) -> Result<()> {
        self.archive.create_tape(vid).await
    }

    async fn is_tape_dirty(&self, vid: &str) -> Result<bool> {
        self.archive.is_tape_dirty(vid).await
    }
}
