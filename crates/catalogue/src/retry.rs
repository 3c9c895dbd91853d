//! Lost-Connection Retry Wrapper
//!
//! Re-issues a whole catalogue operation when the backend reports a lost
//! connection. This is only sound because every multi-step operation
//! commits all-or-nothing: a retried operation either never happened or
//! already completed, never half of each.

use crate::catalogue::{ArchiveFileStream, Catalogue, FileRecycleLogStream};
use crate::error::Result;
use async_trait::async_trait;
use std::future::Future;
use tapecat_common::{
    ArchiveFile, ArchiveFileQueueCriteria, ArchiveFileSearchCriteria, DeleteArchiveRequest,
    RecycleTapeFileSearchCriteria, TapeFileSummary, TapeFileWritten,
};

/// Default maximum attempts, counting the first one.
pub const DEFAULT_MAX_TRIES: u32 = 3;

/// Run `op` until it succeeds or fails with a non-retryable error, up to
/// `max_tries` attempts in total.
pub async fn retry_on_lost_connection<T, F, Fut>(max_tries: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if (*err).is_retryable() && attempt < max_tries => {
                let kind = &*err;
                tracing::warn!(attempt, max_tries, error = %kind, "catalogue operation failed, retrying");
                attempt += 1;
            },
            Err(err) => return Err(err),
        }
    }
}

/// Catalogue decorator that retries lost-connection failures.
pub struct RetryingCatalogue<C: Catalogue> {
    inner: C,
    max_tries: u32,
}

impl<C: Catalogue> RetryingCatalogue<C> {
    pub fn new(inner: C) -> Self {
        Self::with_max_tries(inner, DEFAULT_MAX_TRIES)
    }

    pub fn with_max_tries(inner: C, max_tries: u32) -> Self {
        Self { inner, max_tries: max_tries.max(1) }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

#[async_trait]
impl<C: Catalogue> Catalogue for RetryingCatalogue<C> {
    async fn check_and_get_next_archive_file_id(&self) -> Result<u64> {
        retry_on_lost_connection(self.max_tries, || {
            self.inner.check_and_get_next_archive_file_id()
        })
        .await
    }

    async fn archive_file_queue_criteria(
        &self,
        storage_class: &str,
    ) -> Result<ArchiveFileQueueCriteria> {
        retry_on_lost_connection(self.max_tries, || {
            self.inner.archive_file_queue_criteria(storage_class)
        })
        .await
    }

    async fn archive_files_itor(
        &self,
        criteria: ArchiveFileSearchCriteria,
    ) -> Result<ArchiveFileStream> {
        // Creating the stream is retryable; iterating it is not.
        retry_on_lost_connection(self.max_tries, || {
            self.inner.archive_files_itor(criteria.clone())
        })
        .await
    }

    async fn archive_file_for_deletion(
        &self,
        request: &DeleteArchiveRequest,
    ) -> Result<ArchiveFile> {
        retry_on_lost_connection(self.max_tries, || self.inner.archive_file_for_deletion(request))
            .await
    }

    async fn files_for_repack(
        &self,
        vid: &str,
        start_fseq: u64,
        max_files: u64,
    ) -> Result<Vec<ArchiveFile>> {
        retry_on_lost_connection(self.max_tries, || {
            self.inner.files_for_repack(vid, start_fseq, max_files)
        })
        .await
    }

    async fn tape_file_summary(
        &self,
        criteria: &ArchiveFileSearchCriteria,
    ) -> Result<TapeFileSummary> {
        retry_on_lost_connection(self.max_tries, || self.inner.tape_file_summary(criteria)).await
    }

    async fn archive_file_by_id(&self, archive_file_id: u64) -> Result<ArchiveFile> {
        retry_on_lost_connection(self.max_tries, || self.inner.archive_file_by_id(archive_file_id))
            .await
    }

    async fn modify_archive_file_storage_class(
        &self,
        archive_file_id: u64,
        storage_class: &str,
    ) -> Result<()> {
        retry_on_lost_connection(self.max_tries, || {
            self.inner.modify_archive_file_storage_class(archive_file_id, storage_class)
        })
        .await
    }

    async fn modify_archive_file_fxid_and_disk_instance(
        &self,
        archive_file_id: u64,
        fxid: &str,
        disk_instance: &str,
    ) -> Result<()> {
        retry_on_lost_connection(self.max_tries, || {
            self.inner.modify_archive_file_fxid_and_disk_instance(
                archive_file_id,
                fxid,
                disk_instance,
            )
        })
        .await
    }

    async fn update_disk_file_id(
        &self,
        archive_file_id: u64,
        disk_instance: &str,
        disk_file_id: &str,
    ) -> Result<()> {
        retry_on_lost_connection(self.max_tries, || {
            self.inner.update_disk_file_id(archive_file_id, disk_instance, disk_file_id)
        })
        .await
    }

    async fn move_archive_file_to_recycle_log(&self, request: &DeleteArchiveRequest) -> Result<()> {
        retry_on_lost_connection(self.max_tries, || {
            self.inner.move_archive_file_to_recycle_log(request)
        })
        .await
    }

    async fn file_recycle_log_itor(
        &self,
        criteria: RecycleTapeFileSearchCriteria,
    ) -> Result<FileRecycleLogStream> {
        retry_on_lost_connection(self.max_tries, || {
            self.inner.file_recycle_log_itor(criteria.clone())
        })
        .await
    }

    async fn restore_file_in_recycle_log(
        &self,
        criteria: RecycleTapeFileSearchCriteria,
        new_disk_file_id: &str,
    ) -> Result<()> {
        retry_on_lost_connection(self.max_tries, || {
            self.inner.restore_file_in_recycle_log(criteria.clone(), new_disk_file_id)
        })
        .await
    }

    async fn delete_files_from_recycle_log(&self, vid: &str) -> Result<()> {
        retry_on_lost_connection(self.max_tries, || self.inner.delete_files_from_recycle_log(vid))
            .await
    }

    async fn tape_file_written(&self, event: &TapeFileWritten) -> Result<()> {
        retry_on_lost_connection(self.max_tries, || self.inner.tape_file_written(event)).await
    }

    async fn create_storage_class(&self, name: &str, nb_copies: u32, vo: &str) -> Result<()> {
        retry_on_lost_connection(self.max_tries, || {
            self.inner.create_storage_class(name, nb_copies, vo)
        })
        .await
    }

    async fn create_archive_route(
        &self,
        storage_class: &str,
        copy_nb: u32,
        tape_pool: &str,
    ) -> Result<()> {
        retry_on_lost_connection(self.max_tries, || {
            self.inner.create_archive_route(storage_class, copy_nb, tape_pool)
        })
        .await
    }

    async fn create_tape(&self, vid: &str) -> Result<()> {
        retry_on_lost_connection(self.max_tries, || self.inner.create_tape(vid)).await
    }

    async fn is_tape_dirty(&self, vid: &str) -> Result<bool> {
        retry_on_lost_connection(self.max_tries, || self.inner.is_tape_dirty(vid)).await
    }
}
