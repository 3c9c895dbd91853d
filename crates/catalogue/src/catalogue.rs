//! Catalogue Facade
//!
//! One interface over the archive-file and recycle-log stores. Callers hold
//! a [`CatalogueHandle`] and never see the stores directly; cross-entity
//! invariants (copy-number conflicts at restore time) are enforced here
//! rather than inside any single store.

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use tapecat_common::{
    ArchiveFile, ArchiveFileQueueCriteria, ArchiveFileSearchCriteria, DeleteArchiveRequest,
    FileRecycleLog, RecycleTapeFileSearchCriteria, TapeFileSummary, TapeFileWritten,
};

/// Lazy, finite, non-restartable sequence of archive files.
///
/// The stream owns a pooled connection for its lifetime; drop it early to
/// release the connection without consuming the rest.
pub type ArchiveFileStream = BoxStream<'static, Result<ArchiveFile>>;
/// Lazy, finite, non-restartable sequence of recycle-log entries.
pub type FileRecycleLogStream = BoxStream<'static, Result<FileRecycleLog>>;

/// Shared, thread-safe handle to a catalogue implementation.
pub type CatalogueHandle = Arc<dyn Catalogue>;

/// The tape catalogue.
///
/// Every operation acquires its connections for the duration of the call
/// only, and every multi-step operation commits all-or-nothing, which is
/// what makes wholesale retry by [`RetryingCatalogue`] safe.
///
/// [`RetryingCatalogue`]: crate::RetryingCatalogue
#[async_trait]
pub trait Catalogue: Send + Sync {
    /// Allocate the next archive-file id without creating a row.
    async fn check_and_get_next_archive_file_id(&self) -> Result<u64>;

    /// Routing information for queueing an archive request of the given
    /// storage class.
    async fn archive_file_queue_criteria(
        &self,
        storage_class: &str,
    ) -> Result<ArchiveFileQueueCriteria>;

    /// Stream archive files matching the criteria, ordered by
    /// archive-file id.
    async fn archive_files_itor(
        &self,
        criteria: ArchiveFileSearchCriteria,
    ) -> Result<ArchiveFileStream>;

    /// Load the archive file a delete request refers to, after verifying
    /// the request matches the catalogue's record of it.
    async fn archive_file_for_deletion(
        &self,
        request: &DeleteArchiveRequest,
    ) -> Result<ArchiveFile>;

    /// Page of archive files with a tape copy on `vid` at or after
    /// `start_fseq`, ordered by fseq, at most `max_files` of them.
    async fn files_for_repack(
        &self,
        vid: &str,
        start_fseq: u64,
        max_files: u64,
    ) -> Result<Vec<ArchiveFile>>;

    /// Total bytes and file count of the tape files matching the criteria.
    async fn tape_file_summary(
        &self,
        criteria: &ArchiveFileSearchCriteria,
    ) -> Result<TapeFileSummary>;

    async fn archive_file_by_id(&self, archive_file_id: u64) -> Result<ArchiveFile>;

    async fn modify_archive_file_storage_class(
        &self,
        archive_file_id: u64,
        storage_class: &str,
    ) -> Result<()>;

    /// Update the disk-side identity of an archive file from a hexadecimal
    /// file id and a disk instance name.
    async fn modify_archive_file_fxid_and_disk_instance(
        &self,
        archive_file_id: u64,
        fxid: &str,
        disk_instance: &str,
    ) -> Result<()>;

    async fn update_disk_file_id(
        &self,
        archive_file_id: u64,
        disk_instance: &str,
        disk_file_id: &str,
    ) -> Result<()>;

    /// Soft-delete an archive file: move every tape copy into the recycle
    /// log and remove the live rows, atomically.
    async fn move_archive_file_to_recycle_log(&self, request: &DeleteArchiveRequest) -> Result<()>;

    /// Stream recycle-log entries matching the criteria, ordered by
    /// recycle-log id.
    async fn file_recycle_log_itor(
        &self,
        criteria: RecycleTapeFileSearchCriteria,
    ) -> Result<FileRecycleLogStream>;

    /// Restore the single recycle-log entry matching the criteria back to a
    /// live tape file, recreating the archive file under `new_disk_file_id`
    /// when no live one exists.
    async fn restore_file_in_recycle_log(
        &self,
        criteria: RecycleTapeFileSearchCriteria,
        new_disk_file_id: &str,
    ) -> Result<()>;

    /// Permanently purge every recycle-log entry for `vid`. Zero matches is
    /// success.
    async fn delete_files_from_recycle_log(&self, vid: &str) -> Result<()>;

    /// Record a tape copy reported by the write workflow, creating the
    /// archive file on the first copy and verifying size and checksum on
    /// later ones.
    async fn tape_file_written(&self, event: &TapeFileWritten) -> Result<()>;

    async fn create_storage_class(&self, name: &str, nb_copies: u32, vo: &str) -> Result<()>;

    async fn create_archive_route(
        &self,
        storage_class: &str,
        copy_nb: u32,
        tape_pool: &str,
    ) -> Result<()>;

    async fn create_tape(&self, vid: &str) -> Result<()>;

    async fn is_tape_dirty(&self, vid: &str) -> Result<bool>;
}
