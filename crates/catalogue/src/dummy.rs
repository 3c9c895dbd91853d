//! Placeholder catalogue for wiring and tests: every operation fails with
//! `NotImplemented`.

use crate::catalogue::{ArchiveFileStream, Catalogue, FileRecycleLogStream};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use tapecat_common::{
    ArchiveFile, ArchiveFileQueueCriteria, ArchiveFileSearchCriteria, DeleteArchiveRequest,
    RecycleTapeFileSearchCriteria, TapeFileSummary, TapeFileWritten,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct DummyCatalogue;

#[async_trait]
impl Catalogue for DummyCatalogue {
    async fn check_and_get_next_archive_file_id(&self) -> Result<u64> {
        exn::bail!(ErrorKind::NotImplemented("check_and_get_next_archive_file_id"))
    }

    async fn archive_file_queue_criteria(
        &self,
        _storage_class: &str,
    ) -> Result<ArchiveFileQueueCriteria> {
        exn::bail!(ErrorKind::NotImplemented("archive_file_queue_criteria"))
    }

    async fn archive_files_itor(
        &self,
        _criteria: ArchiveFileSearchCriteria,
    ) -> Result<ArchiveFileStream> {
        exn::bail!(ErrorKind::NotImplemented("archive_files_itor"))
    }

    async fn archive_file_for_deletion(
        &self,
        _request: &DeleteArchiveRequest,
    ) -> Result<ArchiveFile> {
        exn::bail!(ErrorKind::NotImplemented("archive_file_for_deletion"))
    }

    async fn files_for_repack(
        &self,
        _vid: &str,
        _start_fseq: u64,
        _max_files: u64,
    ) -> Result<Vec<ArchiveFile>> {
        exn::bail!(ErrorKind::NotImplemented("files_for_repack"))
    }

    async fn tape_file_summary(
        &self,
        _criteria: &ArchiveFileSearchCriteria,
    ) -> Result<TapeFileSummary> {
        exn::bail!(ErrorKind::NotImplemented("tape_file_summary"))
    }

    async fn archive_file_by_id(&self, _archive_file_id: u64) -> Result<ArchiveFile> {
        exn::bail!(ErrorKind::NotImplemented("archive_file_by_id"))
    }

    async fn modify_archive_file_storage_class(
        &self,
        _archive_file_id: u64,
        _storage_class: &str,
    ) -> Result<()> {
        exn::bail!(ErrorKind::NotImplemented("modify_archive_file_storage_class"))
    }

    async fn modify_archive_file_fxid_and_disk_instance(
        &self,
        _archive_file_id: u64,
        _fxid: &str,
        _disk_instance: &str,
    ) -> Result<()> {
        exn::bail!(ErrorKind::NotImplemented("modify_archive_file_fxid_and_disk_instance"))
    }

    async fn update_disk_file_id(
        &self,
        _archive_file_id: u64,
        _disk_instance: &str,
        _disk_file_id: &str,
    ) -> Result<()> {
        exn::bail!(ErrorKind::NotImplemented("update_disk_file_id"))
    }

    async fn move_archive_file_to_recycle_log(
        &self,
        _request: &DeleteArchiveRequest,
    ) -> Result<()> {
        exn::bail!(ErrorKind::NotImplemented("move_archive_file_to_recycle_log"))
    }

    async fn file_recycle_log_itor(
        &self,
        _criteria: RecycleTapeFileSearchCriteria,
    ) -> Result<FileRecycleLogStream> {
        exn::bail!(ErrorKind::NotImplemented("file_recycle_log_itor"))
    }

    async fn restore_file_in_recycle_log(
        &self,
        _criteria: RecycleTapeFileSearchCriteria,
        _new_disk_file_id: &str,
    ) -> Result<()> {
        exn::bail!(ErrorKind::NotImplemented("restore_file_in_recycle_log"))
    }

    async fn delete_files_from_recycle_log(&self, _vid: &str) -> Result<()> {
        exn::bail!(ErrorKind::NotImplemented("delete_files_from_recycle_log"))
    }

    async fn tape_file_written(&self, _event: &TapeFileWritten) -> Result<()> {
        exn::bail!(ErrorKind::NotImplemented("tape_file_written"))
    }

    async fn create_storage_class(&self, _name: &str, _nb_copies: u32, _vo: &str) -> Result<()> {
        exn::bail!(ErrorKind::NotImplemented("create_storage_class"))
    }

    async fn create_archive_route(
        &self,
        _storage_class: &str,
        _copy_nb: u32,
        _tape_pool: &str,
    ) -> Result<()> {
        exn::bail!(ErrorKind::NotImplemented("create_archive_route"))
    }

    async fn create_tape(&self, _vid: &str) -> Result<()> {
        exn::bail!(ErrorKind::NotImplemented("create_tape"))
    }

    async fn is_tape_dirty(&self, _vid: &str) -> Result<bool> {
        exn::bail!(ErrorKind::NotImplemented("is_tape_dirty"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_operation_is_unimplemented() {
        let catalogue = DummyCatalogue;
        let err = catalogue.check_and_get_next_archive_file_id().await.unwrap_err();
        assert!(matches!(*err, ErrorKind::NotImplemented(_)));
        let err = catalogue.delete_files_from_recycle_log("V001").await.unwrap_err();
        assert!(matches!(*err, ErrorKind::NotImplemented(_)));
    }
}
