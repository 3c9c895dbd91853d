//! End-to-end lifecycle tests over an in-memory database: ingest, recycle,
//! search, restore, purge.

use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tapecat_catalogue::error::{ErrorKind, Result};
use tapecat_catalogue::{
    Catalogue, Database, Dialect, RdbmsCatalogue, RepackCopyNbResolution, RetryingCatalogue,
};
use tapecat_common::{
    ArchiveFile, ArchiveFileQueueCriteria, ArchiveFileSearchCriteria, DeleteArchiveRequest,
    RecycleTapeFileSearchCriteria, TapeFileSummary, TapeFileWritten,
};

const DISK_INSTANCE: &str = "eos-ctaeos";

async fn catalogue() -> RdbmsCatalogue {
    let db = Database::connect_in_memory().await.unwrap();
    let catalogue = RdbmsCatalogue::new(db, Dialect::Sqlite);
    catalogue.create_storage_class("single_copy", 1, "vo-atlas").await.unwrap();
    catalogue.create_archive_route("single_copy", 1, "pool_a").await.unwrap();
    for vid in ["V001", "V002", "V003"] {
        catalogue.create_tape(vid).await.unwrap();
    }
    catalogue
}

fn written(archive_file_id: u64, vid: &str, fseq: u64, copy_nb: u32) -> TapeFileWritten {
    TapeFileWritten {
        archive_file_id,
        disk_instance_name: DISK_INSTANCE.to_string(),
        disk_file_id: archive_file_id.to_string(),
        storage_class: "single_copy".to_string(),
        size_in_bytes: 1234,
        checksum_adler32: 0x0badf00d,
        vid: vid.to_string(),
        fseq,
        block_id: fseq * 100,
        copy_nb,
    }
}

fn delete_request(archive_file_id: u64) -> DeleteArchiveRequest {
    DeleteArchiveRequest {
        archive_file_id,
        disk_instance: DISK_INSTANCE.to_string(),
        disk_file_id: archive_file_id.to_string(),
        disk_file_path: Some(format!("/eos/cta/{archive_file_id}")),
        disk_file_size: Some(1234),
        checksum_adler32: Some(0x0badf00d),
    }
}

async fn recycle_rows(
    catalogue: &impl Catalogue,
    criteria: RecycleTapeFileSearchCriteria,
) -> Vec<tapecat_common::FileRecycleLog> {
    catalogue
        .file_recycle_log_itor(criteria)
        .await
        .unwrap()
        .map(|row| row.unwrap())
        .collect()
        .await
}

#[tokio::test]
async fn test_archive_files_without_tape_copies_are_invisible() {
    let catalogue = catalogue().await;
    catalogue.tape_file_written(&written(1, "V001", 1, 1)).await.unwrap();
    assert!(catalogue.archive_file_by_id(1).await.is_ok());

    sqlx::query("DELETE FROM tape_file WHERE archive_file_id = 1")
        .execute(catalogue.database().pool())
        .await
        .unwrap();

    let err = catalogue.archive_file_by_id(1).await.unwrap_err();
    assert!(matches!(*err, ErrorKind::ArchiveFileNotFound(1)));
    let files: Vec<Result<ArchiveFile>> = catalogue
        .archive_files_itor(ArchiveFileSearchCriteria::default())
        .await
        .unwrap()
        .collect()
        .await;
    assert!(files.is_empty());
}

#[tokio::test]
async fn test_move_single_copy_file_to_recycle_log() {
    let catalogue = catalogue().await;
    catalogue.tape_file_written(&written(42, "V001", 7, 1)).await.unwrap();

    catalogue.move_archive_file_to_recycle_log(&delete_request(42)).await.unwrap();

    let err = catalogue.archive_file_by_id(42).await.unwrap_err();
    assert!(matches!(*err, ErrorKind::ArchiveFileNotFound(42)));
    let rows = recycle_rows(
        &catalogue,
        RecycleTapeFileSearchCriteria { vid: Some("V001".to_string()), ..Default::default() },
    )
    .await;
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.archive_file_id, 42);
    assert_eq!(row.vid, "V001");
    assert_eq!(row.fseq, 7);
    assert_eq!(row.copy_nb, 1);
    assert_eq!(row.disk_file_id_when_deleted, "42");
    assert_eq!(row.disk_file_path.as_deref(), Some("/eos/cta/42"));
    assert_eq!(row.storage_class, "single_copy");
    // Moving a file marks every affected tape dirty.
    assert!(catalogue.is_tape_dirty("V001").await.unwrap());
}

#[tokio::test]
async fn test_move_of_missing_file_is_a_noop() {
    let catalogue = catalogue().await;
    catalogue.move_archive_file_to_recycle_log(&delete_request(9999)).await.unwrap();
    assert!(recycle_rows(&catalogue, RecycleTapeFileSearchCriteria::default()).await.is_empty());
}

#[tokio::test]
async fn test_move_with_mismatched_request_changes_nothing() {
    let catalogue = catalogue().await;
    catalogue.tape_file_written(&written(42, "V001", 7, 1)).await.unwrap();

    let bad = DeleteArchiveRequest { disk_file_id: "999".to_string(), ..delete_request(42) };
    let err = catalogue.move_archive_file_to_recycle_log(&bad).await.unwrap_err();
    assert!(matches!(*err, ErrorKind::DeleteRequestMismatch { archive_file_id: 42, .. }));
    assert!((*err).is_user_error());

    assert!(catalogue.archive_file_by_id(42).await.is_ok());
    assert!(recycle_rows(&catalogue, RecycleTapeFileSearchCriteria::default()).await.is_empty());
}

#[tokio::test]
async fn test_restore_round_trip_is_bit_for_bit() {
    let catalogue = catalogue().await;
    catalogue.tape_file_written(&written(42, "V001", 7, 1)).await.unwrap();
    let before = catalogue.archive_file_by_id(42).await.unwrap();

    catalogue.move_archive_file_to_recycle_log(&delete_request(42)).await.unwrap();
    catalogue
        .restore_file_in_recycle_log(
            RecycleTapeFileSearchCriteria {
                archive_file_id: Some(42),
                ..Default::default()
            },
            "42",
        )
        .await
        .unwrap();

    let after = catalogue.archive_file_by_id(42).await.unwrap();
    assert_eq!(after, before);
    assert!(recycle_rows(&catalogue, RecycleTapeFileSearchCriteria::default()).await.is_empty());
}

#[tokio::test]
async fn test_restore_with_no_match_is_a_user_error() {
    let catalogue = catalogue().await;
    let err = catalogue
        .restore_file_in_recycle_log(RecycleTapeFileSearchCriteria::default(), "1")
        .await
        .unwrap_err();
    assert!(matches!(*err, ErrorKind::NoRecycleLogMatch));
    assert!((*err).is_user_error());
}

#[tokio::test]
async fn test_ambiguous_restore_leaves_rows_untouched() {
    let catalogue = catalogue().await;
    catalogue.tape_file_written(&written(1, "V001", 1, 1)).await.unwrap();
    catalogue.tape_file_written(&written(2, "V001", 2, 1)).await.unwrap();
    catalogue.move_archive_file_to_recycle_log(&delete_request(1)).await.unwrap();
    catalogue.move_archive_file_to_recycle_log(&delete_request(2)).await.unwrap();

    let criteria =
        RecycleTapeFileSearchCriteria { vid: Some("V001".to_string()), ..Default::default() };
    let err =
        catalogue.restore_file_in_recycle_log(criteria.clone(), "1").await.unwrap_err();
    assert!(matches!(*err, ErrorKind::AmbiguousRecycleLogMatch));
    assert_eq!(recycle_rows(&catalogue, criteria).await.len(), 2);
}

#[tokio::test]
async fn test_restore_rejects_conflicting_copy_number() {
    let catalogue = catalogue().await;
    catalogue.tape_file_written(&written(42, "V001", 7, 1)).await.unwrap();
    catalogue.move_archive_file_to_recycle_log(&delete_request(42)).await.unwrap();
    // The file is re-ingested onto another volume under the same copy
    // number before anyone restores the recycled one.
    catalogue.tape_file_written(&written(42, "V002", 1, 1)).await.unwrap();

    let criteria =
        RecycleTapeFileSearchCriteria { archive_file_id: Some(42), ..Default::default() };
    let err = catalogue.restore_file_in_recycle_log(criteria.clone(), "42").await.unwrap_err();
    assert!(matches!(*err, ErrorKind::ConflictingTapeCopy { archive_file_id: 42, copy_nb: 1 }));

    assert_eq!(recycle_rows(&catalogue, criteria).await.len(), 1);
    let live = catalogue.archive_file_by_id(42).await.unwrap();
    assert_eq!(live.tape_files.len(), 1);
    assert_eq!(live.tape_files[0].vid, "V002");
}

#[tokio::test]
async fn test_restore_recreates_missing_archive_file_under_new_id() {
    let catalogue = catalogue().await;
    catalogue.tape_file_written(&written(42, "V001", 7, 1)).await.unwrap();
    catalogue.move_archive_file_to_recycle_log(&delete_request(42)).await.unwrap();

    catalogue
        .restore_file_in_recycle_log(
            RecycleTapeFileSearchCriteria { archive_file_id: Some(42), ..Default::default() },
            "777",
        )
        .await
        .unwrap();

    let restored = catalogue.archive_file_by_id(42).await.unwrap();
    assert_eq!(restored.disk_file_id, "777");
    assert_eq!(restored.tape_files.len(), 1);
    assert_eq!(restored.tape_files[0].vid, "V001");
    assert_eq!(restored.tape_files[0].fseq, 7);
}

#[tokio::test]
async fn test_purge_by_volume_is_idempotent() {
    let catalogue = catalogue().await;
    catalogue.tape_file_written(&written(1, "V002", 1, 1)).await.unwrap();
    catalogue.tape_file_written(&written(2, "V002", 2, 1)).await.unwrap();
    catalogue.tape_file_written(&written(3, "V003", 1, 1)).await.unwrap();
    for id in [1, 2, 3] {
        catalogue.move_archive_file_to_recycle_log(&delete_request(id)).await.unwrap();
    }

    catalogue.delete_files_from_recycle_log("V002").await.unwrap();
    assert!(recycle_rows(
        &catalogue,
        RecycleTapeFileSearchCriteria { vid: Some("V002".to_string()), ..Default::default() },
    )
    .await
    .is_empty());
    let untouched = recycle_rows(
        &catalogue,
        RecycleTapeFileSearchCriteria { vid: Some("V003".to_string()), ..Default::default() },
    )
    .await;
    assert_eq!(untouched.len(), 1);
    assert_eq!(untouched[0].archive_file_id, 3);

    // Purging again, or purging a volume with no entries, succeeds.
    catalogue.delete_files_from_recycle_log("V002").await.unwrap();
    catalogue.delete_files_from_recycle_log("V999").await.unwrap();
}

#[tokio::test]
async fn test_recycle_log_filters_combine_with_and() {
    let catalogue = catalogue().await;
    catalogue.tape_file_written(&written(1, "V001", 1, 1)).await.unwrap();
    catalogue.tape_file_written(&written(2, "V002", 1, 1)).await.unwrap();
    catalogue.move_archive_file_to_recycle_log(&delete_request(1)).await.unwrap();
    catalogue.move_archive_file_to_recycle_log(&delete_request(2)).await.unwrap();

    let both = recycle_rows(&catalogue, RecycleTapeFileSearchCriteria::default()).await;
    assert_eq!(both.len(), 2);
    // Ordered by recycle-log id, which follows insertion order.
    assert!(both[0].file_recycle_log_id < both[1].file_recycle_log_id);

    let matching = recycle_rows(
        &catalogue,
        RecycleTapeFileSearchCriteria {
            vid: Some("V001".to_string()),
            copy_nb: Some(1),
            disk_instance: Some(DISK_INSTANCE.to_string()),
            vo: Some("vo-atlas".to_string()),
            disk_file_ids: Some(vec!["1".to_string()]),
            ..Default::default()
        },
    )
    .await;
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].archive_file_id, 1);

    // One failing conjunct filters the row out.
    let none = recycle_rows(
        &catalogue,
        RecycleTapeFileSearchCriteria {
            vid: Some("V001".to_string()),
            copy_nb: Some(2),
            ..Default::default()
        },
    )
    .await;
    assert!(none.is_empty());

    let after = recycle_rows(
        &catalogue,
        RecycleTapeFileSearchCriteria {
            recycle_log_time_min: Some(both[0].recycle_log_time),
            recycle_log_time_max: Some(both[1].recycle_log_time),
            ..Default::default()
        },
    )
    .await;
    assert_eq!(after.len(), 2);
    let cutoff = recycle_rows(
        &catalogue,
        RecycleTapeFileSearchCriteria {
            recycle_log_time_max: Some(both[0].recycle_log_time.saturating_sub(1)),
            ..Default::default()
        },
    )
    .await;
    assert!(cutoff.is_empty());
}

#[tokio::test]
async fn test_dirty_flag_on_restore_is_a_backend_capability() {
    let catalogue = catalogue().await.with_dirty_on_restore(true);
    catalogue.tape_file_written(&written(42, "V001", 7, 1)).await.unwrap();
    catalogue.move_archive_file_to_recycle_log(&delete_request(42)).await.unwrap();
    sqlx::query("UPDATE tape SET dirty = 0")
        .execute(catalogue.database().pool())
        .await
        .unwrap();

    catalogue
        .restore_file_in_recycle_log(
            RecycleTapeFileSearchCriteria { archive_file_id: Some(42), ..Default::default() },
            "42",
        )
        .await
        .unwrap();
    assert!(catalogue.is_tape_dirty("V001").await.unwrap());
}

#[tokio::test]
async fn test_restore_without_dirty_capability_leaves_tape_clean() {
    let catalogue = catalogue().await;
    catalogue.tape_file_written(&written(42, "V001", 7, 1)).await.unwrap();
    catalogue.move_archive_file_to_recycle_log(&delete_request(42)).await.unwrap();
    sqlx::query("UPDATE tape SET dirty = 0")
        .execute(catalogue.database().pool())
        .await
        .unwrap();

    catalogue
        .restore_file_in_recycle_log(
            RecycleTapeFileSearchCriteria { archive_file_id: Some(42), ..Default::default() },
            "42",
        )
        .await
        .unwrap();
    assert!(!catalogue.is_tape_dirty("V001").await.unwrap());
}

#[tokio::test]
async fn test_repack_resolution_applies_at_restore() {
    let catalogue =
        catalogue().await.with_copy_nb_resolution(Arc::new(RepackCopyNbResolution));
    catalogue.tape_file_written(&written(42, "V001", 7, 1)).await.unwrap();
    catalogue.move_archive_file_to_recycle_log(&delete_request(42)).await.unwrap();
    // A live copy on another volume superseded V001 during a repack.
    catalogue.tape_file_written(&written(42, "V002", 1, 2)).await.unwrap();
    sqlx::query("UPDATE tape_file SET superseded_by_vid = 'V001' WHERE vid = 'V002'")
        .execute(catalogue.database().pool())
        .await
        .unwrap();

    let err = catalogue
        .restore_file_in_recycle_log(
            RecycleTapeFileSearchCriteria { archive_file_id: Some(42), ..Default::default() },
            "42",
        )
        .await
        .unwrap_err();
    // The resolved number is the superseding copy's, which is live, so the
    // restore reports a conflict on copy 2 rather than copy 1.
    assert!(matches!(*err, ErrorKind::ConflictingTapeCopy { archive_file_id: 42, copy_nb: 2 }));
}

#[tokio::test]
async fn test_files_for_repack_pages_by_fseq() {
    let catalogue = catalogue().await;
    for (id, fseq) in [(1_u64, 1_u64), (2, 5), (3, 9)] {
        catalogue.tape_file_written(&written(id, "V001", fseq, 1)).await.unwrap();
    }

    let page = catalogue.files_for_repack("V001", 5, 10).await.unwrap();
    assert_eq!(
        page.iter().map(|f| f.archive_file_id).collect::<Vec<_>>(),
        vec![2, 3],
    );
    let limited = catalogue.files_for_repack("V001", 1, 2).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert!(catalogue.files_for_repack("V999", 1, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tape_file_summary_counts_matching_copies() {
    let catalogue = catalogue().await;
    catalogue.tape_file_written(&written(1, "V001", 1, 1)).await.unwrap();
    catalogue.tape_file_written(&written(2, "V002", 1, 1)).await.unwrap();

    let all = catalogue.tape_file_summary(&ArchiveFileSearchCriteria::default()).await.unwrap();
    assert_eq!(all, TapeFileSummary { total_bytes: 2468, total_files: 2 });
    let one = catalogue
        .tape_file_summary(&ArchiveFileSearchCriteria {
            vid: Some("V001".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(one, TapeFileSummary { total_bytes: 1234, total_files: 1 });
}

#[tokio::test]
async fn test_queue_criteria_maps_copies_to_pools() {
    let catalogue = catalogue().await;
    let criteria = catalogue.archive_file_queue_criteria("single_copy").await.unwrap();
    let expected: ArchiveFileQueueCriteria = ArchiveFileQueueCriteria {
        copy_to_pool_map: [(1, "pool_a".to_string())].into_iter().collect(),
    };
    assert_eq!(criteria, expected);

    let err = catalogue.archive_file_queue_criteria("no_such_class").await.unwrap_err();
    assert!(matches!(*err, ErrorKind::NoSuchStorageClass(_)));
}

#[tokio::test]
async fn test_modify_operations_update_live_rows() {
    let catalogue = catalogue().await;
    catalogue.create_storage_class("dual_copy", 2, "vo-cms").await.unwrap();
    catalogue.tape_file_written(&written(42, "V001", 7, 1)).await.unwrap();

    catalogue.modify_archive_file_storage_class(42, "dual_copy").await.unwrap();
    assert_eq!(catalogue.archive_file_by_id(42).await.unwrap().storage_class, "dual_copy");

    catalogue.update_disk_file_id(42, "eos-other", "555").await.unwrap();
    let file = catalogue.archive_file_by_id(42).await.unwrap();
    assert_eq!(file.disk_instance_name, "eos-other");
    assert_eq!(file.disk_file_id, "555");

    // fxid is hexadecimal; 0x2a is 42 decimal.
    catalogue.modify_archive_file_fxid_and_disk_instance(42, "2a", DISK_INSTANCE).await.unwrap();
    let file = catalogue.archive_file_by_id(42).await.unwrap();
    assert_eq!(file.disk_file_id, "42");
    assert_eq!(file.disk_instance_name, DISK_INSTANCE);

    let err = catalogue
        .modify_archive_file_fxid_and_disk_instance(42, "zz", DISK_INSTANCE)
        .await
        .unwrap_err();
    assert!(matches!(*err, ErrorKind::InvalidData(_)));
    let err = catalogue.modify_archive_file_storage_class(9999, "dual_copy").await.unwrap_err();
    assert!(matches!(*err, ErrorKind::ArchiveFileNotFound(9999)));
}

#[tokio::test]
async fn test_next_archive_file_id_is_monotonic() {
    let catalogue = catalogue().await;
    let first = catalogue.check_and_get_next_archive_file_id().await.unwrap();
    let second = catalogue.check_and_get_next_archive_file_id().await.unwrap();
    assert!(second > first);
}

#[tokio::test]
async fn test_tape_file_written_verifies_later_copies() {
    let catalogue = catalogue().await;
    catalogue.tape_file_written(&written(42, "V001", 7, 1)).await.unwrap();

    let mut wrong_size = written(42, "V002", 1, 2);
    wrong_size.size_in_bytes = 1;
    let err = catalogue.tape_file_written(&wrong_size).await.unwrap_err();
    assert!(matches!(*err, ErrorKind::FileSizeMismatch { archive_file_id: 42, .. }));

    let mut wrong_checksum = written(42, "V002", 1, 2);
    wrong_checksum.checksum_adler32 = 1;
    let err = catalogue.tape_file_written(&wrong_checksum).await.unwrap_err();
    assert!(matches!(*err, ErrorKind::ChecksumMismatch { archive_file_id: 42 }));

    let unknown_tape = written(42, "V999", 1, 2);
    let err = catalogue.tape_file_written(&unknown_tape).await.unwrap_err();
    assert!(matches!(*err, ErrorKind::NoSuchTape(_)));
}

/// Wraps a real catalogue and reports a lost connection the first time the
/// marked operation is called, before any work happens.
struct FlakyCatalogue {
    inner: RdbmsCatalogue,
    failed_once: AtomicBool,
}

impl FlakyCatalogue {
    fn new(inner: RdbmsCatalogue) -> Self {
        Self { inner, failed_once: AtomicBool::new(false) }
    }

    fn inject_failure(&self) -> Result<()> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            exn::bail!(ErrorKind::LostConnection);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Catalogue for FlakyCatalogue {
    async fn check_and_get_next_archive_file_id(&self) -> Result<u64> {
        self.inner.check_and_get_next_archive_file_id().await
    }

    async fn archive_file_queue_criteria(
        &self,
        storage_class: &str,
    ) -> Result<ArchiveFileQueueCriteria> {
        self.inner.archive_file_queue_criteria(storage_class).await
    }

    async fn archive_files_itor(
        &self,
        criteria: ArchiveFileSearchCriteria,
    ) -> Result<tapecat_catalogue::ArchiveFileStream> {
        self.inner.archive_files_itor(criteria).await
    }

    async fn archive_file_for_deletion(
        &self,
        request: &DeleteArchiveRequest,
    ) -> Result<ArchiveFile> {
        self.inner.archive_file_for_deletion(request).await
    }

    async fn files_for_repack(
        &self,
        vid: &str,
        start_fseq: u64,
        max_files: u64,
    ) -> Result<Vec<ArchiveFile>> {
        self.inner.files_for_repack(vid, start_fseq, max_files).await
    }

    async fn tape_file_summary(
        &self,
        criteria: &ArchiveFileSearchCriteria,
    ) -> Result<TapeFileSummary> {
        self.inner.tape_file_summary(criteria).await
    }

    async fn archive_file_by_id(&self, archive_file_id: u64) -> Result<ArchiveFile> {
        self.inner.archive_file_by_id(archive_file_id).await
    }

    async fn modify_archive_file_storage_class(
        &self,
        archive_file_id: u64,
        storage_class: &str,
    ) -> Result<()> {
        self.inner.modify_archive_file_storage_class(archive_file_id, storage_class).await
    }

    async fn modify_archive_file_fxid_and_disk_instance(
        &self,
        archive_file_id: u64,
        fxid: &str,
        disk_instance: &str,
    ) -> Result<()> {
        self.inner
            .modify_archive_file_fxid_and_disk_instance(archive_file_id, fxid, disk_instance)
            .await
    }

    async fn update_disk_file_id(
        &self,
        archive_file_id: u64,
        disk_instance: &str,
        disk_file_id: &str,
    ) -> Result<()> {
        self.inner.update_disk_file_id(archive_file_id, disk_instance, disk_file_id).await
    }

    async fn move_archive_file_to_recycle_log(&self, request: &DeleteArchiveRequest) -> Result<()> {
        self.inject_failure()?;
        self.inner.move_archive_file_to_recycle_log(request).await
    }

    async fn file_recycle_log_itor(
        &self,
        criteria: RecycleTapeFileSearchCriteria,
    ) -> Result<tapecat_catalogue::FileRecycleLogStream> {
        self.inner.file_recycle_log_itor(criteria).await
    }

    async fn restore_file_in_recycle_log(
        &self,
        criteria: RecycleTapeFileSearchCriteria,
        new_disk_file_id: &str,
    ) -> Result<()> {
        self.inner.restore_file_in_recycle_log(criteria, new_disk_file_id).await
    }

    async fn delete_files_from_recycle_log(&self, vid: &str) -> Result<()> {
        self.inject_failure()?;
        self.inner.delete_files_from_recycle_log(vid).await
    }

    async fn tape_file_written(&self, event: &TapeFileWritten) -> Result<()> {
        self.inner.tape_file_written(event).await
    }

    async fn create_storage_class(&self, name: &str, nb_copies: u32, vo: &str) -> Result<()> {
        self.inner.create_storage_class(name, nb_copies, vo).await
    }

    async fn create_archive_route(
        &self,
        storage_class: &str,
        copy_nb: u32,
        tape_pool: &str,
    ) -> Result<()> {
        self.inner.create_archive_route(storage_class, copy_nb, tape_pool).await
    }

    async fn create_tape(&self, vid: &str) -> Result<()> {
        self.inner.create_tape(vid).await
    }

    async fn is_tape_dirty(&self, vid: &str) -> Result<bool> {
        self.inner.is_tape_dirty(vid).await
    }
}

#[tokio::test]
async fn test_retry_wrapper_recovers_from_one_lost_connection() {
    let inner = catalogue().await;
    inner.tape_file_written(&written(1, "V001", 1, 1)).await.unwrap();
    inner.move_archive_file_to_recycle_log(&delete_request(1)).await.unwrap();

    let retrying = RetryingCatalogue::new(FlakyCatalogue::new(inner));
    // The first attempt fails with a lost connection before any work; the
    // retried operation runs to completion with the same final state.
    retrying.delete_files_from_recycle_log("V001").await.unwrap();
    assert!(recycle_rows(&retrying, RecycleTapeFileSearchCriteria::default()).await.is_empty());
}

#[tokio::test]
async fn test_retry_wrapper_does_not_mask_user_errors() {
    let inner = catalogue().await;
    let retrying = RetryingCatalogue::new(FlakyCatalogue::new(inner));
    let err = retrying
        .restore_file_in_recycle_log(RecycleTapeFileSearchCriteria::default(), "1")
        .await
        .unwrap_err();
    assert!(matches!(*err, ErrorKind::NoRecycleLogMatch));
}
