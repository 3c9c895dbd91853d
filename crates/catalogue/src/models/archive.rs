use super::{to_u32, to_u64};
use crate::error::{ErrorKind, Result};
use tapecat_common::{ArchiveFile, TapeFile};

/// One row of the archive-file/tape-file join.
///
/// The join produces one row per tape copy; the folder below regroups them
/// into [`ArchiveFile`] values. Timestamp columns are aliased in the SQL
/// because both sides of the join have a `creation_time`.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArchiveFileJoinRow {
    pub archive_file_id: i64,
    pub disk_instance_name: String,
    pub disk_file_id: String,
    pub storage_class_name: String,
    pub size_in_bytes: i64,
    pub checksum_adler32: i64,
    pub archive_creation_time: i64,
    pub vid: String,
    pub fseq: i64,
    pub block_id: i64,
    pub copy_nb: i64,
    pub logical_size_in_bytes: i64,
    pub tape_creation_time: i64,
    pub superseded_by_vid: Option<String>,
}

impl ArchiveFileJoinRow {
    fn tape_file(&self) -> Result<TapeFile> {
        Ok(TapeFile {
            vid: self.vid.clone(),
            fseq: to_u64(self.fseq, "tape_file.fseq")?,
            block_id: to_u64(self.block_id, "tape_file.block_id")?,
            copy_nb: to_u32(self.copy_nb, "tape_file.copy_nb")?,
            logical_size_in_bytes: to_u64(self.logical_size_in_bytes, "tape_file.logical_size_in_bytes")?,
            creation_time: to_u64(self.tape_creation_time, "tape_file.creation_time")?,
            superseded_by_vid: self.superseded_by_vid.clone(),
        })
    }

    fn archive_file(&self) -> Result<ArchiveFile> {
        Ok(ArchiveFile {
            archive_file_id: to_u64(self.archive_file_id, "archive_file.archive_file_id")?,
            disk_instance_name: self.disk_instance_name.clone(),
            disk_file_id: self.disk_file_id.clone(),
            storage_class: self.storage_class_name.clone(),
            size_in_bytes: to_u64(self.size_in_bytes, "archive_file.size_in_bytes")?,
            checksum_adler32: to_u32(self.checksum_adler32, "archive_file.checksum_adler32")?,
            creation_time: to_u64(self.archive_creation_time, "archive_file.creation_time")?,
            tape_files: Vec::new(),
        })
    }
}

/// Regroups join rows ordered by `(archive_file_id, copy_nb)` into whole
/// archive files.
///
/// Feed rows in order with [`push`](Self::push); each call returns the
/// completed previous file when the archive-file id changes. Call
/// [`finish`](Self::finish) once the row source is exhausted to flush the
/// last file.
#[derive(Default)]
pub(crate) struct ArchiveFileRowFolder {
    current: Option<ArchiveFile>,
}

impl ArchiveFileRowFolder {
    pub(crate) fn push(&mut self, row: &ArchiveFileJoinRow) -> Result<Option<ArchiveFile>> {
        let tape_file = row.tape_file()?;
        match self.current.as_mut() {
            Some(file) if file.archive_file_id == to_u64(row.archive_file_id, "archive_file_id")? => {
                if file.tape_copy(tape_file.copy_nb).is_some() {
                    exn::bail!(ErrorKind::Inconsistency(
                        "duplicate copy number within one archive file"
                    ));
                }
                file.tape_files.push(tape_file);
                Ok(None)
            },
            _ => {
                let mut file = row.archive_file()?;
                file.tape_files.push(tape_file);
                Ok(self.current.replace(file))
            },
        }
    }

    pub(crate) fn finish(self) -> Option<ArchiveFile> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(archive_file_id: i64, copy_nb: i64, vid: &str) -> ArchiveFileJoinRow {
        ArchiveFileJoinRow {
            archive_file_id,
            disk_instance_name: "eos-ctaeos".to_string(),
            disk_file_id: format!("{archive_file_id}"),
            storage_class_name: "dual_copy".to_string(),
            size_in_bytes: 1234,
            checksum_adler32: 0x0badf00d,
            archive_creation_time: 1_700_000_000,
            vid: vid.to_string(),
            fseq: copy_nb * 10,
            block_id: 1,
            copy_nb,
            logical_size_in_bytes: 1234,
            tape_creation_time: 1_700_000_100,
            superseded_by_vid: None,
        }
    }

    #[test]
    fn test_folder_groups_rows_by_archive_file_id() {
        let mut folder = ArchiveFileRowFolder::default();
        assert!(folder.push(&row(1, 1, "V001")).unwrap().is_none());
        assert!(folder.push(&row(1, 2, "V002")).unwrap().is_none());
        let first = folder.push(&row(2, 1, "V001")).unwrap().unwrap();
        assert_eq!(first.archive_file_id, 1);
        assert_eq!(first.tape_files.len(), 2);
        let second = folder.finish().unwrap();
        assert_eq!(second.archive_file_id, 2);
        assert_eq!(second.tape_files.len(), 1);
    }

    #[test]
    fn test_folder_rejects_duplicate_copy_numbers() {
        let mut folder = ArchiveFileRowFolder::default();
        folder.push(&row(1, 1, "V001")).unwrap();
        assert!(folder.push(&row(1, 1, "V002")).is_err());
    }

    #[test]
    fn test_empty_folder_finishes_with_nothing() {
        assert!(ArchiveFileRowFolder::default().finish().is_none());
    }
}
