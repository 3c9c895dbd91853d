use serde::{Deserialize, Serialize};

/// A logical file tracked by the catalogue.
///
/// An archive file only "exists" while at least one [`TapeFile`] references
/// it: a row with zero tape copies is reported as not found by every lookup.
/// The `(disk_instance_name, disk_file_id)` pair identifies the file on the
/// disk side; `archive_file_id` identifies it on the tape side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveFile {
    pub archive_file_id: u64,
    pub disk_instance_name: String,
    pub disk_file_id: String,
    pub storage_class: String,
    pub size_in_bytes: u64,
    pub checksum_adler32: u32,
    /// Unix epoch seconds.
    pub creation_time: u64,
    /// All live tape copies, ordered by copy number.
    pub tape_files: Vec<TapeFile>,
}

impl ArchiveFile {
    /// Look up a tape copy by its copy number.
    pub fn tape_copy(&self, copy_nb: u32) -> Option<&TapeFile> {
        self.tape_files.iter().find(|tf| tf.copy_nb == copy_nb)
    }
}

/// One physical instance of an archive file's content on tape.
///
/// Identified by `(vid, fseq)` on the medium and by `copy_nb` within the
/// archive file. `superseded_by_vid` is set when a repack has rewritten the
/// copy onto another volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeFile {
    pub vid: String,
    pub fseq: u64,
    pub block_id: u64,
    pub copy_nb: u32,
    pub logical_size_in_bytes: u64,
    /// Unix epoch seconds.
    pub creation_time: u64,
    pub superseded_by_vid: Option<String>,
}

/// Event reported by the tape-write workflow when a copy lands on tape.
///
/// The first copy written creates the archive-file row; later copies must
/// agree with it on size and checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeFileWritten {
    pub archive_file_id: u64,
    pub disk_instance_name: String,
    pub disk_file_id: String,
    pub storage_class: String,
    pub size_in_bytes: u64,
    pub checksum_adler32: u32,
    pub vid: String,
    pub fseq: u64,
    pub block_id: u64,
    pub copy_nb: u32,
}
