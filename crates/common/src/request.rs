use serde::{Deserialize, Serialize};

/// Request to move an archive file and all its tape copies to the recycle
/// log.
///
/// The mandatory fields must match the catalogue's record of the file; a
/// mismatch aborts the operation before anything is touched, because
/// deleting the wrong metadata is irrecoverable. The optional fields are
/// checked only when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteArchiveRequest {
    pub archive_file_id: u64,
    pub disk_instance: String,
    pub disk_file_id: String,
    pub disk_file_path: Option<String>,
    pub disk_file_size: Option<u64>,
    pub checksum_adler32: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    // Delete requests arrive over the wire from the disk-side workflow.
    #[test]
    fn test_request_deserializes_without_optional_fields() {
        let request: DeleteArchiveRequest = serde_json::from_str(
            r#"{"archive_file_id":42,"disk_instance":"eos-ctaeos","disk_file_id":"123","disk_file_path":null,"disk_file_size":null,"checksum_adler32":null}"#,
        )
        .unwrap();
        assert_eq!(request.archive_file_id, 42);
        assert!(request.disk_file_size.is_none());
    }
}
