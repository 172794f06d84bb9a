//! services/api/src/intake.rs
//!
//! File intake for uploaded contracts: extension and size validation,
//! collision-resistant storage naming, and the write to the upload directory.
//!
//! The upload directory itself is created once at startup; this module
//! assumes it exists.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use crate::config::MAX_UPLOAD_BYTES;

/// The closed set of document formats the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Pdf,
    Docx,
}

impl MediaType {
    /// Derived purely from the file extension; the content is never sniffed.
    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Unsupported file type '{0}'. Use: .pdf, .docx")]
    UnsupportedType(String),
    #[error("File too large. Maximum: {} MB", MAX_UPLOAD_BYTES / (1024 * 1024))]
    TooLarge,
    #[error("Failed to store file: {0}")]
    Storage(#[from] std::io::Error),
}

/// A validated upload, durably written under its generated storage name.
#[derive(Debug)]
pub struct StoredUpload {
    pub path: PathBuf,
    pub original_name: String,
    pub bytes: Bytes,
    pub media_type: MediaType,
}

/// Validates and stores one uploaded file.
///
/// Validation order: extension allow-list first, then the size ceiling.
/// Nothing touches the filesystem until both checks pass. The storage name
/// is a fresh v4 UUID with the original extension preserved, so concurrent
/// uploads never collide without any coordination.
pub async fn accept(
    upload_dir: &Path,
    original_name: &str,
    bytes: Bytes,
) -> Result<StoredUpload, IntakeError> {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let media_type = MediaType::from_extension(&extension)
        .ok_or_else(|| IntakeError::UnsupportedType(format!(".{}", extension)))?;

    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(IntakeError::TooLarge);
    }

    let storage_name = format!("{}.{}", Uuid::new_v4(), extension);
    let path = upload_dir.join(storage_name);

    if let Err(e) = tokio::fs::write(&path, &bytes).await {
        // A failed write can leave a partial file behind; remove it before
        // surfacing the storage error.
        remove_file(&path).await;
        return Err(IntakeError::Storage(e));
    }

    Ok(StoredUpload {
        path,
        original_name: original_name.to_string(),
        bytes,
        media_type,
    })
}

/// Best-effort cleanup of a stored upload after a failed pipeline run.
pub async fn remove_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove stored upload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_unsupported_extension_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let result = accept(dir.path(), "notes.txt", Bytes::from_static(b"hello")).await;
        assert!(matches!(result, Err(IntakeError::UnsupportedType(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn rejects_missing_extension() {
        let dir = tempfile::tempdir().unwrap();
        let result = accept(dir.path(), "contract", Bytes::from_static(b"hello")).await;
        assert!(matches!(result, Err(IntakeError::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn rejects_oversized_file_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let big = Bytes::from(vec![0u8; MAX_UPLOAD_BYTES + 1]);
        let result = accept(dir.path(), "contract.pdf", big).await;
        assert!(matches!(result, Err(IntakeError::TooLarge)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn extension_match_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let stored = accept(dir.path(), "Contract.PDF", Bytes::from_static(b"%PDF-"))
            .await
            .unwrap();
        assert_eq!(stored.media_type, MediaType::Pdf);
        assert!(stored.path.to_string_lossy().ends_with(".pdf"));
    }

    #[tokio::test]
    async fn stores_docx_under_generated_name() {
        let dir = tempfile::tempdir().unwrap();
        let stored = accept(dir.path(), "deal.docx", Bytes::from_static(b"PK\x03\x04"))
            .await
            .unwrap();
        assert_eq!(stored.media_type, MediaType::Docx);
        assert_eq!(stored.original_name, "deal.docx");
        assert!(stored.path.exists());
        // Storage name is generated, not the original filename.
        assert_ne!(stored.path.file_name().unwrap(), "deal.docx");
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"PK\x03\x04");
    }

    #[tokio::test]
    async fn concurrent_uploads_of_same_filename_get_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let (a, b) = tokio::join!(
            accept(dir.path(), "same.pdf", Bytes::from_static(b"a")),
            accept(dir.path(), "same.pdf", Bytes::from_static(b"b")),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.path, b.path);
        assert!(a.path.exists() && b.path.exists());
    }

    #[tokio::test]
    async fn remove_file_is_silent_for_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        remove_file(&dir.path().join("never-written.pdf")).await;
    }
}
