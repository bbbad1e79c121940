//! Temporary staging for uploaded documents. Bytes are written to a named
//! temp file immediately before recognition and the file is removed when
//! the handle drops, on every exit path.

use crate::error::ResourceError;
use anyhow::Result;
use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Document-image recognition collaborator. Implementations own their own
/// retry policy; callers make one attempt and fall back.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentRecognizer: Send + Sync {
    /// Recognize text from the staged document at `path`
    async fn recognize(&self, path: &Path) -> Result<String>;

    /// Check if the recognizer is available
    async fn health_check(&self) -> Result<bool>;
}

/// A staged upload. Holding the value keeps the file on disk; dropping it
/// deletes the file.
pub struct StagedDocument {
    file: NamedTempFile,
}

impl StagedDocument {
    pub fn create(bytes: &[u8]) -> Result<Self, ResourceError> {
        let mut file = NamedTempFile::new()?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(StagedDocument { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_staged_document_holds_bytes() {
        let staged = StagedDocument::create(b"scanned pedigree form").unwrap();
        let on_disk = std::fs::read(staged.path()).unwrap();
        assert_eq!(on_disk, b"scanned pedigree form");
    }

    #[test]
    fn test_staged_document_removed_on_drop() {
        let path: PathBuf;
        {
            let staged = StagedDocument::create(b"ephemeral").unwrap();
            path = staged.path().to_path_buf();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_mock_recognizer_reads_staged_path() {
        let staged = StagedDocument::create(b"mother had asthma").unwrap();

        let mut recognizer = MockDocumentRecognizer::new();
        recognizer
            .expect_recognize()
            .returning(|path| Ok(std::fs::read_to_string(path)?));

        let text = recognizer.recognize(staged.path()).await.unwrap();
        assert_eq!(text, "mother had asthma");
    }
}
