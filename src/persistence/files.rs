//! PDF storage behind an opaque reference.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ReviewError;

/// First bytes of every PDF document.
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// Whether `bytes` start with the PDF signature.
#[must_use]
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Stores validated PDF bytes and hands back a reference the core keeps
/// without interpreting.
#[async_trait]
pub trait FileStore: Send + Sync + fmt::Debug {
    /// Persists `bytes` and returns their reference.
    async fn store_pdf(&self, bytes: &[u8]) -> Result<String, ReviewError>;
}

/// Writes files under a local directory with random names.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Uses `root`, creating it on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory files are written to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn store_pdf(&self, bytes: &[u8]) -> Result<String, ReviewError> {
        if !is_pdf(bytes) {
            return Err(ReviewError::validation("file", "not a PDF document"));
        }
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| ReviewError::Internal(format!("upload dir: {e}")))?;
        let name = format!("{}.pdf", Uuid::new_v4().simple());
        tokio::fs::write(self.root.join(&name), bytes)
            .await
            .map_err(|e| ReviewError::Internal(format!("write {name}: {e}")))?;
        tracing::debug!(file_ref = %name, size = bytes.len(), "stored pdf");
        Ok(name)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn detects_pdf_signature() {
        assert!(is_pdf(b"%PDF-1.7\n..."));
        assert!(!is_pdf(b"PK\x03\x04"));
        assert!(!is_pdf(b""));
    }

    #[tokio::test]
    async fn writes_file_under_root() {
        let root = std::env::temp_dir().join(format!("review-files-{}", Uuid::new_v4()));
        let store = LocalFileStore::new(&root);

        let Ok(file_ref) = store.store_pdf(b"%PDF-1.4 body").await else {
            panic!("pdf should be stored");
        };
        let Ok(bytes) = tokio::fs::read(root.join(&file_ref)).await else {
            panic!("stored file should be readable");
        };
        assert_eq!(bytes, b"%PDF-1.4 body");

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn rejects_non_pdf_bytes() {
        let store = LocalFileStore::new(std::env::temp_dir());
        assert!(store.store_pdf(b"<html>").await.is_err());
    }
}
