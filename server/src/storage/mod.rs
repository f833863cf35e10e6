//! Object storage for note PDFs.
//!
//! Payloads live under the content key `pdfs/<note id>.pdf` next to a small
//! JSON sidecar (`pdfs/<note id>.pdf.meta.json`) recording the original file
//! name and upload time. [`FilesystemObjectStorage`] is a bucket directory
//! published under a public base URL.

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::persistence::now_timestamp;

const PDF_PREFIX: &str = "pdfs";
const META_SUFFIX: &str = ".meta.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing input: {0}")]
    MissingInput(&'static str),
    #[error("object storage validation failed: {0}")]
    Validation(String),
}

/// Metadata stored alongside each payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfMetadata {
    pub original_name: String,
    pub uploaded_at: u64,
}

/// Content key for a note's PDF.
pub fn pdf_key(note_id: &str) -> String {
    format!("{PDF_PREFIX}/{note_id}.pdf")
}

pub trait ObjectStorage: Send + Sync {
    /// Store `data` under [`pdf_key`] and return its public URL.
    /// Empty payloads and empty note IDs are rejected with `MissingInput`.
    fn upload_pdf(
        &self,
        data: &[u8],
        note_id: &str,
        original_name: &str,
    ) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Remove a PDF. Failures are logged and reported as `false`.
    fn delete_pdf(&self, note_id: &str) -> impl Future<Output = bool> + Send;

    fn pdf_exists(&self, note_id: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;

    fn pdf_url(&self, note_id: &str) -> String;
}

/// Bucket directory published under `public_url`.
#[derive(Debug, Clone)]
pub struct FilesystemObjectStorage {
    bucket_dir: PathBuf,
    public_url: String,
}

impl FilesystemObjectStorage {
    /// Create the adapter and verify the bucket with a write/read/delete round trip.
    pub async fn connect(
        bucket_dir: impl Into<PathBuf>,
        public_url: &str,
    ) -> Result<Self, StorageError> {
        let storage = Self {
            bucket_dir: bucket_dir.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        };
        storage.validate().await?;
        Ok(storage)
    }

    async fn validate(&self) -> Result<(), StorageError> {
        let check_dir = self.bucket_dir.join(".health-check");
        let check_file = check_dir.join("check.bin");
        let data = b"object-storage-health-check";

        fs::create_dir_all(&check_dir)
            .await
            .map_err(|e| StorageError::Validation(format!("create_dir_all({check_dir:?}): {e}")))?;
        fs::write(&check_file, data)
            .await
            .map_err(|e| StorageError::Validation(format!("write({check_file:?}): {e}")))?;
        let read_back = fs::read(&check_file)
            .await
            .map_err(|e| StorageError::Validation(format!("read({check_file:?}): {e}")))?;
        if read_back != data {
            return Err(StorageError::Validation("read-back mismatch".to_string()));
        }
        fs::remove_file(&check_file)
            .await
            .map_err(|e| StorageError::Validation(format!("remove_file({check_file:?}): {e}")))?;
        let _ = fs::remove_dir(&check_dir).await;
        Ok(())
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.bucket_dir.join(key)
    }

    /// Read back the metadata sidecar of a stored PDF.
    pub async fn metadata(&self, note_id: &str) -> Result<Option<PdfMetadata>, StorageError> {
        let path = self.object_path(&format!("{}{META_SUFFIX}", pdf_key(note_id)));
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, path).await?;
        Ok(())
    }
}

impl ObjectStorage for FilesystemObjectStorage {
    async fn upload_pdf(
        &self,
        data: &[u8],
        note_id: &str,
        original_name: &str,
    ) -> Result<String, StorageError> {
        if data.is_empty() {
            return Err(StorageError::MissingInput("file data"));
        }
        if note_id.is_empty() {
            return Err(StorageError::MissingInput("note id"));
        }
        let key = pdf_key(note_id);
        let path = self.object_path(&key);
        debug!(key = %key, size = data.len(), "object_storage: upload");

        self.write_atomic(&path, data).await?;
        let meta = PdfMetadata {
            original_name: original_name.to_string(),
            uploaded_at: now_timestamp(),
        };
        let meta_path = self.object_path(&format!("{key}{META_SUFFIX}"));
        self.write_atomic(&meta_path, &serde_json::to_vec(&meta)?).await?;

        Ok(self.pdf_url(note_id))
    }

    async fn delete_pdf(&self, note_id: &str) -> bool {
        let key = pdf_key(note_id);
        let path = self.object_path(&key);
        match fs::remove_file(&path).await {
            Ok(()) => {
                let meta_path = self.object_path(&format!("{key}{META_SUFFIX}"));
                let _ = fs::remove_file(meta_path).await;
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, "object_storage: delete failed");
                false
            }
        }
    }

    async fn pdf_exists(&self, note_id: &str) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.object_path(&pdf_key(note_id))).await?)
    }

    fn pdf_url(&self, note_id: &str) -> String {
        format!("{}/{}", self.public_url, pdf_key(note_id))
    }
}

/// Number of `.pdf` files directly inside the local uploads directory.
/// A missing directory counts as zero.
pub async fn count_local_pdfs(dir: &Path) -> Result<u64, StorageError> {
    if !fs::try_exists(dir).await? {
        return Ok(0);
    }
    let mut entries = fs::read_dir(dir).await?;
    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        let is_pdf = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if is_pdf && entry.file_type().await?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}
