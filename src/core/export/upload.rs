//! Upload of export files to remote object storage
//!
//! Files are shipped one after another under `{prefix}/{file name}`. Each
//! file gets a bounded number of attempts with a linear backoff between them;
//! a file that exhausts its attempts aborts the rest of the batch.

use crate::adapters::object_store::ObjectStore;
use crate::domain::{AggregatorError, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

/// Retry policy for a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Attempts per file, at least one
    pub max_attempts: usize,
    /// Wait before retry `n` is `n × backoff_unit`
    pub backoff_unit: Duration,
}

impl UploadPolicy {
    /// Wait before `attempt` (1-based); zero for the first attempt
    pub fn backoff_before(&self, attempt: usize) -> Duration {
        let retries = attempt.saturating_sub(1) as u32;
        self.backoff_unit * retries
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(5),
        }
    }
}

/// Proof of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    /// Local file that was uploaded
    pub local_path: PathBuf,
    /// Remote object key
    pub key: String,
    /// Payload size in bytes
    pub bytes: u64,
    /// Attempts used, including the successful one
    pub attempts: usize,
    /// SHA-256 of the payload, lowercase hex
    pub sha256: String,
}

/// Ships local files to an [`ObjectStore`]
pub struct ObjectStoreUploader {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    policy: UploadPolicy,
    span: Span,
}

impl ObjectStoreUploader {
    /// Create an uploader placing objects under `prefix`
    pub fn new(
        store: Arc<dyn ObjectStore>,
        prefix: impl Into<String>,
        policy: UploadPolicy,
        span: Span,
    ) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            policy: UploadPolicy {
                max_attempts: policy.max_attempts.max(1),
                ..policy
            },
            span,
        }
    }

    /// Upload every file in order, stopping at the first failure
    ///
    /// # Errors
    ///
    /// Returns the first file's [`AggregatorError::Upload`] (or I/O,
    /// cancellation) error; files after it are not attempted.
    pub async fn upload_files(
        &self,
        paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<Vec<UploadReceipt>> {
        let mut receipts = Vec::with_capacity(paths.len());
        for path in paths {
            receipts.push(self.upload_file(path, cancel).await?);
        }
        tracing::info!(
            parent: &self.span,
            count = receipts.len(),
            destination = %self.store.location(),
            "All files uploaded"
        );
        Ok(receipts)
    }

    /// Upload a single file with retries
    ///
    /// The file is opened once and hashed block by block. Every attempt
    /// streams a handle rewound to the start, so a retry always sends the
    /// whole payload without buffering it in memory.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::Upload`] once all attempts failed,
    /// [`AggregatorError::Io`] if the file cannot be read and
    /// [`AggregatorError::Cancelled`] if `cancel` fires between attempts.
    pub async fn upload_file(&self, path: &Path, cancel: &CancellationToken) -> Result<UploadReceipt> {
        let key = object_key(&self.prefix, path)?;
        let span = tracing::info_span!(parent: &self.span, "upload", file = %path.display(), key = %key);
        self.upload_with_retries(path, key, cancel)
            .instrument(span)
            .await
    }

    async fn upload_with_retries(
        &self,
        path: &Path,
        key: String,
        cancel: &CancellationToken,
    ) -> Result<UploadReceipt> {
        tracing::info!("Uploading file");

        let mut file = tokio::fs::File::open(path).await.map_err(|e| {
            AggregatorError::Io(format!("Failed to open {}: {e}", path.display()))
        })?;
        let (bytes, sha256) = digest_file(&mut file)
            .await
            .map_err(|e| AggregatorError::Io(format!("Failed to read {}: {e}", path.display())))?;

        let max_attempts = self.policy.max_attempts;
        let mut last_error: Option<AggregatorError> = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let wait = self.policy.backoff_before(attempt);
                crate::log_retry_attempt!(
                    attempt,
                    max_attempts,
                    last_error.as_ref().map(ToString::to_string).unwrap_or_default()
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(AggregatorError::Cancelled),
                    _ = tokio::time::sleep(wait) => {}
                }
            }
            if cancel.is_cancelled() {
                return Err(AggregatorError::Cancelled);
            }

            let body = rewound_handle(&file, path).await?;

            match self.store.put_object(&key, body, bytes).await {
                Ok(()) => {
                    tracing::info!(
                        destination = %self.store.location(),
                        bytes,
                        attempts = attempt,
                        sha256 = %sha256,
                        "Upload successful"
                    );
                    return Ok(UploadReceipt {
                        local_path: path.to_path_buf(),
                        key,
                        bytes,
                        attempts: attempt,
                        sha256,
                    });
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Upload attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(AggregatorError::Upload {
            file: path.to_path_buf(),
            attempts: max_attempts,
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt made".to_string()),
        })
    }
}

const DIGEST_BUFFER: usize = 64 * 1024;

/// Size and SHA-256 of the whole file, read in fixed-size blocks
async fn digest_file(file: &mut tokio::fs::File) -> std::io::Result<(u64, String)> {
    file.seek(SeekFrom::Start(0)).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; DIGEST_BUFFER];
    let mut total = 0u64;
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        total += read as u64;
    }
    Ok((total, hex_encode(&hasher.finalize())))
}

/// Fresh handle on the open file, positioned at offset 0
async fn rewound_handle(file: &tokio::fs::File, path: &Path) -> Result<tokio::fs::File> {
    let read_error =
        |e: std::io::Error| AggregatorError::Io(format!("Failed to read {}: {e}", path.display()));

    let mut handle = file.try_clone().await.map_err(read_error)?;
    handle.seek(SeekFrom::Start(0)).await.map_err(read_error)?;
    Ok(handle)
}

/// Remote key for `path`: `{prefix}/{file name}`
///
/// An empty prefix yields the bare file name; trailing slashes on the
/// prefix are ignored.
///
/// # Errors
///
/// Returns [`AggregatorError::Validation`] if `path` has no file name.
pub fn object_key(prefix: &str, path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            AggregatorError::Validation(format!("{} has no file name", path.display()))
        })?;

    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        Ok(name)
    } else {
        Ok(format!("{prefix}/{name}"))
    }
}

fn hex_encode(digest: &[u8]) -> String {
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}
