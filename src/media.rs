//! Content-addressed store for short-form uploads.
//!
//! Files land at `<root>/<sha256>.<ext>` and are served back under
//! [`PUBLIC_PREFIX`]. Identical uploads share one file on disk.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, Result};

/// URL prefix the upload directory is mounted under.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// A file received from a multipart upload, fully buffered.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct MediaStore {
    root: PathBuf,
    max_bytes: u64,
    allowed_extensions: Vec<String>,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: u64, allowed_extensions: Vec<String>) -> Self {
        Self {
            root: root.into(),
            max_bytes,
            allowed_extensions,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.upload_dir,
            config.max_upload_bytes,
            config.allowed_upload_extensions.clone(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Checks size, extension and declared content type. Returns the
    /// normalized extension.
    pub fn validate(&self, file: &UploadedFile) -> Result<String> {
        let size = file.bytes.len() as u64;
        if size > self.max_bytes {
            return Err(AppError::FileTooLarge {
                size_bytes: size,
                limit_bytes: self.max_bytes,
            });
        }
        if size == 0 {
            return Err(AppError::InvalidFile("uploaded file is empty".to_string()));
        }

        let ext = Path::new(&file.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| AppError::InvalidFile("file has no extension".to_string()))?;
        if !self.allowed_extensions.iter().any(|a| *a == ext) {
            return Err(AppError::InvalidFile(format!(
                "only {} files are allowed",
                self.allowed_extensions.join(", ")
            )));
        }

        if let Some(ct) = file.content_type.as_deref() {
            let ct = ct.to_lowercase();
            if !ct.starts_with("video/") && ct != "application/octet-stream" {
                return Err(AppError::InvalidFile(format!(
                    "unsupported content type '{ct}'"
                )));
            }
        }
        Ok(ext)
    }

    /// Validates and writes the file, returning its public path.
    pub async fn store(&self, file: &UploadedFile) -> Result<String> {
        let ext = self.validate(file)?;

        let hex = hex::encode(Sha256::digest(&file.bytes));
        let name = format!("{hex}.{ext}");
        let path = self.root.join(&name);

        tokio::fs::create_dir_all(&self.root).await?;
        if tokio::fs::try_exists(&path).await? {
            debug!("Upload {} already stored", name);
        } else {
            tokio::fs::write(&path, &file.bytes).await?;
            debug!("Stored upload {} ({} bytes)", name, file.bytes.len());
        }
        Ok(format!("{PUBLIC_PREFIX}/{name}"))
    }
}
