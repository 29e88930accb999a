//! Filesystem blob store for uploaded images.
//!
//! The rest of the system only ever handles opaque locator strings; the bytes
//! live under the configured upload directory.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::errors::AppError;

/// File extensions accepted for upload.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Maximum accepted upload size.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Blob store rooted at a single directory.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Open a blob store, creating the root directory if needed.
    pub fn open(root: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Save bytes under a sanitized, uniquified name derived from
    /// `suggested_name`. Returns the locator of the stored blob.
    pub async fn save(&self, bytes: &[u8], suggested_name: &str) -> Result<String, AppError> {
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::Validation(format!(
                "File size exceeds {} MB",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            )));
        }

        let sanitized = sanitize_filename(suggested_name);
        if !has_allowed_extension(&sanitized) {
            return Err(AppError::Validation(format!(
                "Invalid file type. Allowed extensions are: {}",
                ALLOWED_EXTENSIONS.join(", ")
            )));
        }

        let locator = format!("{}_{}", Uuid::new_v4(), sanitized);
        tokio::fs::write(self.root.join(&locator), bytes).await?;

        Ok(locator)
    }

    /// Delete a stored blob.
    pub async fn delete(&self, locator: &str) -> Result<(), AppError> {
        let path = self.path_for(locator)?;
        tokio::fs::remove_file(path).await?;
        Ok(())
    }

    /// Whether a blob exists for the locator.
    pub async fn exists(&self, locator: &str) -> bool {
        match self.path_for(locator) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Read a blob back, or None when it does not exist.
    pub async fn read(&self, locator: &str) -> Result<Option<Vec<u8>>, AppError> {
        let path = self.path_for(locator)?;
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a locator inside the root, rejecting separators and parent
    /// components.
    fn path_for(&self, locator: &str) -> Result<PathBuf, AppError> {
        if locator.is_empty()
            || locator.contains('/')
            || locator.contains('\\')
            || locator.contains("..")
        {
            return Err(AppError::BadRequest("Invalid blob locator".to_string()));
        }
        Ok(self.root.join(locator))
    }
}

/// Keep only characters that are safe in a filename.
fn sanitize_filename(name: &str) -> String {
    let mut cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", ".");
    }
    cleaned.trim_matches('.').to_string()
}

fn has_allowed_extension(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str())
        }
        _ => false,
    }
}
