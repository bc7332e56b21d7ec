use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;

/// Public URL prefix under which stored photos are served.
pub const URL_PREFIX: &str = "/uploads/";

const ALLOWED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif"];
const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif"];
const BAD_TYPE: &str = "Only images (jpeg, jpg, png, gif) are allowed";

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl PhotoUpload {
    fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

/// Owns the photo bytes on disk. Profiles only hold `/uploads/<file>`
/// references into this directory.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl PhotoStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Checks type and size. Returns a user-facing message on rejection.
    pub fn validate(&self, upload: &PhotoUpload) -> Result<(), String> {
        let ext = upload.extension().ok_or_else(|| BAD_TYPE.to_string())?;
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(BAD_TYPE.to_string());
        }

        let guessed = mime_guess::from_ext(&ext).first_raw().unwrap_or_default();
        if !ALLOWED_MIME_TYPES.contains(&guessed) {
            return Err(BAD_TYPE.to_string());
        }

        if let Some(declared) = upload.content_type.as_deref() {
            let essence = declared
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            if !ALLOWED_MIME_TYPES.contains(&essence.as_str()) {
                return Err(BAD_TYPE.to_string());
            }
        }

        if upload.bytes.is_empty() {
            return Err("Profile photo is empty".to_string());
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(format!(
                "Photo exceeds the maximum size of {} MB",
                self.max_bytes / (1024 * 1024)
            ));
        }

        Ok(())
    }

    /// Writes the upload under a fresh time-ordered name and returns its
    /// public reference.
    pub async fn save(&self, upload: &PhotoUpload) -> io::Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let ext = upload.extension().unwrap_or_else(|| "jpg".to_string());
        let file_name = format!("{}.{}", uuid::Uuid::now_v7(), ext);
        tokio::fs::write(self.dir.join(&file_name), &upload.bytes).await?;

        tracing::debug!(%file_name, bytes = upload.bytes.len(), "Stored photo");
        Ok(format!("{}{}", URL_PREFIX, file_name))
    }

    /// Maps a stored reference back to its file. Only the last path
    /// component is honoured, so a reference can never escape `dir`.
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let name = Path::new(reference).file_name()?;
        Some(self.dir.join(name))
    }

    /// Best-effort removal. Failures are logged and swallowed: the record
    /// mutation that triggered this has already happened.
    pub async fn discard(&self, reference: &str) {
        let Some(path) = self.resolve(reference) else {
            tracing::warn!(%reference, "Cannot resolve photo reference, skipping delete");
            return;
        };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), "Failed to delete photo: {}", e);
        }
    }
}
