use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use lineecho_core::{EchoError, MessagingApi, Result, StoredMedia};

use crate::mime_detect::sniff_image_mime;

/// Attempts at finding an unused name before giving up.
const MAX_NAME_ATTEMPTS: usize = 4;

/// `{YYYYmmdd_HHMMSS}_{8 hex chars}.jpg`
pub fn generate_filename(now: DateTime<Utc>) -> String {
    format!("{}_{:08x}.jpg", now.format("%Y%m%d_%H%M%S"), rand::random::<u32>())
}

/// Downloads image content and writes it under the upload directory.
pub struct MediaStore {
    upload_dir: PathBuf,
    api: Arc<dyn MessagingApi>,
}

impl MediaStore {
    pub fn new(upload_dir: impl Into<PathBuf>, api: Arc<dyn MessagingApi>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            api,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Fetch the content behind `content_id` and save it under a fresh name.
    ///
    /// On any failure no file is left in the upload directory.
    pub async fn store_image(&self, content_id: &str) -> Result<StoredMedia> {
        let data = self.api.get_message_content(content_id).await?;

        match sniff_image_mime(&data) {
            Some(mime) if mime != "image/jpeg" => {
                warn!(content_id = %content_id, mime, "Image is not JPEG; saving with .jpg name anyway");
            }
            None => warn!(content_id = %content_id, "Content does not look like an image"),
            _ => {}
        }

        fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| EchoError::storage(&self.upload_dir, e))?;

        let (filename, path) = self.write_new_file(&data).await?;

        info!(
            content_id = %content_id,
            path = %path.display(),
            size = data.len(),
            "Stored image"
        );
        Ok(StoredMedia {
            filename,
            content_id: content_id.to_string(),
            size_bytes: data.len(),
        })
    }

    async fn write_new_file(&self, data: &[u8]) -> Result<(String, PathBuf)> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let filename = generate_filename(Utc::now());
            let path = self.upload_dir.join(&filename);

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(EchoError::storage(&path, e)),
            };

            let written = async {
                file.write_all(data).await?;
                file.flush().await
            }
            .await;

            if let Err(e) = written {
                drop(file);
                if let Err(rm) = fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %rm, "Failed to remove partial image");
                }
                return Err(EchoError::storage(&path, e));
            }
            return Ok((filename, path));
        }
        Err(EchoError::storage(
            &self.upload_dir,
            "could not find an unused file name",
        ))
    }
}
