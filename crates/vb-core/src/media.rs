//! Temporary storage for downloaded audio
//!
//! A [`MediaHandle`] owns one file on disk for the duration of a single
//! pipeline job. File names carry a random suffix and are created
//! exclusively, so jobs for the same media id never share a file. [`MediaHandle::release`] consumes the handle, so the file
//! can only be released once; a handle dropped without an explicit release
//! (for example when its job is cancelled by a deadline) removes the file
//! in `Drop`.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;

/// Default MIME hint for WhatsApp voice notes
pub const DEFAULT_AUDIO_MIME: &str = "audio/ogg";

/// File extension for an audio MIME type
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    // strip parameters such as "; codecs=opus"
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/aac" => "aac",
        "audio/amr" => "amr",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        _ => "bin",
    }
}

/// Restrict a platform media id to characters safe in a file name
fn sanitize_media_id(media_id: &str) -> String {
    let cleaned: String = media_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if cleaned.is_empty() {
        "media".to_string()
    } else {
        cleaned
    }
}

/// Downloaded audio held on local disk for one job
#[derive(Debug)]
pub struct MediaHandle {
    media_id: String,
    mime_type: String,
    path: PathBuf,
    released: bool,
}

impl MediaHandle {
    /// Write `bytes` to a new `{dir}/{media_id}-{uuid}.{ext}` and take ownership of the file
    pub async fn persist(dir: &Path, media_id: &str, mime_type: &str, bytes: &[u8]) -> Result<Self> {
        let file_name = format!(
            "{}-{}.{}",
            sanitize_media_id(media_id),
            Uuid::new_v4().simple(),
            extension_for_mime(mime_type)
        );
        let path = dir.join(file_name);

        tokio::fs::create_dir_all(dir).await?;

        // create_new refuses existing paths, symlinks included
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        let written = async {
            file.write_all(bytes).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = remove_file(&path) {
                warn!(media_id, "failed to remove partial media file: {}", cleanup);
            }
            return Err(e.into());
        }

        debug!(media_id, path = %path.display(), bytes = bytes.len(), "stored media");

        Ok(Self {
            media_id: media_id.to_string(),
            mime_type: mime_type.to_string(),
            path,
            released: false,
        })
    }

    pub fn media_id(&self) -> &str {
        &self.media_id
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored audio
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }

    /// Remove the backing file. A file that is already gone is not an error.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        remove_file(&self.path)
    }
}

impl Drop for MediaHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(media_id = %self.media_id, "media handle dropped without release, removing file");
        if let Err(e) = remove_file(&self.path) {
            warn!(media_id = %self.media_id, "failed to remove media file: {}", e);
        }
    }
}

fn remove_file(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "released media");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "media already removed");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
