//! Artifact Sink: binary image storage.
//!
//! Chooses the sidecar strategy (§9 of the design notes): bytes live on disk
//! as `<task_id>.webp`, the task row stores only the relative path. A write
//! lands in a temp file first and is renamed into place atomically, so a
//! concurrent reader never observes a partial write.

use std::io::Cursor;
use std::path::PathBuf;

use image::ImageFormat;
use tokio::io::AsyncWriteExt;

use crate::error::ArtifactError;

pub const MEDIA_TYPE: &str = "image/webp";

pub struct ArtifactSink {
    dir: PathBuf,
}

impl ArtifactSink {
    pub fn new(dir: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(ArtifactSink { dir })
    }

    fn path_for(&self, task_id: &str) -> PathBuf {
        self.dir.join(format!("{task_id}.webp"))
    }

    /// Decode whatever image format the caller uploaded, re-encode to WebP,
    /// and write it under `<task_id>.webp` via write-temp-then-rename.
    /// Returns the relative path recorded on the task row.
    pub async fn put(&self, task_id: &str, bytes: &[u8]) -> Result<String, ArtifactError> {
        let decoded = image::load_from_memory(bytes)?;

        let mut encoded = Cursor::new(Vec::new());
        decoded.write_to(&mut encoded, ImageFormat::WebP)?;
        let encoded = encoded.into_inner();

        let final_path = self.path_for(task_id);
        let temp_path = self.dir.join(format!("{task_id}.webp.tmp"));

        {
            let mut file = tokio::fs::File::create(&temp_path).await?;
            file.write_all(&encoded).await?;
            file.flush().await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&temp_path, &final_path).await?;

        Ok(format!("{task_id}.webp"))
    }

    /// Read the sidecar file back, if present.
    pub async fn get(&self, task_id: &str) -> Result<Option<Vec<u8>>, ArtifactError> {
        let path = self.path_for(task_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
