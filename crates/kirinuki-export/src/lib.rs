//! kirinuki-export: the export side effect for finished stickers.
//!
//! The finishing pipeline hands a finished transparent PNG to an
//! [`ExportSink`] and moves on -- saving is fire-and-forget from the
//! pipeline's perspective. [`DirectoryExport`] is the concrete sink:
//! it writes into a target directory, creating it on demand.

use std::path::PathBuf;

use async_trait::async_trait;

/// Errors that can occur while saving a sticker.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Writing the file (or creating its directory) failed.
    #[error("failed to write {filename}: {source}")]
    Io {
        /// The filename being written.
        filename: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Filename for a finished sticker: `sticker-<size>-<id>.png`.
#[must_use]
pub fn sticker_filename(size: u32, id: &str) -> String {
    format!("sticker-{size}-{id}.png")
}

/// Destination for finished sticker images.
#[async_trait(?Send)]
pub trait ExportSink {
    /// Persist one encoded image under the given filename.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] if the image cannot be written.
    async fn save(&self, image: &[u8], filename: &str) -> Result<(), ExportError>;
}

/// Sink that writes stickers into a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirectoryExport {
    dir: PathBuf,
}

impl DirectoryExport {
    /// Create a sink targeting `dir`. The directory is created lazily
    /// on the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait(?Send)]
impl ExportSink for DirectoryExport {
    async fn save(&self, image: &[u8], filename: &str) -> Result<(), ExportError> {
        let io_error = |source| ExportError::Io {
            filename: filename.to_owned(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(io_error)?;
        let path = self.dir.join(filename);
        tokio::fs::write(&path, image).await.map_err(io_error)?;
        tracing::info!(path = %path.display(), bytes = image.len(), "saved sticker");
        Ok(())
    }
}
