use super::{sniff, AcceptedUpload};
use anyhow::{Context, Result};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};
use uuid::Uuid;

/// A previously stored upload read back from disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredUpload {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

/// Writes accepted uploads under a single root directory.
#[derive(Clone, Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the upload root if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to create upload root {}", self.root.display()))
    }

    /// Store `bytes` under a fresh `<uuid>.<extension>` name and return it.
    ///
    /// The client-supplied file name is never used.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    #[instrument(skip(self, accepted, bytes), fields(extension = accepted.extension(), len = bytes.len()))]
    pub async fn persist(&self, accepted: &AcceptedUpload, bytes: &[u8]) -> Result<String> {
        let name = format!("{}.{}", Uuid::new_v4().simple(), accepted.extension());
        let partial = self.root.join(format!(".{name}.partial"));
        let target = self.root.join(&name);

        if let Err(err) = tokio::fs::write(&partial, bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(err).with_context(|| format!("failed to write {}", partial.display()));
        }

        if let Err(err) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(err).with_context(|| format!("failed to move upload to {}", target.display()));
        }

        debug!(%name, "upload stored");

        Ok(name)
    }

    /// Read back a file written by [`UploadStorage::persist`]. Names that
    /// `persist` could not have generated are treated as missing.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read.
    pub async fn read(&self, name: &str) -> Result<Option<StoredUpload>> {
        let Some(mime_type) = stored_mime_type(name) else {
            return Ok(None);
        };

        match tokio::fs::read(self.root.join(name)).await {
            Ok(bytes) => Ok(Some(StoredUpload { bytes, mime_type })),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read upload {name}")),
        }
    }
}

/// MIME type of a `<32 hex>.<extension>` name, `None` for anything else.
fn stored_mime_type(name: &str) -> Option<&'static str> {
    let (stem, extension) = name.split_once('.')?;
    let generated = stem.len() == 32
        && stem.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        && !extension.is_empty()
        && extension
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());

    if generated {
        sniff::mime_for_extension(extension)
    } else {
        None
    }
}
