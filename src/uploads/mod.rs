//! Upload Gate: decides whether an uploaded file may be persisted.
//!
//! Checks run cheapest first: extension, then size, then a bounded read of
//! the leading bytes to sniff the real content type, which must also be the
//! type the extension names. The gate never writes;
//! accepted files are handed to [`UploadStorage`].

mod sniff;
mod storage;

pub use self::storage::{StoredUpload, UploadStorage};

use crate::config::SecurityConfig;
use std::{
    io::{Read, Seek, SeekFrom},
    path::Path,
    sync::Arc,
};
use thiserror::Error;
use tracing::{debug, instrument};

/// Why a file was refused. Messages are safe to return to clients.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("file type is not allowed")]
    Extension,
    #[error("file is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[error("file content is not an allowed image type")]
    Content,
    #[error("file could not be read")]
    Unreadable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptedUpload {
    extension: String,
    mime_type: &'static str,
}

impl AcceptedUpload {
    /// Lower-case extension without the dot, always a member of the allow-set.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// MIME type sniffed from the content.
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        self.mime_type
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accepted(AcceptedUpload),
    Rejected(Rejection),
}

impl Verdict {
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

#[derive(Clone, Debug)]
pub struct UploadGate {
    config: Arc<SecurityConfig>,
}

impl UploadGate {
    #[must_use]
    pub const fn new(config: Arc<SecurityConfig>) -> Self {
        Self { config }
    }

    /// Validate one upload. The stream is left at position 0 whatever the
    /// verdict, so the caller can persist it without reopening.
    #[instrument(skip(self, stream))]
    pub fn validate<R: Read + Seek>(
        &self,
        filename: &str,
        stream: &mut R,
        declared_size: u64,
    ) -> Verdict {
        let inspected = self.inspect(filename, stream, declared_size);

        if stream.seek(SeekFrom::Start(0)).is_err() {
            debug!("could not rewind upload stream");
            return Verdict::Rejected(Rejection::Unreadable);
        }

        match inspected {
            Ok(accepted) => {
                debug!(mime_type = accepted.mime_type, "upload accepted");
                Verdict::Accepted(accepted)
            }
            Err(rejection) => {
                debug!(%rejection, "upload rejected");
                Verdict::Rejected(rejection)
            }
        }
    }

    fn inspect<R: Read + Seek>(
        &self,
        filename: &str,
        stream: &mut R,
        declared_size: u64,
    ) -> Result<AcceptedUpload, Rejection> {
        let extension = extension_of(filename).ok_or(Rejection::Extension)?;
        if !self.config.allows_extension(&extension) {
            return Err(Rejection::Extension);
        }

        let limit = self.config.max_upload_bytes();
        if declared_size > limit {
            return Err(Rejection::TooLarge {
                size: declared_size,
                limit,
            });
        }

        // The declared size comes from the client; measure the stream too.
        let actual_size = stream
            .seek(SeekFrom::End(0))
            .map_err(|_| Rejection::Unreadable)?;
        if actual_size > limit {
            return Err(Rejection::TooLarge {
                size: actual_size,
                limit,
            });
        }

        stream
            .seek(SeekFrom::Start(0))
            .map_err(|_| Rejection::Unreadable)?;

        let mut head = Vec::with_capacity(self.config.sniff_len());
        stream
            .by_ref()
            .take(self.config.sniff_len() as u64)
            .read_to_end(&mut head)
            .map_err(|_| Rejection::Unreadable)?;

        let mime_type = sniff::mime_type(&head)
            .filter(|mime| self.config.allows_mime_type(mime))
            .ok_or(Rejection::Content)?;

        // The stored name keeps the extension, so it must describe the bytes.
        if sniff::mime_for_extension(&extension) != Some(mime_type) {
            return Err(Rejection::Content);
        }

        Ok(AcceptedUpload {
            extension,
            mime_type,
        })
    }
}

/// Final suffix of `filename`, lower-cased. `None` for names without one.
fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_lowercase)
}
