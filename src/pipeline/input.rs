//! Uploaded documents and their transient staging on disk.
//!
//! An [`UploadedDocument`] is the bytes plus the caller's filename. The HTTP
//! handler writes every upload into the upload directory before processing;
//! the write goes to a uniquely named [`tempfile`] so concurrent uploads with
//! the same filename never collide and the file is removed when the
//! [`StagedUpload`] guard drops, even if processing fails. Only the
//! extension of the caller's filename reaches the disk.

use crate::error::DocIntelError;
use bytes::Bytes;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Filename used when the caller supplied none.
pub const FALLBACK_FILE_NAME: &str = "upload";

/// Raw bytes of one upload plus its original filename.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    file_name: String,
    bytes: Bytes,
}

impl UploadedDocument {
    /// The filename is reduced to its last path component.
    pub fn new(file_name: &str, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: sanitize_file_name(file_name),
            bytes: bytes.into(),
        }
    }

    /// Read a local file, mapping missing and unreadable files to typed errors.
    pub async fn read(path: impl AsRef<Path>) -> Result<Self, DocIntelError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => DocIntelError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => DocIntelError::FileNotFound {
                path: path.to_path_buf(),
            },
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(&name, bytes))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write the document into `dir` (created if missing).
    ///
    /// The staged name is a random stem plus the upload's extension, so its
    /// length does not depend on the caller's filename.
    pub async fn stage(&self, dir: &Path) -> Result<StagedUpload, DocIntelError> {
        let dir = dir.to_path_buf();
        let suffix = staged_suffix(&self.file_name);
        let bytes = self.bytes.clone();

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| staging_error(&dir, e))?;

        let file = tokio::task::spawn_blocking({
            let dir = dir.clone();
            move || -> std::io::Result<NamedTempFile> {
                let mut file = tempfile::Builder::new()
                    .prefix("upload-")
                    .suffix(&suffix)
                    .tempfile_in(&dir)?;
                file.write_all(&bytes)?;
                file.flush()?;
                Ok(file)
            }
        })
        .await
        .map_err(|e| staging_error(&dir, std::io::Error::other(e)))?
        .map_err(|e| staging_error(&dir, e))?;

        debug!(path = %file.path().display(), bytes = self.bytes.len(), "Staged upload");
        Ok(StagedUpload { file })
    }
}

fn staging_error(dir: &Path, source: std::io::Error) -> DocIntelError {
    warn!(dir = %dir.display(), error = %source, "Could not stage upload");
    DocIntelError::Staging {
        dir: dir.to_path_buf(),
        source,
    }
}

/// Longest extension carried over to the staged name.
const MAX_STAGED_EXTENSION: usize = 16;

/// `.png` for `scan.png`; empty when the name has no short alphanumeric
/// extension.
fn staged_suffix(file_name: &str) -> String {
    match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some(ext)
            if !ext.is_empty()
                && ext.len() <= MAX_STAGED_EXTENSION
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => String::new(),
    }
}

/// A staged upload; the file is deleted on drop.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Reduce a caller-supplied filename to its last component.
///
/// Both `/` and `\` count as separators so `..\..\x.png` and `../x.png` both
/// end up as `x.png`. Empty and dot-only names become [`FALLBACK_FILE_NAME`].
pub fn sanitize_file_name(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if last.is_empty() || last.chars().all(|c| c == '.') {
        FALLBACK_FILE_NAME.to_string()
    } else {
        last.to_string()
    }
}
