//! Exam documents fetched from the server.
//!
//! A `DocumentHandle` owns the downloaded bytes and a file copy that an
//! external viewer can open. Releasing it deletes the file; release is
//! idempotent and also happens on drop, so a handle can never leak.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{ApiError, PaperApi};

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Server returned an empty document")]
    Empty,

    #[error("Failed to write document: {0}")]
    Io(#[from] std::io::Error),
}

impl DocumentError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, DocumentError::Api(e) if e.is_auth_failure())
    }
}

/// Fetches paper documents into a local directory.
#[derive(Clone)]
pub struct DocumentLoader {
    api: PaperApi,
    dir: PathBuf,
}

impl DocumentLoader {
    pub fn new(api: PaperApi, dir: PathBuf) -> Self {
        Self { api, dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Download the document for `paper_id` and materialise it locally.
    pub async fn acquire(&self, paper_id: i64) -> Result<DocumentHandle, DocumentError> {
        let download = self.api.fetch_paper_document(paper_id).await?;

        if download.bytes.is_empty() {
            return Err(DocumentError::Empty);
        }
        match download.content_type.as_deref() {
            Some(ct) if ct.starts_with("application/pdf") => {}
            other => warn!(paper_id, content_type = ?other, "Document is not labelled as PDF"),
        }

        DocumentHandle::materialize(&self.dir, paper_id, download.bytes)
    }
}

/// A displayable, releasable reference to a downloaded document.
#[derive(Debug)]
pub struct DocumentHandle {
    paper_id: i64,
    path: PathBuf,
    content: Option<Vec<u8>>,
    released: bool,
}

impl DocumentHandle {
    pub(crate) fn materialize(
        dir: &Path,
        paper_id: i64,
        bytes: Vec<u8>,
    ) -> Result<Self, DocumentError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("paper_{}_{:08x}.pdf", paper_id, rand::random::<u32>()));
        if let Err(e) = std::fs::write(&path, &bytes) {
            let _ = std::fs::remove_file(&path);
            return Err(e.into());
        }
        debug!(paper_id, path = ?path, bytes = bytes.len(), "Document materialised");

        Ok(Self {
            paper_id,
            path,
            content: Some(bytes),
            released: false,
        })
    }

    pub fn paper_id(&self) -> i64 {
        self.paper_id
    }

    /// Location of the local copy, while the handle is live.
    pub fn path(&self) -> Option<&Path> {
        if self.released {
            None
        } else {
            Some(&self.path)
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    pub fn len(&self) -> usize {
        self.content.as_ref().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Drop the bytes and delete the local copy. Calling again does nothing.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.content = None;

        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(paper_id = self.paper_id, "Document released"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(paper_id = self.paper_id, error = %e, "Failed to delete document copy"),
        }
    }
}

impl Drop for DocumentHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// The one document a session may hold at a time.
#[derive(Debug, Default)]
pub struct DocumentSlot {
    current: Option<DocumentHandle>,
}

impl DocumentSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `handle`, releasing whatever was held before.
    pub fn install(&mut self, handle: DocumentHandle) {
        self.release();
        self.current = Some(handle);
    }

    /// Fetch a document and hold it. The previous handle is released before
    /// the new one is installed.
    pub async fn acquire(
        &mut self,
        loader: &DocumentLoader,
        paper_id: i64,
    ) -> Result<&DocumentHandle, DocumentError> {
        let handle = loader.acquire(paper_id).await?;
        self.release();
        Ok(self.current.insert(handle))
    }

    pub fn release(&mut self) {
        if let Some(mut handle) = self.current.take() {
            handle.release();
        }
    }

    pub fn current(&self) -> Option<&DocumentHandle> {
        self.current.as_ref()
    }

    pub fn is_held(&self) -> bool {
        self.current.is_some()
    }
}
