//! Crate-wide error type and [`Result`] alias.
//!
//! The variants mirror the error taxonomy from the design: resolution
//! failures, malformed input, missing resources, offline-mode refusals,
//! subprocess failures, and generic I/O. `protoc` exiting non-zero is
//! deliberately *not* a variant here — it is reported as a
//! [`crate::request::GenerationResult`], never as an `Err`.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An artifact, plugin, or `protoc` locator that could not be resolved.
#[derive(Debug, Error)]
#[error("resolution failed for {attempted:?}: {cause}")]
pub struct ResolutionError {
    pub cause: String,
    pub attempted: Vec<String>,
}

impl ResolutionError {
    pub fn new(cause: impl Into<String>, attempted: Vec<String>) -> Self {
        Self { cause: cause.into(), attempted }
    }

    pub fn single(cause: impl Into<String>, attempted: impl Into<String>) -> Self {
        Self::new(cause, vec![attempted.into()])
    }
}

/// A filesystem operation that failed, annotated with the path it touched.
///
/// Kept distinct from a bare [`std::io::Error`] because most I/O failures in
/// this crate are diagnosed by path, not by errno alone.
#[derive(Debug, Error)]
#[error("{path}: {source}")]
pub struct PathIoError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl PathIoError {
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self { path: path.into(), source }
    }
}

/// An HTTP response with a non-2xx/non-404 status, as produced by the URI
/// pipeline's HTTP handler.
#[derive(Debug, Error)]
#[error("HTTP {status}: {response_body_snippet}")]
pub struct HttpStatusError {
    pub status: u16,
    pub correlation_id: Option<String>,
    pub request_id: Option<String>,
    pub www_authenticate: Option<String>,
    pub proxy_authenticate: Option<String>,
    pub response_body_snippet: String,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    HttpStatus(#[from] HttpStatusError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("offline mode refused network access to {0}")]
    OfflineRefused(String),

    #[error("subprocess error: {0}")]
    Subprocess(String),

    #[error(transparent)]
    Io(#[from] PathIoError),

    #[error(transparent)]
    BareIo(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn offline(what: impl fmt::Display) -> Self {
        Self::OfflineRefused(what.to_string())
    }

    pub fn subprocess(what: impl Into<String>) -> Self {
        Self::Subprocess(what.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io(PathIoError::new(path, source))
    }

    /// `true` for errors that higher layers are allowed to recover from
    /// (e.g. an optional plugin, or a URI pipeline entry lookup).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
            || matches!(self, Self::BareIo(e) if e.kind() == std::io::ErrorKind::NotFound)
            || matches!(self, Self::Io(e) if e.source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Extension trait used throughout the crate to attach a path to an
/// [`std::io::Error`] as it is propagated.
pub(crate) trait IoResultExt<T> {
    fn path_ctx(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn path_ctx(self, path: &Path) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
