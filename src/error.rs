//! Error types for the export pipeline

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing, paginating or exporting a document
#[derive(Error, Debug)]
pub enum Error {
    /// The preview node to capture is not present in the document
    #[error("Capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// The rasterization step failed; no bitmap is produced
    #[error("Rendering failed: {0}")]
    RenderFailure(String),

    /// Page geometry is misconfigured or the bitmap is empty
    #[error("Pagination failed: {0}")]
    PaginationFailure(String),

    /// Serializing the assembled document failed
    #[error("Encoding failed: {0}")]
    EncodingFailure(String),

    /// The best-effort persistence request failed
    #[error("Persistence failed: {0}")]
    PersistenceFailure(String),

    /// Writing the local download failed
    #[error("Download failed: {0}")]
    DownloadFailure(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Another export is still in flight
    #[error("An export is already in progress")]
    Busy,

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error aborts the user-visible action.
    ///
    /// Only a failed persistence request is recoverable: the download has
    /// already been produced when it happens.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::PersistenceFailure(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_persistence_failures_are_recoverable() {
        assert!(!Error::PersistenceFailure("503".into()).is_fatal());
        assert!(Error::CaptureUnavailable("#invoice".into()).is_fatal());
        assert!(Error::EncodingFailure("empty".into()).is_fatal());
        assert!(Error::Busy.is_fatal());
    }

    #[test]
    fn messages_name_the_failure_class() {
        let e = Error::PaginationFailure("bitmap has zero height".into());
        assert_eq!(e.to_string(), "Pagination failed: bitmap has zero height");
    }
}
