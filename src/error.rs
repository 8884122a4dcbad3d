// Error types for the upload task.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for upload operations.
pub type Result<T> = std::result::Result<T, UploadError>;

/// Everything that can stop a definition from reaching the registry.
///
/// The first four variants are the failures the skip policy may swallow.
/// `Config` and `Marker` happen outside the upload attempt and are always fatal.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("failed to read definition file {}: {source}", .path.display())]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to upload definition: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to upload definition: HTTP {status}: {reason}")]
    Rejected { status: u16, reason: String },

    #[error("invalid registry URL {url}: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to write marker file {}: {source}", .path.display())]
    Marker {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UploadError {
    /// Build a rejection from a non-2xx response. Empty bodies fall back to
    /// the canonical status text so the reason is never blank.
    pub fn rejected(status: reqwest::StatusCode, body: String) -> Self {
        let body = body.trim();
        let reason = if body.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("no response body")
                .to_string()
        } else {
            body.to_string()
        };
        UploadError::Rejected {
            status: status.as_u16(),
            reason,
        }
    }
}
