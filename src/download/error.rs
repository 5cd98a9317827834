//! Error types for the download module.
//!
//! Every variant is scoped to one job: the worker logs it, drops the job and
//! moves on to the next one.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching, verifying or finalizing one file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The server answered successfully but sent no bytes.
    #[error("no data received from {url}")]
    EmptyBody {
        /// The URL that sent an empty body.
        url: String,
    },

    /// File system error (create, write, rename).
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The selected record exposes no HTTP-fetchable URL.
    #[error("no HTTP URL published for {instance_id}")]
    MissingUrl {
        /// The logical file without a usable URL.
        instance_id: String,
    },

    /// Hash of the transferred bytes differs from the published checksum.
    #[error("checksum mismatch for {path}: expected {algorithm} {expected}, got {actual}")]
    ChecksumMismatch {
        /// The file that failed verification (left in place).
        path: PathBuf,
        /// Algorithm tag used.
        algorithm: String,
        /// Published digest.
        expected: String,
        /// Computed digest.
        actual: String,
    },

    /// The published checksum names an algorithm this tool cannot compute.
    #[error("unsupported checksum algorithm {algorithm:?} for {instance_id}")]
    UnsupportedChecksum {
        /// The logical file.
        instance_id: String,
        /// The unrecognized tag.
        algorithm: String,
    },

    /// Verification is required but no usable checksum was published.
    #[error("no checksum published for {instance_id}")]
    MissingChecksum {
        /// The logical file.
        instance_id: String,
    },
}

impl DownloadError {
    /// Creates a network error, promoting reqwest timeouts to [`DownloadError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Whether this is a verification failure rather than a transfer or disk failure.
    #[must_use]
    pub fn is_verification(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. }
                | Self::UnsupportedChecksum { .. }
                | Self::MissingChecksum { .. }
        )
    }
}

// No From<reqwest::Error> / From<std::io::Error>: every variant needs the
// url or path, which the source errors don't carry.
