//! Error types for search API access.

use thiserror::Error;

/// Errors that can occur while querying the search API.
///
/// Any of these aborts the resolution pass that issued the query.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The configured search API endpoint is not a valid absolute URL.
    #[error("invalid search API URL: {url}")]
    InvalidApiUrl {
        /// The rejected endpoint.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build search HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// Network-level error (DNS, connection refused, TLS, body read).
    #[error("network error querying {url}: {source}")]
    Network {
        /// The request URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The request timed out.
    #[error("timeout querying {url}")]
    Timeout {
        /// The request URL.
        url: String,
    },

    /// The search API answered with a non-success status.
    #[error("HTTP {status} querying {url}")]
    HttpStatus {
        /// The request URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The body was not JSON at all. Distinct from a well-formed answer with
    /// zero matches.
    #[error("malformed search response from {url}: {source}")]
    MalformedResponse {
        /// The request URL.
        url: String,
        /// The JSON decoding error.
        #[source]
        source: serde_json::Error,
    },
}

impl SearchError {
    /// Creates a network error, promoting reqwest timeouts to [`SearchError::Timeout`].
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

    /// Creates a malformed-response error.
    pub fn malformed(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::MalformedResponse {
            url: url.into(),
            source,
        }
    }
}
