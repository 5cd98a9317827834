//! Shared HTTP client construction policy.
//!
//! Both the search API client and the data node transfer client are built
//! here so they stay consistent on timeouts, compression and User-Agent.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

/// Timeouts applied to one HTTP client.
///
/// `read_secs` bounds the idle time between two reads, so a body that keeps
/// arriving is never cut off. `total_secs` is an optional deadline on the
/// whole request, body included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// TCP/TLS connect timeout in seconds.
    pub connect_secs: u64,
    /// Longest wait for the next read, in seconds.
    pub read_secs: u64,
    /// Deadline for the whole request, in seconds. `None` means no deadline.
    pub total_secs: Option<u64>,
}

impl HttpTimeouts {
    /// Creates connect and idle-read timeouts with no overall deadline.
    #[must_use]
    pub const fn new(connect_secs: u64, read_secs: u64) -> Self {
        Self {
            connect_secs,
            read_secs,
            total_secs: None,
        }
    }

    /// Returns a copy that also caps the whole request at `secs`.
    #[must_use]
    pub const fn with_total_secs(self, secs: u64) -> Self {
        Self {
            total_secs: Some(secs),
            ..self
        }
    }
}

/// Builds a reqwest client with the project networking defaults.
///
/// # Errors
///
/// Returns the underlying [`reqwest::Error`] when the client cannot be built
/// (for example when the TLS backend fails to initialize).
pub(crate) fn build_http_client(
    user_agent: String,
    timeouts: HttpTimeouts,
) -> Result<Client, reqwest::Error> {
    debug!(
        connect_secs = timeouts.connect_secs,
        read_secs = timeouts.read_secs,
        total_secs = ?timeouts.total_secs,
        "building HTTP client"
    );
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .read_timeout(Duration::from_secs(timeouts.read_secs))
        .gzip(true)
        .user_agent(user_agent);
    if let Some(total) = timeouts.total_secs {
        builder = builder.timeout(Duration::from_secs(total));
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client_succeeds() {
        let client = build_http_client("sproket-test".to_string(), HttpTimeouts::new(5, 10));
        assert!(client.is_ok(), "client should build: {:?}", client.err());
    }

    #[test]
    fn test_total_deadline_is_opt_in() {
        let timeouts = HttpTimeouts::new(5, 10);
        assert_eq!(timeouts.total_secs, None);

        let capped = timeouts.with_total_secs(60);
        assert_eq!(capped.total_secs, Some(60));
        assert_eq!(capped.read_secs, 10);
        assert!(build_http_client("sproket-test".to_string(), capped).is_ok());
    }
}
