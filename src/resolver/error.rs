//! Error types for replica resolution.

use thiserror::Error;

use crate::search::SearchError;

/// Errors that abort a resolution pass.
///
/// A resolved set larger than the bulk threshold is not an error; see
/// [`ResolveOutcome::ThresholdExceeded`](super::ResolveOutcome::ThresholdExceeded).
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A search API query failed. Not retried.
    #[error("index query failed: {0}")]
    Index(#[from] SearchError),

    /// The download pipeline stopped accepting jobs.
    #[error("download pipeline closed before resolution finished")]
    PipelineClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_error_wraps_search_error() {
        let error: ResolveError = SearchError::http_status("https://x/search", 500).into();
        let msg = error.to_string();
        assert!(msg.contains("index query failed"), "{msg}");
        assert!(msg.contains("500"), "{msg}");
    }
}
