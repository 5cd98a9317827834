//! Shared User-Agent strings for index and data node HTTP clients.
//!
//! Single source for project URL and UA format so search traffic and file
//! transfers identify the tool the same way.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/ESGF/sproket";

/// Default User-Agent for file transfers from data nodes.
#[must_use]
pub(crate) fn default_download_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("sproket/{version} (data-retrieval-tool; +{PROJECT_UA_URL})")
}

/// Default User-Agent for search API requests.
#[must_use]
pub(crate) fn default_search_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("sproket/{version} (search-client; +{PROJECT_UA_URL})")
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_format_consistency() {
        let download_ua = default_download_user_agent();
        let search_ua = default_search_user_agent();
        assert!(
            download_ua.contains(PROJECT_UA_URL),
            "download UA must contain project URL"
        );
        assert!(
            search_ua.contains(PROJECT_UA_URL),
            "search UA must contain project URL"
        );
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            download_ua
                .strip_prefix("sproket/")
                .and_then(|s| s.split(' ').next())
                .expect("download UA has version"),
            "download UA must contain crate version"
        );
    }

    #[test]
    fn test_download_ua_is_stable_across_calls() {
        assert_eq!(default_download_user_agent(), default_download_user_agent());
        assert!(default_download_user_agent().contains("data-retrieval-tool"));
    }
}
