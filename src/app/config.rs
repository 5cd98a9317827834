//! JSON run configuration: search API, criteria and data node priority.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use sproket_core::Criteria;
use url::Url;

/// Parsed `--config` file.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RunConfig {
    /// Search API endpoint.
    #[serde(default)]
    pub(crate) search_api: String,
    /// Preferred data nodes, most preferred first.
    #[serde(default)]
    pub(crate) data_node_priority: Vec<String>,
    /// Criteria to resolve, in order.
    #[serde(default)]
    pub(crate) criteria: Vec<Criteria>,
}

impl RunConfig {
    /// Validates values the rest of the run relies on.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.search_api.trim().is_empty() {
            bail!("search_api is a required parameter in the config file");
        }
        let url = Url::parse(&self.search_api)
            .with_context(|| format!("search_api is not a valid URL: {}", self.search_api))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!(
                "search_api must be an http(s) URL, got scheme `{}`",
                url.scheme()
            );
        }
        if let Some(node) = self.data_node_priority.iter().find(|n| n.trim().is_empty()) {
            bail!("data_node_priority contains an empty entry: {node:?}");
        }
        Ok(())
    }

    /// Number of criteria not marked disabled.
    pub(crate) fn enabled_criteria(&self) -> usize {
        self.criteria.iter().filter(|c| !c.disabled).count()
    }
}

/// Reads, parses and validates the config file at `path`.
pub(crate) fn load_config(path: &Path) -> Result<RunConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: RunConfig = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(config)
}
