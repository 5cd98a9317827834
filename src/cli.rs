//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use sproket_core::DEFAULT_WORKERS;

/// Search a federated climate-data archive and download matching files.
///
/// Criteria come from the JSON config file, or from ids piped on stdin with
/// --file-ids / --dataset-ids. Each logical file is downloaded once, from the
/// most preferred data node that holds a copy, and verified against its
/// published checksum.
#[derive(Parser, Debug)]
#[command(name = "sproket")]
#[command(author, version, about)]
pub struct Args {
    /// Path to the JSON config file (search_api, criteria, data_node_priority)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory to put downloads in (must exist)
    #[arg(short = 'o', long, default_value = "./", value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'p', long, default_value_t = DEFAULT_WORKERS as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub parallel: u8,

    /// Preferred data node, most preferred first (repeatable; overrides the config file)
    #[arg(long = "data-node-priority", value_name = "HOST", value_delimiter = ',')]
    pub data_node_priority: Vec<String>,

    /// Confirm downloads larger than the bulk threshold
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Only count the files that would be downloaded
    #[arg(long)]
    pub count: bool,

    /// Resolve and log jobs without downloading anything
    #[arg(long)]
    pub no_download: bool,

    /// Skip checksum verification
    #[arg(long)]
    pub no_verify: bool,

    /// Fail files that publish no checksum
    #[arg(long, conflicts_with = "no_verify")]
    pub require_checksum: bool,

    /// Read file ids from stdin, one per line
    #[arg(long, conflicts_with = "dataset_ids")]
    pub file_ids: bool,

    /// Read dataset ids from stdin, one per line
    #[arg(long)]
    pub dataset_ids: bool,

    /// List the field names available to criteria and exit
    #[arg(long, conflicts_with_all = ["count", "data_nodes"])]
    pub field_keys: bool,

    /// List the data nodes serving matching files and exit
    #[arg(long, conflicts_with = "count")]
    pub data_nodes: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
