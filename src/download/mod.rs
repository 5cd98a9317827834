//! Parallel download pipeline for resolved file copies.
//!
//! # Features
//!
//! - Fixed-size worker pool fed by a bounded queue (backpressure on the resolver)
//! - Streaming transfers to a `.part` file, promoted by atomic rename
//! - Single-pass checksum verification (SHA-256, MD5) while writing
//! - Skip test so re-runs fetch nothing already finalized and verified
//! - Configurable timeouts (30s connect, 5min read by default)
//!
//! # Example
//!
//! ```no_run
//! use sproket_core::download::HttpClient;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let bytes = client
//!     .fetch_to_file("https://node.example.org/tas.nc", Path::new("./tas.nc.part"), None)
//!     .await?;
//! println!("Downloaded: {bytes} bytes");
//! # Ok(())
//! # }
//! ```

mod checksum;
mod client;
pub mod constants;
mod engine;
mod error;

pub use checksum::{ChecksumAlgorithm, Verifier, verify_file};
pub use client::HttpClient;
pub use engine::{
    DEFAULT_WORKERS, DownloadPipeline, DownloadStats, PipelineError, PipelineHandle,
    PipelineOptions,
};
pub use error::DownloadError;
