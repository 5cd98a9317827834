//! Sproket Core Library
//!
//! This library finds files in a federated climate-data archive through its
//! search API and downloads them in parallel, preferring copies on chosen
//! data nodes and verifying every transfer against the published checksum.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`search`] - Query building, index records and the search API client
//! - [`resolver`] - Replica-aware resolution of criteria into download jobs
//! - [`download`] - Parallel download pipeline with checksum verification
//! - [`retrieve`] - The resolve-then-download flow for a whole run

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub(crate) mod http_client;
pub mod resolver;
pub mod retrieve;
pub mod search;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use download::{
    ChecksumAlgorithm, DEFAULT_WORKERS, DownloadError, DownloadPipeline, DownloadStats,
    HttpClient, PipelineError, PipelineHandle, PipelineOptions, Verifier,
};
pub use http_client::HttpTimeouts;
pub use resolver::{
    DEFAULT_BULK_THRESHOLD, DEFAULT_PAGE_SIZE, DownloadJob, JobSink, LogicalFile, PARTIAL_SUFFIX,
    ReplicaResolver, ResolveError, ResolveOptions, ResolveOutcome, ResolveReport,
};
pub use retrieve::{
    CriteriaCount, RetrieveError, RetrieveOptions, RunOutcome, RunSummary, effective_criteria,
    retrieve,
};
pub use search::{
    Checksum, Criteria, Doc, FacetCounts, FileIndex, IndexClient, SearchError, SearchPage,
    build_query,
};
