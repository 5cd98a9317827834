//! Resolve-then-download flow for a whole run.
//!
//! A run takes every enabled [`Criteria`], counts matching files across all
//! of them, applies the bulk threshold to that total and, when permitted,
//! resolves each criteria in turn into one shared download pipeline. A run-wide
//! [`JobSink`] keeps the one-job-per-`instance_id` guarantee across criteria.

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::download::{DownloadPipeline, HttpClient, PipelineError, PipelineOptions};
use crate::resolver::{JobSink, ReplicaResolver, ResolveError, ResolveOptions, ResolveOutcome};
use crate::search::{Criteria, FileIndex};

/// Top-level errors that abort a run.
#[derive(Debug, Error)]
pub enum RetrieveError {
    /// Counting or resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The download pipeline could not be configured.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Options for one run.
#[derive(Debug, Clone, Default)]
pub struct RetrieveOptions {
    /// Paging, threshold and output directory.
    pub resolve: ResolveOptions,
    /// Worker count and verification policy.
    pub pipeline: PipelineOptions,
    /// Run-wide data node priority; replaces any list carried by a criteria.
    pub data_node_priority: Vec<String>,
    /// Count matches and stop.
    pub count_only: bool,
}

/// Where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No enabled criteria matched anything.
    NothingFound,
    /// Counts were requested and reported; nothing was queued.
    Counted,
    /// The total exceeded the bulk threshold without confirmation.
    ThresholdExceeded,
    /// Jobs were resolved and the pipeline drained.
    Completed,
}

/// Unique file count for one criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriteriaCount {
    /// Query string of the canonicalized criteria.
    pub query: String,
    /// Unique canonical files.
    pub count: usize,
}

/// Totals reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Per-criteria counts, in criteria order.
    pub counts: Vec<CriteriaCount>,
    /// Unique files found across all criteria.
    pub found: usize,
    /// Jobs queued.
    pub submitted: usize,
    /// Queued jobs served from a priority data node.
    pub preferred: usize,
    /// Files transferred and finalized.
    pub completed: usize,
    /// Files already present.
    pub skipped: usize,
    /// Files whose checksum was confirmed.
    pub verified: usize,
    /// Jobs that failed, plus index records rejected for an unusable `instance_id`.
    pub failed: usize,
    /// Jobs only logged (dry run).
    pub planned: usize,
    /// Where the run stopped.
    pub outcome: RunOutcome,
}

impl RunSummary {
    fn stopped(counts: Vec<CriteriaCount>, outcome: RunOutcome) -> Self {
        let found = counts.iter().map(|c| c.count).sum();
        Self {
            counts,
            found,
            submitted: 0,
            preferred: 0,
            completed: 0,
            skipped: 0,
            verified: 0,
            failed: 0,
            planned: 0,
            outcome,
        }
    }

    /// Jobs that ended without error.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.completed + self.skipped + self.planned
    }
}

/// Enabled criteria with the run-wide priority applied.
#[must_use]
pub fn effective_criteria(criteria: &[Criteria], priority: &[String]) -> Vec<Criteria> {
    criteria
        .iter()
        .filter(|c| !c.disabled)
        .map(|c| {
            if priority.is_empty() {
                c.clone()
            } else {
                c.with_priority(priority.to_vec())
            }
        })
        .collect()
}

/// Runs the full flow for `criteria`.
///
/// Per-job download failures never surface here; they are counted in the
/// returned summary.
///
/// # Errors
///
/// - [`RetrieveError::Pipeline`] if the worker count is out of range
/// - [`RetrieveError::Resolve`] if any index query fails
#[instrument(skip_all, fields(criteria = criteria.len()))]
pub async fn retrieve(
    index: &dyn FileIndex,
    client: HttpClient,
    criteria: &[Criteria],
    options: &RetrieveOptions,
) -> Result<RunSummary, RetrieveError> {
    let pipeline = DownloadPipeline::new(options.pipeline, client)?;
    let enabled = effective_criteria(criteria, &options.data_node_priority);
    let resolver = ReplicaResolver::new(index, options.resolve.clone());

    let mut counts = Vec::with_capacity(enabled.len());
    for c in &enabled {
        let count = resolver.count(c).await?;
        counts.push(CriteriaCount {
            query: c.canonical().query(),
            count,
        });
    }
    let total: usize = counts.iter().map(|c| c.count).sum();
    info!(total, criteria = enabled.len(), "files matching");

    if options.count_only {
        return Ok(RunSummary::stopped(counts, RunOutcome::Counted));
    }
    if total == 0 {
        return Ok(RunSummary::stopped(counts, RunOutcome::NothingFound));
    }
    if !options.resolve.permits(total) {
        warn!(
            total,
            threshold = options.resolve.bulk_threshold,
            "bulk download not confirmed"
        );
        return Ok(RunSummary::stopped(counts, RunOutcome::ThresholdExceeded));
    }

    let (tx, handle) = pipeline.start();
    let mut sink = JobSink::new(tx);
    let mut found = 0;
    let mut preferred = 0;
    let mut rejected = 0;
    let mut threshold_hit = false;
    let mut failure = None;

    for (c, counted) in enabled.iter().zip(&counts) {
        match resolver.resolve_counted(c, counted.count, &mut sink).await {
            Ok(report) => {
                found += report.found;
                preferred += report.preferred;
                rejected += report.rejected;
                threshold_hit |= report.outcome == ResolveOutcome::ThresholdExceeded;
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    let submitted = sink.submitted();
    drop(sink);
    let stats = handle.join().await;

    if let Some(e) = failure {
        return Err(e.into());
    }

    let outcome = if submitted == 0 && threshold_hit {
        RunOutcome::ThresholdExceeded
    } else {
        RunOutcome::Completed
    };
    let summary = RunSummary {
        counts,
        found,
        submitted,
        preferred,
        completed: stats.completed(),
        skipped: stats.skipped(),
        verified: stats.verified(),
        failed: stats.failed() + rejected,
        planned: stats.planned(),
        outcome,
    };
    info!(
        found = summary.found,
        submitted = summary.submitted,
        preferred = summary.preferred,
        completed = summary.completed,
        skipped = summary.skipped,
        verified = summary.verified,
        failed = summary.failed,
        "run complete"
    );
    Ok(summary)
}
