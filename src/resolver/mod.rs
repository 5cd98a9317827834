//! Replica-aware resolution of search criteria into download jobs.
//!
//! The archive may publish one logical file (one `instance_id`) on several
//! data nodes: once as the canonical original and any number of times as a
//! replica. [`ReplicaResolver`] turns one [`Criteria`] into exactly one
//! [`DownloadJob`] per logical file, choosing the copy on the most preferred
//! data node when the caller supplied a priority list.
//!
//! # Protocol
//!
//! 1. Canonicalize: `retracted=false`, `latest=true`, always.
//! 2. Count originals (`replica=false`) with a zero-limit page. Zero ends the
//!    pass; a count above the bulk threshold without confirmation stops it.
//! 3. With a priority list, facet replicas over `data_node` and keep the
//!    priority nodes that actually serve something. None left means replica
//!    preference is off for this pass.
//! 4. Page through originals. With preference off every original is queued
//!    straight away, so downloads overlap with paging.
//! 5. With preference on, page through replicas restricted to the useful
//!    priority nodes and attach each to the original with the same
//!    `instance_id`. Replicas of files not seen in step 4 are ignored.
//! 6. Per logical file, take the first priority node holding a copy, else
//!    the original.
//! 7. Re-check the bulk threshold against the final count before queueing.

mod error;
mod job;

pub use error::ResolveError;
pub use job::{DownloadJob, JobSink, PARTIAL_SUFFIX, is_plain_file_name};

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use tracing::{debug, info, instrument, warn};

use crate::search::{Criteria, DATA_NODE_FIELD, Doc, FileIndex};

/// Records requested per search page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Unique file count above which a run needs explicit confirmation.
pub const DEFAULT_BULK_THRESHOLD: usize = 100;

/// Resolution settings shared by every criteria of a run.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Records requested per search page (at least 1).
    pub page_size: usize,
    /// Unique file count above which `confirm_bulk` is required.
    pub bulk_threshold: usize,
    /// Caller has pre-confirmed runs above the threshold.
    pub confirm_bulk: bool,
    /// Directory download jobs write into.
    pub output_dir: PathBuf,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            bulk_threshold: DEFAULT_BULK_THRESHOLD,
            confirm_bulk: false,
            output_dir: PathBuf::from("."),
        }
    }
}

impl ResolveOptions {
    /// Whether `count` unique files may be queued under these options.
    #[must_use]
    pub fn permits(&self, count: usize) -> bool {
        self.confirm_bulk || count <= self.bulk_threshold
    }
}

/// How a resolution pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// No file matched; no search beyond the count was issued.
    NothingFound,
    /// More files matched than the bulk threshold allows; nothing was queued.
    ThresholdExceeded,
    /// Jobs were queued.
    Submitted,
}

/// Counts reported by one resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveReport {
    /// Unique logical files found.
    pub found: usize,
    /// Jobs queued by this pass (files already queued by an earlier
    /// criteria of the same run are not counted again).
    pub submitted: usize,
    /// Queued jobs served from a priority data node.
    pub preferred: usize,
    /// Records dropped because their `instance_id` is not a plain file name.
    pub rejected: usize,
    /// Whether the replica pass ran.
    pub replica_preference: bool,
    /// How the pass ended.
    pub outcome: ResolveOutcome,
}

impl ResolveReport {
    fn stopped(found: usize, outcome: ResolveOutcome) -> Self {
        Self {
            found,
            submitted: 0,
            preferred: 0,
            rejected: 0,
            replica_preference: false,
            outcome,
        }
    }
}

/// The deduplication unit: every known copy of one `instance_id`.
#[derive(Debug, Clone)]
pub struct LogicalFile {
    original: Doc,
    replicas: BTreeMap<String, Doc>,
}

impl LogicalFile {
    /// Starts a logical file from its canonical original.
    #[must_use]
    pub fn from_original(doc: Doc) -> Self {
        Self {
            original: doc,
            replicas: BTreeMap::new(),
        }
    }

    /// The logical identity.
    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.original.instance_id
    }

    /// Data nodes known to serve a copy: the original's first, then replicas sorted.
    pub fn data_nodes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.original.data_node.as_str())
            .chain(self.replicas.keys().map(String::as_str))
    }

    /// Records a replica. A copy already known on the same node is kept.
    pub fn add_replica(&mut self, doc: Doc) {
        if doc.data_node == self.original.data_node {
            return;
        }
        self.replicas.entry(doc.data_node.clone()).or_insert(doc);
    }

    /// Picks the copy to fetch: the first priority node with a copy, else
    /// the canonical original. The flag tells whether a priority node won.
    #[must_use]
    pub fn select(mut self, priority: &[String]) -> (Doc, bool) {
        for node in priority {
            if *node == self.original.data_node {
                return (self.original, true);
            }
            if let Some(doc) = self.replicas.remove(node) {
                return (doc, true);
            }
        }
        (self.original, false)
    }
}

/// Resolves criteria into deduplicated download jobs.
pub struct ReplicaResolver<'a> {
    index: &'a dyn FileIndex,
    options: ResolveOptions,
}

impl<'a> ReplicaResolver<'a> {
    /// Creates a resolver querying `index`.
    #[must_use]
    pub fn new(index: &'a dyn FileIndex, options: ResolveOptions) -> Self {
        Self { index, options }
    }

    /// The options this resolver runs with.
    #[must_use]
    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Counts unique canonical files matching `criteria`, from its `start`
    /// offset on.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Index`] if the count query fails.
    pub async fn count(&self, criteria: &Criteria) -> Result<usize, ResolveError> {
        let originals = criteria.canonical().with_replica(false);
        Ok(self
            .index
            .search_page(&originals, criteria.start, 0)
            .await?
            .remaining)
    }

    /// Priority nodes, in priority order, that serve at least one replica
    /// matching `criteria`. Empty when there is no priority list.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Index`] if the facet query fails.
    pub async fn useful_priority_nodes(
        &self,
        criteria: &Criteria,
    ) -> Result<Vec<String>, ResolveError> {
        if criteria.data_node_priority.is_empty() {
            return Ok(Vec::new());
        }
        let replicas = criteria.canonical().with_replica(true);
        let serving = self.index.facet(&replicas, DATA_NODE_FIELD).await?;
        let useful: Vec<String> = criteria
            .data_node_priority
            .iter()
            .filter(|node| serving.get(node.as_str()).is_some_and(|count| *count > 0))
            .cloned()
            .collect();
        debug!(
            requested = criteria.data_node_priority.len(),
            useful = useful.len(),
            "priority nodes serving replicas"
        );
        Ok(useful)
    }

    /// Runs the full resolution protocol for `criteria`, queueing jobs on `sink`.
    ///
    /// With replica preference off, jobs are queued while originals are
    /// still being paged; an index failure part way through leaves the
    /// already queued jobs in the pipeline. With preference on nothing is
    /// queued until every query has succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Index`] on any failed query and
    /// [`ResolveError::PipelineClosed`] if the pipeline stops accepting jobs.
    pub async fn resolve(
        &self,
        criteria: &Criteria,
        sink: &mut JobSink,
    ) -> Result<ResolveReport, ResolveError> {
        let count = self.count(criteria).await?;
        self.resolve_counted(criteria, count, sink).await
    }

    /// Like [`ReplicaResolver::resolve`], for a caller that already ran
    /// [`ReplicaResolver::count`] on `criteria`.
    ///
    /// # Errors
    ///
    /// Same as [`ReplicaResolver::resolve`].
    #[instrument(skip(self, criteria, sink), fields(query = %criteria.query()))]
    pub async fn resolve_counted(
        &self,
        criteria: &Criteria,
        count: usize,
        sink: &mut JobSink,
    ) -> Result<ResolveReport, ResolveError> {
        let canonical = criteria.canonical();

        info!(count, "unique files matching");
        if count == 0 {
            return Ok(ResolveReport::stopped(0, ResolveOutcome::NothingFound));
        }
        if !self.options.permits(count) {
            warn!(
                count,
                threshold = self.options.bulk_threshold,
                "bulk download not confirmed"
            );
            return Ok(ResolveReport::stopped(count, ResolveOutcome::ThresholdExceeded));
        }

        let useful = self.useful_priority_nodes(&canonical).await?;
        if useful.is_empty() {
            return self.stream_originals(&canonical, sink).await;
        }

        info!(nodes = ?useful, "replica preference active");
        let mut files = self.collect_originals(&canonical).await?;
        self.collect_replicas(&canonical, &useful, &mut files).await?;

        let found = files.len();
        if !self.options.permits(found) {
            warn!(
                found,
                threshold = self.options.bulk_threshold,
                "bulk download not confirmed"
            );
            return Ok(ResolveReport::stopped(found, ResolveOutcome::ThresholdExceeded));
        }

        let mut submitted = 0;
        let mut preferred = 0;
        let mut rejected = 0;
        for (_, file) in files {
            let (doc, is_preferred) = file.select(&canonical.data_node_priority);
            debug!(
                instance_id = %doc.instance_id,
                data_node = %doc.data_node,
                preferred = is_preferred,
                "selected copy"
            );
            let Some(job) = DownloadJob::from_doc(doc, &self.options.output_dir, is_preferred)
            else {
                rejected += 1;
                continue;
            };
            if sink.submit(job).await? {
                submitted += 1;
                if is_preferred {
                    preferred += 1;
                }
            }
        }

        info!(found, submitted, preferred, rejected, "resolution complete");
        Ok(ResolveReport {
            found,
            submitted,
            preferred,
            rejected,
            replica_preference: true,
            outcome: ResolveOutcome::Submitted,
        })
    }

    /// Pages through canonical originals, queueing each as it arrives.
    async fn stream_originals(
        &self,
        canonical: &Criteria,
        sink: &mut JobSink,
    ) -> Result<ResolveReport, ResolveError> {
        let originals = canonical.with_replica(false);
        let page_size = self.page_size();
        let mut seen = HashSet::new();
        let mut submitted = 0;
        let mut rejected = 0;
        let mut cur = canonical.start;

        loop {
            let page = self.index.search_page(&originals, cur, page_size).await?;
            for doc in page.docs {
                if !seen.insert(doc.instance_id.clone()) {
                    warn!(instance_id = %doc.instance_id, "duplicate original ignored");
                    continue;
                }
                let Some(job) = DownloadJob::from_doc(doc, &self.options.output_dir, false) else {
                    rejected += 1;
                    continue;
                };
                if sink.submit(job).await? {
                    submitted += 1;
                }
            }
            debug!(submitted, remaining = page.remaining, "originals page queued");
            if page.remaining == 0 {
                break;
            }
            cur += page_size;
        }

        let found = seen.len();
        info!(found, submitted, rejected, "resolution complete");
        Ok(ResolveReport {
            found,
            submitted,
            preferred: 0,
            rejected,
            replica_preference: false,
            outcome: ResolveOutcome::Submitted,
        })
    }

    /// Pages through canonical originals into one logical file each.
    async fn collect_originals(
        &self,
        canonical: &Criteria,
    ) -> Result<BTreeMap<String, LogicalFile>, ResolveError> {
        let originals = canonical.with_replica(false);
        let page_size = self.page_size();
        let mut files = BTreeMap::new();
        let mut cur = canonical.start;

        loop {
            let page = self.index.search_page(&originals, cur, page_size).await?;
            for doc in page.docs {
                match files.entry(doc.instance_id.clone()) {
                    Entry::Vacant(slot) => {
                        slot.insert(LogicalFile::from_original(doc));
                    }
                    Entry::Occupied(_) => {
                        warn!(instance_id = %doc.instance_id, "duplicate original ignored");
                    }
                }
            }
            if page.remaining == 0 {
                break;
            }
            cur += page_size;
        }

        debug!(files = files.len(), "originals collected");
        Ok(files)
    }

    /// Pages through replicas on `nodes`, attaching each to its original.
    async fn collect_replicas(
        &self,
        canonical: &Criteria,
        nodes: &[String],
        files: &mut BTreeMap<String, LogicalFile>,
    ) -> Result<(), ResolveError> {
        let replicas = canonical.with_replica(true).with_data_nodes(nodes);
        let page_size = self.page_size();
        let mut attached = 0usize;
        let mut orphaned = 0usize;
        let mut cur = 0;

        loop {
            let page = self.index.search_page(&replicas, cur, page_size).await?;
            for doc in page.docs {
                if let Some(file) = files.get_mut(&doc.instance_id) {
                    file.add_replica(doc);
                    attached += 1;
                } else {
                    orphaned += 1;
                }
            }
            if page.remaining == 0 {
                break;
            }
            cur += page_size;
        }

        debug!(attached, orphaned, "replicas collected");
        Ok(())
    }

    fn page_size(&self) -> usize {
        self.options.page_size.max(1)
    }
}
