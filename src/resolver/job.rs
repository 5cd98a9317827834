//! Download jobs handed from the resolver to the download pipeline.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::error::ResolveError;
use crate::search::{Checksum, Doc};

/// Suffix appended to the destination file name while a transfer is in flight.
pub const PARTIAL_SUFFIX: &str = ".part";

/// One concrete copy selected for transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    /// Logical file identity; also the destination file name.
    pub instance_id: String,
    /// Data node the copy is fetched from.
    pub data_node: String,
    /// HTTP URL to fetch, absent when the record exposed none.
    pub url: Option<String>,
    /// Final path, `<output_dir>/<instance_id>`.
    pub destination: PathBuf,
    /// In-flight path, promoted to `destination` only after success.
    pub partial: PathBuf,
    /// Checksum to verify against, when the record published one.
    pub checksum: Option<Checksum>,
    /// Whether a priority data node was chosen for this file.
    pub preferred: bool,
}

/// Whether `instance_id` names exactly one plain entry, so joining it onto
/// the output directory cannot leave that directory.
#[must_use]
pub fn is_plain_file_name(instance_id: &str) -> bool {
    if instance_id.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(instance_id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

impl DownloadJob {
    /// Builds a job for `doc` writing into `output_dir`.
    ///
    /// Returns `None` (and logs a warning) when the record's `instance_id`
    /// is not a plain file name, e.g. absolute or containing `/` or `..`.
    #[must_use]
    pub fn from_doc(doc: Doc, output_dir: &Path, preferred: bool) -> Option<Self> {
        if !is_plain_file_name(&doc.instance_id) {
            warn!(
                instance_id = %doc.instance_id,
                data_node = %doc.data_node,
                "instance_id is not a plain file name, record rejected"
            );
            return None;
        }
        let destination = output_dir.join(&doc.instance_id);
        let partial = output_dir.join(format!("{}{PARTIAL_SUFFIX}", doc.instance_id));
        Some(Self {
            instance_id: doc.instance_id,
            data_node: doc.data_node,
            url: doc.http_url,
            destination,
            partial,
            checksum: doc.checksum,
            preferred,
        })
    }
}

/// Producer side of the pipeline queue.
///
/// Remembers every `instance_id` it has accepted during the run, so a file
/// matched by several criteria is still submitted once.
#[derive(Debug)]
pub struct JobSink {
    tx: mpsc::Sender<DownloadJob>,
    seen: HashSet<String>,
    submitted: usize,
}

impl JobSink {
    /// Wraps the sending half of the pipeline queue.
    #[must_use]
    pub fn new(tx: mpsc::Sender<DownloadJob>) -> Self {
        Self {
            tx,
            seen: HashSet::new(),
            submitted: 0,
        }
    }

    /// Whether a job for `instance_id` was already submitted this run.
    #[must_use]
    pub fn contains(&self, instance_id: &str) -> bool {
        self.seen.contains(instance_id)
    }

    /// Total jobs accepted so far.
    #[must_use]
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Queues `job`, waiting while the queue is full.
    ///
    /// Returns `Ok(false)` without queueing when the same `instance_id` was
    /// already submitted.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::PipelineClosed`] if every worker has gone away.
    pub async fn submit(&mut self, job: DownloadJob) -> Result<bool, ResolveError> {
        if !self.seen.insert(job.instance_id.clone()) {
            debug!(instance_id = %job.instance_id, "already submitted this run");
            return Ok(false);
        }
        self.tx
            .send(job)
            .await
            .map_err(|_| ResolveError::PipelineClosed)?;
        self.submitted += 1;
        Ok(true)
    }
}
