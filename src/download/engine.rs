//! Download pipeline: a fixed pool of workers draining a shared job queue.
//!
//! # Overview
//!
//! [`DownloadPipeline::start`] spawns `workers` Tokio tasks that share one
//! bounded channel receiver. The producer (the resolver) pushes
//! [`DownloadJob`]s through the returned sender and blocks when every worker is
//! busy and the channel is full. Dropping the sender closes the queue; each
//! worker exits once the queue is closed and empty, and
//! [`PipelineHandle::join`] waits for all of them.
//!
//! Per job a worker runs:
//! 1. skip test (final path exists and, when checkable, verifies)
//! 2. fetch to `<destination>.part`, hashing while writing
//! 3. checksum comparison
//! 4. rename of the partial file onto the final path
//!
//! Any failure in 2-4 is logged, counted and the worker moves on. Nothing is
//! retried; a re-run skips files already finalized.
//!
//! # Example
//!
//! ```no_run
//! use sproket_core::download::{DownloadPipeline, HttpClient, PipelineOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = DownloadPipeline::new(PipelineOptions::default(), HttpClient::new()?)?;
//! let (jobs, handle) = pipeline.start();
//! // ... submit jobs ...
//! drop(jobs);
//! let stats = handle.join().await;
//! println!("completed: {}, failed: {}", stats.completed(), stats.failed());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::checksum::{Verifier, verify_file};
use super::{DownloadError, HttpClient};
use crate::resolver::DownloadJob;
use crate::search::Checksum;

/// Minimum allowed worker count.
const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
const MAX_WORKERS: usize = 100;

/// Default worker count if not specified.
pub const DEFAULT_WORKERS: usize = 4;

/// Jobs buffered per worker before the producer blocks.
const QUEUE_SLOTS_PER_WORKER: usize = 2;

/// Error type for pipeline construction.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid worker count provided.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkers {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Options controlling the download pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Number of parallel workers (1-100).
    pub workers: usize,
    /// Verify checksums when the record publishes one.
    pub verify: bool,
    /// Treat a record without a checksum as a verification failure.
    pub require_checksum: bool,
    /// Log jobs without transferring or writing anything.
    pub dry_run: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            verify: true,
            require_checksum: false,
            dry_run: false,
        }
    }
}

/// Statistics from one pipeline run.
///
/// Atomic counters so every worker can update them without locking.
#[derive(Debug, Default)]
pub struct DownloadStats {
    completed: AtomicUsize,
    skipped: AtomicUsize,
    verified: AtomicUsize,
    failed: AtomicUsize,
    verification_failed: AtomicUsize,
    planned: AtomicUsize,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files transferred and finalized in this run.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Jobs dropped because the final file was already present.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Files whose checksum was confirmed, freshly transferred or already present.
    #[must_use]
    pub fn verified(&self) -> usize {
        self.verified.load(Ordering::SeqCst)
    }

    /// Jobs that ended in an error.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Subset of [`failed`](Self::failed) caused by verification.
    #[must_use]
    pub fn verification_failed(&self) -> usize {
        self.verification_failed.load(Ordering::SeqCst)
    }

    /// Jobs only logged because of dry-run mode.
    #[must_use]
    pub fn planned(&self) -> usize {
        self.planned.load(Ordering::SeqCst)
    }

    /// Total jobs consumed by workers.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.skipped() + self.failed() + self.planned()
    }

    fn record(&self, outcome: &Result<JobOutcome, DownloadError>) {
        match outcome {
            Ok(JobOutcome::Downloaded { verified, .. }) => {
                self.completed.fetch_add(1, Ordering::SeqCst);
                if *verified {
                    self.verified.fetch_add(1, Ordering::SeqCst);
                }
            }
            Ok(JobOutcome::AlreadyPresent { verified }) => {
                self.skipped.fetch_add(1, Ordering::SeqCst);
                if *verified {
                    self.verified.fetch_add(1, Ordering::SeqCst);
                }
            }
            Ok(JobOutcome::Planned) => {
                self.planned.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                if e.is_verification() {
                    self.verification_failed.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    fn snapshot(&self) -> Self {
        let copy = Self::new();
        copy.completed.store(self.completed(), Ordering::SeqCst);
        copy.skipped.store(self.skipped(), Ordering::SeqCst);
        copy.verified.store(self.verified(), Ordering::SeqCst);
        copy.failed.store(self.failed(), Ordering::SeqCst);
        copy.verification_failed
            .store(self.verification_failed(), Ordering::SeqCst);
        copy.planned.store(self.planned(), Ordering::SeqCst);
        copy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Downloaded { bytes: u64, verified: bool },
    AlreadyPresent { verified: bool },
    Planned,
}

/// Fixed-size worker pool for [`DownloadJob`]s.
#[derive(Debug)]
pub struct DownloadPipeline {
    options: PipelineOptions,
    client: HttpClient,
}

impl DownloadPipeline {
    /// Creates a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidWorkers`] if `options.workers` is
    /// outside 1-100.
    #[instrument(level = "debug", skip(client))]
    pub fn new(options: PipelineOptions, client: HttpClient) -> Result<Self, PipelineError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&options.workers) {
            return Err(PipelineError::InvalidWorkers {
                value: options.workers,
            });
        }
        Ok(Self { options, client })
    }

    /// Returns the configured options.
    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Spawns the workers and returns the job sender plus a join handle.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(self) -> (mpsc::Sender<DownloadJob>, PipelineHandle) {
        let workers = self.options.workers;
        let (tx, rx) = mpsc::channel(workers * QUEUE_SLOTS_PER_WORKER);
        let rx = Arc::new(Mutex::new(rx));
        let stats = Arc::new(DownloadStats::new());
        let shared = Arc::new(self);

        info!(
            workers,
            verify = shared.options.verify,
            dry_run = shared.options.dry_run,
            "starting download workers"
        );

        let handles = (0..workers)
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let stats = Arc::clone(&stats);
                let pipeline = Arc::clone(&shared);
                tokio::spawn(async move { pipeline.run_worker(worker_id, &rx, &stats).await })
            })
            .collect();

        (tx, PipelineHandle { handles, stats })
    }

    async fn run_worker(
        &self,
        worker_id: usize,
        jobs: &Mutex<mpsc::Receiver<DownloadJob>>,
        stats: &DownloadStats,
    ) {
        loop {
            let next = jobs.lock().await.recv().await;
            let Some(job) = next else {
                debug!(worker_id, "queue closed, worker exiting");
                break;
            };

            let outcome = self.process_job(&job).await;
            match &outcome {
                Ok(JobOutcome::Downloaded { bytes, verified }) => info!(
                    worker_id,
                    instance_id = %job.instance_id,
                    data_node = %job.data_node,
                    bytes,
                    verified,
                    path = %job.destination.display(),
                    "download complete"
                ),
                Ok(JobOutcome::AlreadyPresent { verified }) => info!(
                    worker_id,
                    instance_id = %job.instance_id,
                    verified,
                    "skipped, already present"
                ),
                Ok(JobOutcome::Planned) => info!(
                    worker_id,
                    instance_id = %job.instance_id,
                    data_node = %job.data_node,
                    url = job.url.as_deref().unwrap_or("<none>"),
                    "dry run, not downloading"
                ),
                Err(e) if e.is_verification() => warn!(
                    worker_id,
                    instance_id = %job.instance_id,
                    error = %e,
                    "checksum verification failed"
                ),
                Err(e) => warn!(
                    worker_id,
                    instance_id = %job.instance_id,
                    data_node = %job.data_node,
                    error = %e,
                    "download failed"
                ),
            }
            stats.record(&outcome);
        }
    }

    async fn process_job(&self, job: &DownloadJob) -> Result<JobOutcome, DownloadError> {
        if self.options.dry_run {
            return Ok(JobOutcome::Planned);
        }

        let checksum = self.checksum_for(job)?;
        // Built up front so an unknown algorithm fails before any transfer.
        let mut verifier = new_verifier(job, checksum)?;

        let exists = tokio::fs::try_exists(&job.destination)
            .await
            .map_err(|e| DownloadError::io(&job.destination, e))?;
        if exists {
            let Some(existing) = new_verifier(job, checksum)? else {
                return Ok(JobOutcome::AlreadyPresent { verified: false });
            };
            match verify_file(&job.destination, existing).await {
                Ok(()) => return Ok(JobOutcome::AlreadyPresent { verified: true }),
                Err(DownloadError::ChecksumMismatch { actual, .. }) => warn!(
                    instance_id = %job.instance_id,
                    actual,
                    "existing file fails verification, fetching again"
                ),
                Err(e) => return Err(e),
            }
        }

        let url = job
            .url
            .as_deref()
            .ok_or_else(|| DownloadError::MissingUrl {
                instance_id: job.instance_id.clone(),
            })?;

        debug!(instance_id = %job.instance_id, url, "download started");
        let bytes = self
            .client
            .fetch_to_file(url, &job.partial, verifier.as_mut())
            .await?;

        let verified = match verifier {
            Some(v) => {
                v.finish(&job.partial)?;
                debug!(instance_id = %job.instance_id, "verified");
                true
            }
            None => false,
        };

        tokio::fs::rename(&job.partial, &job.destination)
            .await
            .map_err(|e| DownloadError::io(&job.destination, e))?;

        Ok(JobOutcome::Downloaded { bytes, verified })
    }

    fn checksum_for<'j>(&self, job: &'j DownloadJob) -> Result<Option<&'j Checksum>, DownloadError> {
        if !self.options.verify {
            return Ok(None);
        }
        match job.checksum.as_ref() {
            Some(c) => Ok(Some(c)),
            None if self.options.require_checksum => Err(DownloadError::MissingChecksum {
                instance_id: job.instance_id.clone(),
            }),
            None => Ok(None),
        }
    }
}

fn new_verifier(
    job: &DownloadJob,
    checksum: Option<&Checksum>,
) -> Result<Option<Verifier>, DownloadError> {
    checksum
        .map(|c| Verifier::for_checksum(&job.instance_id, c))
        .transpose()
}

/// Handle to a running pipeline.
#[derive(Debug)]
pub struct PipelineHandle {
    handles: Vec<JoinHandle<()>>,
    stats: Arc<DownloadStats>,
}

impl PipelineHandle {
    /// Live counters, readable while workers run.
    #[must_use]
    pub fn stats(&self) -> &DownloadStats {
        &self.stats
    }

    /// Waits for every worker to exit and returns the final statistics.
    ///
    /// Workers only exit once every sender for the queue has been dropped.
    pub async fn join(self) -> DownloadStats {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "download worker panicked");
            }
        }

        let stats = self.stats;
        info!(
            completed = stats.completed(),
            skipped = stats.skipped(),
            verified = stats.verified(),
            failed = stats.failed(),
            "download pipeline finished"
        );

        match Arc::try_unwrap(stats) {
            Ok(stats) => stats,
            Err(shared) => shared.snapshot(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::Path;

    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::resolver::PARTIAL_SUFFIX;
    use crate::test_support::socket_guard::start_mock_server_or_skip;

    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn job(dir: &Path, id: &str, url: Option<String>, checksum: Option<&str>) -> DownloadJob {
        let destination = dir.join(id);
        let partial = dir.join(format!("{id}{PARTIAL_SUFFIX}"));
        DownloadJob {
            instance_id: id.to_string(),
            data_node: "node.example.org".to_string(),
            url,
            destination,
            partial,
            checksum: checksum.map(|value| Checksum {
                value: value.to_string(),
                algorithm: "SHA256".to_string(),
            }),
            preferred: false,
        }
    }

    async fn run(options: PipelineOptions, jobs: Vec<DownloadJob>) -> DownloadStats {
        let pipeline = DownloadPipeline::new(options, HttpClient::new().unwrap()).unwrap();
        let (tx, handle) = pipeline.start();
        for job in jobs {
            tx.send(job).await.unwrap();
        }
        drop(tx);
        handle.join().await
    }

    async fn mount_hello(server: &MockServer, route: &str, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path(route.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello world"))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[test]
    fn test_pipeline_rejects_invalid_worker_counts() {
        for workers in [0, 101] {
            let options = PipelineOptions {
                workers,
                ..PipelineOptions::default()
            };
            let result = DownloadPipeline::new(options, HttpClient::new().unwrap());
            assert!(
                matches!(result, Err(PipelineError::InvalidWorkers { value }) if value == workers)
            );
        }
    }

    #[test]
    fn test_pipeline_accepts_bounds() {
        for workers in [1, 100] {
            let options = PipelineOptions {
                workers,
                ..PipelineOptions::default()
            };
            assert!(DownloadPipeline::new(options, HttpClient::new().unwrap()).is_ok());
        }
    }

    #[tokio::test]
    async fn test_verified_download_is_renamed_to_final_path() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        mount_hello(&server, "/tas.nc", 1).await;

        let j = job(
            dir.path(),
            "tas.nc",
            Some(format!("{}/tas.nc", server.uri())),
            Some(HELLO_SHA256),
        );
        let stats = run(PipelineOptions::default(), vec![j.clone()]).await;

        assert_eq!(stats.completed(), 1);
        assert_eq!(stats.verified(), 1);
        assert_eq!(stats.failed(), 0);
        assert_eq!(std::fs::read(&j.destination).unwrap(), b"hello world");
        assert!(!j.partial.exists(), "partial must be promoted");
    }

    #[tokio::test]
    async fn test_checksum_mismatch_keeps_partial_unrenamed() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        Mock::given(method("GET"))
            .and(path("/tas.nc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello worle"))
            .mount(&server)
            .await;

        let j = job(
            dir.path(),
            "tas.nc",
            Some(format!("{}/tas.nc", server.uri())),
            Some(HELLO_SHA256),
        );
        let stats = run(PipelineOptions::default(), vec![j.clone()]).await;

        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.verification_failed(), 1);
        assert!(!j.destination.exists());
        assert_eq!(std::fs::read(&j.partial).unwrap(), b"hello worle");
    }

    #[tokio::test]
    async fn test_verified_file_on_disk_is_skipped_without_fetch() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        mount_hello(&server, "/tas.nc", 0).await;

        let j = job(
            dir.path(),
            "tas.nc",
            Some(format!("{}/tas.nc", server.uri())),
            Some(HELLO_SHA256),
        );
        std::fs::write(&j.destination, b"hello world").unwrap();

        let stats = run(PipelineOptions::default(), vec![j]).await;
        assert_eq!(stats.skipped(), 1);
        assert_eq!(stats.verified(), 1);
        assert_eq!(stats.completed(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_file_on_disk_is_fetched_again() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        mount_hello(&server, "/tas.nc", 1).await;

        let j = job(
            dir.path(),
            "tas.nc",
            Some(format!("{}/tas.nc", server.uri())),
            Some(HELLO_SHA256),
        );
        std::fs::write(&j.destination, b"truncated").unwrap();

        let stats = run(PipelineOptions::default(), vec![j.clone()]).await;
        assert_eq!(stats.completed(), 1);
        assert_eq!(std::fs::read(&j.destination).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_pool() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        mount_hello(&server, "/ok.nc", 1).await;
        Mock::given(method("GET"))
            .and(path("/gone.nc"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let jobs = vec![
            job(dir.path(), "gone.nc", Some(format!("{}/gone.nc", server.uri())), None),
            job(dir.path(), "ok.nc", Some(format!("{}/ok.nc", server.uri())), None),
            job(dir.path(), "nourl.nc", None, None),
        ];
        let options = PipelineOptions {
            workers: 1,
            ..PipelineOptions::default()
        };
        let stats = run(options, jobs).await;

        assert_eq!(stats.completed(), 1);
        assert_eq!(stats.failed(), 2);
        assert_eq!(stats.verification_failed(), 0);
        assert!(dir.path().join("ok.nc").exists());
    }

    #[tokio::test]
    async fn test_require_checksum_fails_job_without_checksum() {
        let dir = TempDir::new().unwrap();
        let options = PipelineOptions {
            require_checksum: true,
            ..PipelineOptions::default()
        };
        let j = job(dir.path(), "f.nc", Some("http://127.0.0.1:9/f.nc".to_string()), None);
        let stats = run(options, vec![j]).await;
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.verification_failed(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_algorithm_fails_before_transfer() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        mount_hello(&server, "/f.nc", 0).await;

        let mut j = job(dir.path(), "f.nc", Some(format!("{}/f.nc", server.uri())), None);
        j.checksum = Some(Checksum {
            value: "abcd".to_string(),
            algorithm: "CRC32".to_string(),
        });
        let stats = run(PipelineOptions::default(), vec![j]).await;
        assert_eq!(stats.verification_failed(), 1);
    }

    #[tokio::test]
    async fn test_no_verify_ignores_bad_checksum() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        mount_hello(&server, "/f.nc", 1).await;

        let j = job(
            dir.path(),
            "f.nc",
            Some(format!("{}/f.nc", server.uri())),
            Some("00"),
        );
        let options = PipelineOptions {
            verify: false,
            ..PipelineOptions::default()
        };
        let stats = run(options, vec![j.clone()]).await;
        assert_eq!(stats.completed(), 1);
        assert_eq!(stats.verified(), 0);
        assert!(j.destination.exists());
    }

    #[tokio::test]
    async fn test_dry_run_touches_neither_network_nor_disk() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        mount_hello(&server, "/f.nc", 0).await;

        let j = job(dir.path(), "f.nc", Some(format!("{}/f.nc", server.uri())), None);
        let options = PipelineOptions {
            dry_run: true,
            ..PipelineOptions::default()
        };
        let stats = run(options, vec![j.clone()]).await;
        assert_eq!(stats.planned(), 1);
        assert_eq!(stats.total(), 1);
        assert!(!j.destination.exists());
        assert!(!j.partial.exists());
    }

    #[tokio::test]
    async fn test_join_with_no_jobs_returns_zero_stats() {
        let stats = run(PipelineOptions::default(), Vec::new()).await;
        assert_eq!(stats.total(), 0);
    }
}
