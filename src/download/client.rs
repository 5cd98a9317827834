//! HTTP client for fetching file bodies from data nodes.
//!
//! Bodies are streamed straight to disk; when a [`Verifier`] is supplied the
//! same chunks are hashed on the way through so verification needs no second
//! read of the file.

use std::path::Path;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::checksum::Verifier;
use super::constants::DEFAULT_DOWNLOAD_TIMEOUTS;
use super::error::DownloadError;
use crate::http_client::{HttpTimeouts, build_http_client};
use crate::user_agent;

/// HTTP client for data node transfers.
///
/// Create once and share between workers; clones reuse the connection pool.
///
/// # Example
///
/// ```no_run
/// use sproket_core::download::HttpClient;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new()?;
/// let bytes = client
///     .fetch_to_file("https://node.example.org/tas.nc", Path::new("./tas.nc.part"), None)
///     .await?;
/// println!("wrote {bytes} bytes");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default transfer timeouts (30s connect, 300s idle read).
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the underlying client cannot be built.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeouts(DEFAULT_DOWNLOAD_TIMEOUTS)
    }

    /// Creates a client with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the underlying client cannot be built.
    pub fn with_timeouts(timeouts: HttpTimeouts) -> Result<Self, DownloadError> {
        let client = build_http_client(user_agent::default_download_user_agent(), timeouts)
            .map_err(|source| DownloadError::ClientBuild { source })?;
        Ok(Self { client })
    }

    /// Fetches `url` and writes the body to `path`, truncating any previous content.
    ///
    /// Returns the number of bytes written. On error the file at `path` is
    /// left as-is for inspection.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidUrl`] if `url` does not parse
    /// - [`DownloadError::HttpStatus`] on a non-success response
    /// - [`DownloadError::EmptyBody`] if the body is zero bytes
    /// - [`DownloadError::Network`] / [`DownloadError::Timeout`] on transport failure
    /// - [`DownloadError::Io`] if the file cannot be created or written
    #[instrument(skip(self, path, verifier), fields(path = %path.display()))]
    pub async fn fetch_to_file(
        &self,
        url: &str,
        path: &Path,
        verifier: Option<&mut Verifier>,
    ) -> Result<u64, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let mut file = File::create(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        let bytes_written = stream_to_file(&mut file, response, url, path, verifier).await?;

        if bytes_written == 0 {
            return Err(DownloadError::EmptyBody {
                url: url.to_string(),
            });
        }

        debug!(bytes = bytes_written, "transfer complete");
        Ok(bytes_written)
    }
}

/// Streams the response body to file, hashing each chunk when asked.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    mut verifier: Option<&mut Verifier>,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;
        if let Some(v) = verifier.as_deref_mut() {
            v.update(&chunk);
        }

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}
