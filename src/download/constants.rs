//! Constants for the download module (timeouts, buffer sizes).

use crate::http_client::HttpTimeouts;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout between body reads (5 minutes).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default timeouts for data node transfers. No overall deadline: a large
/// file that keeps streaming runs to completion.
pub const DEFAULT_DOWNLOAD_TIMEOUTS: HttpTimeouts =
    HttpTimeouts::new(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS);

/// Read buffer used when re-hashing a file already on disk.
pub const VERIFY_READ_BUFFER_BYTES: usize = 64 * 1024;
