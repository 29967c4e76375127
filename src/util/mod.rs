//! Shared helpers: crate error, retry schedules, cancellation tokens.

pub mod cancel;
pub mod error;
pub mod retry;

pub use cancel::CancellationToken;
pub use error::KvPlaneError;
pub use retry::{RetryHandle, RetryPolicy};

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, saturating at zero for clocks set
/// before 1970.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
