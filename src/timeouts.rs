//! Shared time budgets for deployment tasks and their cleanup jobs.

use crate::topology::params::{DEFAULT_CLEANUP_RETRY_DELAY_MS, DEFAULT_NEW_NODE_RETRY_TIME_MS};
use std::time::Duration;

/// Total time a cleanup job keeps trying to repair a half-deployed node.
pub const NEW_NODE_RETRY_TIME: Duration = Duration::from_millis(DEFAULT_NEW_NODE_RETRY_TIME_MS);
/// Pause between cleanup attempts.
pub const CLEANUP_RETRY_DELAY: Duration = Duration::from_millis(DEFAULT_CLEANUP_RETRY_DELAY_MS);
/// Pause before re-reading metadata after a compare-and-commit conflict.
pub const COMMIT_CONFLICT_BACKOFF: Duration = Duration::from_millis(50);
/// Total attempts at the read-modify-commit cycle of a deployment.
pub const DEFAULT_COMMIT_ATTEMPTS: usize = 3;
