//! # Prep Common
//!
//! Shared building blocks for the subprep download/segmentation pipeline:
//! a generic retry-with-backoff utility, progress reporting types, and
//! clock-style time formatting used by segment descriptors.

pub mod clock;
pub mod progress;
pub mod retry;

pub use progress::{ProgressFn, ProgressUpdate, noop_progress};
pub use retry::{RetryAction, RetryError, RetryPolicy, retry_with_backoff};

pub use tokio_util::sync::CancellationToken;
