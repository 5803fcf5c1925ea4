//! Progress reporting types shared by downloads and segmentation.

use std::sync::Arc;

/// A single progress observation forwarded to a caller-supplied callback.
///
/// `percent` is clamped to 0..=100 by producers; `phase` carries an optional
/// human-readable description of the current stage ("Uploading video...").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub phase: Option<String>,
}

impl ProgressUpdate {
    pub fn percent(percent: u8) -> Self {
        Self {
            percent: percent.min(100),
            phase: None,
        }
    }

    pub fn with_phase(percent: u8, phase: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            phase: Some(phase.into()),
        }
    }
}

/// Shared callback type for progress observers.
///
/// Callbacks are invoked from background tasks and must not block; producers
/// hold no locks while calling them.
pub type ProgressFn = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// A callback that discards every update.
pub fn noop_progress() -> ProgressFn {
    Arc::new(|_| {})
}
