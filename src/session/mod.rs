/// Capture session orchestration
///
/// A session acquires the hardware, runs the capture -> analyze -> render ->
/// append-page loop, saves the report, releases the hardware and returns a
/// manifest of what it produced. The report is saved and the hardware
/// released on every exit path.
pub mod orchestrator;

pub use orchestrator::CaptureSession;

use crate::errors::ColometryError;
use crate::types::CaptureRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Init,
    Acquiring,
    /// Working on the given 1-based capture
    Capturing(u32),
    Finalizing,
    Releasing,
    Done,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Aborted)
    }
}

/// How the capture loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Every requested capture was taken
    Completed,
    /// A capture returned no frame; earlier pages were kept
    EndedEarly { failed_capture: u32, reason: String },
    /// The cancel flag was raised between captures
    Cancelled { after_capture: u32 },
    /// A fatal error ended the session
    Aborted { reason: String },
}

/// Structured summary of a session's artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionManifest {
    pub session_id: String,
    pub output_root: PathBuf,
    /// Set once the report has been written
    pub document_path: Option<PathBuf>,
    pub page_count: usize,
    pub target_capture_count: u32,
    pub completed_captures: u32,
    pub image_paths: Vec<PathBuf>,
    pub histogram_paths: Vec<PathBuf>,
    pub capture_records: Vec<CaptureRecord>,
    pub outcome: SessionOutcome,
}

/// A session that ended in error, with whatever it produced before failing.
#[derive(Debug)]
pub struct SessionFailure {
    pub error: ColometryError,
    pub manifest: SessionManifest,
}

impl SessionFailure {
    pub fn into_error(self) -> ColometryError {
        self.error
    }
}

impl std::fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "capture session {} failed after {} of {} captures: {}",
            self.manifest.session_id,
            self.manifest.completed_captures,
            self.manifest.target_capture_count,
            self.error
        )
    }
}

impl std::error::Error for SessionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Cooperative cancellation, checked between captures only.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
