//! Colometry: camera colorimetry pipeline
//!
//! Captures a fixed number of frames from a camera, analyzes the centered
//! region of interest of each frame, renders a per-channel histogram and
//! appends a page per capture to a PDF report.
//!
//! # Features
//! - Scoped hardware acquisition: the camera (and optional LED) are released
//!   exactly once on every exit path
//! - Per-channel 256-bin histograms and truncated channel means
//! - Pure-Rust histogram rendering and PDF assembly
//! - Simulated hardware with failure injection for offline testing
//!
//! # Usage
//! ```rust,no_run
//! use colometry::{CaptureSession, ColometryConfig};
//! use colometry::testing::SimulatedHardware;
//!
//! let config = ColometryConfig::default();
//! let mut session = CaptureSession::new(SimulatedHardware::new(1920, 1080), &config);
//! match session.run() {
//!     Ok(manifest) => println!("report: {:?}", manifest.document_path),
//!     Err(failure) => eprintln!("{}", failure),
//! }
//! ```
pub mod analysis;
pub mod commands;
pub mod config;
pub mod errors;
pub mod hardware;
pub mod histogram;
pub mod report;
pub mod session;
pub mod storage;
pub mod types;

// Testing utilities - synthetic frames and simulated hardware
pub mod testing;

// Re-exports for convenience
pub use analysis::{AnalyzedFrame, FrameAnalyzer};
pub use config::ColometryConfig;
pub use errors::ColometryError;
pub use hardware::{ConfiguredHardware, HardwareProvider, HardwareResources};
pub use histogram::HistogramRenderer;
pub use report::ReportDocument;
pub use session::{
    CancelFlag, CaptureSession, SessionFailure, SessionManifest, SessionOutcome, SessionState,
};
pub use storage::{ArtifactKind, ArtifactLayout};
pub use types::{CaptureRecord, IlluminationColor, RawFrame, RegionOfInterest};

/// Initialize logging for the pipeline
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "colometry=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        camera_backend: cfg!(feature = "camera"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Built with the native camera backend
    pub camera_backend: bool,
}
