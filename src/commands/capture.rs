use crate::config::ColometryConfig;
use crate::hardware::{ConfiguredHardware, HardwareProvider};
use crate::session::{CancelFlag, CaptureSession, SessionFailure, SessionManifest};
use crate::storage::{ArtifactKind, ArtifactLayout};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Run one capture session on a blocking worker thread.
///
/// This is the unit of work a request handler triggers. The pipeline itself
/// is synchronous; it is moved onto `spawn_blocking` so camera reads and the
/// inter-capture delay never stall the async runtime.
pub async fn run_capture_session<P>(
    provider: P,
    config: ColometryConfig,
    cancel: CancelFlag,
) -> Result<SessionManifest, String>
where
    P: HardwareProvider + Send + 'static,
{
    config.validate().map_err(|e| format!("Invalid configuration: {}", e))?;

    log::info!(
        "Running capture session: {} captures into {}",
        config.session.capture_count,
        config.storage.output_root
    );

    let result = tokio::task::spawn_blocking(move || {
        let mut session = CaptureSession::new(provider, &config).with_cancel_flag(cancel);
        session.run()
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))?;

    match result {
        Ok(manifest) => {
            log::info!(
                "Capture session {} produced {} pages",
                manifest.session_id,
                manifest.page_count
            );
            Ok(manifest)
        }
        Err(failure) => {
            log_partial_output(&failure);
            Err(failure.to_string())
        }
    }
}

/// Run a session against the hardware named in `config`.
pub async fn run_configured_session(
    config: ColometryConfig,
    cancel: CancelFlag,
) -> Result<SessionManifest, String> {
    let provider = ConfiguredHardware::new(config.clone());
    run_capture_session(provider, config, cancel).await
}

/// Most recent artifact of each kind under an output root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestArtifacts {
    pub pdf_path: Option<PathBuf>,
    pub image_path: Option<PathBuf>,
    pub histogram_path: Option<PathBuf>,
}

impl LatestArtifacts {
    pub fn is_complete(&self) -> bool {
        self.pdf_path.is_some() && self.image_path.is_some() && self.histogram_path.is_some()
    }
}

/// Locate the newest PDF, image and histogram under `output_root`.
pub async fn get_latest_artifacts(output_root: String) -> Result<LatestArtifacts, String> {
    tokio::task::spawn_blocking(move || {
        let layout = ArtifactLayout::new(output_root);
        let find = |kind: ArtifactKind| {
            layout
                .latest(kind)
                .map_err(|e| format!("Failed to scan {:?}: {}", layout.dir(kind), e))
        };
        Ok::<_, String>(LatestArtifacts {
            pdf_path: find(ArtifactKind::Pdf)?,
            image_path: find(ArtifactKind::Image)?,
            histogram_path: find(ArtifactKind::Histogram)?,
        })
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))?
}

fn log_partial_output(failure: &SessionFailure) {
    log::error!("{}", failure);
    if let Some(path) = &failure.manifest.document_path {
        log::warn!(
            "Partial report with {} pages kept at {:?}",
            failure.manifest.page_count,
            path
        );
    }
}
