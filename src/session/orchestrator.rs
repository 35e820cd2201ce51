use super::{CancelFlag, SessionFailure, SessionManifest, SessionOutcome, SessionState};
use crate::analysis::FrameAnalyzer;
use crate::config::ColometryConfig;
use crate::errors::ColometryError;
use crate::hardware::{HardwareProvider, HardwareResources};
use crate::histogram::HistogramRenderer;
use crate::report::ReportDocument;
use crate::storage::{timestamp, ArtifactLayout};
use crate::types::{CaptureRecord, IlluminationColor, RawFrame};
use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Granularity of the inter-capture wait, so cancellation is noticed promptly.
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Everything a run has produced so far. Paths are recorded as they are
/// written so cleanup never has to reconstruct file names.
#[derive(Debug, Default)]
struct Progress {
    records: Vec<CaptureRecord>,
    image_paths: Vec<PathBuf>,
    histogram_paths: Vec<PathBuf>,
}

/// Drives one capture session from acquisition to release.
pub struct CaptureSession<P: HardwareProvider> {
    started_stamp: String,
    session_id: String,
    target_capture_count: u32,
    inter_capture_delay: Duration,
    illumination_color: Option<IlluminationColor>,
    jpeg_quality: u8,
    layout: ArtifactLayout,
    provider: P,
    analyzer: FrameAnalyzer,
    renderer: HistogramRenderer,
    cancel: CancelFlag,
    state: SessionState,
    transitions: Vec<SessionState>,
}

impl<P: HardwareProvider> CaptureSession<P> {
    pub fn new(provider: P, config: &ColometryConfig) -> Self {
        Self::starting_at(provider, config, Local::now())
    }

    /// Session whose id and report name derive from `started_at`.
    pub fn starting_at(provider: P, config: &ColometryConfig, started_at: DateTime<Local>) -> Self {
        let started_stamp = timestamp(&started_at);
        let illumination_color = config
            .illumination
            .enabled
            .then(|| IlluminationColor::from(config.illumination.color));

        Self {
            session_id: started_stamp.clone(),
            started_stamp,
            target_capture_count: config.session.capture_count,
            inter_capture_delay: config.session.inter_capture_delay(),
            illumination_color,
            jpeg_quality: config.storage.jpeg_quality.clamp(1, 100),
            layout: ArtifactLayout::new(&config.storage.output_root),
            provider,
            analyzer: FrameAnalyzer::new(),
            renderer: HistogramRenderer::default(),
            cancel: CancelFlag::new(),
            state: SessionState::Init,
            transitions: vec![SessionState::Init],
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// The start stamp until `run` claims an id unused under the output root.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state the session has passed through, in order.
    pub fn transitions(&self) -> &[SessionState] {
        &self.transitions
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Run the session to completion.
    ///
    /// A capture failure ends the loop early but still yields `Ok`. Any other
    /// error is returned after the report has been saved and the hardware
    /// released, together with the manifest of what was produced.
    pub fn run(&mut self) -> Result<SessionManifest, SessionFailure> {
        if self.state != SessionState::Init {
            return Err(self.failure(
                ColometryError::InvalidArgument(format!(
                    "session {} already ran (state {:?})",
                    self.session_id, self.state
                )),
                Progress::default(),
                None,
                0,
            ));
        }

        self.session_id = self.layout.unique_session_id(&self.started_stamp);
        log::info!(
            "Starting capture session {}: {} captures, {:?} apart, output {:?}",
            self.session_id,
            self.target_capture_count,
            self.inter_capture_delay,
            self.layout.root()
        );

        self.transition(SessionState::Acquiring);
        let mut hardware = match self.acquire() {
            Ok(hardware) => hardware,
            Err(e) => {
                log::error!("Session {} aborted before capturing: {}", self.session_id, e);
                self.transition(SessionState::Aborted);
                return Err(self.failure(e, Progress::default(), None, 0));
            }
        };

        let mut document = ReportDocument::open(self.layout.report_path(&self.session_id));
        let mut progress = Progress::default();

        let loop_result = self.capture_loop(&mut hardware, &mut document, &mut progress);

        self.transition(SessionState::Finalizing);
        let saved = self.finalize(&mut document);

        self.transition(SessionState::Releasing);
        hardware.release();
        drop(hardware);

        let page_count = document.page_count();
        let document_path = match &saved {
            Ok(path) => Some(path.clone()),
            Err(_) => None,
        };

        match (loop_result, saved) {
            (Ok(outcome), Ok(_)) => {
                self.transition(SessionState::Done);
                let manifest = self.manifest(progress, document_path, page_count, outcome);
                log::info!(
                    "Session {} done: {}/{} captures, report {:?}",
                    self.session_id,
                    manifest.completed_captures,
                    manifest.target_capture_count,
                    manifest.document_path
                );
                Ok(manifest)
            }
            (Err(error), saved) => {
                if let Err(save_error) = saved {
                    log::error!("Report for failed session was not saved: {}", save_error);
                }
                log::error!("Session {} failed: {}", self.session_id, error);
                self.transition(SessionState::Aborted);
                Err(self.failure(error, progress, document_path, page_count))
            }
            (Ok(_), Err(error)) => {
                log::error!("Session {} failed to save its report: {}", self.session_id, error);
                self.transition(SessionState::Aborted);
                Err(self.failure(error, progress, document_path, page_count))
            }
        }
    }

    fn acquire(&mut self) -> Result<HardwareResources, ColometryError> {
        self.layout.ensure().map_err(|e| {
            ColometryError::ResourceUnavailable(format!(
                "output directory {:?} unavailable: {}",
                self.layout.root(),
                e
            ))
        })?;

        let mut hardware = self.provider.acquire()?;
        log::info!("Acquired camera {}", hardware.device_id());
        if let Some(color) = self.illumination_color {
            hardware.set_illumination(color);
        }
        Ok(hardware)
    }

    fn capture_loop(
        &mut self,
        hardware: &mut HardwareResources,
        document: &mut ReportDocument,
        progress: &mut Progress,
    ) -> Result<SessionOutcome, ColometryError> {
        for index in 1..=self.target_capture_count {
            if self.cancel.is_cancelled() {
                log::info!("Session {} cancelled before capture {}", self.session_id, index);
                return Ok(SessionOutcome::Cancelled {
                    after_capture: index - 1,
                });
            }

            self.transition(SessionState::Capturing(index));
            let frame = match hardware.capture_frame() {
                Ok(frame) => frame,
                Err(e) if e.is_recoverable() => {
                    log::warn!(
                        "Capture {} failed, finalizing with {} pages: {}",
                        index,
                        progress.records.len(),
                        e
                    );
                    return Ok(SessionOutcome::EndedEarly {
                        failed_capture: index,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            };

            self.process_capture(index, &frame, document, progress)?;
            debug_assert!(progress.records.len() as u32 <= self.target_capture_count);

            if index < self.target_capture_count && self.wait_between_captures() {
                log::info!("Session {} cancelled after capture {}", self.session_id, index);
                return Ok(SessionOutcome::Cancelled {
                    after_capture: index,
                });
            }
        }

        Ok(SessionOutcome::Completed)
    }

    fn process_capture(
        &self,
        index: u32,
        frame: &RawFrame,
        document: &mut ReportDocument,
        progress: &mut Progress,
    ) -> Result<(), ColometryError> {
        let stamp = timestamp(&frame.timestamp);

        let image_path = self.layout.image_path(&self.session_id, &stamp, index);
        let analyzed = self.analyzer.analyze(frame, index, image_path.clone())?;

        write_jpeg(frame, &image_path, self.jpeg_quality)?;
        progress.image_paths.push(image_path.clone());
        log::info!("Image captured: {:?}", image_path);

        let histogram_path = self.layout.histogram_path(&self.session_id, &stamp, index);
        self.renderer.render_to_file(
            &analyzed.record.per_channel_histogram,
            index,
            &histogram_path,
        )?;
        progress.histogram_paths.push(histogram_path.clone());

        document.append_page(
            &analyzed.record,
            &analyzed.record.image_reference,
            &histogram_path,
        )?;
        log::info!(
            "Capture {}/{}: {}",
            index,
            self.target_capture_count,
            analyzed.record.rgb_summary()
        );
        progress.records.push(analyzed.record);
        Ok(())
    }

    /// Sleep for the inter-capture delay; `true` if cancelled meanwhile.
    fn wait_between_captures(&self) -> bool {
        let deadline = Instant::now() + self.inter_capture_delay;
        loop {
            if self.cancel.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep((deadline - now).min(WAIT_SLICE));
        }
    }

    /// Save the report. The image and histogram artifacts are kept.
    fn finalize(&self, document: &mut ReportDocument) -> Result<PathBuf, ColometryError> {
        document.save()
    }

    fn transition(&mut self, next: SessionState) {
        log::debug!("Session {}: {:?} -> {:?}", self.session_id, self.state, next);
        self.state = next;
        self.transitions.push(next);
    }

    fn manifest(
        &self,
        progress: Progress,
        document_path: Option<PathBuf>,
        page_count: usize,
        outcome: SessionOutcome,
    ) -> SessionManifest {
        SessionManifest {
            session_id: self.session_id.clone(),
            output_root: self.layout.root().to_path_buf(),
            document_path,
            page_count,
            target_capture_count: self.target_capture_count,
            completed_captures: progress.records.len() as u32,
            image_paths: progress.image_paths,
            histogram_paths: progress.histogram_paths,
            capture_records: progress.records,
            outcome,
        }
    }

    fn failure(
        &self,
        error: ColometryError,
        progress: Progress,
        document_path: Option<PathBuf>,
        page_count: usize,
    ) -> SessionFailure {
        let outcome = SessionOutcome::Aborted {
            reason: error.to_string(),
        };
        SessionFailure {
            manifest: self.manifest(progress, document_path, page_count, outcome),
            error,
        }
    }
}

fn write_jpeg(frame: &RawFrame, path: &Path, quality: u8) -> Result<(), ColometryError> {
    let mut writer = BufWriter::new(File::create(path)?);
    frame
        .image
        .write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))?;
    writer.flush()?;
    Ok(())
}
