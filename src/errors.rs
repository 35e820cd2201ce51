use thiserror::Error;

/// Every failure the colometry pipeline can report.
///
/// The first five variants form the pipeline taxonomy: how the session
/// orchestrator reacts to each is fixed (see `session::orchestrator`). The
/// remaining variants cover configuration and I/O plumbing.
#[derive(Debug, Error)]
pub enum ColometryError {
    /// Camera or illumination could not be opened or configured. Fatal, pre-loop.
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// A single frame capture returned nothing. Ends the capture loop early.
    #[error("Capture error: {0}")]
    CaptureFailure(String),

    /// The region of interest collapsed to zero area.
    #[error("Analysis error: {0}")]
    AnalysisFailure(String),

    /// A page was appended to (or a save attempted on) an already saved report.
    #[error("Report document already finalized: {0}")]
    DocumentFinalized(String),

    /// Temporary artifact deletion or hardware release failed. Only ever logged.
    #[error("Cleanup error: {0}")]
    CleanupFailure(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF error: {0}")]
    Pdf(String),
}

impl ColometryError {
    /// Errors that end the capture loop without failing the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ColometryError::CaptureFailure(_))
    }
}

impl From<lopdf::Error> for ColometryError {
    fn from(error: lopdf::Error) -> Self {
        ColometryError::Pdf(error.to_string())
    }
}

impl From<toml::de::Error> for ColometryError {
    fn from(error: toml::de::Error) -> Self {
        ColometryError::Config(format!("Failed to parse config file: {}", error))
    }
}

impl From<toml::ser::Error> for ColometryError {
    fn from(error: toml::ser::Error) -> Self {
        ColometryError::Config(format!("Failed to serialize config: {}", error))
    }
}
