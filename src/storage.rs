//! Artifact directory layout
//!
//! Every run writes into a fixed tree under the output root:
//! `captures_image/*.jpg`, `histogram/*.png` and `pdf/*.pdf`. Per-capture
//! names carry the session id and the capture index, and session ids are
//! unique within an output root, so no run overwrites another's artifacts.

use crate::errors::ColometryError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// `YYYYMMDD_HHMMSS` stamp used in artifact names.
pub fn timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Histogram,
    Pdf,
}

impl ArtifactKind {
    pub fn directory(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "captures_image",
            ArtifactKind::Histogram => "histogram",
            ArtifactKind::Pdf => "pdf",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "jpg",
            ArtifactKind::Histogram => "png",
            ArtifactKind::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "image/jpeg",
            ArtifactKind::Histogram => "image/png",
            ArtifactKind::Pdf => "application/pdf",
        }
    }

    pub fn all() -> [ArtifactKind; 3] {
        [ArtifactKind::Image, ArtifactKind::Histogram, ArtifactKind::Pdf]
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = ColometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" | "jpg" | "jpeg" => Ok(ArtifactKind::Image),
            "histogram" | "png" => Ok(ArtifactKind::Histogram),
            "pdf" | "report" => Ok(ArtifactKind::Pdf),
            other => Err(ColometryError::InvalidArgument(format!(
                "unknown artifact kind: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.directory())
    }

    /// Create the artifact directories.
    pub fn ensure(&self) -> Result<(), ColometryError> {
        for kind in ArtifactKind::all() {
            fs::create_dir_all(self.dir(kind))?;
        }
        Ok(())
    }

    /// First of `stamp`, `stamp_2`, `stamp_3`, ... not used by an earlier
    /// session under this root.
    pub fn unique_session_id(&self, stamp: &str) -> String {
        std::iter::once(stamp.to_string())
            .chain((2u32..).map(|n| format!("{}_{}", stamp, n)))
            .find(|candidate| !self.session_exists(candidate))
            .unwrap_or_else(|| stamp.to_string())
    }

    /// Whether any artifact of `session_id` is already on disk.
    pub fn session_exists(&self, session_id: &str) -> bool {
        if self.report_path(session_id).exists() {
            return true;
        }
        let prefixes = [
            (ArtifactKind::Image, format!("captured_image_{}_", session_id)),
            (ArtifactKind::Histogram, format!("histogram_{}_", session_id)),
        ];
        prefixes.iter().any(|(kind, prefix)| {
            fs::read_dir(self.dir(*kind))
                .map(|entries| {
                    entries
                        .filter_map(|entry| entry.ok())
                        .any(|entry| entry.file_name().to_string_lossy().starts_with(prefix.as_str()))
                })
                .unwrap_or(false)
        })
    }

    pub fn image_path(&self, session_id: &str, stamp: &str, capture_index: u32) -> PathBuf {
        self.dir(ArtifactKind::Image).join(format!(
            "captured_image_{}_{}_{:02}.jpg",
            session_id, stamp, capture_index
        ))
    }

    pub fn histogram_path(&self, session_id: &str, stamp: &str, capture_index: u32) -> PathBuf {
        self.dir(ArtifactKind::Histogram).join(format!(
            "histogram_{}_{}_{:02}.png",
            session_id, stamp, capture_index
        ))
    }

    pub fn report_path(&self, session_id: &str) -> PathBuf {
        self.dir(ArtifactKind::Pdf)
            .join(format!("output_{}.pdf", session_id))
    }

    /// Most recently modified artifact of `kind`, if any.
    pub fn latest(&self, kind: ArtifactKind) -> Result<Option<PathBuf>, ColometryError> {
        let dir = self.dir(kind);
        if !dir.exists() {
            return Ok(None);
        }

        let mut latest: Option<(SystemTime, PathBuf)> = None;
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let matches_extension = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(kind.extension()));
            if !matches_extension || !entry.file_type()?.is_file() {
                continue;
            }

            let modified = entry.metadata()?.modified()?;
            let newer = match &latest {
                Some((time, _)) => modified >= *time,
                None => true,
            };
            if newer {
                latest = Some((modified, path));
            }
        }

        Ok(latest.map(|(_, path)| path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_timestamp_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(timestamp(&at), "20240309_070501");
    }

    #[test]
    fn test_paths_follow_layout() {
        let layout = ArtifactLayout::new("history");
        assert_eq!(
            layout.image_path("20240309_070501", "20240309_070503", 3),
            PathBuf::from(
                "history/captures_image/captured_image_20240309_070501_20240309_070503_03.jpg"
            )
        );
        assert_eq!(
            layout.histogram_path("20240309_070501_2", "20240309_070509", 12),
            PathBuf::from("history/histogram/histogram_20240309_070501_2_20240309_070509_12.png")
        );
        assert_eq!(
            layout.report_path("20240309_070501"),
            PathBuf::from("history/pdf/output_20240309_070501.pdf")
        );
    }

    #[test]
    fn test_session_id_skips_used_stamps() {
        let root = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(root.path());
        assert_eq!(layout.unique_session_id("20240309_070501"), "20240309_070501");

        layout.ensure().unwrap();
        fs::write(layout.report_path("20240309_070501"), b"%PDF").unwrap();
        assert_eq!(layout.unique_session_id("20240309_070501"), "20240309_070501_2");

        // A session that never saved its report still claims its id
        fs::write(
            layout.image_path("20240309_070501_2", "20240309_070501", 1),
            b"jpeg",
        )
        .unwrap();
        assert_eq!(layout.unique_session_id("20240309_070501"), "20240309_070501_3");
    }

    #[test]
    fn test_latest_picks_newest_matching_extension() {
        let root = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(root.path());
        assert_eq!(layout.latest(ArtifactKind::Pdf).unwrap(), None);

        layout.ensure().unwrap();
        let dir = layout.dir(ArtifactKind::Pdf);
        fs::write(dir.join("output_a.pdf"), b"a").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        fs::write(dir.join("output_b.pdf"), b"b").unwrap();
        fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let latest = layout.latest(ArtifactKind::Pdf).unwrap().unwrap();
        assert!(latest.ends_with("output_b.pdf"));
    }

    #[test]
    fn test_artifact_kind_parsing() {
        assert_eq!("pdf".parse::<ArtifactKind>().unwrap(), ArtifactKind::Pdf);
        assert_eq!("IMAGE".parse::<ArtifactKind>().unwrap(), ArtifactKind::Image);
        assert!("video".parse::<ArtifactKind>().is_err());
        assert_eq!(ArtifactKind::Histogram.content_type(), "image/png");
    }
}
