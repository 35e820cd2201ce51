use chrono::{DateTime, Local};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Maximum ROI width in pixels
pub const ROI_MAX_WIDTH: u32 = 160;
/// Maximum ROI height in pixels
pub const ROI_MAX_HEIGHT: u32 = 360;
/// Bins per channel histogram (one per 8-bit intensity)
pub const HISTOGRAM_BINS: usize = 256;

/// Channel order used throughout: red, green, blue.
pub const CHANNEL_NAMES: [&str; 3] = ["R", "G", "B"];

/// A frame as returned by the camera, decoded to packed RGB8.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub image: RgbImage,
    pub timestamp: DateTime<Local>,
    pub device_id: String,
}

impl RawFrame {
    pub fn new(image: RgbImage, device_id: impl Into<String>) -> Self {
        Self {
            image,
            timestamp: Local::now(),
            device_id: device_id.into(),
        }
    }

    /// Build a frame from packed RGB8 bytes; `None` if the buffer length does
    /// not match the dimensions.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32, device_id: impl Into<String>) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(|image| Self::new(image, device_id))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Crop rectangle analyzed for color statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RegionOfInterest {
    /// The fixed centered ROI for a frame of the given size.
    pub fn centered(frame_width: u32, frame_height: u32) -> Self {
        let width = frame_width.min(ROI_MAX_WIDTH);
        let height = frame_height.min(ROI_MAX_HEIGHT);
        Self {
            x: (frame_width - width) / 2,
            y: (frame_height - height) / 2,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// RGB color used to drive the illumination source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IlluminationColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl IlluminationColor {
    pub const OFF: Self = Self { r: 0, g: 0, b: 0 };
    pub const WHITE: Self = Self { r: 255, g: 255, b: 255 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn is_off(&self) -> bool {
        *self == Self::OFF
    }
}

impl From<[u8; 3]> for IlluminationColor {
    fn from(rgb: [u8; 3]) -> Self {
        Self::new(rgb[0], rgb[1], rgb[2])
    }
}

/// One measurement: the statistics of a single capture's ROI.
///
/// Created once by the analyzer and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    /// 1-based position within the session
    pub capture_index: u32,
    pub timestamp: DateTime<Local>,
    /// Stored full frame
    pub image_reference: PathBuf,
    pub region_of_interest: RegionOfInterest,
    /// Histograms in R, G, B order; each has `HISTOGRAM_BINS` bins
    pub per_channel_histogram: [Vec<u32>; 3],
    /// Truncated means in R, G, B order
    pub per_channel_mean: [u8; 3],
}

impl CaptureRecord {
    pub fn mean_red(&self) -> u8 {
        self.per_channel_mean[0]
    }

    pub fn mean_green(&self) -> u8 {
        self.per_channel_mean[1]
    }

    pub fn mean_blue(&self) -> u8 {
        self.per_channel_mean[2]
    }

    /// Text line rendered under each report page header.
    pub fn rgb_summary(&self) -> String {
        format!(
            "R: {}, G: {}, B: {}",
            self.mean_red(),
            self.mean_green(),
            self.mean_blue()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roi_full_hd() {
        let roi = RegionOfInterest::centered(1920, 1080);
        assert_eq!(
            roi,
            RegionOfInterest {
                x: 880,
                y: 360,
                width: 160,
                height: 360
            }
        );
        assert_eq!(roi.area(), 57_600);
    }

    #[test]
    fn test_roi_smaller_than_limits() {
        let roi = RegionOfInterest::centered(100, 50);
        assert_eq!((roi.x, roi.y, roi.width, roi.height), (0, 0, 100, 50));
    }

    #[test]
    fn test_roi_odd_margin_floors() {
        let roi = RegionOfInterest::centered(163, 363);
        assert_eq!((roi.x, roi.y), (1, 1));
    }

    #[test]
    fn test_roi_degenerate() {
        assert!(RegionOfInterest::centered(0, 1080).is_degenerate());
        assert!(RegionOfInterest::centered(1920, 0).is_degenerate());
        assert!(!RegionOfInterest::centered(1, 1).is_degenerate());
    }

    #[test]
    fn test_raw_frame_rejects_short_buffer() {
        assert!(RawFrame::from_rgb(vec![0; 10], 4, 4, "cam").is_none());
        let frame = RawFrame::from_rgb(vec![0; 48], 4, 4, "cam").unwrap();
        assert_eq!((frame.width(), frame.height()), (4, 4));
    }

    #[test]
    fn test_illumination_color_from_array() {
        assert_eq!(IlluminationColor::from([255, 255, 255]), IlluminationColor::WHITE);
        assert!(IlluminationColor::OFF.is_off());
    }
}
