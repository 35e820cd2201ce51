//! Frame analysis
//!
//! Crops the fixed centered region of interest out of a raw frame and
//! computes per-channel intensity histograms and truncated means.

use crate::errors::ColometryError;
use crate::types::{CaptureRecord, RawFrame, RegionOfInterest, HISTOGRAM_BINS};
use image::{imageops, RgbImage};
use std::path::PathBuf;

/// Output of a single analysis: the immutable record plus the cropped pixels.
#[derive(Debug, Clone)]
pub struct AnalyzedFrame {
    pub record: CaptureRecord,
    pub roi_image: RgbImage,
}

/// Per-channel histograms in R, G, B order.
pub type ChannelHistograms = [Vec<u32>; 3];

/// Stateless analyzer; the ROI policy is fixed and not configurable per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameAnalyzer;

impl FrameAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze `frame` as capture number `capture_index`.
    ///
    /// Fails with `AnalysisFailure` only when the ROI has zero area.
    pub fn analyze(
        &self,
        frame: &RawFrame,
        capture_index: u32,
        image_reference: PathBuf,
    ) -> Result<AnalyzedFrame, ColometryError> {
        let roi = RegionOfInterest::centered(frame.width(), frame.height());
        if roi.is_degenerate() {
            return Err(ColometryError::AnalysisFailure(format!(
                "degenerate region of interest {}x{} for {}x{} frame",
                roi.width,
                roi.height,
                frame.width(),
                frame.height()
            )));
        }

        let roi_image = crop(&frame.image, &roi);
        let per_channel_histogram = channel_histograms(&roi_image);
        let per_channel_mean = channel_means(&per_channel_histogram, roi.area());

        log::debug!(
            "Capture {}: ROI {}x{} at ({}, {}), means R={} G={} B={}",
            capture_index,
            roi.width,
            roi.height,
            roi.x,
            roi.y,
            per_channel_mean[0],
            per_channel_mean[1],
            per_channel_mean[2]
        );

        Ok(AnalyzedFrame {
            record: CaptureRecord {
                capture_index,
                timestamp: frame.timestamp,
                image_reference,
                region_of_interest: roi,
                per_channel_histogram,
                per_channel_mean,
            },
            roi_image,
        })
    }
}

/// Copy the ROI out of `image`.
pub fn crop(image: &RgbImage, roi: &RegionOfInterest) -> RgbImage {
    imageops::crop_imm(image, roi.x, roi.y, roi.width, roi.height).to_image()
}

/// 256-bin histogram of each channel.
pub fn channel_histograms(image: &RgbImage) -> ChannelHistograms {
    let mut histograms = [
        vec![0u32; HISTOGRAM_BINS],
        vec![0u32; HISTOGRAM_BINS],
        vec![0u32; HISTOGRAM_BINS],
    ];

    for pixel in image.pixels() {
        for (channel, histogram) in histograms.iter_mut().enumerate() {
            histogram[pixel[channel] as usize] += 1;
        }
    }

    histograms
}

/// Integer-truncated mean intensity per channel, derived from the histograms.
pub fn channel_means(histograms: &ChannelHistograms, pixel_count: u64) -> [u8; 3] {
    let mut means = [0u8; 3];
    if pixel_count == 0 {
        return means;
    }

    for (mean, histogram) in means.iter_mut().zip(histograms.iter()) {
        let weighted: u64 = histogram
            .iter()
            .enumerate()
            .map(|(intensity, &count)| intensity as u64 * count as u64)
            .sum();
        // Bounded by 255 since every bin index is.
        *mean = (weighted / pixel_count) as u8;
    }

    means
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn uniform_frame(width: u32, height: u32, color: [u8; 3]) -> RawFrame {
        RawFrame::new(RgbImage::from_pixel(width, height, Rgb(color)), "test")
    }

    #[test]
    fn test_uniform_frame_statistics() {
        let frame = uniform_frame(320, 240, [200, 100, 50]);
        let analyzed = FrameAnalyzer::new()
            .analyze(&frame, 1, PathBuf::from("frame.jpg"))
            .unwrap();

        let record = &analyzed.record;
        assert_eq!(record.per_channel_mean, [200, 100, 50]);
        assert_eq!(record.per_channel_histogram[0][200], 160 * 240);
        assert_eq!(record.per_channel_histogram[1][100], 160 * 240);
        assert_eq!(record.per_channel_histogram[2][50], 160 * 240);
        assert_eq!(analyzed.roi_image.dimensions(), (160, 240));
    }

    #[test]
    fn test_histogram_sums_equal_roi_area() {
        let frame = crate::testing::synthetic_frame(3, 1920, 1080);
        let analyzed = FrameAnalyzer::new()
            .analyze(&frame, 3, PathBuf::from("frame.jpg"))
            .unwrap();

        let area = analyzed.record.region_of_interest.area();
        for histogram in &analyzed.record.per_channel_histogram {
            assert_eq!(histogram.len(), HISTOGRAM_BINS);
            assert_eq!(histogram.iter().map(|&c| c as u64).sum::<u64>(), area);
        }
    }

    #[test]
    fn test_mean_truncates() {
        // Two pixels: 0 and 255 -> 127.5 truncates to 127.
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([0, 0, 0]));
        image.put_pixel(1, 0, Rgb([255, 255, 255]));
        let histograms = channel_histograms(&image);
        assert_eq!(channel_means(&histograms, 2), [127, 127, 127]);
    }

    #[test]
    fn test_crop_reads_centered_pixels() {
        let mut image = RgbImage::from_pixel(400, 400, Rgb([0, 0, 0]));
        // Mark the first ROI pixel: x = (400-160)/2, y = (400-360)/2.
        image.put_pixel(120, 20, Rgb([9, 9, 9]));
        let roi = RegionOfInterest::centered(400, 400);
        let cropped = crop(&image, &roi);
        assert_eq!(cropped.get_pixel(0, 0), &Rgb([9, 9, 9]));
    }

    #[test]
    fn test_degenerate_frame_is_analysis_failure() {
        let frame = RawFrame::new(RgbImage::new(0, 0), "test");
        let result = FrameAnalyzer::new().analyze(&frame, 1, PathBuf::from("x.jpg"));
        assert!(matches!(result, Err(ColometryError::AnalysisFailure(_))));
    }
}
