//! Synthetic frames for offline testing
//!
//! Deterministic RGB frames shaped like real webcam output, so the pipeline
//! can be exercised without hardware.

use crate::types::RawFrame;
use image::{Rgb, RgbImage};

/// Gradient frame whose content changes with `frame_number`.
pub fn synthetic_frame(frame_number: u32, width: u32, height: u32) -> RawFrame {
    let base = (frame_number % 256) as u8;
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            base.wrapping_add((x % 256) as u8),
            base.wrapping_add((y % 256) as u8),
            base.wrapping_add(((x + y) % 256) as u8),
        ])
    });

    RawFrame::new(image, "synthetic")
}

/// Frame of a single solid color, e.g. an evenly lit sample.
pub fn uniform_frame(color: [u8; 3], width: u32, height: u32) -> RawFrame {
    RawFrame::new(RgbImage::from_pixel(width, height, Rgb(color)), "synthetic")
}
