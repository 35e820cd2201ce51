use super::CameraDevice;
use crate::config::CameraConfig;
use crate::errors::ColometryError;
use crate::types::RawFrame;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution},
    Camera,
};
use std::time::Duration;

/// Webcam opened through nokhwa's native backend (V4L2, AVFoundation, MSMF).
pub struct NokhwaCamera {
    camera: Camera,
    device_id: String,
}

impl NokhwaCamera {
    /// Open the camera, request the configured resolution, start the stream
    /// and discard warmup frames.
    pub fn open(config: &CameraConfig) -> Result<Self, ColometryError> {
        let device_id = config.device_index.to_string();
        let [width, height] = config.resolution;

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::HighestResolution(
            Resolution::new(width, height),
        ));

        let mut camera = Camera::new(CameraIndex::Index(config.device_index), requested)
            .map_err(|e| {
                ColometryError::ResourceUnavailable(format!(
                    "Failed to open camera {}: {}",
                    device_id, e
                ))
            })?;

        camera.open_stream().map_err(|e| {
            ColometryError::ResourceUnavailable(format!(
                "Failed to start stream on camera {}: {}",
                device_id, e
            ))
        })?;

        let resolution = camera.resolution();
        log::info!(
            "Camera {} opened at {}x{} (requested {}x{})",
            device_id,
            resolution.width_x,
            resolution.height_y,
            width,
            height
        );

        // Exposure and focus need a few frames to settle after stream start.
        for i in 0..config.warmup_frames {
            match camera.frame() {
                Ok(_) => log::debug!("Warmup frame {} captured", i + 1),
                Err(e) => log::debug!(
                    "Warmup frame {} failed (normal during startup): {}",
                    i + 1,
                    e
                ),
            }
            std::thread::sleep(Duration::from_millis(30));
        }

        Ok(Self { camera, device_id })
    }
}

impl CameraDevice for NokhwaCamera {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn capture_frame(&mut self) -> Result<RawFrame, ColometryError> {
        let buffer = self.camera.frame().map_err(|e| {
            ColometryError::CaptureFailure(format!("Failed to capture frame: {}", e))
        })?;

        let decoded = buffer.decode_image::<RgbFormat>().map_err(|e| {
            ColometryError::CaptureFailure(format!("Failed to decode frame: {}", e))
        })?;

        let (width, height) = (decoded.width(), decoded.height());
        RawFrame::from_rgb(decoded.into_raw(), width, height, self.device_id.clone()).ok_or_else(
            || {
                ColometryError::CaptureFailure(format!(
                    "Decoded frame buffer does not match {}x{}",
                    width, height
                ))
            },
        )
    }

    fn release(&mut self) -> Result<(), ColometryError> {
        self.camera.stop_stream().map_err(|e| {
            ColometryError::CleanupFailure(format!("Failed to stop stream: {}", e))
        })
    }
}
