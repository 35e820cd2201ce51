//! Hardware resource handle
//!
//! The camera and the optional illumination source sit behind the
//! `CameraDevice` and `Illumination` traits so the session orchestrator never
//! touches a process-wide device directly. A `HardwareProvider` hands out a
//! `HardwareResources` value that owns both devices from acquisition until it
//! is released or dropped.

#[cfg(feature = "camera")]
pub mod camera;
pub mod illumination;

#[cfg(feature = "camera")]
pub use camera::NokhwaCamera;
pub use illumination::SysfsLed;

use crate::config::ColometryConfig;
use crate::errors::ColometryError;
use crate::types::{IlluminationColor, RawFrame};

/// A frame source.
pub trait CameraDevice {
    fn device_id(&self) -> &str;

    /// Block until one frame is available.
    fn capture_frame(&mut self) -> Result<RawFrame, ColometryError>;

    /// Stop streaming and free the device. Called at most once.
    fn release(&mut self) -> Result<(), ColometryError>;
}

/// An illumination source for the sample.
pub trait Illumination {
    fn set_color(&mut self, color: IlluminationColor) -> Result<(), ColometryError>;

    /// Switch the source off. Called at most once.
    fn release(&mut self) -> Result<(), ColometryError> {
        self.set_color(IlluminationColor::OFF)
    }
}

/// Opens the hardware for one session.
pub trait HardwareProvider {
    /// Fails with `ResourceUnavailable` when the camera cannot be opened.
    fn acquire(&mut self) -> Result<HardwareResources, ColometryError>;
}

/// Exclusive ownership of the session's devices.
///
/// Released exactly once: either explicitly through `release` or, on any
/// other exit path, when the value is dropped.
pub struct HardwareResources {
    camera: Box<dyn CameraDevice>,
    illumination: Option<Box<dyn Illumination>>,
    released: bool,
}

impl HardwareResources {
    pub fn new(camera: Box<dyn CameraDevice>, illumination: Option<Box<dyn Illumination>>) -> Self {
        Self {
            camera,
            illumination,
            released: false,
        }
    }

    pub fn device_id(&self) -> &str {
        self.camera.device_id()
    }

    pub fn has_illumination(&self) -> bool {
        self.illumination.is_some()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn capture_frame(&mut self) -> Result<RawFrame, ColometryError> {
        if self.released {
            return Err(ColometryError::CaptureFailure(
                "camera already released".to_string(),
            ));
        }
        self.camera.capture_frame()
    }

    /// Best-effort: a missing or failing light source only logs.
    pub fn set_illumination(&mut self, color: IlluminationColor) {
        if self.released {
            log::warn!("Ignoring illumination change after release");
            return;
        }
        match self.illumination.as_mut() {
            Some(light) => {
                if let Err(e) = light.set_color(color) {
                    log::warn!("Failed to set illumination to {:?}: {}", color, e);
                }
            }
            None => log::debug!("No illumination source; skipping {:?}", color),
        }
    }

    /// Idempotent and infallible. Failures are logged as cleanup warnings.
    pub fn release(&mut self) {
        if self.released {
            log::debug!("Hardware for {} already released", self.camera.device_id());
            return;
        }
        self.released = true;

        if let Some(light) = self.illumination.as_mut() {
            if let Err(e) = light.release() {
                let err = ColometryError::CleanupFailure(format!("illumination release: {}", e));
                log::warn!("{}", err);
            }
        }

        if let Err(e) = self.camera.release() {
            let err = ColometryError::CleanupFailure(format!(
                "camera {} release: {}",
                self.camera.device_id(),
                e
            ));
            log::warn!("{}", err);
        } else {
            log::info!("Camera {} released", self.camera.device_id());
        }
    }
}

impl Drop for HardwareResources {
    fn drop(&mut self) {
        self.release();
    }
}

/// Provider that opens the devices named in the configuration.
#[derive(Debug, Clone)]
pub struct ConfiguredHardware {
    #[cfg_attr(not(feature = "camera"), allow(dead_code))]
    config: ColometryConfig,
}

impl ConfiguredHardware {
    pub fn new(config: ColometryConfig) -> Self {
        Self { config }
    }

    #[cfg(feature = "camera")]
    fn open_illumination(&self) -> Option<Box<dyn Illumination>> {
        if !self.config.illumination.enabled {
            return None;
        }
        let name = self.config.illumination.led_name.as_deref()?;
        match SysfsLed::open(name) {
            Ok(led) => Some(Box::new(led)),
            Err(e) => {
                // Illumination is a capability; the session proceeds without it.
                log::warn!("Illumination unavailable, continuing without it: {}", e);
                None
            }
        }
    }
}

impl HardwareProvider for ConfiguredHardware {
    #[cfg(feature = "camera")]
    fn acquire(&mut self) -> Result<HardwareResources, ColometryError> {
        let camera = NokhwaCamera::open(&self.config.camera)?;
        let illumination = self.open_illumination();
        Ok(HardwareResources::new(Box::new(camera), illumination))
    }

    #[cfg(not(feature = "camera"))]
    fn acquire(&mut self) -> Result<HardwareResources, ColometryError> {
        Err(ColometryError::ResourceUnavailable(
            "colometry was built without the `camera` feature".to_string(),
        ))
    }
}
