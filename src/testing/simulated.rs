//! Simulated hardware with failure injection.

use super::synthetic_data::synthetic_frame;
use crate::errors::ColometryError;
use crate::hardware::{CameraDevice, HardwareProvider, HardwareResources, Illumination};
use crate::types::{IlluminationColor, RawFrame};
use image::RgbImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Hook invoked after every successful simulated capture with its 1-based number.
pub type CaptureHook = Arc<dyn Fn(u32) + Send + Sync>;

/// Shared call counters, readable after the hardware has been consumed.
#[derive(Debug, Clone, Default)]
pub struct HardwareCounters {
    acquisitions: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
    captures: Arc<AtomicUsize>,
    illumination: Arc<Mutex<Vec<IlluminationColor>>>,
}

impl HardwareCounters {
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Camera release calls that reached the device.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Capture attempts, failed ones included.
    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    /// Every color requested, rejected requests included.
    pub fn illumination_history(&self) -> Vec<IlluminationColor> {
        self.illumination
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    pub fn last_illumination(&self) -> Option<IlluminationColor> {
        self.illumination_history().last().copied()
    }
}

/// Provider producing synthetic frames of a fixed size.
#[derive(Clone)]
pub struct SimulatedHardware {
    width: u32,
    height: u32,
    fail_acquire: bool,
    fail_capture_at: Option<u32>,
    degenerate_at: Option<u32>,
    fail_release: bool,
    with_illumination: bool,
    fail_illumination: bool,
    after_capture: Option<CaptureHook>,
    counters: HardwareCounters,
}

impl SimulatedHardware {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fail_acquire: false,
            fail_capture_at: None,
            degenerate_at: None,
            fail_release: false,
            with_illumination: false,
            fail_illumination: false,
            after_capture: None,
            counters: HardwareCounters::default(),
        }
    }

    /// `acquire` fails with `ResourceUnavailable`.
    pub fn fail_acquire(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    /// The `n`-th capture (1-based) fails with `CaptureFailure`.
    pub fn fail_capture_at(mut self, n: u32) -> Self {
        self.fail_capture_at = Some(n);
        self
    }

    /// The `n`-th capture returns a zero-sized frame.
    pub fn degenerate_frame_at(mut self, n: u32) -> Self {
        self.degenerate_at = Some(n);
        self
    }

    /// Camera release reports an error.
    pub fn fail_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    pub fn with_illumination(mut self) -> Self {
        self.with_illumination = true;
        self
    }

    /// Attach a light that records every request and then rejects it.
    pub fn fail_illumination(mut self) -> Self {
        self.with_illumination = true;
        self.fail_illumination = true;
        self
    }

    pub fn on_capture(mut self, hook: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.after_capture = Some(Arc::new(hook));
        self
    }

    pub fn counters(&self) -> HardwareCounters {
        self.counters.clone()
    }
}

impl HardwareProvider for SimulatedHardware {
    fn acquire(&mut self) -> Result<HardwareResources, ColometryError> {
        if self.fail_acquire {
            return Err(ColometryError::ResourceUnavailable(
                "simulated camera could not be opened".to_string(),
            ));
        }
        self.counters.acquisitions.fetch_add(1, Ordering::SeqCst);

        let camera = SimulatedCamera {
            hardware: self.clone(),
            captured: 0,
        };
        let illumination: Option<Box<dyn Illumination>> = if self.with_illumination {
            Some(Box::new(SimulatedLight {
                history: self.counters.illumination.clone(),
                fail: self.fail_illumination,
            }))
        } else {
            None
        };

        Ok(HardwareResources::new(Box::new(camera), illumination))
    }
}

struct SimulatedCamera {
    hardware: SimulatedHardware,
    captured: u32,
}

impl CameraDevice for SimulatedCamera {
    fn device_id(&self) -> &str {
        "simulated"
    }

    fn capture_frame(&mut self) -> Result<RawFrame, ColometryError> {
        self.captured += 1;
        let n = self.captured;
        self.hardware.counters.captures.fetch_add(1, Ordering::SeqCst);

        if self.hardware.fail_capture_at == Some(n) {
            return Err(ColometryError::CaptureFailure(format!(
                "simulated camera returned no frame for capture {}",
                n
            )));
        }

        let frame = if self.hardware.degenerate_at == Some(n) {
            RawFrame::new(RgbImage::new(0, 0), "simulated")
        } else {
            let mut frame = synthetic_frame(n, self.hardware.width, self.hardware.height);
            frame.device_id = "simulated".to_string();
            frame
        };

        if let Some(hook) = &self.hardware.after_capture {
            hook(n);
        }
        Ok(frame)
    }

    fn release(&mut self) -> Result<(), ColometryError> {
        self.hardware.counters.releases.fetch_add(1, Ordering::SeqCst);
        if self.hardware.fail_release {
            return Err(ColometryError::CleanupFailure(
                "simulated camera refused to close".to_string(),
            ));
        }
        Ok(())
    }
}

struct SimulatedLight {
    history: Arc<Mutex<Vec<IlluminationColor>>>,
    fail: bool,
}

impl Illumination for SimulatedLight {
    fn set_color(&mut self, color: IlluminationColor) -> Result<(), ColometryError> {
        if let Ok(mut history) = self.history.lock() {
            history.push(color);
        }
        if self.fail {
            return Err(ColometryError::ResourceUnavailable(format!(
                "simulated light rejected {:?}",
                color
            )));
        }
        Ok(())
    }
}
