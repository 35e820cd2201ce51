//! Testing utilities for colometry
//!
//! Synthetic frames and a simulated camera/illumination provider with failure
//! injection, so the whole pipeline runs without hardware.

pub mod simulated;
pub mod synthetic_data;

pub use simulated::{CaptureHook, HardwareCounters, SimulatedHardware};
pub use synthetic_data::{synthetic_frame, uniform_frame};
