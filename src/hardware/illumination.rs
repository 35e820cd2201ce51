use super::Illumination;
use crate::errors::ColometryError;
use crate::types::IlluminationColor;
use std::fs;
use std::path::{Path, PathBuf};

/// Where the Linux LED class exposes its devices.
pub const SYSFS_LEDS_ROOT: &str = "/sys/class/leds";

/// LED driven through the Linux LED class interface.
///
/// Multicolor devices (those exposing `multi_intensity`) get the full RGB
/// color; single-color devices get the color's peak channel as brightness.
#[derive(Debug, Clone)]
pub struct SysfsLed {
    dir: PathBuf,
    multicolor: bool,
    max_brightness: u64,
}

impl SysfsLed {
    pub fn open(name: &str) -> Result<Self, ColometryError> {
        Self::open_at(Path::new(SYSFS_LEDS_ROOT), name)
    }

    /// Open `name` under an alternative LED class root.
    pub fn open_at(root: &Path, name: &str) -> Result<Self, ColometryError> {
        let dir = root.join(name);
        if !dir.join("brightness").exists() {
            return Err(ColometryError::ResourceUnavailable(format!(
                "LED {:?} not found",
                dir
            )));
        }

        let max_brightness = fs::read_to_string(dir.join("max_brightness"))
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(255);
        let multicolor = dir.join("multi_intensity").exists();

        log::info!(
            "Opened LED {:?} (multicolor: {}, max brightness: {})",
            dir,
            multicolor,
            max_brightness
        );
        Ok(Self {
            dir,
            multicolor,
            max_brightness,
        })
    }

    pub fn is_multicolor(&self) -> bool {
        self.multicolor
    }

    fn write_attribute(&self, attribute: &str, value: &str) -> Result<(), ColometryError> {
        fs::write(self.dir.join(attribute), value)?;
        Ok(())
    }
}

impl Illumination for SysfsLed {
    fn set_color(&mut self, color: IlluminationColor) -> Result<(), ColometryError> {
        let brightness = if self.multicolor {
            self.write_attribute(
                "multi_intensity",
                &format!("{} {} {}", color.r, color.g, color.b),
            )?;
            if color.is_off() {
                0
            } else {
                self.max_brightness
            }
        } else {
            let peak = color.r.max(color.g).max(color.b) as u64;
            peak * self.max_brightness / 255
        };

        self.write_attribute("brightness", &brightness.to_string())?;
        log::debug!("LED {:?} set to {:?} (brightness {})", self.dir, color, brightness);
        Ok(())
    }
}
