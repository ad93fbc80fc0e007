//! Linux sysfs GPIO output
//!
//! Uses the legacy `/sys/class/gpio` interface: the pin is exported if
//! needed, configured as an output starting low, and then driven by writing
//! `0`/`1` to its `value` file.

use super::{OutputError, OutputPin};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

#[derive(Debug)]
pub struct SysfsOutputPin {
    pin: u32,
    value_path: PathBuf,
}

impl SysfsOutputPin {
    /// Export the pin and configure it as an output driven low
    pub fn open(root: impl AsRef<Path>, pin: u32) -> Result<Self, OutputError> {
        let root = root.as_ref();
        let pin_dir = root.join(format!("gpio{pin}"));

        if !pin_dir.exists() {
            let export = root.join("export");
            write_sysfs(pin, &export, &pin.to_string())?;
            debug!(pin, "Exported GPIO");
        }

        // "low" sets direction and initial level in one write
        write_sysfs(pin, &pin_dir.join("direction"), "low")?;
        info!(pin, "GPIO configured as output");

        Ok(Self {
            pin,
            value_path: pin_dir.join("value"),
        })
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }
}

impl OutputPin for SysfsOutputPin {
    fn set_level(&mut self, high: bool) -> Result<(), OutputError> {
        write_sysfs(self.pin, &self.value_path, if high { "1" } else { "0" })
    }
}

fn write_sysfs(pin: u32, path: &Path, value: &str) -> Result<(), OutputError> {
    fs::write(path, value).map_err(|source| OutputError::Io {
        pin,
        path: path.display().to_string(),
        source,
    })
}
