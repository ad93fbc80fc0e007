//! Digital output driving the physical actuator
//!
//! The provider needs exactly one capability from the hardware: set the
//! output high or low. The level is never read back.

pub mod sysfs;

pub use sysfs::SysfsOutputPin;

use thiserror::Error;
use tracing::info;

/// Output driver errors
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("GPIO {pin} I/O error on {path}: {source}")]
    Io {
        pin: u32,
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Output rejected level change: {0}")]
    Rejected(String),
}

/// A single digital output line
pub trait OutputPin: Send {
    /// Drive the output to the given level (`true` = high)
    fn set_level(&mut self, high: bool) -> Result<(), OutputError>;
}

impl<T: OutputPin + ?Sized> OutputPin for Box<T> {
    fn set_level(&mut self, high: bool) -> Result<(), OutputError> {
        (**self).set_level(high)
    }
}

/// Output that only logs level changes, for hosts without GPIO
#[derive(Debug, Default)]
pub struct LogOutputPin {
    pin: u32,
}

impl LogOutputPin {
    pub fn new(pin: u32) -> Self {
        Self { pin }
    }
}

impl OutputPin for LogOutputPin {
    fn set_level(&mut self, high: bool) -> Result<(), OutputError> {
        info!(pin = self.pin, level = u8::from(high), "Output level set");
        Ok(())
    }
}
