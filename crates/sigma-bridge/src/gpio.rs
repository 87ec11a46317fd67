//! GPIO output lines through the sysfs interface.
//!
//! The bridge only ever drives outputs (reset, self-boot select), so the
//! trait is write-only. `/sys/class/gpio` needs no extra dependencies and
//! exists on every board this daemon targets.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{BridgeError, Result};

/// An output line the pin controller can drive.
pub trait GpioLine: fmt::Debug + Send {
    /// Drive the line to the given physical level.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Gpio`] when the kernel refuses the write.
    fn set(&mut self, high: bool) -> Result<()>;
}

/// A sysfs-exported GPIO output.
#[derive(Debug)]
pub struct SysfsGpio {
    number: u32,
    value_path: PathBuf,
}

impl SysfsGpio {
    /// Export GPIO `number` (when not already exported) and configure it
    /// as an output.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Gpio`] when the sysfs interface is missing or the
    /// line is owned by another driver.
    pub fn export(number: u32) -> Result<Self> {
        let root = Path::new("/sys/class/gpio");
        let line_dir = root.join(format!("gpio{number}"));

        if !line_dir.exists() {
            fs::write(root.join("export"), number.to_string())
                .map_err(|err| BridgeError::gpio(format!("exporting GPIO {number}: {err}")))?;
        }

        fs::write(line_dir.join("direction"), "out").map_err(|err| {
            BridgeError::gpio(format!("configuring GPIO {number} as output: {err}"))
        })?;

        tracing::debug!("GPIO {number} exported as output");
        Ok(Self {
            number,
            value_path: line_dir.join("value"),
        })
    }
}

impl GpioLine for SysfsGpio {
    fn set(&mut self, high: bool) -> Result<()> {
        fs::write(&self.value_path, if high { "1" } else { "0" })
            .map_err(|err| BridgeError::gpio(format!("driving GPIO {}: {err}", self.number)))
    }
}

/// Recording line for tests: remembers every level it was driven to.
#[derive(Debug, Clone, Default)]
pub struct MockGpio {
    levels: Arc<Mutex<Vec<bool>>>,
}

impl MockGpio {
    /// Create a line with no recorded history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every level the line was driven to, oldest first.
    pub fn history(&self) -> Vec<bool> {
        self.levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current physical level, if the line was ever driven.
    pub fn level(&self) -> Option<bool> {
        self.levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
    }
}

impl GpioLine for MockGpio {
    fn set(&mut self, high: bool) -> Result<()> {
        self.levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(high);
        Ok(())
    }
}
