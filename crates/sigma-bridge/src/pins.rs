//! Reset and self-boot pin sequencing.
//!
//! The controller owns chip readiness: until [`PinController::bring_up`]
//! has run the reset sequence and waited out the boot window, every bus
//! request is rejected rather than queued.

use std::fmt;
use std::thread;
use std::time::Duration;

use crate::config::PinsConfig;
use crate::error::{BridgeError, Result};
use crate::gpio::{GpioLine, SysfsGpio};
use sigma_chip::regs::timing;

/// Readiness of the chip behind the pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinState {
    /// Power-on: the boot sequence has not run yet.
    #[default]
    Uninitialized,
    /// Reset is currently asserted.
    ResetAsserted,
    /// Reset released and the boot window elapsed.
    Ready,
}

impl fmt::Display for PinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::ResetAsserted => write!(f, "reset asserted"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

// One configured output with its polarity. "Asserted" is the logical
// state; active_high maps it to a wire level.
#[derive(Debug)]
struct OutputPin {
    line: Box<dyn GpioLine>,
    active_high: bool,
}

impl OutputPin {
    fn drive(&mut self, asserted: bool) -> Result<()> {
        self.line.set(asserted == self.active_high)
    }
}

/// Sequences the reset and self-boot lines and tracks chip readiness.
///
/// Both lines are optional; a controller with no pins still gates bus
/// access on [`bring_up`](Self::bring_up) having run.
#[derive(Debug, Default)]
pub struct PinController {
    reset: Option<OutputPin>,
    self_boot: Option<OutputPin>,
    state: PinState,
}

impl PinController {
    /// A controller with no pins attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Export and attach the lines named in `config`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Gpio`] when a configured line cannot be exported.
    pub fn from_config(config: &PinsConfig) -> Result<Self> {
        let mut pins = Self::new();
        if let Some(pin) = &config.reset {
            pins = pins.with_reset(Box::new(SysfsGpio::export(pin.gpio)?), pin.active_high);
        }
        if let Some(pin) = &config.self_boot {
            pins = pins.with_self_boot(Box::new(SysfsGpio::export(pin.gpio)?), pin.active_high);
        }
        Ok(pins)
    }

    /// Attach the reset line.
    #[must_use]
    pub fn with_reset(mut self, line: Box<dyn GpioLine>, active_high: bool) -> Self {
        self.reset = Some(OutputPin { line, active_high });
        self
    }

    /// Attach the self-boot select line.
    #[must_use]
    pub fn with_self_boot(mut self, line: Box<dyn GpioLine>, active_high: bool) -> Self {
        self.self_boot = Some(OutputPin { line, active_high });
        self
    }

    /// Run the power-on sequence: engage self-boot, pulse reset, wait for
    /// the boot window.
    ///
    /// Without a reset line the chip is assumed to be out of reset already
    /// and only the boot wait applies.
    ///
    /// # Errors
    ///
    /// GPIO failures. The controller stays not-ready on error.
    pub fn bring_up(&mut self) -> Result<()> {
        if let Some(pin) = &mut self.self_boot {
            pin.drive(true)?;
        }

        if let Some(pin) = &mut self.reset {
            self.state = PinState::ResetAsserted;
            pin.drive(true)?;
            thread::sleep(Duration::from_millis(timing::RESET_HOLD_MS));
            pin.drive(false)?;
        }

        thread::sleep(Duration::from_millis(timing::BOOT_SETTLE_MS));
        self.state = PinState::Ready;
        tracing::info!("DSP out of reset and ready");
        Ok(())
    }

    /// Pulse the reset line and wait out the boot window again.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Gpio`] when no reset line is configured or driving
    /// it fails. A failed sequence leaves the controller not-ready.
    pub fn hard_reset(&mut self) -> Result<()> {
        let pin = self
            .reset
            .as_mut()
            .ok_or_else(|| BridgeError::gpio("no reset line configured"))?;

        self.state = PinState::ResetAsserted;
        pin.drive(true)?;
        thread::sleep(Duration::from_millis(timing::RESET_HOLD_MS));
        pin.drive(false)?;
        thread::sleep(Duration::from_millis(timing::BOOT_SETTLE_MS));
        self.state = PinState::Ready;
        tracing::info!("Hard reset complete");
        Ok(())
    }

    /// Whether a reset line is configured.
    pub fn has_reset_pin(&self) -> bool {
        self.reset.is_some()
    }

    /// Drive the self-boot select line.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Gpio`] when no self-boot line is configured.
    pub fn set_self_boot(&mut self, engaged: bool) -> Result<()> {
        let pin = self
            .self_boot
            .as_mut()
            .ok_or_else(|| BridgeError::gpio("no self-boot line configured"))?;
        pin.drive(engaged)?;
        tracing::info!(
            "Self-boot {}",
            if engaged { "engaged" } else { "released" }
        );
        Ok(())
    }

    /// Current readiness state.
    pub fn state(&self) -> PinState {
        self.state
    }

    /// Reject with [`BridgeError::NotReady`] unless the chip is ready.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotReady`] carrying the current state.
    pub fn ensure_ready(&self) -> Result<()> {
        if self.state == PinState::Ready {
            Ok(())
        } else {
            Err(BridgeError::not_ready(self.state.to_string()))
        }
    }
}
