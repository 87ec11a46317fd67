//! The open DSP: one transport, one pin controller, chip-level operations.

use crate::error::Result;
use crate::pins::{PinController, PinState};
use crate::safeload::{self, SafeloadTransaction};
use crate::transport::{BusKind, BusTransport};
use sigma_chip::regs::{soft_reset, SOFT_RESET};

/// An open DSP device.
///
/// Owns the single transport to the chip. All multi-client serialization
/// happens above this type (see [`crate::worker`]); `SigmaDsp` itself is
/// strictly single-threaded.
#[derive(Debug)]
pub struct SigmaDsp {
    transport: Box<dyn BusTransport>,
    pins: PinController,
}

impl SigmaDsp {
    /// Combine a transport and pin controller into a device.
    ///
    /// The device rejects all traffic until [`bring_up`](Self::bring_up)
    /// has run.
    pub fn new(transport: Box<dyn BusTransport>, pins: PinController) -> Self {
        Self { transport, pins }
    }

    /// Run the power-on pin sequence.
    ///
    /// # Errors
    ///
    /// GPIO failures; the device stays not-ready.
    pub fn bring_up(&mut self) -> Result<()> {
        tracing::info!("Bringing up DSP on the {} bus", self.transport.kind());
        self.pins.bring_up()
    }

    /// Read `length` bytes of register content starting at `address`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotReady`](crate::BridgeError::NotReady) while the
    /// chip is in reset or not yet booted; bus and length errors otherwise.
    pub fn read_registers(&mut self, address: u16, length: usize) -> Result<Vec<u8>> {
        self.pins.ensure_ready()?;
        self.transport.read(address, length)
    }

    /// Write raw register content starting at `address`.
    ///
    /// # Errors
    ///
    /// Same contract as [`read_registers`](Self::read_registers).
    pub fn write_registers(&mut self, address: u16, data: &[u8]) -> Result<()> {
        self.pins.ensure_ready()?;
        self.transport.write(address, data)
    }

    /// Commit a safeload transaction.
    ///
    /// # Errors
    ///
    /// Readiness and bus errors; see [`safeload::commit`].
    pub fn safeload(&mut self, transaction: SafeloadTransaction) -> Result<()> {
        self.pins.ensure_ready()?;
        safeload::commit(transaction, self.transport.as_mut())
    }

    /// Soft reset through the control register pair.
    ///
    /// # Errors
    ///
    /// Readiness and bus errors.
    pub fn soft_reset(&mut self) -> Result<()> {
        self.pins.ensure_ready()?;
        tracing::info!("Soft-resetting the DSP core");
        self.transport
            .write(SOFT_RESET, &soft_reset::ASSERT.to_be_bytes())?;
        self.transport
            .write(SOFT_RESET, &soft_reset::RELEASE.to_be_bytes())
    }

    /// Reset through the reset pin, falling back to a soft reset when no
    /// pin is wired.
    ///
    /// # Errors
    ///
    /// GPIO errors from the pin path, readiness and bus errors from the
    /// fallback.
    pub fn hard_reset(&mut self) -> Result<()> {
        if self.pins.has_reset_pin() {
            self.pins.hard_reset()
        } else {
            tracing::debug!("No reset pin configured, using soft reset");
            self.soft_reset()
        }
    }

    /// Drive the self-boot select pin.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Gpio`](crate::BridgeError::Gpio) when no self-boot
    /// line is configured.
    pub fn set_self_boot(&mut self, engaged: bool) -> Result<()> {
        self.pins.set_self_boot(engaged)
    }

    /// Which bus the device is on.
    pub fn bus_kind(&self) -> BusKind {
        self.transport.kind()
    }

    /// Pin controller state.
    pub fn pin_state(&self) -> PinState {
        self.pins.state()
    }
}

impl Drop for SigmaDsp {
    fn drop(&mut self) {
        tracing::debug!("Closing DSP device on the {} bus", self.transport.kind());
    }
}
