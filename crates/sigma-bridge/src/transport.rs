//! Bus transport selection and the transfer contract.
//!
//! Every path to the chip goes through [`BusTransport`]: the SPI and I2C
//! implementations drive real `/dev` nodes, the mock keeps a byte image in
//! memory for tests and development hosts. [`open_transport`] picks one from
//! configuration, the same way for the daemon and the CLI.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::transports::{I2cTransport, MockTransport, SpiTransport};
use sigma_chip::regs;

/// Upper bound on a single transfer, in bytes.
///
/// Full program downloads go through in one call and are chunked into
/// bus-sized frames inside the transport. Anything past this ceiling is a
/// malformed request, not a real firmware image.
pub const MAX_TRANSFER_BYTES: usize = 256 * 1024;

/// One register bus to the DSP.
///
/// Implementations own the underlying device node. Addressing is in 16-bit
/// register addresses; data is raw big-endian register content.
pub trait BusTransport: fmt::Debug + Send {
    /// Read `length` bytes of register content starting at `address`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidLength`] before touching the wire,
    /// [`BridgeError::Bus`] when the transfer itself fails.
    fn read(&mut self, address: u16, length: usize) -> Result<Vec<u8>>;

    /// Write `data` starting at register `address`.
    ///
    /// # Errors
    ///
    /// Same contract as [`BusTransport::read`].
    fn write(&mut self, address: u16, data: &[u8]) -> Result<()>;

    /// Which bus this transport drives.
    fn kind(&self) -> BusKind;
}

/// The kind of bus a transport drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// `spidev` full-duplex SPI.
    Spi,
    /// `i2c-dev` adapter.
    I2c,
    /// In-memory register image.
    Mock,
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spi => write!(f, "SPI"),
            Self::I2c => write!(f, "I2C"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

/// Bus selection and addressing, as it appears in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusConfig {
    /// Which bus to open.
    pub kind: BusKind,
    /// Bus number: the `B` in `/dev/spidevB.C` or `/dev/i2c-B`.
    pub bus: u8,
    /// Chip select: the `C` in `/dev/spidevB.C`. SPI only.
    pub chip_select: u8,
    /// 7-bit chip address on the I2C bus. I2C only.
    pub i2c_address: u16,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            kind: BusKind::Spi,
            bus: 0,
            chip_select: 0,
            i2c_address: 0x3B,
        }
    }
}

/// Open the transport described by `config`.
///
/// # Errors
///
/// [`BridgeError::DeviceNotFound`] when the device node is missing,
/// [`BridgeError::Bus`] when it exists but cannot be configured.
pub fn open_transport(config: &BusConfig) -> Result<Box<dyn BusTransport>> {
    match config.kind {
        BusKind::Spi => {
            tracing::info!(
                "Opening SPI transport on /dev/spidev{}.{}",
                config.bus,
                config.chip_select
            );
            SpiTransport::open(config.bus, config.chip_select)
                .map(|t| Box::new(t) as Box<dyn BusTransport>)
        }
        BusKind::I2c => {
            tracing::info!(
                "Opening I2C transport on /dev/i2c-{} (chip 0x{:02x})",
                config.bus,
                config.i2c_address
            );
            I2cTransport::open(config.bus, config.i2c_address)
                .map(|t| Box::new(t) as Box<dyn BusTransport>)
        }
        BusKind::Mock => {
            tracing::info!("Using in-memory mock transport");
            Ok(Box::new(MockTransport::new()))
        }
    }
}

/// Check a transfer against the bus contract before touching the wire.
///
/// Transfers are register-granular: whole 16-bit control registers or whole
/// 32-bit words, so every length must be a positive multiple of two bytes,
/// and the spanned word addresses must stay inside the 16-bit space.
///
/// # Errors
///
/// [`BridgeError::InvalidLength`] naming the violated rule.
pub fn validate_transfer(address: u16, length: usize) -> Result<()> {
    if length == 0 {
        return Err(BridgeError::invalid_length(
            length,
            "transfers must carry at least one register",
        ));
    }
    if length % regs::MIN_TRANSFER_BYTES != 0 {
        return Err(BridgeError::invalid_length(
            length,
            "transfers are register-granular (2-byte multiples)",
        ));
    }
    if length > MAX_TRANSFER_BYTES {
        return Err(BridgeError::invalid_length(
            length,
            "transfer exceeds the single-call ceiling",
        ));
    }

    let words = length.div_ceil(regs::WORD_BYTES) as u32;
    if u32::from(address) + words - 1 > u32::from(u16::MAX) {
        return Err(BridgeError::invalid_length(
            length,
            "span leaves the 16-bit address space",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_transport_selected_from_config() {
        let config = BusConfig {
            kind: BusKind::Mock,
            ..BusConfig::default()
        };
        let transport = open_transport(&config).unwrap();
        assert_eq!(transport.kind(), BusKind::Mock);
    }

    #[test]
    fn zero_length_rejected() {
        assert!(matches!(
            validate_transfer(0x0000, 0),
            Err(BridgeError::InvalidLength { length: 0, .. })
        ));
    }

    #[test]
    fn odd_length_rejected() {
        assert!(validate_transfer(0x0000, 3).is_err());
        assert!(validate_transfer(0x0000, 1).is_err());
    }

    #[test]
    fn control_register_write_is_valid() {
        validate_transfer(regs::CORE_CONTROL, 2).unwrap();
    }

    #[test]
    fn oversized_transfer_rejected() {
        assert!(validate_transfer(0x0000, MAX_TRANSFER_BYTES + 4).is_err());
        validate_transfer(0x0000, MAX_TRANSFER_BYTES).unwrap();
    }

    #[test]
    fn span_may_not_leave_the_address_space() {
        validate_transfer(0xFFFF, 4).unwrap();
        assert!(validate_transfer(0xFFFF, 8).is_err());
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: BusConfig = serde_json::from_str(r#"{"kind": "i2c", "bus": 1}"#).unwrap();
        assert_eq!(config.kind, BusKind::I2c);
        assert_eq!(config.bus, 1);
        assert_eq!(config.i2c_address, 0x3B);
    }

    #[test]
    fn unknown_config_fields_rejected() {
        assert!(serde_json::from_str::<BusConfig>(r#"{"speed": 1000}"#).is_err());
    }
}
