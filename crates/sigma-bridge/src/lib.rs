//! Host-side bridge for SigmaDSP audio processors.
//!
//! Serves two TCP protocols and funnels both into a single bus worker
//! that owns the chip, so concurrent clients serialize in arrival order
//! and transfers never interleave on the wire.
//!
//! # Service layout
//!
//! ```text
//! Programmer port (8087): raw register protocol, as SigmaStudio speaks it
//! Control port    (8088): line-oriented JSON named-parameter protocol
//!
//! Both funnel into one worker thread owning the chip:
//!   worker — SigmaDsp — SPI or I2C transport — ADAU145x
//! ```
//!
//! Multi-word parameter updates go through the chip's safeload slots, so
//! the running program never reads a half-written filter. Named access
//! resolves through an immutable parameter catalog that can be rebuilt
//! and swapped without dropping clients.
//!
//! # Quick start
//!
//! ```no_run
//! use sigma_bridge::{open_transport, BusConfig, PinController, SigmaDsp};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = open_transport(&BusConfig::default())?;
//! let mut dsp = SigmaDsp::new(transport, PinController::new());
//! dsp.bring_up()?;
//!
//! let word = dsp.read_registers(0xF400, 2)?;
//! println!("core control: {word:02X?}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod config;
mod device;
mod error;
pub mod gpio;
mod pins;
pub mod protocol;
pub mod safeload;
pub mod server;
pub mod translator;
mod transport;
pub mod transports;
pub mod worker;

pub use config::{BridgeConfig, ParametersConfig, PinConfig, PinsConfig, ServerConfig};
pub use device::SigmaDsp;
pub use error::{BridgeError, Result};
pub use pins::{PinController, PinState};
pub use safeload::SafeloadTransaction;
pub use translator::{serve_programmer, NamedTranslator, SharedCatalog};
pub use transport::{
    open_transport, validate_transfer, BusConfig, BusKind, BusTransport, MAX_TRANSFER_BYTES,
};
pub use transports::{MockProbe, MockTransport};
pub use worker::DspHandle;

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        open_transport, BridgeConfig, BridgeError, BusConfig, BusKind, DspHandle, NamedTranslator,
        PinController, Result, SharedCatalog, SigmaDsp,
    };
}
