//! On-disk configuration.
//!
//! One JSON file covers the whole bridge. Every section and every field
//! is optional; an empty object is a valid configuration selecting SPI
//! bus 0, no control pins, the standard ports, and no parameter file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::transport::BusConfig;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Bus transport selection.
    pub bus: BusConfig,
    /// Reset and self-boot pin wiring.
    pub pins: PinsConfig,
    /// TCP service endpoints.
    pub server: ServerConfig,
    /// Parameter catalog source.
    pub parameters: ParametersConfig,
}

impl BridgeConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Config`] when the file is unreadable or does not
    /// parse, with the path in the message.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| BridgeError::config(format!("cannot read {}: {err}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|err| BridgeError::config(format!("cannot parse {}: {err}", path.display())))?;
        tracing::info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Render as pretty-printed JSON, for `config init` style tooling.
    ///
    /// # Errors
    ///
    /// Serialization failures surface as [`BridgeError::Config`].
    pub fn to_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| BridgeError::config(err.to_string()))
    }
}

/// GPIO wiring for the chip's control pins. Lines left out are treated
/// as not wired.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PinsConfig {
    /// Reset line.
    pub reset: Option<PinConfig>,
    /// Self-boot select line.
    pub self_boot: Option<PinConfig>,
}

/// One GPIO output line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PinConfig {
    /// Kernel GPIO number.
    pub gpio: u32,
    /// Whether driving the wire high asserts the line.
    #[serde(default = "default_active_high")]
    pub active_high: bool,
}

fn default_active_high() -> bool {
    true
}

/// TCP endpoints for the two services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address for both listeners.
    pub host: String,
    /// Register protocol port, where SigmaStudio connects.
    pub programmer_port: u16,
    /// JSON control protocol port.
    pub control_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            programmer_port: 8087,
            control_port: 8088,
        }
    }
}

impl ServerConfig {
    /// Bind address of the register protocol listener.
    pub fn programmer_addr(&self) -> String {
        format!("{}:{}", self.host, self.programmer_port)
    }

    /// Bind address of the control protocol listener.
    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.host, self.control_port)
    }
}

/// Where the parameter catalog loads from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParametersConfig {
    /// Catalog file, a JSON table or a SigmaStudio `.params` export.
    pub file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::BusKind;
    use std::io::Write as _;

    #[test]
    fn empty_object_is_a_complete_config() {
        let config: BridgeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.bus.kind, BusKind::Spi);
        assert!(config.pins.reset.is_none());
        assert_eq!(config.server.programmer_addr(), "0.0.0.0:8087");
        assert_eq!(config.server.control_addr(), "0.0.0.0:8088");
        assert!(config.parameters.file.is_none());
    }

    #[test]
    fn unknown_sections_rejected() {
        assert!(serde_json::from_str::<BridgeConfig>(r#"{"buss": {}}"#).is_err());
        assert!(serde_json::from_str::<BridgeConfig>(r#"{"server": {"prt": 1}}"#).is_err());
    }

    #[test]
    fn pins_default_to_active_high() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{"pins": {"reset": {"gpio": 17}}}"#).unwrap();
        let reset = config.pins.reset.unwrap();
        assert_eq!(reset.gpio, 17);
        assert!(reset.active_high);
    }

    #[test]
    fn load_round_trips_through_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "bus": {{"kind": "i2c", "bus": 1, "i2c_address": 59}},
                "pins": {{"reset": {{"gpio": 4, "active_high": false}}}},
                "server": {{"host": "127.0.0.1", "control_port": 9000}},
                "parameters": {{"file": "project.params"}}
            }}"#
        )
        .unwrap();

        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.bus.kind, BusKind::I2c);
        assert_eq!(config.bus.i2c_address, 0x3B);
        assert!(!config.pins.reset.unwrap().active_high);
        assert_eq!(config.server.control_addr(), "127.0.0.1:9000");
        assert_eq!(config.server.programmer_port, 8087);
        assert_eq!(
            config.parameters.file.unwrap(),
            PathBuf::from("project.params")
        );
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = BridgeConfig::load("/nonexistent/bridge.json").unwrap_err();
        assert!(matches!(err, BridgeError::Config { .. }));
    }

    #[test]
    fn pretty_print_round_trips() {
        let config = BridgeConfig::default();
        let text = config.to_pretty().unwrap();
        let parsed: BridgeConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
