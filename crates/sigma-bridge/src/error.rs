//! Error types for bridge operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while driving the DSP
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Bus device node not found at the expected path
    #[error("Bus device not found: {path}")]
    DeviceNotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// A bus transfer failed. Failed transfers are reported, never retried.
    #[error("Bus transfer failed: {reason}")]
    Bus {
        /// Reason for failure
        reason: String,
    },

    /// A GPIO line could not be exported or driven
    #[error("GPIO error: {reason}")]
    Gpio {
        /// Reason for failure
        reason: String,
    },

    /// The chip is not ready for bus traffic
    #[error("DSP not ready (pin state: {state})")]
    NotReady {
        /// Current pin controller state
        state: String,
    },

    /// A transfer length the bus contract cannot carry
    #[error("Invalid transfer length {length}: {reason}")]
    InvalidLength {
        /// Offending length in bytes
        length: usize,
        /// Why the length is unusable
        reason: String,
    },

    /// More words than the safeload slots can hold in one transaction
    #[error("Safeload transaction of {words} words exceeds the {limit} available slots")]
    TransactionTooLarge {
        /// Requested word count
        words: usize,
        /// Number of hardware slots
        limit: usize,
    },

    /// A safeload transaction that violates the slot contract
    #[error("Malformed safeload transaction: {reason}")]
    MalformedTransaction {
        /// What the transaction got wrong
        reason: String,
    },

    /// A frame that does not follow the programmer wire protocol
    #[error("Protocol error: {reason}")]
    Protocol {
        /// What the peer sent
        reason: String,
    },

    /// The bus worker thread has shut down
    #[error("Bus worker is gone")]
    WorkerGone,

    /// An operation did not produce a reply within its deadline
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    /// Bad daemon configuration
    #[error("Configuration error: {reason}")]
    Config {
        /// What is wrong with the configuration
        reason: String,
    },

    /// Parameter catalog error
    #[error("Parameter catalog: {source}")]
    Params {
        /// Underlying catalog error
        #[from]
        source: sigma_params::ParamsError,
    },

    /// I/O error outside the bus data path
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl BridgeError {
    /// Create a device not found error
    pub fn device_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DeviceNotFound { path: path.into() }
    }

    /// Create a bus transfer error
    pub fn bus(reason: impl Into<String>) -> Self {
        Self::Bus {
            reason: reason.into(),
        }
    }

    /// Create a GPIO error
    pub fn gpio(reason: impl Into<String>) -> Self {
        Self::Gpio {
            reason: reason.into(),
        }
    }

    /// Create a not-ready error
    pub fn not_ready(state: impl Into<String>) -> Self {
        Self::NotReady {
            state: state.into(),
        }
    }

    /// Create an invalid length error
    pub fn invalid_length(length: usize, reason: impl Into<String>) -> Self {
        Self::InvalidLength {
            length,
            reason: reason.into(),
        }
    }

    /// Create a malformed transaction error
    pub fn malformed_transaction(reason: impl Into<String>) -> Self {
        Self::MalformedTransaction {
            reason: reason.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}
