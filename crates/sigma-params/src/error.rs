//! Error types for catalog loading and value conversion

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, ParamsError>;

/// Errors that can occur while loading or using a parameter catalog
#[derive(Debug, Error)]
pub enum ParamsError {
    /// Parameter file not found or unreadable
    #[error("Parameter file not found: {path}")]
    FileNotFound {
        /// Path that was attempted
        path: PathBuf,
    },

    /// Parameter file syntax error
    #[error("Failed to parse parameter file: {reason}")]
    ParseError {
        /// Reason for failure
        reason: String,
    },

    /// A descriptor failed validation
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidDescriptor {
        /// Name of the offending row
        name: String,
        /// Reason for failure
        reason: String,
    },

    /// Two rows share a name
    #[error("Duplicate parameter name: '{name}'")]
    DuplicateName {
        /// The duplicated name
        name: String,
    },

    /// Two rows overlap in the address space without being declared aliases
    #[error("Parameters '{first}' and '{second}' overlap and are not aliases")]
    SpanOverlap {
        /// First overlapping row
        first: String,
        /// Second overlapping row
        second: String,
    },

    /// Lookup by a name the catalog does not contain
    #[error("Unknown parameter: '{name}'")]
    UnknownParameter {
        /// The name that was looked up
        name: String,
    },

    /// Reverse lookup by an address no row starts at
    #[error("No parameter at address 0x{address:04X}")]
    UnknownAddress {
        /// The address that was looked up
        address: u16,
    },

    /// A value whose type does not fit the target encoding
    #[error("Type mismatch: {encoding} parameter cannot take a {got} value")]
    TypeMismatch {
        /// Human name of the encoding
        encoding: String,
        /// Type of the rejected value
        got: String,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// JSON error
    #[error("JSON error: {source}")]
    Json {
        /// Underlying serde error
        #[from]
        source: serde_json::Error,
    },
}

impl ParamsError {
    /// Create a parse error
    pub fn parse_error(reason: impl Into<String>) -> Self {
        Self::ParseError {
            reason: reason.into(),
        }
    }

    /// Create a descriptor validation error
    pub fn invalid_descriptor(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown-parameter error
    pub fn unknown_parameter(name: impl Into<String>) -> Self {
        Self::UnknownParameter { name: name.into() }
    }

    /// Create a type-mismatch error
    pub fn type_mismatch(encoding: impl Into<String>, got: impl Into<String>) -> Self {
        Self::TypeMismatch {
            encoding: encoding.into(),
            got: got.into(),
        }
    }
}
