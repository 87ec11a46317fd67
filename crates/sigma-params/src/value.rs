//! Host-side values and their register encodings.
//!
//! Each catalog row carries an [`Encoding`] tag telling the bridge how a
//! host value maps onto the cell's register words. Conversion is strict
//! per tag: numeric values go to fixed-point cells, integers to integer
//! cells, booleans to switch cells. A value that would not fit is clamped
//! and reported, never wrapped; a value of the wrong *type* is an error.

use serde::{Deserialize, Serialize};
use sigma_chip::qformat::{self, QFormat, Saturation};
use sigma_chip::regs::WORD_BYTES;

use crate::error::{ParamsError, Result};

/// A host-side parameter value.
///
/// Untagged on the wire: `true`, `3`, and `0.5` parse as switch, integer,
/// and float respectively.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// A boolean switch.
    Switch(bool),
    /// An integer.
    Integer(i64),
    /// A real value.
    Float(f64),
}

impl ParameterValue {
    /// Human name of the value's type, for diagnostics.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Switch(_) => "switch",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Switch(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// How a cell's register words encode a host value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum Encoding {
    /// Signed fixed point, `integer_bits` including the sign.
    Q {
        /// Integer bits, sign included.
        integer_bits: u8,
        /// Fractional bits.
        fractional_bits: u8,
    },
    /// Raw two's-complement integer of the given width.
    Int {
        /// Significant bits.
        #[serde(default = "default_int_bits")]
        bits: u8,
    },
    /// On/off switch: 0 or 1 in a full word.
    Switch,
}

fn default_int_bits() -> u8 {
    32
}

/// The family-native encoding, used when a format does not say otherwise.
pub const NATIVE_ENCODING: Encoding = Encoding::Q {
    integer_bits: 5,
    fractional_bits: 23,
};

impl Encoding {
    /// Significant bits this encoding occupies.
    pub fn total_bits(self) -> u32 {
        match self {
            Self::Q {
                integer_bits,
                fractional_bits,
            } => u32::from(integer_bits) + u32::from(fractional_bits),
            Self::Int { bits } => u32::from(bits),
            Self::Switch => 32,
        }
    }

    /// Smallest word count that holds this encoding.
    pub fn min_words(self) -> usize {
        let bits = self.total_bits() as usize;
        bits.div_ceil(WORD_BYTES * 8)
    }

    /// The fixed-point format, when this is a `Q` encoding.
    pub fn qformat(self) -> Option<QFormat> {
        match self {
            Self::Q {
                integer_bits,
                fractional_bits,
            } => Some(QFormat::new(integer_bits, fractional_bits)),
            _ => None,
        }
    }

    /// Human name, for diagnostics.
    pub fn describe(self) -> String {
        match self {
            Self::Q {
                integer_bits,
                fractional_bits,
            } => format!("{integer_bits}.{fractional_bits} fixed-point"),
            Self::Int { bits } => format!("{bits}-bit integer"),
            Self::Switch => "switch".to_string(),
        }
    }

    /// Encode a host value into `word_count` register words.
    ///
    /// Out-of-range values clamp and report [`Saturation::Clamped`]; the
    /// bytes are still valid and meant to be written.
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError::TypeMismatch`] when the value's type does not
    /// fit this encoding.
    pub fn encode(self, value: ParameterValue, word_count: usize) -> Result<(Vec<u8>, Saturation)> {
        let (raw, saturation) = match (self, value) {
            (
                Self::Q {
                    integer_bits,
                    fractional_bits,
                },
                ParameterValue::Float(v),
            ) => QFormat::new(integer_bits, fractional_bits).encode(v),
            #[allow(clippy::cast_precision_loss)]
            (
                Self::Q {
                    integer_bits,
                    fractional_bits,
                },
                ParameterValue::Integer(i),
            ) => QFormat::new(integer_bits, fractional_bits).encode(i as f64),
            (Self::Int { bits }, ParameterValue::Integer(i)) => {
                qformat::clamp_integer(i, u32::from(bits))
            }
            (Self::Switch, ParameterValue::Switch(b)) => (i64::from(b), Saturation::InRange),
            (encoding, value) => {
                return Err(ParamsError::type_mismatch(
                    encoding.describe(),
                    value.type_name(),
                ));
            }
        };
        Ok((qformat::pack_words(raw, word_count), saturation))
    }

    /// Decode register words into a host value.
    ///
    /// # Errors
    ///
    /// Returns a parse error when `bytes` is not a whole number of words.
    pub fn decode(self, bytes: &[u8]) -> Result<ParameterValue> {
        if bytes.is_empty() || bytes.len() % WORD_BYTES != 0 {
            return Err(ParamsError::parse_error(format!(
                "register span of {} bytes is not a whole number of words",
                bytes.len()
            )));
        }
        let raw = qformat::unpack_words(bytes, self.total_bits());
        Ok(match self {
            Self::Q {
                integer_bits,
                fractional_bits,
            } => ParameterValue::Float(QFormat::new(integer_bits, fractional_bits).decode(raw)),
            Self::Int { .. } => ParameterValue::Integer(raw),
            Self::Switch => ParameterValue::Switch(raw != 0),
        })
    }
}
