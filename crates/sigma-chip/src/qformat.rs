//! Fixed-point parameter codec.
//!
//! DSP memory words hold signed fixed-point values. A format is written
//! `Qi.f`: `i` integer bits (sign included) and `f` fractional bits. The
//! family default is 5.23 — 28 significant bits in the low end of each
//! 32-bit word, upper bits sign-filled.
//!
//! Encoding scales by `2^f`, rounds to nearest with **ties away from
//! zero** (what the vendor tool does), and clamps out-of-range values to
//! the format limits instead of wrapping. Clamping is reported through
//! [`Saturation`], not an error: a clamped write still lands.
//!
//! Decoding masks to the format width, sign-extends, and divides by `2^f`.
//! Both directions are exact in an `f64` as long as the format is no wider
//! than [`MAX_TOTAL_BITS`], which also makes `encode(decode(x)) == x` hold
//! for every properly sign-extended register pattern.

use crate::regs::WORD_BYTES;

/// Widest supported format. Bounded by the `f64` significand so that
/// decode is exact and the round-trip law holds.
pub const MAX_TOTAL_BITS: u32 = 53;

/// The family's native parameter format: 5.23, 28 bits.
pub const NATIVE: QFormat = QFormat::new(5, 23);

/// A signed fixed-point format: integer bits (sign included) and
/// fractional bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QFormat {
    /// Integer bits, sign included.
    pub integer_bits: u8,
    /// Fractional bits.
    pub fractional_bits: u8,
}

impl QFormat {
    /// Build a format from its bit split.
    #[must_use]
    pub const fn new(integer_bits: u8, fractional_bits: u8) -> Self {
        Self {
            integer_bits,
            fractional_bits,
        }
    }

    /// Total significant bits.
    #[must_use]
    pub const fn total_bits(self) -> u32 {
        self.integer_bits as u32 + self.fractional_bits as u32
    }

    /// Largest representable raw pattern.
    #[must_use]
    pub const fn max_raw(self) -> i64 {
        (1i64 << (self.total_bits() - 1)) - 1
    }

    /// Smallest representable raw pattern.
    #[must_use]
    pub const fn min_raw(self) -> i64 {
        -(1i64 << (self.total_bits() - 1))
    }

    /// Largest representable value.
    #[must_use]
    pub fn max_value(self) -> f64 {
        self.decode(self.max_raw())
    }

    /// Smallest representable value.
    #[must_use]
    pub fn min_value(self) -> f64 {
        self.decode(self.min_raw())
    }

    #[allow(clippy::cast_precision_loss)] // scale is a power of two, exact
    fn scale(self) -> f64 {
        (1u64 << self.fractional_bits) as f64
    }

    /// Encode a host value to a raw register pattern.
    ///
    /// Rounds ties away from zero; out-of-range and non-finite inputs clamp
    /// to the format limits (NaN to zero) and report
    /// [`Saturation::Clamped`].
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn encode(self, value: f64) -> (i64, Saturation) {
        if value.is_nan() {
            return (0, Saturation::Clamped);
        }
        // f64::round is round-half-away-from-zero.
        let rounded = (value * self.scale()).round();
        if rounded > self.max_raw() as f64 {
            (self.max_raw(), Saturation::Clamped)
        } else if rounded < self.min_raw() as f64 {
            (self.min_raw(), Saturation::Clamped)
        } else {
            (rounded as i64, Saturation::InRange)
        }
    }

    /// Decode a raw register pattern to a host value. Exact for formats
    /// within [`MAX_TOTAL_BITS`].
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn decode(self, raw: i64) -> f64 {
        raw as f64 / self.scale()
    }
}

/// Outcome of an encode: whether the value had to be clamped to the format
/// limits. Clamping is a reportable condition, never a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Saturation {
    /// The value was representable as-is.
    InRange,
    /// The value was clamped to the nearest format limit.
    Clamped,
}

impl Saturation {
    /// True if the value was clamped.
    #[must_use]
    pub const fn clamped(self) -> bool {
        matches!(self, Self::Clamped)
    }
}

/// Clamp a host integer to a signed `bits`-wide range.
///
/// # Panics
///
/// Panics if `bits` is zero or above 63.
#[must_use]
pub fn clamp_integer(value: i64, bits: u32) -> (i64, Saturation) {
    assert!((1..=63).contains(&bits));
    let max = (1i64 << (bits - 1)) - 1;
    let min = -(1i64 << (bits - 1));
    if value > max {
        (max, Saturation::Clamped)
    } else if value < min {
        (min, Saturation::Clamped)
    } else {
        (value, Saturation::InRange)
    }
}

/// Pack a raw pattern into `word_count` big-endian 32-bit words, upper
/// bytes sign-filled.
///
/// # Panics
///
/// Panics if `word_count` is zero.
#[must_use]
pub fn pack_words(raw: i64, word_count: usize) -> Vec<u8> {
    assert!(word_count >= 1);
    let total = word_count * WORD_BYTES;
    let fill = if raw < 0 { 0xFF } else { 0x00 };
    let mut out = vec![fill; total];
    let tail = raw.to_be_bytes();
    if total >= 8 {
        out[total - 8..].copy_from_slice(&tail);
    } else {
        out.copy_from_slice(&tail[8 - total..]);
    }
    out
}

/// Unpack big-endian words into a raw pattern: take the low `total_bits`,
/// sign-extend. Bytes above the low 64 bits are sign fill and ignored.
///
/// # Panics
///
/// Panics if `total_bits` is zero or above 63, or `bytes` is empty.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn unpack_words(bytes: &[u8], total_bits: u32) -> i64 {
    assert!((1..=63).contains(&total_bits));
    assert!(!bytes.is_empty());
    let tail = &bytes[bytes.len().saturating_sub(8)..];
    let mut acc: u64 = 0;
    for &b in tail {
        acc = (acc << 8) | u64::from(b);
    }
    let mask = (1u64 << total_bits) - 1;
    let val = acc & mask;
    if val & (1 << (total_bits - 1)) != 0 {
        (val | !mask) as i64
    } else {
        val as i64
    }
}
