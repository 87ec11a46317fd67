//! Register map for the ADAU145x-class core.
//!
//! Addresses are 16-bit **word** addresses: each address names one register,
//! and consecutive addresses are applied in sequence by the chip's
//! auto-increment on burst transfers. Register width varies by block:
//!
//! ```text
//! 0x0000–0x5FFF: parameter / program memory   4 bytes (28-bit 5.23 + padding)
//! 0x6000–0x600A: safeload block               4 bytes
//! 0xF000–0xFFFF: core control registers       2 bytes
//! ```
//!
//! ## Safeload block
//!
//! ```text
//! 0x6000  slot 0 target address  ┐ one slot = two words,
//! 0x6001  slot 0 data            ┘ written as a single 8-byte burst
//! 0x6002  slot 1 target address
//! 0x6003  slot 1 data
//!   …                             (5 slots total)
//! 0x600A  pending count — number of armed slots
//! ```
//!
//! Armed slots are applied to their target addresses between processing
//! frames when the IST bit in [`CORE_CONTROL`] is written. IST is
//! write-one-to-trigger and self-clearing.

// ── Transfer geometry ────────────────────────────────────────────────────────

/// Bytes per parameter / safeload memory word.
pub const WORD_BYTES: usize = 4;

/// Bytes per core control register (the 0xF000 block).
pub const CONTROL_REG_BYTES: usize = 2;

/// Minimum transfer granularity on the control port. Every transfer length
/// must be a positive multiple of this.
pub const MIN_TRANSFER_BYTES: usize = 2;

// ── Parameter memory ─────────────────────────────────────────────────────────

/// First parameter / program memory word address.
pub const PARAM_RAM_START: u16 = 0x0000;

/// Last parameter / program memory word address (inclusive).
pub const PARAM_RAM_END: u16 = 0x5FFF;

// ── Safeload block ───────────────────────────────────────────────────────────

/// Number of safeload slots.
pub const SAFELOAD_SLOT_COUNT: usize = 5;

/// First word of slot 0.
pub const SAFELOAD_SLOT_BASE: u16 = 0x6000;

/// Words per slot: target address word followed by data word.
pub const SAFELOAD_SLOT_WORDS: u16 = 2;

/// Pending-count register — written with the number of armed slots.
pub const SAFELOAD_PENDING: u16 = 0x600A;

/// First word of the safeload block (for span-collision checks).
pub const SAFELOAD_BLOCK_START: u16 = SAFELOAD_SLOT_BASE;

/// Last word of the safeload block (inclusive).
pub const SAFELOAD_BLOCK_END: u16 = SAFELOAD_PENDING;

/// Word address of safeload slot `index`.
///
/// # Panics
///
/// Panics if `index >= SAFELOAD_SLOT_COUNT`.
#[must_use]
pub const fn safeload_slot(index: usize) -> u16 {
    assert!(index < SAFELOAD_SLOT_COUNT);
    SAFELOAD_SLOT_BASE + (index as u16) * SAFELOAD_SLOT_WORDS
}

// ── Core control ─────────────────────────────────────────────────────────────

/// Core control register (16-bit).
pub const CORE_CONTROL: u16 = 0xF400;

/// Core control bits.
pub mod core_control {
    /// Core run — held set during normal operation.
    pub const RUN: u16 = 1 << 0;
    /// Initiate safeload transfer — write-one-to-trigger, self-clearing.
    pub const IST: u16 = 1 << 5;
}

/// Soft reset register (16-bit). Write [`soft_reset::ASSERT`] then
/// [`soft_reset::RELEASE`] to restart the core without touching pins.
pub const SOFT_RESET: u16 = 0xF890;

/// Soft reset register values.
pub mod soft_reset {
    /// Hold the core in reset.
    pub const ASSERT: u16 = 0x0000;
    /// Release the core from reset.
    pub const RELEASE: u16 = 0x0001;
}

// ── Timing ───────────────────────────────────────────────────────────────────

/// Chip-mandated delays.
pub mod timing {
    /// Hold time for the hardware reset line, in milliseconds.
    pub const RESET_HOLD_MS: u64 = 1;

    /// Worst-case self-boot time after reset release (EEPROM program load),
    /// in milliseconds.
    pub const BOOT_SETTLE_MS: u64 = 35;

    /// Settle time after an IST trigger before the next safeload may be
    /// armed: two audio frames at the 48 kHz base rate, in microseconds.
    pub const SAFELOAD_SETTLE_US: u64 = 50;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safeload_slots_precede_pending_register() {
        assert_eq!(safeload_slot(0), 0x6000);
        assert_eq!(safeload_slot(4), 0x6008);
        // Last slot's data word sits just below the pending count.
        assert_eq!(safeload_slot(4) + 1, SAFELOAD_PENDING - 1);
    }

    #[test]
    fn safeload_block_outside_parameter_ram() {
        assert!(SAFELOAD_BLOCK_START > PARAM_RAM_END);
        assert!(SAFELOAD_BLOCK_END < CORE_CONTROL);
    }

    #[test]
    fn control_bits_distinct() {
        assert_ne!(core_control::RUN, core_control::IST);
        assert_ne!(CORE_CONTROL, SOFT_RESET);
    }
}
