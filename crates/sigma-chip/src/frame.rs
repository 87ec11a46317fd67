//! Control-port frame formats.
//!
//! Both ports address the same 16-bit word space. SPI frames carry their
//! own read/write control byte; I2C direction comes from the bus, so its
//! frames are just the address prefix.
//!
//! ```text
//! SPI:  [ctrl] [addr hi] [addr lo] [payload …]     ctrl 0 = write, 1 = read
//! I2C:  [addr hi] [addr lo] [payload …]
//! ```
//!
//! The chip auto-increments the word address during a burst, so a long
//! write split into chunks must advance its address by the number of
//! **words** already sent, not bytes.

use crate::regs::WORD_BYTES;

// ── SPI ──────────────────────────────────────────────────────────────────────

/// SPI control byte for a write burst.
pub const SPI_WRITE: u8 = 0x00;

/// SPI control byte for a read burst.
pub const SPI_READ: u8 = 0x01;

/// SPI frame header: control byte plus big-endian address.
pub const SPI_HEADER_BYTES: usize = 3;

/// Largest single SPI transfer the port accepts, header included.
pub const SPI_MAX_FRAME_BYTES: usize = 4096;

/// Whole words that fit in one SPI frame after the header.
pub const SPI_MAX_PAYLOAD_WORDS: usize = (SPI_MAX_FRAME_BYTES - SPI_HEADER_BYTES) / WORD_BYTES;

/// Payload bytes per SPI chunk, rounded down to whole words so chunked
/// writes stay word-aligned.
pub const SPI_MAX_PAYLOAD_BYTES: usize = SPI_MAX_PAYLOAD_WORDS * WORD_BYTES;

/// SPI clock ceiling. The port is rated to 20 MHz; 16 MHz keeps margin on
/// long wiring.
pub const SPI_MAX_SPEED_HZ: u32 = 16_000_000;

/// Build the 3-byte SPI header for a burst starting at `address`.
#[must_use]
pub const fn spi_header(direction: u8, address: u16) -> [u8; SPI_HEADER_BYTES] {
    let addr = address.to_be_bytes();
    [direction, addr[0], addr[1]]
}

// ── I2C ──────────────────────────────────────────────────────────────────────

/// I2C subaddress prefix: big-endian word address.
pub const I2C_ADDRESS_BYTES: usize = 2;

/// Whole words per chunked I2C write. Kept well under the kernel's
/// per-message ceiling.
pub const I2C_MAX_PAYLOAD_WORDS: usize = 256;

/// Payload bytes per I2C chunk.
pub const I2C_MAX_PAYLOAD_BYTES: usize = I2C_MAX_PAYLOAD_WORDS * WORD_BYTES;

/// Build the 2-byte I2C subaddress prefix.
#[must_use]
pub const fn i2c_address(address: u16) -> [u8; I2C_ADDRESS_BYTES] {
    address.to_be_bytes()
}
