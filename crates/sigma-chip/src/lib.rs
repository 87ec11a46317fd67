//! Silicon model for ADAU145x-class SigmaDSP cores.
//!
//! This crate has **no dependencies** and **no hardware access** — it is a
//! pure model of the chip: register addresses, the safeload block layout,
//! fixed-point parameter formats, bus frame formats, and timing constants.
//! Everything that talks to a real bus lives in `sigma-bridge`.
//!
//! Values come from the family datasheets and from traffic captures of the
//! vendor's programmer tool talking to evaluation boards.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | Register map — parameter RAM, safeload block, core control, timings |
//! | [`qformat`] | Fixed-point parameter codec (Q-formats, word packing) |
//! | [`frame`] | SPI / I2C control-port frame formats and transfer ceilings |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod frame;
pub mod qformat;
pub mod regs;
