//! Concrete bus transports.

mod i2c;
mod mock;
mod spi;

pub use i2c::I2cTransport;
pub use mock::{BusOp, MockProbe, MockTransport};
pub use spi::SpiTransport;
