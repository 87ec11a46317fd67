//! Protocol translators between client wire formats and bus operations.
//!
//! Two front doors feed the same bus worker: the programmer protocol
//! speaks raw register addresses, the control protocol speaks catalog
//! names. Neither touches the transport directly.

mod named;
mod programmer;

pub use named::{NamedTranslator, SharedCatalog};
pub use programmer::serve_programmer;
