#![deny(unsafe_code)]

//! SigmaDSP parameter catalog
//!
//! Maps cell/parameter names from a DSP project export to register
//! addresses, spans, and value encodings, so that callers can address the
//! chip by name instead of by raw address and bit pattern.
//!
//! # Formats
//!
//! Two on-disk formats load into the same catalog:
//!
//! - **JSON table**: an array of rows
//!   `{"name": …, "address": …, "word_count": …, "encoding": {…}}`.
//! - **SigmaStudio `.params` export**: the line-oriented
//!   `Cell Name = … / Parameter Name = … / Parameter Data :` format the
//!   vendor IDE writes next to a compiled project.
//!
//! A catalog is validated completely at load time and immutable
//! afterwards; replacing one means building a new catalog and swapping the
//! handle.
//!
//! # Example
//!
//! ```no_run
//! use sigma_params::ParameterCatalog;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = ParameterCatalog::from_file("project.params")?;
//! let volume = catalog.resolve("master_volume")?;
//! println!("{} @ 0x{:04X}", volume.name, volume.address);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod catalog;
mod error;
mod json;
mod sigmastudio;
mod value;

pub use catalog::{ParameterCatalog, ParameterDescriptor};
pub use error::{ParamsError, Result};
pub use value::{Encoding, ParameterValue, NATIVE_ENCODING};
