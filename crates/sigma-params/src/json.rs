//! JSON parameter table loader.
//!
//! The table is an array of rows:
//!
//! ```json
//! [
//!   {
//!     "name": "master_volume",
//!     "address": 32,
//!     "word_count": 1,
//!     "encoding": { "format": "q", "integer_bits": 5, "fractional_bits": 23 }
//!   }
//! ]
//! ```
//!
//! `word_count` defaults to 1, `encoding` to the family-native fixed-point
//! format, `alias` to false.

use serde::Deserialize;

use crate::catalog::ParameterDescriptor;
use crate::error::Result;
use crate::value::{Encoding, NATIVE_ENCODING};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Row {
    name: String,
    address: u16,
    #[serde(default = "one")]
    word_count: usize,
    #[serde(default = "native")]
    encoding: Encoding,
    #[serde(default)]
    alias: bool,
    #[serde(default)]
    cell: Option<String>,
}

fn one() -> usize {
    1
}

fn native() -> Encoding {
    NATIVE_ENCODING
}

/// Parse a JSON table into descriptor rows.
///
/// # Errors
///
/// Returns a JSON error on malformed input. Semantic validation happens in
/// [`crate::ParameterCatalog::new`].
pub fn parse(text: &str) -> Result<Vec<ParameterDescriptor>> {
    let rows: Vec<Row> = serde_json::from_str(text)?;
    tracing::debug!("JSON parameter table: {} rows", rows.len());
    Ok(rows
        .into_iter()
        .map(|row| ParameterDescriptor {
            name: row.name,
            address: row.address,
            word_count: row.word_count,
            encoding: row.encoding,
            alias: row.alias,
            cell: row.cell,
        })
        .collect())
}
