//! SigmaStudio `.params` export parser.
//!
//! The vendor IDE writes one block per parameter next to a compiled
//! project:
//!
//! ```text
//! Cell Name         = Master Volume
//! Parameter Name    = MasterVolumeAlg1target
//! Parameter Address = 32
//! Parameter Value   = 0.5
//! Parameter Data :
//! 0x00 ,
//! 0x40 ,
//! 0x00 ,
//! 0x00 ,
//! ```
//!
//! Only the name, address, and data length matter here: the data bytes
//! give the word count, and values are re-read from the chip rather than
//! trusted from the export. Encodings default to the family-native
//! fixed-point format — exports do not record them.

use crate::catalog::ParameterDescriptor;
use crate::error::{ParamsError, Result};
use crate::value::NATIVE_ENCODING;
use sigma_chip::regs::WORD_BYTES;

#[derive(Debug, Default)]
struct Block {
    cell: Option<String>,
    name: Option<String>,
    address: Option<u16>,
    data: Vec<u8>,
    in_data: bool,
}

impl Block {
    fn has_payload(&self) -> bool {
        self.name.is_some() && !self.data.is_empty()
    }

    fn finish(&mut self) -> Result<ParameterDescriptor> {
        let name = self
            .name
            .take()
            .ok_or_else(|| ParamsError::parse_error("parameter block without a name"))?;
        let address = self.address.take().ok_or_else(|| {
            ParamsError::invalid_descriptor(&name, "parameter block without an address")
        })?;
        if self.data.is_empty() || self.data.len() % WORD_BYTES != 0 {
            return Err(ParamsError::invalid_descriptor(
                &name,
                format!(
                    "parameter data is {} bytes, not a whole number of words",
                    self.data.len()
                ),
            ));
        }
        let word_count = self.data.len() / WORD_BYTES;
        let cell = self.cell.clone();
        self.data.clear();
        self.in_data = false;
        Ok(ParameterDescriptor {
            name,
            address,
            word_count,
            encoding: NATIVE_ENCODING,
            alias: false,
            cell,
        })
    }
}

/// Parse a `.params` export into descriptor rows.
///
/// # Errors
///
/// Returns a parse error on malformed blocks, addresses, or data bytes.
pub fn parse(text: &str) -> Result<Vec<ParameterDescriptor>> {
    let mut rows = Vec::new();
    let mut block = Block::default();

    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        let lineno = index + 1;

        if line.is_empty() {
            if block.has_payload() {
                rows.push(block.finish()?);
            }
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim();
            match key {
                "Cell Name" => {
                    if block.has_payload() {
                        rows.push(block.finish()?);
                    }
                    block.cell = Some(value.to_string());
                    block.in_data = false;
                }
                "Parameter Name" => {
                    if block.has_payload() {
                        // New parameter within the same cell.
                        let cell = block.cell.clone();
                        rows.push(block.finish()?);
                        block.cell = cell;
                    }
                    block.name = Some(value.to_string());
                    block.in_data = false;
                }
                "Parameter Address" => {
                    block.address = Some(parse_address(value, lineno)?);
                }
                "Parameter Value" => {
                    // Informational only; live values come from the chip.
                }
                other => {
                    tracing::trace!("line {lineno}: ignoring key '{other}'");
                }
            }
            continue;
        }

        if line.starts_with("Parameter Data") {
            block.in_data = true;
            continue;
        }

        if block.in_data {
            for token in line.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                block.data.push(parse_byte(token, lineno)?);
            }
            continue;
        }

        tracing::trace!("line {lineno}: ignoring '{line}'");
    }

    if block.has_payload() {
        rows.push(block.finish()?);
    } else if block.name.is_some() {
        return Err(ParamsError::parse_error(
            "trailing parameter block without data",
        ));
    }

    tracing::debug!("SigmaStudio export: {} parameters", rows.len());
    Ok(rows)
}

fn parse_address(text: &str, lineno: usize) -> Result<u16> {
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else {
        text.parse()
    };
    parsed.map_err(|_| ParamsError::parse_error(format!("line {lineno}: bad address '{text}'")))
}

fn parse_byte(token: &str, lineno: usize) -> Result<u8> {
    token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        .ok_or_else(|| {
            ParamsError::parse_error(format!("line {lineno}: bad data byte '{token}'"))
        })
}
