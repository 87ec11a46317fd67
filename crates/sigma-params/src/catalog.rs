//! The catalog proper: validated, immutable name/address indexes.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use sigma_chip::qformat::MAX_TOTAL_BITS;
use sigma_chip::regs::{self, WORD_BYTES};

use crate::error::{ParamsError, Result};
use crate::value::Encoding;
use crate::{json, sigmastudio};

/// One catalog row: a named cell and how to reach it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDescriptor {
    /// Lookup name.
    pub name: String,
    /// First word address of the cell.
    pub address: u16,
    /// Words the cell spans.
    pub word_count: usize,
    /// Value encoding.
    pub encoding: Encoding,
    /// Declared alias of another row at the same address.
    pub alias: bool,
    /// Source cell name, when the format records one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<String>,
}

impl ParameterDescriptor {
    /// Last word address of the cell (inclusive).
    pub fn end_address(&self) -> u16 {
        // Span fit is checked at load; saturate rather than wrap if a
        // caller builds a bad descriptor by hand.
        let span = u16::try_from(self.word_count.saturating_sub(1)).unwrap_or(u16::MAX);
        self.address.saturating_add(span)
    }

    /// Bytes the cell occupies on the bus.
    pub fn byte_length(&self) -> usize {
        self.word_count * WORD_BYTES
    }
}

/// An immutable, validated parameter catalog.
///
/// Construction validates every row and every pairwise relation; a catalog
/// that exists is safe to use. Lookups never touch the bus.
#[derive(Debug, Default)]
pub struct ParameterCatalog {
    rows: Vec<ParameterDescriptor>,
    by_name: HashMap<String, usize>,
    by_address: HashMap<u16, usize>,
}

impl ParameterCatalog {
    /// Build a catalog from descriptor rows, validating everything.
    ///
    /// # Errors
    ///
    /// Fails on empty names, zero-word spans, spans leaving the 16-bit
    /// space or crossing the safeload block, encodings wider than their
    /// span or the codec's exactness cap, duplicate names, and span
    /// overlaps not declared as aliases on both sides.
    pub fn new(rows: Vec<ParameterDescriptor>) -> Result<Self> {
        for row in &rows {
            validate_row(row)?;
        }
        validate_overlaps(&rows)?;

        let mut by_name = HashMap::with_capacity(rows.len());
        let mut by_address = HashMap::new();
        for (index, row) in rows.iter().enumerate() {
            if by_name.insert(row.name.clone(), index).is_some() {
                return Err(ParamsError::DuplicateName {
                    name: row.name.clone(),
                });
            }
            // Aliases share a base address; the first row in load order
            // wins the reverse index.
            by_address.entry(row.address).or_insert(index);
        }

        tracing::info!("Parameter catalog loaded: {} rows", rows.len());
        Ok(Self {
            rows,
            by_name,
            by_address,
        })
    }

    /// Load a catalog from a file, picking the parser by extension
    /// (`.json` or anything else, treated as a SigmaStudio export).
    ///
    /// # Errors
    ///
    /// Fails when the file is unreadable, unparseable, or invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            tracing::error!("Cannot read parameter file {}: {err}", path.display());
            ParamsError::FileNotFound {
                path: path.to_path_buf(),
            }
        })?;
        let rows = if path.extension().is_some_and(|ext| ext == "json") {
            json::parse(&text)?
        } else {
            sigmastudio::parse(&text)?
        };
        Self::new(rows)
    }

    /// Look a cell up by name.
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError::UnknownParameter`] for names not in the
    /// catalog.
    pub fn resolve(&self, name: &str) -> Result<&ParameterDescriptor> {
        self.by_name
            .get(name)
            .map(|&index| &self.rows[index])
            .ok_or_else(|| ParamsError::unknown_parameter(name))
    }

    /// Reverse lookup: the cell whose span starts at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError::UnknownAddress`] when no row starts there.
    pub fn resolve_address(&self, address: u16) -> Result<&ParameterDescriptor> {
        self.by_address
            .get(&address)
            .map(|&index| &self.rows[index])
            .ok_or(ParamsError::UnknownAddress { address })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the catalog has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate rows in load order.
    pub fn iter(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.rows.iter()
    }
}

fn validate_row(row: &ParameterDescriptor) -> Result<()> {
    if row.name.trim().is_empty() {
        return Err(ParamsError::invalid_descriptor(
            "<unnamed>",
            "empty parameter name",
        ));
    }
    if row.word_count == 0 {
        return Err(ParamsError::invalid_descriptor(
            &row.name,
            "word_count must be at least 1",
        ));
    }
    let last = u32::from(row.address) + row.word_count as u32 - 1;
    if last > u32::from(u16::MAX) {
        return Err(ParamsError::invalid_descriptor(
            &row.name,
            format!(
                "span 0x{:04X}+{} leaves the 16-bit address space",
                row.address, row.word_count
            ),
        ));
    }
    if row.address <= regs::SAFELOAD_BLOCK_END && last >= u32::from(regs::SAFELOAD_BLOCK_START) {
        return Err(ParamsError::invalid_descriptor(
            &row.name,
            "span crosses the safeload register block",
        ));
    }
    let bits = row.encoding.total_bits();
    if bits == 0 || bits > MAX_TOTAL_BITS {
        return Err(ParamsError::invalid_descriptor(
            &row.name,
            format!("encoding width {bits} outside 1..={MAX_TOTAL_BITS} bits"),
        ));
    }
    if row.encoding.min_words() > row.word_count {
        return Err(ParamsError::invalid_descriptor(
            &row.name,
            format!(
                "{} needs {} words, row declares {}",
                row.encoding.describe(),
                row.encoding.min_words(),
                row.word_count
            ),
        ));
    }
    Ok(())
}

fn validate_overlaps(rows: &[ParameterDescriptor]) -> Result<()> {
    let mut order: Vec<&ParameterDescriptor> = rows.iter().collect();
    order.sort_by_key(|row| (row.address, row.end_address()));

    for pair in order.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next.address > prev.end_address() {
            continue;
        }
        let declared_alias = prev.alias
            && next.alias
            && prev.address == next.address
            && prev.word_count == next.word_count;
        if !declared_alias {
            return Err(ParamsError::SpanOverlap {
                first: prev.name.clone(),
                second: next.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::NATIVE_ENCODING;

    fn row(name: &str, address: u16, word_count: usize) -> ParameterDescriptor {
        ParameterDescriptor {
            name: name.to_string(),
            address,
            word_count,
            encoding: NATIVE_ENCODING,
            alias: false,
            cell: None,
        }
    }

    #[test]
    fn resolve_both_directions() {
        let catalog =
            ParameterCatalog::new(vec![row("master_volume", 0x20, 1), row("eq_band", 0x30, 3)])
                .unwrap();
        assert_eq!(catalog.resolve("master_volume").unwrap().address, 0x20);
        assert_eq!(catalog.resolve_address(0x30).unwrap().name, "eq_band");
        assert!(matches!(
            catalog.resolve("no_such_cell"),
            Err(ParamsError::UnknownParameter { .. })
        ));
        assert!(matches!(
            catalog.resolve_address(0x21),
            Err(ParamsError::UnknownAddress { .. })
        ));
    }

    #[test]
    fn duplicate_names_rejected() {
        let err =
            ParameterCatalog::new(vec![row("gain", 0x10, 1), row("gain", 0x20, 1)]).unwrap_err();
        assert!(matches!(err, ParamsError::DuplicateName { .. }));
    }

    #[test]
    fn overlapping_spans_rejected() {
        let err =
            ParameterCatalog::new(vec![row("left", 0x10, 4), row("right", 0x12, 2)]).unwrap_err();
        assert!(matches!(err, ParamsError::SpanOverlap { .. }));
    }

    #[test]
    fn declared_aliases_may_share_a_cell() {
        let mut a = row("master_volume", 0x20, 1);
        let mut b = row("main_fader", 0x20, 1);
        a.alias = true;
        b.alias = true;
        let catalog = ParameterCatalog::new(vec![a, b]).unwrap();
        assert_eq!(catalog.resolve("main_fader").unwrap().address, 0x20);
        // Reverse lookup stays stable on the first row.
        assert_eq!(catalog.resolve_address(0x20).unwrap().name, "master_volume");
    }

    #[test]
    fn one_sided_alias_still_conflicts() {
        let mut a = row("master_volume", 0x20, 1);
        a.alias = true;
        let err = ParameterCatalog::new(vec![a, row("main_fader", 0x20, 1)]).unwrap_err();
        assert!(matches!(err, ParamsError::SpanOverlap { .. }));
    }

    #[test]
    fn safeload_block_is_off_limits() {
        let err = ParameterCatalog::new(vec![row("bad", 0x5FFE, 4)]).unwrap_err();
        assert!(matches!(err, ParamsError::InvalidDescriptor { .. }));
    }

    #[test]
    fn encoding_must_fit_span() {
        let mut wide = row("wide", 0x40, 1);
        wide.encoding = Encoding::Int { bits: 48 };
        let err = ParameterCatalog::new(vec![wide]).unwrap_err();
        assert!(matches!(err, ParamsError::InvalidDescriptor { .. }));

        let mut ok = row("wide", 0x40, 2);
        ok.encoding = Encoding::Int { bits: 48 };
        assert!(ParameterCatalog::new(vec![ok]).is_ok());
    }

    #[test]
    fn span_cannot_leave_address_space() {
        let err = ParameterCatalog::new(vec![row("edge", 0xFFFF, 2)]).unwrap_err();
        assert!(matches!(err, ParamsError::InvalidDescriptor { .. }));
    }
}
