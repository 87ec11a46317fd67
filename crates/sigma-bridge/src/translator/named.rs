//! Name-level operations: the catalog and codec glued to the bus worker.
//!
//! This is the layer behind the control service. Callers speak in cell
//! names and host values; the translator resolves names through the
//! active catalog snapshot, runs values through the row's encoding, and
//! picks the write path by span: one word goes straight to the bus, a
//! multi-word cell goes through the safeload engine so the DSP never sees
//! a torn update.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use sigma_chip::qformat::Saturation;
use sigma_params::{ParameterCatalog, ParameterDescriptor, ParameterValue};

use crate::error::{BridgeError, Result};
use crate::safeload::SafeloadTransaction;
use crate::worker::DspHandle;

/// Linear gains at or below this floor read as silence in dB conversions.
pub const MUTE_FLOOR: f64 = 1e-10;

/// Catalog slot shared between the control service and hot reload.
///
/// Readers take an `Arc` snapshot and keep it for the whole operation; a
/// reload builds the next catalog off to the side and swaps the slot
/// atomically. A lookup that started before the swap finishes against the
/// catalog it started with.
#[derive(Debug, Clone)]
pub struct SharedCatalog {
    inner: Arc<RwLock<Arc<ParameterCatalog>>>,
}

impl SharedCatalog {
    /// Wrap an initial catalog.
    pub fn new(catalog: ParameterCatalog) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(catalog))),
        }
    }

    /// The current snapshot.
    pub fn current(&self) -> Arc<ParameterCatalog> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the catalog. Snapshots already taken are unaffected.
    pub fn swap(&self, catalog: ParameterCatalog) {
        let next = Arc::new(catalog);
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        tracing::info!(
            "Parameter catalog swapped: {} rows -> {} rows",
            slot.len(),
            next.len()
        );
        *slot = next;
    }
}

/// Translates named-parameter requests into bus operations.
///
/// Clones share the catalog slot and the worker queue, so one translator
/// per connection is cheap.
#[derive(Debug, Clone)]
pub struct NamedTranslator {
    handle: DspHandle,
    catalog: SharedCatalog,
    catalog_path: Option<PathBuf>,
}

impl NamedTranslator {
    /// Build a translator over a worker handle and a catalog slot.
    pub fn new(handle: DspHandle, catalog: SharedCatalog) -> Self {
        Self {
            handle,
            catalog,
            catalog_path: None,
        }
    }

    /// Remember the file the catalog came from, so a bare reload can
    /// reread it.
    #[must_use]
    pub fn with_catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_path = Some(path.into());
        self
    }

    /// The shared catalog slot.
    pub fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    /// The worker handle behind this translator.
    pub fn handle(&self) -> &DspHandle {
        &self.handle
    }

    /// Encode `value` for the named cell and write it.
    ///
    /// Out-of-range values are clamped to the cell's representable range
    /// and reported through the returned [`Saturation`]; the clamped bytes
    /// are still written.
    ///
    /// # Errors
    ///
    /// Fails on unknown names, type mismatches between value and encoding,
    /// and bus or readiness errors from the write itself.
    pub async fn write_parameter(&self, name: &str, value: ParameterValue) -> Result<Saturation> {
        let catalog = self.catalog.current();
        let row = catalog.resolve(name)?;
        let (bytes, saturation) = row.encoding.encode(value, row.word_count)?;
        if saturation.clamped() {
            tracing::warn!("Value {value} clamped to the range of {name}");
        }
        self.write_row(row, bytes).await?;
        Ok(saturation)
    }

    /// Read the named cell and decode it through the row's encoding.
    ///
    /// # Errors
    ///
    /// Fails on unknown names and bus or readiness errors.
    pub async fn read_parameter(&self, name: &str) -> Result<ParameterValue> {
        let catalog = self.catalog.current();
        let row = catalog.resolve(name)?;
        let bytes = self
            .handle
            .read_registers(row.address, row.byte_length())
            .await?;
        Ok(row.encoding.decode(&bytes)?)
    }

    /// Set a volume cell from a dB value.
    ///
    /// The linear gain is clamped into `0..=1` before writing, so a volume
    /// cell can attenuate but never amplify. Returns the dB value that was
    /// actually set.
    ///
    /// # Errors
    ///
    /// Fails like [`write_parameter`](Self::write_parameter).
    pub async fn set_volume_db(&self, name: &str, db: f64) -> Result<f64> {
        let linear = db_to_linear(db).min(1.0);
        let _ = self
            .write_parameter(name, ParameterValue::Float(linear))
            .await?;
        Ok(linear_to_db(linear))
    }

    /// Shift a volume cell by a dB delta, reading the current level first.
    ///
    /// A fully muted cell reads as [`MUTE_FLOOR`], so a large enough
    /// positive delta can bring it back.
    ///
    /// # Errors
    ///
    /// Fails like [`write_parameter`](Self::write_parameter), and with a
    /// type mismatch when the cell does not hold a fixed-point value.
    pub async fn adjust_volume_db(&self, name: &str, delta_db: f64) -> Result<f64> {
        let current = match self.read_parameter(name).await? {
            ParameterValue::Float(v) => v,
            other => {
                return Err(sigma_params::ParamsError::type_mismatch(
                    "fixed-point volume",
                    other.type_name(),
                )
                .into());
            }
        };
        let db = linear_to_db(current.max(MUTE_FLOOR)) + delta_db;
        self.set_volume_db(name, db).await
    }

    /// The catalog row behind a name.
    ///
    /// # Errors
    ///
    /// Returns the catalog's unknown-parameter error for names not loaded.
    pub fn describe(&self, name: &str) -> Result<ParameterDescriptor> {
        Ok(self.catalog.current().resolve(name)?.clone())
    }

    /// Reverse lookup: the catalog row whose span starts at `address`.
    ///
    /// # Errors
    ///
    /// Returns the catalog's unknown-address error when no row starts
    /// there.
    pub fn describe_address(&self, address: u16) -> Result<ParameterDescriptor> {
        Ok(self.catalog.current().resolve_address(address)?.clone())
    }

    /// All loaded parameter names, sorted.
    pub fn names(&self) -> Vec<String> {
        let catalog = self.catalog.current();
        let mut names: Vec<String> = catalog.iter().map(|row| row.name.clone()).collect();
        names.sort();
        names
    }

    /// Rebuild the catalog from a file and swap it in.
    ///
    /// With no explicit `path` the translator rereads the file it was
    /// configured with. A failed load leaves the current catalog in place.
    /// Returns the row count of the new catalog.
    ///
    /// # Errors
    ///
    /// Fails when no source path is known or the file does not load into a
    /// valid catalog.
    pub fn reload(&self, path: Option<&Path>) -> Result<usize> {
        let path = path
            .or(self.catalog_path.as_deref())
            .ok_or_else(|| BridgeError::config("no parameter file configured to reload from"))?;
        let catalog = ParameterCatalog::from_file(path)?;
        let rows = catalog.len();
        self.catalog.swap(catalog);
        Ok(rows)
    }

    async fn write_row(&self, row: &ParameterDescriptor, bytes: Vec<u8>) -> Result<()> {
        if row.word_count == 1 {
            // A single word is atomic on its own; skip the safeload detour.
            self.handle
                .write_registers(row.address, Bytes::from(bytes))
                .await
        } else {
            let transaction = SafeloadTransaction::from_span(row.address, &bytes)?;
            self.handle.safeload(transaction).await
        }
    }
}

/// dB to linear gain.
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Linear gain to dB. Gains at or below [`MUTE_FLOOR`] read as its floor.
pub fn linear_to_db(linear: f64) -> f64 {
    20.0 * linear.max(MUTE_FLOOR).log10()
}
