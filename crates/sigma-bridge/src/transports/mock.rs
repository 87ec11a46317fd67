//! In-memory transport for tests and development hosts.
//!
//! The mock keeps a sparse byte image of the register file and a log of
//! every bus operation in arrival order. A [`MockProbe`] observes both from
//! outside while the device owns the transport itself, and can inject a
//! one-shot fault into the next operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{BridgeError, Result};
use crate::transport::{validate_transfer, BusKind, BusTransport};

/// One recorded bus operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    /// A read of `length` bytes from `address`.
    Read {
        /// Start register address.
        address: u16,
        /// Length in bytes.
        length: usize,
    },
    /// A write of `data` to `address`.
    Write {
        /// Start register address.
        address: u16,
        /// Bytes written.
        data: Vec<u8>,
    },
}

#[derive(Debug, Default)]
struct MockState {
    memory: HashMap<u32, u8>,
    ops: Vec<BusOp>,
    fail_next: Option<String>,
}

/// Transport backed by an in-memory register image.
///
/// Unwritten registers read back as zero, like cleared parameter RAM.
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    in_flight: Arc<AtomicBool>,
}

// Word addresses are 4 bytes apart in the byte image; a 2-byte control
// register only occupies the first half of its word.
fn byte_key(address: u16, offset: usize) -> u32 {
    u32::from(address) * 4 + offset as u32
}

// Trips when two operations are on the "wire" at once. The bus domain is
// single-owner; overlap means the serialization layer above is broken.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        assert!(
            !flag.swap(true, Ordering::SeqCst),
            "overlapping bus access: the bus domain must be single-owner"
        );
        Self(flag)
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl MockTransport {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// A probe observing this transport's register image and operation log.
    pub fn probe(&self) -> MockProbe {
        MockProbe {
            state: Arc::clone(&self.state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BusTransport for MockTransport {
    fn read(&mut self, address: u16, length: usize) -> Result<Vec<u8>> {
        let _guard = FlightGuard::enter(&self.in_flight);
        validate_transfer(address, length)?;

        let mut state = self.lock();
        state.ops.push(BusOp::Read { address, length });
        if let Some(reason) = state.fail_next.take() {
            return Err(BridgeError::bus(reason));
        }

        Ok((0..length)
            .map(|i| {
                state
                    .memory
                    .get(&byte_key(address, i))
                    .copied()
                    .unwrap_or(0)
            })
            .collect())
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<()> {
        let _guard = FlightGuard::enter(&self.in_flight);
        validate_transfer(address, data.len())?;

        let mut state = self.lock();
        state.ops.push(BusOp::Write {
            address,
            data: data.to_vec(),
        });
        if let Some(reason) = state.fail_next.take() {
            return Err(BridgeError::bus(reason));
        }

        for (i, byte) in data.iter().enumerate() {
            state.memory.insert(byte_key(address, i), *byte);
        }
        Ok(())
    }

    fn kind(&self) -> BusKind {
        BusKind::Mock
    }
}

/// External view into a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockProbe {
    state: Arc<Mutex<MockState>>,
}

impl MockProbe {
    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Everything that reached the bus so far, in arrival order.
    ///
    /// Operations rejected by length validation never reach the bus and do
    /// not appear here; operations that failed on the wire do.
    pub fn ops(&self) -> Vec<BusOp> {
        self.lock().ops.clone()
    }

    /// Only the writes, as `(address, data)` pairs.
    pub fn writes(&self) -> Vec<(u16, Vec<u8>)> {
        self.lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                BusOp::Write { address, data } => Some((*address, data.clone())),
                BusOp::Read { .. } => None,
            })
            .collect()
    }

    /// Current content of `length` bytes at `address`.
    pub fn register(&self, address: u16, length: usize) -> Vec<u8> {
        let state = self.lock();
        (0..length)
            .map(|i| {
                state
                    .memory
                    .get(&byte_key(address, i))
                    .copied()
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Preload register content without logging an operation.
    pub fn seed(&self, address: u16, data: &[u8]) {
        let mut state = self.lock();
        for (i, byte) in data.iter().enumerate() {
            state.memory.insert(byte_key(address, i), *byte);
        }
    }

    /// Make the next bus operation fail with `reason`.
    pub fn fail_next(&self, reason: impl Into<String>) {
        self.lock().fail_next = Some(reason.into());
    }

    /// Drop the recorded operation log.
    pub fn clear_ops(&self) {
        self.lock().ops.clear();
    }
}
