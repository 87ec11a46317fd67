//! Atomic parameter updates through the safeload slots.
//!
//! The chip applies staged slot content at an audio frame boundary: the
//! host writes up to [`SAFELOAD_SLOT_COUNT`](regs::SAFELOAD_SLOT_COUNT)
//! `(address, word)` pairs into the slots, writes the pending count, then
//! pulses the load trigger in the core control register. The staged words
//! land together, so a multi-word coefficient set never tears mid-update.

use std::thread;
use std::time::{Duration, Instant};

use crate::error::{BridgeError, Result};
use crate::transport::BusTransport;
use sigma_chip::regs::{self, core_control, timing, WORD_BYTES};

/// A staged set of word writes that will land in one audio frame.
///
/// Pairs must form a single ascending contiguous span; both constructors
/// enforce that and the slot-count ceiling before anything reaches the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeloadTransaction {
    slots: Vec<(u16, [u8; WORD_BYTES])>,
}

impl SafeloadTransaction {
    /// An empty transaction. Committing it touches nothing.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Stage a contiguous span of whole words starting at `address`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidLength`] unless `data` is a non-empty whole
    /// number of words inside the address space;
    /// [`BridgeError::TransactionTooLarge`] when the span needs more slots
    /// than the chip has. Both fire before any bus traffic.
    pub fn from_span(address: u16, data: &[u8]) -> Result<Self> {
        if data.is_empty() || data.len() % WORD_BYTES != 0 {
            return Err(BridgeError::invalid_length(
                data.len(),
                "safeload data must be a non-empty whole number of words",
            ));
        }
        let words = data.len() / WORD_BYTES;
        if words > regs::SAFELOAD_SLOT_COUNT {
            return Err(BridgeError::TransactionTooLarge {
                words,
                limit: regs::SAFELOAD_SLOT_COUNT,
            });
        }
        if u32::from(address) + words as u32 - 1 > u32::from(u16::MAX) {
            return Err(BridgeError::invalid_length(
                data.len(),
                "span leaves the 16-bit address space",
            ));
        }

        let mut transaction = Self::new();
        for (index, word) in data.chunks_exact(WORD_BYTES).enumerate() {
            let mut bytes = [0u8; WORD_BYTES];
            bytes.copy_from_slice(word);
            transaction.push(address + index as u16, bytes)?;
        }
        Ok(transaction)
    }

    /// Stage one `(address, word)` pair.
    ///
    /// # Errors
    ///
    /// [`BridgeError::TransactionTooLarge`] when all slots are taken,
    /// [`BridgeError::MalformedTransaction`] when `address` does not
    /// continue the span.
    pub fn push(&mut self, address: u16, word: [u8; WORD_BYTES]) -> Result<()> {
        if self.slots.len() == regs::SAFELOAD_SLOT_COUNT {
            return Err(BridgeError::TransactionTooLarge {
                words: self.slots.len() + 1,
                limit: regs::SAFELOAD_SLOT_COUNT,
            });
        }
        if let Some(&(first, _)) = self.slots.first() {
            let expected = first.wrapping_add(self.slots.len() as u16);
            if address != expected {
                return Err(BridgeError::malformed_transaction(format!(
                    "expected contiguous address 0x{expected:04x}, got 0x{address:04x}"
                )));
            }
        }
        self.slots.push((address, word));
        Ok(())
    }

    /// Number of staged words.
    pub fn word_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// First staged address, if any.
    pub fn base_address(&self) -> Option<u16> {
        self.slots.first().map(|&(address, _)| address)
    }

    /// The staged pairs in commit order.
    pub fn slots(&self) -> &[(u16, [u8; WORD_BYTES])] {
        &self.slots
    }
}

impl Default for SafeloadTransaction {
    fn default() -> Self {
        Self::new()
    }
}

/// Put a staged transaction on the bus and trigger the load.
///
/// The sequence is one slot write per staged word, the pending count, then
/// the trigger bit, followed by a settle wait covering the audio frame in
/// which the chip consumes the slots. The transaction is consumed: a
/// commit happens exactly once.
///
/// # Errors
///
/// Bus errors from any of the writes. A failed slot or count write leaves
/// the trigger untouched, so nothing lands in parameter RAM.
pub fn commit(transaction: SafeloadTransaction, bus: &mut dyn BusTransport) -> Result<()> {
    if transaction.is_empty() {
        tracing::debug!("Empty safeload transaction, nothing to commit");
        return Ok(());
    }

    let started = Instant::now();
    let words = transaction.word_count();

    for (slot, &(address, word)) in transaction.slots().iter().enumerate() {
        let mut pair = [0u8; 2 * WORD_BYTES];
        pair[..WORD_BYTES].copy_from_slice(&u32::from(address).to_be_bytes());
        pair[WORD_BYTES..].copy_from_slice(&word);
        bus.write(regs::safeload_slot(slot), &pair)?;
    }

    bus.write(regs::SAFELOAD_PENDING, &(words as u32).to_be_bytes())?;
    bus.write(
        regs::CORE_CONTROL,
        &(core_control::RUN | core_control::IST).to_be_bytes(),
    )?;

    thread::sleep(Duration::from_micros(timing::SAFELOAD_SETTLE_US));
    tracing::debug!("Safeload of {words} words committed in {:?}", started.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transports::MockTransport;

    #[test]
    fn three_word_commit_is_slots_count_trigger() {
        let mut bus = MockTransport::new();
        let probe = bus.probe();

        let data = [
            0x00, 0x00, 0x00, 0x01, //
            0x00, 0x00, 0x00, 0x02, //
            0x00, 0x00, 0x00, 0x03,
        ];
        let transaction = SafeloadTransaction::from_span(0x0100, &data).unwrap();
        commit(transaction, &mut bus).unwrap();

        let writes = probe.writes();
        assert_eq!(writes.len(), 5);
        assert_eq!(
            writes[0],
            (
                regs::safeload_slot(0),
                vec![0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01]
            )
        );
        assert_eq!(
            writes[1],
            (
                regs::safeload_slot(1),
                vec![0x00, 0x00, 0x01, 0x01, 0x00, 0x00, 0x00, 0x02]
            )
        );
        assert_eq!(
            writes[2],
            (
                regs::safeload_slot(2),
                vec![0x00, 0x00, 0x01, 0x02, 0x00, 0x00, 0x00, 0x03]
            )
        );
        assert_eq!(writes[3], (regs::SAFELOAD_PENDING, vec![0, 0, 0, 3]));
        assert_eq!(writes[4], (regs::CORE_CONTROL, vec![0x00, 0x21]));
    }

    #[test]
    fn oversized_span_rejected_before_any_bus_write() {
        let bus = MockTransport::new();
        let probe = bus.probe();

        let err = SafeloadTransaction::from_span(0x0100, &[0u8; 6 * WORD_BYTES]).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::TransactionTooLarge { words: 6, limit: 5 }
        ));
        assert!(probe.ops().is_empty());
    }

    #[test]
    fn five_words_fill_every_slot() {
        let mut bus = MockTransport::new();
        let probe = bus.probe();

        let transaction = SafeloadTransaction::from_span(0x0200, &[0u8; 5 * WORD_BYTES]).unwrap();
        commit(transaction, &mut bus).unwrap();

        let writes = probe.writes();
        assert_eq!(writes.len(), 7);
        assert_eq!(writes[4].0, regs::safeload_slot(4));
        assert_eq!(writes[5], (regs::SAFELOAD_PENDING, vec![0, 0, 0, 5]));
    }

    #[test]
    fn empty_commit_touches_nothing() {
        let mut bus = MockTransport::new();
        let probe = bus.probe();
        commit(SafeloadTransaction::new(), &mut bus).unwrap();
        assert!(probe.ops().is_empty());
    }

    #[test]
    fn pairs_must_stay_contiguous() {
        let mut transaction = SafeloadTransaction::new();
        transaction.push(0x0010, [0; 4]).unwrap();
        transaction.push(0x0011, [0; 4]).unwrap();
        assert!(matches!(
            transaction.push(0x0013, [0; 4]),
            Err(BridgeError::MalformedTransaction { .. })
        ));
    }

    #[test]
    fn sixth_push_overflows_the_slots() {
        let mut transaction = SafeloadTransaction::new();
        for i in 0..5 {
            transaction.push(0x0010 + i, [0; 4]).unwrap();
        }
        assert!(matches!(
            transaction.push(0x0015, [0; 4]),
            Err(BridgeError::TransactionTooLarge { .. })
        ));
    }

    #[test]
    fn bus_failure_leaves_the_trigger_untouched() {
        let mut bus = MockTransport::new();
        let probe = bus.probe();
        probe.fail_next("wire glitch");

        let transaction =
            SafeloadTransaction::from_span(0x0100, &[0u8; 2 * WORD_BYTES]).unwrap();
        assert!(commit(transaction, &mut bus).is_err());

        assert!(probe
            .writes()
            .iter()
            .all(|(address, _)| *address != regs::CORE_CONTROL));
    }

    #[test]
    fn span_matches_catalog_word_count() {
        let transaction = SafeloadTransaction::from_span(0x0042, &[0u8; 3 * WORD_BYTES]).unwrap();
        assert_eq!(transaction.word_count(), 3);
        assert_eq!(transaction.base_address(), Some(0x0042));
    }
}
