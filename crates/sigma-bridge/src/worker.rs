//! The single-owner bus domain.
//!
//! One worker thread owns the [`SigmaDsp`]; everything else holds a
//! cloneable [`DspHandle`] and sends commands over a channel. Requests are
//! served strictly in arrival order, one at a time, so transactions from
//! different clients never interleave on the bus. A client that goes away
//! mid-request abandons only its reply; the operation itself still runs to
//! completion.

use std::thread;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::device::SigmaDsp;
use crate::error::{BridgeError, Result};
use crate::safeload::SafeloadTransaction;

/// How long a handle waits for its reply before giving up.
///
/// The worker may still be grinding through a long program download when
/// this fires; the timeout abandons the reply, never the operation.
pub const REPLY_DEADLINE: Duration = Duration::from_secs(2);

const COMMAND_QUEUE_DEPTH: usize = 64;

#[derive(Debug)]
enum Command {
    Read {
        address: u16,
        length: usize,
        reply: oneshot::Sender<Result<Vec<u8>>>,
    },
    Write {
        address: u16,
        data: Bytes,
        reply: oneshot::Sender<Result<()>>,
    },
    Safeload {
        transaction: SafeloadTransaction,
        reply: oneshot::Sender<Result<()>>,
    },
    SoftReset {
        reply: oneshot::Sender<Result<()>>,
    },
    HardReset {
        reply: oneshot::Sender<Result<()>>,
    },
    SetSelfBoot {
        engaged: bool,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Cloneable async handle to the bus worker.
#[derive(Debug, Clone)]
pub struct DspHandle {
    commands: mpsc::Sender<Command>,
}

/// Spawn the bus worker thread around an opened device.
///
/// Returns the first handle and the worker's join handle. The worker runs
/// until every [`DspHandle`] clone is dropped.
///
/// # Errors
///
/// [`BridgeError::Io`] when the OS refuses a new thread.
pub fn spawn(device: SigmaDsp) -> Result<(DspHandle, thread::JoinHandle<()>)> {
    let (commands, receiver) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let join = thread::Builder::new()
        .name("sigma-bus".into())
        .spawn(move || run(device, receiver))?;
    Ok((DspHandle { commands }, join))
}

fn run(mut device: SigmaDsp, mut commands: mpsc::Receiver<Command>) {
    while let Some(command) = commands.blocking_recv() {
        // A dropped reply receiver means the client went away. The
        // operation has already run by then and is not rolled back.
        match command {
            Command::Read {
                address,
                length,
                reply,
            } => {
                let _ = reply.send(device.read_registers(address, length));
            }
            Command::Write {
                address,
                data,
                reply,
            } => {
                let _ = reply.send(device.write_registers(address, &data));
            }
            Command::Safeload { transaction, reply } => {
                let _ = reply.send(device.safeload(transaction));
            }
            Command::SoftReset { reply } => {
                let _ = reply.send(device.soft_reset());
            }
            Command::HardReset { reply } => {
                let _ = reply.send(device.hard_reset());
            }
            Command::SetSelfBoot { engaged, reply } => {
                let _ = reply.send(device.set_self_boot(engaged));
            }
        }
    }
    tracing::debug!("All handles dropped, bus worker shutting down");
}

impl DspHandle {
    async fn roundtrip<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (reply, receiver) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| BridgeError::WorkerGone)?;

        match tokio::time::timeout(REPLY_DEADLINE, receiver).await {
            Err(_) => Err(BridgeError::Timeout {
                duration_ms: REPLY_DEADLINE.as_millis() as u64,
            }),
            Ok(Err(_)) => Err(BridgeError::WorkerGone),
            Ok(Ok(result)) => result,
        }
    }

    /// Read registers. See [`SigmaDsp::read_registers`].
    ///
    /// # Errors
    ///
    /// Device errors, [`BridgeError::Timeout`] past the reply deadline,
    /// [`BridgeError::WorkerGone`] after shutdown.
    pub async fn read_registers(&self, address: u16, length: usize) -> Result<Vec<u8>> {
        self.roundtrip(|reply| Command::Read {
            address,
            length,
            reply,
        })
        .await
    }

    /// Write registers. See [`SigmaDsp::write_registers`].
    ///
    /// # Errors
    ///
    /// Same contract as [`read_registers`](Self::read_registers).
    pub async fn write_registers(&self, address: u16, data: Bytes) -> Result<()> {
        self.roundtrip(|reply| Command::Write {
            address,
            data,
            reply,
        })
        .await
    }

    /// Commit a safeload transaction. See [`SigmaDsp::safeload`].
    ///
    /// # Errors
    ///
    /// Same contract as [`read_registers`](Self::read_registers).
    pub async fn safeload(&self, transaction: SafeloadTransaction) -> Result<()> {
        self.roundtrip(|reply| Command::Safeload { transaction, reply })
            .await
    }

    /// Soft-reset the core. See [`SigmaDsp::soft_reset`].
    ///
    /// # Errors
    ///
    /// Same contract as [`read_registers`](Self::read_registers).
    pub async fn soft_reset(&self) -> Result<()> {
        self.roundtrip(|reply| Command::SoftReset { reply }).await
    }

    /// Hard-reset through the pin. See [`SigmaDsp::hard_reset`].
    ///
    /// # Errors
    ///
    /// Same contract as [`read_registers`](Self::read_registers).
    pub async fn hard_reset(&self) -> Result<()> {
        self.roundtrip(|reply| Command::HardReset { reply }).await
    }

    /// Drive the self-boot pin. See [`SigmaDsp::set_self_boot`].
    ///
    /// # Errors
    ///
    /// Same contract as [`read_registers`](Self::read_registers).
    pub async fn set_self_boot(&self, engaged: bool) -> Result<()> {
        self.roundtrip(|reply| Command::SetSelfBoot { engaged, reply })
            .await
    }
}
