//! SPI transport over a `spidev` character device.
//!
//! Writes go through the descriptor as plain half-duplex `write(2)` calls;
//! reads need the full-duplex `SPI_IOC_MESSAGE` ioctl, because the chip
//! clocks register content out while the request bytes clock in.
//!
//! Transfers longer than one bus frame are chunked at
//! [`SPI_MAX_PAYLOAD_BYTES`] and the register address advances by
//! [`SPI_MAX_PAYLOAD_WORDS`] per frame.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::fd::AsRawFd;
use std::path::PathBuf;

use crate::error::{BridgeError, Result};
use crate::transport::{validate_transfer, BusKind, BusTransport};
use sigma_chip::frame::{
    spi_header, SPI_HEADER_BYTES, SPI_MAX_PAYLOAD_BYTES, SPI_MAX_PAYLOAD_WORDS, SPI_MAX_SPEED_HZ,
    SPI_READ, SPI_WRITE,
};

// spidev ioctl opcodes, from linux/spi/spidev.h.
const SPI_IOC_WR_MODE: libc::c_ulong = 0x4001_6B01;
const SPI_IOC_WR_BITS_PER_WORD: libc::c_ulong = 0x4001_6B03;
const SPI_IOC_WR_MAX_SPEED_HZ: libc::c_ulong = 0x4004_6B04;
const SPI_IOC_MESSAGE_1: libc::c_ulong = 0x4020_6B00;

/// `struct spi_ioc_transfer` from the kernel ABI.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct SpiIocTransfer {
    tx_buf: u64,
    rx_buf: u64,
    len: u32,
    // Zero means "use the values configured at open".
    speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    cs_change: u8,
    tx_nbits: u8,
    rx_nbits: u8,
    word_delay_usecs: u8,
    pad: u8,
}

/// SPI connection to the DSP.
pub struct SpiTransport {
    file: File,
    path: PathBuf,
}

impl fmt::Debug for SpiTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpiTransport")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SpiTransport {
    /// Open `/dev/spidevB.C` and configure it for the chip: mode 0,
    /// 8 bits per word, [`SPI_MAX_SPEED_HZ`] clock.
    ///
    /// # Errors
    ///
    /// [`BridgeError::DeviceNotFound`] when the node is missing,
    /// [`BridgeError::Bus`] when configuration ioctls fail.
    pub fn open(bus: u8, chip_select: u8) -> Result<Self> {
        let path = PathBuf::from(format!("/dev/spidev{bus}.{chip_select}"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|err| {
                if err.kind() == ErrorKind::NotFound {
                    BridgeError::device_not_found(&path)
                } else {
                    BridgeError::Io { source: err }
                }
            })?;

        let transport = Self { file, path };
        transport.configure()?;
        tracing::info!(
            "Opened SPI device {} at {} Hz",
            transport.path.display(),
            SPI_MAX_SPEED_HZ
        );
        Ok(transport)
    }

    fn configure(&self) -> Result<()> {
        let fd = self.file.as_raw_fd();
        let mode: u8 = 0;
        let bits: u8 = 8;
        let speed: u32 = SPI_MAX_SPEED_HZ;

        // SAFETY: fd is a valid spidev descriptor owned by self.file, and
        // each argument points at a live local of the type the opcode
        // encodes (u8 for mode and bits, u32 for speed).
        let rc = unsafe { libc::ioctl(fd, SPI_IOC_WR_MODE, &mode) };
        if rc < 0 {
            return Err(self.config_error("SPI_IOC_WR_MODE"));
        }
        // SAFETY: as above.
        let rc = unsafe { libc::ioctl(fd, SPI_IOC_WR_BITS_PER_WORD, &bits) };
        if rc < 0 {
            return Err(self.config_error("SPI_IOC_WR_BITS_PER_WORD"));
        }
        // SAFETY: as above.
        let rc = unsafe { libc::ioctl(fd, SPI_IOC_WR_MAX_SPEED_HZ, &speed) };
        if rc < 0 {
            return Err(self.config_error("SPI_IOC_WR_MAX_SPEED_HZ"));
        }
        Ok(())
    }

    fn config_error(&self, what: &str) -> BridgeError {
        BridgeError::bus(format!(
            "{what} on {}: {}",
            self.path.display(),
            std::io::Error::last_os_error()
        ))
    }
}

impl BusTransport for SpiTransport {
    fn read(&mut self, address: u16, length: usize) -> Result<Vec<u8>> {
        validate_transfer(address, length)?;

        let mut out = Vec::with_capacity(length);
        let mut address = address;
        let mut remaining = length;
        while remaining > 0 {
            let take = remaining.min(SPI_MAX_PAYLOAD_BYTES);
            let total = SPI_HEADER_BYTES + take;

            let mut tx = vec![0u8; total];
            tx[..SPI_HEADER_BYTES].copy_from_slice(&spi_header(SPI_READ, address));
            let mut rx = vec![0u8; total];

            let transfer = SpiIocTransfer {
                tx_buf: tx.as_ptr() as u64,
                rx_buf: rx.as_mut_ptr() as u64,
                len: total as u32,
                ..SpiIocTransfer::default()
            };

            // SAFETY: the transfer struct points at tx and rx, which both
            // stay alive and `total` bytes long until the ioctl returns.
            let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), SPI_IOC_MESSAGE_1, &transfer) };
            if rc < 0 {
                return Err(BridgeError::bus(format!(
                    "SPI read at 0x{address:04x}: {}",
                    std::io::Error::last_os_error()
                )));
            }

            out.extend_from_slice(&rx[SPI_HEADER_BYTES..]);
            remaining -= take;
            address = address.wrapping_add(SPI_MAX_PAYLOAD_WORDS as u16);
        }
        Ok(out)
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<()> {
        validate_transfer(address, data.len())?;

        let mut address = address;
        let mut offset = 0usize;
        while offset < data.len() {
            let take = (data.len() - offset).min(SPI_MAX_PAYLOAD_BYTES);
            let chunk = &data[offset..offset + take];

            let mut frame = Vec::with_capacity(SPI_HEADER_BYTES + chunk.len());
            frame.extend_from_slice(&spi_header(SPI_WRITE, address));
            frame.extend_from_slice(chunk);

            let written = rustix::io::write(&self.file, &frame).map_err(|err| {
                BridgeError::bus(format!("SPI write at 0x{address:04x}: {err}"))
            })?;
            if written != frame.len() {
                return Err(BridgeError::bus(format!(
                    "short SPI write at 0x{address:04x}: {written} of {} bytes",
                    frame.len()
                )));
            }

            offset += take;
            address = address.wrapping_add(SPI_MAX_PAYLOAD_WORDS as u16);
        }
        Ok(())
    }

    fn kind(&self) -> BusKind {
        BusKind::Spi
    }
}

impl Drop for SpiTransport {
    fn drop(&mut self) {
        tracing::debug!("Closing SPI device {}", self.path.display());
    }
}
