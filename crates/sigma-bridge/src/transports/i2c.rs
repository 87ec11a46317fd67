//! I2C transport over a `/dev/i2c-B` adapter.
//!
//! Writes are the 2-byte register address followed by payload, sent through
//! the claimed-slave `write(2)` path. Reads are a combined `I2C_RDWR`
//! transaction: an address write, then a repeated-start read, so another
//! master cannot clobber the register pointer between the two halves.
//!
//! Transfers longer than one adapter message are chunked at
//! [`I2C_MAX_PAYLOAD_BYTES`] and the register address advances by
//! [`I2C_MAX_PAYLOAD_WORDS`] per message.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::fd::AsRawFd;
use std::path::PathBuf;

use crate::error::{BridgeError, Result};
use crate::transport::{validate_transfer, BusKind, BusTransport};
use sigma_chip::frame::{i2c_address, I2C_MAX_PAYLOAD_BYTES, I2C_MAX_PAYLOAD_WORDS};

// i2c-dev ioctl opcodes, from linux/i2c-dev.h.
const I2C_SLAVE: libc::c_ulong = 0x0703;
const I2C_RDWR: libc::c_ulong = 0x0707;
const I2C_M_RD: u16 = 0x0001;

/// `struct i2c_msg` from the kernel ABI.
#[repr(C)]
struct I2cMsg {
    addr: u16,
    flags: u16,
    len: u16,
    buf: *mut u8,
}

/// `struct i2c_rdwr_ioctl_data` from the kernel ABI.
#[repr(C)]
struct I2cRdwrIoctlData {
    msgs: *mut I2cMsg,
    nmsgs: u32,
}

/// I2C connection to the DSP.
pub struct I2cTransport {
    file: File,
    path: PathBuf,
    chip_address: u16,
}

impl fmt::Debug for I2cTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("I2cTransport")
            .field("path", &self.path)
            .field("chip_address", &format_args!("0x{:02x}", self.chip_address))
            .finish_non_exhaustive()
    }
}

impl I2cTransport {
    /// Open `/dev/i2c-B` and claim the chip at `chip_address`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::DeviceNotFound`] when the adapter node is missing,
    /// [`BridgeError::Bus`] when the slave address cannot be claimed.
    pub fn open(bus: u8, chip_address: u16) -> Result<Self> {
        let path = PathBuf::from(format!("/dev/i2c-{bus}"));
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

        // SAFETY: fd is a valid i2c-dev descriptor owned by file; I2C_SLAVE
        // takes the chip address as its argument word, no pointers involved.
        let rc = unsafe { libc::ioctl(file.as_raw_fd(), I2C_SLAVE, libc::c_ulong::from(chip_address)) };
        if rc < 0 {
            return Err(BridgeError::bus(format!(
                "claiming chip 0x{chip_address:02x} on {}: {}",
                path.display(),
                std::io::Error::last_os_error()
            )));
        }

        tracing::info!(
            "Opened I2C device {} (chip 0x{chip_address:02x})",
            path.display()
        );
        Ok(Self {
            file,
            path,
            chip_address,
        })
    }
}

impl BusTransport for I2cTransport {
    fn read(&mut self, address: u16, length: usize) -> Result<Vec<u8>> {
        validate_transfer(address, length)?;

        let mut out = Vec::with_capacity(length);
        let mut address = address;
        let mut remaining = length;
        while remaining > 0 {
            let take = remaining.min(I2C_MAX_PAYLOAD_BYTES);
            let mut pointer = i2c_address(address);
            let mut buffer = vec![0u8; take];

            let mut msgs = [
                I2cMsg {
                    addr: self.chip_address,
                    flags: 0,
                    len: pointer.len() as u16,
                    buf: pointer.as_mut_ptr(),
                },
                I2cMsg {
                    addr: self.chip_address,
                    flags: I2C_M_RD,
                    len: take as u16,
                    buf: buffer.as_mut_ptr(),
                },
            ];
            let request = I2cRdwrIoctlData {
                msgs: msgs.as_mut_ptr(),
                nmsgs: msgs.len() as u32,
            };

            // SAFETY: request points at msgs, which point at pointer and
            // buffer; all outlive the ioctl and carry their true lengths.
            let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), I2C_RDWR, &request) };
            if rc < 0 {
                return Err(BridgeError::bus(format!(
                    "I2C read at 0x{address:04x}: {}",
                    std::io::Error::last_os_error()
                )));
            }

            out.extend_from_slice(&buffer);
            remaining -= take;
            address = address.wrapping_add(I2C_MAX_PAYLOAD_WORDS as u16);
        }
        Ok(out)
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<()> {
        validate_transfer(address, data.len())?;

        let mut address = address;
        let mut offset = 0usize;
        while offset < data.len() {
            let take = (data.len() - offset).min(I2C_MAX_PAYLOAD_BYTES);
            let chunk = &data[offset..offset + take];

            let mut frame = Vec::with_capacity(2 + chunk.len());
            frame.extend_from_slice(&i2c_address(address));
            frame.extend_from_slice(chunk);

            let written = rustix::io::write(&self.file, &frame).map_err(|err| {
                BridgeError::bus(format!("I2C write at 0x{address:04x}: {err}"))
            })?;
            if written != frame.len() {
                return Err(BridgeError::bus(format!(
                    "short I2C write at 0x{address:04x}: {written} of {} bytes",
                    frame.len()
                )));
            }

            offset += take;
            address = address.wrapping_add(I2C_MAX_PAYLOAD_WORDS as u16);
        }
        Ok(())
    }

    fn kind(&self) -> BusKind {
        BusKind::I2c
    }
}

impl Drop for I2cTransport {
    fn drop(&mut self) {
        tracing::debug!("Closing I2C device {}", self.path.display());
    }
}
