//! Wire protocol of the vendor programmer tool.
//!
//! Every frame starts with a fixed 14-byte header; byte 0 selects the
//! command. All multi-byte integers are big-endian.
//!
//! ```text
//! Block / safeload write (0x09), header then payload:
//!   [0]       command
//!   [1]       1 = safeload, 0 = block write
//!   [2]       channel (carried, unused)
//!   [3..7]    total frame length
//!   [7]       chip address + r/w bit
//!   [8..12]   payload length
//!   [12..14]  register address
//!
//! Read request (0x0A), header only:
//!   [0]       command
//!   [1..5]    total frame length
//!   [5]       chip address
//!   [6..10]   read length
//!   [10..12]  register address
//!   [12..14]  padding
//!
//! Read response (0x0B), header then payload:
//!   [0]       command
//!   [1..5]    total frame length
//!   [5]       chip address (echoed)
//!   [6..10]   payload length
//!   [10..12]  register address
//!   [12]      status: 0 = success, 1 = bus failure
//!   [13]      reserved
//! ```

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{BridgeError, Result};
use crate::transport::MAX_TRANSFER_BYTES;

/// Fixed header size shared by every frame.
pub const HEADER_BYTES: usize = 14;

/// Block or safeload write, programmer to bridge.
pub const COMMAND_WRITE: u8 = 0x09;
/// Read request, programmer to bridge.
pub const COMMAND_READ: u8 = 0x0A;
/// Read response, bridge to programmer.
pub const COMMAND_READ_RESPONSE: u8 = 0x0B;

/// One parsed programmer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgrammerRequest {
    /// Write `data` at `address`, atomically when `safeload` is set.
    Write {
        /// Target register address.
        address: u16,
        /// Payload.
        data: Bytes,
        /// Explicit atomicity flag from the wire. Never inferred from the
        /// payload length.
        safeload: bool,
    },
    /// Read `length` bytes at `address`.
    Read {
        /// Source register address.
        address: u16,
        /// Requested length in bytes.
        length: usize,
        /// Chip address byte, echoed into the response.
        chip_address: u8,
    },
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Read one request frame. `Ok(None)` on a clean end of stream.
///
/// # Errors
///
/// [`BridgeError::Protocol`] on an unknown command byte or an absurd
/// length claim; [`BridgeError::Io`] when the peer dies mid-frame.
pub async fn read_request<S>(stream: &mut S) -> Result<Option<ProgrammerRequest>>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_BYTES];
    let first = stream.read(&mut header).await?;
    if first == 0 {
        return Ok(None);
    }
    stream.read_exact(&mut header[first..]).await?;

    match header[0] {
        COMMAND_WRITE => {
            let safeload = header[1] == 1;
            let length = be_u32(&header[8..12]) as usize;
            let address = u16::from_be_bytes([header[12], header[13]]);
            if length == 0 || length > MAX_TRANSFER_BYTES {
                return Err(BridgeError::protocol(format!(
                    "write of {length} bytes refused"
                )));
            }
            let mut data = vec![0u8; length];
            stream.read_exact(&mut data).await?;
            Ok(Some(ProgrammerRequest::Write {
                address,
                data: Bytes::from(data),
                safeload,
            }))
        }
        COMMAND_READ => {
            let chip_address = header[5];
            let length = be_u32(&header[6..10]) as usize;
            let address = u16::from_be_bytes([header[10], header[11]]);
            if length == 0 || length > MAX_TRANSFER_BYTES {
                return Err(BridgeError::protocol(format!(
                    "read of {length} bytes refused"
                )));
            }
            Ok(Some(ProgrammerRequest::Read {
                address,
                length,
                chip_address,
            }))
        }
        other => Err(BridgeError::protocol(format!(
            "unknown command byte 0x{other:02x}"
        ))),
    }
}

/// Encode a read response frame.
///
/// On failure the payload must be zero-filled by the caller and `success`
/// cleared; the frame keeps the length the programmer expects either way.
#[must_use]
pub fn encode_read_response(
    chip_address: u8,
    address: u16,
    payload: &[u8],
    success: bool,
) -> Vec<u8> {
    let total = HEADER_BYTES + payload.len();
    let mut frame = vec![0u8; total];
    frame[0] = COMMAND_READ_RESPONSE;
    frame[1..5].copy_from_slice(&(total as u32).to_be_bytes());
    frame[5] = chip_address;
    frame[6..10].copy_from_slice(&(payload.len() as u32).to_be_bytes());
    frame[10..12].copy_from_slice(&address.to_be_bytes());
    frame[12] = u8::from(!success);
    // frame[13] reserved, stays zero.
    frame[HEADER_BYTES..].copy_from_slice(payload);
    frame
}

/// Encode a write frame as the programmer would send it.
#[must_use]
pub fn encode_write(address: u16, data: &[u8], safeload: bool) -> Vec<u8> {
    let total = HEADER_BYTES + data.len();
    let mut frame = vec![0u8; total];
    frame[0] = COMMAND_WRITE;
    frame[1] = u8::from(safeload);
    frame[3..7].copy_from_slice(&(total as u32).to_be_bytes());
    frame[8..12].copy_from_slice(&(data.len() as u32).to_be_bytes());
    frame[12..14].copy_from_slice(&address.to_be_bytes());
    frame[HEADER_BYTES..].copy_from_slice(data);
    frame
}

/// Encode a read request frame as the programmer would send it.
#[must_use]
pub fn encode_read_request(address: u16, length: usize, chip_address: u8) -> Vec<u8> {
    let mut frame = vec![0u8; HEADER_BYTES];
    frame[0] = COMMAND_READ;
    frame[1..5].copy_from_slice(&(HEADER_BYTES as u32).to_be_bytes());
    frame[5] = chip_address;
    frame[6..10].copy_from_slice(&(length as u32).to_be_bytes());
    frame[10..12].copy_from_slice(&address.to_be_bytes());
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_frame_round_trips() {
        let frame = encode_write(0x0020, &[0x00, 0x40, 0x00, 0x00], false);
        let mut stream = frame.as_slice();

        let request = read_request(&mut stream).await.unwrap().unwrap();
        assert_eq!(
            request,
            ProgrammerRequest::Write {
                address: 0x0020,
                data: Bytes::from_static(&[0x00, 0x40, 0x00, 0x00]),
                safeload: false,
            }
        );
    }

    #[tokio::test]
    async fn safeload_comes_from_the_flag_not_the_length() {
        // One word with the flag set is still a safeload; twelve bytes
        // without the flag are still a block write.
        let flagged = encode_write(0x0100, &[0u8; 4], true);
        let mut stream = flagged.as_slice();
        let request = read_request(&mut stream).await.unwrap().unwrap();
        assert!(matches!(
            request,
            ProgrammerRequest::Write { safeload: true, .. }
        ));

        let unflagged = encode_write(0x0100, &[0u8; 12], false);
        let mut stream = unflagged.as_slice();
        let request = read_request(&mut stream).await.unwrap().unwrap();
        assert!(matches!(
            request,
            ProgrammerRequest::Write {
                safeload: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn read_frame_round_trips() {
        let frame = encode_read_request(0x5000, 8, 0x68);
        let mut stream = frame.as_slice();

        let request = read_request(&mut stream).await.unwrap().unwrap();
        assert_eq!(
            request,
            ProgrammerRequest::Read {
                address: 0x5000,
                length: 8,
                chip_address: 0x68,
            }
        );
    }

    #[tokio::test]
    async fn eof_at_a_frame_boundary_is_clean() {
        let mut stream: &[u8] = &[];
        assert_eq!(read_request(&mut stream).await.unwrap(), None);
    }

    #[tokio::test]
    async fn eof_mid_frame_is_an_error() {
        let frame = encode_write(0x0020, &[0u8; 4], false);
        let mut stream = &frame[..HEADER_BYTES - 3];
        assert!(matches!(
            read_request(&mut stream).await,
            Err(BridgeError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_command_rejected() {
        let mut stream: &[u8] = &[0xFF; HEADER_BYTES];
        assert!(matches!(
            read_request(&mut stream).await,
            Err(BridgeError::Protocol { .. })
        ));
    }

    #[tokio::test]
    async fn absurd_length_claims_rejected() {
        let mut frame = encode_read_request(0x0000, 4, 0);
        frame[6..10].copy_from_slice(&u32::MAX.to_be_bytes());
        let mut stream = frame.as_slice();
        assert!(matches!(
            read_request(&mut stream).await,
            Err(BridgeError::Protocol { .. })
        ));
    }

    #[test]
    fn response_layout_is_byte_exact() {
        let frame = encode_read_response(0x68, 0x0020, &[0xAA, 0xBB, 0xCC, 0xDD], true);
        assert_eq!(
            frame,
            vec![
                0x0B, // command
                0x00, 0x00, 0x00, 0x12, // total length 18
                0x68, // chip address
                0x00, 0x00, 0x00, 0x04, // payload length
                0x00, 0x20, // register address
                0x00, // success
                0x00, // reserved
                0xAA, 0xBB, 0xCC, 0xDD,
            ]
        );
    }

    #[test]
    fn failed_response_sets_the_status_byte() {
        let frame = encode_read_response(0x68, 0x0020, &[0u8; 4], false);
        assert_eq!(frame[12], 1);
        assert_eq!(&frame[HEADER_BYTES..], &[0u8; 4]);
    }
}
