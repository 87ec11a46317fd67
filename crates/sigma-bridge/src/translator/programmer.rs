//! Serves the raw-address programmer protocol on one connection.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::protocol::{self, ProgrammerRequest};
use crate::safeload::SafeloadTransaction;
use crate::worker::DspHandle;

/// Serve one programmer connection until the peer hangs up.
///
/// Read failures surface to the programmer through the response status
/// byte with a zero-filled payload, never by changing the frame length or
/// dropping the connection. Writes have no reply vehicle in the wire
/// protocol; their failures are logged and serving continues. Whether a
/// write goes through the safeload engine is decided by the frame's
/// explicit flag alone.
///
/// # Errors
///
/// Socket errors and malformed frames. Either way the connection is done;
/// an operation already handed to the bus worker still completes.
pub async fn serve_programmer<S>(mut stream: S, handle: DspHandle) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(request) = protocol::read_request(&mut stream).await? {
        match request {
            ProgrammerRequest::Write {
                address,
                data,
                safeload,
            } => {
                let result = if safeload {
                    match SafeloadTransaction::from_span(address, &data) {
                        Ok(transaction) => handle.safeload(transaction).await,
                        Err(err) => Err(err),
                    }
                } else {
                    handle.write_registers(address, data).await
                };
                if let Err(err) = result {
                    tracing::error!("Programmer write at 0x{address:04x} failed: {err}");
                }
            }
            ProgrammerRequest::Read {
                address,
                length,
                chip_address,
            } => {
                let response = match handle.read_registers(address, length).await {
                    Ok(payload) => {
                        protocol::encode_read_response(chip_address, address, &payload, true)
                    }
                    Err(err) => {
                        tracing::error!("Programmer read at 0x{address:04x} failed: {err}");
                        protocol::encode_read_response(chip_address, address, &vec![0u8; length], false)
                    }
                };
                stream.write_all(&response).await?;
            }
        }
    }
    tracing::debug!("Programmer disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SigmaDsp;
    use crate::pins::PinController;
    use crate::protocol::HEADER_BYTES;
    use crate::transports::{BusOp, MockProbe, MockTransport};
    use crate::worker;
    use sigma_chip::regs;
    use tokio::io::AsyncReadExt;

    fn bridge() -> (DspHandle, MockProbe) {
        let transport = MockTransport::new();
        let probe = transport.probe();
        let mut device = SigmaDsp::new(Box::new(transport), PinController::new());
        device.bring_up().unwrap();
        let (handle, _join) = worker::spawn(device).unwrap();
        (handle, probe)
    }

    #[tokio::test]
    async fn block_write_then_read_back() {
        let (handle, probe) = bridge();
        let (mut client, server) = tokio::io::duplex(4096);
        let task = tokio::spawn(serve_programmer(server, handle));

        client
            .write_all(&protocol::encode_write(0x0020, &[0x00, 0x40, 0x00, 0x00], false))
            .await
            .unwrap();
        client
            .write_all(&protocol::encode_read_request(0x0020, 4, 0x68))
            .await
            .unwrap();

        let mut response = vec![0u8; HEADER_BYTES + 4];
        client.read_exact(&mut response).await.unwrap();
        assert_eq!(
            response,
            protocol::encode_read_response(0x68, 0x0020, &[0x00, 0x40, 0x00, 0x00], true)
        );

        drop(client);
        task.await.unwrap().unwrap();
        assert_eq!(probe.writes(), vec![(0x0020, vec![0x00, 0x40, 0x00, 0x00])]);
    }

    #[tokio::test]
    async fn safeload_flag_routes_through_the_slots() {
        let (handle, probe) = bridge();
        let (mut client, server) = tokio::io::duplex(4096);
        tokio::spawn(serve_programmer(server, handle));

        let data = [
            0x00, 0x00, 0x00, 0x01, //
            0x00, 0x00, 0x00, 0x02, //
            0x00, 0x00, 0x00, 0x03,
        ];
        client
            .write_all(&protocol::encode_write(0x0100, &data, true))
            .await
            .unwrap();
        // A read on the same connection flushes: the loop serves in order.
        client
            .write_all(&protocol::encode_read_request(0x0100, 4, 0))
            .await
            .unwrap();
        let mut response = vec![0u8; HEADER_BYTES + 4];
        client.read_exact(&mut response).await.unwrap();

        let writes = probe.writes();
        assert_eq!(writes.len(), 5);
        assert_eq!(writes[0].0, regs::safeload_slot(0));
        assert_eq!(writes[2].0, regs::safeload_slot(2));
        assert_eq!(writes[3], (regs::SAFELOAD_PENDING, vec![0, 0, 0, 3]));
        assert_eq!(writes[4].0, regs::CORE_CONTROL);
    }

    #[tokio::test]
    async fn oversized_safeload_never_reaches_the_bus() {
        let (handle, probe) = bridge();
        let (mut client, server) = tokio::io::duplex(4096);
        tokio::spawn(serve_programmer(server, handle));

        client
            .write_all(&protocol::encode_write(0x0100, &[0u8; 24], true))
            .await
            .unwrap();
        client
            .write_all(&protocol::encode_read_request(0x0100, 4, 0))
            .await
            .unwrap();
        let mut response = vec![0u8; HEADER_BYTES + 4];
        client.read_exact(&mut response).await.unwrap();

        // Only the flushing read made it onto the bus.
        assert_eq!(probe.ops().len(), 1);
        assert!(matches!(probe.ops()[0], BusOp::Read { .. }));
    }

    #[tokio::test]
    async fn failed_read_reports_in_band() {
        let (handle, probe) = bridge();
        let (mut client, server) = tokio::io::duplex(4096);
        tokio::spawn(serve_programmer(server, handle));

        probe.fail_next("wire glitch");
        client
            .write_all(&protocol::encode_read_request(0x0040, 8, 0x68))
            .await
            .unwrap();

        let mut response = vec![0u8; HEADER_BYTES + 8];
        client.read_exact(&mut response).await.unwrap();
        assert_eq!(
            response,
            protocol::encode_read_response(0x68, 0x0040, &[0u8; 8], false)
        );
    }

    #[tokio::test]
    async fn unknown_command_ends_the_connection() {
        let (handle, _probe) = bridge();
        let (mut client, server) = tokio::io::duplex(4096);
        let task = tokio::spawn(serve_programmer(server, handle));

        client.write_all(&[0xFF; HEADER_BYTES]).await.unwrap();
        assert!(task.await.unwrap().is_err());

        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }
}
