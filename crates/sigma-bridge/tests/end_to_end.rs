//! Full-stack tests: real TCP clients in, mock bus out.

use std::io::Write as _;
use std::net::SocketAddr;
use std::time::Duration;

use sigma_bridge::transports::BusOp;
use sigma_bridge::{
    protocol, server, worker, MockProbe, MockTransport, NamedTranslator, PinController,
    SharedCatalog, SigmaDsp,
};
use sigma_chip::regs;
use sigma_params::{Encoding, ParameterCatalog, ParameterDescriptor, NATIVE_ENCODING};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

struct Bridge {
    programmer_addr: SocketAddr,
    control_addr: SocketAddr,
    probe: MockProbe,
}

fn row(name: &str, address: u16, word_count: usize, encoding: Encoding) -> ParameterDescriptor {
    ParameterDescriptor {
        name: name.to_string(),
        address,
        word_count,
        encoding,
        alias: false,
        cell: None,
    }
}

async fn start_bridge(ready: bool) -> Bridge {
    let transport = MockTransport::new();
    let probe = transport.probe();
    let mut device = SigmaDsp::new(Box::new(transport), PinController::new());
    if ready {
        device.bring_up().unwrap();
    }
    let (handle, _join) = worker::spawn(device).unwrap();

    let catalog = ParameterCatalog::new(vec![
        row("master_volume", 0x0020, 1, NATIVE_ENCODING),
        row("crossover", 0x0100, 3, NATIVE_ENCODING),
        row("mute", 0x0200, 1, Encoding::Switch),
    ])
    .unwrap();
    let translator = NamedTranslator::new(handle.clone(), SharedCatalog::new(catalog));

    let programmer = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let control = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let programmer_addr = programmer.local_addr().unwrap();
    let control_addr = control.local_addr().unwrap();
    tokio::spawn(server::serve(programmer, control, handle, translator));

    Bridge {
        programmer_addr,
        control_addr,
        probe,
    }
}

async fn control_roundtrip(stream: &mut BufReader<TcpStream>, request: &str) -> serde_json::Value {
    stream.get_mut().write_all(request.as_bytes()).await.unwrap();
    stream.get_mut().write_all(b"\n").await.unwrap();
    let mut line = String::new();
    stream.read_line(&mut line).await.unwrap();
    serde_json::from_str(&line).unwrap()
}

async fn wait_for(what: &str, check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn programmer_write_then_read_cycle() {
    let bridge = start_bridge(true).await;
    let mut stream = TcpStream::connect(bridge.programmer_addr).await.unwrap();

    stream
        .write_all(&protocol::encode_write(0x0020, &[0x00, 0x40, 0x00, 0x00], false))
        .await
        .unwrap();
    stream
        .write_all(&protocol::encode_read_request(0x0020, 4, 0x68))
        .await
        .unwrap();

    let mut response = vec![0u8; protocol::HEADER_BYTES + 4];
    stream.read_exact(&mut response).await.unwrap();
    assert_eq!(
        response,
        protocol::encode_read_response(0x68, 0x0020, &[0x00, 0x40, 0x00, 0x00], true)
    );
}

#[tokio::test]
async fn flagged_write_lands_through_the_safeload_slots() {
    let bridge = start_bridge(true).await;
    let mut stream = TcpStream::connect(bridge.programmer_addr).await.unwrap();

    let data = [
        0x00, 0x00, 0x00, 0x01, //
        0x00, 0x00, 0x00, 0x02, //
        0x00, 0x00, 0x00, 0x03,
    ];
    stream
        .write_all(&protocol::encode_write(0x0100, &data, true))
        .await
        .unwrap();
    stream
        .write_all(&protocol::encode_read_request(0x0100, 4, 0))
        .await
        .unwrap();
    let mut response = vec![0u8; protocol::HEADER_BYTES + 4];
    stream.read_exact(&mut response).await.unwrap();

    let writes = bridge.probe.writes();
    assert_eq!(writes.len(), 5);
    assert_eq!(
        writes[0],
        (
            regs::safeload_slot(0),
            vec![0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01]
        )
    );
    assert_eq!(writes[3], (regs::SAFELOAD_PENDING, vec![0, 0, 0, 3]));
    assert_eq!(writes[4], (regs::CORE_CONTROL, vec![0x00, 0x21]));
}

#[tokio::test]
async fn named_volume_write_is_one_exact_bus_write() {
    let bridge = start_bridge(true).await;
    let stream = TcpStream::connect(bridge.control_addr).await.unwrap();
    let mut stream = BufReader::new(stream);

    let reply = control_roundtrip(
        &mut stream,
        r#"{"op": "write_parameter", "name": "master_volume", "value": 0.5}"#,
    )
    .await;
    assert_eq!(reply["status"], "ok");
    assert_eq!(reply["clamped"], false);
    assert_eq!(
        bridge.probe.writes(),
        vec![(0x0020, vec![0x00, 0x40, 0x00, 0x00])]
    );
}

#[tokio::test]
async fn named_read_decodes_seeded_registers() {
    let bridge = start_bridge(true).await;
    bridge.probe.seed(0x0020, &[0x00, 0x40, 0x00, 0x00]);
    let stream = TcpStream::connect(bridge.control_addr).await.unwrap();
    let mut stream = BufReader::new(stream);

    let reply = control_roundtrip(
        &mut stream,
        r#"{"op": "read_parameter", "name": "master_volume"}"#,
    )
    .await;
    assert_eq!(reply["status"], "ok");
    assert_eq!(reply["value"], 0.5);
}

#[tokio::test]
async fn unknown_parameter_is_an_error_without_bus_traffic() {
    let bridge = start_bridge(true).await;
    let stream = TcpStream::connect(bridge.control_addr).await.unwrap();
    let mut stream = BufReader::new(stream);

    let reply = control_roundtrip(
        &mut stream,
        r#"{"op": "read_parameter", "name": "tweeter"}"#,
    )
    .await;
    assert_eq!(reply["status"], "error");
    assert!(reply["error"].as_str().unwrap().contains("tweeter"));
    assert!(bridge.probe.ops().is_empty());
}

#[tokio::test]
async fn volume_set_then_adjust_over_the_wire() {
    let bridge = start_bridge(true).await;
    let stream = TcpStream::connect(bridge.control_addr).await.unwrap();
    let mut stream = BufReader::new(stream);

    let reply = control_roundtrip(
        &mut stream,
        r#"{"op": "set_volume", "name": "master_volume", "db": -6.0}"#,
    )
    .await;
    assert_eq!(reply["status"], "ok");
    assert!((reply["db"].as_f64().unwrap() + 6.0).abs() < 0.01);

    let reply = control_roundtrip(
        &mut stream,
        r#"{"op": "adjust_volume", "name": "master_volume", "db": -6.0}"#,
    )
    .await;
    assert!((reply["db"].as_f64().unwrap() + 12.0).abs() < 0.01);
}

#[tokio::test]
async fn malformed_control_line_keeps_the_connection() {
    let bridge = start_bridge(true).await;
    let stream = TcpStream::connect(bridge.control_addr).await.unwrap();
    let mut stream = BufReader::new(stream);

    let reply = control_roundtrip(&mut stream, "not json").await;
    assert_eq!(reply["status"], "error");

    let reply = control_roundtrip(&mut stream, r#"{"op": "list_parameters"}"#).await;
    assert_eq!(
        reply["parameters"],
        serde_json::json!(["crossover", "master_volume", "mute"])
    );
}

#[tokio::test]
async fn requests_rejected_until_brought_up() {
    let bridge = start_bridge(false).await;
    let stream = TcpStream::connect(bridge.control_addr).await.unwrap();
    let mut stream = BufReader::new(stream);

    let reply = control_roundtrip(
        &mut stream,
        r#"{"op": "write_parameter", "name": "master_volume", "value": 0.5}"#,
    )
    .await;
    assert_eq!(reply["status"], "error");
    assert!(reply["error"].as_str().unwrap().contains("not ready"));
    assert!(bridge.probe.ops().is_empty());
}

#[tokio::test]
async fn client_disconnect_leaves_the_commit_running() {
    let bridge = start_bridge(true).await;
    let mut stream = TcpStream::connect(bridge.programmer_addr).await.unwrap();
    stream
        .write_all(&protocol::encode_write(0x0100, &[0u8; 12], true))
        .await
        .unwrap();
    drop(stream);

    let probe = bridge.probe.clone();
    wait_for("safeload commit to finish", move || {
        probe
            .writes()
            .iter()
            .any(|(address, _)| *address == regs::CORE_CONTROL)
    })
    .await;
}

#[tokio::test]
async fn junk_from_one_programmer_client_spares_the_rest() {
    let bridge = start_bridge(true).await;
    let mut stream = TcpStream::connect(bridge.programmer_addr).await.unwrap();
    stream.write_all(&[0xEE; protocol::HEADER_BYTES]).await.unwrap();
    let mut buf = [0u8; 1];
    assert_eq!(stream.read(&mut buf).await.unwrap(), 0);

    let mut stream = TcpStream::connect(bridge.programmer_addr).await.unwrap();
    stream
        .write_all(&protocol::encode_read_request(0x0000, 2, 0))
        .await
        .unwrap();
    let mut response = vec![0u8; protocol::HEADER_BYTES + 2];
    stream.read_exact(&mut response).await.unwrap();
}

#[tokio::test]
async fn concurrent_safeloads_never_interleave() {
    let bridge = start_bridge(true).await;

    let mut tasks = Vec::new();
    for i in 0..4u8 {
        let addr = bridge.programmer_addr;
        tasks.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let data = [i; 12];
            stream
                .write_all(&protocol::encode_write(
                    0x0100 + u16::from(i) * 0x10,
                    &data,
                    true,
                ))
                .await
                .unwrap();
            stream
                .write_all(&protocol::encode_read_request(0x0000, 2, 0))
                .await
                .unwrap();
            let mut response = vec![0u8; protocol::HEADER_BYTES + 2];
            stream.read_exact(&mut response).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let ops = bridge.probe.ops();
    let commits = ops
        .iter()
        .filter(|op| matches!(op, BusOp::Write { address, .. } if *address == regs::CORE_CONTROL))
        .count();
    assert_eq!(commits, 4);

    // Each transaction owns five consecutive bus writes.
    let mut index = 0;
    while index < ops.len() {
        if matches!(&ops[index], BusOp::Write { address, .. } if *address == regs::safeload_slot(0))
        {
            assert!(matches!(
                &ops[index + 3],
                BusOp::Write { address, .. } if *address == regs::SAFELOAD_PENDING
            ));
            assert!(matches!(
                &ops[index + 4],
                BusOp::Write { address, .. } if *address == regs::CORE_CONTROL
            ));
            index += 5;
        } else {
            index += 1;
        }
    }
}

#[tokio::test]
async fn catalog_reload_over_the_wire() {
    let bridge = start_bridge(true).await;
    let stream = TcpStream::connect(bridge.control_addr).await.unwrap();
    let mut stream = BufReader::new(stream);

    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    writeln!(file, r#"[{{"name": "sub_level", "address": 48}}]"#).unwrap();

    let request = format!(
        r#"{{"op": "reload_parameters", "path": {}}}"#,
        serde_json::json!(file.path())
    );
    let reply = control_roundtrip(&mut stream, &request).await;
    assert_eq!(reply["status"], "ok");
    assert_eq!(reply["rows"], 1);

    let reply = control_roundtrip(&mut stream, r#"{"op": "list_parameters"}"#).await;
    assert_eq!(reply["parameters"], serde_json::json!(["sub_level"]));
}

#[tokio::test]
async fn soft_reset_pulses_the_reset_register() {
    let bridge = start_bridge(true).await;
    let stream = TcpStream::connect(bridge.control_addr).await.unwrap();
    let mut stream = BufReader::new(stream);

    let reply = control_roundtrip(&mut stream, r#"{"op": "soft_reset"}"#).await;
    assert_eq!(reply["status"], "ok");
    assert_eq!(
        bridge.probe.writes(),
        vec![
            (regs::SOFT_RESET, vec![0x00, 0x00]),
            (regs::SOFT_RESET, vec![0x00, 0x01]),
        ]
    );
}
