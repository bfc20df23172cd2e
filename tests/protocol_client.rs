//! Protocol client integration: a mock inspector server on a loopback
//! listener drives discovery, the websocket upgrade, the bootstrap sequence
//! and correlation under interleaved events.

use jsinspect::protocol::client::{ClientEvent, ProtocolClient};
use jsinspect::session::error::Error;
use serde_json::{Value, json};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const BOOTSTRAP: &[&str] = &[
    "Runtime.enable",
    "Debugger.enable",
    "Debugger.setPauseOnExceptions",
    "Debugger.setAsyncCallStackDepth",
    "Profiler.enable",
    "Profiler.setSamplingInterval",
    "Debugger.setBlackboxPatterns",
    "Runtime.runIfWaitingForDebugger",
];

fn read_http_head(stream: &mut TcpStream) {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        assert_ne!(stream.read(&mut byte).unwrap(), 0, "client hung up early");
        head.push(byte[0]);
    }
}

/// Read one masked client frame and return its json payload.
fn read_client_frame(stream: &mut TcpStream) -> Value {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).unwrap();
    assert_eq!(header[0], 0x81, "client frames are final text frames");
    assert_ne!(header[1] & 0x80, 0, "client frames must be masked");

    let len = match header[1] & 0x7F {
        126 => {
            let mut ext = [0u8; 2];
            stream.read_exact(&mut ext).unwrap();
            u16::from_be_bytes(ext) as usize
        }
        127 => {
            let mut ext = [0u8; 8];
            stream.read_exact(&mut ext).unwrap();
            u64::from_be_bytes(ext) as usize
        }
        short => short as usize,
    };

    let mut key = [0u8; 4];
    stream.read_exact(&mut key).unwrap();
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).unwrap();
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }

    serde_json::from_slice(&payload).unwrap()
}

/// Send an unmasked server text frame.
fn send_frame(stream: &mut TcpStream, payload: &str) {
    let bytes = payload.as_bytes();
    let mut frame = vec![0x81u8];
    match bytes.len() {
        len if len <= 125 => frame.push(len as u8),
        len if len <= u16::MAX as usize => {
            frame.push(126);
            frame.extend_from_slice(&(len as u16).to_be_bytes());
        }
        len => {
            frame.push(127);
            frame.extend_from_slice(&(len as u64).to_be_bytes());
        }
    }
    frame.extend_from_slice(bytes);
    stream.write_all(&frame).unwrap();
}

fn send_close_frame(stream: &mut TcpStream) {
    stream.write_all(&[0x88, 0x00]).unwrap();
}

/// Answer the eight bootstrap calls in arrival order, logging their methods.
fn serve_bootstrap(stream: &mut TcpStream, log: &mut Vec<String>) {
    for _ in 0..BOOTSTRAP.len() {
        let msg = read_client_frame(stream);
        log.push(msg["method"].as_str().unwrap().to_string());
        send_frame(
            stream,
            &json!({"id": msg["id"], "result": {}}).to_string(),
        );
    }
}

/// Serve discovery + upgrade + bootstrap, then hand the socket to the
/// test-specific script. Returns the observed bootstrap order.
fn start_server(
    script: impl FnOnce(&mut TcpStream) + Send + 'static,
) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let mut log = vec![];

        // discovery: GET /json, connection closed after the body
        let (mut stream, _) = listener.accept().unwrap();
        read_http_head(&mut stream);
        let body = format!(
            "[{{\"title\":\"target\",\"webSocketDebuggerUrl\":\"ws://127.0.0.1:{port}/target-1\"}}]"
        );
        write!(
            stream,
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
        drop(stream);

        // upgrade, then websocket frames
        let (mut stream, _) = listener.accept().unwrap();
        read_http_head(&mut stream);
        write!(
            stream,
            "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n"
        )
        .unwrap();

        serve_bootstrap(&mut stream, &mut log);
        script(&mut stream);
        log
    });

    (port, handle)
}

fn connect(port: u16) -> (ProtocolClient, Receiver<ClientEvent>) {
    let (events_tx, events_rx) = mpsc::channel();
    let client = ProtocolClient::new("127.0.0.1", port, events_tx);
    client.connect().expect("connect against mock server");
    (client, events_rx)
}

#[test]
fn test_connect_runs_bootstrap_in_order() {
    // the trailing read keeps the server socket open while the client side
    // asserts its own state
    let (port, server) = start_server(|stream| {
        let msg = read_client_frame(stream);
        send_frame(stream, &json!({"id": msg["id"], "result": {}}).to_string());
    });
    let (client, _events) = connect(port);

    assert!(client.is_connected());
    client.call_method("Custom.ping", Value::Null).unwrap();

    let seen = server.join().unwrap();
    assert_eq!(seen, BOOTSTRAP);
}

#[test]
fn test_responses_match_by_id_out_of_order() {
    let (port, server) = start_server(|stream| {
        let first = read_client_frame(stream);
        let second = read_client_frame(stream);

        // answer in reverse arrival order, echoing the method back
        for msg in [second, first] {
            send_frame(
                stream,
                &json!({"id": msg["id"], "result": {"echo": msg["method"]}}).to_string(),
            );
        }
    });
    let (client, _events) = connect(port);

    let client = std::sync::Arc::new(client);
    let a = {
        let client = client.clone();
        thread::spawn(move || client.call_method("Custom.first", Value::Null).unwrap())
    };
    // make request ordering deterministic enough for the mock
    thread::sleep(Duration::from_millis(50));
    let b = {
        let client = client.clone();
        thread::spawn(move || client.call_method("Custom.second", Value::Null).unwrap())
    };

    assert_eq!(a.join().unwrap(), json!({"echo": "Custom.first"}));
    assert_eq!(b.join().unwrap(), json!({"echo": "Custom.second"}));
    server.join().unwrap();
}

#[test]
fn test_rpc_errors_unpack_message_and_data() {
    let (port, server) = start_server(|stream| {
        let msg = read_client_frame(stream);
        send_frame(
            stream,
            &json!({
                "id": msg["id"],
                "error": {"code": -32000, "message": "Breakpoint exists", "data": "app.js:3"},
            })
            .to_string(),
        );
    });
    let (client, _events) = connect(port);

    match client.call_method("Debugger.setBreakpoint", Value::Null) {
        Err(Error::Rpc { code, message }) => {
            assert_eq!(code, -32000);
            assert_eq!(message, "Breakpoint exists - app.js:3");
        }
        other => panic!("unexpected: {other:?}"),
    }
    server.join().unwrap();
}

#[test]
fn test_events_fan_out_and_split_frames_reassemble() {
    let (port, server) = start_server(|stream| {
        send_frame(
            stream,
            &json!({
                "method": "Debugger.scriptParsed",
                "params": {"scriptId": "42", "url": "/tmp/app.js"},
            })
            .to_string(),
        );

        let msg = read_client_frame(stream);

        // response split across two tcp writes: the buffer must reassemble
        let response = json!({"id": msg["id"], "result": {"value": 7}}).to_string();
        let bytes = response.as_bytes();
        let mut frame = vec![0x81u8, bytes.len() as u8];
        frame.extend_from_slice(bytes);
        let (head, tail) = frame.split_at(frame.len() / 2);
        stream.write_all(head).unwrap();
        stream.flush().unwrap();
        thread::sleep(Duration::from_millis(50));
        stream.write_all(tail).unwrap();

        // a response to an id nobody waits for is dropped silently
        send_frame(stream, &json!({"id": 999, "result": {}}).to_string());
    });
    let (client, events) = connect(port);

    let result = client.call_method("Runtime.evaluate", Value::Null).unwrap();
    assert_eq!(result, json!({"value": 7}));

    match events.recv_timeout(Duration::from_secs(5)).unwrap() {
        ClientEvent::Event { method, params } => {
            assert_eq!(method, "Debugger.scriptParsed");
            assert_eq!(params["scriptId"], "42");
        }
        other => panic!("unexpected: {other:?}"),
    }
    server.join().unwrap();
}

#[test]
fn test_empty_result_normalizes_to_no_value() {
    let (port, server) = start_server(|stream| {
        let msg = read_client_frame(stream);
        send_frame(stream, &json!({"id": msg["id"], "result": {}}).to_string());
    });
    let (client, _events) = connect(port);

    let result = client.call_method("Debugger.resume", Value::Null).unwrap();
    assert_eq!(result, Value::Null);
    server.join().unwrap();
}

#[test]
fn test_close_frame_tears_the_connection_down() {
    let (port, server) = start_server(|stream| {
        send_close_frame(stream);
    });
    let (client, events) = connect(port);

    match events.recv_timeout(Duration::from_secs(5)).unwrap() {
        ClientEvent::Closed => {}
        other => panic!("unexpected: {other:?}"),
    }

    // the reader reset the client; further calls fail synchronously
    assert!(matches!(
        client.call_method("Runtime.evaluate", Value::Null),
        Err(Error::NotConnected)
    ));

    // reset stays idempotent after the remote close
    client.reset();
    client.reset();
    server.join().unwrap();
}
