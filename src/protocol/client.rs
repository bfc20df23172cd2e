//! Inspector protocol client.
//!
//! Discovers the target over `GET /json`, upgrades the same port to a
//! websocket, then correlates request/response pairs by id while fanning
//! server events out to the session loop. A background thread owns the read
//! half of the stream; everything it learns travels through channels, so the
//! session keeps single-consumer ordering.

use crate::protocol::{Inbound, TargetInfo, classify, wsframe};
use crate::session::error::Error;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use log::debug;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

/// What the reader thread reports to the session loop.
#[derive(Debug)]
pub enum ClientEvent {
    /// A server-initiated notification (`Debugger.paused`, …).
    Event { method: String, params: Value },
    /// The transport is gone: close frame, EOF, io error or protocol fault.
    Closed,
}

type Resolver = mpsc::Sender<Result<Value, Error>>;

struct Shared {
    stream: Option<TcpStream>,
    pending: HashMap<u64, Resolver>,
    last_id: u64,
    // bumped on every reset so a stale reader thread cannot touch fresh state
    generation: u64,
}

pub struct ProtocolClient {
    host: String,
    port: u16,
    shared: Arc<Mutex<Shared>>,
    events_tx: mpsc::Sender<ClientEvent>,
}

impl ProtocolClient {
    pub fn new(host: impl Into<String>, port: u16, events_tx: mpsc::Sender<ClientEvent>) -> Self {
        Self {
            host: host.into(),
            port,
            shared: Arc::new(Mutex::new(Shared {
                stream: None,
                pending: HashMap::new(),
                last_id: 0,
                generation: 0,
            })),
            events_tx,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock().unwrap().stream.is_some()
    }

    /// Enumerate targets, upgrade to a websocket and run the bootstrap
    /// sequence. On return the connection is ready for `call_method`.
    pub fn connect(&self) -> Result<(), Error> {
        let ws_path = self.discover_ws_path()?;
        let (stream, leftover) = self.upgrade(&ws_path)?;

        {
            let mut shared = self.shared.lock().unwrap();
            shared.generation += 1;
            shared.last_id = 0;
            let reader = stream.try_clone()?;
            shared.stream = Some(stream);

            let shared_arc = Arc::clone(&self.shared);
            let events_tx = self.events_tx.clone();
            let generation = shared.generation;
            thread::spawn(move || pump(reader, leftover, shared_arc, events_tx, generation));
        }

        if let Err(e) = self.bootstrap() {
            self.reset();
            return Err(e);
        }
        Ok(())
    }

    /// The fixed enable sequence every fresh connection runs, in order.
    fn bootstrap(&self) -> Result<(), Error> {
        self.call_method("Runtime.enable", Value::Null)?;
        self.call_method("Debugger.enable", Value::Null)?;
        self.call_method(
            "Debugger.setPauseOnExceptions",
            serde_json::json!({"state": "none"}),
        )?;
        self.call_method(
            "Debugger.setAsyncCallStackDepth",
            serde_json::json!({"maxDepth": 0}),
        )?;
        self.call_method("Profiler.enable", Value::Null)?;
        self.call_method(
            "Profiler.setSamplingInterval",
            serde_json::json!({"interval": 100}),
        )?;
        self.call_method(
            "Debugger.setBlackboxPatterns",
            serde_json::json!({"patterns": []}),
        )?;
        self.call_method("Runtime.runIfWaitingForDebugger", Value::Null)?;
        Ok(())
    }

    /// Send one request and block until its response arrives.
    ///
    /// There is no built-in timeout: a call hangs until the target answers or
    /// the connection resets (which rejects it with `ConnectionReset`).
    pub fn call_method(&self, method: &str, params: Value) -> Result<Value, Error> {
        let (tx, rx) = mpsc::channel();

        {
            let mut shared = self.shared.lock().unwrap();
            if shared.stream.is_none() {
                return Err(Error::NotConnected);
            }

            shared.last_id += 1;
            let id = shared.last_id;

            let params = match params {
                Value::Null => Value::Object(Default::default()),
                params => params,
            };
            let text =
                serde_json::to_string(&serde_json::json!({"id": id, "method": method, "params": params}))?;
            debug!(target: "wire", "> {text}");

            let frame = wsframe::encode(text.as_bytes());
            shared.pending.insert(id, tx);

            let mut stream = shared.stream.as_ref().expect("checked above");
            if let Err(e) = stream.write_all(&frame) {
                shared.pending.remove(&id);
                return Err(e.into());
            }
        }

        match rx.recv() {
            Ok(result) => result,
            // resolver dropped without an answer: reset raced with the call
            Err(_) => Err(Error::ConnectionReset),
        }
    }

    /// Tear the transport down. Pending calls are rejected with
    /// `ConnectionReset`; the id counter restarts. Safe to call repeatedly.
    pub fn reset(&self) {
        let mut shared = self.shared.lock().unwrap();
        reset_locked(&mut shared);
    }

    fn discover_ws_path(&self) -> Result<String, Error> {
        let body = self.http_get("/json")?;
        let targets: Vec<TargetInfo> = serde_json::from_str(&body)?;
        let target = targets.into_iter().next().ok_or(Error::NoTargets)?;

        // "ws://127.0.0.1:9229/<uuid>" -> "/<uuid>"
        let url = &target.web_socket_debugger_url;
        let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
        let path_at = without_scheme.find('/').ok_or_else(|| {
            Error::HttpUpgrade(format!("no path in debugger url `{url}`"))
        })?;
        Ok(without_scheme[path_at..].to_string())
    }

    fn http_get(&self, path: &str) -> Result<String, Error> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))?;
        write!(
            stream,
            "GET {path} HTTP/1.1\r\nHost: {}:{}\r\nConnection: close\r\n\r\n",
            self.host, self.port
        )?;

        let mut response = String::new();
        stream.read_to_string(&mut response)?;

        let body_at = response
            .find("\r\n\r\n")
            .ok_or_else(|| Error::HttpUpgrade("no header terminator".into()))?;
        Ok(response[body_at + 4..].to_string())
    }

    /// Issue the websocket upgrade and adopt the raw connection. Returns the
    /// stream plus any bytes the server sent after the 101 response.
    fn upgrade(&self, path: &str) -> Result<(TcpStream, Vec<u8>), Error> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))?;

        let key = BASE64_STANDARD.encode(uuid::Uuid::new_v4().into_bytes());
        write!(
            stream,
            "GET {path} HTTP/1.1\r\n\
             Host: {}:{}\r\n\
             Connection: Upgrade\r\n\
             Upgrade: websocket\r\n\
             Sec-WebSocket-Key: {key}\r\n\
             Sec-WebSocket-Version: 13\r\n\r\n",
            self.host, self.port
        )?;

        // read headers byte-wise; anything past the terminator is already
        // framed websocket data and belongs to the reader
        let mut response = Vec::new();
        let mut byte = [0u8; 1];
        let header_end = loop {
            let n = stream.read(&mut byte)?;
            if n == 0 {
                return Err(Error::HttpUpgrade("connection closed during upgrade".into()));
            }
            response.push(byte[0]);
            if response.ends_with(b"\r\n\r\n") {
                break response.len();
            }
            if response.len() > 16 * 1024 {
                return Err(Error::HttpUpgrade("oversized upgrade response".into()));
            }
        };

        let head = std::str::from_utf8(&response[..header_end])?;
        let status = head.lines().next().unwrap_or_default();
        if !status.contains(" 101 ") {
            return Err(Error::HttpUpgrade(format!(
                "expected 101 Switching Protocols, got `{status}`"
            )));
        }

        Ok((stream, Vec::new()))
    }
}

fn reset_locked(shared: &mut Shared) {
    if let Some(stream) = shared.stream.take() {
        _ = stream.shutdown(Shutdown::Both);
    }
    shared.generation += 1;
    shared.last_id = 0;
    for (_, resolver) in shared.pending.drain() {
        _ = resolver.send(Err(Error::ConnectionReset));
    }
}

/// Reader loop: accumulate chunks, decode frames, resolve pending calls and
/// forward events. Exits when the transport dies or a newer generation took
/// over the shared state.
fn pump(
    mut stream: TcpStream,
    leftover: Vec<u8>,
    shared: Arc<Mutex<Shared>>,
    events_tx: mpsc::Sender<ClientEvent>,
    generation: u64,
) {
    let mut unprocessed = leftover;
    let mut chunk = [0u8; 8 * 1024];

    loop {
        loop {
            let decoded = match wsframe::decode(&unprocessed) {
                Ok(Some(decoded)) => decoded,
                Ok(None) => break,
                Err(e) => {
                    debug!(target: "wire", "frame error: {e}");
                    close_connection(&shared, &events_tx, generation);
                    return;
                }
            };

            let closed = decoded.closed;
            let payload = decoded.payload.to_vec();
            let rest = decoded.rest.to_vec();
            unprocessed = rest;

            if closed {
                close_connection(&shared, &events_tx, generation);
                return;
            }

            if let Err(e) = dispatch(&payload, &shared, &events_tx, generation) {
                debug!(target: "wire", "dispatch error: {e}");
                close_connection(&shared, &events_tx, generation);
                return;
            }
        }

        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => {
                close_connection(&shared, &events_tx, generation);
                return;
            }
            Ok(n) => unprocessed.extend_from_slice(&chunk[..n]),
        }
    }
}

fn dispatch(
    payload: &[u8],
    shared: &Arc<Mutex<Shared>>,
    events_tx: &mpsc::Sender<ClientEvent>,
    generation: u64,
) -> Result<(), Error> {
    // cheap shape check before json parsing: payloads are single objects
    if payload.first() != Some(&b'{') || payload.last() != Some(&b'}') {
        return Err(Error::Protocol("payload is not a json object".into()));
    }

    let text = std::str::from_utf8(payload)?;
    debug!(target: "wire", "< {text}");

    match classify(serde_json::from_str(text)?)? {
        Inbound::Response { id, result, error } => {
            let resolver = {
                let mut shared = shared.lock().unwrap();
                if shared.generation != generation {
                    return Ok(());
                }
                shared.pending.remove(&id)
            };
            // unknown ids are dropped silently
            if let Some(resolver) = resolver {
                let resolution = match error {
                    Some(rpc) => Err(rpc.unpack()),
                    None => Ok(normalize_result(result)),
                };
                _ = resolver.send(resolution);
            }
        }
        Inbound::Event { method, params } => {
            _ = events_tx.send(ClientEvent::Event { method, params });
        }
    }
    Ok(())
}

/// Responses with an empty result object surface as "no value".
fn normalize_result(result: Option<Value>) -> Value {
    match result {
        None => Value::Null,
        Some(Value::Object(obj)) if obj.is_empty() => Value::Null,
        Some(value) => value,
    }
}

fn close_connection(
    shared: &Arc<Mutex<Shared>>,
    events_tx: &mpsc::Sender<ClientEvent>,
    generation: u64,
) {
    let mut shared = shared.lock().unwrap();
    if shared.generation != generation {
        return;
    }
    reset_locked(&mut shared);
    _ = events_tx.send(ClientEvent::Closed);
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_empty_results() {
        assert_eq!(normalize_result(None), Value::Null);
        assert_eq!(normalize_result(Some(json!({}))), Value::Null);
        assert_eq!(
            normalize_result(Some(json!({"value": 3}))),
            json!({"value": 3})
        );
    }

    #[test]
    fn test_call_method_without_connection() {
        let (tx, _rx) = mpsc::channel();
        let client = ProtocolClient::new("127.0.0.1", 0, tx);
        assert!(matches!(
            client.call_method("Runtime.enable", Value::Null),
            Err(Error::NotConnected)
        ));
    }

    #[test]
    fn test_reset_is_idempotent_and_rejects_pending() {
        let (events_tx, _events_rx) = mpsc::channel();
        let client = ProtocolClient::new("127.0.0.1", 0, events_tx);

        let (tx, rx) = mpsc::channel();
        client.shared.lock().unwrap().pending.insert(1, tx);
        client.shared.lock().unwrap().last_id = 1;

        client.reset();
        assert!(matches!(rx.recv(), Ok(Err(Error::ConnectionReset))));
        assert_eq!(client.shared.lock().unwrap().last_id, 0);

        client.reset();
        assert!(client.shared.lock().unwrap().pending.is_empty());
    }
}
