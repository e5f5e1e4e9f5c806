//! In-memory host for driving the client in tests.

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rich_presence_ipc::protocol::{encode_frame, Header, Opcode, HEADER_SIZE};
use rich_presence_ipc::transport::{Connector, IpcTransport, Transport};
use serde_json::{json, Value};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

pub const APP_ID: &str = "383226320970055681";

/// Upper bound for any single wait in a test.
pub const STEP: Duration = Duration::from_secs(5);

/// Dials `mem-0` .. `mem-9`; only `mem-{accept_at}` answers.
pub struct MemoryConnector {
    accept_at: Option<usize>,
    attempts: Arc<AtomicUsize>,
    hosts: mpsc::UnboundedSender<DuplexStream>,
}

#[async_trait]
impl Connector for MemoryConnector {
    type Stream = DuplexStream;

    fn candidates(&self) -> Vec<PathBuf> {
        (0..10).map(|i| PathBuf::from(format!("mem-{}", i))).collect()
    }

    async fn connect(&self, address: &Path) -> io::Result<DuplexStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let accepting = self
            .accept_at
            .map(|i| address == Path::new(&format!("mem-{}", i)))
            .unwrap_or(false);
        if !accepting {
            return Err(io::ErrorKind::ConnectionRefused.into());
        }

        let (client, host) = duplex(64 * 1024);
        self.hosts
            .send(host)
            .map_err(|_| io::Error::from(io::ErrorKind::ConnectionRefused))?;
        Ok(client)
    }
}

/// Accepts connections made through a [`MemoryConnector`].
pub struct Listener {
    hosts: mpsc::UnboundedReceiver<DuplexStream>,
    attempts: Arc<AtomicUsize>,
}

impl Listener {
    pub async fn accept(&mut self) -> Host {
        let stream = tokio::time::timeout(STEP, self.hosts.recv())
            .await
            .expect("no connection within timeout")
            .expect("connector dropped");
        Host { stream }
    }

    /// Addresses dialled so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Transport whose only reachable address is index `accept_at`.
pub fn memory_transport(accept_at: Option<usize>) -> (Box<dyn Transport>, Listener) {
    memory_transport_with_read_size(accept_at, 4096)
}

pub fn memory_transport_with_read_size(
    accept_at: Option<usize>,
    read_buffer_size: usize,
) -> (Box<dyn Transport>, Listener) {
    let (tx, rx) = mpsc::unbounded_channel();
    let attempts = Arc::new(AtomicUsize::new(0));
    let connector = MemoryConnector {
        accept_at,
        attempts: attempts.clone(),
        hosts: tx,
    };
    (
        Box::new(IpcTransport::with_read_buffer_size(
            connector,
            read_buffer_size,
        )),
        Listener {
            hosts: rx,
            attempts,
        },
    )
}

/// The far end of one connection.
pub struct Host {
    stream: DuplexStream,
}

impl Host {
    /// Next frame written by the client.
    pub async fn read_frame(&mut self) -> (Opcode, Vec<u8>) {
        tokio::time::timeout(STEP, self.read_frame_inner())
            .await
            .expect("no frame within timeout")
    }

    async fn read_frame_inner(&mut self) -> (Opcode, Vec<u8>) {
        let mut header = [0u8; HEADER_SIZE];
        self.stream.read_exact(&mut header).await.unwrap();
        let header = Header::decode(&header).unwrap();
        let opcode = Opcode::try_from(header.opcode).unwrap();

        let mut payload = vec![0u8; header.payload_length as usize];
        self.stream.read_exact(&mut payload).await.unwrap();
        (opcode, payload)
    }

    pub async fn read_json(&mut self) -> (Opcode, Value) {
        let (opcode, payload) = self.read_frame().await;
        (opcode, serde_json::from_slice(&payload).unwrap())
    }

    /// True if nothing arrives within `wait`.
    pub async fn is_quiet(&mut self, wait: Duration) -> bool {
        let mut byte = [0u8; 1];
        tokio::time::timeout(wait, self.stream.read(&mut byte))
            .await
            .is_err()
    }

    pub async fn send(&mut self, opcode: Opcode, value: &Value) {
        let bytes = encode_frame(opcode, value).unwrap();
        self.send_raw(&bytes).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    pub async fn dispatch(&mut self, evt: &str, data: Value) {
        self.send(
            Opcode::Message,
            &json!({"cmd": "DISPATCH", "evt": evt, "data": data, "nonce": null}),
        )
        .await;
    }

    pub async fn send_ready(&mut self) {
        self.dispatch("READY", json!({"v": 1, "user": user_json("1", "kit")}))
            .await;
    }

    /// Read the handshake frame; returns its payload.
    pub async fn expect_handshake(&mut self) -> Value {
        let (opcode, handshake) = self.read_json().await;
        assert_eq!(opcode, Opcode::Handshake);
        handshake
    }

    /// Read the three post-READY subscriptions; returns their event names.
    pub async fn expect_subscriptions(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        for _ in 0..3 {
            let (opcode, command) = self.read_json().await;
            assert_eq!(opcode, Opcode::Message);
            assert_eq!(command["cmd"], "SUBSCRIBE");
            events.push(command["evt"].as_str().unwrap().to_string());
        }
        events
    }

    /// Handshake, READY and subscriptions.
    pub async fn complete_handshake(&mut self) {
        self.expect_handshake().await;
        self.send_ready().await;
        self.expect_subscriptions().await;
    }
}

pub fn user_json(id: &str, username: &str) -> Value {
    json!({
        "id": id,
        "username": username,
        "discriminator": "0",
        "global_name": null,
        "avatar": null,
        "bot": false,
        "premium_type": 0,
    })
}
