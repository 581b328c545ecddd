//! Shared utilities for integration tests: a programmable mock RPC node and
//! a mock websocket node.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;

/// Known-good seed and its index 0 key material.
pub const SEED: &str = "1234567891234567891234567891234567891234567891234567891234567891";
pub const ACCOUNT: &str = "nano_18s4jwxeztcijasjm3unf34xnba6bo6f764amn1op8jsgb7aquz9ke8njujm";
pub const PUBLIC_KEY: &str = "1B228F3ACFE9508A331987746845DA25044D48D290489D015B1A39724A8BEFE7";

/// Requests seen by a mock node, in arrival order.
pub type Recorded = Arc<Mutex<Vec<Value>>>;

/// Actions a mock node received.
pub fn actions(recorded: &Recorded) -> Vec<String> {
    recorded
        .lock()
        .unwrap()
        .iter()
        .map(|r| r["action"].as_str().unwrap_or_default().to_string())
        .collect()
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

async fn read_json_request(socket: &mut TcpStream) -> Option<Value> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find_header_end(&buf) {
            break end;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    while buf.len() < body_start + length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    serde_json::from_slice(&buf[body_start..body_start + length]).ok()
}

/// Start a mock RPC node on an ephemeral port. `handler` maps each JSON
/// request to a status code and body.
pub async fn start_rpc_node<F>(handler: F) -> (SocketAddr, Recorded)
where
    F: Fn(&Value) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let seen = recorded.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let handler = handler.clone();
                    let seen = seen.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_json_request(&mut socket).await else {
                            return;
                        };
                        seen.lock().unwrap().push(request.clone());
                        let (status, body) = handler(&request);
                        let status_text = match status {
                            200 => "200 OK",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, recorded)
}

#[derive(Clone, Debug)]
enum Control {
    Push(String),
    Drop,
}

/// Mock node websocket. Records every text frame and pushes frames to
/// whichever clients are connected.
pub struct WsNode {
    pub addr: SocketAddr,
    pub received: Recorded,
    connections: Arc<AtomicUsize>,
    control: broadcast::Sender<Control>,
}

impl WsNode {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received: Recorded = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let (control, _) = broadcast::channel(64);

        let node = Self {
            addr,
            received: received.clone(),
            connections: connections.clone(),
            control: control.clone(),
        };

        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let Ok(ws) = tokio_tungstenite::accept_async(socket).await else {
                    continue;
                };
                connections.fetch_add(1, Ordering::SeqCst);
                let received = received.clone();
                let mut control = control.subscribe();
                tokio::spawn(async move {
                    let (mut sink, mut source) = ws.split();
                    loop {
                        tokio::select! {
                            incoming = source.next() => match incoming {
                                Some(Ok(Message::Text(text))) => {
                                    let value = serde_json::from_str(text.as_str())
                                        .unwrap_or_else(|_| Value::String(text.as_str().to_string()));
                                    received.lock().unwrap().push(value);
                                }
                                Some(Ok(_)) => {}
                                _ => break,
                            },
                            command = control.recv() => match command {
                                Ok(Control::Push(text)) => {
                                    if sink.send(Message::text(text)).await.is_err() {
                                        break;
                                    }
                                }
                                Ok(Control::Drop) | Err(_) => {
                                    let _ = sink.close().await;
                                    break;
                                }
                            },
                        }
                    }
                });
            }
        });

        node
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Send a frame to every connected client.
    pub fn push(&self, text: String) {
        let _ = self.control.send(Control::Push(text));
    }

    /// Close every client connection.
    pub fn drop_connections(&self) {
        let _ = self.control.send(Control::Drop);
    }

    pub fn clear(&self) {
        self.received.lock().unwrap().clear();
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
