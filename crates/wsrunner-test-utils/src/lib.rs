//! Common test helpers for wsrunner tests
//!
//! Provides a scripted single-connection WebSocket server with proper
//! resource cleanup (RAII), port allocation, and capture of what the
//! client sent, so harness tests run against a real server instead of
//! mocks.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{
    Request as HsRequest, Response as HsResponse,
};
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame, Message};
use tokio_tungstenite::accept_hdr_async;
use tracing::{debug, warn};

/// Find an available TCP port for testing
pub async fn find_available_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// One step of a server-side conversation script.
#[derive(Debug, Clone)]
pub enum ServerAction {
    /// Send a text frame to the client.
    Send(String),
    /// Block until the client sends a text frame.
    AwaitText,
    /// Close the connection with the given close code.
    Close(u16),
    /// Drop the TCP stream abruptly, without a close frame.
    Drop,
}

type CapturedHeaders = BTreeMap<String, Vec<String>>;

/// A scripted WebSocket server that accepts exactly one connection,
/// plays its actions in order, and cleans up on drop.
pub struct TestServer {
    port: u16,
    handle: Option<tokio::task::JoinHandle<()>>,
    received: Arc<Mutex<Vec<String>>>,
    headers: Arc<Mutex<CapturedHeaders>>,
}

impl TestServer {
    /// Bind a port and start serving the script.
    pub async fn start(actions: Vec<ServerAction>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let received = Arc::new(Mutex::new(Vec::new()));
        let headers = Arc::new(Mutex::new(CapturedHeaders::new()));
        let received_clone = received.clone();
        let headers_clone = headers.clone();

        let handle = tokio::spawn(async move {
            let Ok((stream, addr)) = listener.accept().await else {
                return;
            };
            debug!("Test server accepted connection from {}", addr);

            let captured = headers_clone;
            let ws = accept_hdr_async(stream, |req: &HsRequest, response: HsResponse| {
                let mut map = captured.lock();
                for (name, value) in req.headers() {
                    map.entry(name.as_str().to_string())
                        .or_default()
                        .push(value.to_str().unwrap_or("").to_string());
                }
                Ok(response)
            })
            .await;

            let Ok(mut ws) = ws else {
                warn!("Test server handshake failed");
                return;
            };

            for action in actions {
                match action {
                    ServerAction::Send(text) => {
                        if ws.send(Message::Text(text)).await.is_err() {
                            return;
                        }
                    }
                    ServerAction::AwaitText => loop {
                        match ws.next().await {
                            Some(Ok(Message::Text(text))) => {
                                received_clone.lock().push(text);
                                break;
                            }
                            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                            Some(Ok(_)) => {}
                        }
                    },
                    ServerAction::Close(code) => {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: "".into(),
                        };
                        let _ = ws.close(Some(frame)).await;
                    }
                    ServerAction::Drop => return,
                }
            }

            // Drain until the peer finishes the close handshake
            while let Some(msg) = ws.next().await {
                match msg {
                    Ok(Message::Text(text)) => received_clone.lock().push(text),
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        });

        Self {
            port,
            handle: Some(handle),
            received,
            headers,
        }
    }

    /// Accept a raw TCP connection and drop it before the WebSocket
    /// handshake, so the client sees a connection failure.
    pub async fn start_refusing_handshake() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        Self {
            port,
            handle: Some(handle),
            received: Arc::new(Mutex::new(Vec::new())),
            headers: Arc::new(Mutex::new(CapturedHeaders::new())),
        }
    }

    /// WebSocket URL for this server
    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Port the server is listening on
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Text frames received from the client, in arrival order
    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    /// Handshake request headers captured during accept
    pub fn handshake_headers(&self) -> CapturedHeaders {
        self.headers.lock().clone()
    }

    /// Wait for the scripted conversation to finish.
    pub async fn finished(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Stop the server explicitly (also happens on drop)
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// An address on which nothing is listening, for connection-failure tests.
pub async fn unreachable_url() -> String {
    let port = find_available_port().await;
    format!("ws://127.0.0.1:{}", port)
}
