//! WebSocket transport implementation

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::header::{HeaderName, HeaderValue},
        protocol::{frame::coding::CloseCode, CloseFrame, Message as WsMessage},
    },
};
use tracing::{debug, error, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{Headers, Transport, TransportEvent, TransportReceiver, TransportSender};
use crate::NO_STATUS_CLOSE_CODE;

/// WebSocket transport
pub struct WebSocketTransport;

/// WebSocket sender
pub struct WebSocketSender {
    tx: mpsc::Sender<WsMessage>,
    connected: Arc<Mutex<bool>>,
}

#[async_trait]
impl TransportSender for WebSocketSender {
    async fn send_text(&self, text: String) -> Result<()> {
        if !self.is_open() {
            return Err(TransportError::NotConnected);
        }

        self.tx
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    fn is_open(&self) -> bool {
        *self.connected.lock()
    }

    async fn close(&self, code: u16) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: "".into(),
        };
        self.tx
            .send(WsMessage::Close(Some(frame)))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        *self.connected.lock() = false;
        Ok(())
    }
}

/// WebSocket receiver
pub struct WebSocketReceiver {
    rx: mpsc::Receiver<TransportEvent>,
}

#[async_trait]
impl TransportReceiver for WebSocketReceiver {
    async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    type Sender = WebSocketSender;
    type Receiver = WebSocketReceiver;

    async fn connect(url: &str, headers: &Headers) -> Result<(Self::Sender, Self::Receiver)> {
        info!("Connecting to WebSocket: {}", url);

        // Build request with the per-connection headers; IntoClientRequest
        // supplies the mandatory WebSocket handshake headers.
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        for (name, values) in headers {
            let name = name
                .parse::<HeaderName>()
                .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
            for value in values {
                let value = HeaderValue::from_str(value)
                    .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
                request.headers_mut().append(name.clone(), value);
            }
        }

        // Connect
        let (ws_stream, response) = connect_async(request)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        debug!("WebSocket connected, response: {:?}", response.status());

        // Split the WebSocket stream
        let (write, read) = ws_stream.split();

        // Create channels
        let (send_tx, mut send_rx) = mpsc::channel::<WsMessage>(100);
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(100);

        let connected = Arc::new(Mutex::new(true));
        let connected_write = connected.clone();
        let connected_read = connected.clone();

        // Spawn writer task
        tokio::spawn(async move {
            let mut write = write;
            while let Some(msg) = send_rx.recv().await {
                let is_close = matches!(msg, WsMessage::Close(_));
                if let Err(e) = write.send(msg).await {
                    error!("WebSocket write error: {}", e);
                    break;
                }
                if is_close {
                    break;
                }
            }
            *connected_write.lock() = false;
        });

        // Spawn reader task
        tokio::spawn(async move {
            let mut read = read;

            let _ = event_tx.send(TransportEvent::Opened).await;

            while let Some(result) = read.next().await {
                match result {
                    Ok(msg) => match msg {
                        WsMessage::Text(text) => {
                            let _ = event_tx.send(TransportEvent::Message(text)).await;
                        }
                        WsMessage::Binary(data) => {
                            // Text-frame wire format; binary is out of contract
                            warn!("Ignoring {}-byte binary frame", data.len());
                        }
                        WsMessage::Ping(_) => {
                            // Pong is handled automatically by tungstenite
                            debug!("Received ping");
                        }
                        WsMessage::Pong(_) => {
                            debug!("Received pong");
                        }
                        WsMessage::Close(frame) => {
                            let code = frame
                                .map(|f| u16::from(f.code))
                                .unwrap_or(NO_STATUS_CLOSE_CODE);
                            info!("WebSocket closed, code: {}", code);
                            let _ = event_tx.send(TransportEvent::Closed { code }).await;
                            // Keep polling so tungstenite flushes its automatic
                            // close reply; the stream ends right after.
                        }
                        WsMessage::Frame(_) => {
                            // Raw frame, ignore
                        }
                    },
                    Err(e) => {
                        error!("WebSocket read error: {}", e);
                        let _ = event_tx.send(TransportEvent::Error(e.to_string())).await;
                        break;
                    }
                }
            }

            *connected_read.lock() = false;
        });

        let sender = WebSocketSender {
            tx: send_tx,
            connected,
        };

        let receiver = WebSocketReceiver { rx: event_rx };

        Ok((sender, receiver))
    }
}
