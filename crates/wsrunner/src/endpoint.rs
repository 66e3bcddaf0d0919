//! Endpoint: adapts one physical connection's raw events into the
//! runner's lifecycle shape and owns the `closed` flag.

use serde_json::Value;
use tracing::info;
use url::Url;
use wsrunner_transport::{
    Headers, Transport, TransportError, TransportEvent, TransportReceiver, TransportSender,
    WebSocketReceiver, WebSocketSender, WebSocketTransport,
};

use crate::codec;
use crate::error::{HarnessError, Result};

/// Where and how to connect: URL, optional port override, and the
/// per-instance header set injected into the handshake request.
#[derive(Debug, Clone, Default)]
pub struct EndpointConfig {
    pub url: String,
    pub port: Option<u16>,
    pub headers: Headers,
}

impl EndpointConfig {
    /// Derive the connection URL with the configured port substituted.
    fn connect_url(&self) -> Result<Url> {
        let mut url =
            Url::parse(&self.url).map_err(|e| HarnessError::InvalidUrl(e.to_string()))?;
        if let Some(port) = self.port {
            url.set_port(Some(port)).map_err(|_| {
                HarnessError::InvalidUrl(format!("cannot set port on '{}'", self.url))
            })?;
        }
        Ok(url)
    }
}

/// One live connection
pub struct Endpoint {
    sender: WebSocketSender,
    receiver: WebSocketReceiver,
    closed: bool,
}

impl Endpoint {
    /// Connect the transport with the per-instance headers. `closed`
    /// starts false once the adapter accepts the call; the `Opened`
    /// event arrives asynchronously through [`Endpoint::recv`].
    pub async fn connect(config: &EndpointConfig) -> Result<Self> {
        let url = config.connect_url()?;
        info!("Connecting endpoint: {}", url);

        let (sender, receiver) = WebSocketTransport::connect(url.as_str(), &config.headers)
            .await
            .map_err(|e| match e {
                TransportError::InvalidUrl(msg) => HarnessError::InvalidUrl(msg),
                other => HarnessError::ConnectionFailure(other.to_string()),
            })?;

        Ok(Self {
            sender,
            receiver,
            closed: false,
        })
    }

    /// Next transport event. The `closed` flag latches before a
    /// `Closed`, `Error`, or end-of-stream is handed upward.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        let event = self.receiver.recv().await;
        match event {
            Some(TransportEvent::Closed { .. }) | Some(TransportEvent::Error(_)) | None => {
                self.closed = true;
            }
            _ => {}
        }
        event
    }

    /// Serialize and forward a message. Sending on a closed connection
    /// is the adapter's problem, not validated here.
    pub async fn send(&self, message: &Value) -> Result<()> {
        let text = codec::encode(message)?;
        self.sender
            .send_text(text)
            .await
            .map_err(|e| HarnessError::SendFailed(e.to_string()))
    }

    /// True if the local flag is set or the adapter reports not-open,
    /// so a missed callback cannot hang the run.
    pub fn is_closed(&self) -> bool {
        self.closed || !self.sender.is_open()
    }

    /// Latch the closed flag without touching the adapter. Used when a
    /// handler failure aborts the run.
    pub(crate) fn mark_closed(&mut self) {
        self.closed = true;
    }

    /// Request a graceful close; on failure the endpoint is marked
    /// closed and the error re-raised.
    pub async fn close(&mut self, code: u16) -> Result<()> {
        if let Err(e) = self.sender.close(code).await {
            self.closed = true;
            return Err(HarnessError::Transport(e.to_string()));
        }
        Ok(())
    }
}
