//! wsrunner Transport Layer
//!
//! Owns the physical WebSocket connection and translates raw socket
//! events into the four abstract events the harness core consumes:
//! [`TransportEvent::Opened`], [`TransportEvent::Message`],
//! [`TransportEvent::Closed`], and [`TransportEvent::Error`].
//!
//! Built on tokio-tungstenite; handshake, framing, ping/pong, and TLS
//! live entirely in this crate.

pub mod error;
pub mod traits;
pub mod websocket;

pub use error::{Result, TransportError};
pub use traits::{Headers, Transport, TransportEvent, TransportReceiver, TransportSender};
pub use websocket::{WebSocketReceiver, WebSocketSender, WebSocketTransport};

/// Close code reported when the peer's close frame carried no status.
pub const NO_STATUS_CLOSE_CODE: u16 = 1005;
