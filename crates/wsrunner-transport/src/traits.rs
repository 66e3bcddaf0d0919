//! Transport trait definitions
//!
//! The harness core consumes one connection through these seams. An
//! implementation MUST deliver events in the order frames were received
//! and MUST NOT deliver two `Message` events concurrently for the same
//! connection; the core's cursor advancement relies on it.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;

/// Handshake headers: header name to ordered list of values.
pub type Headers = BTreeMap<String, Vec<String>>;

/// Events a transport produces toward the harness core.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Connection handshake completed.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// The peer closed the connection with the given close code.
    Closed { code: u16 },
    /// An asynchronous transport failure.
    Error(String),
}

/// Outbound half of a connection.
#[async_trait]
pub trait TransportSender: Send + Sync {
    /// Best-effort asynchronous text send; no delivery acknowledgment.
    async fn send_text(&self, text: String) -> Result<()>;

    /// Point-in-time liveness check.
    fn is_open(&self) -> bool;

    /// Request a graceful close with the given code.
    async fn close(&self, code: u16) -> Result<()>;
}

/// Inbound half of a connection.
#[async_trait]
pub trait TransportReceiver: Send {
    /// Receive the next event; `None` once the transport is gone.
    async fn recv(&mut self) -> Option<TransportEvent>;
}

/// A connectable transport.
#[async_trait]
pub trait Transport: Send + Sync {
    type Sender: TransportSender;
    type Receiver: TransportReceiver;

    /// Establish a connection, injecting the given handshake headers.
    ///
    /// Fails synchronously on a bad URL or refused connection; failures
    /// after the handshake are reported via [`TransportEvent::Error`].
    async fn connect(url: &str, headers: &Headers) -> Result<(Self::Sender, Self::Receiver)>
    where
        Self: Sized;
}
