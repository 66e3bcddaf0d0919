//! Harness error types

use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Failure kinds a scripted run can produce
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The runner was misconfigured (e.g. no close expectation set
    /// when a close event arrived)
    #[error("configuration error: {0}")]
    Config(String),

    /// The endpoint URL could not be parsed or adjusted
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),

    /// The connection attempt did not succeed
    #[error("connection failed: {0}")]
    ConnectionFailure(String),

    /// An inbound message arrived after every handler had run
    #[error("unexpected message: all {handled} handlers already consumed")]
    SequenceOverrun { handled: usize },

    /// A handler failed while processing its assigned message
    #[error("handler {step} failed: {source}")]
    Handler {
        step: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The close code received differs from the expectation
    #[error("expected close code {expected}, got {actual}")]
    CloseCodeMismatch { expected: u16, actual: u16 },

    /// An inbound frame was not a flat string-to-string JSON object
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Adapter-reported asynchronous failure
    #[error("transport error: {0}")]
    Transport(String),

    /// An outbound send could not be handed to the transport
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Generic verdict raised by `assert_ok` when the error flag is set
    #[error("a test error occurred")]
    Failed,
}
