//! Runner builder pattern

use serde_json::Value;
use wsrunner_transport::Headers;

use crate::endpoint::EndpointConfig;
use crate::script::{MessageHandler, ScriptHandle};
use crate::WsRunner;

/// Fluent configuration for a [`WsRunner`]; everything is set before
/// the run starts and is immutable afterwards.
pub struct WsRunnerBuilder {
    pub(crate) config: EndpointConfig,
    pub(crate) handlers: Vec<MessageHandler>,
    pub(crate) initial_message: Option<Value>,
    pub(crate) expected_close_code: Option<u16>,
    pub(crate) expect_connection_failure: bool,
    pub(crate) transport_error_hook: Option<Box<dyn Fn(&str) + Send>>,
}

impl WsRunnerBuilder {
    /// Create a new builder for the given endpoint URL.
    pub fn new(url: &str) -> Self {
        Self {
            config: EndpointConfig {
                url: url.to_string(),
                port: None,
                headers: Headers::new(),
            },
            handlers: Vec::new(),
            initial_message: None,
            expected_close_code: None,
            expect_connection_failure: false,
            transport_error_hook: None,
        }
    }

    /// Override the port of the endpoint URL.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    /// Replace the full header set.
    pub fn headers(mut self, headers: Headers) -> Self {
        self.config.headers = headers;
        self
    }

    /// Append one header value, keeping earlier values for the same name.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.config
            .headers
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    /// Replace the ordered handler sequence.
    pub fn handlers(mut self, handlers: Vec<MessageHandler>) -> Self {
        self.handlers = handlers;
        self
    }

    /// Append one handler to the sequence.
    pub fn on_message<F>(mut self, handler: F) -> Self
    where
        F: FnMut(crate::Fields, &ScriptHandle) -> anyhow::Result<()> + Send + 'static,
    {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Message sent exactly once, immediately after the connection
    /// opens and before any inbound message is processed. Must be a
    /// JSON object.
    pub fn initial_message(mut self, message: Value) -> Self {
        self.initial_message = Some(message);
        self
    }

    /// Close code the connection is expected to terminate with.
    pub fn expect_close_code(mut self, code: u16) -> Self {
        self.expected_close_code = Some(code);
        self
    }

    /// Declare that the connect attempt itself is expected to fail;
    /// such a failure then counts as a passing run.
    pub fn expect_connection_failure(mut self, expected: bool) -> Self {
        self.expect_connection_failure = expected;
        self
    }

    /// Hook invoked with the cause of an asynchronous transport
    /// failure before the run aborts.
    pub fn on_transport_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + 'static,
    {
        self.transport_error_hook = Some(Box::new(hook));
        self
    }

    /// Finish configuration.
    pub fn build(self) -> WsRunner {
        WsRunner::from_builder(self)
    }
}
