//! Runner state machine: sequences handlers against arriving messages,
//! tracks the error/finished verdict, and validates the terminal close
//! code.

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use wsrunner_transport::TransportEvent;

use crate::builder::WsRunnerBuilder;
use crate::codec;
use crate::endpoint::{Endpoint, EndpointConfig};
use crate::error::{HarnessError, Result};
use crate::script::{Command, MessageHandler, ScriptHandle};
use crate::NORMAL_CLOSURE;

/// A scripted WebSocket test run.
///
/// Configured once through [`WsRunnerBuilder`], driven to completion by
/// [`WsRunner::run`], and judged by [`WsRunner::assert_ok`]. The
/// `error` and `finished` flags are monotonic within one run; a fresh
/// runner starts with both false.
pub struct WsRunner {
    pub(crate) config: EndpointConfig,
    pub(crate) handlers: Vec<MessageHandler>,
    pub(crate) initial_message: Option<Value>,
    pub(crate) expected_close_code: Option<u16>,
    pub(crate) expect_connection_failure: bool,
    pub(crate) transport_error_hook: Option<Box<dyn Fn(&str) + Send>>,

    cursor: usize,
    error: bool,
    finished: bool,
}

impl WsRunner {
    /// Start configuring a run against the given endpoint URL.
    pub fn builder(url: &str) -> WsRunnerBuilder {
        WsRunnerBuilder::new(url)
    }

    pub(crate) fn from_builder(builder: WsRunnerBuilder) -> Self {
        Self {
            config: builder.config,
            handlers: builder.handlers,
            initial_message: builder.initial_message,
            expected_close_code: builder.expected_close_code,
            expect_connection_failure: builder.expect_connection_failure,
            transport_error_hook: builder.transport_error_hook,
            cursor: 0,
            error: false,
            finished: false,
        }
    }

    /// Drive the whole test to completion: connect, play the handler
    /// sequence against inbound messages, and check the terminal close
    /// code. Fatal failures set the error flag and are returned; a
    /// connect failure is swallowed when it was declared expected.
    pub async fn run(&mut self) -> Result<()> {
        let mut endpoint = match Endpoint::connect(&self.config).await {
            Ok(endpoint) => {
                if self.expect_connection_failure {
                    warn!("Connection succeeded although a failure was expected");
                }
                endpoint
            }
            Err(e) => {
                self.finished = true;
                if self.expect_connection_failure {
                    info!("Connection failed as expected: {}", e);
                    return Ok(());
                }
                self.error = true;
                return Err(e);
            }
        };

        let (handle, commands) = ScriptHandle::channel();
        let result = self.drive(&mut endpoint, &handle, commands).await;
        if result.is_err() {
            self.error = true;
        }

        // Normalized close so the connection terminates deterministically
        if !endpoint.is_closed() {
            if let Err(close_err) = endpoint.close(NORMAL_CLOSURE).await {
                self.error = true;
                if result.is_ok() {
                    return Err(close_err);
                }
            }
        }

        result
    }

    /// Event loop: blocks on the endpoint's event channel and the
    /// script command channel until a terminal condition. Commands are
    /// drained first so a handler's sends reach the wire before the
    /// next inbound message is dispatched.
    async fn drive(
        &mut self,
        endpoint: &mut Endpoint,
        handle: &ScriptHandle,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                biased;

                Some(command) = commands.recv() => match command {
                    Command::Send(message) => endpoint.send(&message).await?,
                    Command::Close(code) => {
                        self.expected_close_code = Some(code);
                        endpoint.close(code).await?;
                    }
                },

                event = endpoint.recv() => match event {
                    Some(TransportEvent::Opened) => {
                        if let Some(message) = &self.initial_message {
                            debug!("Sending initial message");
                            endpoint.send(message).await?;
                        }
                    }
                    Some(TransportEvent::Message(text)) => {
                        if let Err(e) = self.dispatch(&text, handle) {
                            // Handler and decode failures abort without a
                            // normalized close; the overrun case leaves the
                            // connection to the wrap-up close in `run`.
                            if matches!(
                                e,
                                HarnessError::Handler { .. } | HarnessError::MalformedMessage(_)
                            ) {
                                endpoint.mark_closed();
                            }
                            return Err(e);
                        }
                    }
                    Some(TransportEvent::Closed { code }) => {
                        return self.handle_close(code);
                    }
                    Some(TransportEvent::Error(cause)) => {
                        self.error = true;
                        if let Some(hook) = &self.transport_error_hook {
                            hook(&cause);
                        }
                        return Err(HarnessError::Transport(cause));
                    }
                    None => {
                        // Transport gone without a close frame; nothing
                        // left to check, mirror the wait loop's closed exit.
                        debug!("Transport ended without close event");
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Dispatch one inbound message to the handler at the cursor. The
    /// cursor strictly counts successfully completed handlers.
    fn dispatch(&mut self, raw: &str, handle: &ScriptHandle) -> Result<()> {
        if self.cursor >= self.handlers.len() {
            self.error = true;
            self.finished = true;
            return Err(HarnessError::SequenceOverrun {
                handled: self.cursor,
            });
        }

        let fields = match codec::decode_fields(raw) {
            Ok(fields) => fields,
            Err(e) => {
                self.error = true;
                return Err(e);
            }
        };

        let step = self.cursor;
        trace!("Dispatching message {} to handler {}", raw, step);
        match (self.handlers[step])(fields, handle) {
            Ok(()) => {
                self.cursor += 1;
                Ok(())
            }
            Err(source) => {
                self.error = true;
                Err(HarnessError::Handler { step, source })
            }
        }
    }

    /// Check the received close code against the expectation. Runs at
    /// most once per run; a second close on an already-finished run is
    /// absorbed rather than allowed to flip the verdict.
    fn handle_close(&mut self, code: u16) -> Result<()> {
        if self.finished {
            return Ok(());
        }

        let Some(expected) = self.expected_close_code else {
            self.error = true;
            return Err(HarnessError::Config(
                "close event received but no expected close code was set".to_string(),
            ));
        };

        if code == expected {
            debug!("Close code {} matched expectation", code);
            self.finished = true;
            Ok(())
        } else {
            self.error = true;
            Err(HarnessError::CloseCodeMismatch {
                expected,
                actual: code,
            })
        }
    }

    /// Final pass/fail gate: fails iff the error flag was set at any
    /// point during the run. Pure read, safe to call repeatedly.
    pub fn assert_ok(&self) -> Result<()> {
        if self.error {
            Err(HarnessError::Failed)
        } else {
            Ok(())
        }
    }

    /// Handlers successfully completed so far.
    pub fn handled_messages(&self) -> usize {
        self.cursor
    }

    /// True once the run reached a passing terminal condition.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// True once any fatal failure was recorded.
    pub fn had_error(&self) -> bool {
        self.error
    }
}
