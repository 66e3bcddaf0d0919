//! Handler types and the capability surface exposed to scripts

use serde_json::Value;
use tokio::sync::mpsc;

use crate::codec::Fields;

/// One step of a test script. Receives the decoded fields of the
/// cursor-th inbound message and a [`ScriptHandle`] for replying; an
/// `Err` aborts the run.
pub type MessageHandler = Box<dyn FnMut(Fields, &ScriptHandle) -> anyhow::Result<()> + Send>;

/// Commands a handler can enqueue toward the run loop
#[derive(Debug)]
pub(crate) enum Command {
    Send(Value),
    Close(u16),
}

/// Narrow interface handed to message handlers: exactly `send` and
/// `close`, nothing else of the runner. Commands are executed by the
/// run loop after the handler returns.
pub struct ScriptHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl ScriptHandle {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { commands: tx }, rx)
    }

    /// Queue an outbound message; it must serialize to a JSON object.
    pub fn send(&self, message: Value) {
        let _ = self.commands.send(Command::Send(message));
    }

    /// Request a close with the given code and make that code the
    /// expected close code for the run.
    pub fn close(&self, code: u16) {
        let _ = self.commands.send(Command::Close(code));
    }
}
