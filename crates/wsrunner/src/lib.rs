//! wsrunner
//!
//! Scripted test harness for WebSocket endpoints: open one connection,
//! drive it through an ordered sequence of expected inbound messages,
//! optionally send an initial message on connect, and assert that the
//! connection ultimately closes with an expected close code.
//!
//! # Example
//!
//! ```ignore
//! use serde_json::json;
//! use wsrunner::WsRunner;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runner = WsRunner::builder("ws://endpoint/url")
//!         .port(80)
//!         .header("test-header", "header")
//!         .on_message(|fields, _| {
//!             println!("{:?}", fields);
//!             Ok(())
//!         })
//!         .on_message(|fields, handle| {
//!             println!("{:?}", fields);
//!             handle.send(json!({"test": "message"}));
//!             Ok(())
//!         })
//!         .expect_close_code(1000)
//!         .build();
//!
//!     runner.run().await?;
//!     runner.assert_ok()?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod codec;
pub mod endpoint;
pub mod error;
pub mod runner;
pub mod script;

pub use builder::WsRunnerBuilder;
pub use codec::Fields;
pub use endpoint::{Endpoint, EndpointConfig};
pub use error::{HarnessError, Result};
pub use runner::WsRunner;
pub use script::{MessageHandler, ScriptHandle};

/// WebSocket close code for a normal closure; also the normalized code
/// the runner uses to terminate a connection it finished with.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::builder::WsRunnerBuilder;
    pub use crate::codec::Fields;
    pub use crate::error::{HarnessError, Result};
    pub use crate::runner::WsRunner;
    pub use crate::script::ScriptHandle;
    pub use crate::NORMAL_CLOSURE;
    pub use wsrunner_transport::Headers;
}
