//! A scripted session against a WebSocket endpoint: three expected
//! messages, a reply in the middle, and a normal-closure assertion.
//!
//! Run with: cargo run --example scripted_session -- ws://host/path

use serde_json::json;
use wsrunner::WsRunner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1/endpoint".to_string());

    let mut runner = WsRunner::builder(&url)
        .port(80)
        .header("test-header", "header")
        .on_message(|fields, _| {
            println!("{:?}", fields);
            Ok(())
        })
        .on_message(|fields, handle| {
            println!("{:?}", fields);
            handle.send(json!({"test": "message"}));
            Ok(())
        })
        .on_message(|fields, _| {
            println!("{:?}", fields);
            Ok(())
        })
        .expect_close_code(1000)
        .build();

    runner.run().await?;
    runner.assert_ok()?;
    println!("Session completed: {} messages handled", runner.handled_messages());
    Ok(())
}
