//! Harness integration tests (wsrunner)
//!
//! Every test drives a real in-process scripted WebSocket server:
//! - Handler sequencing and cursor semantics
//! - Close-code assertion
//! - Connection-failure handling
//! - Initial message and handler replies
//! - Header injection and configuration errors

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wsrunner::{Fields, HarnessError, WsRunner};
use wsrunner_test_utils::{unreachable_url, ServerAction, TestServer};

/// Shared recorder for handler invocations.
fn recorder() -> (Arc<Mutex<Vec<Fields>>>, impl Fn() -> wsrunner::MessageHandler) {
    let record = Arc::new(Mutex::new(Vec::new()));
    let record_clone = record.clone();
    let make = move || -> wsrunner::MessageHandler {
        let record = record_clone.clone();
        Box::new(move |fields, _| {
            record.lock().push(fields);
            Ok(())
        })
    };
    (record, make)
}

// ============================================================================
// Handler Sequencing
// ============================================================================

#[tokio::test]
async fn handlers_run_once_each_in_declared_order() {
    let server = TestServer::start(vec![
        ServerAction::Send(r#"{"a":"1"}"#.to_string()),
        ServerAction::Send(r#"{"b":"2"}"#.to_string()),
        ServerAction::Close(1000),
    ])
    .await;

    let (record, handler) = recorder();
    let mut runner = WsRunner::builder(&server.url())
        .handlers(vec![handler(), handler()])
        .expect_close_code(1000)
        .build();

    runner.run().await.expect("Run failed");
    runner.assert_ok().expect("Verdict not ok");

    let seen = record.lock().clone();
    assert_eq!(seen.len(), 2, "Each handler should run exactly once");
    assert_eq!(seen[0]["a"], "1");
    assert_eq!(seen[1]["b"], "2");
    assert_eq!(runner.handled_messages(), 2);
    assert!(runner.is_finished());
}

#[tokio::test]
async fn extra_message_is_a_sequence_overrun() {
    let server = TestServer::start(vec![
        ServerAction::Send(r#"{"a":"1"}"#.to_string()),
        ServerAction::Send(r#"{"b":"2"}"#.to_string()),
        ServerAction::Close(1000),
    ])
    .await;

    let (_, handler) = recorder();
    let mut runner = WsRunner::builder(&server.url())
        .handlers(vec![handler()])
        .expect_close_code(1000)
        .build();

    let err = runner.run().await.expect_err("Overrun should fail the run");
    assert!(matches!(err, HarnessError::SequenceOverrun { handled: 1 }));
    assert!(runner.had_error());
    assert!(runner.assert_ok().is_err());
    assert_eq!(runner.handled_messages(), 1, "Overrun must not advance the cursor");
}

#[tokio::test]
async fn handler_failure_aborts_without_running_later_handlers() {
    let server = TestServer::start(vec![
        ServerAction::Send(r#"{"a":"1"}"#.to_string()),
        ServerAction::Send(r#"{"b":"2"}"#.to_string()),
        ServerAction::Close(1000),
    ])
    .await;

    let second_ran = Arc::new(AtomicBool::new(false));
    let second_ran_clone = second_ran.clone();

    let mut runner = WsRunner::builder(&server.url())
        .on_message(|_, _| Err(anyhow::anyhow!("refusing this message")))
        .on_message(move |_, _| {
            second_ran_clone.store(true, Ordering::SeqCst);
            Ok(())
        })
        .expect_close_code(1000)
        .build();

    let err = runner.run().await.expect_err("Handler failure should abort");
    assert!(matches!(err, HarnessError::Handler { step: 0, .. }));
    assert!(!second_ran.load(Ordering::SeqCst), "Later handler must not run");
    assert_eq!(runner.handled_messages(), 0, "Failed message is not consumed");
    assert!(runner.assert_ok().is_err());
}

#[tokio::test]
async fn malformed_message_fails_before_the_handler() {
    let server = TestServer::start(vec![
        ServerAction::Send(r#"{"a":1}"#.to_string()),
        ServerAction::Close(1000),
    ])
    .await;

    let (record, handler) = recorder();
    let mut runner = WsRunner::builder(&server.url())
        .handlers(vec![handler()])
        .expect_close_code(1000)
        .build();

    let err = runner.run().await.expect_err("Strict decode should fail");
    assert!(matches!(err, HarnessError::MalformedMessage(_)));
    assert!(record.lock().is_empty(), "Handler must not see malformed input");
    assert_eq!(runner.handled_messages(), 0);
}

// ============================================================================
// Close-Code Assertion
// ============================================================================

#[tokio::test]
async fn matching_close_code_passes() {
    let server = TestServer::start(vec![ServerAction::Close(1000)]).await;

    let mut runner = WsRunner::builder(&server.url())
        .expect_close_code(1000)
        .build();

    runner.run().await.expect("Run failed");
    assert!(runner.is_finished());
    assert!(!runner.had_error());
    runner.assert_ok().expect("Verdict not ok");
}

#[tokio::test]
async fn mismatched_close_code_fails_with_both_codes() {
    let server = TestServer::start(vec![ServerAction::Close(1001)]).await;

    let mut runner = WsRunner::builder(&server.url())
        .expect_close_code(1000)
        .build();

    let err = runner.run().await.expect_err("Mismatch should fail the run");
    assert!(matches!(
        err,
        HarnessError::CloseCodeMismatch {
            expected: 1000,
            actual: 1001
        }
    ));
    assert!(runner.assert_ok().is_err());
}

#[tokio::test]
async fn close_without_configured_expectation_is_a_config_error() {
    let server = TestServer::start(vec![ServerAction::Close(1000)]).await;

    let mut runner = WsRunner::builder(&server.url()).build();

    let err = runner.run().await.expect_err("Unset expectation should fail");
    assert!(matches!(err, HarnessError::Config(_)));
    assert!(runner.assert_ok().is_err());
}

#[tokio::test]
async fn assert_ok_is_idempotent_after_a_completed_run() {
    let server = TestServer::start(vec![ServerAction::Close(1000)]).await;

    let mut runner = WsRunner::builder(&server.url())
        .expect_close_code(1000)
        .build();
    runner.run().await.expect("Run failed");

    assert!(runner.assert_ok().is_ok());
    assert!(runner.assert_ok().is_ok());
}

// ============================================================================
// Connection-Failure Handling
// ============================================================================

#[tokio::test]
async fn expected_connection_failure_passes_without_messages() {
    let url = unreachable_url().await;

    let (record, handler) = recorder();
    let mut runner = WsRunner::builder(&url)
        .handlers(vec![handler()])
        .expect_connection_failure(true)
        .build();

    runner.run().await.expect("Expected failure should be swallowed");
    runner.assert_ok().expect("Verdict not ok");
    assert!(runner.is_finished());
    assert!(record.lock().is_empty(), "No handler should have run");
}

#[tokio::test]
async fn unexpected_connection_failure_fails_the_run() {
    let url = unreachable_url().await;

    let mut runner = WsRunner::builder(&url).expect_close_code(1000).build();

    let err = runner.run().await.expect_err("Connect should fail");
    assert!(matches!(err, HarnessError::ConnectionFailure(_)));
    assert!(runner.had_error());
    assert!(runner.assert_ok().is_err());
}

#[tokio::test]
async fn refused_handshake_counts_as_expected_failure() {
    let server = TestServer::start_refusing_handshake().await;

    let mut runner = WsRunner::builder(&server.url())
        .expect_connection_failure(true)
        .build();

    runner.run().await.expect("Expected failure should be swallowed");
    runner.assert_ok().expect("Verdict not ok");
}

#[tokio::test]
async fn invalid_url_fails_unless_expected() {
    let mut runner = WsRunner::builder("not a url").expect_close_code(1000).build();
    let err = runner.run().await.expect_err("Invalid URL should fail");
    assert!(matches!(err, HarnessError::InvalidUrl(_)));

    let mut lenient = WsRunner::builder("not a url")
        .expect_connection_failure(true)
        .build();
    lenient.run().await.expect("Expected failure should be swallowed");
    lenient.assert_ok().expect("Verdict not ok");
}

// ============================================================================
// Initial Message & Handler Replies
// ============================================================================

#[tokio::test]
async fn initial_message_is_sent_before_anything_else() {
    let mut server = TestServer::start(vec![
        ServerAction::AwaitText,
        ServerAction::Close(1000),
    ])
    .await;

    let mut runner = WsRunner::builder(&server.url())
        .initial_message(json!({"hello": "world"}))
        .expect_close_code(1000)
        .build();

    runner.run().await.expect("Run failed");
    runner.assert_ok().expect("Verdict not ok");

    server.finished().await;
    let received = server.received();
    assert_eq!(received.len(), 1);
    let parsed: Value = serde_json::from_str(&received[0]).unwrap();
    assert_eq!(parsed, json!({"hello": "world"}));
}

#[tokio::test]
async fn handler_replies_reach_the_server_between_messages() {
    let mut server = TestServer::start(vec![
        ServerAction::Send(r#"{"question":"one"}"#.to_string()),
        ServerAction::AwaitText,
        ServerAction::Send(r#"{"question":"two"}"#.to_string()),
        ServerAction::Close(1000),
    ])
    .await;

    let (record, _) = recorder();
    let mut runner = WsRunner::builder(&server.url())
        .on_message(|fields, handle| {
            assert_eq!(fields["question"], "one");
            handle.send(json!({"answer": "one"}));
            Ok(())
        })
        .on_message({
            let record = record.clone();
            move |fields, _| {
                record.lock().push(fields);
                Ok(())
            }
        })
        .expect_close_code(1000)
        .build();

    runner.run().await.expect("Run failed");
    runner.assert_ok().expect("Verdict not ok");

    server.finished().await;
    let replies = server.received();
    assert_eq!(replies.len(), 1, "Server should have seen one reply");
    let parsed: Value = serde_json::from_str(&replies[0]).unwrap();
    assert_eq!(parsed, json!({"answer": "one"}));

    let seen = record.lock().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["question"], "two");
    assert_eq!(runner.handled_messages(), 2);
}

#[tokio::test]
async fn handler_close_sets_the_expected_close_code() {
    let server = TestServer::start(vec![ServerAction::Send(
        r#"{"done":"yes"}"#.to_string(),
    )])
    .await;

    // No expectation configured up front; the handler supplies it.
    let mut runner = WsRunner::builder(&server.url())
        .on_message(|fields, handle| {
            assert_eq!(fields["done"], "yes");
            handle.close(1000);
            Ok(())
        })
        .build();

    runner.run().await.expect("Run failed");
    runner.assert_ok().expect("Verdict not ok");
    assert!(runner.is_finished());
}

// ============================================================================
// Configuration Surface
// ============================================================================

#[tokio::test]
async fn headers_are_injected_into_the_handshake() {
    let mut server = TestServer::start(vec![ServerAction::Close(1000)]).await;

    let mut runner = WsRunner::builder(&server.url())
        .header("x-test-header", "one")
        .header("x-test-header", "two")
        .header("x-other", "value")
        .expect_close_code(1000)
        .build();

    runner.run().await.expect("Run failed");
    runner.assert_ok().expect("Verdict not ok");

    server.finished().await;
    let headers = server.handshake_headers();
    assert_eq!(
        headers.get("x-test-header").map(Vec::as_slice),
        Some(["one".to_string(), "two".to_string()].as_slice()),
        "Both values must arrive, in order"
    );
    assert_eq!(
        headers.get("x-other").map(Vec::as_slice),
        Some(["value".to_string()].as_slice())
    );
}

#[tokio::test]
async fn configured_port_overrides_the_url_port() {
    let server = TestServer::start(vec![ServerAction::Close(1000)]).await;

    // Bogus port in the URL; the builder override wins.
    let mut runner = WsRunner::builder("ws://127.0.0.1:1")
        .port(server.port())
        .expect_close_code(1000)
        .build();

    runner.run().await.expect("Run failed");
    runner.assert_ok().expect("Verdict not ok");
}

// ============================================================================
// Transport Failures
// ============================================================================

#[tokio::test]
async fn abrupt_disconnect_surfaces_as_a_transport_error() {
    let server = TestServer::start(vec![
        ServerAction::Send(r#"{"a":"1"}"#.to_string()),
        ServerAction::Drop,
    ])
    .await;

    let hook_cause = Arc::new(Mutex::new(None::<String>));
    let hook_cause_clone = hook_cause.clone();

    let (_, handler) = recorder();
    let mut runner = WsRunner::builder(&server.url())
        .handlers(vec![handler()])
        .expect_close_code(1000)
        .on_transport_error(move |cause| {
            *hook_cause_clone.lock() = Some(cause.to_string());
        })
        .build();

    let err = runner.run().await.expect_err("Abrupt drop should fail");
    assert!(matches!(err, HarnessError::Transport(_)));
    assert!(runner.had_error());
    assert!(
        hook_cause.lock().is_some(),
        "Error hook should have seen the cause"
    );
}
