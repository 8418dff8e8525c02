mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::time;
use tokio_tungstenite::tungstenite;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn join_returns_join_success() {
    let state = common::test_state();
    let addr = common::start_ws_server(state.clone()).await;

    let (_ws, success) = common::join_ws(addr, "Alice").await;
    assert_eq!(success["nickname"], "Alice");
    assert_eq!(success["participants"], serde_json::json!(["Alice"]));
    assert!(success["messages"].as_array().unwrap().is_empty());

    assert_eq!(state.coordinator.participants(), vec!["Alice".to_string()]);
}

#[tokio::test]
async fn joiner_gets_roster_update_after_join_success() {
    let state = common::test_state();
    let addr = common::start_ws_server(state).await;

    let (mut ws, _) = common::join_ws(addr, "Alice").await;
    let update = common::next_event(&mut ws).await;
    assert_eq!(update["type"], "participants-updated");
    assert_eq!(update["participants"], serde_json::json!(["Alice"]));
}

#[tokio::test]
async fn alice_and_bob_chat() {
    let state = common::test_state();
    let addr = common::start_ws_server(state.clone()).await;

    let (mut alice, _) = common::join_ws(addr, "Alice").await;
    common::next_event_of(&mut alice, "participants-updated").await;

    let (mut bob, success) = common::join_ws(addr, "Bob").await;
    assert_eq!(success["participants"], serde_json::json!(["Alice", "Bob"]));

    let joined = common::next_event_of(&mut alice, "participant-joined").await;
    assert_eq!(joined["nickname"], "Bob");
    assert!(joined["timestamp"].as_i64().is_some());

    let update = common::next_event_of(&mut alice, "participants-updated").await;
    assert_eq!(update["participants"], serde_json::json!(["Alice", "Bob"]));
    common::next_event_of(&mut bob, "participants-updated").await;

    // Alice's message reaches both, sender included.
    common::send_json(
        &mut alice,
        serde_json::json!({ "type": "send", "body": "Hi Bob & co" }),
    )
    .await;

    let to_alice = common::next_event_of(&mut alice, "message").await;
    let to_bob = common::next_event_of(&mut bob, "message").await;
    assert_eq!(to_alice, to_bob);
    assert_eq!(to_bob["nickname"], "Alice");
    assert_eq!(to_bob["body"], "Hi Bob &amp; co");

    // Bob leaves; Alice is told.
    common::send_json(&mut bob, serde_json::json!({ "type": "disconnect" })).await;

    let left = common::next_event_of(&mut alice, "participant-left").await;
    assert_eq!(left["nickname"], "Bob");
    let update = common::next_event_of(&mut alice, "participants-updated").await;
    assert_eq!(update["participants"], serde_json::json!(["Alice"]));

    // History survives the author's departure.
    assert_eq!(state.coordinator.recent(10).len(), 1);
}

#[tokio::test]
async fn duplicate_nickname_is_reported_to_sender_only() {
    let state = common::test_state();
    let addr = common::start_ws_server(state.clone()).await;

    let (mut alice, _) = common::join_ws(addr, "Alice").await;
    common::next_event_of(&mut alice, "participants-updated").await;

    let mut impostor = common::connect_ws(addr).await;
    common::send_json(
        &mut impostor,
        serde_json::json!({ "type": "join", "nickname": "ALICE" }),
    )
    .await;

    let err = common::next_event(&mut impostor).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], "NicknameTaken");

    // Alice hears nothing about the failed attempt.
    let quiet = time::timeout(Duration::from_millis(200), alice.next()).await;
    assert!(quiet.is_err(), "unexpected event: {quiet:?}");
    assert_eq!(state.coordinator.participant_count(), 1);
}

#[tokio::test]
async fn send_before_join_is_connection_error() {
    let state = common::test_state();
    let addr = common::start_ws_server(state).await;

    let mut ws = common::connect_ws(addr).await;
    common::send_json(&mut ws, serde_json::json!({ "type": "send", "body": "hello?" })).await;

    let err = common::next_event(&mut ws).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], "ConnectionError");
}

#[tokio::test]
async fn malformed_frame_gets_error_and_socket_stays_open() {
    let state = common::test_state();
    let addr = common::start_ws_server(state).await;

    let mut ws = common::connect_ws(addr).await;
    ws.send(tungstenite::Message::Text("not json".into()))
        .await
        .expect("ws send");

    let err = common::next_event(&mut ws).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], "InvalidMessage");
    assert_eq!(err["message"], "Malformed event");

    common::send_json(
        &mut ws,
        serde_json::json!({ "type": "join", "nickname": "Still here" }),
    )
    .await;
    let success = common::next_event(&mut ws).await;
    assert_eq!(success["type"], "join-success");
}

#[tokio::test]
async fn rate_limit_error_goes_to_sender() {
    let state = common::test_state();
    let addr = common::start_ws_server(state.clone()).await;

    let (mut ws, _) = common::join_ws(addr, "Chatty").await;
    for i in 0..4 {
        common::send_json(
            &mut ws,
            serde_json::json!({ "type": "send", "body": format!("m{i}") }),
        )
        .await;
    }

    let err = common::next_event_of(&mut ws, "error").await;
    assert_eq!(err["code"], "RateLimitExceeded");
    assert_eq!(state.coordinator.recent(10).len(), 3);
}

#[tokio::test]
async fn closing_socket_removes_participant() {
    let state = common::test_state();
    let addr = common::start_ws_server(state.clone()).await;

    let (mut alice, _) = common::join_ws(addr, "Alice").await;
    common::next_event_of(&mut alice, "participants-updated").await;
    let (mut bob, _) = common::join_ws(addr, "Bob").await;
    common::next_event_of(&mut bob, "participants-updated").await;

    bob.close(None).await.expect("close");

    let left = common::next_event_of(&mut alice, "participant-left").await;
    assert_eq!(left["nickname"], "Bob");
    assert_eq!(state.coordinator.participants(), vec!["Alice".to_string()]);
}

#[tokio::test]
async fn room_close_sends_going_away() {
    let state = common::test_state();
    let addr = common::start_ws_server(state.clone()).await;

    let (mut ws, _) = common::join_ws(addr, "Alice").await;
    common::next_event_of(&mut ws, "participants-updated").await;

    state.shutdown();

    let msg = time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timeout")
        .expect("stream ended")
        .expect("read error");

    match msg {
        tungstenite::Message::Close(Some(frame)) => {
            assert_eq!(
                frame.code,
                tungstenite::protocol::frame::coding::CloseCode::from(1001)
            );
        }
        other => panic!("Expected Close frame, got: {other:?}"),
    }
}
