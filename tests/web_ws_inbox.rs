//! Mailbox WebSocket Tests

mod common;

use serde_json::Value;

use common::{create_test_app_http, plain_message};

#[tokio::test]
async fn test_echo_and_new_message_event() {
    let app = create_test_app_http().await;
    let mailbox_id = app.create_inbox("live@example.com").await;

    let mut socket = app
        .server
        .get_websocket(&format!("/ws/messages/{}", mailbox_id))
        .await
        .into_websocket()
        .await;

    // The echo proves the subscription is registered.
    socket.send_text("hello").await;
    socket.assert_receive_text("Echo: hello").await;
    assert_eq!(app.state.broadcaster.subscriber_count(&mailbox_id).await, 1);

    app.deliver(&plain_message("live@example.com", "Live")).await;
    let message_id = app.first_message_id(&mailbox_id).await;

    let event: Value = socket.receive_json().await;
    assert_eq!(event["event"], "new_message");
    assert_eq!(event["mailbox_id"], mailbox_id.as_str());
    assert_eq!(event["message_id"], message_id.as_str());
}

#[tokio::test]
async fn test_other_mailbox_events_not_delivered() {
    let app = create_test_app_http().await;
    let watched = app.create_inbox("watched@example.com").await;
    app.create_inbox("other@example.com").await;

    let mut socket = app
        .server
        .get_websocket(&format!("/ws/messages/{}", watched))
        .await
        .into_websocket()
        .await;
    socket.send_text("ping").await;
    socket.assert_receive_text("Echo: ping").await;

    app.deliver(&plain_message("other@example.com", "Not yours"))
        .await;
    app.deliver(&plain_message("watched@example.com", "Yours"))
        .await;

    // The first event received belongs to the watched mailbox.
    let event: Value = socket.receive_json().await;
    assert_eq!(event["mailbox_id"], watched.as_str());
}
