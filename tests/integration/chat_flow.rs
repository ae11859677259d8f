//! End-to-end chat flow tests over a real socket and the REST facade.
//!
//! Each test starts an in-process server on an OS-assigned port with an
//! in-memory store, connects WebSocket clients with tokio-tungstenite, and
//! drives the REST surface with reqwest.

use std::sync::Arc;
use std::time::Duration;

use fitchat_proto::codec;
use fitchat_proto::event::{ClientEvent, SeenNotice, ServerEvent};
use fitchat_proto::message::{Message, MessageDraft};
use fitchat_proto::room::RoomKey;
use fitchat_server::directory::UserDirectory;
use fitchat_server::server::{start_server_with_state, ChatState};
use fitchat_server::store::{MessageStore, DEFAULT_STORE_TIMEOUT};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

type Ws = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn start_test_server() -> (std::net::SocketAddr, Arc<ChatState>) {
    let store = MessageStore::open_in_memory(DEFAULT_STORE_TIMEOUT)
        .await
        .unwrap();
    let directory = UserDirectory::new(store.pool().clone(), DEFAULT_STORE_TIMEOUT);
    directory.init().await.unwrap();
    let state = Arc::new(ChatState::new(store, directory));
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .unwrap();
    (addr, state)
}

async fn connect(addr: std::net::SocketAddr) -> Ws {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    ws
}

async fn send_event(ws: &mut Ws, event: &ClientEvent) {
    let text = codec::encode_client(event).unwrap();
    ws.send(tungstenite::Message::Text(text.into()))
        .await
        .unwrap();
}

/// Receives the next server event, skipping any non-text frames.
async fn recv_event(ws: &mut Ws) -> ServerEvent {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let tungstenite::Message::Text(text) = msg {
            return codec::decode_server(text.as_str()).unwrap();
        }
    }
}

/// Asserts that no event arrives within a short window.
async fn assert_silent(ws: &mut Ws) {
    let result = tokio::time::timeout(Duration::from_millis(300), ws.next()).await;
    assert!(result.is_err(), "expected no event, got {result:?}");
}

/// Polls until a room has the expected number of live members.
async fn wait_members(state: &ChatState, room: &RoomKey, expected: usize) {
    for _ in 0..200 {
        if state.registry.member_count(room).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("room {room} never reached {expected} members");
}

fn draft(from: &str, to: &str, content: &str) -> MessageDraft {
    MessageDraft {
        from: from.to_string(),
        to: to.to_string(),
        content: content.to_string(),
        timestamp: Some("2026-02-03T12:00:00Z".to_string()),
    }
}

#[tokio::test]
async fn send_mark_seen_and_history_scenario() {
    let (addr, state) = start_test_server().await;
    let room = RoomKey::resolve("alice", "bob").unwrap();

    let mut ws_alice = connect(addr).await;
    let mut ws_bob = connect(addr).await;
    send_event(
        &mut ws_alice,
        &ClientEvent::JoinRoom {
            room: "alice-bob".to_string(),
        },
    )
    .await;
    send_event(
        &mut ws_bob,
        &ClientEvent::JoinRoom {
            room: "alice-bob".to_string(),
        },
    )
    .await;
    wait_members(&state, &room, 2).await;

    send_event(
        &mut ws_alice,
        &ClientEvent::UsrMessage(draft("alice", "bob", "hi")),
    )
    .await;

    // Bob receives the stored message.
    let bob_event = recv_event(&mut ws_bob).await;
    let ServerEvent::SendMessage { message } = bob_event else {
        panic!("expected sendMessage, got {bob_event:?}");
    };
    assert_eq!(message.from, "alice");
    assert_eq!(message.to, "bob");
    assert_eq!(message.content, "hi");
    assert!(!message.seen);

    // The sender is not excluded: alice sees the canonical record too,
    // including the server-assigned id.
    let alice_event = recv_event(&mut ws_alice).await;
    let ServerEvent::SendMessage { message: echoed } = alice_event else {
        panic!("expected sendMessage, got {alice_event:?}");
    };
    assert_eq!(echoed.id, message.id);

    // Bob durably marks it seen via REST.
    let client = reqwest::Client::new();
    let response = client
        .put(format!("http://{addr}/messages/unseen/{}", message.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let updated: Message = response.json().await.unwrap();
    assert!(updated.seen);
    assert_eq!(updated.id, message.id);

    // History shows the flag, under either room-name order.
    let history: Vec<Message> = client
        .get(format!("http://{addr}/messages/alice-bob"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].seen);

    let reversed: Vec<Message> = client
        .get(format!("http://{addr}/messages/bob-alice"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history, reversed);
}

#[tokio::test]
async fn reversed_join_names_land_in_same_room() {
    let (addr, state) = start_test_server().await;
    let room = RoomKey::resolve("alice", "bob").unwrap();

    let mut ws_alice = connect(addr).await;
    let mut ws_bob = connect(addr).await;
    send_event(
        &mut ws_alice,
        &ClientEvent::JoinRoom {
            room: "alice-bob".to_string(),
        },
    )
    .await;
    send_event(
        &mut ws_bob,
        &ClientEvent::JoinRoom {
            room: "bob-alice".to_string(),
        },
    )
    .await;

    wait_members(&state, &room, 2).await;
}

#[tokio::test]
async fn empty_content_rejected_without_broadcast_or_record() {
    let (addr, state) = start_test_server().await;
    let room = RoomKey::resolve("alice", "bob").unwrap();

    let mut ws_alice = connect(addr).await;
    let mut ws_bob = connect(addr).await;
    for ws in [&mut ws_alice, &mut ws_bob] {
        send_event(
            ws,
            &ClientEvent::JoinRoom {
                room: "alice-bob".to_string(),
            },
        )
        .await;
    }
    wait_members(&state, &room, 2).await;

    send_event(
        &mut ws_alice,
        &ClientEvent::UsrMessage(draft("alice", "bob", "")),
    )
    .await;

    // Only the originating connection hears about the failure.
    let alice_event = recv_event(&mut ws_alice).await;
    assert!(
        matches!(alice_event, ServerEvent::Error { .. }),
        "expected error, got {alice_event:?}"
    );
    assert_silent(&mut ws_bob).await;

    // And nothing was stored.
    let history = state.store.conversation("alice", "bob").await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn saw_message_hint_reaches_only_other_members() {
    let (addr, state) = start_test_server().await;
    let room = RoomKey::resolve("alice", "bob").unwrap();

    let mut ws_alice = connect(addr).await;
    let mut ws_bob = connect(addr).await;
    for ws in [&mut ws_alice, &mut ws_bob] {
        send_event(
            ws,
            &ClientEvent::JoinRoom {
                room: "alice-bob".to_string(),
            },
        )
        .await;
    }
    wait_members(&state, &room, 2).await;

    send_event(
        &mut ws_bob,
        &ClientEvent::SawMessage(SeenNotice {
            from: "bob".to_string(),
            to: "alice".to_string(),
            id: None,
        }),
    )
    .await;

    let alice_event = recv_event(&mut ws_alice).await;
    match alice_event {
        ServerEvent::SawMessage { from, to, seen, .. } => {
            assert_eq!(from, "bob");
            assert_eq!(to, "alice");
            assert!(seen);
        }
        other => panic!("expected sawMessage, got {other:?}"),
    }
    // The sender's own connection is excluded from the hint.
    assert_silent(&mut ws_bob).await;

    // Live hints never touch the store.
    let history = state.store.conversation("alice", "bob").await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn messages_from_one_sender_arrive_in_send_order() {
    let (addr, state) = start_test_server().await;
    let room = RoomKey::resolve("alice", "bob").unwrap();

    let mut ws_alice = connect(addr).await;
    let mut ws_bob = connect(addr).await;
    for ws in [&mut ws_alice, &mut ws_bob] {
        send_event(
            ws,
            &ClientEvent::JoinRoom {
                room: "alice-bob".to_string(),
            },
        )
        .await;
    }
    wait_members(&state, &room, 2).await;

    for n in 0..5 {
        send_event(
            &mut ws_alice,
            &ClientEvent::UsrMessage(draft("alice", "bob", &format!("rep {n}"))),
        )
        .await;
    }

    for n in 0..5 {
        let event = recv_event(&mut ws_bob).await;
        let ServerEvent::SendMessage { message } = event else {
            panic!("expected sendMessage, got {event:?}");
        };
        assert_eq!(message.content, format!("rep {n}"));
    }

    // The stored history agrees with the delivery order.
    let history = state.store.conversation("alice", "bob").await.unwrap();
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["rep 0", "rep 1", "rep 2", "rep 3", "rep 4"]);
}

#[tokio::test]
async fn disconnected_member_is_no_longer_a_target() {
    let (addr, state) = start_test_server().await;
    let room = RoomKey::resolve("alice", "bob").unwrap();

    let mut ws_alice = connect(addr).await;
    let mut ws_bob = connect(addr).await;
    for ws in [&mut ws_alice, &mut ws_bob] {
        send_event(
            ws,
            &ClientEvent::JoinRoom {
                room: "alice-bob".to_string(),
            },
        )
        .await;
    }
    wait_members(&state, &room, 2).await;

    ws_bob.close(None).await.unwrap();
    wait_members(&state, &room, 1).await;

    send_event(
        &mut ws_alice,
        &ClientEvent::UsrMessage(draft("alice", "bob", "anyone there?")),
    )
    .await;

    // Alice still gets the canonical record; the message persists for bob
    // to fetch over REST later.
    let alice_event = recv_event(&mut ws_alice).await;
    assert!(matches!(alice_event, ServerEvent::SendMessage { .. }));
    let history = state.store.conversation("alice", "bob").await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn unseen_unknown_user_is_404() {
    let (addr, _state) = start_test_server().await;

    let response = reqwest::get(format!("http://{addr}/messages/unseen/ghost"))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn unseen_lists_then_empties_after_mark_seen() {
    let (addr, state) = start_test_server().await;
    state.directory.insert("u42", "bob").await.unwrap();

    let stored = state
        .store
        .append(draft("alice", "bob", "workout at 6?"))
        .await
        .unwrap();

    let client = reqwest::Client::new();
    let unseen: Vec<Message> = client
        .get(format!("http://{addr}/messages/unseen/u42"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unseen.len(), 1);
    assert_eq!(unseen[0].id, stored.id);

    client
        .put(format!("http://{addr}/messages/unseen/{}", stored.id))
        .send()
        .await
        .unwrap();

    let unseen_after: Vec<Message> = client
        .get(format!("http://{addr}/messages/unseen/u42"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(unseen_after.is_empty());
}

#[tokio::test]
async fn malformed_room_name_is_400() {
    let (addr, _state) = start_test_server().await;

    let response = reqwest::get(format!("http://{addr}/messages/justalice"))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let empty_side = reqwest::get(format!("http://{addr}/messages/alice-"))
        .await
        .unwrap();
    assert_eq!(empty_side.status(), 400);
}

#[tokio::test]
async fn unknown_message_id_put_is_404() {
    let (addr, _state) = start_test_server().await;

    let client = reqwest::Client::new();
    let response = client
        .put(format!(
            "http://{addr}/messages/unseen/00000000-0000-0000-0000-000000000000"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // An unparseable id is equally "not found".
    let response = client
        .put(format!("http://{addr}/messages/unseen/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn empty_history_is_200_with_empty_array() {
    let (addr, _state) = start_test_server().await;

    let response = reqwest::get(format!("http://{addr}/messages/carol-dave"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let history: Vec<Message> = response.json().await.unwrap();
    assert!(history.is_empty());
}
