use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use uuid::Uuid;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::routes;
use crate::state::test_helpers::{dummy_stroke, register_client};
use crate::state::AppState;
use crate::stroke::PointSample;

use super::{Outcome, apply_message, process_inbound_text};

const SESSION: &str = "test";

fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(m) = rx.try_recv() {
        out.push(m);
    }
    out
}

// =============================================================================
// APPLY
// =============================================================================

#[tokio::test]
async fn stroke_start_stamps_sender_and_forces_active() {
    let state = AppState::new();
    let sender = Uuid::new_v4();

    let mut stroke = dummy_stroke(Uuid::new_v4());
    stroke.active = false;

    let outcome = apply_message(&state, SESSION, sender, ClientMessage::StrokeStart { stroke }).await;

    let Outcome::Peers(ServerMessage::StrokeStart { stroke }) = outcome else {
        panic!("expected a peer relay");
    };
    assert_eq!(stroke.user_id, sender, "payload author must be overwritten");
    assert!(stroke.active, "payload visibility must be overwritten");

    let sessions = state.sessions.read().await;
    assert_eq!(sessions.get(SESSION).unwrap().log.len(), 1);
}

#[tokio::test]
async fn full_stroke_lifecycle_accumulates_points() {
    let state = AppState::new();
    let sender = Uuid::new_v4();

    let stroke = dummy_stroke(sender);
    let stroke_id = stroke.stroke_id;
    apply_message(&state, SESSION, sender, ClientMessage::StrokeStart { stroke }).await;

    // Three frame-batches of five points each.
    for batch in 0..3 {
        let points: Vec<PointSample> = (0..5)
            .map(|i| PointSample::new(f64::from(batch * 5 + i), 0.0, 0.0))
            .collect();
        let outcome =
            apply_message(&state, SESSION, sender, ClientMessage::StrokeUpdate { stroke_id, points }).await;
        assert!(matches!(outcome, Outcome::Peers(ServerMessage::StrokeUpdate { .. })));
    }

    let outcome = apply_message(&state, SESSION, sender, ClientMessage::StrokeEnd { stroke_id }).await;
    assert!(matches!(outcome, Outcome::Peers(ServerMessage::StrokeEnd { .. })));

    let sessions = state.sessions.read().await;
    let stored = sessions.get(SESSION).unwrap().log.get(stroke_id).unwrap();
    assert_eq!(stored.points.len(), 16, "anchor plus three batches of five");
    assert!(stored.active);
}

#[tokio::test]
async fn update_for_unknown_stroke_relays_nothing() {
    let state = AppState::new();
    let outcome = apply_message(
        &state,
        SESSION,
        Uuid::new_v4(),
        ClientMessage::StrokeUpdate {
            stroke_id: Uuid::new_v4(),
            points: vec![PointSample::new(1.0, 1.0, 0.0)],
        },
    )
    .await;
    assert!(matches!(outcome, Outcome::Silent));
}

#[tokio::test]
async fn undo_is_authoritative_for_everyone() {
    let state = AppState::new();
    let sender = Uuid::new_v4();

    let stroke = dummy_stroke(sender);
    let stroke_id = stroke.stroke_id;
    apply_message(&state, SESSION, sender, ClientMessage::StrokeStart { stroke }).await;
    apply_message(&state, SESSION, sender, ClientMessage::StrokeEnd { stroke_id }).await;

    let outcome = apply_message(&state, SESSION, sender, ClientMessage::Undo).await;
    let Outcome::Everyone(ServerMessage::CanvasRebuild { strokes }) = outcome else {
        panic!("undo must rebuild everyone, sender included");
    };
    assert_eq!(strokes.len(), 1);
    assert!(!strokes[0].active);

    let outcome = apply_message(&state, SESSION, sender, ClientMessage::Redo).await;
    let Outcome::Everyone(ServerMessage::CanvasRebuild { strokes }) = outcome else {
        panic!("redo must rebuild everyone, sender included");
    };
    assert!(strokes[0].active);
}

#[tokio::test]
async fn undo_on_empty_session_still_rebuilds() {
    let state = AppState::new();
    let outcome = apply_message(&state, SESSION, Uuid::new_v4(), ClientMessage::Undo).await;
    let Outcome::Everyone(ServerMessage::CanvasRebuild { strokes }) = outcome else {
        panic!("expected a rebuild");
    };
    assert!(strokes.is_empty());
}

#[tokio::test]
async fn cursor_move_relays_with_presence_color() {
    let state = AppState::new();
    let sender = Uuid::new_v4();
    let _rx = register_client(&state, SESSION, sender, "#4ECDC4").await;

    let outcome =
        apply_message(&state, SESSION, sender, ClientMessage::CursorMove { x: 3.0, y: 4.0 }).await;
    let Outcome::Peers(ServerMessage::CursorUpdate { user_id, x, y, color }) = outcome else {
        panic!("expected a cursor relay");
    };
    assert_eq!(user_id, sender);
    assert!((x - 3.0).abs() < f64::EPSILON && (y - 4.0).abs() < f64::EPSILON);
    assert_eq!(color, "#4ECDC4");
}

// =============================================================================
// DISPATCH
// =============================================================================

#[tokio::test]
async fn malformed_text_gets_an_error_reply_and_touches_nothing() {
    let state = AppState::new();
    let replies = process_inbound_text(&state, SESSION, Uuid::new_v4(), "{not json").await;
    assert!(matches!(&replies[..], [ServerMessage::Error { .. }]));
    assert!(state.sessions.read().await.is_empty());
}

#[tokio::test]
async fn relays_exclude_sender_but_rebuilds_include_them() {
    let state = AppState::new();
    let sender = Uuid::new_v4();
    let peer = Uuid::new_v4();
    let mut sender_rx = register_client(&state, SESSION, sender, "#FF6B6B").await;
    let mut peer_rx = register_client(&state, SESSION, peer, "#4ECDC4").await;

    let stroke = dummy_stroke(sender);
    let text = serde_json::to_string(&ClientMessage::StrokeStart { stroke }).unwrap();
    process_inbound_text(&state, SESSION, sender, &text).await;

    assert!(drain(&mut sender_rx).is_empty(), "sender already applied optimistically");
    assert!(matches!(&drain(&mut peer_rx)[..], [ServerMessage::StrokeStart { .. }]));

    let text = serde_json::to_string(&ClientMessage::Undo).unwrap();
    process_inbound_text(&state, SESSION, sender, &text).await;

    assert!(matches!(&drain(&mut sender_rx)[..], [ServerMessage::CanvasRebuild { .. }]));
    assert!(matches!(&drain(&mut peer_rx)[..], [ServerMessage::CanvasRebuild { .. }]));
}

#[tokio::test]
async fn sessions_do_not_leak_into_each_other() {
    let state = AppState::new();
    let sender = Uuid::new_v4();
    let mut other_rx = register_client(&state, "other", Uuid::new_v4(), "#FFD166").await;

    let stroke = dummy_stroke(sender);
    let text = serde_json::to_string(&ClientMessage::StrokeStart { stroke }).unwrap();
    process_inbound_text(&state, SESSION, sender, &text).await;

    assert!(drain(&mut other_rx).is_empty());
}

// =============================================================================
// END TO END
// =============================================================================

async fn spawn_server() -> String {
    let state = AppState::new();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, routes::app(state)).await.unwrap();
    });
    format!("ws://{addr}/ws?session=e2e")
}

async fn recv_message(
    socket: &mut (impl futures::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin),
) -> ServerMessage {
    loop {
        let frame = socket.next().await.expect("socket closed").expect("socket error");
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(&text).expect("unparseable server message");
        }
    }
}

#[tokio::test]
async fn connect_greeting_then_peer_relay() {
    let url = spawn_server().await;

    let (mut alice, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    // Greeting sequence: welcome, membership, initial snapshot.
    let ServerMessage::Connected { user_id: alice_id, .. } = recv_message(&mut alice).await else {
        panic!("expected session:connected first");
    };
    let ServerMessage::UsersList { users } = recv_message(&mut alice).await else {
        panic!("expected users:list second");
    };
    assert!(users.iter().any(|u| u.user_id == alice_id));
    let ServerMessage::CanvasRebuild { strokes } = recv_message(&mut alice).await else {
        panic!("expected canvas:rebuild third");
    };
    assert!(strokes.is_empty());

    let (mut bob, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let ServerMessage::Connected { user_id: bob_id, .. } = recv_message(&mut bob).await else {
        panic!("expected session:connected first");
    };
    recv_message(&mut bob).await; // users:list
    recv_message(&mut bob).await; // canvas:rebuild

    // Existing participant learns of the join.
    let ServerMessage::UserJoined { user_id, .. } = recv_message(&mut alice).await else {
        panic!("expected user:joined");
    };
    assert_eq!(user_id, bob_id);

    // Bob draws; Alice receives the relay stamped with Bob's id.
    let stroke = dummy_stroke(Uuid::new_v4());
    let text = serde_json::to_string(&ClientMessage::StrokeStart { stroke }).unwrap();
    bob.send(WsMessage::Text(text.into())).await.unwrap();

    let ServerMessage::StrokeStart { stroke } = recv_message(&mut alice).await else {
        panic!("expected stroke:start relay");
    };
    assert_eq!(stroke.user_id, bob_id);

    // Late joiner reconstructs the canvas from the snapshot.
    let (mut carol, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    recv_message(&mut carol).await; // session:connected
    recv_message(&mut carol).await; // users:list
    let ServerMessage::CanvasRebuild { strokes } = recv_message(&mut carol).await else {
        panic!("expected canvas:rebuild");
    };
    assert_eq!(strokes.len(), 1);
}
