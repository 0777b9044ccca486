//! WebSocket handler — bidirectional message relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a participant id and enters a `select!` loop:
//! - Incoming client messages → parse + apply to the session log
//! - Broadcast messages from session peers → forward to the client
//!
//! `apply_message` is pure business logic — it mutates the log under the
//! session write lock and returns an [`Outcome`]. The dispatch layer owns all
//! fan-out: relays go to peers only, while undo/redo push an authoritative
//! `canvas:rebuild` to everyone including the sender.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → join session → send `session:connected`, `users:list`, and
//!    the initial `canvas:rebuild`; peers get `user:joined`
//! 2. Client sends messages → apply → fan out per Outcome
//! 3. Close → part session → peers get `user:left`

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::protocol::{self, ClientMessage, ServerMessage};
use crate::services;
use crate::state::AppState;

/// Session key used when the client supplies none.
const DEFAULT_SESSION: &str = "default";

/// Outbox capacity per connected client. A client that falls this far behind
/// starts missing relays and recovers on the next rebuild.
const CLIENT_QUEUE_CAPACITY: usize = 256;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result of applying one inbound message. The dispatch layer uses this to
/// decide who receives what — `apply_message` never sends anything itself.
enum Outcome {
    /// Relay to all session peers, excluding the sender.
    Peers(ServerMessage),
    /// Authoritative fan-out to every participant including the sender.
    Everyone(ServerMessage),
    /// Nothing to send (dropped batch, empty-history undo, and the like).
    Silent,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let session_key = params
        .get("session")
        .cloned()
        .unwrap_or_else(|| DEFAULT_SESSION.to_string());
    ws.on_upgrade(move |socket| run_ws(socket, state, session_key))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, session_key: String) {
    let user_id = Uuid::new_v4();

    // Per-connection channel for receiving broadcast messages from peers.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerMessage>(CLIENT_QUEUE_CAPACITY);

    let joined = services::session::join_session(&state, &session_key, user_id, client_tx).await;
    let color = joined.color.clone();

    // Welcome, membership, and the initial authoritative snapshot.
    let greeting = [
        ServerMessage::Connected { user_id, color: color.clone() },
        ServerMessage::UsersList { users: joined.users },
        ServerMessage::CanvasRebuild { strokes: joined.strokes },
    ];
    for message in greeting {
        if send_message(&mut socket, &message).await.is_err() {
            services::session::part_session(&state, &session_key, user_id).await;
            return;
        }
    }

    let announce = ServerMessage::UserJoined { user_id, color };
    services::session::broadcast(&state, &session_key, &announce, Some(user_id)).await;

    info!(%user_id, session = %session_key, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        for reply in process_inbound_text(&state, &session_key, user_id, &text).await {
                            if send_message(&mut socket, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(message) = client_rx.recv() => {
                if send_message(&mut socket, &message).await.is_err() {
                    break;
                }
            }
        }
    }

    services::session::part_session(&state, &session_key, user_id).await;
    let farewell = ServerMessage::UserLeft { user_id };
    services::session::broadcast(&state, &session_key, &farewell, Some(user_id)).await;
    info!(%user_id, session = %session_key, "ws: client disconnected");
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Parse and apply one inbound text message; returns messages for the
/// sender. Fan-out to peers happens here; the sender's own copies of
/// everyone-broadcasts arrive through its session outbox.
async fn process_inbound_text(
    state: &AppState,
    session_key: &str,
    user_id: Uuid,
    text: &str,
) -> Vec<ServerMessage> {
    let message = match protocol::parse_client_message(text) {
        Ok(m) => m,
        Err(e) => {
            warn!(%user_id, error = %e, "ws: rejected inbound message");
            return vec![ServerMessage::Error { message: e.to_string() }];
        }
    };

    if !matches!(message, ClientMessage::CursorMove { .. }) {
        info!(%user_id, session = %session_key, event = message_name(&message), "ws: recv");
    }

    match apply_message(state, session_key, user_id, message).await {
        Outcome::Peers(relay) => {
            services::session::broadcast(state, session_key, &relay, Some(user_id)).await;
        }
        Outcome::Everyone(authoritative) => {
            services::session::broadcast(state, session_key, &authoritative, None).await;
        }
        Outcome::Silent => {}
    }
    vec![]
}

/// Apply one message to the session. Log mutations run to completion under
/// the write lock — undo/redo/append are scan-then-mutate compounds and must
/// never interleave with other mutations of the same session.
async fn apply_message(
    state: &AppState,
    session_key: &str,
    user_id: Uuid,
    message: ClientMessage,
) -> Outcome {
    match message {
        ClientMessage::StrokeStart { mut stroke } => {
            // Stamp the authenticated sender and force visibility: the
            // server, not the payload, decides both.
            stroke.user_id = user_id;
            stroke.active = true;

            let mut sessions = state.sessions.write().await;
            let session = services::session::get_or_create(&mut sessions, session_key);
            session.log.append(stroke.clone());
            Outcome::Peers(ServerMessage::StrokeStart { stroke })
        }
        ClientMessage::StrokeUpdate { stroke_id, points } => {
            let mut sessions = state.sessions.write().await;
            let session = services::session::get_or_create(&mut sessions, session_key);
            if session.log.get(stroke_id).is_none() {
                // Unknown reference: drop the batch, relay nothing.
                return Outcome::Silent;
            }
            session.log.append_points(stroke_id, &points);
            Outcome::Peers(ServerMessage::StrokeUpdate { stroke_id, points })
        }
        ClientMessage::StrokeEnd { stroke_id } => {
            let mut sessions = state.sessions.write().await;
            let session = services::session::get_or_create(&mut sessions, session_key);
            session.log.commit(stroke_id);
            Outcome::Peers(ServerMessage::StrokeEnd { stroke_id })
        }
        ClientMessage::Undo => {
            let mut sessions = state.sessions.write().await;
            let session = services::session::get_or_create(&mut sessions, session_key);
            session.log.undo();
            Outcome::Everyone(ServerMessage::CanvasRebuild { strokes: session.log.snapshot() })
        }
        ClientMessage::Redo => {
            let mut sessions = state.sessions.write().await;
            let session = services::session::get_or_create(&mut sessions, session_key);
            session.log.redo();
            Outcome::Everyone(ServerMessage::CanvasRebuild { strokes: session.log.snapshot() })
        }
        ClientMessage::CursorMove { x, y } => {
            let color = services::session::user_color(state, session_key, user_id)
                .await
                .unwrap_or_default();
            Outcome::Peers(ServerMessage::CursorUpdate { user_id, x, y, color })
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn message_name(message: &ClientMessage) -> &'static str {
    match message {
        ClientMessage::StrokeStart { .. } => "stroke:start",
        ClientMessage::StrokeUpdate { .. } => "stroke:update",
        ClientMessage::StrokeEnd { .. } => "stroke:end",
        ClientMessage::Undo => "undo",
        ClientMessage::Redo => "redo",
        ClientMessage::CursorMove { .. } => "cursor:move",
    }
}

async fn send_message(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize message");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
