//! Protocol — the message taxonomy binding clients to the session log.
//!
//! ARCHITECTURE
//! ============
//! Every message is one internally tagged JSON object discriminated by
//! `event`. Clients send [`ClientMessage`]s over the WebSocket; the server
//! dispatches, mutates the session's [`crate::services::log::StrokeLog`], and
//! fans [`ServerMessage`]s out to peers. Undo and redo never relay an
//! incremental edit — they trigger a full authoritative `canvas:rebuild`.
//!
//! DESIGN
//! ======
//! - Per-connection ordering is the transport's job; per-stroke point batches
//!   therefore arrive in send order. Nothing is guaranteed across strokes.
//! - [`SessionEvents`] is the client-side seam: a trait of named notification
//!   methods implemented by the replica and invoked by the transport adapter,
//!   with [`dispatch`] doing the enum-to-method translation.

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stroke::{PointSample, Stroke, StrokeId};

// =============================================================================
// ERRORS
// =============================================================================

/// Boundary rejection for inbound traffic. The session log is never touched
/// by a frame that fails to parse.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parse one inbound client message, rejecting malformed payloads.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if the text is not a valid message.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

// =============================================================================
// CLIENT → SERVER
// =============================================================================

/// Messages a client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ClientMessage {
    /// Begin a stroke. The server appends it to the session log with
    /// `active` forced true and relays it to peers.
    #[serde(rename = "stroke:start")]
    StrokeStart { stroke: Stroke },
    /// Append a batch of points to a live stroke. Relayed batch-only.
    #[serde(rename = "stroke:update")]
    StrokeUpdate { stroke_id: StrokeId, points: Vec<PointSample> },
    /// Finish a stroke. Relayed as an id-only notice.
    #[serde(rename = "stroke:end")]
    StrokeEnd { stroke_id: StrokeId },
    /// Deactivate the most recently appended active stroke (session-wide).
    #[serde(rename = "undo")]
    Undo,
    /// Reactivate the most recently undone stroke.
    #[serde(rename = "redo")]
    Redo,
    /// Ephemeral cursor position. Never touches the log.
    #[serde(rename = "cursor:move")]
    CursorMove { x: f64, y: f64 },
}

// =============================================================================
// SERVER → CLIENT
// =============================================================================

/// One entry of the membership list sent to a joining client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: Uuid,
    pub color: String,
}

/// Messages the server may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ServerMessage {
    /// Welcome: the server-assigned participant id and color.
    #[serde(rename = "session:connected")]
    Connected { user_id: Uuid, color: String },
    /// A peer started a stroke.
    #[serde(rename = "stroke:start")]
    StrokeStart { stroke: Stroke },
    /// A peer appended points to a live stroke.
    #[serde(rename = "stroke:update")]
    StrokeUpdate { stroke_id: StrokeId, points: Vec<PointSample> },
    /// A peer finished a stroke.
    #[serde(rename = "stroke:end")]
    StrokeEnd { stroke_id: StrokeId },
    /// Authoritative full snapshot. Replaces the client's mirror wholesale;
    /// sent on join and after every undo/redo.
    #[serde(rename = "canvas:rebuild")]
    CanvasRebuild { strokes: Vec<Stroke> },
    /// Full membership list, sent to a joining client.
    #[serde(rename = "users:list")]
    UsersList { users: Vec<SessionUser> },
    /// Incremental join notice for existing participants.
    #[serde(rename = "user:joined")]
    UserJoined { user_id: Uuid, color: String },
    /// A participant disconnected.
    #[serde(rename = "user:left")]
    UserLeft { user_id: Uuid },
    /// A peer's cursor moved.
    #[serde(rename = "cursor:update")]
    CursorUpdate { user_id: Uuid, x: f64, y: f64, color: String },
    /// Boundary rejection of a malformed inbound message.
    #[serde(rename = "error")]
    Error { message: String },
}

// =============================================================================
// CLIENT-SIDE EVENT SEAM
// =============================================================================

/// Named notification methods invoked by the transport adapter as server
/// messages arrive. Implemented by the client replica; the welcome and error
/// messages are connection-level concerns handled before a replica exists.
pub trait SessionEvents {
    fn on_stroke_start(&mut self, stroke: Stroke);
    fn on_stroke_update(&mut self, stroke_id: StrokeId, points: Vec<PointSample>);
    fn on_stroke_end(&mut self, stroke_id: StrokeId);
    fn on_canvas_rebuild(&mut self, strokes: Vec<Stroke>);
    fn on_users_list(&mut self, users: Vec<SessionUser>);
    fn on_user_joined(&mut self, user_id: Uuid, color: String);
    fn on_user_left(&mut self, user_id: Uuid);
    fn on_cursor_update(&mut self, user_id: Uuid, x: f64, y: f64, color: String);
}

/// Translate a server message into the matching [`SessionEvents`] call.
/// `session:connected` and `error` are left to the caller.
pub fn dispatch(events: &mut impl SessionEvents, message: ServerMessage) {
    match message {
        ServerMessage::StrokeStart { stroke } => events.on_stroke_start(stroke),
        ServerMessage::StrokeUpdate { stroke_id, points } => events.on_stroke_update(stroke_id, points),
        ServerMessage::StrokeEnd { stroke_id } => events.on_stroke_end(stroke_id),
        ServerMessage::CanvasRebuild { strokes } => events.on_canvas_rebuild(strokes),
        ServerMessage::UsersList { users } => events.on_users_list(users),
        ServerMessage::UserJoined { user_id, color } => events.on_user_joined(user_id, color),
        ServerMessage::UserLeft { user_id } => events.on_user_left(user_id),
        ServerMessage::CursorUpdate { user_id, x, y, color } => events.on_cursor_update(user_id, x, y, color),
        ServerMessage::Connected { .. } | ServerMessage::Error { .. } => {}
    }
}
