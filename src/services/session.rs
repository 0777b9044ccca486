//! Session service — registry, join/part, and fan-out.
//!
//! DESIGN
//! ======
//! Sessions are pure in-memory: created lazily on first reference via the
//! entry API and retained for the process lifetime. Parting a session only
//! purges the participant — the stroke log stays so late joiners and
//! reconnects always reconstruct the same canvas.
//!
//! Fan-out is best-effort `try_send` per client: a participant whose channel
//! is full misses that message and catches up on the next full rebuild.

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::collections::HashMap;

use rand::Rng;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::protocol::{ServerMessage, SessionUser};
use crate::state::{AppState, Participant, SessionState};
use crate::stroke::Stroke;

/// Presence palette assigned round-robin-by-chance to joining participants.
const COLOR_PALETTE: [&str; 7] =
    ["#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8", "#C197FF", "#FFD166"];

/// Pick a presence color for a joining participant.
#[must_use]
pub fn assign_color() -> String {
    let idx = rand::rng().random_range(0..COLOR_PALETTE.len());
    COLOR_PALETTE[idx].to_string()
}

/// Everything a joining client needs to render the current session state.
pub struct JoinSnapshot {
    /// Color assigned to the joining participant.
    pub color: String,
    /// Membership list including the joiner.
    pub users: Vec<SessionUser>,
    /// Full authoritative stroke history.
    pub strokes: Vec<Stroke>,
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Return the session for `key`, creating an empty one on first reference.
pub fn get_or_create<'a>(
    sessions: &'a mut HashMap<String, SessionState>,
    key: &str,
) -> &'a mut SessionState {
    sessions.entry(key.to_string()).or_default()
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Join a session: assign a color, register the client's outbox, and return
/// the membership list plus a full log snapshot for the initial rebuild.
pub async fn join_session(
    state: &AppState,
    session_key: &str,
    user_id: Uuid,
    tx: mpsc::Sender<ServerMessage>,
) -> JoinSnapshot {
    let mut sessions = state.sessions.write().await;
    let session = get_or_create(&mut sessions, session_key);

    let color = assign_color();
    session.clients.insert(user_id, tx);
    session.users.insert(user_id, Participant { color: color.clone() });

    let users = membership(session);
    let strokes = session.log.snapshot();

    info!(session = session_key, %user_id, clients = session.clients.len(), "client joined session");
    JoinSnapshot { color, users, strokes }
}

/// Leave a session. Purges the participant; the log is retained so the
/// canvas survives everyone disconnecting.
pub async fn part_session(state: &AppState, session_key: &str, user_id: Uuid) {
    let mut sessions = state.sessions.write().await;
    let Some(session) = sessions.get_mut(session_key) else {
        return;
    };

    session.clients.remove(&user_id);
    session.users.remove(&user_id);
    info!(session = session_key, %user_id, remaining = session.clients.len(), "client left session");
}

/// Current membership list (`user_id` + color per participant).
#[must_use]
pub fn membership(session: &SessionState) -> Vec<SessionUser> {
    session
        .users
        .iter()
        .map(|(user_id, participant)| SessionUser { user_id: *user_id, color: participant.color.clone() })
        .collect()
}

/// Presence color of a connected participant, if known.
pub async fn user_color(state: &AppState, session_key: &str, user_id: Uuid) -> Option<String> {
    let sessions = state.sessions.read().await;
    sessions
        .get(session_key)?
        .users
        .get(&user_id)
        .map(|p| p.color.clone())
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Broadcast a message to all clients in a session, optionally excluding one.
pub async fn broadcast(state: &AppState, session_key: &str, message: &ServerMessage, exclude: Option<Uuid>) {
    let sessions = state.sessions.read().await;
    let Some(session) = sessions.get(session_key) else {
        return;
    };

    for (user_id, tx) in &session.clients {
        if exclude == Some(*user_id) {
            continue;
        }
        // Best-effort: if a client's channel is full, skip it.
        let _ = tx.try_send(message.clone());
    }
}
