//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor — the
//! session registry is an explicit dependency, never a process global. Each
//! session owns one authoritative stroke log and one live participant map.
//! Sessions are created lazily on first reference and retained for the
//! process lifetime; nothing is ever evicted (a documented scaling limit).
//!
//! Every log mutation for a session runs to completion under the write lock:
//! undo/redo/append are scan-then-mutate compounds and must never interleave.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::protocol::ServerMessage;
use crate::services::log::StrokeLog;

// =============================================================================
// PARTICIPANT
// =============================================================================

/// Live membership entry for one connected participant.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Presence color assigned at join, shown on cursors and user lists.
    pub color: String,
}

// =============================================================================
// SESSION STATE
// =============================================================================

/// Per-session live state: the authoritative log plus connected clients.
pub struct SessionState {
    /// Append-only stroke history and undo/redo machine.
    pub log: StrokeLog,
    /// Connected clients: `user_id` -> sender for outgoing messages.
    pub clients: HashMap<Uuid, mpsc::Sender<ServerMessage>>,
    /// Live membership keyed by `user_id`.
    pub users: HashMap<Uuid, Participant>,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self { log: StrokeLog::new(), clients: HashMap::new(), users: HashMap::new() }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state. Clone is required by Axum — the session map is
/// Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    /// All live sessions keyed by external session key.
    pub sessions: Arc<RwLock<HashMap<String, SessionState>>>,
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())) }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
