//! Realtime collaborative drawing over WebSockets.
//!
//! SYSTEM CONTEXT
//! ==============
//! One server process holds any number of independent drawing sessions, each
//! an append-only stroke log with session-wide undo/redo. Clients keep a
//! local replica, draw optimistically, and converge through relayed edits
//! plus authoritative `canvas:rebuild` snapshots.
//!
//! Server side: [`state`], [`services`], [`routes`].
//! Client side: [`replica`], [`renderer`], [`scheduler`].
//! Shared: [`stroke`], [`protocol`].

pub mod protocol;
pub mod renderer;
pub mod replica;
pub mod routes;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod stroke;
