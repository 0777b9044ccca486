//! Domain services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the authoritative session state so the route layer
//! can stay focused on protocol translation and fan-out plumbing.

pub mod log;
pub mod session;
