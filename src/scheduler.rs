//! Frame scheduler — drives the replica's per-frame tick.
//!
//! One repeating task stands in for the display's frame callback: every
//! interval it takes the replica lock and runs [`ClientReplica::on_frame`],
//! which flushes the pending freehand batch and recomposites the ephemeral
//! layer. Missed ticks are skipped rather than bursted — replaying stale
//! frames would only emit redundant updates.

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::renderer::Renderer;
use crate::replica::ClientReplica;

/// Default tick interval, roughly one display frame.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Handle to the running tick task. Dropping it stops the ticks.
pub struct FrameScheduler {
    handle: JoinHandle<()>,
}

impl FrameScheduler {
    /// Spawn the tick task over a shared replica.
    #[must_use]
    pub fn spawn<R>(replica: Arc<Mutex<ClientReplica<R>>>, interval: Duration) -> Self
    where
        R: Renderer + 'static,
    {
        let handle = tokio::spawn(async move {
            let start = Instant::now();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let now_ms = start.elapsed().as_secs_f64() * 1000.0;
                replica.lock().await.on_frame(now_ms);
            }
        });
        Self { handle }
    }

    /// Stop ticking. Idempotent; the in-flight tick (if any) completes.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
