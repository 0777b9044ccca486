//! Client replica — local mirror, optimistic gesture, and redraw discipline.
//!
//! DESIGN
//! ======
//! The replica mirrors the last-known server log in `local_log` and owns at
//! most one optimistic in-flight gesture, which is deliberately NOT part of
//! the mirror: it is layered on top during ephemeral recomposition and only
//! moves into `local_log` at pointer-up. Authoritative rebuilds therefore
//! replace committed state wholesale without ever disturbing what the user
//! is currently drawing.
//!
//! Freehand motion is buffered and flushed at most once per frame as one
//! `stroke:update` batch — batching is the backpressure mechanism that keeps
//! the outbound rate independent of input sampling rate. Anchored tools
//! (rect/ellipse) have exactly one mutable point, so motion replaces it and
//! emits a single-point update per sample instead.
//!
//! All sends are fire-and-forget `try_send`: the render path never waits on
//! the network.

#[cfg(test)]
#[path = "replica_test.rs"]
mod tests;

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::protocol::{ClientMessage, ServerMessage, SessionEvents, SessionUser};
use crate::renderer::{CursorMarker, Layer, Renderer};
use crate::stroke::{PointSample, Stroke, StrokeId, ToolKind};

/// Minimum interval between cursor-only ephemeral redraws while idle.
const CURSOR_REDRAW_INTERVAL_MS: f64 = 100.0;

/// Width multiplier applied to the eraser so it clears comfortably more than
/// the brush lays down.
const ERASER_WIDTH_FACTOR: f64 = 3.0;

/// Drag-driven tool selection. Text and image placements are one-shot and go
/// through [`ClientReplica::place_text`] / [`ClientReplica::place_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragTool {
    #[default]
    Brush,
    Eraser,
    Rect,
    Ellipse,
}

/// Client-local mirror of the session plus the optimistic gesture state.
pub struct ClientReplica<R: Renderer> {
    renderer: R,
    outbox: mpsc::Sender<ClientMessage>,
    user_id: Uuid,

    // Tool settings, owned here so pointer events carry only geometry.
    tool: DragTool,
    color: String,
    width: f64,
    fill: bool,

    /// Last-known server state, keyed by stroke id.
    local_log: HashMap<StrokeId, Stroke>,
    /// Remote strokes started but not yet ended, in receipt order. Order is
    /// semantic: the eraser composites subtractively, so the ephemeral layer
    /// must be repainted in the order the strokes arrived.
    in_progress: Vec<StrokeId>,
    /// The one optimistic local gesture; never inside `local_log`.
    active_gesture: Option<Stroke>,
    /// Motion samples accumulated since the last frame flush.
    pending_points: Vec<PointSample>,

    /// Known peers (`user_id` -> presence color).
    peers: HashMap<Uuid, String>,
    /// Live peer cursors drawn on the ephemeral layer.
    cursors: HashMap<Uuid, CursorMarker>,
    last_cursor_redraw: f64,
}

impl<R: Renderer> ClientReplica<R> {
    #[must_use]
    pub fn new(user_id: Uuid, renderer: R, outbox: mpsc::Sender<ClientMessage>) -> Self {
        Self {
            renderer,
            outbox,
            user_id,
            tool: DragTool::default(),
            color: "#000000".to_string(),
            width: 3.0,
            fill: false,
            local_log: HashMap::new(),
            in_progress: Vec::new(),
            active_gesture: None,
            pending_points: Vec::new(),
            peers: HashMap::new(),
            cursors: HashMap::new(),
            last_cursor_redraw: 0.0,
        }
    }

    pub fn set_tool(&mut self, tool: DragTool) {
        self.tool = tool;
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = color.into();
    }

    pub fn set_width(&mut self, width: f64) {
        self.width = width;
    }

    pub fn set_fill(&mut self, fill: bool) {
        self.fill = fill;
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.renderer.resize(width, height);
    }

    /// The stroke currently being drawn, if any.
    #[must_use]
    pub fn active_gesture(&self) -> Option<&Stroke> {
        self.active_gesture.as_ref()
    }

    /// The committed stroke mirror.
    #[must_use]
    pub fn local_log(&self) -> &HashMap<StrokeId, Stroke> {
        &self.local_log
    }

    /// Known session peers (`user_id` -> presence color), as shown in a
    /// membership list.
    #[must_use]
    pub fn peers(&self) -> &HashMap<Uuid, String> {
        &self.peers
    }

    // =========================================================================
    // LOCAL GESTURE LIFECYCLE
    // =========================================================================

    /// Begin a gesture for the current drag tool. Renders optimistically into
    /// the ephemeral layer and emits `stroke:start` without waiting for the
    /// server echo.
    pub fn pointer_down(&mut self, x: f64, y: f64, t: f64) {
        if self.active_gesture.is_some() {
            return;
        }

        let anchor = PointSample::new(x, y, t);
        let stroke = match self.tool {
            DragTool::Brush => Stroke::new(self.user_id, ToolKind::Brush, self.color.clone(), self.width)
                .with_points(vec![anchor]),
            DragTool::Eraser => {
                // The eraser composites subtractively; color is nominal.
                Stroke::new(self.user_id, ToolKind::Eraser, "#FFF", self.width * ERASER_WIDTH_FACTOR)
                    .with_points(vec![anchor])
            }
            DragTool::Rect => {
                Stroke::new(self.user_id, ToolKind::Rect { fill: self.fill }, self.color.clone(), self.width)
                    .with_points(vec![anchor, anchor])
            }
            DragTool::Ellipse => Stroke::new(
                self.user_id,
                ToolKind::Ellipse { fill: self.fill },
                self.color.clone(),
                self.width,
            )
            .with_points(vec![anchor, anchor]),
        };

        self.emit(ClientMessage::StrokeStart { stroke: stroke.clone() });
        self.active_gesture = Some(stroke);
        self.recompose_ephemeral();
    }

    /// Feed one motion sample. Always shares the cursor position; if a
    /// gesture is live, extends it per the tool's update rule.
    pub fn pointer_move(&mut self, x: f64, y: f64, t: f64) {
        self.emit(ClientMessage::CursorMove { x, y });

        let Some(gesture) = self.active_gesture.as_mut() else {
            return;
        };
        let sample = PointSample::new(x, y, t);

        if gesture.tool.is_anchored() {
            // Exactly one mutable point: replace it and send it now.
            gesture.points[1] = sample;
            let stroke_id = gesture.stroke_id;
            self.emit(ClientMessage::StrokeUpdate { stroke_id, points: vec![sample] });
            self.recompose_ephemeral();
        } else {
            // Freehand: buffer; the frame tick flushes one batch per frame.
            self.pending_points.push(sample);
        }
    }

    /// End the gesture: flush any buffered tail batch, notify the server,
    /// commit the stroke to the persistent layer and the local mirror.
    pub fn pointer_up(&mut self) {
        self.flush_pending();
        let Some(gesture) = self.active_gesture.take() else {
            return;
        };

        self.emit(ClientMessage::StrokeEnd { stroke_id: gesture.stroke_id });
        self.renderer.draw_stroke(Layer::Persistent, &gesture);
        self.local_log.insert(gesture.stroke_id, gesture);
        self.pending_points.clear();
        self.recompose_ephemeral();
    }

    /// Place a text stroke at an anchor point. One-shot: start and end are
    /// emitted together and the stroke is committed immediately.
    pub fn place_text(&mut self, text: impl Into<String>, font_size: f64, x: f64, y: f64) {
        let stroke = Stroke::new(
            self.user_id,
            ToolKind::Text { text: text.into(), font_size },
            self.color.clone(),
            self.width,
        )
        .with_points(vec![PointSample::new(x, y, 0.0)]);
        self.place(stroke);
    }

    /// Place an image stroke at an anchor point. Display width rides on the
    /// shared width field.
    pub fn place_image(&mut self, image_data: impl Into<String>, width: f64, height: f64, x: f64, y: f64) {
        let stroke = Stroke::new(
            self.user_id,
            ToolKind::Image { image_data: image_data.into(), height },
            self.color.clone(),
            width,
        )
        .with_points(vec![PointSample::new(x, y, 0.0)]);
        self.place(stroke);
    }

    fn place(&mut self, stroke: Stroke) {
        self.emit(ClientMessage::StrokeStart { stroke: stroke.clone() });
        self.emit(ClientMessage::StrokeEnd { stroke_id: stroke.stroke_id });
        self.renderer.draw_stroke(Layer::Persistent, &stroke);
        self.local_log.insert(stroke.stroke_id, stroke);
    }

    // =========================================================================
    // FRAME TICK
    // =========================================================================

    /// One render-frame tick. Flushes the freehand batch (at most one update
    /// per frame) and recomposites the ephemeral layer; while idle, cursor
    /// redraws are throttled to avoid flicker.
    pub fn on_frame(&mut self, now_ms: f64) {
        if self.active_gesture.is_some() {
            if self.flush_pending() {
                self.last_cursor_redraw = now_ms;
            }
            self.recompose_ephemeral();
        } else if now_ms - self.last_cursor_redraw > CURSOR_REDRAW_INTERVAL_MS {
            self.recompose_ephemeral();
            self.last_cursor_redraw = now_ms;
        }
    }

    /// Drain the pending buffer into the gesture and emit it as one batch.
    /// Returns `true` if anything was flushed.
    fn flush_pending(&mut self) -> bool {
        let Some(gesture) = self.active_gesture.as_mut() else {
            return false;
        };
        if self.pending_points.is_empty() {
            return false;
        }

        let batch = std::mem::take(&mut self.pending_points);
        gesture.points.extend_from_slice(&batch);
        let stroke_id = gesture.stroke_id;
        self.emit(ClientMessage::StrokeUpdate { stroke_id, points: batch });
        true
    }

    // =========================================================================
    // REDRAW
    // =========================================================================

    /// Fully clear and recomposite the ephemeral layer: remote in-progress
    /// strokes in receipt order, then the local gesture on top, then cursors. Incremental
    /// drawing is not an option here — the eraser's subtractive compositing
    /// makes any partial redraw corrupt the layered result.
    fn recompose_ephemeral(&mut self) {
        self.renderer.clear(Layer::Ephemeral);

        for id in &self.in_progress {
            if let Some(stroke) = self.local_log.get(id) {
                if stroke.active {
                    self.renderer.draw_stroke(Layer::Ephemeral, stroke);
                }
            }
        }

        if let Some(gesture) = &self.active_gesture {
            self.renderer.draw_stroke(Layer::Ephemeral, gesture);
        }

        let mut markers: Vec<CursorMarker> = self.cursors.values().cloned().collect();
        markers.sort_by_key(|m| m.user_id);
        self.renderer.draw_cursors(Layer::Ephemeral, &markers);
    }

    fn emit(&self, message: ClientMessage) {
        // Fire-and-forget; a dropped send is recovered by the next rebuild.
        if self.outbox.try_send(message).is_err() {
            warn!("replica outbox full or closed; dropping message");
        }
    }

    /// Convenience for transport adapters holding a [`ServerMessage`].
    pub fn apply(&mut self, message: ServerMessage) {
        crate::protocol::dispatch(self, message);
    }
}

// =============================================================================
// SERVER EVENT HANDLING
// =============================================================================

impl<R: Renderer> SessionEvents for ClientReplica<R> {
    fn on_stroke_start(&mut self, stroke: Stroke) {
        if !self.in_progress.contains(&stroke.stroke_id) {
            self.in_progress.push(stroke.stroke_id);
        }
        self.local_log.insert(stroke.stroke_id, stroke);
        self.recompose_ephemeral();
    }

    fn on_stroke_update(&mut self, stroke_id: StrokeId, points: Vec<PointSample>) {
        // Unknown reference: drop the batch silently, same as the server.
        let Some(stroke) = self.local_log.get_mut(&stroke_id) else {
            return;
        };
        stroke.points.extend(points);
        self.recompose_ephemeral();
    }

    fn on_stroke_end(&mut self, stroke_id: StrokeId) {
        if let Some(stroke) = self.local_log.get(&stroke_id) {
            self.renderer.draw_stroke(Layer::Persistent, stroke);
        }
        self.in_progress.retain(|id| *id != stroke_id);
        self.recompose_ephemeral();
    }

    /// Authoritative rebuild: replace the mirror wholesale and repaint the
    /// persistent layer from active strokes only. The local in-flight
    /// gesture is not part of the mirror and is left untouched — it rides on
    /// top at the next ephemeral recomposition.
    fn on_canvas_rebuild(&mut self, strokes: Vec<Stroke>) {
        self.renderer.clear(Layer::Persistent);

        self.local_log.clear();
        for stroke in strokes {
            if stroke.active {
                self.renderer.draw_stroke(Layer::Persistent, &stroke);
            }
            self.local_log.insert(stroke.stroke_id, stroke);
        }
        let log = &self.local_log;
        self.in_progress.retain(|id| log.contains_key(id));

        self.recompose_ephemeral();
    }

    fn on_users_list(&mut self, users: Vec<SessionUser>) {
        self.peers = users.into_iter().map(|u| (u.user_id, u.color)).collect();
    }

    fn on_user_joined(&mut self, user_id: Uuid, color: String) {
        self.peers.insert(user_id, color);
    }

    fn on_user_left(&mut self, user_id: Uuid) {
        self.peers.remove(&user_id);
        if self.cursors.remove(&user_id).is_some() {
            self.recompose_ephemeral();
        }
    }

    fn on_cursor_update(&mut self, user_id: Uuid, x: f64, y: f64, color: String) {
        // Only the marker moves here; the throttled frame tick repaints.
        self.cursors.insert(user_id, CursorMarker { user_id, x, y, color });
    }
}
