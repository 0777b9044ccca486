//! Stroke log — per-session authoritative history and undo/redo machine.
//!
//! DESIGN
//! ======
//! The log is append-only: a stroke, once appended, is never removed. Undo
//! and redo only toggle `active`, which makes them a cheap reversible
//! projection over the history rather than deletion. The redo stack holds
//! stroke ids (most-recently-undone last) since the strokes themselves stay
//! in `history`.
//!
//! Undo targets the most recently *appended* stroke that is still active —
//! order is purely append position, independent of prior undo/redo traffic.
//!
//! ERROR HANDLING
//! ==============
//! Updates or commits naming an unknown stroke id are silently dropped, and
//! undo/redo with nothing eligible are no-ops. Neither is surfaced to the
//! caller; recovery from any lost batch is the next full rebuild.

#[cfg(test)]
#[path = "log_test.rs"]
mod tests;

use crate::stroke::{PointSample, Stroke, StrokeId};

/// Authoritative append-only stroke history plus a redo stack.
#[derive(Debug, Default)]
pub struct StrokeLog {
    history: Vec<Stroke>,
    redo_stack: Vec<StrokeId>,
}

impl StrokeLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stroke to the tail of history. Any previously undone strokes
    /// lose their redo-ability: a new edit clears the redo stack (standard
    /// linear undo model).
    pub fn append(&mut self, stroke: Stroke) {
        self.history.push(stroke);
        self.redo_stack.clear();
    }

    /// Mark a stroke committed. Idempotent; no-op if the id is unknown.
    ///
    /// Visibility belongs to undo/redo: `active` is false exactly when the
    /// stroke has been undone, and a delayed `end` must not resurrect it —
    /// even after a later append cleared the redo stack.
    pub fn commit(&mut self, stroke_id: StrokeId) {
        if let Some(stroke) = self.history.iter_mut().find(|s| s.stroke_id == stroke_id) {
            if !stroke.active {
                return;
            }
            stroke.active = true;
        }
    }

    /// Extend a live stroke's polyline. The batch is dropped without notice
    /// if the id is unknown.
    pub fn append_points(&mut self, stroke_id: StrokeId, points: &[PointSample]) {
        if let Some(stroke) = self.history.iter_mut().find(|s| s.stroke_id == stroke_id) {
            stroke.points.extend_from_slice(points);
        }
    }

    /// Deactivate the tail-most active stroke and remember it for redo.
    /// No-op when nothing is active.
    pub fn undo(&mut self) {
        for stroke in self.history.iter_mut().rev() {
            if stroke.active {
                stroke.active = false;
                self.redo_stack.push(stroke.stroke_id);
                return;
            }
        }
    }

    /// Reactivate the most recently undone stroke. No-op when the redo
    /// stack is empty.
    pub fn redo(&mut self) {
        let Some(stroke_id) = self.redo_stack.pop() else {
            return;
        };
        if let Some(stroke) = self.history.iter_mut().find(|s| s.stroke_id == stroke_id) {
            stroke.active = true;
        }
    }

    /// Full independent copy of history. Callers may mutate the result
    /// freely; each stroke's points are copied.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Stroke> {
        self.history.clone()
    }

    /// Look up a stroke by id.
    #[must_use]
    pub fn get(&self, stroke_id: StrokeId) -> Option<&Stroke> {
        self.history.iter().find(|s| s.stroke_id == stroke_id)
    }

    /// Number of strokes ever appended (undone strokes included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Returns `true` if nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Depth of the redo stack.
    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }
}
