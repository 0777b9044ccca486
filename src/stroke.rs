//! Stroke model: the unit of drawing shared by server log and client replica.
//!
//! DESIGN
//! ======
//! A stroke is a common header (id, author, style, visibility, points) plus a
//! tool-specific payload. The payload is a tagged union flattened into the
//! same JSON object, so the wire shape stays one flat record per stroke:
//! `{"stroke_id": ..., "tool": "rect", "fill": true, "points": [...]}`.
//!
//! `active` means "currently visible, not undone" — it is NOT an in-progress
//! flag. It is set true at creation and only ever toggled by undo/redo.

#[cfg(test)]
#[path = "stroke_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a stroke, generated by the originating client.
pub type StrokeId = Uuid;

/// One sampled input point. `t` is milliseconds; anchor-only tools (text,
/// image) omit it on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointSample {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub t: f64,
}

impl PointSample {
    #[must_use]
    pub fn new(x: f64, y: f64, t: f64) -> Self {
        Self { x, y, t }
    }
}

/// Tool-specific stroke payload. Each variant declares exactly the fields
/// that tool needs; everything shared lives on [`Stroke`] itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "lowercase")]
pub enum ToolKind {
    /// Freehand path; `points` grows while the gesture is live.
    Brush,
    /// Freehand path composited subtractively by the renderer.
    Eraser,
    /// Axis-aligned rectangle; `points` is exactly [anchor, current].
    Rect { fill: bool },
    /// Ellipse inscribed in the [anchor, current] bounding box.
    Ellipse { fill: bool },
    /// Text placed at a single anchor point.
    Text { text: String, font_size: f64 },
    /// Image placed at a single anchor point. Display width rides on the
    /// shared `width` field; `height` completes the box.
    Image { image_data: String, height: f64 },
}

impl ToolKind {
    /// Freehand tools accumulate a growing polyline and batch their updates.
    #[must_use]
    pub fn is_freehand(&self) -> bool {
        matches!(self, Self::Brush | Self::Eraser)
    }

    /// Anchored tools keep exactly two points and replace the second on
    /// every motion sample instead of batching.
    #[must_use]
    pub fn is_anchored(&self) -> bool {
        matches!(self, Self::Rect { .. } | Self::Ellipse { .. })
    }
}

/// One drawing operation as stored in the session log and on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub stroke_id: StrokeId,
    pub user_id: Uuid,
    pub color: String,
    pub width: f64,
    /// Visibility flag — true unless undone. Never means "in progress".
    pub active: bool,
    pub points: Vec<PointSample>,
    #[serde(flatten)]
    pub tool: ToolKind,
}

impl Stroke {
    /// Create a new stroke with a fresh id, visible by default.
    #[must_use]
    pub fn new(user_id: Uuid, tool: ToolKind, color: impl Into<String>, width: f64) -> Self {
        Self {
            stroke_id: Uuid::new_v4(),
            user_id,
            color: color.into(),
            width,
            active: true,
            points: Vec::new(),
            tool,
        }
    }

    #[must_use]
    pub fn with_points(mut self, points: Vec<PointSample>) -> Self {
        self.points = points;
        self
    }
}
