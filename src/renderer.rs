//! Renderer contract consumed by the client replica.
//!
//! Rasterization itself is an external collaborator — the replica only
//! decides *what* goes on *which* layer and *when*. The two-layer split is
//! load-bearing: the persistent layer holds committed, currently-active
//! strokes and is only rebuilt wholesale on an authoritative rebuild, while
//! the ephemeral layer is cleared and recomposited from scratch every frame.
//! Full recomposition is required because the eraser draws with a
//! subtractive compositing mode; partial redraw would corrupt the composite.

use uuid::Uuid;

use crate::stroke::Stroke;

/// Render surface a draw call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Committed, currently-active strokes. Append-only between rebuilds.
    Persistent,
    /// In-progress strokes and cursor markers. Recomposited every frame.
    Ephemeral,
}

/// A peer's cursor as shown on the ephemeral layer.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorMarker {
    pub user_id: Uuid,
    pub x: f64,
    pub y: f64,
    pub color: String,
}

/// Drawing surface contract. Implementations must handle all six tool
/// variants of [`crate::stroke::ToolKind`].
pub trait Renderer: Send {
    /// Resize both layers to the given pixel dimensions.
    fn resize(&mut self, width: u32, height: u32);
    /// Clear a layer completely.
    fn clear(&mut self, layer: Layer);
    /// Draw one stroke onto a layer.
    fn draw_stroke(&mut self, layer: Layer, stroke: &Stroke);
    /// Draw the given cursor markers onto a layer.
    fn draw_cursors(&mut self, layer: Layer, cursors: &[CursorMarker]);
}
