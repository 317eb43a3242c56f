//! Input model: drawing tools and the gesture state machine.
//!
//! `Tool` captures what a pointer-down means. `Gesture` is the active
//! interaction tracked between pointer-down and pointer-up, carrying what the
//! engine needs to compute deltas and emit its final actions on release.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use std::fmt;
use std::str::FromStr;

use wire::{Point, ShapePayload};

use crate::consts::MIN_PENCIL_POINTS;
use crate::doc::ShapeId;

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Pick and drag existing shapes (default).
    #[default]
    Select,
    Rect,
    Circle,
    Triangle,
    /// Freehand stroke.
    Pencil,
    /// Remove every shape under the pointer.
    Eraser,
}

impl Tool {
    /// Whether a drag with this tool produces a new shape.
    #[must_use]
    pub fn creates_shape(self) -> bool {
        matches!(self, Self::Rect | Self::Circle | Self::Triangle | Self::Pencil)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Rect => "rect",
            Self::Circle => "circle",
            Self::Triangle => "triangle",
            Self::Pencil => "pencil",
            Self::Eraser => "eraser",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a tool name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool: {0}")]
pub struct UnknownTool(pub String);

impl FromStr for Tool {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "select" => Ok(Self::Select),
            "rect" => Ok(Self::Rect),
            "circle" => Ok(Self::Circle),
            "triangle" => Ok(Self::Triangle),
            "pencil" => Ok(Self::Pencil),
            "eraser" => Ok(Self::Eraser),
            _ => Err(UnknownTool(s.to_owned())),
        }
    }
}

/// Persistent UI state.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub tool: Tool,
    /// The shape picked by the last select gesture, if it still exists.
    pub selected_id: Option<ShapeId>,
}

/// The gesture in progress between pointer-down and pointer-up.
#[derive(Debug, Clone, Default)]
pub enum Gesture {
    /// Waiting for the next pointer-down.
    #[default]
    Idle,
    /// Moving an existing shape.
    Dragging {
        id: ShapeId,
        /// Pointer position at the previous event; deltas are measured from here.
        last: Point,
        /// Whether any movement happened, so a bare click commits nothing.
        moved: bool,
    },
    /// Sizing a new shape from the anchor where the drag started.
    Drawing {
        tool: Tool,
        start: Point,
        /// Every pointer position so far, including `start`.
        path: Vec<Point>,
    },
    /// Eraser held down; every move erases under the pointer.
    Erasing,
}

impl Gesture {
    /// Id of the shape being dragged, if any.
    #[must_use]
    pub fn dragged_id(&self) -> Option<ShapeId> {
        match self {
            Self::Dragging { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Build the shape a drawing drag from `start` to `end` describes.
///
/// Circles grow from the start corner: the radius is half the larger signed
/// extent and the center sits one radius in from `start`. Triangles span the
/// drag box with their apex at the middle of the far edge. Degenerate drags
/// (no extent, or a pencil stroke too short) produce nothing.
#[must_use]
pub fn shape_from_drag(tool: Tool, start: Point, end: Point, path: &[Point]) -> Option<ShapePayload> {
    let width = end.x - start.x;
    let height = end.y - start.y;
    let flat = width == 0.0 && height == 0.0;
    match tool {
        Tool::Rect if !flat => Some(ShapePayload::Rect { x: start.x, y: start.y, width, height }),
        Tool::Triangle if !flat => Some(ShapePayload::Triangle { x: start.x, y: start.y, width, height }),
        Tool::Circle => {
            let radius = width.max(height) / 2.0;
            if radius == 0.0 {
                return None;
            }
            Some(ShapePayload::Circle { center_x: start.x + radius, center_y: start.y + radius, radius })
        }
        Tool::Pencil if path.len() >= MIN_PENCIL_POINTS => Some(ShapePayload::Pencil { points: path.to_vec() }),
        _ => None,
    }
}
