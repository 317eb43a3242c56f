//! Shared numeric constants for the canvas crate.

// ── Identity ────────────────────────────────────────────────────

/// First placeholder id handed out; later ones count down from here.
pub const FIRST_PLACEHOLDER_ID: i64 = -1;

/// Retired creation tokens remembered at once; the oldest is forgotten first.
pub const MAX_RETIRED_TOKENS: usize = 256;

// ── Hit-testing ─────────────────────────────────────────────────

/// Slop in canvas units when picking a shape to drag.
pub const SELECT_TOLERANCE: f64 = 6.0;

/// Slop in canvas units for the eraser.
pub const ERASER_TOLERANCE: f64 = 10.0;

// ── Drawing ─────────────────────────────────────────────────────

/// Freehand strokes need at least this many points to become a shape.
pub const MIN_PENCIL_POINTS: usize = 2;
