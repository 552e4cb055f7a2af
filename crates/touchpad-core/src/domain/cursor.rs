//! Authoritative cursor position on the target display.
//!
//! The touch surface and the target display have independent resolutions, so
//! the cursor is never derived from an absolute finger position.  It only ever
//! moves by relative deltas, and each axis is clamped independently to
//! `[0, dimension - 1]`.

use serde::{Deserialize, Serialize};

/// A cursor position in target-display pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f32,
    pub y: f32,
}

impl CursorPosition {
    /// Returns the position rounded to whole pixels.
    pub fn rounded(&self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

/// Holds the cursor position and the bounds of the target display.
///
/// # Invariant
///
/// `0 <= x < width` and `0 <= y < height` after every public operation.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorModel {
    position: CursorPosition,
    width: f32,
    height: f32,
}

impl CursorModel {
    /// Creates a model for a `width` x `height` display with the cursor centred.
    pub fn new(width: u32, height: u32) -> Self {
        let mut model = Self {
            position: CursorPosition::default(),
            width: 1.0,
            height: 1.0,
        };
        model.reset_to_center(width, height);
        model
    }

    /// Current position.
    pub fn position(&self) -> CursorPosition {
        self.position
    }

    /// Display bounds as `(width, height)`.
    pub fn bounds(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Moves the cursor by `(dx, dy)` and clamps each axis to the display.
    pub fn apply_relative(&mut self, dx: f32, dy: f32) -> CursorPosition {
        self.position.x = clamp_axis(self.position.x + dx, self.width);
        self.position.y = clamp_axis(self.position.y + dy, self.height);
        self.position
    }

    /// Adopts new bounds and places the cursor at their centre.
    ///
    /// Called whenever the target display is (re)selected.
    pub fn reset_to_center(&mut self, width: u32, height: u32) {
        self.set_bounds(width, height);
        self.position = CursorPosition {
            x: clamp_axis(self.width / 2.0, self.width),
            y: clamp_axis(self.height / 2.0, self.height),
        };
    }

    /// Adopts new bounds, pulling the current position back inside them.
    ///
    /// A zero dimension is treated as one pixel so the clamp range is never empty.
    pub fn set_bounds(&mut self, width: u32, height: u32) {
        self.width = width.max(1) as f32;
        self.height = height.max(1) as f32;
        self.position.x = clamp_axis(self.position.x, self.width);
        self.position.y = clamp_axis(self.position.y, self.height);
    }
}

fn clamp_axis(value: f32, dimension: f32) -> f32 {
    value.clamp(0.0, dimension - 1.0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
