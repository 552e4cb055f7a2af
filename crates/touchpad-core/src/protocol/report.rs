//! The 4-byte relative mouse input report and motion chunking.
//!
//! ```text
//! byte 0: buttons  (bit 0 = left, bit 1 = right, bit 2 = middle, bits 3-7 padding)
//! byte 1: dx       (i8, -127..=127)
//! byte 2: dy       (i8, -127..=127)
//! byte 3: wheel    (i8, -127..=127, positive = away from the user)
//! ```

use serde::{Deserialize, Serialize};

/// Size of one encoded [`HidReport`] in bytes.
pub const REPORT_SIZE: usize = 4;

/// Largest magnitude a single report axis may carry.
///
/// `-128` is representable in an `i8` but the report descriptor declares a
/// logical minimum of `-127`, so it is never sent.
pub const AXIS_LIMIT: i8 = 127;

/// Residual below which chunking stops.
const CHUNK_EPSILON: f32 = 0.5;

/// Largest motion per axis that [`chunk_relative`] will split.
///
/// Keeps the step count bounded and the residual exactly representable in
/// an `f32`; no display is wider than this.
pub const MAX_CHUNKED_MOTION: f32 = 32_767.0;

/// A physical mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// Bit of this button in the report's button byte.
    pub fn bit(self) -> u8 {
        match self {
            MouseButton::Left => 1 << 0,
            MouseButton::Right => 1 << 1,
            MouseButton::Middle => 1 << 2,
        }
    }
}

/// Bitset of currently held buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Buttons(pub u8);

impl Buttons {
    /// Mask of the three bits the descriptor declares.
    pub const MASK: u8 = 0b0000_0111;

    pub fn is_pressed(self, button: MouseButton) -> bool {
        self.0 & button.bit() != 0
    }

    pub fn with(self, button: MouseButton, pressed: bool) -> Self {
        if pressed {
            Buttons(self.0 | button.bit())
        } else {
            Buttons(self.0 & !button.bit())
        }
    }

    pub fn is_empty(self) -> bool {
        self.0 & Self::MASK == 0
    }
}

/// One relative-mouse input report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HidReport {
    pub buttons: Buttons,
    pub dx: i8,
    pub dy: i8,
    pub wheel: i8,
}

impl HidReport {
    /// Encodes the report; padding bits and `-128` axis values are scrubbed.
    pub fn to_bytes(&self) -> [u8; REPORT_SIZE] {
        [
            self.buttons.0 & Buttons::MASK,
            clamp_axis(self.dx) as u8,
            clamp_axis(self.dy) as u8,
            clamp_axis(self.wheel) as u8,
        ]
    }

    pub fn from_bytes(bytes: [u8; REPORT_SIZE]) -> Self {
        Self {
            buttons: Buttons(bytes[0] & Buttons::MASK),
            dx: bytes[1] as i8,
            dy: bytes[2] as i8,
            wheel: bytes[3] as i8,
        }
    }
}

fn clamp_axis(v: i8) -> i8 {
    v.max(-AXIS_LIMIT)
}

/// Splits a relative motion into per-report steps of at most ±127 per axis.
///
/// Both axes are scaled by the same factor so every step points in the
/// direction of the remaining motion.  Each step is subtracted from the
/// remainder until both axes are below half a pixel, so the steps sum to the
/// requested motion rounded to whole pixels.  Each axis is first clamped to
/// [`MAX_CHUNKED_MOTION`].
///
/// ```rust
/// use touchpad_core::protocol::report::chunk_relative;
///
/// let steps = chunk_relative(300.0, -5.0);
/// assert_eq!(steps, vec![(127, -2), (127, -2), (46, -1)]);
/// ```
pub fn chunk_relative(dx: f32, dy: f32) -> Vec<(i8, i8)> {
    let mut steps = Vec::new();
    if !dx.is_finite() || !dy.is_finite() {
        return steps;
    }

    let limit = f32::from(AXIS_LIMIT);
    let mut rx = dx.clamp(-MAX_CHUNKED_MOTION, MAX_CHUNKED_MOTION);
    let mut ry = dy.clamp(-MAX_CHUNKED_MOTION, MAX_CHUNKED_MOTION);
    while rx.abs() >= CHUNK_EPSILON || ry.abs() >= CHUNK_EPSILON {
        let largest = rx.abs().max(ry.abs());
        let scale = if largest > limit { limit / largest } else { 1.0 };
        let sx = (rx * scale).round().clamp(-limit, limit);
        let sy = (ry * scale).round().clamp(-limit, limit);
        let (nx, ny) = (rx - sx, ry - sy);
        if nx == rx && ny == ry {
            break;
        }
        steps.push((sx as i8, sy as i8));
        rx = nx;
        ry = ny;
    }
    steps
}

/// Splits a wheel movement in whole notches into per-report steps of at most ±127.
pub fn chunk_wheel(notches: i32) -> Vec<i8> {
    let limit = i32::from(AXIS_LIMIT);
    let mut steps = Vec::new();
    let mut remaining = notches;
    while remaining != 0 {
        let step = remaining.clamp(-limit, limit);
        steps.push(step as i8);
        remaining -= step;
    }
    steps
}

// ── Tests ─────────────────────────────────────────────────────────────────────
