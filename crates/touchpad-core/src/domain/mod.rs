//! Domain entities for Touchpad-Remote.
//!
//! This module contains pure logic with no infrastructure dependencies: it
//! never opens a device, spawns a process, or reads the clock.  Every
//! timestamp it sees arrives inside a [`gesture::PointerSample`].
//!
//! # Why keep the clock out? (for beginners)
//!
//! The gesture rules are all "within N milliseconds" and "within N pixels".
//! If the classifier read the wall clock itself, tests would need to sleep to
//! exercise a long-press.  Because samples carry their own monotonic
//! timestamps, a test can describe a 300 ms hold in a single line.

use serde::{Deserialize, Serialize};

/// Clamped cursor position on the target display.
pub mod cursor;

/// Multi-touch gesture state machine and the intents it emits.
pub mod gesture;

/// Fractional scroll amounts to whole wheel notches.
pub mod wheel;

/// Opaque handle naming the display that receives injected events.
///
/// The value is whatever the host platform uses for display identifiers;
/// the core never interprets it beyond equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId(pub i32);

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "display#{}", self.0)
    }
}
