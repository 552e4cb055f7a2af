//! # touchpad-core
//!
//! Shared library for Touchpad-Remote containing the multi-touch gesture
//! classifier, the cursor model for the target display, and the binary wire
//! records of the kernel virtual-HID and raw input-event interfaces.
//!
//! This crate has zero dependencies on OS APIs, device nodes, or processes.
//!
//! # Architecture overview (for beginners)
//!
//! Touchpad-Remote turns a handheld touchscreen into a pointing device for a
//! separate display.  Raw finger samples flow through the system like this:
//!
//! ```text
//! touch surface ─► GestureClassifier ─► PointerIntent ─► CursorModel
//!                                                          │
//!                     touchpad-injector (PointerSink) ◄────┘
//! ```
//!
//! This crate (`touchpad-core`) is the platform-free part:
//!
//! - **`domain`** – The gesture state machine, the intents it emits, the
//!   clamped cursor position, and the wheel-notch accumulator.
//!
//! - **`protocol`** – How bytes reach the kernel.  The `uhid` module encodes
//!   the CREATE / INPUT / DESTROY records of the virtual-HID character device
//!   and the report descriptor of a 3-button relative mouse.  Raw event-device
//!   frames are built by the injector on top of the `evdev` crate.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `touchpad_core::GestureClassifier` instead of the full module path.
pub use domain::cursor::{CursorModel, CursorPosition};
pub use domain::gesture::{
    GestureClassifier, GestureConfig, GestureState, PointerIntent, PointerSample, SwipeDirection,
    TouchAction, TwoFingerKind,
};
pub use domain::wheel::WheelAccumulator;
pub use domain::TargetId;
pub use protocol::report::{Buttons, HidReport, MouseButton};
pub use protocol::uhid::{decode_record, encode_record, UhidError, UhidRecord};
