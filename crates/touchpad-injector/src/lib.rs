//! touchpad-injector library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does touchpad-injector do? (for beginners)
//!
//! `touchpad-core` decides *what* the user meant ("move 12 px right",
//! "click", "scroll up a notch").  This crate decides *how* that reaches the
//! target display.  There is no single reliable way to do that on every
//! device, so several injection backends are tried in order:
//!
//! 1. **Virtual HID** – create a software mouse through `/dev/uhid` and send
//!    it 4-byte reports.  The kernel treats it like a real USB mouse.
//! 2. **Event device** – write raw `input_event` records into an existing
//!    `/dev/input/eventN` node.
//! 3. **Privileged helper** – ask a helper process with platform privileges to
//!    inject motion records scoped to one display.
//! 4. **Shell** – run the platform `input` utility.  Slow, tap only, but
//!    almost always present.
//!
//! The [`application::select_backend::BackendSelector`] probes these in
//! order, remembers the first one that works, and falls back down the list
//! when a live call fails.

/// Application layer: injection use cases and the backend seam.
pub mod application;

/// Infrastructure layer: device nodes, processes, sockets, and config files.
pub mod infrastructure;
