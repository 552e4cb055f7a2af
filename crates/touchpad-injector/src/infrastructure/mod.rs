//! Infrastructure layer of the injector.
//!
//! Contains the OS-facing adapters: the four injection backends, kernel
//! input-device enumeration, the timed command runner, config persistence,
//! and the touch stream reader used by the binary.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `touchpad_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`injection`** – `PointerSink` implementations (virtual HID, event
//!   device, privileged helper, shell) plus `SystemSinkFactory`, which opens
//!   them, and a mock factory for tests.
//!
//! - **`devices`** – Parses `/proc/bus/input/devices` to confirm a virtual
//!   device registered and to find a writable pointer node.
//!
//! - **`command`** – Runs helper programs under a deadline and kills them
//!   when it passes.
//!
//! - **`storage`** – TOML config file in the XDG config directory.
//!
//! - **`replay`** – JSON-lines touch frames from a file or stdin.

pub mod command;
pub mod devices;
pub mod injection;
pub mod replay;
pub mod storage;
