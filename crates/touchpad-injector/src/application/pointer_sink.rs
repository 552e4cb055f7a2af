//! The injection backend seam.
//!
//! This module sits at the application layer and defines the
//! [`PointerSink`] trait that every injection backend implements.  The
//! backend implementations are in the infrastructure layer; the application
//! layer only ever sees `Box<dyn PointerSink>` values produced by a
//! [`SinkFactory`].
//!
//! # Why does every call take a cursor position? (for beginners)
//!
//! Relative backends (virtual HID, event device) move the real cursor by a
//! delta and ignore the position.  Absolute backends (privileged helper,
//! shell) have no notion of "the current cursor" and need to be told where
//! the event happens.  Passing both keeps one trait for all four.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use touchpad_core::{CursorPosition, MouseButton, TargetId, UhidError};

/// Error type for a single backend call.
#[derive(Debug, Error)]
pub enum InjectionError {
    /// Reading or writing the device channel failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend received the event but refused it.
    #[error("event rejected: {0}")]
    Rejected(String),

    /// A remote call or external command exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The backend cannot be brought up on this device.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend works but cannot express this kind of event.
    #[error("not supported by this backend: {0}")]
    Unsupported(&'static str),

    /// A record could not be encoded or the peer answered with garbage.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The channel to the backend is closed.
    #[error("backend disconnected")]
    Disconnected,
}

impl From<UhidError> for InjectionError {
    fn from(e: UhidError) -> Self {
        InjectionError::Protocol(e.to_string())
    }
}

impl InjectionError {
    /// `true` if the error means the backend is unusable, as opposed to a
    /// capability gap for this one kind of event.
    pub fn exhausts_backend(&self) -> bool {
        !matches!(self, InjectionError::Unsupported(_))
    }
}

// ── Backend identity ──────────────────────────────────────────────────────────

/// The injection backends, in default probe priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    VirtualHid,
    EventDevice,
    Privileged,
    Shell,
}

impl BackendKind {
    /// Default probe order, most capable first.
    pub const PRIORITY: [BackendKind; 4] = [
        BackendKind::VirtualHid,
        BackendKind::EventDevice,
        BackendKind::Privileged,
        BackendKind::Shell,
    ];
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::VirtualHid => "virtual-hid",
            BackendKind::EventDevice => "event-device",
            BackendKind::Privileged => "privileged",
            BackendKind::Shell => "shell",
        };
        f.write_str(name)
    }
}

/// Mode argument of the privileged injection API.
///
/// Some platform versions only accept specific, undocumented values, so the
/// accepted one is discovered by probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InjectionMode(pub i32);

/// Parameters a backend discovered while probing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendParams {
    None,
    /// The privileged API mode that was accepted.
    Mode(InjectionMode),
    /// The event device node being written.
    Node(PathBuf),
}

/// What a backend can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkCapabilities {
    /// Can move the cursor without a button held.
    pub supports_hover: bool,
    /// Places events at absolute coordinates on a chosen display.
    pub supports_absolute_targeting: bool,
}

// ── Traits ────────────────────────────────────────────────────────────────────

/// One way of delivering pointer events to the target display.
///
/// Calls are issued one at a time by [`crate::application::input_service::InputService`];
/// implementations never see two calls in flight.
#[async_trait]
pub trait PointerSink: Send {
    fn kind(&self) -> BackendKind;

    fn capabilities(&self) -> SinkCapabilities;

    /// Sends one representative, harmless event.
    ///
    /// `Ok` means the backend works; the returned parameters are cached for
    /// the rest of the session.
    async fn probe(&mut self, at: CursorPosition) -> Result<BackendParams, InjectionError>;

    /// Moves the cursor by `(dx, dy)` display pixels.  `at` is the position
    /// the cursor ends up at.
    async fn move_by(&mut self, dx: f32, dy: f32, at: CursorPosition)
        -> Result<(), InjectionError>;

    async fn set_button(
        &mut self,
        button: MouseButton,
        pressed: bool,
        at: CursorPosition,
    ) -> Result<(), InjectionError>;

    /// Scrolls by a signed wheel amount; positive scrolls up.
    async fn scroll(&mut self, amount: f32, at: CursorPosition) -> Result<(), InjectionError>;

    /// Releases the underlying resource.  Must be safe to call repeatedly.
    async fn release(&mut self);
}

/// Brings up a backend for a target display.
#[async_trait]
pub trait SinkFactory: Send + Sync {
    async fn open(
        &self,
        kind: BackendKind,
        target: TargetId,
    ) -> Result<Box<dyn PointerSink>, InjectionError>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unsupported_keeps_the_backend() {
        assert!(!InjectionError::Unsupported("scroll").exhausts_backend());
        assert!(InjectionError::Disconnected.exhausts_backend());
        assert!(InjectionError::Timeout(Duration::from_secs(3)).exhausts_backend());
        assert!(InjectionError::Rejected("mode".into()).exhausts_backend());
    }

    #[test]
    fn test_uhid_error_becomes_protocol_error() {
        let err: InjectionError = UhidError::UnknownEventType(7).into();
        assert!(matches!(err, InjectionError::Protocol(ref m) if m.contains('7')));
    }

    #[test]
    fn test_backend_kind_serializes_as_snake_case() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            priority: Vec<BackendKind>,
        }

        let text = toml::to_string(&Wrapper {
            priority: vec![BackendKind::VirtualHid, BackendKind::Shell],
        })
        .expect("serialize");

        assert!(text.contains("\"virtual_hid\""));
        let back: Wrapper = toml::from_str(&text).expect("deserialize");
        assert_eq!(back.priority, vec![BackendKind::VirtualHid, BackendKind::Shell]);
    }

    #[test]
    fn test_default_priority_order() {
        assert_eq!(BackendKind::PRIORITY[0], BackendKind::VirtualHid);
        assert_eq!(BackendKind::PRIORITY[3], BackendKind::Shell);
        assert_eq!(BackendKind::EventDevice.to_string(), "event-device");
    }
}
