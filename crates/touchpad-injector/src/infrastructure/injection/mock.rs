//! Mock backends for testing the selector and the service.
//!
//! # Why a mock factory?
//!
//! The real backends need `/dev/uhid`, a writable event node, a privileged
//! helper, or the platform `input` utility.  None of those exist on a CI
//! machine, and the interesting behaviour of the selector is what happens
//! when they *fail*.  [`MockSinkFactory`] hands out [`MockPointerSink`]s whose
//! failure mode is chosen per backend kind, and records every call into one
//! shared log so a test can assert the exact order of opens, probes and
//! events across backends.
//!
//! # Usage in tests
//!
//! ```ignore
//! let factory = Arc::new(MockSinkFactory::new());
//! factory.set_behavior(BackendKind::VirtualHid, MockBehavior::FailProbe);
//! let mut selector = BackendSelector::new(factory.clone(), BackendKind::PRIORITY.to_vec());
//!
//! selector.bind(TargetId(0)).await;
//! assert!(selector.move_by(5.0, 0.0, at).await);
//! assert_eq!(factory.opened_kinds(), vec![BackendKind::VirtualHid, BackendKind::EventDevice]);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use touchpad_core::{CursorPosition, MouseButton, TargetId};

use crate::application::pointer_sink::{
    BackendKind, BackendParams, InjectionError, PointerSink, SinkCapabilities, SinkFactory,
};

/// One recorded interaction with a mock backend.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Open { kind: BackendKind, target: TargetId },
    Probe { kind: BackendKind },
    Move { kind: BackendKind, dx: f32, dy: f32 },
    Button { kind: BackendKind, button: MouseButton, pressed: bool },
    Scroll { kind: BackendKind, amount: f32 },
    Release { kind: BackendKind },
}

impl SinkCall {
    pub fn kind(&self) -> BackendKind {
        match self {
            SinkCall::Open { kind, .. }
            | SinkCall::Probe { kind }
            | SinkCall::Move { kind, .. }
            | SinkCall::Button { kind, .. }
            | SinkCall::Scroll { kind, .. }
            | SinkCall::Release { kind } => *kind,
        }
    }

    /// `true` for move, button and scroll calls.
    pub fn is_event(&self) -> bool {
        matches!(
            self,
            SinkCall::Move { .. } | SinkCall::Button { .. } | SinkCall::Scroll { .. }
        )
    }
}

/// How a mock backend of one kind behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockBehavior {
    #[default]
    Works,
    /// `SinkFactory::open` fails, as when a device node is missing.
    FailOpen,
    /// Opens, but the probe event is refused.
    FailProbe,
    /// Probes fine, then the given number of live calls succeed and the rest fail.
    FailAfter(usize),
    /// Probes fine; scroll answers `Unsupported`.
    NoScroll,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type CallLog = Arc<Mutex<Vec<SinkCall>>>;

/// A backend that records calls instead of injecting anything.
pub struct MockPointerSink {
    kind: BackendKind,
    behavior: MockBehavior,
    live_calls: usize,
    log: CallLog,
}

impl MockPointerSink {
    pub fn new(kind: BackendKind, behavior: MockBehavior) -> Self {
        Self {
            kind,
            behavior,
            live_calls: 0,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        lock(&self.log).clone()
    }

    fn record(&self, call: SinkCall) {
        lock(&self.log).push(call);
    }

    fn live(&mut self, call: SinkCall) -> Result<(), InjectionError> {
        self.record(call);
        self.live_calls += 1;
        match self.behavior {
            MockBehavior::FailAfter(n) if self.live_calls > n => {
                Err(InjectionError::Disconnected)
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl PointerSink for MockPointerSink {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn capabilities(&self) -> SinkCapabilities {
        SinkCapabilities {
            supports_hover: self.kind != BackendKind::Shell,
            supports_absolute_targeting: matches!(
                self.kind,
                BackendKind::Privileged | BackendKind::Shell
            ),
        }
    }

    async fn probe(&mut self, _at: CursorPosition) -> Result<BackendParams, InjectionError> {
        self.record(SinkCall::Probe { kind: self.kind });
        if self.behavior == MockBehavior::FailProbe {
            return Err(InjectionError::Rejected(format!("{} probe refused", self.kind)));
        }
        Ok(BackendParams::None)
    }

    async fn move_by(
        &mut self,
        dx: f32,
        dy: f32,
        _at: CursorPosition,
    ) -> Result<(), InjectionError> {
        let kind = self.kind;
        self.live(SinkCall::Move { kind, dx, dy })
    }

    async fn set_button(
        &mut self,
        button: MouseButton,
        pressed: bool,
        _at: CursorPosition,
    ) -> Result<(), InjectionError> {
        let kind = self.kind;
        self.live(SinkCall::Button { kind, button, pressed })
    }

    async fn scroll(&mut self, amount: f32, _at: CursorPosition) -> Result<(), InjectionError> {
        let kind = self.kind;
        if self.behavior == MockBehavior::NoScroll {
            self.record(SinkCall::Scroll { kind, amount });
            return Err(InjectionError::Unsupported("scroll"));
        }
        self.live(SinkCall::Scroll { kind, amount })
    }

    async fn release(&mut self) {
        self.record(SinkCall::Release { kind: self.kind });
    }
}

/// Hands out [`MockPointerSink`]s sharing one call log.
#[derive(Default)]
pub struct MockSinkFactory {
    behaviors: Mutex<HashMap<BackendKind, MockBehavior>>,
    log: CallLog,
}

impl MockSinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_behavior(&self, kind: BackendKind, behavior: MockBehavior) {
        lock(&self.behaviors).insert(kind, behavior);
    }

    pub fn behavior(&self, kind: BackendKind) -> MockBehavior {
        lock(&self.behaviors).get(&kind).copied().unwrap_or_default()
    }

    /// Every call on every sink, in order.
    pub fn calls(&self) -> Vec<SinkCall> {
        lock(&self.log).clone()
    }

    /// Event calls (move, button, scroll) only.
    pub fn events(&self) -> Vec<SinkCall> {
        self.calls().into_iter().filter(SinkCall::is_event).collect()
    }

    /// Kinds passed to `open`, in order.
    pub fn opened_kinds(&self) -> Vec<BackendKind> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SinkCall::Open { kind, .. } => Some(kind),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.log).clear();
    }
}

#[async_trait]
impl SinkFactory for MockSinkFactory {
    async fn open(
        &self,
        kind: BackendKind,
        target: TargetId,
    ) -> Result<Box<dyn PointerSink>, InjectionError> {
        lock(&self.log).push(SinkCall::Open { kind, target });
        let behavior = self.behavior(kind);
        if behavior == MockBehavior::FailOpen {
            return Err(InjectionError::Unavailable(format!("{kind} not present")));
        }
        Ok(Box::new(MockPointerSink {
            kind,
            behavior,
            live_calls: 0,
            log: Arc::clone(&self.log),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_factory_shares_one_log() {
        // Arrange
        let factory = MockSinkFactory::new();
        factory.set_behavior(BackendKind::Shell, MockBehavior::FailOpen);

        // Act
        let mut sink = factory
            .open(BackendKind::VirtualHid, TargetId(0))
            .await
            .expect("open");
        sink.move_by(1.0, 2.0, CursorPosition::default()).await.expect("move");
        let shell = factory.open(BackendKind::Shell, TargetId(0)).await;

        // Assert
        assert!(shell.is_err());
        assert_eq!(
            factory.opened_kinds(),
            vec![BackendKind::VirtualHid, BackendKind::Shell]
        );
        assert_eq!(
            factory.events(),
            vec![SinkCall::Move {
                kind: BackendKind::VirtualHid,
                dx: 1.0,
                dy: 2.0
            }]
        );
    }

    #[tokio::test]
    async fn test_fail_after_counts_live_calls() {
        let mut sink = MockPointerSink::new(BackendKind::EventDevice, MockBehavior::FailAfter(1));
        let at = CursorPosition::default();

        assert!(sink.probe(at).await.is_ok());
        assert!(sink.move_by(1.0, 0.0, at).await.is_ok());
        assert!(matches!(
            sink.move_by(1.0, 0.0, at).await,
            Err(InjectionError::Disconnected)
        ));
        assert_eq!(sink.calls().len(), 3);
    }
}
