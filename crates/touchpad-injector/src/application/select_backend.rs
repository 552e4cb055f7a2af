//! BackendSelector: picks the injection backend for a target display.
//!
//! # Lifecycle
//!
//! ```text
//!             probe ok                     live call fails
//! Unprobed ─────────────► Active{kind} ─────────────────────► Unprobed
//!    │                                    (kind marked exhausted,
//!    │ every remaining kind                next probe starts one
//!    │ fails its probe                     priority level lower)
//!    ▼
//! Exhausted ──── reset() / new target ────► Unprobed (all kinds eligible)
//! ```
//!
//! Probing is lazy: it happens on the first call that needs a backend.  A
//! failed call is never retried; the event is dropped and the *next* call
//! probes the next backend down the list.  A kind marked exhausted is not
//! probed again until [`BackendSelector::reset`] starts a new session.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use touchpad_core::{CursorPosition, MouseButton, TargetId};
use uuid::Uuid;

use crate::application::pointer_sink::{
    BackendKind, BackendParams, InjectionError, PointerSink, SinkCapabilities, SinkFactory,
};

/// Where the selector is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendState {
    /// No backend is cached; the next call probes.
    Unprobed,
    /// A backend passed its probe and is used for every call.
    Active {
        kind: BackendKind,
        params: BackendParams,
    },
    /// Every backend failed; calls fail fast until reset.
    Exhausted,
}

/// Running counters for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionStats {
    pub moves: u64,
    pub clicks: u64,
    pub scrolls: u64,
    pub failures: u64,
    pub last_error: Option<String>,
}

/// Probes, caches, and degrades injection backends for one target display.
pub struct BackendSelector {
    factory: Arc<dyn SinkFactory>,
    priority: Vec<BackendKind>,
    target: Option<TargetId>,
    /// Identifies the current probing session; renewed by every reset.
    session: Uuid,
    state: BackendState,
    sink: Option<Box<dyn PointerSink>>,
    /// Index into `priority` of the next kind to probe.
    next_index: usize,
    exhausted: Vec<BackendKind>,
    exhaustion_reported: bool,
    stats: InjectionStats,
}

impl BackendSelector {
    /// Creates a selector that probes `priority` in order.
    ///
    /// Duplicate kinds are dropped; an empty list falls back to
    /// [`BackendKind::PRIORITY`].
    pub fn new(factory: Arc<dyn SinkFactory>, priority: Vec<BackendKind>) -> Self {
        let mut order: Vec<BackendKind> = Vec::with_capacity(priority.len());
        for kind in priority {
            if !order.contains(&kind) {
                order.push(kind);
            }
        }
        if order.is_empty() {
            order = BackendKind::PRIORITY.to_vec();
        }

        Self {
            factory,
            priority: order,
            target: None,
            session: Uuid::new_v4(),
            state: BackendState::Unprobed,
            sink: None,
            next_index: 0,
            exhausted: Vec::new(),
            exhaustion_reported: false,
            stats: InjectionStats::default(),
        }
    }

    pub fn target(&self) -> Option<TargetId> {
        self.target
    }

    pub fn state(&self) -> &BackendState {
        &self.state
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    pub fn priority(&self) -> &[BackendKind] {
        &self.priority
    }

    /// Kinds that failed during the current session.
    pub fn exhausted(&self) -> &[BackendKind] {
        &self.exhausted
    }

    pub fn stats(&self) -> &InjectionStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut InjectionStats {
        &mut self.stats
    }

    pub fn active_capabilities(&self) -> Option<SinkCapabilities> {
        self.sink.as_ref().map(|s| s.capabilities())
    }

    /// Points the selector at `target`.  Switching to a different display
    /// releases the active backend and starts a new session.
    ///
    /// Returns `true` if the target changed.
    pub async fn bind(&mut self, target: TargetId) -> bool {
        if self.target == Some(target) {
            return false;
        }
        self.reset().await;
        self.target = Some(target);
        true
    }

    /// Releases the active backend and makes every kind eligible again.
    pub async fn reset(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.release().await;
        }
        self.state = BackendState::Unprobed;
        self.next_index = 0;
        self.exhausted.clear();
        self.exhaustion_reported = false;
        self.session = Uuid::new_v4();
        debug!(session = %self.session, "injection backends reset");
    }

    /// Releases the active backend (a virtual device is destroyed).
    pub async fn shutdown(&mut self) {
        if let Some(kind) = self.sink.as_ref().map(|s| s.kind()) {
            info!(%kind, "releasing injection backend");
        }
        self.reset().await;
    }

    /// Makes sure a backend is active, probing if needed.
    ///
    /// Returns `false` when no backend is left for this session.
    pub async fn ensure_active(&mut self, at: CursorPosition) -> bool {
        if self.sink.is_some() {
            return true;
        }
        if self.state == BackendState::Exhausted {
            return false;
        }
        let Some(target) = self.target else {
            debug!("no target display bound; not probing");
            return false;
        };

        while self.next_index < self.priority.len() {
            let kind = self.priority[self.next_index];
            self.next_index += 1;
            if self.exhausted.contains(&kind) {
                continue;
            }

            debug!(%kind, %target, "probing injection backend");
            let factory = Arc::clone(&self.factory);
            match Self::open_and_probe(factory, kind, target, at).await {
                Ok((sink, params)) => {
                    info!(%kind, %target, ?params, "injection backend active");
                    self.sink = Some(sink);
                    self.state = BackendState::Active { kind, params };
                    return true;
                }
                Err(e) => {
                    warn!(%kind, %target, error = %e, "injection backend probe failed");
                    self.exhausted.push(kind);
                    self.note_error(&e);
                }
            }
        }

        self.state = BackendState::Exhausted;
        if !self.exhaustion_reported {
            self.exhaustion_reported = true;
            error!(
                %target,
                tried = ?self.exhausted,
                "no injection backend available; pointer events will be dropped"
            );
        }
        false
    }

    pub async fn move_by(&mut self, dx: f32, dy: f32, at: CursorPosition) -> bool {
        let Some(sink) = self.active_sink(at).await else {
            return false;
        };
        let result = sink.move_by(dx, dy, at).await;
        self.settle(result).await
    }

    pub async fn set_button(&mut self, button: MouseButton, pressed: bool, at: CursorPosition) -> bool {
        let Some(sink) = self.active_sink(at).await else {
            return false;
        };
        let result = sink.set_button(button, pressed, at).await;
        self.settle(result).await
    }

    pub async fn scroll(&mut self, amount: f32, at: CursorPosition) -> bool {
        let Some(sink) = self.active_sink(at).await else {
            return false;
        };
        let result = sink.scroll(amount, at).await;
        self.settle(result).await
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    async fn open_and_probe(
        factory: Arc<dyn SinkFactory>,
        kind: BackendKind,
        target: TargetId,
        at: CursorPosition,
    ) -> Result<(Box<dyn PointerSink>, BackendParams), InjectionError> {
        let mut sink = factory.open(kind, target).await?;
        match sink.probe(at).await {
            Ok(params) => Ok((sink, params)),
            Err(e) => {
                sink.release().await;
                Err(e)
            }
        }
    }

    async fn active_sink(&mut self, at: CursorPosition) -> Option<&mut Box<dyn PointerSink>> {
        if !self.ensure_active(at).await {
            self.stats.failures += 1;
            return None;
        }
        self.sink.as_mut()
    }

    /// Folds a live call result into the lifecycle.
    async fn settle(&mut self, result: Result<(), InjectionError>) -> bool {
        let e = match result {
            Ok(()) => return true,
            Err(e) => e,
        };
        self.note_error(&e);

        if !e.exhausts_backend() {
            debug!(error = %e, "event not expressible on the active backend");
            return false;
        }

        if let Some(mut sink) = self.sink.take() {
            let kind = sink.kind();
            warn!(%kind, error = %e, "injection backend failed; falling back to the next one");
            self.exhausted.push(kind);
            sink.release().await;
        }
        self.state = BackendState::Unprobed;
        false
    }

    fn note_error(&mut self, e: &InjectionError) {
        self.stats.failures += 1;
        self.stats.last_error = Some(e.to_string());
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
