//! InputService: the call surface used by the touch front end.
//!
//! Every pointer call goes through one `tokio::sync::Mutex`, so a move can
//! never interleave with the press/release pair of a click on the same
//! device channel.  Failures are absorbed here: each call returns `true` or
//! `false` and never an error, and nothing is retried.
//!
//! # Absolute in, relative out (for beginners)
//!
//! Callers say where they believe the cursor should be (`move_cursor(x, y)`).
//! Most backends can only move the cursor *by* an amount, so the service
//! remembers the last position it sent and forwards the difference.  Both
//! positions are rounded to whole pixels first, so the deltas always add up
//! to exactly the requested travel with no drift.  Requested positions are
//! clamped to the display passed to `select_target`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use touchpad_core::{CursorPosition, MouseButton, SwipeDirection, TargetId};
use uuid::Uuid;

use crate::application::pointer_sink::{BackendKind, SinkFactory};
use crate::application::select_backend::{BackendSelector, BackendState, InjectionStats};
use crate::application::system_action::{CommandRunner, SystemAction};

/// Delay between press and release of a synthesized click.
pub const DEFAULT_CLICK_DELAY: Duration = Duration::from_millis(16);

/// Tunables of the service.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub priority: Vec<BackendKind>,
    pub click_delay: Duration,
    /// Program used for display-scoped key events.
    pub input_program: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            priority: BackendKind::PRIORITY.to_vec(),
            click_delay: DEFAULT_CLICK_DELAY,
            input_program: "input".to_string(),
        }
    }
}

/// Snapshot of the service for a diagnostics screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub target: Option<TargetId>,
    pub session: Uuid,
    pub state: BackendState,
    pub exhausted: Vec<BackendKind>,
    pub supports_hover: Option<bool>,
    pub drag_held: bool,
    pub stats: InjectionStats,
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = match &self.state {
            BackendState::Unprobed => "unprobed".to_string(),
            BackendState::Active { kind, .. } => kind.to_string(),
            BackendState::Exhausted => "none available".to_string(),
        };
        let target = self
            .target
            .map(|t| t.to_string())
            .unwrap_or_else(|| "unbound".to_string());
        write!(
            f,
            "{target} backend={backend} moves={} clicks={} scrolls={} failures={}",
            self.stats.moves, self.stats.clicks, self.stats.scrolls, self.stats.failures
        )?;
        if let Some(err) = &self.stats.last_error {
            write!(f, " last_error=\"{err}\"")?;
        }
        Ok(())
    }
}

struct ServiceState {
    selector: BackendSelector,
    /// Last cursor position sent, in whole display pixels.
    last_sent: Option<(i32, i32)>,
    /// `(width, height)` of the display last passed to `select_target`.
    bounds: Option<(u32, u32)>,
    drag_held: bool,
}

/// Serialised pointer injection for one target display at a time.
pub struct InputService {
    state: Mutex<ServiceState>,
    runner: Arc<dyn CommandRunner>,
    settings: ServiceSettings,
}

impl InputService {
    pub fn new(
        factory: Arc<dyn SinkFactory>,
        runner: Arc<dyn CommandRunner>,
        settings: ServiceSettings,
    ) -> Self {
        let selector = BackendSelector::new(factory, settings.priority.clone());
        Self {
            state: Mutex::new(ServiceState {
                selector,
                last_sent: None,
                bounds: None,
                drag_held: false,
            }),
            runner,
            settings,
        }
    }

    /// Selects the display that receives events and places the cursor at its
    /// centre.  Any held drag is released first and backends are re-probed
    /// from the top on the next call.
    pub async fn select_target(&self, target: TargetId, width: u32, height: u32) {
        let mut state = self.state.lock().await;
        if state.drag_held {
            let at = state.position();
            state.selector.set_button(MouseButton::Left, false, at).await;
            state.drag_held = false;
        }
        if !state.selector.bind(target).await {
            state.selector.reset().await;
        }
        let centre = CursorPosition {
            x: width.max(1) as f32 / 2.0,
            y: height.max(1) as f32 / 2.0,
        };
        state.last_sent = Some(centre.rounded());
        state.bounds = Some((width.max(1), height.max(1)));
        info!(%target, width, height, "target display selected");
    }

    /// Moves the cursor to `(x, y)` on `target`.
    ///
    /// The first call after binding a new target only records the position.
    pub async fn move_cursor(&self, target: TargetId, x: f32, y: f32) -> bool {
        let mut state = self.state.lock().await;
        state.bind(target).await;
        state.move_to(CursorPosition { x, y }).await
    }

    /// Primary click at `(x, y)`.
    pub async fn click(&self, target: TargetId, x: f32, y: f32) -> bool {
        self.click_button(target, MouseButton::Left, CursorPosition { x, y })
            .await
    }

    /// Secondary click at `(x, y)`.
    pub async fn right_click(&self, target: TargetId, x: f32, y: f32) -> bool {
        self.click_button(target, MouseButton::Right, CursorPosition { x, y })
            .await
    }

    /// Scrolls by a signed wheel amount at `(x, y)`; positive scrolls up.
    pub async fn scroll(&self, target: TargetId, x: f32, y: f32, amount: f32) -> bool {
        let mut state = self.state.lock().await;
        state.bind(target).await;
        state.move_to(CursorPosition { x, y }).await;
        let at = state.position();
        let ok = state.selector.scroll(amount, at).await;
        if ok {
            state.selector.stats_mut().scrolls += 1;
        }
        ok
    }

    /// Presses and holds the primary button.  Idempotent while held.
    pub async fn start_drag(&self, target: TargetId) -> bool {
        let mut state = self.state.lock().await;
        state.bind(target).await;
        if state.drag_held {
            return true;
        }
        let at = state.position();
        let ok = state.selector.set_button(MouseButton::Left, true, at).await;
        state.drag_held = ok;
        debug!(ok, "drag started");
        ok
    }

    /// Releases the held primary button.  A no-op when nothing is held.
    pub async fn end_drag(&self, target: TargetId) -> bool {
        let mut state = self.state.lock().await;
        state.bind(target).await;
        if !state.drag_held {
            return true;
        }
        state.drag_held = false;
        let at = state.position();
        let ok = state.selector.set_button(MouseButton::Left, false, at).await;
        debug!(ok, "drag ended");
        ok
    }

    pub async fn is_drag_held(&self) -> bool {
        self.state.lock().await.drag_held
    }

    /// Runs the navigation shortcut mapped to a three-finger swipe.
    pub async fn send_swipe_action(&self, target: TargetId, direction: SwipeDirection) -> bool {
        let action = SystemAction::from(direction);
        let (program, args) = action.command(&self.settings.input_program, target);
        debug!(?action, %program, ?args, "running swipe action");

        match self.runner.run(&program, &args).await {
            Ok(()) => true,
            Err(e) => {
                warn!(?action, error = %e, "swipe action failed");
                let mut state = self.state.lock().await;
                let stats = state.selector.stats_mut();
                stats.failures += 1;
                stats.last_error = Some(e.to_string());
                false
            }
        }
    }

    /// Current counters and backend state.
    pub async fn diagnose(&self) -> Diagnostics {
        let state = self.state.lock().await;
        let selector = &state.selector;
        Diagnostics {
            target: selector.target(),
            session: selector.session(),
            state: selector.state().clone(),
            exhausted: selector.exhausted().to_vec(),
            supports_hover: selector.active_capabilities().map(|c| c.supports_hover),
            drag_held: state.drag_held,
            stats: selector.stats().clone(),
        }
    }

    /// Releases a held drag and the active backend.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if state.drag_held {
            let at = state.position();
            state.selector.set_button(MouseButton::Left, false, at).await;
            state.drag_held = false;
        }
        state.selector.shutdown().await;
    }

    async fn click_button(&self, target: TargetId, button: MouseButton, at: CursorPosition) -> bool {
        let mut state = self.state.lock().await;
        state.bind(target).await;
        state.move_to(at).await;
        let at = state.position();

        if !state.selector.set_button(button, true, at).await {
            return false;
        }
        tokio::time::sleep(self.settings.click_delay).await;
        let released = state.selector.set_button(button, false, at).await;
        if released {
            state.selector.stats_mut().clicks += 1;
        }
        released
    }
}

impl ServiceState {
    async fn bind(&mut self, target: TargetId) {
        if self.selector.bind(target).await {
            self.last_sent = None;
            self.drag_held = false;
        }
    }

    fn position(&self) -> CursorPosition {
        let (x, y) = self.last_sent.unwrap_or((0, 0));
        CursorPosition {
            x: x as f32,
            y: y as f32,
        }
    }

    /// Clamps each axis of `to` to `[0, dimension - 1]` of the selected display.
    fn clamp(&self, to: CursorPosition) -> CursorPosition {
        match self.bounds {
            Some((width, height)) => CursorPosition {
                x: to.x.clamp(0.0, (width - 1) as f32),
                y: to.y.clamp(0.0, (height - 1) as f32),
            },
            None => to,
        }
    }

    /// Sends the whole-pixel difference between the last sent position and
    /// `to`.  The position is advanced even if the backend drops the event.
    async fn move_to(&mut self, to: CursorPosition) -> bool {
        if !to.x.is_finite() || !to.y.is_finite() {
            warn!(x = to.x, y = to.y, "ignoring non-finite cursor position");
            return false;
        }
        let (x, y) = self.clamp(to).rounded();
        let Some((lx, ly)) = self.last_sent.replace((x, y)) else {
            return true;
        };
        let (dx, dy) = (x.saturating_sub(lx), y.saturating_sub(ly));
        if dx == 0 && dy == 0 {
            return true;
        }
        let at = self.position();
        let ok = self.selector.move_by(dx as f32, dy as f32, at).await;
        if ok {
            self.selector.stats_mut().moves += 1;
        }
        ok
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
