//! Multi-touch gesture classifier.
//!
//! Consumes the raw pointer stream of one touch surface and emits high-level
//! [`PointerIntent`]s.  The classifier is a synchronous state machine: each
//! call to [`GestureClassifier::feed`] does a constant amount of work and
//! never blocks.
//!
//! # Gestures (for beginners)
//!
//! | Contact                                   | Intent(s)                     |
//! |-------------------------------------------|-------------------------------|
//! | 1 finger drag                             | `Move`                        |
//! | 1 finger quick tap                        | `Click`                       |
//! | 2 finger quick tap, no movement           | `RightClick`                  |
//! | 2 fingers moving together vertically      | `Scroll`                      |
//! | 2 fingers moving apart / together         | `PinchZoom`                   |
//! | 1 finger held still, then a 2nd finger    | `DragStart`, `Move`, `DragEnd`|
//! | 3 finger swipe                            | one `Swipe` on release        |
//!
//! # State machine
//!
//! ```text
//!            Down                 PointerDown (2)
//!   Idle ───────────► Single ─────────────────────► Two{Undetermined|Drag}
//!    ▲                  │                               │        │
//!    │                  │ PointerDown (3+)              │ Move   │ PointerDown (3+)
//!    │                  ▼                               ▼        ▼
//!    │               Three ◄──────────────────── Two{Scroll|Pinch}
//!    │                  │
//!    └──── Up / Cancel (from every state) ──────────────────────────
//! ```
//!
//! Once a two-finger gesture becomes `Scroll` or `Pinch` it stays that way
//! until the last finger lifts, so the classification cannot oscillate.
//! Adding a third finger abandons the two-finger gesture without emitting its
//! terminal intent.

use serde::{Deserialize, Serialize};
use tracing::debug;

// ── Input types ───────────────────────────────────────────────────────────────

/// Kind of raw touch callback, mirroring the host's touch-event actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchAction {
    /// First finger touched the surface.
    Down,
    /// An additional finger touched the surface.
    PointerDown,
    /// One or more fingers moved.
    Move,
    /// A finger lifted while others may remain.
    PointerUp,
    /// The last finger lifted.
    Up,
    /// The host aborted the gesture.
    Cancel,
}

/// One pointer's position at the time of a touch callback.
///
/// `x` / `y` are surface-local; `timestamp_ms` is monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerSample {
    pub pointer_id: u32,
    pub x: f32,
    pub y: f32,
    pub timestamp_ms: u64,
}

impl PointerSample {
    pub fn new(pointer_id: u32, x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self {
            pointer_id,
            x,
            y,
            timestamp_ms,
        }
    }

    fn point(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }
}

/// A surface-local point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    fn distance_to(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

// ── Output types ──────────────────────────────────────────────────────────────

/// Direction of a three-finger swipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

/// High-level pointer action recognised from the touch stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerIntent {
    /// Relative cursor motion in target pixels (sensitivity already applied).
    Move { dx: f32, dy: f32 },
    /// Primary-button click at the current cursor position.
    Click,
    /// Secondary-button click at the current cursor position.
    RightClick,
    /// Vertical wheel amount; positive scrolls up.
    Scroll { amount: f32 },
    /// Change of the inter-finger span in surface pixels; positive = apart.
    PinchZoom { delta: f32 },
    /// Primary button pressed and held.
    DragStart,
    /// Held primary button released.
    DragEnd,
    /// Completed three-finger swipe.
    Swipe(SwipeDirection),
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// Tunable thresholds of the classifier.
///
/// Distances are in surface pixels, durations in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureConfig {
    /// Multiplier from finger motion to cursor motion.
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,
    /// Multiplier from vertical finger motion to wheel amount.
    #[serde(default = "default_scroll_sensitivity")]
    pub scroll_sensitivity: f32,
    /// Longest contact that still counts as a tap.
    #[serde(default = "default_tap_max_duration_ms")]
    pub tap_max_duration_ms: u64,
    /// Largest displacement that still counts as a tap.
    #[serde(default = "default_tap_max_distance")]
    pub tap_max_distance: f32,
    /// Minimum stationary hold before a second finger starts a drag.
    #[serde(default = "default_drag_hold_time_ms")]
    pub drag_hold_time_ms: u64,
    /// Minimum net three-finger displacement for a swipe.
    #[serde(default = "default_swipe_threshold")]
    pub swipe_threshold: f32,
    /// Span change that classifies a two-finger gesture as a pinch.
    #[serde(default = "default_pinch_threshold")]
    pub pinch_threshold: f32,
    /// Span change required between successive `PinchZoom` intents.
    #[serde(default = "default_pinch_step")]
    pub pinch_step: f32,
    /// Smallest scaled cursor delta that produces a `Move`.
    #[serde(default = "default_move_epsilon")]
    pub move_epsilon: f32,
    /// Smallest average vertical drift that produces a `Scroll`.
    #[serde(default = "default_scroll_epsilon")]
    pub scroll_epsilon: f32,
}

fn default_sensitivity() -> f32 {
    1.5
}
fn default_scroll_sensitivity() -> f32 {
    0.08
}
fn default_tap_max_duration_ms() -> u64 {
    200
}
fn default_tap_max_distance() -> f32 {
    30.0
}
fn default_drag_hold_time_ms() -> u64 {
    250
}
fn default_swipe_threshold() -> f32 {
    100.0
}
fn default_pinch_threshold() -> f32 {
    30.0
}
fn default_pinch_step() -> f32 {
    2.0
}
fn default_move_epsilon() -> f32 {
    0.5
}
fn default_scroll_epsilon() -> f32 {
    1.0
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            sensitivity: default_sensitivity(),
            scroll_sensitivity: default_scroll_sensitivity(),
            tap_max_duration_ms: default_tap_max_duration_ms(),
            tap_max_distance: default_tap_max_distance(),
            drag_hold_time_ms: default_drag_hold_time_ms(),
            swipe_threshold: default_swipe_threshold(),
            pinch_threshold: default_pinch_threshold(),
            pinch_step: default_pinch_step(),
            move_epsilon: default_move_epsilon(),
            scroll_epsilon: default_scroll_epsilon(),
        }
    }
}

impl GestureConfig {
    /// Cursor sensitivity range offered to users.
    pub const SENSITIVITY_RANGE: (f32, f32) = (0.5, 4.0);
    /// Scroll sensitivity range offered to users.
    pub const SCROLL_SENSITIVITY_RANGE: (f32, f32) = (0.01, 0.20);

    /// Returns a copy with both sensitivities pulled into their user ranges.
    ///
    /// Non-finite values fall back to the defaults.
    pub fn sanitized(mut self) -> Self {
        self.sensitivity = clamp_or_default(
            self.sensitivity,
            Self::SENSITIVITY_RANGE,
            default_sensitivity(),
        );
        self.scroll_sensitivity = clamp_or_default(
            self.scroll_sensitivity,
            Self::SCROLL_SENSITIVITY_RANGE,
            default_scroll_sensitivity(),
        );
        self
    }
}

fn clamp_or_default(value: f32, (lo, hi): (f32, f32), fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        fallback
    }
}

// ── State ─────────────────────────────────────────────────────────────────────

/// Classification of a two-finger contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwoFingerKind {
    /// Neither the pinch nor the scroll threshold has been crossed yet.
    Undetermined,
    Scroll,
    Pinch,
    /// Tap-and-drag: the primary button is held and the second finger steers.
    Drag,
}

/// Gesture state for one continuous contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureState {
    Idle,
    SingleActive {
        start: Point,
        /// Position of the last emitted `Move`.
        last: Point,
        start_time: u64,
        moved: bool,
    },
    TwoActive {
        kind: TwoFingerKind,
        /// Average Y at the last emitted `Scroll`.
        last_y: f32,
        initial_span: f32,
        /// Span at the last emitted `PinchZoom`.
        last_span: f32,
        start_time: u64,
        moved: bool,
        /// Second finger's position at the last drag `Move`.
        drag_last: Point,
    },
    ThreeActive {
        start_avg: Point,
        last_avg: Point,
    },
}

impl GestureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, GestureState::Idle)
    }
}

// ── Classifier ────────────────────────────────────────────────────────────────

/// Gesture state machine for one touch surface.
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    config: GestureConfig,
    state: GestureState,
    /// Newest timestamp seen; stands in for "now" when a callback has no samples.
    now_ms: u64,
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

impl GestureClassifier {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            state: GestureState::Idle,
            now_ms: 0,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Replaces the thresholds.  Takes effect from the next callback.
    pub fn set_config(&mut self, config: GestureConfig) {
        self.config = config;
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    /// Feeds one touch callback and returns the intents it produces.
    ///
    /// `samples` lists every pointer in contact at the time of the callback,
    /// in the host's pointer-index order.  For `PointerUp` / `Up` the lifting
    /// pointer is still included, so a `PointerUp` with a single sample ends
    /// the gesture just like `Up`.
    pub fn feed(&mut self, action: TouchAction, samples: &[PointerSample]) -> Vec<PointerIntent> {
        if let Some(ts) = samples.iter().map(|s| s.timestamp_ms).max() {
            self.now_ms = self.now_ms.max(ts);
        }

        let mut out = Vec::new();
        match action {
            TouchAction::Down => self.on_down(samples, &mut out),
            TouchAction::PointerDown => self.on_pointer_down(samples, &mut out),
            TouchAction::Move => self.on_move(samples, &mut out),
            TouchAction::PointerUp => {
                if samples.len() <= 1 {
                    self.on_release(samples, &mut out);
                }
            }
            TouchAction::Up => self.on_release(samples, &mut out),
            TouchAction::Cancel => self.on_cancel(&mut out),
        }
        out
    }

    fn on_down(&mut self, samples: &[PointerSample], out: &mut Vec<PointerIntent>) {
        // A Down while a gesture is live means the previous Up was lost.
        if !self.state.is_idle() {
            self.on_cancel(out);
        }
        if let Some(first) = samples.first() {
            let p = first.point();
            self.state = GestureState::SingleActive {
                start: p,
                last: p,
                start_time: self.now_ms,
                moved: false,
            };
        }
    }

    fn on_pointer_down(&mut self, samples: &[PointerSample], out: &mut Vec<PointerIntent>) {
        let cfg = self.config;
        let now = self.now_ms;

        if samples.len() >= 3 {
            let avg = average(samples);
            if let GestureState::TwoActive { kind, .. } = self.state {
                debug!(?kind, "third finger abandons two-finger gesture");
            }
            self.state = GestureState::ThreeActive {
                start_avg: avg,
                last_avg: avg,
            };
            return;
        }
        if samples.len() != 2 {
            return;
        }

        let start_two = |kind: TwoFingerKind| GestureState::TwoActive {
            kind,
            last_y: average(samples).y,
            initial_span: span(samples),
            last_span: span(samples),
            start_time: now,
            moved: false,
            drag_last: samples[1].point(),
        };

        match self.state {
            GestureState::SingleActive {
                start,
                start_time,
                moved,
                ..
            } => {
                let held_for = now.saturating_sub(start_time);
                let drift = samples[0].point().distance_to(start);
                if held_for > cfg.drag_hold_time_ms && drift < cfg.tap_max_distance && !moved {
                    debug!(held_for, "stationary hold plus second finger: drag");
                    self.state = start_two(TwoFingerKind::Drag);
                    out.push(PointerIntent::DragStart);
                } else {
                    self.state = start_two(TwoFingerKind::Undetermined);
                }
            }
            GestureState::Idle => self.state = start_two(TwoFingerKind::Undetermined),
            // Re-adding a second finger keeps the current classification.
            GestureState::TwoActive { .. } | GestureState::ThreeActive { .. } => {}
        }
    }

    fn on_move(&mut self, samples: &[PointerSample], out: &mut Vec<PointerIntent>) {
        let cfg = self.config;
        let now = self.now_ms;

        match &mut self.state {
            GestureState::Idle => {}

            GestureState::SingleActive {
                start,
                last,
                start_time,
                moved,
            } => {
                let Some(first) = samples.first() else {
                    return;
                };
                let p = first.point();
                // Inside the tap window motion is held back; it is released in
                // one piece as soon as the contact can no longer be a tap.
                let could_be_tap = !*moved
                    && p.distance_to(*start) < cfg.tap_max_distance
                    && now.saturating_sub(*start_time) < cfg.tap_max_duration_ms;
                if could_be_tap {
                    return;
                }
                let dx = (p.x - last.x) * cfg.sensitivity;
                let dy = (p.y - last.y) * cfg.sensitivity;
                if dx.abs() > cfg.move_epsilon || dy.abs() > cfg.move_epsilon {
                    *moved = true;
                    *last = p;
                    out.push(PointerIntent::Move { dx, dy });
                }
            }

            GestureState::TwoActive {
                kind: TwoFingerKind::Drag,
                drag_last,
                ..
            } => {
                let Some(second) = samples.get(1) else {
                    return;
                };
                let p = second.point();
                let dx = (p.x - drag_last.x) * cfg.sensitivity;
                let dy = (p.y - drag_last.y) * cfg.sensitivity;
                if dx.abs() > cfg.move_epsilon || dy.abs() > cfg.move_epsilon {
                    *drag_last = p;
                    out.push(PointerIntent::Move { dx, dy });
                }
            }

            GestureState::TwoActive {
                kind,
                last_y,
                initial_span,
                last_span,
                moved,
                ..
            } => {
                if samples.len() < 2 {
                    return;
                }
                let current_span = span(samples);
                let current_y = average(samples).y;

                if *kind == TwoFingerKind::Undetermined {
                    if (current_span - *initial_span).abs() > cfg.pinch_threshold {
                        debug!("two-finger gesture classified as pinch");
                        *kind = TwoFingerKind::Pinch;
                    } else if (current_y - *last_y).abs() > cfg.scroll_epsilon {
                        debug!("two-finger gesture classified as scroll");
                        *kind = TwoFingerKind::Scroll;
                    }
                }

                match kind {
                    TwoFingerKind::Pinch => {
                        let delta = current_span - *last_span;
                        if delta.abs() > cfg.pinch_step {
                            *last_span = current_span;
                            *moved = true;
                            out.push(PointerIntent::PinchZoom { delta });
                        }
                    }
                    TwoFingerKind::Scroll => {
                        let delta_y = current_y - *last_y;
                        if delta_y.abs() > cfg.scroll_epsilon {
                            *last_y = current_y;
                            *moved = true;
                            out.push(PointerIntent::Scroll {
                                amount: -delta_y * cfg.scroll_sensitivity,
                            });
                        }
                    }
                    TwoFingerKind::Undetermined | TwoFingerKind::Drag => {}
                }
            }

            GestureState::ThreeActive { last_avg, .. } => {
                if samples.len() >= 3 {
                    *last_avg = average(samples);
                }
            }
        }
    }

    fn on_release(&mut self, samples: &[PointerSample], out: &mut Vec<PointerIntent>) {
        let cfg = self.config;
        let now = self.now_ms;

        match self.state {
            GestureState::ThreeActive {
                start_avg,
                last_avg,
            } => {
                let dx = last_avg.x - start_avg.x;
                let dy = last_avg.y - start_avg.y;
                if dx.abs().max(dy.abs()) > cfg.swipe_threshold {
                    let direction = if dx.abs() > dy.abs() {
                        if dx < 0.0 {
                            SwipeDirection::Left
                        } else {
                            SwipeDirection::Right
                        }
                    } else if dy < 0.0 {
                        SwipeDirection::Up
                    } else {
                        SwipeDirection::Down
                    };
                    out.push(PointerIntent::Swipe(direction));
                }
            }

            GestureState::TwoActive {
                kind: TwoFingerKind::Drag,
                ..
            } => out.push(PointerIntent::DragEnd),

            GestureState::TwoActive {
                kind: TwoFingerKind::Undetermined | TwoFingerKind::Scroll,
                moved: false,
                start_time,
                ..
            } => {
                if now.saturating_sub(start_time) < cfg.tap_max_duration_ms {
                    out.push(PointerIntent::RightClick);
                }
            }

            GestureState::SingleActive {
                start,
                last,
                start_time,
                moved: false,
            } => {
                let end = samples.first().map(PointerSample::point).unwrap_or(last);
                if now.saturating_sub(start_time) < cfg.tap_max_duration_ms
                    && end.distance_to(start) < cfg.tap_max_distance
                {
                    out.push(PointerIntent::Click);
                }
            }

            _ => {}
        }

        self.state = GestureState::Idle;
    }

    fn on_cancel(&mut self, out: &mut Vec<PointerIntent>) {
        if let GestureState::TwoActive {
            kind: TwoFingerKind::Drag,
            ..
        } = self.state
        {
            out.push(PointerIntent::DragEnd);
        }
        self.state = GestureState::Idle;
    }
}

fn average(samples: &[PointerSample]) -> Point {
    if samples.is_empty() {
        return Point::default();
    }
    let n = samples.len() as f32;
    let (sx, sy) = samples
        .iter()
        .fold((0.0, 0.0), |(sx, sy), s| (sx + s.x, sy + s.y));
    Point {
        x: sx / n,
        y: sy / n,
    }
}

/// Distance between the first two pointers.
fn span(samples: &[PointerSample]) -> f32 {
    match samples {
        [a, b, ..] => a.point().distance_to(b.point()),
        _ => 0.0,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
