//! Routes classifier intents to the input service.
//!
//! The classifier knows nothing about displays or backends; the service
//! knows nothing about fingers.  [`IntentDispatcher`] sits between them,
//! owning the [`CursorModel`] of the target display so relative `Move`
//! intents become clamped absolute positions.  [`TouchSession`] adds the
//! classifier in front, giving one object that takes raw touch callbacks.

use std::sync::Arc;

use tracing::{debug, warn};
use touchpad_core::{
    CursorModel, CursorPosition, GestureClassifier, GestureConfig, PointerIntent, PointerSample,
    TargetId, TouchAction,
};

use crate::application::input_service::InputService;

/// Maps [`PointerIntent`]s onto [`InputService`] calls for one display.
pub struct IntentDispatcher {
    service: Arc<InputService>,
    target: TargetId,
    cursor: CursorModel,
    drag_active: bool,
}

impl IntentDispatcher {
    /// Creates a dispatcher for `target`; call [`Self::select_target`] to
    /// bind the service before dispatching.
    pub fn new(service: Arc<InputService>, target: TargetId, width: u32, height: u32) -> Self {
        Self {
            service,
            target,
            cursor: CursorModel::new(width, height),
            drag_active: false,
        }
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn cursor(&self) -> CursorPosition {
        self.cursor.position()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_active
    }

    /// Switches to `target`, recentres the cursor, and re-probes backends.
    pub async fn select_target(&mut self, target: TargetId, width: u32, height: u32) {
        self.target = target;
        self.cursor.reset_to_center(width, height);
        self.drag_active = false;
        self.service.select_target(target, width, height).await;
    }

    /// Performs one intent.  Returns the service's best-effort result.
    pub async fn dispatch(&mut self, intent: PointerIntent) -> bool {
        let target = self.target;
        let at = self.cursor.position();

        let ok = match intent {
            PointerIntent::Move { dx, dy } => {
                let to = self.cursor.apply_relative(dx, dy);
                self.service.move_cursor(target, to.x, to.y).await
            }
            PointerIntent::Click => self.service.click(target, at.x, at.y).await,
            PointerIntent::RightClick => self.service.right_click(target, at.x, at.y).await,
            PointerIntent::Scroll { amount } => {
                self.service.scroll(target, at.x, at.y, amount).await
            }
            PointerIntent::PinchZoom { delta } => {
                let notch = if delta > 0.0 { 1.0 } else { -1.0 };
                self.service.scroll(target, at.x, at.y, notch).await
            }
            PointerIntent::DragStart => {
                self.drag_active = true;
                self.service.start_drag(target).await
            }
            PointerIntent::DragEnd => {
                self.drag_active = false;
                self.service.end_drag(target).await
            }
            PointerIntent::Swipe(direction) => {
                self.service.send_swipe_action(target, direction).await
            }
        };

        if !ok {
            debug!(?intent, "intent was not delivered");
        }
        ok
    }
}

/// Classifier plus dispatcher: raw touch callbacks in, injected events out.
pub struct TouchSession {
    classifier: GestureClassifier,
    dispatcher: IntentDispatcher,
}

impl TouchSession {
    pub fn new(config: GestureConfig, dispatcher: IntentDispatcher) -> Self {
        Self {
            classifier: GestureClassifier::new(config.sanitized()),
            dispatcher,
        }
    }

    pub fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }

    pub fn dispatcher(&self) -> &IntentDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut IntentDispatcher {
        &mut self.dispatcher
    }

    /// Feeds one touch callback and dispatches every resulting intent.
    ///
    /// Returns the intents in the order they were dispatched.
    pub async fn handle(&mut self, action: TouchAction, samples: &[PointerSample]) -> Vec<PointerIntent> {
        let mut intents = self.classifier.feed(action, samples);
        for intent in &intents {
            self.dispatcher.dispatch(*intent).await;
        }

        // A third finger can abandon a drag without DragEnd; never leave the
        // button held once the contact is over.
        if self.classifier.state().is_idle() && self.dispatcher.is_dragging() {
            warn!("contact ended with the drag button held; releasing it");
            self.dispatcher.dispatch(PointerIntent::DragEnd).await;
            intents.push(PointerIntent::DragEnd);
        }
        intents
    }
}
