//! Shell-command backend: the last resort.
//!
//! Runs the platform `input` utility once per event.  The utility can tap
//! at a display coordinate but cannot hover, hold a button across calls,
//! or scroll, so this backend only turns a left press/release pair into a
//! single tap and answers everything else with
//! [`InjectionError::Unsupported`].  The selector treats that as a
//! capability gap, not a broken backend.

use std::sync::Arc;

use async_trait::async_trait;
use touchpad_core::{CursorPosition, MouseButton, TargetId};

use crate::application::pointer_sink::{
    BackendKind, BackendParams, InjectionError, PointerSink, SinkCapabilities,
};
use crate::application::system_action::CommandRunner;

/// Key code the probe sends; the platform ignores it.
const KEYCODE_UNKNOWN: u32 = 0;

pub struct ShellSink {
    runner: Arc<dyn CommandRunner>,
    program: String,
    target: TargetId,
    pressed_at: Option<CursorPosition>,
}

impl ShellSink {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>, target: TargetId) -> Self {
        Self {
            runner,
            program: program.into(),
            target,
            pressed_at: None,
        }
    }

    fn args(&self, rest: &[String]) -> Vec<String> {
        let mut args = vec!["-d".to_string(), self.target.0.to_string()];
        args.extend_from_slice(rest);
        args
    }

    async fn tap(&self, at: CursorPosition) -> Result<(), InjectionError> {
        let (x, y) = at.rounded();
        let args = self.args(&["tap".to_string(), x.to_string(), y.to_string()]);
        self.runner.run(&self.program, &args).await
    }
}

#[async_trait]
impl PointerSink for ShellSink {
    fn kind(&self) -> BackendKind {
        BackendKind::Shell
    }

    fn capabilities(&self) -> SinkCapabilities {
        SinkCapabilities {
            supports_hover: false,
            supports_absolute_targeting: true,
        }
    }

    async fn probe(&mut self, _at: CursorPosition) -> Result<BackendParams, InjectionError> {
        let args = self.args(&["keyevent".to_string(), KEYCODE_UNKNOWN.to_string()]);
        self.runner.run(&self.program, &args).await?;
        Ok(BackendParams::None)
    }

    async fn move_by(
        &mut self,
        _dx: f32,
        _dy: f32,
        _at: CursorPosition,
    ) -> Result<(), InjectionError> {
        Err(InjectionError::Unsupported("hover move"))
    }

    /// A left press only records where it happened; the release taps there.
    async fn set_button(
        &mut self,
        button: MouseButton,
        pressed: bool,
        at: CursorPosition,
    ) -> Result<(), InjectionError> {
        if button != MouseButton::Left {
            return Err(InjectionError::Unsupported("non-primary button"));
        }
        if pressed {
            self.pressed_at = Some(at);
            return Ok(());
        }
        let at = self.pressed_at.take().unwrap_or(at);
        self.tap(at).await
    }

    async fn scroll(&mut self, _amount: f32, _at: CursorPosition) -> Result<(), InjectionError> {
        Err(InjectionError::Unsupported("scroll"))
    }

    async fn release(&mut self) {
        self.pressed_at = None;
    }
}
