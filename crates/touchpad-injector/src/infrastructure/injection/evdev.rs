//! Raw event-device backend.
//!
//! Writes relative-axis, key and sync events straight into an existing
//! `/dev/input/eventN` node through the `evdev` crate.  The kernel injects
//! them as though the device itself produced them, so this only works on a
//! node whose device declares relative X/Y axes;
//! [`crate::infrastructure::devices::find_pointer_node`] picks one.
//!
//! Each operation is one frame (events followed by `SYN_REPORT`) handed to
//! the device in a single `send_events` call, so a consumer never sees half a
//! frame.  The layout of `struct input_event` (including the width of its
//! timestamp on 32-bit targets) is left to `evdev`.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use evdev::{Device, EventType, InputEvent, Key, RelativeAxisType, Synchronization};
use tracing::debug;
use touchpad_core::{CursorPosition, MouseButton, WheelAccumulator};

use crate::application::pointer_sink::{
    BackendKind, BackendParams, InjectionError, PointerSink, SinkCapabilities,
};
use crate::infrastructure::injection::on_blocking_pool;

/// Somewhere a frame of input events can be delivered.
///
/// Implemented for [`evdev::Device`]; tests substitute a recorder.
pub trait EventWriter: Send {
    fn send_events(&mut self, events: &[InputEvent]) -> io::Result<()>;
}

impl EventWriter for Device {
    fn send_events(&mut self, events: &[InputEvent]) -> io::Result<()> {
        Device::send_events(self, events)
    }
}

// ── Frames ────────────────────────────────────────────────────────────────────

fn syn() -> InputEvent {
    InputEvent::new(EventType::SYNCHRONIZATION, Synchronization::SYN_REPORT.0, 0)
}

fn button_key(button: MouseButton) -> Key {
    match button {
        MouseButton::Left => Key::BTN_LEFT,
        MouseButton::Right => Key::BTN_RIGHT,
        MouseButton::Middle => Key::BTN_MIDDLE,
    }
}

/// Frame for a relative move; a zero axis is omitted and a zero move is empty.
pub fn motion_frame(dx: i32, dy: i32) -> Vec<InputEvent> {
    let mut frame = Vec::with_capacity(3);
    if dx != 0 {
        frame.push(InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_X.0, dx));
    }
    if dy != 0 {
        frame.push(InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_Y.0, dy));
    }
    if !frame.is_empty() {
        frame.push(syn());
    }
    frame
}

pub fn button_frame(button: MouseButton, pressed: bool) -> Vec<InputEvent> {
    vec![
        InputEvent::new(EventType::KEY, button_key(button).code(), i32::from(pressed)),
        syn(),
    ]
}

pub fn wheel_frame(notches: i32) -> Vec<InputEvent> {
    if notches == 0 {
        return Vec::new();
    }
    vec![
        InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_WHEEL.0, notches),
        syn(),
    ]
}

// ── Sink ──────────────────────────────────────────────────────────────────────

/// Writes relative pointer frames to an event device node.
pub struct EventDeviceSink {
    writer: Option<Box<dyn EventWriter>>,
    node: PathBuf,
    wheel: WheelAccumulator,
}

impl EventDeviceSink {
    /// Opens `node` as an evdev device.
    pub async fn open(node: PathBuf) -> Result<Self, InjectionError> {
        let path = node.clone();
        let device = tokio::task::spawn_blocking(move || Device::open(path))
            .await
            .map_err(io::Error::other)??;
        debug!(
            node = %node.display(),
            name = device.name().unwrap_or("unnamed"),
            "event device opened"
        );
        Ok(Self::with_writer(Box::new(device), node))
    }

    pub fn with_writer(writer: Box<dyn EventWriter>, node: PathBuf) -> Self {
        Self {
            writer: Some(writer),
            node,
            wheel: WheelAccumulator::new(),
        }
    }

    pub fn node(&self) -> &Path {
        &self.node
    }

    async fn write_frame(&mut self, frame: Vec<InputEvent>) -> Result<(), InjectionError> {
        if frame.is_empty() {
            return Ok(());
        }
        on_blocking_pool(&mut self.writer, move |writer| {
            writer.send_events(&frame).map_err(InjectionError::from)
        })
        .await
    }
}

#[async_trait]
impl PointerSink for EventDeviceSink {
    fn kind(&self) -> BackendKind {
        BackendKind::EventDevice
    }

    fn capabilities(&self) -> SinkCapabilities {
        SinkCapabilities {
            supports_hover: true,
            supports_absolute_targeting: false,
        }
    }

    async fn probe(&mut self, _at: CursorPosition) -> Result<BackendParams, InjectionError> {
        self.write_frame(vec![syn()]).await?;
        Ok(BackendParams::Node(self.node.clone()))
    }

    async fn move_by(
        &mut self,
        dx: f32,
        dy: f32,
        _at: CursorPosition,
    ) -> Result<(), InjectionError> {
        if !dx.is_finite() || !dy.is_finite() {
            return Ok(());
        }
        self.write_frame(motion_frame(dx.round() as i32, dy.round() as i32))
            .await
    }

    async fn set_button(
        &mut self,
        button: MouseButton,
        pressed: bool,
        _at: CursorPosition,
    ) -> Result<(), InjectionError> {
        self.write_frame(button_frame(button, pressed)).await
    }

    async fn scroll(&mut self, amount: f32, _at: CursorPosition) -> Result<(), InjectionError> {
        let notches = self.wheel.push(amount);
        self.write_frame(wheel_frame(notches)).await
    }

    async fn release(&mut self) {
        if self.writer.take().is_some() {
            debug!(node = %self.node.display(), "event device closed");
        }
        self.wheel.reset();
    }
}
