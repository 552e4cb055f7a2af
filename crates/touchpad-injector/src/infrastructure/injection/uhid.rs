//! Virtual-HID mouse backend.
//!
//! Creates a kernel input device through the uhid character device and feeds
//! it 4-byte relative mouse reports.  The kernel treats the result like a
//! USB mouse plugged into the target, so motion, hover, buttons and wheel
//! all work and no display identifier is needed.
//!
//! # Lifetime of the device (for beginners)
//!
//! ```text
//! open /dev/uhid ─► CREATE2 ─► (kernel registers input device, async)
//!                              poll /proc/bus/input/devices until it shows up
//!               ─► INPUT2 ... INPUT2 ─► DESTROY ─► close
//! ```
//!
//! Every record is written with a single `write()` call.  The kernel parses
//! one record per call, so splitting a record over two writes corrupts it.
//! The records of one operation (e.g. the chunks of a long move) are written
//! together in one blocking-pool task.
//!
//! # Permissions
//!
//! `/dev/uhid` is usually `root:root 0600`.  Run the service as root or add a
//! udev rule granting the service user access.  A permission error surfaces
//! as [`InjectionError::Io`] when opening the channel, and the selector moves
//! on to the next backend.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use touchpad_core::protocol::report::{chunk_relative, chunk_wheel};
use touchpad_core::protocol::uhid::UhidCreate;
use touchpad_core::{
    encode_record, Buttons, CursorPosition, HidReport, MouseButton, UhidRecord, WheelAccumulator,
};

use crate::application::pointer_sink::{
    BackendKind, BackendParams, InjectionError, PointerSink, SinkCapabilities,
};
use crate::infrastructure::devices::{count_named, list_blocking, DeviceEnumerator};
use crate::infrastructure::injection::on_blocking_pool;

type Channel = Box<dyn Write + Send>;

/// How long to wait for the kernel to register a created device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceWait {
    pub timeout: Duration,
    pub poll: Duration,
}

/// Opens the uhid control device for reading and writing.
pub async fn open_channel(path: &Path) -> Result<Channel, InjectionError> {
    let path: PathBuf = path.to_path_buf();
    let file = tokio::task::spawn_blocking(move || {
        std::fs::OpenOptions::new().read(true).write(true).open(path)
    })
    .await
    .map_err(std::io::Error::other)??;
    Ok(Box::new(file))
}

/// Encodes `record` and writes it with exactly one `write()`.
fn write_record(channel: &mut Channel, record: &UhidRecord) -> Result<(), InjectionError> {
    let bytes = encode_record(record)?;
    let written = channel.write(&bytes)?;
    if written != bytes.len() {
        return Err(InjectionError::Protocol(format!(
            "short write: {written} of {} bytes",
            bytes.len()
        )));
    }
    Ok(())
}

/// A virtual relative mouse backed by a uhid channel.
pub struct UhidSink {
    /// `None` once the device has been destroyed.
    channel: Option<Channel>,
    name: String,
    buttons: Buttons,
    wheel: WheelAccumulator,
}

impl UhidSink {
    /// Creates the device on `channel` and waits until the kernel lists it.
    ///
    /// A device with the same name left over from a previous run is
    /// tolerated: the new one is counted on top of it.  If the new device
    /// does not appear within `wait.timeout` it is destroyed again and
    /// [`InjectionError::Unavailable`] is returned.
    pub async fn create(
        channel: Channel,
        name: &str,
        devices: Arc<dyn DeviceEnumerator>,
        wait: DeviceWait,
    ) -> Result<Self, InjectionError> {
        let mut sink = Self {
            channel: Some(channel),
            name: name.to_string(),
            buttons: Buttons::default(),
            wheel: WheelAccumulator::new(),
        };

        let stale = list_blocking(&devices)
            .await
            .map(|list| count_named(&list, name))
            .unwrap_or(0);
        if stale > 0 {
            warn!(name, stale, "virtual mouse already registered; destroying before create");
            if let Err(e) = sink.send_all(vec![UhidRecord::Destroy]).await {
                debug!(error = %e, "pre-create destroy was refused");
            }
        }

        let create = UhidRecord::Create(UhidCreate::virtual_mouse(name));
        sink.send_all(vec![create]).await?;

        let deadline = Instant::now() + wait.timeout;
        loop {
            match list_blocking(&devices).await {
                Ok(list) if count_named(&list, name) > stale => break,
                Ok(_) => {}
                Err(e) => debug!(error = %e, "device enumeration failed; retrying"),
            }
            if Instant::now() >= deadline {
                sink.release().await;
                return Err(InjectionError::Unavailable(format!(
                    "virtual device {name:?} did not appear within {:?}",
                    wait.timeout
                )));
            }
            tokio::time::sleep(wait.poll).await;
        }

        info!(name, "virtual mouse registered");
        Ok(sink)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_destroyed(&self) -> bool {
        self.channel.is_none()
    }

    /// Sends DESTROY from the calling thread and closes the channel.  Safe
    /// to call any number of times; [`PointerSink::release`] is the async
    /// equivalent.
    pub fn destroy(&mut self) {
        let Some(mut channel) = self.channel.take() else {
            return;
        };
        if let Err(e) = write_record(&mut channel, &UhidRecord::Destroy) {
            debug!(error = %e, "destroy record was not accepted");
        }
        self.closed();
    }

    fn closed(&mut self) {
        self.channel = None;
        self.buttons = Buttons::default();
        self.wheel.reset();
        debug!(name = %self.name, "virtual mouse destroyed");
    }

    /// Writes `records` in order, one `write()` each, off the runtime threads.
    async fn send_all(&mut self, records: Vec<UhidRecord>) -> Result<(), InjectionError> {
        if records.is_empty() {
            return Ok(());
        }
        on_blocking_pool(&mut self.channel, move |channel| {
            records
                .iter()
                .try_for_each(|record| write_record(channel, record))
        })
        .await
    }

    fn report(&self, dx: i8, dy: i8, wheel: i8) -> UhidRecord {
        UhidRecord::Input(HidReport {
            buttons: self.buttons,
            dx,
            dy,
            wheel,
        })
    }
}

impl Drop for UhidSink {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[async_trait]
impl PointerSink for UhidSink {
    fn kind(&self) -> BackendKind {
        BackendKind::VirtualHid
    }

    fn capabilities(&self) -> SinkCapabilities {
        SinkCapabilities {
            supports_hover: true,
            supports_absolute_targeting: false,
        }
    }

    async fn probe(&mut self, _at: CursorPosition) -> Result<BackendParams, InjectionError> {
        let report = self.report(0, 0, 0);
        self.send_all(vec![report]).await?;
        Ok(BackendParams::None)
    }

    async fn move_by(
        &mut self,
        dx: f32,
        dy: f32,
        _at: CursorPosition,
    ) -> Result<(), InjectionError> {
        let reports = chunk_relative(dx, dy)
            .into_iter()
            .map(|(x, y)| self.report(x, y, 0))
            .collect();
        self.send_all(reports).await
    }

    async fn set_button(
        &mut self,
        button: MouseButton,
        pressed: bool,
        _at: CursorPosition,
    ) -> Result<(), InjectionError> {
        let previous = self.buttons;
        self.buttons = self.buttons.with(button, pressed);
        let report = self.report(0, 0, 0);
        if let Err(e) = self.send_all(vec![report]).await {
            self.buttons = previous;
            return Err(e);
        }
        Ok(())
    }

    async fn scroll(&mut self, amount: f32, _at: CursorPosition) -> Result<(), InjectionError> {
        let notches = self.wheel.push(amount);
        let reports = chunk_wheel(notches)
            .into_iter()
            .map(|step| self.report(0, 0, step))
            .collect();
        self.send_all(reports).await
    }

    async fn release(&mut self) {
        if self.channel.is_none() {
            return;
        }
        if let Err(e) = self.send_all(vec![UhidRecord::Destroy]).await {
            debug!(error = %e, "destroy record was not accepted");
        }
        self.closed();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use touchpad_core::decode_record;
    use touchpad_core::protocol::uhid::{CREATE_PAYLOAD_SIZE, EVENT_TYPE_SIZE, INPUT_RECORD_SIZE};

    use crate::infrastructure::devices::{InputDeviceInfo, MockDeviceEnumerator};

    const NAME: &str = "Touchpad Remote Mouse";

    /// Captures each `write()` call separately.
    #[derive(Clone, Default)]
    struct CaptureChannel {
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
        /// Bytes accepted per call; `None` accepts everything.
        limit: Option<usize>,
    }

    impl Write for CaptureChannel {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = self.limit.map_or(buf.len(), |l| l.min(buf.len()));
            self.writes.lock().unwrap().push(buf[..n].to_vec());
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CaptureChannel {
        fn records(&self) -> Vec<UhidRecord> {
            self.writes
                .lock()
                .unwrap()
                .iter()
                .map(|w| decode_record(w).expect("decodable record").0)
                .collect()
        }
    }

    fn device(name: &str) -> InputDeviceInfo {
        InputDeviceInfo {
            name: name.to_string(),
            handlers: vec!["event7".to_string()],
            ..Default::default()
        }
    }

    /// Lists `before` devices named NAME for the first `calls` calls, then one more.
    fn appearing_after(calls: usize, before: usize) -> MockDeviceEnumerator {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut mock = MockDeviceEnumerator::new();
        mock.expect_list().returning(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let present = if n < calls { before } else { before + 1 };
            Ok((0..present).map(|_| device(NAME)).collect())
        });
        mock
    }

    fn fast_wait() -> DeviceWait {
        DeviceWait {
            timeout: Duration::from_millis(200),
            poll: Duration::from_millis(1),
        }
    }

    async fn created(channel: &CaptureChannel) -> UhidSink {
        let devices = Arc::new(appearing_after(2, 0));
        UhidSink::create(Box::new(channel.clone()), NAME, devices, fast_wait())
            .await
            .expect("device appears")
    }

    #[tokio::test]
    async fn test_create_writes_one_create_record() {
        // Arrange
        let channel = CaptureChannel::default();

        // Act
        let sink = created(&channel).await;

        // Assert
        let writes = channel.writes.lock().unwrap().clone();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].len(), EVENT_TYPE_SIZE + CREATE_PAYLOAD_SIZE);
        assert!(matches!(channel.records()[0], UhidRecord::Create(ref c) if c.name == NAME));
        assert!(!sink.is_destroyed());
    }

    #[tokio::test]
    async fn test_create_times_out_and_destroys() {
        // Arrange: the device never shows up
        let channel = CaptureChannel::default();
        let mut devices = MockDeviceEnumerator::new();
        devices.expect_list().returning(|| Ok(Vec::new()));
        let wait = DeviceWait {
            timeout: Duration::from_millis(20),
            poll: Duration::from_millis(2),
        };

        // Act
        let result =
            UhidSink::create(Box::new(channel.clone()), NAME, Arc::new(devices), wait).await;

        // Assert
        assert!(matches!(result, Err(InjectionError::Unavailable(_))));
        let records = channel.records();
        assert!(matches!(records[0], UhidRecord::Create(_)));
        assert_eq!(records.last(), Some(&UhidRecord::Destroy));
    }

    #[tokio::test]
    async fn test_stale_device_is_destroyed_then_recreated() {
        // Arrange: one leftover device, ours appears on the third listing
        let channel = CaptureChannel::default();
        let devices = Arc::new(appearing_after(3, 1));

        // Act
        let sink = UhidSink::create(Box::new(channel.clone()), NAME, devices, fast_wait()).await;

        // Assert
        assert!(sink.is_ok());
        let records = channel.records();
        assert_eq!(records[0], UhidRecord::Destroy);
        assert!(matches!(records[1], UhidRecord::Create(_)));
    }

    #[tokio::test]
    async fn test_large_move_is_chunked_into_reports() {
        // Arrange
        let channel = CaptureChannel::default();
        let mut sink = created(&channel).await;
        channel.writes.lock().unwrap().clear();

        // Act
        sink.move_by(300.0, -5.0, CursorPosition::default())
            .await
            .expect("move");

        // Assert
        let writes = channel.writes.lock().unwrap().clone();
        assert!(writes.iter().all(|w| w.len() == INPUT_RECORD_SIZE));
        let (sx, sy) = channel.records().iter().fold((0i32, 0i32), |(ax, ay), r| match r {
            UhidRecord::Input(rep) => (ax + i32::from(rep.dx), ay + i32::from(rep.dy)),
            _ => (ax, ay),
        });
        assert_eq!((sx, sy), (300, -5));
        assert_eq!(writes.len(), 3);
    }

    #[tokio::test]
    async fn test_button_state_is_carried_in_motion_reports() {
        // Arrange
        let channel = CaptureChannel::default();
        let mut sink = created(&channel).await;
        let at = CursorPosition::default();
        channel.writes.lock().unwrap().clear();

        // Act: press, drag, release
        sink.set_button(MouseButton::Left, true, at).await.expect("press");
        sink.move_by(10.0, 0.0, at).await.expect("move");
        sink.set_button(MouseButton::Left, false, at).await.expect("release");

        // Assert
        let buttons: Vec<u8> = channel
            .records()
            .iter()
            .filter_map(|r| match r {
                UhidRecord::Input(rep) => Some(rep.buttons.0),
                _ => None,
            })
            .collect();
        assert_eq!(buttons, vec![0b001, 0b001, 0b000]);
    }

    #[tokio::test]
    async fn test_fractional_scroll_waits_for_whole_notch() {
        // Arrange
        let channel = CaptureChannel::default();
        let mut sink = created(&channel).await;
        let at = CursorPosition::default();
        channel.writes.lock().unwrap().clear();

        // Act
        sink.scroll(0.6, at).await.expect("first");
        let after_first = channel.writes.lock().unwrap().len();
        sink.scroll(0.6, at).await.expect("second");

        // Assert
        assert_eq!(after_first, 0);
        let records = channel.records();
        assert_eq!(records.len(), 1);
        assert!(matches!(records[0], UhidRecord::Input(rep) if rep.wheel == 1));
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        // Arrange
        let channel = CaptureChannel::default();
        let mut sink = created(&channel).await;

        // Act
        sink.release().await;
        sink.release().await;
        drop(sink);

        // Assert: exactly one DESTROY after the CREATE
        let records = channel.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], UhidRecord::Destroy);
    }

    #[tokio::test]
    async fn test_calls_after_destroy_report_disconnected() {
        let channel = CaptureChannel::default();
        let mut sink = created(&channel).await;
        sink.destroy();

        let result = sink.move_by(1.0, 1.0, CursorPosition::default()).await;

        assert!(matches!(result, Err(InjectionError::Disconnected)));
    }

    #[tokio::test]
    async fn test_short_write_is_a_protocol_error() {
        // Arrange: channel accepts the CREATE, then only 3 bytes per call
        let channel = CaptureChannel::default();
        let mut sink = created(&channel).await;
        sink.channel = Some(Box::new(CaptureChannel {
            writes: Arc::clone(&channel.writes),
            limit: Some(3),
        }));

        // Act
        let result = sink.probe(CursorPosition::default()).await;

        // Assert
        assert!(matches!(result, Err(InjectionError::Protocol(_))));
    }
}
