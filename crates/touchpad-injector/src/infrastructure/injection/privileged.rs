//! Privileged display-scoped injection backend.
//!
//! Some platforms expose an event-injection call that only privileged
//! processes may use.  It takes a synthetic motion record, the display the
//! event belongs to, and an injection mode.  This service does not hold that
//! privilege itself; a small helper process does, and answers requests on a
//! Unix socket.  [`PrivilegedApi`] abstracts the call so the backend can be
//! tested without the helper.
//!
//! # Why brute-force the mode? (for beginners)
//!
//! The mode argument is undocumented and the accepted values differ between
//! platform versions.  A value that is wrong is silently rejected rather than
//! reported as an error, so the only reliable way to find a working value is
//! to try each candidate with a harmless hover event during the probe and
//! keep the first one the platform accepts.
//!
//! # Helper wire format
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┐
//! │ length (u32) │ bincode(HelperRequest)       │   service ─► helper
//! ├──────────────┼──────────────────────────────┤
//! │ length (u32) │ bincode(HelperResponse)      │   helper ─► service
//! └──────────────┴──────────────────────────────┘
//! ```
//!
//! Lengths are little-endian and exclude themselves.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::{debug, info};
use touchpad_core::{CursorPosition, MouseButton, TargetId};

use crate::application::pointer_sink::{
    BackendKind, BackendParams, InjectionError, InjectionMode, PointerSink, SinkCapabilities,
};

/// Largest helper frame accepted, in bytes.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

// ── Motion records ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionAction {
    HoverMove,
    Down,
    Up,
    Scroll,
}

/// A synthetic single-pointer mouse event at absolute display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionRecord {
    pub action: MotionAction,
    pub x: f32,
    pub y: f32,
    /// Button pressed by `Down`, or released by `Up`.
    pub button: Option<MouseButton>,
    /// Vertical scroll amount, only meaningful for `Scroll`.
    pub scroll: f32,
}

impl MotionRecord {
    pub fn hover(at: CursorPosition) -> Self {
        Self {
            action: MotionAction::HoverMove,
            x: at.x,
            y: at.y,
            button: None,
            scroll: 0.0,
        }
    }

    pub fn button(at: CursorPosition, button: MouseButton, pressed: bool) -> Self {
        Self {
            action: if pressed { MotionAction::Down } else { MotionAction::Up },
            button: Some(button),
            ..Self::hover(at)
        }
    }

    pub fn scroll(at: CursorPosition, amount: f32) -> Self {
        Self {
            action: MotionAction::Scroll,
            scroll: amount,
            ..Self::hover(at)
        }
    }
}

/// The privileged injection call.
///
/// `Ok(false)` means the platform received the event and refused it, which
/// is how a wrong `mode` shows up.
#[async_trait]
pub trait PrivilegedApi: Send + Sync {
    async fn inject(
        &self,
        record: &MotionRecord,
        target: TargetId,
        mode: InjectionMode,
    ) -> Result<bool, InjectionError>;
}

// ── Backend ───────────────────────────────────────────────────────────────────

/// Injects absolute mouse events on one display through a [`PrivilegedApi`].
pub struct PrivilegedSink {
    api: Arc<dyn PrivilegedApi>,
    target: TargetId,
    candidates: Vec<InjectionMode>,
    mode: Option<InjectionMode>,
}

impl PrivilegedSink {
    pub fn new(api: Arc<dyn PrivilegedApi>, target: TargetId, candidates: Vec<InjectionMode>) -> Self {
        Self {
            api,
            target,
            candidates,
            mode: None,
        }
    }

    /// Mode accepted during the probe, if any.
    pub fn mode(&self) -> Option<InjectionMode> {
        self.mode
    }

    async fn inject(&self, record: MotionRecord) -> Result<(), InjectionError> {
        let mode = self
            .mode
            .ok_or_else(|| InjectionError::Unavailable("privileged backend not probed".into()))?;
        if self.api.inject(&record, self.target, mode).await? {
            Ok(())
        } else {
            Err(InjectionError::Rejected(format!(
                "{:?} refused on {} with mode {}",
                record.action, self.target, mode.0
            )))
        }
    }
}

#[async_trait]
impl PointerSink for PrivilegedSink {
    fn kind(&self) -> BackendKind {
        BackendKind::Privileged
    }

    fn capabilities(&self) -> SinkCapabilities {
        SinkCapabilities {
            supports_hover: true,
            supports_absolute_targeting: true,
        }
    }

    /// Tries each candidate mode with a hover at `at`; the first accepted wins.
    ///
    /// A transport failure aborts the probe: the helper is unreachable and
    /// trying the remaining modes would only fail the same way.
    async fn probe(&mut self, at: CursorPosition) -> Result<BackendParams, InjectionError> {
        let record = MotionRecord::hover(at);
        for &mode in &self.candidates {
            debug!(mode = mode.0, target = %self.target, "trying injection mode");
            if self.api.inject(&record, self.target, mode).await? {
                info!(mode = mode.0, target = %self.target, "injection mode accepted");
                self.mode = Some(mode);
                return Ok(BackendParams::Mode(mode));
            }
        }
        let tried: Vec<i32> = self.candidates.iter().map(|m| m.0).collect();
        Err(InjectionError::Rejected(format!(
            "no injection mode accepted (tried {tried:?})"
        )))
    }

    async fn move_by(
        &mut self,
        _dx: f32,
        _dy: f32,
        at: CursorPosition,
    ) -> Result<(), InjectionError> {
        self.inject(MotionRecord::hover(at)).await
    }

    async fn set_button(
        &mut self,
        button: MouseButton,
        pressed: bool,
        at: CursorPosition,
    ) -> Result<(), InjectionError> {
        self.inject(MotionRecord::button(at, button, pressed)).await
    }

    async fn scroll(&mut self, amount: f32, at: CursorPosition) -> Result<(), InjectionError> {
        self.inject(MotionRecord::scroll(at, amount)).await
    }

    async fn release(&mut self) {
        self.mode = None;
    }
}

// ── Helper socket client ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelperRequest {
    pub record: MotionRecord,
    pub target: TargetId,
    pub mode: InjectionMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperResponse {
    pub accepted: bool,
}

/// [`PrivilegedApi`] over the helper's Unix socket.
///
/// One connection is kept open and reused.  Any failure drops it so the next
/// call reconnects.
pub struct HelperSocketApi {
    path: PathBuf,
    timeout: Duration,
    stream: Mutex<Option<UnixStream>>,
}

impl HelperSocketApi {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
            stream: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn exchange(
        stream: &mut Option<UnixStream>,
        path: &Path,
        request: &HelperRequest,
    ) -> Result<HelperResponse, InjectionError> {
        if stream.is_none() {
            let connected = UnixStream::connect(path).await.map_err(|e| {
                InjectionError::Unavailable(format!("helper at {}: {e}", path.display()))
            })?;
            *stream = Some(connected);
        }
        let conn = stream.as_mut().ok_or(InjectionError::Disconnected)?;

        let payload = bincode::serialize(request)
            .map_err(|e| InjectionError::Protocol(e.to_string()))?;
        write_frame(conn, &payload).await?;
        let reply = read_frame(conn).await?;
        bincode::deserialize(&reply).map_err(|e| InjectionError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl PrivilegedApi for HelperSocketApi {
    async fn inject(
        &self,
        record: &MotionRecord,
        target: TargetId,
        mode: InjectionMode,
    ) -> Result<bool, InjectionError> {
        let request = HelperRequest {
            record: *record,
            target,
            mode,
        };

        let mut stream = self.stream.lock().await;
        let result = match tokio::time::timeout(
            self.timeout,
            Self::exchange(&mut *stream, &self.path, &request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(InjectionError::Timeout(self.timeout)),
        };

        if result.is_err() {
            // The stream may hold half a frame; start clean next time.
            *stream = None;
        }
        result.map(|r| r.accepted)
    }
}

/// Writes one length-prefixed frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), InjectionError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_SIZE {
        return Err(InjectionError::Protocol(format!(
            "frame of {} bytes exceeds {MAX_FRAME_SIZE}",
            payload.len()
        )));
    }
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    writer.write_all(&buf).await.map_err(map_stream_error)?;
    writer.flush().await.map_err(map_stream_error)
}

/// Reads one length-prefixed frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, InjectionError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    reader.read_exact(&mut header).await.map_err(map_stream_error)?;
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(InjectionError::Protocol(format!(
            "frame of {len} bytes exceeds {MAX_FRAME_SIZE}"
        )));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(map_stream_error)?;
    Ok(payload)
}

fn map_stream_error(e: std::io::Error) -> InjectionError {
    match e.kind() {
        std::io::ErrorKind::UnexpectedEof
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::ConnectionReset => InjectionError::Disconnected,
        _ => InjectionError::Io(e),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Accepts only `accepted_mode`; records every call.
    struct FakeApi {
        accepted_mode: Option<InjectionMode>,
        calls: StdMutex<Vec<(MotionAction, InjectionMode)>>,
        fail_transport: bool,
    }

    impl FakeApi {
        fn accepting(mode: Option<i32>) -> Arc<Self> {
            Arc::new(Self {
                accepted_mode: mode.map(InjectionMode),
                calls: StdMutex::new(Vec::new()),
                fail_transport: false,
            })
        }
    }

    #[async_trait]
    impl PrivilegedApi for FakeApi {
        async fn inject(
            &self,
            record: &MotionRecord,
            _target: TargetId,
            mode: InjectionMode,
        ) -> Result<bool, InjectionError> {
            self.calls.lock().unwrap().push((record.action, mode));
            if self.fail_transport {
                return Err(InjectionError::Disconnected);
            }
            Ok(self.accepted_mode == Some(mode))
        }
    }

    fn candidates() -> Vec<InjectionMode> {
        vec![InjectionMode(0), InjectionMode(1), InjectionMode(2)]
    }

    fn at() -> CursorPosition {
        CursorPosition { x: 960.0, y: 540.0 }
    }

    #[tokio::test]
    async fn test_probe_finds_accepted_mode() {
        // Arrange
        let api = FakeApi::accepting(Some(2));
        let mut sink = PrivilegedSink::new(api.clone(), TargetId(1), candidates());

        // Act
        let params = sink.probe(at()).await.expect("probe");

        // Assert
        assert_eq!(params, BackendParams::Mode(InjectionMode(2)));
        assert_eq!(sink.mode(), Some(InjectionMode(2)));
        assert_eq!(api.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_probe_fails_when_no_mode_accepted() {
        let api = FakeApi::accepting(None);
        let mut sink = PrivilegedSink::new(api, TargetId(1), candidates());

        let result = sink.probe(at()).await;

        assert!(matches!(result, Err(InjectionError::Rejected(ref m)) if m.contains("[0, 1, 2]")));
    }

    #[tokio::test]
    async fn test_transport_failure_aborts_probe() {
        // Arrange
        let api = Arc::new(FakeApi {
            accepted_mode: Some(InjectionMode(1)),
            calls: StdMutex::new(Vec::new()),
            fail_transport: true,
        });
        let mut sink = PrivilegedSink::new(api.clone(), TargetId(1), candidates());

        // Act
        let result = sink.probe(at()).await;

        // Assert
        assert!(matches!(result, Err(InjectionError::Disconnected)));
        assert_eq!(api.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_live_calls_reuse_cached_mode() {
        // Arrange
        let api = FakeApi::accepting(Some(1));
        let mut sink = PrivilegedSink::new(api.clone(), TargetId(1), candidates());
        sink.probe(at()).await.expect("probe");
        api.calls.lock().unwrap().clear();

        // Act
        sink.set_button(MouseButton::Left, true, at()).await.expect("down");
        sink.set_button(MouseButton::Left, false, at()).await.expect("up");
        sink.scroll(-0.4, at()).await.expect("scroll");

        // Assert
        let calls = api.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                (MotionAction::Down, InjectionMode(1)),
                (MotionAction::Up, InjectionMode(1)),
                (MotionAction::Scroll, InjectionMode(1)),
            ]
        );
    }

    #[tokio::test]
    async fn test_unprobed_sink_is_unavailable() {
        let api = FakeApi::accepting(Some(0));
        let mut sink = PrivilegedSink::new(api, TargetId(1), candidates());

        let result = sink.move_by(1.0, 1.0, at()).await;

        assert!(matches!(result, Err(InjectionError::Unavailable(_))));
    }

    #[test]
    fn test_motion_record_constructors() {
        let down = MotionRecord::button(at(), MouseButton::Right, true);
        assert_eq!(down.action, MotionAction::Down);
        assert_eq!(down.button, Some(MouseButton::Right));
        assert_eq!((down.x, down.y), (960.0, 540.0));

        let scroll = MotionRecord::scroll(at(), 1.0);
        assert_eq!(scroll.action, MotionAction::Scroll);
        assert_eq!(scroll.button, None);
    }

    #[tokio::test]
    async fn test_frame_round_trip_over_duplex() {
        // Arrange
        let (mut a, mut b) = tokio::io::duplex(1024);
        let request = HelperRequest {
            record: MotionRecord::hover(at()),
            target: TargetId(3),
            mode: InjectionMode(1),
        };
        let payload = bincode::serialize(&request).expect("serialize");

        // Act
        write_frame(&mut a, &payload).await.expect("write");
        let received = read_frame(&mut b).await.expect("read");

        // Assert
        let decoded: HelperRequest = bincode::deserialize(&received).expect("deserialize");
        assert_eq!(decoded, request);
    }

    #[tokio::test]
    async fn test_eof_mid_frame_is_disconnected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&[10, 0, 0, 0, 1, 2]).await.expect("write");
        drop(a);

        let result = read_frame(&mut b).await;

        assert!(matches!(result, Err(InjectionError::Disconnected)));
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&u32::MAX.to_le_bytes()).await.expect("write");

        let result = read_frame(&mut b).await;

        assert!(matches!(result, Err(InjectionError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_helper_socket_round_trip() {
        // Arrange: a one-shot helper accepting mode 2 only
        let dir = std::env::temp_dir().join(format!("touchpad_helper_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("helper.sock");
        let listener = tokio::net::UnixListener::bind(&path).expect("bind");
        tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.expect("accept");
            while let Ok(frame) = read_frame(&mut conn).await {
                let request: HelperRequest = bincode::deserialize(&frame).expect("request");
                let reply = HelperResponse {
                    accepted: request.mode == InjectionMode(2),
                };
                let bytes = bincode::serialize(&reply).expect("reply");
                if write_frame(&mut conn, &bytes).await.is_err() {
                    break;
                }
            }
        });
        let api = HelperSocketApi::new(&path, Duration::from_secs(2));

        // Act
        let rejected = api
            .inject(&MotionRecord::hover(at()), TargetId(0), InjectionMode(0))
            .await;
        let accepted = api
            .inject(&MotionRecord::hover(at()), TargetId(0), InjectionMode(2))
            .await;

        // Assert
        assert!(matches!(rejected, Ok(false)));
        assert!(matches!(accepted, Ok(true)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_missing_helper_socket_is_unavailable() {
        let api = HelperSocketApi::new("/nonexistent/touchpad/helper.sock", Duration::from_secs(1));

        let result = api
            .inject(&MotionRecord::hover(at()), TargetId(0), InjectionMode(0))
            .await;

        assert!(matches!(result, Err(InjectionError::Unavailable(_))));
    }
}
