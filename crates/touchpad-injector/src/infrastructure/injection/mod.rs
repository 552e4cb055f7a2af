//! Pointer injection backends.
//!
//! | Backend          | Module        | Needs                               |
//! |------------------|---------------|-------------------------------------|
//! | Virtual HID      | [`uhid`]      | write access to `/dev/uhid`         |
//! | Event device     | [`evdev`]     | a writable relative-pointer node    |
//! | Privileged API   | [`privileged`]| a running helper on a Unix socket   |
//! | Shell            | [`shell`]     | the platform `input` utility        |
//!
//! [`SystemSinkFactory`] builds whichever one the selector asks for from the
//! `[injection]` config section.  A [`mock`] factory is provided for tests.
//!
//! Device channels are plain blocking file handles.  Writes to them run on
//! tokio's blocking pool through [`on_blocking_pool`], which moves the
//! channel into the task and hands it back afterwards.

pub mod evdev;
pub mod mock;
pub mod privileged;
pub mod shell;
pub mod uhid;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use touchpad_core::TargetId;

use crate::application::pointer_sink::{BackendKind, InjectionError, PointerSink, SinkFactory};
use crate::application::system_action::CommandRunner;
use crate::infrastructure::devices::{find_pointer_node, list_blocking, DeviceEnumerator};
use crate::infrastructure::storage::config::InjectionConfig;

use self::evdev::EventDeviceSink;
use self::privileged::{HelperSocketApi, PrivilegedApi, PrivilegedSink};
use self::shell::ShellSink;
use self::uhid::{DeviceWait, UhidSink};

/// Runs `op` on the channel in `slot` on the blocking pool.
///
/// The channel is put back once `op` returns.  An empty slot yields
/// [`InjectionError::Disconnected`]; so does a panic inside `op`, which loses
/// the channel.
pub(crate) async fn on_blocking_pool<C, T, F>(
    slot: &mut Option<C>,
    op: F,
) -> Result<T, InjectionError>
where
    C: Send + 'static,
    T: Send + 'static,
    F: FnOnce(&mut C) -> Result<T, InjectionError> + Send + 'static,
{
    let mut channel = slot.take().ok_or(InjectionError::Disconnected)?;
    let joined = tokio::task::spawn_blocking(move || {
        let result = op(&mut channel);
        (channel, result)
    })
    .await;
    match joined {
        Ok((channel, result)) => {
            *slot = Some(channel);
            result
        }
        Err(e) => {
            warn!(error = %e, "device write task failed; channel dropped");
            Err(InjectionError::Disconnected)
        }
    }
}

/// Opens the real backends.
pub struct SystemSinkFactory {
    config: InjectionConfig,
    devices: Arc<dyn DeviceEnumerator>,
    runner: Arc<dyn CommandRunner>,
    privileged: Option<Arc<dyn PrivilegedApi>>,
}

impl SystemSinkFactory {
    /// Builds the factory; the privileged backend is enabled only when
    /// `config.helper_socket` is set.
    pub fn new(
        config: InjectionConfig,
        devices: Arc<dyn DeviceEnumerator>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let privileged = config.helper_socket.as_ref().map(|path| {
            Arc::new(HelperSocketApi::new(path, config.command_timeout())) as Arc<dyn PrivilegedApi>
        });
        Self {
            config,
            devices,
            runner,
            privileged,
        }
    }

    /// Replaces the privileged API, e.g. with an in-process implementation.
    pub fn with_privileged_api(mut self, api: Arc<dyn PrivilegedApi>) -> Self {
        self.privileged = Some(api);
        self
    }

    pub fn config(&self) -> &InjectionConfig {
        &self.config
    }

    async fn open_uhid(&self) -> Result<Box<dyn PointerSink>, InjectionError> {
        let channel = uhid::open_channel(&self.config.uhid_path).await?;
        let wait = DeviceWait {
            timeout: self.config.device_wait(),
            poll: self.config.device_poll(),
        };
        let sink = UhidSink::create(
            channel,
            &self.config.device_name,
            Arc::clone(&self.devices),
            wait,
        )
        .await?;
        Ok(Box::new(sink))
    }

    async fn open_event_device(&self) -> Result<Box<dyn PointerSink>, InjectionError> {
        let node = match &self.config.event_node {
            Some(node) => node.clone(),
            None => {
                let devices = list_blocking(&self.devices).await?;
                find_pointer_node(&devices, &self.config.device_name).ok_or_else(|| {
                    InjectionError::Unavailable("no relative pointer event node found".into())
                })?
            }
        };
        debug!(node = %node.display(), "opening event device");
        Ok(Box::new(EventDeviceSink::open(node).await?))
    }
}

#[async_trait]
impl SinkFactory for SystemSinkFactory {
    async fn open(
        &self,
        kind: BackendKind,
        target: TargetId,
    ) -> Result<Box<dyn PointerSink>, InjectionError> {
        match kind {
            BackendKind::VirtualHid => self.open_uhid().await,
            BackendKind::EventDevice => self.open_event_device().await,
            BackendKind::Privileged => {
                let api = self.privileged.clone().ok_or_else(|| {
                    InjectionError::Unavailable("no privileged helper configured".into())
                })?;
                Ok(Box::new(PrivilegedSink::new(api, target, self.config.modes())))
            }
            BackendKind::Shell => Ok(Box::new(ShellSink::new(
                Arc::clone(&self.runner),
                self.config.shell_program.clone(),
                target,
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::infrastructure::devices::{InputDeviceInfo, MockDeviceEnumerator};

    struct NoopRunner;

    #[async_trait]
    impl CommandRunner for NoopRunner {
        async fn run(&self, _program: &str, _args: &[String]) -> Result<(), InjectionError> {
            Ok(())
        }
    }

    fn factory(config: InjectionConfig, devices: Vec<InputDeviceInfo>) -> SystemSinkFactory {
        let mut enumerator = MockDeviceEnumerator::new();
        enumerator
            .expect_list()
            .returning(move || Ok(devices.clone()));
        SystemSinkFactory::new(config, Arc::new(enumerator), Arc::new(NoopRunner))
    }

    #[tokio::test]
    async fn test_privileged_needs_a_helper() {
        let f = factory(InjectionConfig::default(), Vec::new());

        let result = f.open(BackendKind::Privileged, TargetId(0)).await;

        assert!(matches!(result, Err(InjectionError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_helper_socket_enables_privileged() {
        let config = InjectionConfig {
            helper_socket: Some(PathBuf::from("/run/touchpad/helper.sock")),
            ..InjectionConfig::default()
        };
        let f = factory(config, Vec::new());

        let sink = f.open(BackendKind::Privileged, TargetId(3)).await.expect("open");

        assert_eq!(sink.kind(), BackendKind::Privileged);
        assert!(sink.capabilities().supports_absolute_targeting);
    }

    #[tokio::test]
    async fn test_shell_always_opens() {
        let f = factory(InjectionConfig::default(), Vec::new());
        let sink = f.open(BackendKind::Shell, TargetId(0)).await.expect("open");
        assert_eq!(sink.kind(), BackendKind::Shell);
    }

    #[tokio::test]
    async fn test_event_device_without_pointer_is_unavailable() {
        let f = factory(InjectionConfig::default(), Vec::new());

        let result = f.open(BackendKind::EventDevice, TargetId(0)).await;

        assert!(matches!(result, Err(InjectionError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_event_node_override_skips_detection() {
        // Arrange: no pointer is listed, so detection alone would be Unavailable
        let config = InjectionConfig {
            event_node: Some(PathBuf::from("/nonexistent/input/event9")),
            ..InjectionConfig::default()
        };
        let f = factory(config, Vec::new());

        // Act
        let result = f.open(BackendKind::EventDevice, TargetId(0)).await;

        // Assert: the override was opened directly
        assert!(matches!(result, Err(InjectionError::Io(_))));
    }

    #[tokio::test]
    async fn test_blocking_pool_returns_the_channel() {
        // Arrange
        let mut slot = Some(vec![1u8]);

        // Act
        let len = on_blocking_pool(&mut slot, |v: &mut Vec<u8>| {
            v.push(2);
            Ok(v.len())
        })
        .await;

        // Assert
        assert_eq!(len.expect("op"), 2);
        assert_eq!(slot, Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_blocking_pool_on_empty_slot_is_disconnected() {
        let mut slot: Option<Vec<u8>> = None;

        let result = on_blocking_pool(&mut slot, |v: &mut Vec<u8>| Ok(v.len())).await;

        assert!(matches!(result, Err(InjectionError::Disconnected)));
    }

    #[tokio::test]
    async fn test_missing_uhid_device_is_an_io_error() {
        let config = InjectionConfig {
            uhid_path: PathBuf::from("/nonexistent/uhid"),
            ..InjectionConfig::default()
        };
        let f = factory(config, Vec::new());

        let result = f.open(BackendKind::VirtualHid, TargetId(0)).await;

        assert!(matches!(result, Err(InjectionError::Io(_))));
    }
}
