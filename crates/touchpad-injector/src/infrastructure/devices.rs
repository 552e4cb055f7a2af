//! Input device enumeration via `/proc/bus/input/devices`.
//!
//! The virtual-HID backend needs to know when the kernel has finished
//! registering the device it asked for, and the event-device backend needs
//! to find a node that accepts relative pointer events.  Both read the same
//! kernel listing:
//!
//! ```text
//! I: Bus=0006 Vendor=0000 Product=0000 Version=0000
//! N: Name="Touchpad Remote Mouse"
//! H: Handlers=mouse2 event7
//! B: EV=7
//! B: REL=103
//!
//! I: Bus=0019 ...
//! ```
//!
//! Blocks are separated by blank lines; `EV` and `REL` are hex bitmaps.
//!
//! Reading procfs blocks, so async callers go through [`list_blocking`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Bit of `EV_REL` in the `EV` bitmap.
const EV_REL_BIT: u64 = 1 << 2;
/// Bits of `REL_X` and `REL_Y` in the `REL` bitmap.
const REL_XY_BITS: u64 = 0b11;

/// One entry of the kernel input device listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputDeviceInfo {
    pub name: String,
    pub handlers: Vec<String>,
    pub ev_bits: u64,
    pub rel_bits: u64,
}

impl InputDeviceInfo {
    /// `/dev/input/eventN` node of this device, if it has one.
    pub fn event_node(&self) -> Option<PathBuf> {
        self.handlers
            .iter()
            .find(|h| h.starts_with("event"))
            .map(|h| Path::new("/dev/input").join(h))
    }

    /// Reports relative X and Y motion (a mouse or touchpad in relative mode).
    pub fn is_relative_pointer(&self) -> bool {
        self.ev_bits & EV_REL_BIT != 0 && self.rel_bits & REL_XY_BITS == REL_XY_BITS
    }
}

/// Lists the input devices currently registered with the kernel.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceEnumerator: Send + Sync {
    fn list(&self) -> std::io::Result<Vec<InputDeviceInfo>>;
}

/// Reads the listing from procfs.
pub struct ProcInputDevices {
    path: PathBuf,
}

impl ProcInputDevices {
    pub const DEFAULT_PATH: &'static str = "/proc/bus/input/devices";

    pub fn new() -> Self {
        Self::at(Self::DEFAULT_PATH)
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcInputDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceEnumerator for ProcInputDevices {
    fn list(&self) -> std::io::Result<Vec<InputDeviceInfo>> {
        let text = std::fs::read_to_string(&self.path)?;
        Ok(parse_devices(&text))
    }
}

/// Runs [`DeviceEnumerator::list`] on tokio's blocking pool.
pub async fn list_blocking(
    devices: &Arc<dyn DeviceEnumerator>,
) -> std::io::Result<Vec<InputDeviceInfo>> {
    let devices = Arc::clone(devices);
    tokio::task::spawn_blocking(move || devices.list())
        .await
        .map_err(std::io::Error::other)?
}

/// Parses the text of `/proc/bus/input/devices`.
pub fn parse_devices(text: &str) -> Vec<InputDeviceInfo> {
    let mut devices = Vec::new();
    let mut current: Option<InputDeviceInfo> = None;

    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            devices.extend(current.take());
            continue;
        }
        let entry = current.get_or_insert_with(InputDeviceInfo::default);

        if let Some(rest) = line.strip_prefix("N: Name=") {
            entry.name = rest.trim_matches('"').to_string();
        } else if let Some(rest) = line.strip_prefix("H: Handlers=") {
            entry.handlers = rest.split_whitespace().map(str::to_string).collect();
        } else if let Some(rest) = line.strip_prefix("B: EV=") {
            entry.ev_bits = parse_bitmap(rest);
        } else if let Some(rest) = line.strip_prefix("B: REL=") {
            entry.rel_bits = parse_bitmap(rest);
        }
    }
    devices.extend(current);
    devices
}

/// Low word of a space-separated hex bitmap (highest word first).
fn parse_bitmap(text: &str) -> u64 {
    text.split_whitespace()
        .last()
        .and_then(|word| u64::from_str_radix(word, 16).ok())
        .unwrap_or(0)
}

/// Number of registered devices named exactly `name`.
pub fn count_named(devices: &[InputDeviceInfo], name: &str) -> usize {
    devices.iter().filter(|d| d.name == name).count()
}

/// First relative pointer with an event node, skipping devices named `exclude`.
pub fn find_pointer_node(devices: &[InputDeviceInfo], exclude: &str) -> Option<PathBuf> {
    devices
        .iter()
        .filter(|d| d.name != exclude && d.is_relative_pointer())
        .find_map(InputDeviceInfo::event_node)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"I: Bus=0019 Vendor=0000 Product=0001 Version=0000
N: Name="Power Button"
P: Phys=LNXPWRBN/button/input0
H: Handlers=kbd event0
B: PROP=0
B: EV=3
B: KEY=10000000000000 0

I: Bus=0003 Vendor=046d Product=c077 Version=0111
N: Name="Logitech USB Optical Mouse"
H: Handlers=mouse0 event5
B: PROP=0
B: EV=17
B: KEY=ff0000 0 0 0 0
B: REL=903

I: Bus=0006 Vendor=0000 Product=0000 Version=0000
N: Name="Touchpad Remote Mouse"
H: Handlers=mouse1 event9
B: EV=7
B: REL=103
"#;

    #[test]
    fn test_parse_devices_reads_every_block() {
        let devices = parse_devices(LISTING);

        assert_eq!(devices.len(), 3);
        assert_eq!(devices[1].name, "Logitech USB Optical Mouse");
        assert_eq!(devices[1].handlers, vec!["mouse0", "event5"]);
        assert_eq!(devices[1].ev_bits, 0x17);
        assert_eq!(devices[1].rel_bits, 0x903);
    }

    #[test]
    fn test_relative_pointer_detection() {
        let devices = parse_devices(LISTING);
        assert!(!devices[0].is_relative_pointer());
        assert!(devices[1].is_relative_pointer());
    }

    #[test]
    fn test_find_pointer_node_skips_own_device() {
        let devices = parse_devices(LISTING);

        let node = find_pointer_node(&devices, "Logitech USB Optical Mouse");

        assert_eq!(node, Some(PathBuf::from("/dev/input/event9")));
        assert_eq!(
            find_pointer_node(&devices, "Touchpad Remote Mouse"),
            Some(PathBuf::from("/dev/input/event5"))
        );
    }

    #[test]
    fn test_count_named() {
        let devices = parse_devices(LISTING);
        assert_eq!(count_named(&devices, "Touchpad Remote Mouse"), 1);
        assert_eq!(count_named(&devices, "Touchpad"), 0);
    }

    #[test]
    fn test_empty_listing() {
        assert!(parse_devices("").is_empty());
        assert_eq!(find_pointer_node(&[], "x"), None);
    }

    #[tokio::test]
    async fn test_list_blocking_reads_listing_off_the_runtime() {
        // Arrange
        let path = std::env::temp_dir().join(format!("touchpad_devices_{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, LISTING).expect("write listing");
        let devices: Arc<dyn DeviceEnumerator> = Arc::new(ProcInputDevices::at(&path));

        // Act
        let listed = list_blocking(&devices).await.expect("list");

        // Assert
        assert_eq!(listed, parse_devices(LISTING));
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_list_blocking_passes_errors_through() {
        let devices: Arc<dyn DeviceEnumerator> =
            Arc::new(ProcInputDevices::at("/nonexistent/input/devices"));

        let result = list_blocking(&devices).await;

        assert_eq!(result.map_err(|e| e.kind()), Err(std::io::ErrorKind::NotFound));
    }
}
