//! Byte-level formats spoken to the kernel input stack.
//!
//! - [`report`]: the 4-byte relative mouse report and motion chunking.
//! - [`descriptor`]: the HID report descriptor that declares that report.
//! - [`uhid`]: CREATE / INPUT / DESTROY records of the virtual-HID channel.

pub mod descriptor;
pub mod report;
pub mod uhid;

pub use descriptor::MOUSE_REPORT_DESCRIPTOR;
pub use report::{chunk_relative, chunk_wheel, Buttons, HidReport, MouseButton};
pub use uhid::{decode_record, encode_record, UhidCreate, UhidError, UhidRecord};
