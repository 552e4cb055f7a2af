//! HID report descriptor of the virtual mouse.
//!
//! # What is a report descriptor? (for beginners)
//!
//! A HID device does not tell the kernel "I am a mouse" in plain words.  It
//! hands over a small byte program (the *report descriptor*) made of short
//! items.  Each item is a one-byte prefix followed by 0, 1, 2 or 4 data bytes:
//!
//! ```text
//! prefix = tag(4 bits) | type(2 bits) | size(2 bits)
//!          type 0 = Main   (Input, Output, Collection, ...)
//!          type 1 = Global (Usage Page, Logical Min/Max, Report Size/Count)
//!          type 2 = Local  (Usage, Usage Min/Max)
//! ```
//!
//! The kernel walks the items to learn the exact bit layout of every input
//! report.  If the bytes we later send in INPUT records do not match that
//! layout, the kernel silently misreads them, so this descriptor and
//! [`super::report::HidReport::to_bytes`] must always describe the same
//! 4-byte shape.

/// Generic Desktop / Mouse: 3 buttons + 5 bits padding, then signed 8-bit
/// relative X, Y and Wheel in `[-127, 127]`.
pub const MOUSE_REPORT_DESCRIPTOR: [u8; 52] = [
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x02, // Usage (Mouse)
    0xA1, 0x01, // Collection (Application)
    0x09, 0x01, //   Usage (Pointer)
    0xA1, 0x00, //   Collection (Physical)
    0x05, 0x09, //     Usage Page (Button)
    0x19, 0x01, //     Usage Minimum (1)
    0x29, 0x03, //     Usage Maximum (3)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x95, 0x03, //     Report Count (3)
    0x75, 0x01, //     Report Size (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x05, //     Report Size (5)
    0x81, 0x03, //     Input (Constant) -- padding
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x30, //     Usage (X)
    0x09, 0x31, //     Usage (Y)
    0x09, 0x38, //     Usage (Wheel)
    0x15, 0x81, //     Logical Minimum (-127)
    0x25, 0x7F, //     Logical Maximum (127)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x03, //     Report Count (3)
    0x81, 0x06, //     Input (Data, Variable, Relative)
    0xC0, //   End Collection
    0xC0, // End Collection
];

const ITEM_TYPE_MAIN: u8 = 0;
const ITEM_TYPE_GLOBAL: u8 = 1;
const TAG_INPUT: u8 = 0x8;
const TAG_REPORT_SIZE: u8 = 0x7;
const TAG_REPORT_COUNT: u8 = 0x9;
const TAG_REPORT_ID: u8 = 0x8;
const LONG_ITEM_PREFIX: u8 = 0xFE;

/// Walks a report descriptor and returns the total number of bits in its
/// input report, or `None` if the descriptor is truncated, uses long items,
/// or declares report IDs (none of which the virtual mouse needs).
pub fn input_report_bits(descriptor: &[u8]) -> Option<u32> {
    let mut report_size = 0u32;
    let mut report_count = 0u32;
    let mut bits = 0u32;
    let mut i = 0;

    while i < descriptor.len() {
        let prefix = descriptor[i];
        if prefix == LONG_ITEM_PREFIX {
            return None;
        }
        let len = match prefix & 0x03 {
            3 => 4,
            n => n as usize,
        };
        let data = descriptor.get(i + 1..i + 1 + len)?;
        let value = data
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
        let item_type = (prefix >> 2) & 0x03;
        let tag = prefix >> 4;

        match (item_type, tag) {
            (ITEM_TYPE_GLOBAL, TAG_REPORT_SIZE) => report_size = value,
            (ITEM_TYPE_GLOBAL, TAG_REPORT_COUNT) => report_count = value,
            (ITEM_TYPE_GLOBAL, TAG_REPORT_ID) => return None,
            (ITEM_TYPE_MAIN, TAG_INPUT) => bits += report_size * report_count,
            _ => {}
        }
        i += 1 + len;
    }
    Some(bits)
}
