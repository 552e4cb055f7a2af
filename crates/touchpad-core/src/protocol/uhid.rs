//! Records of the kernel virtual-HID (`/dev/uhid`) channel.
//!
//! Every record starts with a little-endian `u32` event type, followed by a
//! payload whose shape depends on that type:
//!
//! ```text
//! CREATE2 (11): name[128] phys[64] uniq[64] rd_size:u16 bus:u16
//!               vendor:u32 product:u32 version:u32 country:u32 rd_data[4096]
//! INPUT2  (12): size:u16 data[size]
//! DESTROY  (1): (no payload)
//! ```
//!
//! Strings are NUL-padded and must leave room for a terminating NUL.  All
//! multi-byte integers are little-endian.
//!
//! # Why one write per record? (for beginners)
//!
//! The kernel parses each `write()` on the uhid channel as exactly one event.
//! A record split over two writes is read as two broken events, so callers
//! must hand the whole buffer from [`encode_record`] to a single write call.

use thiserror::Error;

use crate::protocol::descriptor::MOUSE_REPORT_DESCRIPTOR;
use crate::protocol::report::{HidReport, REPORT_SIZE};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Event type of a device-creation record.
pub const UHID_CREATE2: u32 = 11;
/// Event type of an input-report record.
pub const UHID_INPUT2: u32 = 12;
/// Event type of a device-destruction record.
pub const UHID_DESTROY: u32 = 1;

/// Size of the leading event-type tag.
pub const EVENT_TYPE_SIZE: usize = 4;

pub const NAME_SIZE: usize = 128;
pub const PHYS_SIZE: usize = 64;
pub const UNIQ_SIZE: usize = 64;
/// Largest report descriptor the kernel accepts (`HID_MAX_DESCRIPTOR_SIZE`).
pub const MAX_DESCRIPTOR_SIZE: usize = 4096;

/// Size of the CREATE2 payload (everything after the tag).
pub const CREATE_PAYLOAD_SIZE: usize =
    NAME_SIZE + PHYS_SIZE + UNIQ_SIZE + 2 + 2 + 4 + 4 + 4 + 4 + MAX_DESCRIPTOR_SIZE;

/// Size of an encoded INPUT2 record carrying one mouse report.
pub const INPUT_RECORD_SIZE: usize = EVENT_TYPE_SIZE + 2 + REPORT_SIZE;

/// `BUS_VIRTUAL` from `linux/input.h`.
pub const BUS_VIRTUAL: u16 = 0x06;

// ── Types ─────────────────────────────────────────────────────────────────────

/// Errors that can occur while encoding or decoding uhid records.
#[derive(Debug, Error, PartialEq)]
pub enum UhidError {
    /// The byte slice is shorter than the record it claims to hold.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The leading tag is not one of the record types this crate speaks.
    #[error("unknown uhid event type: {0}")]
    UnknownEventType(u32),

    /// A string field does not fit its fixed-size, NUL-terminated slot.
    #[error("field `{field}` is {len} bytes; at most {max} fit")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// The report descriptor exceeds [`MAX_DESCRIPTOR_SIZE`].
    #[error("report descriptor is {0} bytes; at most 4096 fit")]
    DescriptorTooLarge(usize),

    /// An INPUT2 record does not carry exactly one mouse report.
    #[error("input report size {0} does not match the 4-byte mouse report")]
    ReportSizeMismatch(u16),

    /// A field held bytes that cannot be represented (interior NUL, bad UTF-8).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Parameters of a UHID_CREATE2 record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UhidCreate {
    pub name: String,
    pub phys: String,
    pub uniq: String,
    pub bus: u16,
    pub vendor: u32,
    pub product: u32,
    pub version: u32,
    pub country: u32,
    pub descriptor: Vec<u8>,
}

impl UhidCreate {
    /// A virtual three-button wheel mouse named `name`.
    pub fn virtual_mouse(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phys: String::new(),
            uniq: String::new(),
            bus: BUS_VIRTUAL,
            vendor: 0,
            product: 0,
            version: 0,
            country: 0,
            descriptor: MOUSE_REPORT_DESCRIPTOR.to_vec(),
        }
    }
}

/// One record on the uhid channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UhidRecord {
    Create(UhidCreate),
    Input(HidReport),
    Destroy,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `record` into the exact byte sequence to write to the channel.
///
/// # Errors
///
/// Returns [`UhidError`] if a string field or the descriptor does not fit its
/// fixed-size slot.
///
/// # Examples
///
/// ```rust
/// use touchpad_core::protocol::uhid::{encode_record, UhidRecord};
///
/// let bytes = encode_record(&UhidRecord::Destroy).unwrap();
/// assert_eq!(bytes, vec![1, 0, 0, 0]);
/// ```
pub fn encode_record(record: &UhidRecord) -> Result<Vec<u8>, UhidError> {
    match record {
        UhidRecord::Create(create) => encode_create(create),
        UhidRecord::Input(report) => {
            let mut buf = Vec::with_capacity(INPUT_RECORD_SIZE);
            buf.extend_from_slice(&UHID_INPUT2.to_le_bytes());
            buf.extend_from_slice(&(REPORT_SIZE as u16).to_le_bytes());
            buf.extend_from_slice(&report.to_bytes());
            Ok(buf)
        }
        UhidRecord::Destroy => Ok(UHID_DESTROY.to_le_bytes().to_vec()),
    }
}

/// Decodes one record from the front of `bytes`.
///
/// Returns the record and the number of bytes it occupied.
///
/// # Errors
///
/// Returns [`UhidError`] if the data is truncated, the tag is unknown, or a
/// field holds a value no encoder would produce.
pub fn decode_record(bytes: &[u8]) -> Result<(UhidRecord, usize), UhidError> {
    let tag = read_u32(bytes, 0)?;
    let payload = &bytes[EVENT_TYPE_SIZE..];

    match tag {
        UHID_CREATE2 => {
            let create = decode_create(payload)?;
            Ok((UhidRecord::Create(create), EVENT_TYPE_SIZE + CREATE_PAYLOAD_SIZE))
        }
        UHID_INPUT2 => {
            let size = read_u16(payload, 0)?;
            if usize::from(size) != REPORT_SIZE {
                return Err(UhidError::ReportSizeMismatch(size));
            }
            let data = take(payload, 2, REPORT_SIZE)?;
            let mut report = [0u8; REPORT_SIZE];
            report.copy_from_slice(data);
            Ok((UhidRecord::Input(HidReport::from_bytes(report)), INPUT_RECORD_SIZE))
        }
        UHID_DESTROY => Ok((UhidRecord::Destroy, EVENT_TYPE_SIZE)),
        other => Err(UhidError::UnknownEventType(other)),
    }
}

// ── Create record ─────────────────────────────────────────────────────────────

fn encode_create(create: &UhidCreate) -> Result<Vec<u8>, UhidError> {
    if create.descriptor.len() > MAX_DESCRIPTOR_SIZE {
        return Err(UhidError::DescriptorTooLarge(create.descriptor.len()));
    }

    let mut buf = Vec::with_capacity(EVENT_TYPE_SIZE + CREATE_PAYLOAD_SIZE);
    buf.extend_from_slice(&UHID_CREATE2.to_le_bytes());
    put_padded_str(&mut buf, "name", &create.name, NAME_SIZE)?;
    put_padded_str(&mut buf, "phys", &create.phys, PHYS_SIZE)?;
    put_padded_str(&mut buf, "uniq", &create.uniq, UNIQ_SIZE)?;
    buf.extend_from_slice(&(create.descriptor.len() as u16).to_le_bytes());
    buf.extend_from_slice(&create.bus.to_le_bytes());
    buf.extend_from_slice(&create.vendor.to_le_bytes());
    buf.extend_from_slice(&create.product.to_le_bytes());
    buf.extend_from_slice(&create.version.to_le_bytes());
    buf.extend_from_slice(&create.country.to_le_bytes());
    buf.extend_from_slice(&create.descriptor);
    buf.resize(EVENT_TYPE_SIZE + CREATE_PAYLOAD_SIZE, 0);
    Ok(buf)
}

fn decode_create(payload: &[u8]) -> Result<UhidCreate, UhidError> {
    if payload.len() < CREATE_PAYLOAD_SIZE {
        return Err(UhidError::InsufficientData {
            needed: EVENT_TYPE_SIZE + CREATE_PAYLOAD_SIZE,
            available: EVENT_TYPE_SIZE + payload.len(),
        });
    }

    let mut offset = 0;
    let name = get_padded_str(payload, &mut offset, NAME_SIZE)?;
    let phys = get_padded_str(payload, &mut offset, PHYS_SIZE)?;
    let uniq = get_padded_str(payload, &mut offset, UNIQ_SIZE)?;
    let rd_size = usize::from(read_u16(payload, offset)?);
    let bus = read_u16(payload, offset + 2)?;
    let vendor = read_u32(payload, offset + 4)?;
    let product = read_u32(payload, offset + 8)?;
    let version = read_u32(payload, offset + 12)?;
    let country = read_u32(payload, offset + 16)?;
    offset += 20;

    if rd_size > MAX_DESCRIPTOR_SIZE {
        return Err(UhidError::DescriptorTooLarge(rd_size));
    }
    let descriptor = take(payload, offset, rd_size)?.to_vec();

    Ok(UhidCreate {
        name,
        phys,
        uniq,
        bus,
        vendor,
        product,
        version,
        country,
        descriptor,
    })
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn put_padded_str(
    buf: &mut Vec<u8>,
    field: &'static str,
    value: &str,
    slot: usize,
) -> Result<(), UhidError> {
    let bytes = value.as_bytes();
    if bytes.len() >= slot {
        return Err(UhidError::FieldTooLong {
            field,
            len: bytes.len(),
            max: slot - 1,
        });
    }
    if bytes.contains(&0) {
        return Err(UhidError::MalformedPayload(format!(
            "field `{field}` contains a NUL byte"
        )));
    }
    buf.extend_from_slice(bytes);
    buf.resize(buf.len() + slot - bytes.len(), 0);
    Ok(())
}

fn get_padded_str(payload: &[u8], offset: &mut usize, slot: usize) -> Result<String, UhidError> {
    let raw = take(payload, *offset, slot)?;
    *offset += slot;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8(raw[..end].to_vec())
        .map_err(|e| UhidError::MalformedPayload(format!("invalid UTF-8 in string field: {e}")))
}

fn take(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], UhidError> {
    bytes
        .get(offset..offset + len)
        .ok_or(UhidError::InsufficientData {
            needed: offset + len,
            available: bytes.len(),
        })
}

fn read_u16(bytes: &[u8], offset: usize) -> Result<u16, UhidError> {
    let b = take(bytes, offset, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, UhidError> {
    let b = take(bytes, offset, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
