//! The 90-byte metadata record stored in the first page of every slot.
//!
//! Layout: size (u32, big-endian), filename (64 bytes, space padded),
//! timestamp (6 bytes: year-2000, month, day, hour, minute, second) and the
//! MD5 digest of the bitfile (16 bytes).

use std::fmt;

use chrono::{DateTime, Datelike, Local, Timelike};
use serde::Serialize;

use crate::frame::FrameError;

pub const SIZE_LEN: usize = 4;
pub const FILENAME_LEN: usize = 64;
pub const TIMESTAMP_LEN: usize = 6;
pub const DIGEST_LEN: usize = 16;
pub const HEADER_LEN: usize = SIZE_LEN + FILENAME_LEN + TIMESTAMP_LEN + DIGEST_LEN;

/// Size field value of an erased slot.
pub const ERASED_SIZE: u32 = 0xFFFF_FFFF;

/// Raw timestamp bytes. No calendar validation; readback may hold anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Timestamp {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    pub fn from_local(t: &DateTime<Local>) -> Self {
        Self {
            year: (t.year() - 2000).clamp(0, 255) as u8,
            month: t.month() as u8,
            day: t.day() as u8,
            hour: t.hour() as u8,
            minute: t.minute() as u8,
            second: t.second() as u8,
        }
    }

    pub fn to_bytes(self) -> [u8; TIMESTAMP_LEN] {
        [
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        ]
    }

    pub fn from_bytes(b: [u8; TIMESTAMP_LEN]) -> Self {
        Self {
            year: b[0],
            month: b[1],
            day: b[2],
            hour: b[3],
            minute: b[4],
            second: b[5],
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}/{:02}/{:02} - {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Left-justify `name` into the 64-byte field. Longer names are cut.
pub fn encode_filename(name: &str) -> [u8; FILENAME_LEN] {
    let mut out = [b' '; FILENAME_LEN];
    let bytes = name.as_bytes();
    let n = bytes.len().min(FILENAME_LEN);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitfileHeader {
    pub size: u32,
    pub filename: [u8; FILENAME_LEN],
    pub timestamp: Timestamp,
    pub digest: [u8; DIGEST_LEN],
}

impl BitfileHeader {
    pub fn new(size: u32, name: &str, timestamp: Timestamp, digest: [u8; DIGEST_LEN]) -> Self {
        Self {
            size,
            filename: encode_filename(name),
            timestamp,
            digest,
        }
    }

    /// The four fields in write order, one DATA sub-frame each.
    pub fn fields(&self) -> [(HeaderField, Vec<u8>); 4] {
        [
            (HeaderField::Size, self.size.to_be_bytes().to_vec()),
            (HeaderField::Filename, self.filename.to_vec()),
            (HeaderField::Timestamp, self.timestamp.to_bytes().to_vec()),
            (HeaderField::Digest, self.digest.to_vec()),
        ]
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        let mut at = 0;
        for (_, bytes) in self.fields() {
            out[at..at + bytes.len()].copy_from_slice(&bytes);
            at += bytes.len();
        }
        out
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.filename)
            .trim_end_matches(' ')
            .to_string()
    }

    pub fn digest_hex(&self) -> String {
        self.digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderField {
    Size,
    Filename,
    Timestamp,
    Digest,
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HeaderField::Size => "size",
            HeaderField::Filename => "filename",
            HeaderField::Timestamp => "timestamp",
            HeaderField::Digest => "digest",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotHeader {
    Empty,
    Stored(BitfileHeader),
}

impl SlotHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != HEADER_LEN {
            return Err(FrameError::HeaderLength(bytes.len()));
        }

        let size = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if size == ERASED_SIZE {
            return Ok(SlotHeader::Empty);
        }

        let mut filename = [0u8; FILENAME_LEN];
        filename.copy_from_slice(&bytes[SIZE_LEN..SIZE_LEN + FILENAME_LEN]);

        let ts_at = SIZE_LEN + FILENAME_LEN;
        let mut ts = [0u8; TIMESTAMP_LEN];
        ts.copy_from_slice(&bytes[ts_at..ts_at + TIMESTAMP_LEN]);

        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&bytes[ts_at + TIMESTAMP_LEN..]);

        Ok(SlotHeader::Stored(BitfileHeader {
            size,
            filename,
            timestamp: Timestamp::from_bytes(ts),
            digest,
        }))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SlotHeader::Empty)
    }
}
