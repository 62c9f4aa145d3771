use std::fmt;

use thiserror::Error;

use crate::board;

/// `AA BB CC | command | length (u16, big-endian) | payload | xor`.
pub const OVERHEAD: usize = board::PREAMBLE.len() + 1 + 2 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    SetAddress,
    EraseSlot,
    WriteData,
    Read,
    StartConfig,
}

impl Command {
    pub fn code(self) -> u8 {
        match self {
            Command::SetAddress => 0x10,
            Command::EraseSlot => 0x22,
            Command::WriteData => 0x30,
            Command::Read => 0x40,
            Command::StartConfig => 0x50,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x10 => Some(Command::SetAddress),
            0x22 => Some(Command::EraseSlot),
            0x30 => Some(Command::WriteData),
            0x40 => Some(Command::Read),
            0x50 => Some(Command::StartConfig),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::SetAddress => "set_address",
            Command::EraseSlot => "erase_slot",
            Command::WriteData => "write_data",
            Command::Read => "read",
            Command::StartConfig => "start_config",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.code())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("payload length {0} out of range (expected 1..={})", board::PAGE_SIZE)]
    PayloadLength(usize),

    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    #[error("bad preamble: {0:02X?}")]
    BadPreamble([u8; 3]),

    #[error("unknown command 0x{0:02X}")]
    UnknownCommand(u8),

    #[error("declared length {declared} does not match payload length {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("checksum mismatch: got 0x{got:02X}, expected 0x{expected:02X}")]
    Checksum { got: u8, expected: u8 },

    #[error("bad header length: {0} bytes")]
    HeaderLength(usize),

    #[error("bad readback trailer 0x{0:02X}")]
    ReadbackTrailer(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub payload: Vec<u8>,
}

/// XOR of every byte; the frame checksum.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

pub fn encode(command: Command, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.is_empty() || payload.len() > board::PAGE_SIZE {
        return Err(FrameError::PayloadLength(payload.len()));
    }

    let mut out = Vec::with_capacity(OVERHEAD + payload.len());
    out.extend_from_slice(&board::PREAMBLE);
    out.push(command.code());
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out.push(checksum(&out));
    Ok(out)
}

impl Frame {
    pub fn new(command: Command, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            command,
            payload: payload.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        encode(self.command, &self.payload)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        Self::decode_inner(bytes, true)
    }

    /// Like [`Frame::decode`] but without comparing the trailing checksum.
    pub fn decode_unchecked(bytes: &[u8]) -> Result<Self, FrameError> {
        Self::decode_inner(bytes, false)
    }

    fn decode_inner(bytes: &[u8], validate: bool) -> Result<Self, FrameError> {
        if bytes.len() < OVERHEAD {
            return Err(FrameError::TooShort(bytes.len()));
        }

        let preamble = [bytes[0], bytes[1], bytes[2]];
        if preamble != board::PREAMBLE {
            return Err(FrameError::BadPreamble(preamble));
        }

        let command = Command::from_code(bytes[3]).ok_or(FrameError::UnknownCommand(bytes[3]))?;
        let declared = u16::from_be_bytes([bytes[4], bytes[5]]) as usize;
        let (body, trailer) = bytes.split_at(bytes.len() - 1);
        let payload = &body[6..];
        if declared == 0 || declared > board::PAGE_SIZE {
            return Err(FrameError::PayloadLength(declared));
        }
        if declared != payload.len() {
            return Err(FrameError::LengthMismatch {
                declared,
                actual: payload.len(),
            });
        }

        if validate {
            let expected = checksum(body);
            if trailer[0] != expected {
                return Err(FrameError::Checksum {
                    got: trailer[0],
                    expected,
                });
            }
        }

        Ok(Self::new(command, payload))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} len={}", self.command, self.payload.len())
    }
}

pub fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        s.push_str(&format!("{b:02X}"));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_erase_matches_reference_bytes() {
        let bytes = encode(Command::EraseSlot, &[2]).unwrap();
        assert_eq!(&bytes[..7], &[0xAA, 0xBB, 0xCC, 0x22, 0x00, 0x01, 0x02]);
        assert_eq!(bytes[7], 0xAA ^ 0xBB ^ 0xCC ^ 0x22 ^ 0x01 ^ 0x02);
    }

    #[test]
    fn encode_full_page_uses_two_byte_length() {
        let page = vec![0x5Au8; board::PAGE_SIZE];
        let bytes = encode(Command::WriteData, &page).unwrap();
        assert_eq!(bytes.len(), OVERHEAD + board::PAGE_SIZE);
        assert_eq!(&bytes[4..6], &[0x01, 0x00]);
    }

    #[test]
    fn checksum_is_xor_of_all_preceding_bytes() {
        for len in [1usize, 4, 64, 90, 255, 256] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
            let bytes = encode(Command::WriteData, &payload).unwrap();
            let (body, last) = bytes.split_at(bytes.len() - 1);
            assert_eq!(last[0], body.iter().fold(0, |a, b| a ^ b));

            let frame = Frame::decode(&bytes).unwrap();
            assert_eq!(frame.command, Command::WriteData);
            assert_eq!(frame.payload, payload);
        }
    }

    #[test]
    fn encode_rejects_empty_and_oversized_payloads() {
        assert_eq!(
            encode(Command::WriteData, &[]),
            Err(FrameError::PayloadLength(0))
        );
        assert_eq!(
            encode(Command::WriteData, &[0u8; 257]),
            Err(FrameError::PayloadLength(257))
        );
    }

    #[test]
    fn decode_rejects_bad_preamble() {
        let mut bytes = encode(Command::StartConfig, &[1]).unwrap();
        bytes[1] = 0x00;
        assert!(matches!(
            Frame::decode(&bytes),
            Err(FrameError::BadPreamble(_))
        ));
    }

    #[test]
    fn decode_checks_checksum_only_when_validating() {
        let mut bytes = encode(Command::SetAddress, &[0, 0x0C, 0, 0]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        assert!(matches!(
            Frame::decode(&bytes),
            Err(FrameError::Checksum { .. })
        ));
        let frame = Frame::decode_unchecked(&bytes).unwrap();
        assert_eq!(frame.payload, vec![0, 0x0C, 0, 0]);
    }

    #[test]
    fn decode_rejects_payload_length_out_of_range() {
        let empty = [0xAA, 0xBB, 0xCC, 0x30, 0x00, 0x00];
        let mut bytes = empty.to_vec();
        bytes.push(checksum(&empty));
        assert_eq!(Frame::decode(&bytes), Err(FrameError::PayloadLength(0)));

        let mut bytes = vec![0xAA, 0xBB, 0xCC, 0x30, 0x01, 0x01];
        bytes.extend(std::iter::repeat(0u8).take(257));
        bytes.push(checksum(&bytes));
        assert_eq!(Frame::decode(&bytes), Err(FrameError::PayloadLength(257)));
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        let mut bytes = encode(Command::WriteData, &[1, 2, 3]).unwrap();
        bytes[5] = 4;
        assert_eq!(
            Frame::decode_unchecked(&bytes),
            Err(FrameError::LengthMismatch {
                declared: 4,
                actual: 3
            })
        );
    }
}
