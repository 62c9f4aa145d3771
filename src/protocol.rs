//! Command sequences for the flash slots.
//!
//! Every frame is acknowledged before the next one goes out. The device keeps
//! its own write cursor, advanced by each acknowledged DATA frame, so the
//! order of frames inside an operation is part of the protocol. The first
//! negative or missing acknowledgment aborts the whole operation; there is no
//! retry and no resynchronisation.

use std::fmt;

use md5::{Digest, Md5};
use thiserror::Error;

use crate::bitfile::Bitfile;
use crate::board;
use crate::frame::{self, Command, FrameError};
use crate::header::{HeaderField, SlotHeader, HEADER_LEN};
use crate::operation::OperationEvent;
use crate::slot::{self, Slot, SlotError};
use crate::transport::{Ack, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AddressSet,
    MetadataWritten,
    DataStreaming,
    Done,
    Failed,
}

/// The frame being sent or awaited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Erase { slot: u8 },
    SetAddress { address: u32 },
    Metadata { field: HeaderField },
    Data { index: usize, total: usize },
    StartConfig { slot: u8 },
    ReadHeader { slot: u8 },
    ReadBack { address: u32 },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Erase { slot } => write!(f, "erase slot {slot}"),
            Step::SetAddress { address } => write!(f, "set address 0x{address:08X}"),
            Step::Metadata { field } => write!(f, "write {field} metadata"),
            Step::Data { index, total } => write!(f, "data frame {index}/{total}"),
            Step::StartConfig { slot } => write!(f, "start configuration from slot {slot}"),
            Step::ReadHeader { slot } => write!(f, "read header of slot {slot}"),
            Step::ReadBack { address } => write!(f, "read back 0x{address:08X}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error("{step}: no acknowledgment received")]
    AckTimeout { step: Step },

    #[error("{step}: device answered 0x{byte:02X} ({reason})")]
    AckRejected {
        step: Step,
        byte: u8,
        reason: &'static str,
    },

    #[error("{step}: {source}")]
    Frame {
        step: Step,
        #[source]
        source: FrameError,
    },

    #[error("{step}: {source}")]
    Transport {
        step: Step,
        #[source]
        source: TransportError,
    },

    #[error("session aborted by an earlier failure")]
    SessionFailed,

    #[error("verification of slot {slot} failed: {detail}")]
    VerifyMismatch { slot: u8, detail: String },
}

fn reply_reason(byte: u8) -> &'static str {
    match byte {
        board::NACK => "checksum rejected",
        board::UNKNOWN_COMMAND => "unknown command",
        _ => "unexpected reply",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotReport {
    pub slot: Slot,
    pub header: SlotHeader,
}

/// Exclusive use of a link for one or more complete operations.
pub struct Session<'a, T: Transport + ?Sized> {
    link: &'a mut T,
    state: SessionState,
    validate_readback: bool,
}

impl<'a, T: Transport + ?Sized> Session<'a, T> {
    pub fn new(link: &'a mut T) -> Self {
        Self {
            link,
            state: SessionState::Idle,
            validate_readback: false,
        }
    }

    pub fn with_readback_validation(mut self, validate: bool) -> Self {
        self.validate_readback = validate;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn erase<F>(&mut self, slot: u8, on_event: &mut F) -> Result<(), ProtocolError>
    where
        F: FnMut(OperationEvent),
    {
        self.guarded(|s| {
            let slot = Slot::new(slot)?;
            s.state = SessionState::Idle;
            s.erase_slot(slot, on_event)
        })
    }

    pub fn delete<F>(&mut self, slot: u8, on_event: &mut F) -> Result<(), ProtocolError>
    where
        F: FnMut(OperationEvent),
    {
        self.guarded(|s| {
            let slot = Slot::new(slot)?;
            s.state = SessionState::Idle;
            s.erase_slot(slot, on_event)?;
            s.state = SessionState::Done;
            on_event(OperationEvent::Done);
            Ok(())
        })
    }

    pub fn store<F>(
        &mut self,
        slot: u8,
        bitfile: &Bitfile,
        on_event: &mut F,
    ) -> Result<(), ProtocolError>
    where
        F: FnMut(OperationEvent),
    {
        self.guarded(|s| {
            let slot = Slot::new(slot)?;
            s.state = SessionState::Idle;
            tracing::info!(%slot, name = %bitfile.name, bytes = bitfile.len(), "store bitfile");

            s.erase_slot(slot, on_event)?;

            s.set_address(slot.base_address(), on_event)?;
            s.state = SessionState::AddressSet;

            for (field, bytes) in bitfile.header().fields() {
                on_event(OperationEvent::Metadata { field });
                s.exchange(Step::Metadata { field }, Command::WriteData, &bytes)?;
            }
            s.state = SessionState::MetadataWritten;

            s.set_address(slot.data_address(), on_event)?;
            s.state = SessionState::DataStreaming;

            let total = bitfile.page_count();
            let mut address = slot.data_address();
            for (i, page) in bitfile.data.chunks(board::PAGE_SIZE).enumerate() {
                on_event(OperationEvent::Page {
                    index: i,
                    total,
                    address,
                    len: page.len(),
                });
                s.exchange(
                    Step::Data {
                        index: i + 1,
                        total,
                    },
                    Command::WriteData,
                    page,
                )?;
                address += page.len() as u32;
            }

            s.state = SessionState::Done;
            on_event(OperationEvent::Done);
            Ok(())
        })
    }

    /// Slot range is not checked; the device decides.
    pub fn start_configuration<F>(
        &mut self,
        slot: u8,
        on_event: &mut F,
    ) -> Result<(), ProtocolError>
    where
        F: FnMut(OperationEvent),
    {
        self.guarded(|s| {
            s.state = SessionState::Idle;
            on_event(OperationEvent::Configure { slot });
            s.exchange(Step::StartConfig { slot }, Command::StartConfig, &[slot])?;
            s.state = SessionState::Done;
            on_event(OperationEvent::Done);
            Ok(())
        })
    }

    pub fn read_headers<F>(&mut self, on_event: &mut F) -> Result<Vec<SlotReport>, ProtocolError>
    where
        F: FnMut(OperationEvent),
    {
        self.guarded(|s| {
            s.state = SessionState::Idle;
            let mut out = Vec::with_capacity(board::SLOT_COUNT as usize);
            for slot in Slot::all() {
                let header = s.read_header(slot)?;
                on_event(OperationEvent::Header {
                    slot,
                    header: header.clone(),
                });
                out.push(SlotReport { slot, header });
            }
            s.state = SessionState::Done;
            Ok(out)
        })
    }

    pub fn read_slot_header(&mut self, slot: u8) -> Result<SlotHeader, ProtocolError> {
        self.guarded(|s| {
            let slot = Slot::new(slot)?;
            s.read_header(slot)
        })
    }

    /// Read the slot back and compare header and MD5 with `bitfile`.
    pub fn verify<F>(
        &mut self,
        slot: u8,
        bitfile: &Bitfile,
        on_event: &mut F,
    ) -> Result<(), ProtocolError>
    where
        F: FnMut(OperationEvent),
    {
        self.guarded(|s| {
            let slot = Slot::new(slot)?;
            on_event(OperationEvent::VerifyStart {
                slot: slot.number(),
            });

            let mismatch = |detail: String| ProtocolError::VerifyMismatch {
                slot: slot.number(),
                detail,
            };

            match s.read_header(slot)? {
                SlotHeader::Empty => return Err(mismatch("slot is erased".to_string())),
                SlotHeader::Stored(h) if h != bitfile.header() => {
                    return Err(mismatch(format!(
                        "header differs (stored {} bytes '{}')",
                        h.size,
                        h.name()
                    )));
                }
                SlotHeader::Stored(_) => {}
            }

            let mut hasher = Md5::new();
            let mut offset = 0usize;
            while offset < bitfile.len() {
                let len = (bitfile.len() - offset).min(board::READ_CHUNK);
                let address = slot.data_address() + offset as u32;
                let data = s.read_flash(Step::ReadBack { address }, address, len)?;
                hasher.update(&data);
                offset += len;
            }
            let digest: [u8; 16] = hasher.finalize().into();
            if digest != bitfile.digest {
                return Err(mismatch(format!(
                    "digest {} != {}",
                    hex(&digest),
                    hex(&bitfile.digest)
                )));
            }

            on_event(OperationEvent::Verified {
                slot: slot.number(),
            });
            Ok(())
        })
    }

    fn guarded<R>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<R, ProtocolError>,
    ) -> Result<R, ProtocolError> {
        if self.state == SessionState::Failed {
            return Err(ProtocolError::SessionFailed);
        }
        let r = op(self);
        if let Err(e) = &r {
            tracing::warn!(error = %e, "operation aborted");
            self.state = SessionState::Failed;
        }
        r
    }

    fn erase_slot<F>(&mut self, slot: Slot, on_event: &mut F) -> Result<(), ProtocolError>
    where
        F: FnMut(OperationEvent),
    {
        on_event(OperationEvent::Erase {
            slot: slot.number(),
        });
        self.exchange(
            Step::Erase {
                slot: slot.number(),
            },
            Command::EraseSlot,
            &[slot.number()],
        )
    }

    fn set_address<F>(&mut self, address: u32, on_event: &mut F) -> Result<(), ProtocolError>
    where
        F: FnMut(OperationEvent),
    {
        let address = slot::check_page_aligned(address)?;
        on_event(OperationEvent::AddressSet { address });
        self.exchange(
            Step::SetAddress { address },
            Command::SetAddress,
            &address.to_be_bytes(),
        )
    }

    fn read_header(&mut self, slot: Slot) -> Result<SlotHeader, ProtocolError> {
        let step = Step::ReadHeader {
            slot: slot.number(),
        };
        let data = self.read_flash(step.clone(), slot.base_address(), HEADER_LEN)?;
        SlotHeader::parse(&data).map_err(|source| ProtocolError::Frame { step, source })
    }

    /// READ answers with `len` data bytes and one trailing byte, no ack first.
    fn read_flash(
        &mut self,
        step: Step,
        address: u32,
        len: usize,
    ) -> Result<Vec<u8>, ProtocolError> {
        debug_assert!(len > 0 && len <= u8::MAX as usize);

        let mut payload = address.to_be_bytes().to_vec();
        payload.push(len as u8);
        self.send(&step, Command::Read, &payload)?;

        let mut buf = vec![0u8; len + 1];
        self.link.read_exact(&mut buf).map_err(|e| match e {
            TransportError::Timeout { .. } => ProtocolError::AckTimeout { step: step.clone() },
            source => ProtocolError::Transport {
                step: step.clone(),
                source,
            },
        })?;

        let trailer = buf.pop().unwrap_or_default();
        if self.validate_readback && trailer != board::ACK && trailer != frame::checksum(&buf) {
            return Err(ProtocolError::Frame {
                step,
                source: FrameError::ReadbackTrailer(trailer),
            });
        }
        Ok(buf)
    }

    fn exchange(
        &mut self,
        step: Step,
        command: Command,
        payload: &[u8],
    ) -> Result<(), ProtocolError> {
        self.send(&step, command, payload)?;
        match self
            .link
            .read_ack()
            .map_err(|source| ProtocolError::Transport {
                step: step.clone(),
                source,
            })? {
            Ack::Positive => Ok(()),
            Ack::Rejected(byte) => Err(ProtocolError::AckRejected {
                step,
                byte,
                reason: reply_reason(byte),
            }),
            Ack::Timeout => Err(ProtocolError::AckTimeout { step }),
        }
    }

    fn send(
        &mut self,
        step: &Step,
        command: Command,
        payload: &[u8],
    ) -> Result<(), ProtocolError> {
        let bytes = frame::encode(command, payload).map_err(|source| ProtocolError::Frame {
            step: step.clone(),
            source,
        })?;
        tracing::debug!(%step, command = command.name(), len = payload.len(), "send frame");
        self.link
            .write_all(&bytes)
            .map_err(|source| ProtocolError::Transport {
                step: step.clone(),
                source,
            })
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
