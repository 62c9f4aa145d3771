use std::path::Path;

use thiserror::Error;

use crate::{
    bitfile::{Bitfile, BitfileError},
    frame::Frame,
    operation::OperationEvent,
    ports::ListPortsError,
    protocol::{ProtocolError, Session, SlotReport},
    slot::{Slot, SlotError},
    transport::{DryRunTransport, LinkOptions, SerialTransport, Transport, TransportError},
};

#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub link: LinkOptions,

    /// Read the slot back after writing and compare it with the file.
    pub verify: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidSlot,
    InvalidBitfile,
    TransportUnavailable,
    AckTimeout,
    AckRejected,
    FrameDecode,
    VerifyFailed,
    SessionAborted,
    Io,
}

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error(transparent)]
    InvalidSlot(#[from] SlotError),

    #[error("invalid bitfile {path}: {source}")]
    InvalidBitfile {
        path: String,
        #[source]
        source: BitfileError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    ListPorts(#[from] ListPortsError),
}

impl LoaderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoaderError::InvalidSlot(_) => ErrorKind::InvalidSlot,
            LoaderError::InvalidBitfile { .. } => ErrorKind::InvalidBitfile,
            LoaderError::Transport(e) => transport_kind(e),
            LoaderError::ListPorts(_) => ErrorKind::TransportUnavailable,
            LoaderError::Protocol(e) => match e {
                ProtocolError::Slot(_) => ErrorKind::InvalidSlot,
                ProtocolError::AckTimeout { .. } => ErrorKind::AckTimeout,
                ProtocolError::AckRejected { .. } => ErrorKind::AckRejected,
                ProtocolError::Frame { .. } => ErrorKind::FrameDecode,
                ProtocolError::Transport { source, .. } => transport_kind(source),
                ProtocolError::SessionFailed => ErrorKind::SessionAborted,
                ProtocolError::VerifyMismatch { .. } => ErrorKind::VerifyFailed,
            },
        }
    }
}

fn transport_kind(e: &TransportError) -> ErrorKind {
    match e {
        TransportError::Open { .. } => ErrorKind::TransportUnavailable,
        TransportError::Timeout { .. } => ErrorKind::AckTimeout,
        TransportError::Io(_) => ErrorKind::Io,
    }
}

#[derive(Debug)]
pub struct StorePlan {
    pub bitfile: Bitfile,
    pub frames: Vec<Frame>,
}

pub fn store<F>(
    port: &str,
    slot: u8,
    path: &Path,
    opts: &StoreOptions,
    mut on_event: F,
) -> Result<(), LoaderError>
where
    F: FnMut(OperationEvent),
{
    Slot::new(slot)?;
    let bitfile = load_bitfile(path, &mut on_event)?;

    let mut link = open_port(port, &opts.link, &mut on_event)?;
    run_store(&mut link, slot, &bitfile, opts, &mut on_event)
}

/// Run the store sequence without a device and return the frames it sends.
pub fn plan_store<F>(slot: u8, path: &Path, mut on_event: F) -> Result<StorePlan, LoaderError>
where
    F: FnMut(OperationEvent),
{
    Slot::new(slot)?;
    let bitfile = load_bitfile(path, &mut on_event)?;

    let mut link = DryRunTransport::new();
    let opts = StoreOptions::default();
    run_store(&mut link, slot, &bitfile, &opts, &mut on_event)?;

    Ok(StorePlan {
        bitfile,
        frames: link.decoded(),
    })
}

pub fn delete<F>(
    port: &str,
    slot: u8,
    link: &LinkOptions,
    mut on_event: F,
) -> Result<(), LoaderError>
where
    F: FnMut(OperationEvent),
{
    Slot::new(slot)?;
    let mut serial = open_port(port, link, &mut on_event)?;
    Session::new(&mut serial).delete(slot, &mut on_event)?;
    Ok(())
}

pub fn configure<F>(
    port: &str,
    slot: u8,
    link: &LinkOptions,
    mut on_event: F,
) -> Result<(), LoaderError>
where
    F: FnMut(OperationEvent),
{
    let mut serial = open_port(port, link, &mut on_event)?;
    Session::new(&mut serial).start_configuration(slot, &mut on_event)?;
    Ok(())
}

pub fn read_headers<F>(
    port: &str,
    link: &LinkOptions,
    mut on_event: F,
) -> Result<Vec<SlotReport>, LoaderError>
where
    F: FnMut(OperationEvent),
{
    let mut serial = open_port(port, link, &mut on_event)?;
    let reports = Session::new(&mut serial)
        .with_readback_validation(link.validate_readback)
        .read_headers(&mut on_event)?;
    Ok(reports)
}

fn load_bitfile<F>(path: &Path, on_event: &mut F) -> Result<Bitfile, LoaderError>
where
    F: FnMut(OperationEvent),
{
    let bitfile = Bitfile::load(path).map_err(|e| LoaderError::InvalidBitfile {
        path: path.display().to_string(),
        source: e,
    })?;

    on_event(OperationEvent::BitfileLoaded {
        name: bitfile.name.clone(),
        bytes: bitfile.len(),
        pages: bitfile.page_count(),
    });
    Ok(bitfile)
}

fn open_port<F>(
    port: &str,
    link: &LinkOptions,
    on_event: &mut F,
) -> Result<SerialTransport, LoaderError>
where
    F: FnMut(OperationEvent),
{
    let t = SerialTransport::open(port, link)?;
    on_event(OperationEvent::PortOpen {
        port: t.name().to_string(),
    });
    Ok(t)
}

fn run_store<T, F>(
    link: &mut T,
    slot: u8,
    bitfile: &Bitfile,
    opts: &StoreOptions,
    on_event: &mut F,
) -> Result<(), LoaderError>
where
    T: Transport + ?Sized,
    F: FnMut(OperationEvent),
{
    let mut session = Session::new(link).with_readback_validation(opts.link.validate_readback);
    session.store(slot, bitfile, on_event)?;
    if opts.verify {
        session.verify(slot, bitfile, on_event)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use tempfile::NamedTempFile;

    use crate::frame::Command;
    use crate::transport::scripted::{Reply, ScriptedTransport};

    fn temp_bitfile(len: usize) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(&vec![0x3Cu8; len]).unwrap();
        f
    }

    #[test]
    fn plan_store_lists_every_frame() {
        let f = temp_bitfile(600);
        let mut events: Vec<OperationEvent> = Vec::new();

        let plan = plan_store(2, f.path(), |e| events.push(e)).unwrap();
        assert_eq!(plan.bitfile.len(), 600);
        assert_eq!(plan.frames.len(), 10);
        assert_eq!(plan.frames[0].command, Command::EraseSlot);
        assert!(matches!(
            events.first(),
            Some(OperationEvent::BitfileLoaded {
                bytes: 600,
                pages: 3,
                ..
            })
        ));
    }

    #[test]
    fn store_rejects_slot_before_touching_file_or_port() {
        let err = store(
            "/dev/does-not-exist",
            0,
            Path::new("/does/not/exist.rbf"),
            &StoreOptions::default(),
            |_| {},
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSlot);

        let err = delete("/dev/does-not-exist", 7, &LinkOptions::default(), |_| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSlot);
    }

    #[test]
    fn missing_port_is_transport_unavailable() {
        let err = delete("/dev/no-such-port", 1, &LinkOptions::default(), |_| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportUnavailable);

        let err = read_headers("/dev/no-such-port", &LinkOptions::default(), |_| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportUnavailable);
    }

    #[test]
    fn aborted_session_has_its_own_kind() {
        let mut link = ScriptedTransport::with_replies([Reply::Byte(crate::board::NACK)]);
        let mut session = Session::new(&mut link);
        assert!(session.delete(1, &mut |_| {}).is_err());

        let err = LoaderError::from(session.delete(1, &mut |_| {}).unwrap_err());
        assert_eq!(err.kind(), ErrorKind::SessionAborted);
    }

    #[test]
    fn missing_bitfile_is_invalid_bitfile() {
        let err = plan_store(1, Path::new("/does/not/exist.rbf"), |_| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidBitfile);
    }

    #[test]
    fn store_with_verify_reads_the_slot_back() {
        let bf = Bitfile::from_parts("v.rbf", vec![7u8; 20], Default::default()).unwrap();
        let mut header = bf.header().to_bytes().to_vec();
        header.push(crate::board::ACK);
        let mut data = bf.data.clone();
        data.push(crate::board::ACK);

        let mut replies = vec![Reply::Byte(crate::board::ACK); 8];
        replies.push(Reply::Bytes(header));
        replies.push(Reply::Bytes(data));
        let mut link = ScriptedTransport::with_replies(replies);

        let opts = StoreOptions {
            verify: true,
            ..Default::default()
        };
        run_store(&mut link, 4, &bf, &opts, &mut |_| {}).unwrap();
        assert_eq!(link.written.len(), 10);
    }

    #[test]
    fn protocol_errors_map_to_kinds() {
        let mut link = ScriptedTransport::with_replies([Reply::Byte(0xDE)]);
        let bf = Bitfile::from_parts("x", vec![1], Default::default()).unwrap();
        let err = run_store(&mut link, 1, &bf, &StoreOptions::default(), &mut |_| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AckRejected);
        assert!(err.to_string().contains("unknown command"));

        let mut link = ScriptedTransport::with_replies([Reply::Silence]);
        let err = run_store(&mut link, 1, &bf, &StoreOptions::default(), &mut |_| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AckTimeout);
    }
}
