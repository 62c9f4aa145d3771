use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use thiserror::Error;

use crate::board;
use crate::frame::{self, Frame};

#[derive(Debug, Clone)]
pub struct LinkOptions {
    pub baud_rate: u32,
    /// How long to wait for an ack byte or a readback payload.
    pub timeout: Duration,
    /// Check the trailing byte of READ responses.
    pub validate_readback: bool,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            baud_rate: board::BAUD_RATE,
            timeout: Duration::from_millis(board::READ_TIMEOUT_MS),
            validate_readback: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Positive,
    Rejected(u8),
    Timeout,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("unable to open serial port '{port}': {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("timed out after {got}/{wanted} bytes")]
    Timeout { wanted: usize, got: usize },
}

/// Byte link to the configuration MCU. One frame in flight at a time.
pub trait Transport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Wait for a single response byte.
    fn read_ack(&mut self) -> Result<Ack, TransportError>;

    /// Fill `buf` completely or fail with [`TransportError::Timeout`].
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError>;
}

pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
    timeout: Duration,
}

impl SerialTransport {
    pub fn open(port_name: &str, opts: &LinkOptions) -> Result<Self, TransportError> {
        let port = serialport::new(port_name, opts.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(opts.timeout)
            .open()
            .map_err(|e| TransportError::Open {
                port: port_name.to_string(),
                source: e,
            })?;

        tracing::info!(port = port_name, baud = opts.baud_rate, "serial port open");

        Ok(Self {
            port,
            name: port_name.to_string(),
            timeout: opts.timeout,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        tracing::trace!(port = %self.name, tx = %frame::to_hex(bytes));
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_ack(&mut self) -> Result<Ack, TransportError> {
        let mut b = [0u8; 1];
        match self.port.read(&mut b) {
            Ok(0) => Ok(Ack::Timeout),
            Ok(_) if b[0] == board::ACK => Ok(Ack::Positive),
            Ok(_) => Ok(Ack::Rejected(b[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Ack::Timeout),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        let deadline = Instant::now() + self.timeout;
        let mut got = 0;
        let r = loop {
            if got == buf.len() {
                break Ok(());
            }
            let Some(budget) = remaining(deadline, Instant::now()) else {
                break Err(TransportError::Timeout {
                    wanted: buf.len(),
                    got,
                });
            };
            if let Err(e) = self.port.set_timeout(budget) {
                break Err(TransportError::Io(e.into()));
            }
            match self.port.read(&mut buf[got..]) {
                Ok(n) => got += n,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => break Err(TransportError::Io(e)),
            }
        };

        // read_ack relies on the port timeout being the full link timeout.
        self.port
            .set_timeout(self.timeout)
            .map_err(|e| TransportError::Io(e.into()))?;
        r?;
        tracing::trace!(port = %self.name, rx = %frame::to_hex(buf));
        Ok(())
    }
}

/// Time left before `deadline`, or `None` once it has passed.
fn remaining(deadline: Instant, now: Instant) -> Option<Duration> {
    let left = deadline.saturating_duration_since(now);
    (!left.is_zero()).then_some(left)
}

/// Accepts every frame without a device attached.
///
/// Reads are answered with erased flash followed by an ack byte, so a
/// dry-run store reports the frames it would send and read-back sees an
/// empty slot.
#[derive(Debug, Default)]
pub struct DryRunTransport {
    written: Vec<Vec<u8>>,
}

impl DryRunTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[Vec<u8>] {
        &self.written
    }

    pub fn decoded(&self) -> Vec<Frame> {
        self.written
            .iter()
            .filter_map(|b| Frame::decode(b).ok())
            .collect()
    }
}

impl Transport for DryRunTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.written.push(bytes.to_vec());
        Ok(())
    }

    fn read_ack(&mut self) -> Result<Ack, TransportError> {
        Ok(Ack::Positive)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        if let Some((last, data)) = buf.split_last_mut() {
            data.fill(0xFF);
            *last = board::ACK;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::VecDeque;

    use super::*;

    #[derive(Debug, Clone)]
    pub enum Reply {
        Byte(u8),
        Silence,
        Bytes(Vec<u8>),
    }

    /// Test double: records writes and replays a script of replies.
    /// Once the script runs out every frame is acked.
    #[derive(Debug, Default)]
    pub struct ScriptedTransport {
        pub written: Vec<Vec<u8>>,
        replies: VecDeque<Reply>,
    }

    impl ScriptedTransport {
        pub fn acking() -> Self {
            Self::default()
        }

        pub fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
            Self {
                written: Vec::new(),
                replies: replies.into_iter().collect(),
            }
        }

        pub fn decoded(&self) -> Vec<Frame> {
            self.written
                .iter()
                .map(|b| Frame::decode(b).expect("session wrote a malformed frame"))
                .collect()
        }
    }

    impl Transport for ScriptedTransport {
        fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
            self.written.push(bytes.to_vec());
            Ok(())
        }

        fn read_ack(&mut self) -> Result<Ack, TransportError> {
            match self.replies.pop_front() {
                None => Ok(Ack::Positive),
                Some(Reply::Byte(b)) if b == board::ACK => Ok(Ack::Positive),
                Some(Reply::Byte(b)) => Ok(Ack::Rejected(b)),
                Some(Reply::Silence) => Ok(Ack::Timeout),
                Some(Reply::Bytes(v)) => panic!("ack expected, script has {} bytes", v.len()),
            }
        }

        fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
            match self.replies.pop_front() {
                Some(Reply::Bytes(v)) if v.len() >= buf.len() => {
                    buf.copy_from_slice(&v[..buf.len()]);
                    Ok(())
                }
                Some(Reply::Bytes(v)) => Err(TransportError::Timeout {
                    wanted: buf.len(),
                    got: v.len(),
                }),
                _ => Err(TransportError::Timeout {
                    wanted: buf.len(),
                    got: 0,
                }),
            }
        }
    }
}
