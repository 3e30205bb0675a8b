//! Request/response channel to the controller's CI port.
//!
//! A request is one length-delimited `CiInput`; the controller answers with
//! one or more length-delimited `CiOutput` frames. When a reply cannot be
//! parsed the same request is sent again, up to an optional attempt limit.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use gc_proto::ssl_gc::{CiInput, CiOutput};
use gc_proto::{decode_frames, encode_frame, DecodeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CiError {
    #[error("CI socket error: {0}")]
    Io(#[from] io::Error),
    #[error("controller reply is not a CiOutput: {0}")]
    Parse(#[source] DecodeError),
    #[error("controller closed the CI connection")]
    Closed,
    #[error("no parseable controller reply after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last_error: DecodeError,
    },
    #[error("CI channel is not connected")]
    NotConnected,
}

/// Byte-level link to the controller. Split out so the retry policy can be
/// exercised without a socket.
pub trait CiLink {
    fn send_input(&mut self, input: &CiInput) -> Result<(), CiError>;

    /// Block until at least one reply frame is available. Returns
    /// [`CiError::Parse`] when the reply is malformed.
    fn receive_outputs(&mut self) -> Result<Vec<CiOutput>, CiError>;
}

#[derive(Debug)]
pub struct TcpCiLink {
    stream: TcpStream,
    pending: Vec<u8>,
    chunk: Vec<u8>,
}

impl TcpCiLink {
    pub fn connect(
        addr: SocketAddr,
        receive_buffer_size: usize,
        read_timeout: Option<Duration>,
    ) -> Result<Self, CiError> {
        let stream = TcpStream::connect(addr)?;
        if let Err(err) = stream.set_nodelay(true) {
            tracing::warn!(target: "gc_bridge::ci", %addr, error = %err, "ci.nodelay_failed");
        }
        stream.set_read_timeout(read_timeout)?;
        tracing::info!(target: "gc_bridge::ci", %addr, "ci.connected");
        Ok(Self {
            stream,
            pending: Vec::new(),
            chunk: vec![0; receive_buffer_size.max(1)],
        })
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }
}

impl CiLink for TcpCiLink {
    fn send_input(&mut self, input: &CiInput) -> Result<(), CiError> {
        self.pending.clear();
        self.stream.write_all(&encode_frame(input))?;
        Ok(())
    }

    fn receive_outputs(&mut self) -> Result<Vec<CiOutput>, CiError> {
        loop {
            let read = self.stream.read(&mut self.chunk)?;
            if read == 0 {
                return Err(CiError::Closed);
            }
            self.pending.extend_from_slice(&self.chunk[..read]);

            match decode_frames::<CiOutput>(&self.pending) {
                Ok(frames) if !frames.messages.is_empty() => {
                    self.pending.drain(..frames.consumed);
                    return Ok(frames.messages);
                }
                Ok(_) => continue,
                Err(err) => {
                    self.pending.clear();
                    return Err(CiError::Parse(err));
                }
            }
        }
    }
}

/// Sends CI requests and retries on unparseable replies.
#[derive(Debug)]
pub struct CiTransport<L = TcpCiLink> {
    link: L,
    max_attempts: Option<u32>,
    retries: u64,
}

impl<L: CiLink> CiTransport<L> {
    /// `max_attempts` of `None` keeps retrying until a reply parses.
    pub fn new(link: L, max_attempts: Option<u32>) -> Self {
        Self {
            link,
            max_attempts,
            retries: 0,
        }
    }

    /// Number of re-sends caused by malformed replies over this transport's
    /// lifetime.
    pub fn retries(&self) -> u64 {
        self.retries
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn send(&mut self, input: &CiInput) -> Result<Vec<CiOutput>, CiError> {
        let mut attempts = 0u32;
        loop {
            attempts = attempts.saturating_add(1);
            self.link.send_input(input)?;
            match self.link.receive_outputs() {
                Ok(outputs) => {
                    tracing::trace!(
                        target: "gc_bridge::ci",
                        inputs = input.api_inputs.len(),
                        outputs = outputs.len(),
                        attempts,
                        "ci.reply"
                    );
                    return Ok(outputs);
                }
                Err(CiError::Parse(err)) => {
                    tracing::info!(
                        target: "gc_bridge::ci",
                        attempts,
                        error = %err,
                        "ci.retry=parse_error"
                    );
                    if self.max_attempts.is_some_and(|max| attempts >= max) {
                        return Err(CiError::RetriesExhausted {
                            attempts,
                            last_error: err,
                        });
                    }
                    self.retries += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }
}
