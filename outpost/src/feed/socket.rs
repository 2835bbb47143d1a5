//! Line socket
//!
//! Nonblocking TCP stream carrying newline-delimited JSON. Incoming bytes
//! are buffered until a full line is available and then decoded into a
//! `ServerMessage`; outgoing messages that cannot be written in one go are
//! buffered and must be drained before the next send. Also an MIO event
//! source, so the connection core can poll it.

use super::message::{ClientMessage, ServerMessage};
use mio::net::TcpStream;
use std::io::{self, Write};
use std::net::SocketAddr;
use thiserror::Error;

/// Size of the internal buffers. A full message always fits.
const LINEBUF_SIZE: usize = 8192;

/// Possible errors when receiving from a `LineSocket`.
#[derive(Debug, Error)]
pub enum RecvError {
    /// No complete line available at this time.
    #[error("no complete line available")]
    NotReady,
    /// The hub closed the connection.
    #[error("hub closed the connection")]
    Disconnected,
    /// A line arrived that does not decode into a message.
    #[error("undecodable line: {0}")]
    Protocol(#[from] serde_json::Error),
    /// Low level IO error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Possible errors when sending to a `LineSocket`.
#[derive(Debug, Error)]
pub enum SendError {
    /// The message was written partially and `drain()` must succeed
    /// before anything else goes out.
    #[error("partial write pending drain")]
    MustDrain,
    /// The outgoing buffer is full.
    #[error("outgoing buffer full")]
    Full,
    /// Message could not be encoded.
    #[error("message serialization failed")]
    Serialization,
    /// Low level IO error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Cursor buffer used on both directions of the stream. Valid data
/// (possibly none) is in a slice delimited by `start` and `end`.
struct LineBuf {
    buf: [u8; LINEBUF_SIZE],
    start: usize,
    end: usize,
}

impl LineBuf {
    fn new() -> LineBuf {
        LineBuf {
            buf: [0; LINEBUF_SIZE],
            start: 0,
            end: 0,
        }
    }

    fn empty(&self) -> bool {
        self.start == self.end
    }

    fn size(&self) -> usize {
        self.end - self.start
    }

    fn data(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    /// Discards `len` bytes off the beginning of the contained data.
    fn consume(&mut self, len: usize) {
        debug_assert!(len <= self.size());
        self.start += len;
    }

    /// Moves the data internally to the start of the buffer.
    fn compact(&mut self) {
        if self.start != 0 {
            let len = self.size();
            self.buf.copy_within(self.start..self.end, 0);
            self.start = 0;
            self.end = len;
        }
    }

    /// Extracts the next newline-terminated line, without the terminator.
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.data().iter().position(|&b| b == b'\n')?;
        let line = self.data()[..pos].to_vec();
        self.consume(pos + 1);
        Some(line)
    }

    /// Refills the buffer as much as possible from a reader.
    fn refill<T: io::Read>(&mut self, reader: &mut T) -> Result<(), RecvError> {
        self.compact();
        if self.end == LINEBUF_SIZE {
            // A line longer than the buffer. Drop what we have and resync
            // at the next newline; the leftover tail fails to decode and
            // gets skipped as a protocol error.
            self.start = 0;
            self.end = 0;
        }
        match reader.read(&mut self.buf[self.end..]) {
            Ok(0) => Err(RecvError::Disconnected),
            Ok(size) => {
                self.end += size;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(RecvError::NotReady),
            Err(e) => Err(RecvError::Io(e)),
        }
    }

    /// Appends data. Err carries the number of bytes that did fit.
    fn add_data(&mut self, data: &[u8]) -> Result<(), usize> {
        self.compact();
        let copy_size = std::cmp::min(LINEBUF_SIZE - self.end, data.len());
        self.buf[self.end..self.end + copy_size].copy_from_slice(&data[0..copy_size]);
        self.end += copy_size;
        if copy_size == data.len() {
            Ok(())
        } else {
            Err(copy_size)
        }
    }

    /// Writes out as much of the contained data as possible.
    fn drain<T: io::Write>(&mut self, writer: &mut T) -> Result<(), SendError> {
        if self.empty() {
            return Ok(());
        }
        match writer.write(self.data()) {
            Ok(size) => {
                self.consume(size);
                if self.empty() {
                    Ok(())
                } else {
                    Err(SendError::MustDrain)
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(SendError::MustDrain),
            Err(e) => Err(SendError::Io(e)),
        }
    }
}

/// Line-framed JSON socket to the hub.
pub struct LineSocket {
    stream: TcpStream,
    rxbuf: LineBuf,
    txbuf: LineBuf,
}

impl LineSocket {
    /// Starts a nonblocking connection to `address`. The stream is usable
    /// once it signals readiness and `ready()` confirms the handshake.
    pub fn connect(address: &SocketAddr) -> Result<LineSocket, io::Error> {
        let stream = TcpStream::connect(*address)?;
        Ok(LineSocket {
            stream,
            rxbuf: LineBuf::new(),
            txbuf: LineBuf::new(),
        })
    }

    /// Checks whether the nonblocking connect completed. `Ok(false)` while
    /// the handshake is still in flight.
    pub fn ready(&self) -> Result<bool, io::Error> {
        if let Some(err) = self.stream.take_error()? {
            return Err(err);
        }
        match self.stream.peer_addr() {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn recv_buffered(&mut self) -> Result<ServerMessage, RecvError> {
        match self.rxbuf.take_line() {
            Some(line) => Ok(serde_json::from_slice(&line)?),
            None => Err(RecvError::NotReady),
        }
    }

    /// Returns the next message without blocking, or `NotReady` when no
    /// full line is buffered and the stream has nothing more to read.
    pub fn recv(&mut self) -> Result<ServerMessage, RecvError> {
        let mut res = self.recv_buffered();
        if let Err(RecvError::NotReady) = res {
            self.rxbuf.refill(&mut self.stream)?;
            res = self.recv_buffered();
        }
        res
    }

    /// Attempts to send a message as one line.
    pub fn send(&mut self, msg: &ClientMessage) -> Result<(), SendError> {
        if self.has_data_to_drain() {
            return Err(SendError::Full);
        }
        let mut raw = match serde_json::to_vec(msg) {
            Ok(raw) => raw,
            Err(_) => return Err(SendError::Serialization),
        };
        raw.push(b'\n');
        match self.stream.write(&raw) {
            Ok(size) if size == raw.len() => Ok(()),
            Ok(size) => {
                // Partial write, the TCP buffer is full. Buffer the rest to
                // keep line framing intact.
                if self.txbuf.add_data(&raw[size..]).is_err() {
                    return Err(SendError::Full);
                }
                Err(SendError::MustDrain)
            }
            Err(err) => match err.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::NotConnected => {
                    // Can happen right after the nonblocking connect is
                    // initiated and before the handshake completes. Buffer
                    // the whole line.
                    if self.txbuf.add_data(&raw).is_err() {
                        return Err(SendError::Full);
                    }
                    Err(SendError::MustDrain)
                }
                _ => Err(SendError::Io(err)),
            },
        }
    }

    /// Drains a partially written line.
    pub fn drain(&mut self) -> Result<(), SendError> {
        self.txbuf.drain(&mut self.stream)
    }

    pub fn has_data_to_drain(&self) -> bool {
        !self.txbuf.empty()
    }
}

impl mio::event::Source for LineSocket {
    fn register(
        &mut self,
        registry: &mio::Registry,
        token: mio::Token,
        interests: mio::Interest,
    ) -> io::Result<()> {
        self.stream.register(registry, token, interests)
    }

    fn reregister(
        &mut self,
        registry: &mio::Registry,
        token: mio::Token,
        interests: mio::Interest,
    ) -> io::Result<()> {
        self.stream.reregister(registry, token, interests)
    }

    fn deregister(&mut self, registry: &mio::Registry) -> io::Result<()> {
        self.stream.deregister(registry)
    }
}
