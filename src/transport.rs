//! # Line Transport Layer
//!
//! Blocking, line-oriented transport for instrument serial links. GeoCom
//! and GSI Online are both ASCII request/reply protocols over a serial
//! line: the client writes one terminated line, then reads bytes until the
//! terminator appears. This module owns that exchange discipline and
//! nothing above it; framing the *content* of a line is the protocol
//! layer's job.
//!
//! ## Design
//!
//! [`LineTransport`] is generic over a minimal [`ByteChannel`] trait so
//! unit tests can run against an in-memory mock; [`SerialChannel`] is the
//! production implementation over a blocking serial port. The transport is
//! strictly synchronous and single-threaded: every method takes
//! `&mut self`, so at most one request is in flight at a time by
//! construction.
//!
//! ## Timeout and resynchronization behavior
//!
//! A receive that produces no complete line within the channel timeout
//! returns [`GeoComError::Timeout`] and counts a strike. After
//! [`RESYNC_THRESHOLD`] consecutive strikes the transport assumes the line
//! carries a partial or abandoned reply, flushes the input buffer before
//! the next receive, and starts over. Any successful receive resets the
//! strike counter. [`with_timeout`](LineTransport::with_timeout) runs a
//! closure under a temporary timeout and restores the previous one on
//! every exit path.

use std::io;
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, warn};

use crate::error::{GeoComError, GeoComResult};

/// Consecutive receive timeouts before the input buffer is flushed
pub const RESYNC_THRESHOLD: u32 = 3;

/// Upper bound on a single reply line, terminator included
///
/// GeoCom replies are short; a line this long without a terminator means
/// the link is feeding us garbage.
pub const MAX_REPLY_SIZE: usize = 1024;

/// Default line terminator for both dialects
pub const DEFAULT_TERMINATOR: &str = "\r\n";

/// Format raw bytes as hex string for packet logging
fn format_hex_packet(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Log packet with direction
fn log_packet(direction: &str, data: &[u8]) {
    debug!("[LINE] {} {}", direction, format_hex_packet(data));
}

/// Blocking byte channel abstraction
///
/// The seam between the line transport and the physical link. A channel
/// reads and writes raw bytes with a configurable receive timeout; a read
/// that produces nothing within the timeout must fail with
/// [`io::ErrorKind::TimedOut`] (or `WouldBlock`), which is how serial
/// ports behave.
///
/// [`SerialChannel`] is the shipped implementation; tests substitute
/// scripted in-memory channels.
pub trait ByteChannel {
    /// Read up to `buf.len()` bytes, blocking until at least one byte
    /// arrives or the timeout elapses
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write the entire buffer
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Discard any bytes already buffered on the receive side
    fn clear_input(&mut self) -> io::Result<()>;

    /// Replace the receive timeout
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Current receive timeout
    fn timeout(&self) -> Duration;
}

/// Blocking serial port channel (8N1, no flow control)
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Open a serial port with instrument-standard framing
    ///
    /// # Arguments
    ///
    /// * `path` - Port path, e.g. `/dev/ttyUSB0` or `COM3`
    /// * `baud` - Baud rate (instruments commonly default to 9600)
    /// * `timeout` - Receive timeout applied to every read
    pub fn open(path: &str, baud: u32, timeout: Duration) -> GeoComResult<Self> {
        let port = serialport::new(path, baud)
            .timeout(timeout)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open()?;
        Ok(Self { port })
    }
}

impl ByteChannel for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(io::Error::from)
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port.set_timeout(timeout).map_err(io::Error::from)
    }

    fn timeout(&self) -> Duration {
        self.port.timeout()
    }
}

/// Transport layer statistics
#[derive(Debug, Clone, Default)]
pub struct TransportStats {
    pub lines_sent: u64,
    pub lines_received: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub resyncs: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Line-oriented transport over a byte channel
///
/// Owns the channel for the lifetime of the session. [`close`] drops the
/// channel; it is idempotent, and every operation afterwards returns
/// [`GeoComError::NotOpen`].
///
/// [`close`]: LineTransport::close
pub struct LineTransport<C: ByteChannel> {
    channel: Option<C>,
    terminator: String,
    timeout_strikes: u32,
    stats: TransportStats,
}

impl<C: ByteChannel> LineTransport<C> {
    /// Create a transport over an open channel with the default CRLF
    /// terminator
    pub fn new(channel: C) -> Self {
        Self::with_terminator(channel, DEFAULT_TERMINATOR)
    }

    /// Create a transport with an explicit line terminator
    pub fn with_terminator(channel: C, terminator: &str) -> Self {
        Self {
            channel: Some(channel),
            terminator: terminator.to_string(),
            timeout_strikes: 0,
            stats: TransportStats::default(),
        }
    }

    /// Whether the transport still holds its channel
    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    /// Transport statistics snapshot
    pub fn stats(&self) -> TransportStats {
        self.stats.clone()
    }

    /// The configured line terminator
    pub fn terminator(&self) -> &str {
        &self.terminator
    }

    /// Send one line, appending the terminator when absent
    pub fn send(&mut self, text: &str) -> GeoComResult<()> {
        let mut line = text.to_string();
        if !line.ends_with(&self.terminator) {
            line.push_str(&self.terminator);
        }
        self.send_raw(line.as_bytes())?;
        self.stats.lines_sent += 1;
        Ok(())
    }

    /// Send bytes verbatim, no terminator handling
    ///
    /// Used by the session handshake to emit its single-newline buffer
    /// clear without dressing it up as a protocol line.
    pub fn send_raw(&mut self, data: &[u8]) -> GeoComResult<()> {
        let channel = self.channel.as_mut().ok_or(GeoComError::NotOpen)?;
        match channel.write_all(data) {
            Ok(()) => {
                log_packet("TX", data);
                self.stats.bytes_sent += data.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.stats.errors += 1;
                Err(GeoComError::io(format!("write failed: {}", e)))
            }
        }
    }

    /// Receive one line as text, terminator stripped
    pub fn receive(&mut self) -> GeoComResult<String> {
        let bytes = self.receive_binary()?;
        String::from_utf8(bytes).map_err(|_| GeoComError::frame("reply is not valid UTF-8"))
    }

    /// Receive one line as raw bytes, terminator stripped
    ///
    /// Reads byte-at-a-time until the terminator appears. Runs the resync
    /// check first: at [`RESYNC_THRESHOLD`] accumulated strikes the input
    /// buffer is flushed and the counter reset before any read happens.
    pub fn receive_binary(&mut self) -> GeoComResult<Vec<u8>> {
        if self.timeout_strikes >= RESYNC_THRESHOLD {
            self.resync()?;
        }

        let terminator = self.terminator.clone().into_bytes();
        let channel = self.channel.as_mut().ok_or(GeoComError::NotOpen)?;
        let timeout_ms = channel.timeout().as_millis() as u64;

        let mut line: Vec<u8> = Vec::new();
        let mut buf = [0u8; 1];
        loop {
            match channel.read(&mut buf) {
                Ok(0) => {
                    self.stats.errors += 1;
                    return Err(GeoComError::io("channel closed while receiving"));
                }
                Ok(_) => {
                    line.push(buf[0]);
                    if line.ends_with(&terminator) {
                        line.truncate(line.len() - terminator.len());
                        log_packet("RX", &line);
                        self.timeout_strikes = 0;
                        self.stats.lines_received += 1;
                        self.stats.bytes_received += (line.len() + terminator.len()) as u64;
                        return Ok(line);
                    }
                    if line.len() > MAX_REPLY_SIZE {
                        self.stats.errors += 1;
                        return Err(GeoComError::frame("reply exceeds maximum line size"));
                    }
                }
                Err(e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    self.timeout_strikes += 1;
                    self.stats.timeouts += 1;
                    return Err(GeoComError::timeout("receive", timeout_ms));
                }
                Err(e) => {
                    self.stats.errors += 1;
                    return Err(GeoComError::io(format!("read failed: {}", e)));
                }
            }
        }
    }

    /// Send a line and receive its reply
    pub fn exchange(&mut self, text: &str) -> GeoComResult<String> {
        self.send(text)?;
        self.receive()
    }

    /// Send raw bytes (terminator appended when absent) and receive the
    /// binary reply
    pub fn exchange_binary(&mut self, data: &[u8]) -> GeoComResult<Vec<u8>> {
        let terminator = self.terminator.as_bytes();
        let mut frame = data.to_vec();
        if !frame.ends_with(terminator) {
            frame.extend_from_slice(terminator);
        }
        self.send_raw(&frame)?;
        self.stats.lines_sent += 1;
        self.receive_binary()
    }

    /// Current receive timeout of the underlying channel
    pub fn timeout(&self) -> GeoComResult<Duration> {
        self.channel
            .as_ref()
            .map(|c| c.timeout())
            .ok_or(GeoComError::NotOpen)
    }

    /// Replace the receive timeout, returning the previous one
    pub fn set_timeout(&mut self, timeout: Duration) -> GeoComResult<Duration> {
        let channel = self.channel.as_mut().ok_or(GeoComError::NotOpen)?;
        let previous = channel.timeout();
        channel
            .set_timeout(timeout)
            .map_err(|e| GeoComError::io(format!("set timeout failed: {}", e)))?;
        Ok(previous)
    }

    /// Run a closure under a temporary receive timeout
    ///
    /// The previous timeout is restored after the closure returns,
    /// whether it succeeded or failed.
    pub fn with_timeout<R>(
        &mut self,
        timeout: Duration,
        f: impl FnOnce(&mut Self) -> GeoComResult<R>,
    ) -> GeoComResult<R> {
        let previous = self.set_timeout(timeout)?;

        let result = f(self);

        // The closure may have closed the transport; restoring is then moot.
        if let Some(channel) = self.channel.as_mut() {
            if let Err(e) = channel.set_timeout(previous) {
                warn!("failed to restore receive timeout: {}", e);
            }
        }
        result
    }

    /// Discard buffered input bytes
    pub fn clear_input(&mut self) -> GeoComResult<()> {
        let channel = self.channel.as_mut().ok_or(GeoComError::NotOpen)?;
        channel
            .clear_input()
            .map_err(|e| GeoComError::io(format!("clear input failed: {}", e)))
    }

    /// Flush the input side and reset the strike counter
    fn resync(&mut self) -> GeoComResult<()> {
        warn!(
            "{} consecutive receive timeouts, resynchronizing line",
            self.timeout_strikes
        );
        self.clear_input()?;
        self.timeout_strikes = 0;
        self.stats.resyncs += 1;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn channel_ref(&self) -> Option<&C> {
        self.channel.as_ref()
    }

    /// Close the transport, dropping the channel
    ///
    /// Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.channel.take().is_some() {
            debug!("line transport closed");
        }
    }
}
