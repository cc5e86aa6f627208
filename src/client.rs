//! # Session Clients
//!
//! High-level clients for the two instrument dialects, built on
//! [`LineTransport`]. Both follow the same lifecycle:
//!
//! 1. **Connecting** - a raw newline terminates any partial line a dead
//!    session may have left in the instrument's receive buffer, and stale
//!    input on our side is flushed;
//! 2. **Probing** - the dialect's no-op procedure is issued until it
//!    answers, up to the configured retry count with a delay between
//!    attempts; exhaustion fails construction with
//!    [`GeoComError::Connection`];
//! 3. **Negotiating** (GeoCom only) - the server's floating point
//!    precision is queried, falling back to [`DEFAULT_PRECISION`] when
//!    the instrument does not support the query;
//! 4. **Ready** - requests flow.
//!
//! ## Failure model
//!
//! Once a session is up, instrument-side and transport-side failures are
//! *data*, not errors: every request method returns a response whose
//! status pair records what happened. A timeout is a response carrying
//! `ComTimedOut`, a request after [`close`](GeoComClient::close) carries
//! `ComPortNotOpen`, an unparseable reply carries `ComCantDecode`. The
//! only `Result`s left on the request path are value construction
//! failures, which happen before anything is sent.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{GeoComError, GeoComResult};
use crate::gsi::{
    self, GsiComStatus, GsiFormat, GsiMode, GsiResponse, GsiStatus, GsiWord,
};
use crate::protocol::{self, rpc, GeoComCode, GeoComDialect, GeoComResponse};
use crate::transport::{
    ByteChannel, LineTransport, SerialChannel, TransportStats, DEFAULT_TERMINATOR,
};
use crate::value::{FieldKind, Param};

/// Floating point precision assumed when negotiation is unavailable
pub const DEFAULT_PRECISION: usize = 15;

/// Largest negotiated precision the client will honor
///
/// An f64 carries no more than 17 meaningful digits; anything past this
/// bound is a misbehaving instrument, not a request for longer floats.
pub const MAX_PRECISION: usize = 20;

/// GeoCom session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoComConfig {
    /// Serial baud rate
    pub baud: u32,
    /// Receive timeout
    pub timeout: Duration,
    /// Connection probe attempts before giving up
    pub retries: u32,
    /// Delay between probe attempts
    pub retry_delay: Duration,
    /// Protocol dialect of the instrument generation
    pub dialect: GeoComDialect,
    /// Line terminator
    pub terminator: String,
}

impl Default for GeoComConfig {
    fn default() -> Self {
        Self {
            baud: 9600,
            timeout: Duration::from_secs(15),
            retries: 2,
            retry_delay: Duration::from_secs(1),
            dialect: GeoComDialect::default(),
            terminator: DEFAULT_TERMINATOR.to_string(),
        }
    }
}

/// Negotiated per-session state
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Server-side floating point precision in fractional digits
    pub precision: usize,
    /// Client-side transaction counter, wraps
    pub transaction: u16,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            transaction: 0,
        }
    }
}

/// GeoCom RPC client
///
/// # Example
///
/// ```rust,no_run
/// use geocom::{FieldKind, GeoComClient, GeoComConfig};
///
/// fn main() -> geocom::GeoComResult<()> {
///     let mut client = GeoComClient::open_serial("/dev/ttyUSB0", GeoComConfig::default())?;
///
///     // TMC_GetAngle1
///     let resp = client.request(2003, &[0i64.into()], &[FieldKind::Angle, FieldKind::Angle]);
///     if resp.status_ok() {
///         println!("Hz: {}", resp.angle(0)?.to_dms_string());
///     }
///
///     client.close();
///     Ok(())
/// }
/// ```
pub struct GeoComClient<C: ByteChannel> {
    transport: LineTransport<C>,
    config: GeoComConfig,
    session: SessionState,
}

impl GeoComClient<SerialChannel> {
    /// Open a serial port and establish a session over it
    pub fn open_serial(path: &str, config: GeoComConfig) -> GeoComResult<Self> {
        let channel = SerialChannel::open(path, config.baud, config.timeout)?;
        Self::connect(channel, config)
    }
}

impl<C: ByteChannel> GeoComClient<C> {
    /// Establish a session over an already-open channel
    pub fn connect(channel: C, config: GeoComConfig) -> GeoComResult<Self> {
        let transport = LineTransport::with_terminator(channel, &config.terminator);
        let mut client = Self {
            transport,
            config,
            session: SessionState::default(),
        };
        client.handshake()?;
        Ok(client)
    }

    fn handshake(&mut self) -> GeoComResult<()> {
        info!("establishing GeoCom session");
        self.transport.send_raw(b"\n")?;
        self.transport.clear_input()?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let resp = self.request(rpc::COM_NULL_PROC, &[], &[]);
            if resp.status_ok() {
                debug!("connection probe answered on attempt {}", attempt);
                break;
            }
            warn!(
                "connection probe attempt {} failed: {}",
                attempt, resp.com_status
            );
            if attempt >= self.config.retries.max(1) {
                return Err(GeoComError::connection(format!(
                    "instrument did not answer the connection probe after {} attempts",
                    attempt
                )));
            }
            thread::sleep(self.config.retry_delay);
        }

        let resp = self.request(rpc::COM_GET_DOUBLE_PRECISION, &[], &[FieldKind::Int]);
        match resp.int(0) {
            Ok(digits) if resp.status_ok() && (0..=MAX_PRECISION as i64).contains(&digits) => {
                self.session.precision = digits as usize;
            }
            Ok(digits) if resp.status_ok() => {
                // A negative or absurd count would feed straight into
                // float formatting later; refuse it.
                warn!(
                    "implausible negotiated precision {}, assuming {} digits",
                    digits, DEFAULT_PRECISION
                );
                self.session.precision = DEFAULT_PRECISION;
            }
            _ => {
                warn!(
                    "precision query not answered, assuming {} digits",
                    DEFAULT_PRECISION
                );
                self.session.precision = DEFAULT_PRECISION;
            }
        }
        info!("session ready, precision {} digits", self.session.precision);
        Ok(())
    }

    /// Execute one RPC
    ///
    /// `fields` describes the positional layout of a successful reply
    /// body after the return code. Never fails: transport trouble comes
    /// back through the response's status pair.
    pub fn request(&mut self, rpc: u16, params: &[Param], fields: &[FieldKind]) -> GeoComResponse {
        let line = protocol::encode_request(rpc, params, self.session.precision);
        self.session.transaction = self.session.transaction.wrapping_add(1);
        debug!("rpc {} request {:?}", rpc, line);

        match self.transport.exchange(&line) {
            Ok(raw) => {
                let resp = protocol::decode_reply(self.config.dialect, &line, &raw, fields);
                if !resp.status_ok() {
                    warn!(
                        "rpc {} failed: com={} rc={}",
                        rpc, resp.com_status, resp.rpc_status
                    );
                }
                resp
            }
            Err(e) => {
                warn!("rpc {} never completed: {}", rpc, e);
                GeoComResponse::synthetic(line, com_code_for(&e), GeoComCode::Undefined)
            }
        }
    }

    /// Ask the server to switch its floating point precision (RPC 107)
    ///
    /// The session's own precision follows on success.
    pub fn set_double_precision(&mut self, digits: u16) -> GeoComResponse {
        let resp = self.request(rpc::COM_SET_DOUBLE_PRECISION, &[Param::from(digits)], &[]);
        if resp.status_ok() {
            self.session.precision = digits as usize;
        }
        resp
    }

    /// Negotiated floating point precision
    pub fn precision(&self) -> usize {
        self.session.precision
    }

    /// Override the precision without touching the instrument
    pub fn set_precision(&mut self, digits: usize) {
        self.session.precision = digits;
    }

    /// Run a closure under a temporary receive timeout, for procedures
    /// that legitimately take longer than the session default
    pub fn with_timeout<R>(
        &mut self,
        timeout: Duration,
        f: impl FnOnce(&mut Self) -> R,
    ) -> GeoComResult<R> {
        let previous = self.transport.set_timeout(timeout)?;
        let result = f(self);
        if self.transport.is_open() {
            let _ = self.transport.set_timeout(previous);
        }
        Ok(result)
    }

    pub fn stats(&self) -> TransportStats {
        self.transport.stats()
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Close the session; safe to call repeatedly
    pub fn close(&mut self) {
        self.transport.close();
    }
}

fn com_code_for(error: &GeoComError) -> GeoComCode {
    match error {
        GeoComError::Timeout { .. } => GeoComCode::ComTimedOut,
        GeoComError::NotOpen => GeoComCode::ComPortNotOpen,
        GeoComError::Frame { .. } => GeoComCode::ComCantDecode,
        _ => GeoComCode::ComFailed,
    }
}

fn gsi_com_status_for(error: &GeoComError) -> GsiComStatus {
    match error {
        GeoComError::Timeout { .. } => GsiComStatus::Timeout,
        GeoComError::NotOpen => GsiComStatus::NotOpen,
        GeoComError::Frame { .. } => GsiComStatus::CantDecode,
        GeoComError::Io { .. } => GsiComStatus::CantSend,
        _ => GsiComStatus::Failed,
    }
}

/// GSI Online session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GsiOnlineConfig {
    pub baud: u32,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
    /// Word width the instrument is set to
    pub format: GsiFormat,
    /// Configuration word queried as the connection probe; parameter
    /// numbering varies across instrument families, so it is settable
    pub probe_param: u16,
    pub terminator: String,
}

impl Default for GsiOnlineConfig {
    fn default() -> Self {
        Self {
            baud: 9600,
            timeout: Duration::from_secs(15),
            retries: 2,
            retry_delay: Duration::from_secs(1),
            format: GsiFormat::default(),
            probe_param: 137,
            terminator: DEFAULT_TERMINATOR.to_string(),
        }
    }
}

/// Outcome of one framed GSI exchange, before per-verb interpretation
enum GsiOutcome {
    Transport(GsiComStatus),
    Unframed,
    Ack,
    Warning(u16),
    Error(u16),
    Payload(String),
}

/// GSI Online client for digital levels and older total stations
///
/// The verb set maps one-to-one onto methods: [`set_param`] and
/// [`conf_param`] for instrument settings, [`get_word`] for measurements,
/// [`put_word`] to push a word into the instrument.
///
/// [`set_param`]: GsiOnlineClient::set_param
/// [`conf_param`]: GsiOnlineClient::conf_param
/// [`get_word`]: GsiOnlineClient::get_word
/// [`put_word`]: GsiOnlineClient::put_word
pub struct GsiOnlineClient<C: ByteChannel> {
    transport: LineTransport<C>,
    config: GsiOnlineConfig,
}

impl GsiOnlineClient<SerialChannel> {
    /// Open a serial port and establish a session over it
    pub fn open_serial(path: &str, config: GsiOnlineConfig) -> GeoComResult<Self> {
        let channel = SerialChannel::open(path, config.baud, config.timeout)?;
        Self::connect(channel, config)
    }
}

impl<C: ByteChannel> GsiOnlineClient<C> {
    /// Establish a session over an already-open channel
    pub fn connect(channel: C, config: GsiOnlineConfig) -> GeoComResult<Self> {
        let transport = LineTransport::with_terminator(channel, &config.terminator);
        let mut client = Self { transport, config };
        client.handshake()?;
        Ok(client)
    }

    fn handshake(&mut self) -> GeoComResult<()> {
        info!("establishing GSI Online session");
        self.transport.send_raw(b"\n")?;
        self.transport.clear_input()?;

        let probe = self.config.probe_param;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let resp = self.conf_param(probe);
            if resp.status_ok() {
                debug!("connection probe answered on attempt {}", attempt);
                info!("session ready");
                return Ok(());
            }
            warn!("connection probe attempt {} failed", attempt);
            if attempt >= self.config.retries.max(1) {
                return Err(GeoComError::connection(format!(
                    "instrument did not answer the connection probe after {} attempts",
                    attempt
                )));
            }
            thread::sleep(self.config.retry_delay);
        }
    }

    fn exchange(&mut self, line: &str) -> (String, GsiOutcome) {
        debug!("gsi request {:?}", line);
        match self.transport.exchange(line) {
            Ok(raw) => {
                let outcome = match gsi::classify_reply(&raw) {
                    Some(gsi::GsiReplyKind::Ack) => GsiOutcome::Ack,
                    Some(gsi::GsiReplyKind::Warning(code)) => GsiOutcome::Warning(code),
                    Some(gsi::GsiReplyKind::Error(code)) => GsiOutcome::Error(code),
                    Some(gsi::GsiReplyKind::Payload(p)) => GsiOutcome::Payload(p.to_string()),
                    None => {
                        warn!("undecodable gsi reply: {:?}", raw);
                        GsiOutcome::Unframed
                    }
                };
                (raw, outcome)
            }
            Err(e) => {
                warn!("gsi exchange never completed: {}", e);
                (String::new(), GsiOutcome::Transport(gsi_com_status_for(&e)))
            }
        }
    }

    /// Interpret an outcome for a verb whose payload decoder is `decode`.
    ///
    /// `ack_ok` says whether a lone `?` is a valid success reply for the
    /// verb (`SET`, `CONF` and `PUT`; a `GET` must carry a word), and
    /// `ack_value` is the value an acknowledgement yields, if any.
    fn finish<T>(
        &self,
        request: String,
        raw: String,
        outcome: GsiOutcome,
        decode: impl FnOnce(&str) -> Option<T>,
        ack_ok: bool,
        ack_value: Option<T>,
    ) -> GsiResponse<T> {
        let (com_status, status, value) = match outcome {
            GsiOutcome::Transport(com) => (com, GsiStatus::Undefined, None),
            GsiOutcome::Unframed => (GsiComStatus::CantDecode, GsiStatus::Undefined, None),
            GsiOutcome::Warning(code) => (GsiComStatus::Ok, GsiStatus::Warning(code), None),
            GsiOutcome::Error(code) => (GsiComStatus::Ok, GsiStatus::Error(code), None),
            GsiOutcome::Ack if ack_ok => (GsiComStatus::Ok, GsiStatus::Ok, ack_value),
            GsiOutcome::Ack => (GsiComStatus::CantDecode, GsiStatus::Undefined, None),
            GsiOutcome::Payload(p) => match decode(&p) {
                Some(v) => (GsiComStatus::Ok, GsiStatus::Ok, Some(v)),
                None => (GsiComStatus::CantDecode, GsiStatus::Undefined, None),
            },
        };
        GsiResponse {
            request,
            raw,
            com_status,
            status,
            value,
        }
    }

    /// `SET/{param}/{value}` - write an instrument setting
    pub fn set_param(&mut self, param: u16, value: &str) -> GsiResponse<()> {
        let request = gsi::set_command(param, value);
        let (raw, outcome) = self.exchange(&request);
        self.finish(request, raw, outcome, |_| None, true, Some(()))
    }

    /// `CONF/{param}` - read an instrument setting
    ///
    /// Some instruments acknowledge with a bare `?` instead of echoing
    /// the `{param}/{value}` payload; that is a success with no value.
    pub fn conf_param(&mut self, param: u16) -> GsiResponse<String> {
        let request = gsi::conf_command(param);
        let (raw, outcome) = self.exchange(&request);
        self.finish(
            request,
            raw,
            outcome,
            |p| gsi::parse_conf_payload(p, param),
            true,
            None,
        )
    }

    /// `GET/{mode}/WI{index}` - read a measurement word
    pub fn get_word(&mut self, mode: GsiMode, index: u16) -> GsiResponse<GsiWord> {
        let request = gsi::get_command(mode, index);
        let (raw, outcome) = self.exchange(&request);
        self.finish(
            request,
            raw,
            outcome,
            |p| {
                // The reply may arrive as a one-word block, so let the
                // block parser infer GSI8 vs GSI16 from the prefix.
                let (_, block) = gsi::GsiBlock::parse(p).ok()?;
                block.words.into_iter().next()
            },
            false,
            None,
        )
    }

    /// `PUT/{word}` - push a data word into the instrument
    ///
    /// Fails only when the word itself cannot be encoded; everything
    /// past encoding is reported through the response.
    pub fn put_word(&mut self, word: &GsiWord) -> GeoComResult<GsiResponse<()>> {
        let request = gsi::put_command(word, self.config.format)?;
        let (raw, outcome) = self.exchange(&request);
        Ok(self.finish(request, raw, outcome, |_| None, true, Some(())))
    }

    pub fn stats(&self) -> TransportStats {
        self.transport.stats()
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Close the session; safe to call repeatedly
    pub fn close(&mut self) {
        self.transport.close();
    }
}
