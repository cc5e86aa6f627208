//! # GeoCom Protocol Encoding and Decoding
//!
//! The GeoCom dialect is a numbered remote procedure call protocol over
//! ASCII lines:
//!
//! ```text
//! request:  %R1Q,<rpc>:<p1>,<p2>,...
//! reply:    %R1P,<comrc>,<tr>[,<chk>]:<rc>[,<f1>,<f2>,...]
//! ```
//!
//! Every reply carries two independent status axes. `comrc` is the
//! communication layer's verdict on the exchange itself; `rc` is the
//! instrument subsystem's verdict on the procedure. A call succeeded only
//! when both are [`GeoComCode::Ok`], and a non-OK `comrc` dominates: the
//! body of such a reply is not to be trusted, so its fields are never
//! parsed.
//!
//! ## Decoding model
//!
//! [`decode_reply`] never fails. It runs the reply through match-frame,
//! split-fields and parse-fields stages; any violation at any stage
//! collapses to the sentinel status pair
//! (`ComCantDecode`, `Undefined`) with no decoded values. Field parsing is
//! all-or-nothing: one bad token poisons the whole reply rather than
//! handing the caller a half-decoded record.

use tracing::warn;

use crate::error::{GeoComError, GeoComResult};
use crate::value::{FieldKind, FieldValue, GeoComEnum, Param};

/// Well-known RPC numbers used by the session layer
pub mod rpc {
    /// No-operation connection probe
    pub const COM_NULL_PROC: u16 = 0;
    /// Set the server-side floating point precision
    pub const COM_SET_DOUBLE_PRECISION: u16 = 107;
    /// Query the server-side floating point precision
    pub const COM_GET_DOUBLE_PRECISION: u16 = 108;
}

/// Request line prefix
pub const REQUEST_PREFIX: &str = "%R1Q";
/// Reply line prefix
pub const REPLY_PREFIX: &str = "%R1P";

/// GeoCom return codes
///
/// One closed enumeration serves both status axes: the general instrument
/// codes, the communication subsystem block at 3072, and the commonly
/// returned theodolite (TMC) and automation (AUT) subsystem codes. A code
/// outside this enumeration makes the whole reply undecodable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum GeoComCode {
    Ok = 0,
    Undefined = 1,
    IvParam = 2,
    IvResult = 3,
    Fatal = 4,
    NotImpl = 5,
    TimeOut = 6,
    SetIncompl = 7,
    Abort = 8,
    NoMemory = 9,
    NotInit = 10,
    ShutDown = 12,
    SysBusy = 13,
    HwFailure = 14,
    AbortAppl = 15,
    LowPower = 16,
    IvVersion = 17,
    BatEmpty = 18,
    NoEvent = 20,

    TmcAccuracyGuarantee = 1283,
    TmcAngleOk = 1284,
    TmcAngleNotFullCorr = 1285,

    ComEro = 3072,
    ComCantEncode = 3073,
    ComCantDecode = 3074,
    ComCantSend = 3075,
    ComCantRecv = 3076,
    ComTimedOut = 3077,
    ComWrongFormat = 3078,
    ComVerMismatch = 3079,
    ComCantDecodeReq = 3080,
    ComProcUnavail = 3081,
    ComOverruns = 3082,
    ComSystemErr = 3083,
    ComFailed = 3085,
    ComNoBinary = 3086,
    ComIntr = 3087,
    ComRequires8DBits = 3090,
    ComTrIdMismatch = 3093,
    ComNotGeocom = 3094,
    ComUnknownPort = 3095,
    ComEroEnd = 3099,
    ComOverrun = 3106,
    ComSrvrRxChecksumErr = 3107,
    ComClntRxChecksumErr = 3108,
    ComPortNotAvailable = 3109,
    ComPortNotOpen = 3110,
    ComNoPartner = 3111,

    AutTimeout = 8704,
    AutDetentError = 8705,
    AutAngleError = 8706,
    AutMotorError = 8707,
    AutIncacc = 8708,
    AutNoTarget = 8710,
    AutMultipleTargets = 8711,
    AutBadEnvironment = 8712,
    AutNotEnabled = 8714,
}

impl GeoComCode {
    /// Look up a wire code, `None` when outside the enumeration
    pub fn from_code(code: i64) -> Option<Self> {
        let code = match code {
            0 => Self::Ok,
            1 => Self::Undefined,
            2 => Self::IvParam,
            3 => Self::IvResult,
            4 => Self::Fatal,
            5 => Self::NotImpl,
            6 => Self::TimeOut,
            7 => Self::SetIncompl,
            8 => Self::Abort,
            9 => Self::NoMemory,
            10 => Self::NotInit,
            12 => Self::ShutDown,
            13 => Self::SysBusy,
            14 => Self::HwFailure,
            15 => Self::AbortAppl,
            16 => Self::LowPower,
            17 => Self::IvVersion,
            18 => Self::BatEmpty,
            20 => Self::NoEvent,
            1283 => Self::TmcAccuracyGuarantee,
            1284 => Self::TmcAngleOk,
            1285 => Self::TmcAngleNotFullCorr,
            3072 => Self::ComEro,
            3073 => Self::ComCantEncode,
            3074 => Self::ComCantDecode,
            3075 => Self::ComCantSend,
            3076 => Self::ComCantRecv,
            3077 => Self::ComTimedOut,
            3078 => Self::ComWrongFormat,
            3079 => Self::ComVerMismatch,
            3080 => Self::ComCantDecodeReq,
            3081 => Self::ComProcUnavail,
            3082 => Self::ComOverruns,
            3083 => Self::ComSystemErr,
            3085 => Self::ComFailed,
            3086 => Self::ComNoBinary,
            3087 => Self::ComIntr,
            3090 => Self::ComRequires8DBits,
            3093 => Self::ComTrIdMismatch,
            3094 => Self::ComNotGeocom,
            3095 => Self::ComUnknownPort,
            3099 => Self::ComEroEnd,
            3106 => Self::ComOverrun,
            3107 => Self::ComSrvrRxChecksumErr,
            3108 => Self::ComClntRxChecksumErr,
            3109 => Self::ComPortNotAvailable,
            3110 => Self::ComPortNotOpen,
            3111 => Self::ComNoPartner,
            8704 => Self::AutTimeout,
            8705 => Self::AutDetentError,
            8706 => Self::AutAngleError,
            8707 => Self::AutMotorError,
            8708 => Self::AutIncacc,
            8710 => Self::AutNoTarget,
            8711 => Self::AutMultipleTargets,
            8712 => Self::AutBadEnvironment,
            8714 => Self::AutNotEnabled,
            _ => return None,
        };
        Some(code)
    }

    /// The numeric wire code
    pub fn code(self) -> i64 {
        self as i32 as i64
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl GeoComEnum for GeoComCode {
    fn from_value(value: i64) -> Option<Self> {
        Self::from_code(value)
    }

    fn value(self) -> i64 {
        self.code()
    }
}

impl std::fmt::Display for GeoComCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

/// GeoCom protocol dialect
///
/// Differences between instrument generations are a capability lookup,
/// not separate implementations. Today the only divergence is the reply
/// checksum field the VivaTPS generation adds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum GeoComDialect {
    Tps1100,
    #[default]
    Tps1200,
    VivaTps,
}

impl GeoComDialect {
    /// Whether replies carry the checksum field between `tr` and `:`
    pub fn has_reply_checksum(self) -> bool {
        matches!(self, GeoComDialect::VivaTps)
    }
}

/// Encode a request line (no terminator)
///
/// An empty parameter list leaves nothing after the colon, which is the
/// shape `%R1Q,0:` probes have on the wire.
pub fn encode_request(rpc: u16, params: &[Param], precision: usize) -> String {
    let body = params
        .iter()
        .map(|p| p.encode(precision))
        .collect::<Vec<_>>()
        .join(",");
    format!("{},{}:{}", REQUEST_PREFIX, rpc, body)
}

/// One decoded (or synthesized) GeoCom reply
///
/// Always materializes, no matter what arrived on the wire: transport
/// failures and undecodable replies become responses whose communication
/// status says what went wrong. `values` is populated only when both
/// statuses are OK and every expected field parsed.
#[derive(Debug, Clone)]
pub struct GeoComResponse {
    /// The request line this reply answers
    pub request: String,
    /// The raw reply line, empty for synthesized responses
    pub raw: String,
    /// Communication layer status
    pub com_status: GeoComCode,
    /// Instrument procedure status
    pub rpc_status: GeoComCode,
    /// Server-side transaction id from the reply header
    pub transaction: u16,
    /// Reply checksum, present only in the VivaTPS dialect
    pub checksum: Option<u16>,
    values: Option<Vec<FieldValue>>,
}

impl GeoComResponse {
    /// Build a response that never touched the wire
    ///
    /// Used by the client to surface transport failures through the
    /// status model instead of raising them.
    pub fn synthetic(request: impl Into<String>, com: GeoComCode, rpc: GeoComCode) -> Self {
        Self {
            request: request.into(),
            raw: String::new(),
            com_status: com,
            rpc_status: rpc,
            transaction: 0,
            checksum: None,
            values: None,
        }
    }

    /// Both status axes OK
    pub fn status_ok(&self) -> bool {
        self.com_status.is_ok() && self.rpc_status.is_ok()
    }

    /// Both statuses as a pair, communication axis first
    pub fn status(&self) -> (GeoComCode, GeoComCode) {
        (self.com_status, self.rpc_status)
    }

    /// Decoded fields, `None` unless the reply decoded cleanly with both
    /// statuses OK
    pub fn values(&self) -> Option<&[FieldValue]> {
        self.values.as_deref()
    }

    fn field(&self, index: usize) -> GeoComResult<&FieldValue> {
        self.values
            .as_ref()
            .and_then(|v| v.get(index))
            .ok_or_else(|| GeoComError::frame(format!("no decoded field at index {index}")))
    }

    pub fn int(&self, index: usize) -> GeoComResult<i64> {
        self.field(index)?
            .as_int()
            .ok_or_else(|| GeoComError::frame(format!("field {index} is not an integer")))
    }

    pub fn bool_(&self, index: usize) -> GeoComResult<bool> {
        self.field(index)?
            .as_bool()
            .ok_or_else(|| GeoComError::frame(format!("field {index} is not a boolean")))
    }

    pub fn float(&self, index: usize) -> GeoComResult<f64> {
        self.field(index)?
            .as_float()
            .ok_or_else(|| GeoComError::frame(format!("field {index} is not a float")))
    }

    pub fn str_(&self, index: usize) -> GeoComResult<&str> {
        self.field(index)?
            .as_str()
            .ok_or_else(|| GeoComError::frame(format!("field {index} is not a string")))
    }

    pub fn byte(&self, index: usize) -> GeoComResult<u8> {
        self.field(index)?
            .as_byte()
            .ok_or_else(|| GeoComError::frame(format!("field {index} is not a byte")))
    }

    pub fn angle(&self, index: usize) -> GeoComResult<crate::angle::Angle> {
        self.field(index)?
            .as_angle()
            .ok_or_else(|| GeoComError::frame(format!("field {index} is not an angle")))
    }

    pub fn enum_<E: GeoComEnum>(&self, index: usize) -> GeoComResult<E> {
        self.field(index)?.as_enum::<E>()
    }
}

/// Decode a reply line against the expected field layout
///
/// Infallible by contract. A reply that violates the grammar at any stage
/// comes back carrying the (`ComCantDecode`, `Undefined`) sentinel pair
/// with no values.
pub fn decode_reply(
    dialect: GeoComDialect,
    request: &str,
    raw: &str,
    fields: &[FieldKind],
) -> GeoComResponse {
    match parse_reply(dialect, raw, fields) {
        Some((com_status, rpc_status, transaction, checksum, values)) => GeoComResponse {
            request: request.to_string(),
            raw: raw.to_string(),
            com_status,
            rpc_status,
            transaction,
            checksum,
            values,
        },
        None => {
            warn!("undecodable reply: {:?}", raw);
            GeoComResponse {
                request: request.to_string(),
                raw: raw.to_string(),
                com_status: GeoComCode::ComCantDecode,
                rpc_status: GeoComCode::Undefined,
                transaction: 0,
                checksum: None,
                values: None,
            }
        }
    }
}

type ParsedReply = (GeoComCode, GeoComCode, u16, Option<u16>, Option<Vec<FieldValue>>);

fn parse_reply(dialect: GeoComDialect, raw: &str, fields: &[FieldKind]) -> Option<ParsedReply> {
    // Stage 1: match the frame.
    let rest = raw.strip_prefix(REPLY_PREFIX)?.strip_prefix(',')?;
    let (head, body) = rest.split_once(':')?;

    // Stage 2: split the header and field lists.
    let head_parts: Vec<&str> = head.split(',').collect();
    let (com_token, tr_token, chk_token) = match head_parts.as_slice() {
        [com, tr] => (*com, *tr, None),
        [com, tr, chk] if dialect.has_reply_checksum() => (*com, *tr, Some(*chk)),
        _ => return None,
    };

    let com_status = GeoComCode::from_code(com_token.parse::<i64>().ok()?)?;
    let transaction = tr_token.parse::<u16>().ok()?;
    let checksum = match chk_token {
        Some(token) => Some(token.parse::<u16>().ok()?),
        None => None,
    };

    let mut body_parts = body.split(',');
    let rpc_status = GeoComCode::from_code(body_parts.next()?.parse::<i64>().ok()?)?;
    let tokens: Vec<&str> = body_parts.collect();

    // Stage 3: parse the fields, all or nothing. A reply whose statuses
    // are not both OK carries no trustworthy fields, so its trailing
    // tokens (usually none) are left alone.
    if !(com_status.is_ok() && rpc_status.is_ok()) {
        return Some((com_status, rpc_status, transaction, checksum, None));
    }

    if tokens.len() != fields.len() {
        return None;
    }
    let mut values = Vec::with_capacity(fields.len());
    for (kind, token) in fields.iter().zip(&tokens) {
        values.push(kind.parse(token).ok()?);
    }
    Some((com_status, rpc_status, transaction, checksum, Some(values)))
}
