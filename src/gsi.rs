//! # GSI Online Codec
//!
//! The older of the two dialects: fixed-width GSI data words and a small
//! verb set (`SET`, `CONF`, `GET`, `PUT`) over the same terminated ASCII
//! lines.
//!
//! ## Word layout
//!
//! A word is 16 characters in GSI8 or 24 in GSI16:
//!
//! ```text
//! | header (6) | sign (1) | data (8 or 16) | blank (1) |
//!   11....       +          0000000000000123
//! ```
//!
//! The header starts with the decimal word index (WI) and continues with
//! annotation characters, `.`-filled to six columns. Data is zero-padded
//! and may be alphanumeric (point identifiers carry letters). A block is a
//! run of words on one line; GSI16 blocks are prefixed with `*`.
//!
//! ## Replies
//!
//! `SET`, `CONF` and `PUT` acknowledge success with a lone `?`. `CONF`
//! success carries `pppp/value`; `GET` success carries a word. Failures
//! arrive as `@W<code>` (warning) or `@E<code>` (error).

use crate::error::{GeoComError, GeoComResult};

/// GSI data word width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum GsiFormat {
    /// 8 data characters, 16-character words
    #[default]
    Gsi8,
    /// 16 data characters, 24-character words, `*`-prefixed blocks
    Gsi16,
}

impl GsiFormat {
    pub fn data_width(self) -> usize {
        match self {
            GsiFormat::Gsi8 => 8,
            GsiFormat::Gsi16 => 16,
        }
    }

    pub fn word_len(self) -> usize {
        // header + sign + data + trailing blank
        6 + 1 + self.data_width() + 1
    }
}

/// Measurement acquisition mode for `GET`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GsiMode {
    /// Last value held by the instrument
    Instant,
    /// Trigger a new measurement
    Measure,
    /// Stream until stopped
    Continuous,
}

impl GsiMode {
    pub fn letter(self) -> char {
        match self {
            GsiMode::Instant => 'I',
            GsiMode::Measure => 'M',
            GsiMode::Continuous => 'C',
        }
    }
}

/// One GSI data word
///
/// Fields are open for construction; [`encode`](GsiWord::encode) validates
/// them, so an over-long header or data run fails before it reaches the
/// wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsiWord {
    /// Word index (WI), the leading decimal digits of the header
    pub index: u16,
    /// Annotation characters following the index, `.`-filled on encode
    pub info: String,
    pub negative: bool,
    /// Significant data characters, zero-padded on encode
    pub data: String,
}

impl GsiWord {
    /// Word holding a signed numeric value
    pub fn numeric(index: u16, value: i64) -> Self {
        Self {
            index,
            info: String::new(),
            negative: value < 0,
            data: value.unsigned_abs().to_string(),
        }
    }

    /// Word holding alphanumeric data, e.g. a point identifier
    pub fn text(index: u16, data: &str) -> Self {
        Self {
            index,
            info: String::new(),
            negative: false,
            data: data.to_string(),
        }
    }

    /// Signed numeric value, when the data is numeric
    pub fn value(&self) -> Option<i64> {
        let magnitude: i64 = self.data.parse().ok()?;
        Some(if self.negative { -magnitude } else { magnitude })
    }

    /// Encode to the fixed-width wire form, trailing blank included
    pub fn encode(&self, format: GsiFormat) -> GeoComResult<String> {
        let header = format!("{}{}", self.index, self.info);
        if header.len() > 6 {
            return Err(GeoComError::frame(format!(
                "word header {header:?} exceeds 6 characters"
            )));
        }
        let width = format.data_width();
        if self.data.len() > width {
            return Err(GeoComError::frame(format!(
                "word data {:?} exceeds {} characters",
                self.data, width
            )));
        }
        let sign = if self.negative { '-' } else { '+' };
        Ok(format!(
            "{:.<6}{}{:0>width$} ",
            header,
            sign,
            self.data,
            width = width
        ))
    }

    /// Parse one fixed-width word of the given format
    pub fn parse(format: GsiFormat, text: &str) -> GeoComResult<Self> {
        if text.len() != format.word_len() || !text.is_ascii() {
            return Err(GeoComError::frame(format!("malformed GSI word: {text:?}")));
        }
        let width = format.data_width();
        let header = &text[..6];
        let sign = &text[6..7];
        let data = &text[7..7 + width];
        let blank = &text[7 + width..];
        if blank != " " {
            return Err(GeoComError::frame("GSI word missing trailing blank"));
        }

        // Annotation characters may themselves be digits. Word indexes
        // are at most three digits, so a longer run is read as a
        // two-digit index followed by numeric annotation.
        let run = header.chars().take_while(|c| c.is_ascii_digit()).count();
        let split = if run > 3 { 2 } else { run };
        let index: u16 = header[..split]
            .parse()
            .map_err(|_| GeoComError::frame(format!("GSI word has no index: {header:?}")))?;
        let info = header[split..].trim_end_matches('.').to_string();

        let negative = match sign {
            "+" => false,
            "-" => true,
            _ => return Err(GeoComError::frame(format!("invalid sign: {sign:?}"))),
        };

        let trimmed = data.trim_start_matches('0');
        let data = if trimmed.is_empty() { "0" } else { trimmed };

        Ok(Self {
            index,
            info,
            negative,
            data: data.to_string(),
        })
    }
}

/// A run of words sharing one line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GsiBlock {
    pub words: Vec<GsiWord>,
}

impl GsiBlock {
    pub fn new(words: Vec<GsiWord>) -> Self {
        Self { words }
    }

    /// Encode the block, `*`-prefixed for GSI16
    pub fn encode(&self, format: GsiFormat) -> GeoComResult<String> {
        let mut line = String::new();
        if format == GsiFormat::Gsi16 {
            line.push('*');
        }
        for word in &self.words {
            line.push_str(&word.encode(format)?);
        }
        Ok(line)
    }

    /// Parse a block line, inferring the format from the `*` prefix
    pub fn parse(line: &str) -> GeoComResult<(GsiFormat, Self)> {
        let (format, body) = match line.strip_prefix('*') {
            Some(rest) => (GsiFormat::Gsi16, rest),
            None => (GsiFormat::Gsi8, line),
        };
        let step = format.word_len();
        if body.is_empty() || body.len() % step != 0 {
            return Err(GeoComError::frame(format!(
                "block length {} is not a multiple of {}",
                body.len(),
                step
            )));
        }
        let mut words = Vec::with_capacity(body.len() / step);
        for start in (0..body.len()).step_by(step) {
            words.push(GsiWord::parse(format, &body[start..start + step])?);
        }
        Ok((format, Self { words }))
    }
}

/// Build a `SET` command line
pub fn set_command(param: u16, value: &str) -> String {
    format!("SET/{}/{}", param, value)
}

/// Build a `CONF` query line
pub fn conf_command(param: u16) -> String {
    format!("CONF/{}", param)
}

/// Build a `GET` request line
pub fn get_command(mode: GsiMode, index: u16) -> String {
    format!("GET/{}/WI{}", mode.letter(), index)
}

/// Build a `PUT` line carrying one word
pub fn put_command(word: &GsiWord, format: GsiFormat) -> GeoComResult<String> {
    Ok(format!("PUT/{}", word.encode(format)?))
}

/// Communication axis of a GSI exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GsiComStatus {
    Ok,
    Timeout,
    CantSend,
    CantDecode,
    NotOpen,
    Failed,
}

impl GsiComStatus {
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

/// Instrument axis of a GSI exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GsiStatus {
    Ok,
    Warning(u16),
    Error(u16),
    /// Unknown, because the exchange never produced a classifiable reply
    Undefined,
}

impl GsiStatus {
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

/// Outcome of one GSI Online exchange
///
/// Mirrors the GeoCom response model: transport and framing failures are
/// folded into the communication axis, never raised, and `value` is
/// present only when both axes are OK.
#[derive(Debug, Clone)]
pub struct GsiResponse<T> {
    pub request: String,
    pub raw: String,
    pub com_status: GsiComStatus,
    pub status: GsiStatus,
    pub value: Option<T>,
}

impl<T> GsiResponse<T> {
    pub fn synthetic(request: impl Into<String>, com: GsiComStatus) -> Self {
        Self {
            request: request.into(),
            raw: String::new(),
            com_status: com,
            status: GsiStatus::Undefined,
            value: None,
        }
    }

    pub fn status_ok(&self) -> bool {
        self.com_status.is_ok() && self.status.is_ok()
    }
}

/// Shape of a successfully framed GSI reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GsiReplyKind<'a> {
    /// Lone `?`, the success acknowledgement
    Ack,
    Warning(u16),
    Error(u16),
    /// Anything else is operation-specific payload
    Payload(&'a str),
}

/// Classify a reply line, `None` when it cannot be framed at all
pub fn classify_reply(raw: &str) -> Option<GsiReplyKind<'_>> {
    if raw == "?" {
        return Some(GsiReplyKind::Ack);
    }
    if let Some(rest) = raw.strip_prefix("@W") {
        return rest.parse().ok().map(GsiReplyKind::Warning);
    }
    if let Some(rest) = raw.strip_prefix("@E") {
        return rest.parse().ok().map(GsiReplyKind::Error);
    }
    if raw.starts_with('@') || raw.is_empty() {
        return None;
    }
    Some(GsiReplyKind::Payload(raw))
}

/// Extract the value from a `CONF` reply payload (`pppp/value`)
pub fn parse_conf_payload(payload: &str, param: u16) -> Option<String> {
    let (echoed, value) = payload.split_once('/')?;
    if echoed.parse::<u16>().ok()? != param {
        return None;
    }
    Some(value.to_string())
}
