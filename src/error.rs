//! # GeoCom Error Handling
//!
//! This module provides error handling for the GeoCom library, covering
//! transport failures, line framing problems, and value construction errors.
//!
//! ## Overview
//!
//! The error system follows a deliberate split that runs through the whole
//! crate: once a session is established, failures of the *instrument* are
//! never Rust errors. A timed-out or garbled reply comes back to the caller
//! as a failed [`GeoComResponse`](crate::protocol::GeoComResponse) with the
//! appropriate communication status, so a measurement loop can inspect
//! statuses without `match`-ing on error types. `GeoComError` is reserved
//! for the places where a `Result` is the honest signature:
//!
//! - the transport layer itself ([`LineTransport`](crate::transport::LineTransport)
//!   methods return `GeoComResult` and the client converts),
//! - session establishment (a dead link during the handshake is
//!   [`GeoComError::Connection`]),
//! - value construction (a [`Byte`](crate::value::Byte) outside `0..=255`
//!   is [`GeoComError::OutOfRange`], an unknown enumeration code is
//!   [`GeoComError::InvalidEnumValue`]).
//!
//! ## Error Classification
//!
//! ```rust
//! use geocom::GeoComError;
//!
//! fn classify_error(error: &GeoComError) {
//!     if error.is_transport_error() {
//!         println!("Link issue: {}", error);
//!     } else {
//!         println!("Usage or data issue: {}", error);
//!     }
//! }
//! ```

use thiserror::Error;

/// Result type alias for GeoCom operations
///
/// Convenience alias using `GeoComError` as the error type for all
/// fallible operations throughout the crate.
pub type GeoComResult<T> = Result<T, GeoComError>;

/// GeoCom library error types
///
/// Each variant carries enough context to diagnose the failure without a
/// debugger: the operation that timed out, the value that fell outside its
/// range, the token that could not be framed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoComError {
    /// I/O related errors (serial port read/write failures)
    ///
    /// Covers low-level I/O failures other than timeouts: port access
    /// revoked, USB adapter unplugged, device node gone.
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Connection errors
    ///
    /// Session establishment failures: the serial port could not be
    /// opened, or the instrument never answered the connection probe
    /// within the configured retry budget.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Timeout errors
    ///
    /// An operation exceeded the channel's configured receive timeout.
    /// Includes which operation timed out and the timeout duration.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Operation attempted on a closed transport
    ///
    /// Returned by every transport method after [`close`] has run.
    /// Closing is idempotent; using the transport afterwards is not.
    ///
    /// [`close`]: crate::transport::LineTransport::close
    #[error("Transport is not open")]
    NotOpen,

    /// Line framing errors
    ///
    /// The received bytes could not be framed as a protocol line:
    /// non-UTF-8 payload, or a reply that grew past the size guard
    /// without a terminator.
    #[error("Frame error: {message}")]
    Frame { message: String },

    /// Value outside its representable range
    ///
    /// Raised during parameter construction, before anything touches the
    /// wire. The only range that deliberately does not use this variant
    /// is the motorization velocity, which clamps instead.
    #[error("Value {value} out of range {min}..={max}")]
    OutOfRange { value: i64, min: i64, max: i64 },

    /// Unknown enumeration code
    ///
    /// A decoded integer did not map to any variant of the requested
    /// instrument enumeration.
    #[error("Invalid enumeration value: {value}")]
    InvalidEnumValue { value: i64 },
}

impl GeoComError {
    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }

    /// Create a new connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection { message: message.into() }
    }

    /// Create a new timeout error
    ///
    /// # Arguments
    ///
    /// * `operation` - Description of the operation that timed out
    /// * `timeout_ms` - Timeout duration in milliseconds
    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a new frame error
    pub fn frame<S: Into<String>>(message: S) -> Self {
        Self::Frame { message: message.into() }
    }

    /// Create an out-of-range error
    pub fn out_of_range(value: i64, min: i64, max: i64) -> Self {
        Self::OutOfRange { value, min, max }
    }

    /// Check if the error is potentially recoverable by retrying
    ///
    /// Timeouts and I/O hiccups are worth a retry; range and enumeration
    /// errors will fail the same way every time.
    ///
    /// # Example
    ///
    /// ```rust
    /// use geocom::GeoComError;
    ///
    /// let timeout_error = GeoComError::timeout("receive", 5000);
    /// assert!(timeout_error.is_recoverable());
    ///
    /// let range_error = GeoComError::out_of_range(256, 0, 255);
    /// assert!(!range_error.is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Timeout { .. } | Self::Connection { .. }
        )
    }

    /// Check if the error originated at the transport level
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::Connection { .. }
                | Self::Timeout { .. }
                | Self::NotOpen
                | Self::Frame { .. }
        )
    }
}

impl From<std::io::Error> for GeoComError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                GeoComError::timeout("I/O operation", 0)
            }
            _ => GeoComError::io(error.to_string()),
        }
    }
}

impl From<serialport::Error> for GeoComError {
    fn from(error: serialport::Error) -> Self {
        GeoComError::connection(error.to_string())
    }
}
