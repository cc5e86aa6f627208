//! # GeoCom - Survey Instrument Serial Protocol Library
//!
//! **Author:** Evan Liu <evan.liu@voltageenergy.com>
//! **Version:** 0.2.0
//! **License:** MIT
//!
//! A synchronous client implementation of the two ASCII dialects spoken by
//! Leica-style surveying instruments over a serial line: **GeoCom**, the
//! numbered remote procedure call protocol of total stations, and
//! **GSI Online**, the fixed-width data word protocol of digital levels
//! and older instruments.
//!
//! ## Features
//!
//! - **Both dialects**: GeoCom request/reply framing and the GSI Online
//!   `SET`/`CONF`/`GET`/`PUT` verb set with GSI8 and GSI16 words
//! - **Strictly synchronous**: blocking serial I/O, one request in flight,
//!   no runtime to carry around in field software
//! - **Failure as data**: once connected, timeouts and garbled replies are
//!   returned as failed responses with a two-axis status pair, never as
//!   panics or errors
//! - **Self-healing line**: automatic input resynchronization after
//!   repeated receive timeouts
//! - **Testable to the byte**: the transport is generic over a small byte
//!   channel trait, so every layer runs against in-memory mocks
//!
//! ## Wire formats
//!
//! ```text
//! GeoCom request:  %R1Q,2008:1,0
//! GeoCom reply:    %R1P,0,0:0,1996,'07','19','10','13','2f'
//! GSI Online:      GET/I/WI11   ->   11....+0000A123
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use geocom::{FieldKind, GeoComClient, GeoComConfig};
//!
//! fn main() -> geocom::GeoComResult<()> {
//!     // Opens the port, probes the instrument and negotiates the
//!     // floating point precision.
//!     let mut client = GeoComClient::open_serial("/dev/ttyUSB0", GeoComConfig::default())?;
//!
//!     // TMC_GetAngle5: horizontal and vertical angle in radians.
//!     let resp = client.request(2107, &[0i64.into()], &[FieldKind::Angle, FieldKind::Angle]);
//!     if resp.status_ok() {
//!         println!("Hz {}  V {}", resp.angle(0)?.to_dms_string(), resp.angle(1)?.to_dms_string());
//!     } else {
//!         println!("instrument said: com={} rc={}", resp.com_status, resp.rpc_status);
//!     }
//!
//!     client.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Module        | Responsibility                                        |
//! |---------------|-------------------------------------------------------|
//! | [`transport`] | terminated-line exchange, timeouts, resynchronization |
//! | [`protocol`]  | GeoCom request encoding and reply decoding            |
//! | [`gsi`]       | GSI word/block codec and the GSI Online verbs         |
//! | [`value`]     | parameter and field value encoding rules              |
//! | [`angle`]     | radian angles and their presentation units            |
//! | [`checksum`]  | CRC-16/ARC engine for checksummed framing             |
//! | [`client`]    | session handshake and the request loop                |
//! | [`error`]     | error types and classification                        |

pub mod angle;
pub mod checksum;
pub mod client;
pub mod error;
pub mod gsi;
pub mod protocol;
pub mod transport;
pub mod value;

// Re-export main types for convenience
pub use angle::Angle;
pub use client::{
    GeoComClient, GeoComConfig, GsiOnlineClient, GsiOnlineConfig, SessionState,
    DEFAULT_PRECISION, MAX_PRECISION,
};
pub use error::{GeoComError, GeoComResult};
pub use gsi::{
    GsiBlock, GsiComStatus, GsiFormat, GsiMode, GsiResponse, GsiStatus, GsiWord,
};
pub use protocol::{GeoComCode, GeoComDialect, GeoComResponse};
pub use transport::{ByteChannel, LineTransport, SerialChannel, TransportStats};
pub use value::{Byte, FieldKind, FieldValue, GeoComEnum, Param};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_api_reachable() {
        let _ = GeoComConfig::default();
        let _ = GsiOnlineConfig::default();
        assert_eq!(checksum::checksum(b"123456789"), 0xBB3D);
        assert!(GeoComCode::from_code(0).unwrap().is_ok());
    }
}
