//! # Value Codec
//!
//! Conversion between Rust values and the ASCII tokens both dialects put
//! on the wire. Encoding is driven by the [`Param`] sum type, so a request
//! can only ever be built from representable parameter kinds; decoding is
//! positional, pairing an expected [`FieldKind`] with each reply token and
//! producing the matching [`FieldValue`].
//!
//! ## Wire formats
//!
//! | Kind    | Wire form                  | Notes                           |
//! |---------|----------------------------|---------------------------------|
//! | Int     | `-42`                      | decimal                         |
//! | Bool    | `1` / `0`                  | decode accepts any integer      |
//! | Float   | `3.14`                     | negotiated precision, trailing zeros trimmed, one fractional digit always kept |
//! | Str     | `"hello"`                  | double quotes, verbatim payload |
//! | Byte    | `'0C'`                     | single-quoted uppercase hex     |
//! | Angle   | `1.5707963268`             | radians, as Float               |
//!
//! Instrument enumerations travel as their underlying integers; typed
//! lookup happens through [`GeoComEnum`] and fails with
//! [`GeoComError::InvalidEnumValue`] on unknown codes.

use crate::angle::Angle;
use crate::error::{GeoComError, GeoComResult};

/// Maximum motorization velocity magnitude in radians per second
pub const MAX_MOTOR_VELOCITY: f64 = 0.79;

/// Clamp a motorization velocity into the drivable range
///
/// Velocities are the one value class that clamps instead of failing:
/// a slightly-hot controller output should slew at full speed, not abort
/// the pointing sequence.
pub fn clamped_velocity(rad_per_sec: f64) -> f64 {
    rad_per_sec.clamp(-MAX_MOTOR_VELOCITY, MAX_MOTOR_VELOCITY)
}

/// Integer-backed instrument enumeration
///
/// Implemented by every closed instrument enumeration the crate exposes.
/// `from_value` is total over `i64` and returns `None` for codes outside
/// the enumeration.
pub trait GeoComEnum: Sized + Copy {
    fn from_value(value: i64) -> Option<Self>;
    fn value(self) -> i64;
}

/// A single wire byte, range-checked at construction
///
/// Encodes as single-quoted uppercase hex (`'0C'`). Constructing one from
/// a value outside `0..=255` is [`GeoComError::OutOfRange`], which keeps
/// range failures on the caller's side of the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Byte(u8);

impl Byte {
    pub fn new(value: i64) -> GeoComResult<Self> {
        if !(0..=255).contains(&value) {
            return Err(GeoComError::out_of_range(value, 0, 255));
        }
        Ok(Byte(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Wire form, e.g. `'0C'`
    pub fn encode(self) -> String {
        format!("'{:02X}'", self.0)
    }

    /// Parse the single-quoted hex wire form, case-insensitively
    pub fn parse(token: &str) -> GeoComResult<Self> {
        let inner = token
            .strip_prefix('\'')
            .and_then(|t| t.strip_suffix('\''))
            .ok_or_else(|| GeoComError::frame(format!("not a byte token: {token:?}")))?;
        let value = u8::from_str_radix(inner, 16)
            .map_err(|_| GeoComError::frame(format!("invalid hex byte: {token:?}")))?;
        Ok(Byte(value))
    }
}

impl From<u8> for Byte {
    fn from(value: u8) -> Self {
        Byte(value)
    }
}

/// Encode a float at the given precision
///
/// Fixed-point formatting at `precision` fractional digits, then trailing
/// zeros are trimmed. At least one fractional digit is always kept, so a
/// whole number encodes as `1.0`, never `1` or `1.`.
pub fn encode_float(value: f64, precision: usize) -> String {
    let digits = precision.max(1);
    let fixed = format!("{:.*}", digits, value);
    let trimmed = fixed.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{}0", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Request parameter
///
/// Closed sum over every kind of value a request can carry. There is no
/// escape hatch variant: a parameter kind the wire grammar cannot express
/// cannot be constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Int(i64),
    Bool(bool),
    Float(f64),
    Str(String),
    Byte(Byte),
    Angle(Angle),
}

impl Param {
    /// Encode to the wire token, floats at the negotiated precision
    pub fn encode(&self, precision: usize) -> String {
        match self {
            Param::Int(v) => v.to_string(),
            Param::Bool(v) => if *v { "1" } else { "0" }.to_string(),
            Param::Float(v) => encode_float(*v, precision),
            Param::Str(v) => format!("\"{}\"", v),
            Param::Byte(v) => v.encode(),
            Param::Angle(v) => encode_float(v.radians(), precision),
        }
    }

    /// Build an enumeration parameter from its underlying code
    pub fn from_enum<E: GeoComEnum>(value: E) -> Self {
        Param::Int(value.value())
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Param::Int(v as i64)
    }
}

impl From<u16> for Param {
    fn from(v: u16) -> Self {
        Param::Int(v as i64)
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::Bool(v)
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Float(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Str(v.to_string())
    }
}

impl From<Byte> for Param {
    fn from(v: Byte) -> Self {
        Param::Byte(v)
    }
}

impl From<Angle> for Param {
    fn from(v: Angle) -> Self {
        Param::Angle(v)
    }
}

/// Expected kind of a positional reply field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Bool,
    Float,
    Str,
    Byte,
    Angle,
}

impl FieldKind {
    /// Parse one reply token into its typed value
    pub fn parse(self, token: &str) -> GeoComResult<FieldValue> {
        match self {
            FieldKind::Int => token
                .parse::<i64>()
                .map(FieldValue::Int)
                .map_err(|_| GeoComError::frame(format!("invalid integer: {token:?}"))),
            FieldKind::Bool => token
                .parse::<i64>()
                .map(|v| FieldValue::Bool(v != 0))
                .map_err(|_| GeoComError::frame(format!("invalid boolean: {token:?}"))),
            FieldKind::Float => token
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| GeoComError::frame(format!("invalid float: {token:?}"))),
            FieldKind::Str => {
                let inner = token
                    .strip_prefix('"')
                    .and_then(|t| t.strip_suffix('"'))
                    .ok_or_else(|| GeoComError::frame(format!("not a string token: {token:?}")))?;
                Ok(FieldValue::Str(inner.to_string()))
            }
            FieldKind::Byte => Byte::parse(token).map(FieldValue::Byte),
            FieldKind::Angle => token
                .parse::<f64>()
                .map(|v| FieldValue::Angle(Angle::from_radians(v)))
                .map_err(|_| GeoComError::frame(format!("invalid angle: {token:?}"))),
        }
    }
}

/// Decoded reply field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Bool(bool),
    Float(f64),
    Str(String),
    Byte(Byte),
    Angle(Angle),
}

impl FieldValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_byte(&self) -> Option<u8> {
        match self {
            FieldValue::Byte(v) => Some(v.value()),
            _ => None,
        }
    }

    pub fn as_angle(&self) -> Option<Angle> {
        match self {
            FieldValue::Angle(v) => Some(*v),
            _ => None,
        }
    }

    /// Resolve an integer field into a typed instrument enumeration
    pub fn as_enum<E: GeoComEnum>(&self) -> GeoComResult<E> {
        let code = self
            .as_int()
            .ok_or_else(|| GeoComError::frame("enumeration field is not an integer"))?;
        E::from_value(code).ok_or(GeoComError::InvalidEnumValue { value: code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum OnOff {
        Off,
        On,
    }

    impl GeoComEnum for OnOff {
        fn from_value(value: i64) -> Option<Self> {
            match value {
                0 => Some(OnOff::Off),
                1 => Some(OnOff::On),
                _ => None,
            }
        }

        fn value(self) -> i64 {
            match self {
                OnOff::Off => 0,
                OnOff::On => 1,
            }
        }
    }

    #[test]
    fn test_byte_round_trip() {
        for v in 0..=255i64 {
            let byte = Byte::new(v).unwrap();
            let encoded = byte.encode();
            assert_eq!(Byte::parse(&encoded).unwrap(), byte);
        }
        assert_eq!(Byte::new(12).unwrap().encode(), "'0C'");
    }

    #[test]
    fn test_byte_out_of_range() {
        assert!(matches!(
            Byte::new(256),
            Err(GeoComError::OutOfRange { value: 256, .. })
        ));
        assert!(matches!(Byte::new(-1), Err(GeoComError::OutOfRange { .. })));
    }

    #[test]
    fn test_byte_parse_case_insensitive() {
        assert_eq!(Byte::parse("'2f'").unwrap().value(), 0x2F);
        assert_eq!(Byte::parse("'2F'").unwrap().value(), 0x2F);
        assert!(Byte::parse("2F").is_err());
        assert!(Byte::parse("'GG'").is_err());
    }

    #[test]
    fn test_float_encoding_keeps_fractional_digit() {
        assert_eq!(encode_float(1.0, 15), "1.0");
        assert_eq!(encode_float(-2.0, 6), "-2.0");
        assert_eq!(encode_float(0.0, 15), "0.0");
        // Precision zero still keeps one digit.
        assert_eq!(encode_float(3.0, 0), "3.0");
    }

    #[test]
    fn test_float_encoding_trims_trailing_zeros() {
        assert_eq!(encode_float(1.5, 15), "1.5");
        assert_eq!(encode_float(0.25, 6), "0.25");
        assert_eq!(encode_float(3.141592653589793, 4), "3.1416");
    }

    #[test]
    fn test_param_encoding() {
        assert_eq!(Param::from(42i64).encode(15), "42");
        assert_eq!(Param::from(true).encode(15), "1");
        assert_eq!(Param::from(false).encode(15), "0");
        assert_eq!(Param::from("A42").encode(15), "\"A42\"");
        assert_eq!(Param::Byte(Byte::from(0x0C)).encode(15), "'0C'");
        assert_eq!(Param::from_enum(OnOff::On).encode(15), "1");
        assert_eq!(
            Param::from(Angle::from_radians(1.5)).encode(15),
            "1.5"
        );
    }

    #[test]
    fn test_field_parsing() {
        assert_eq!(
            FieldKind::Int.parse("1996").unwrap(),
            FieldValue::Int(1996)
        );
        assert_eq!(FieldKind::Bool.parse("0").unwrap(), FieldValue::Bool(false));
        assert_eq!(FieldKind::Bool.parse("7").unwrap(), FieldValue::Bool(true));
        assert_eq!(
            FieldKind::Str.parse("\"TCRA1105\"").unwrap(),
            FieldValue::Str("TCRA1105".to_string())
        );
        assert_eq!(
            FieldKind::Byte.parse("'2f'").unwrap().as_byte(),
            Some(0x2F)
        );
        let angle = FieldKind::Angle.parse("1.570796").unwrap();
        assert!((angle.as_angle().unwrap().radians() - 1.570796).abs() < 1e-12);
    }

    #[test]
    fn test_field_parsing_failures() {
        assert!(FieldKind::Int.parse("1.5").is_err());
        assert!(FieldKind::Bool.parse("yes").is_err());
        assert!(FieldKind::Str.parse("bare").is_err());
        assert!(FieldKind::Byte.parse("\"0C\"").is_err());
        assert!(FieldKind::Float.parse("'2F'").is_err());
    }

    #[test]
    fn test_enum_lookup() {
        let field = FieldValue::Int(1);
        assert_eq!(field.as_enum::<OnOff>().unwrap(), OnOff::On);

        let field = FieldValue::Int(9);
        assert!(matches!(
            field.as_enum::<OnOff>(),
            Err(GeoComError::InvalidEnumValue { value: 9 })
        ));
    }

    #[test]
    fn test_velocity_clamp() {
        assert_eq!(clamped_velocity(0.5), 0.5);
        assert_eq!(clamped_velocity(2.0), MAX_MOTOR_VELOCITY);
        assert_eq!(clamped_velocity(-2.0), -MAX_MOTOR_VELOCITY);
    }
}
