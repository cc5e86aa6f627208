//! # Angle Representation and Presentation Conversions
//!
//! Instruments exchange every angle in radians; everything else is
//! presentation. [`Angle`] is a radian newtype with conversions to and
//! from the units surveyors actually read: degrees, gon (400 per circle),
//! NATO mils (6400 per circle), arcseconds, sexagesimal DMS, the packed
//! `DDD.MMSS` pseudo-degree format some instrument displays use, and the
//! NMEA `DDDMM.mmmm` packing.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An angle, stored in radians
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Angle(f64);

impl Angle {
    pub const ZERO: Angle = Angle(0.0);
    /// Full circle (2π)
    pub const FULL: Angle = Angle(2.0 * PI);

    pub fn from_radians(rad: f64) -> Self {
        Angle(rad)
    }

    pub fn radians(self) -> f64 {
        self.0
    }

    pub fn from_degrees(deg: f64) -> Self {
        Angle(deg * PI / 180.0)
    }

    pub fn degrees(self) -> f64 {
        self.0 * 180.0 / PI
    }

    /// Gradians, 400 per full circle
    pub fn from_gon(gon: f64) -> Self {
        Angle(gon * PI / 200.0)
    }

    pub fn gon(self) -> f64 {
        self.0 * 200.0 / PI
    }

    /// NATO mils, 6400 per full circle
    pub fn from_mils(mils: f64) -> Self {
        Angle(mils * PI / 3200.0)
    }

    pub fn mils(self) -> f64 {
        self.0 * 3200.0 / PI
    }

    pub fn from_arcseconds(sec: f64) -> Self {
        Angle::from_degrees(sec / 3600.0)
    }

    pub fn arcseconds(self) -> f64 {
        self.degrees() * 3600.0
    }

    /// Degrees, minutes and decimal seconds
    ///
    /// The sign rides on the degrees component; minutes and seconds are
    /// magnitudes.
    pub fn dms(self) -> (i32, u32, f64) {
        let negative = self.0 < 0.0;
        let total = self.degrees().abs();
        let d = total.trunc();
        let rem = (total - d) * 60.0;
        let m = rem.trunc();
        let s = (rem - m) * 60.0;
        let d = if negative { -(d as i32) } else { d as i32 };
        (d, m as u32, s)
    }

    pub fn from_dms(deg: i32, min: u32, sec: f64) -> Self {
        let magnitude = deg.unsigned_abs() as f64 + min as f64 / 60.0 + sec / 3600.0;
        let signed = if deg < 0 { -magnitude } else { magnitude };
        Angle::from_degrees(signed)
    }

    /// Display string in `DDD-MM-SS.ss` form
    pub fn to_dms_string(self) -> String {
        let (d, m, s) = self.dms();
        format!("{}-{:02}-{:05.2}", d, m, s)
    }

    /// Packed pseudo-degrees (`DDD.MMSS`), the compact display format on
    /// older instrument panels
    pub fn pseudo_degrees(self) -> f64 {
        let (d, m, s) = self.dms();
        let packed = d.unsigned_abs() as f64 + m as f64 / 100.0 + s / 10_000.0;
        if d < 0 || self.0 < 0.0 {
            -packed
        } else {
            packed
        }
    }

    pub fn from_pseudo_degrees(value: f64) -> Self {
        let negative = value < 0.0;
        let value = value.abs();
        let d = value.trunc();
        let frac = (value - d) * 100.0;
        let m = frac.trunc();
        let s = (frac - m) * 100.0;
        let deg = d + m / 60.0 + s / 3600.0;
        Angle::from_degrees(if negative { -deg } else { deg })
    }

    /// NMEA packed degrees (`DDDMM.mmmm`)
    pub fn nmea_degrees(self) -> f64 {
        let negative = self.0 < 0.0;
        let total = self.degrees().abs();
        let d = total.trunc();
        let m = (total - d) * 60.0;
        let packed = d * 100.0 + m;
        if negative {
            -packed
        } else {
            packed
        }
    }

    pub fn from_nmea_degrees(value: f64) -> Self {
        let negative = value < 0.0;
        let value = value.abs();
        let d = (value / 100.0).trunc();
        let m = value - d * 100.0;
        let deg = d + m / 60.0;
        Angle::from_degrees(if negative { -deg } else { deg })
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rad", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_degree_conversion() {
        assert!(close(Angle::from_degrees(180.0).radians(), PI));
        assert!(close(Angle::from_radians(PI / 2.0).degrees(), 90.0));
    }

    #[test]
    fn test_gon_conversion() {
        assert!(close(Angle::from_gon(200.0).radians(), PI));
        assert!(close(Angle::from_degrees(90.0).gon(), 100.0));
    }

    #[test]
    fn test_mils_conversion() {
        assert!(close(Angle::from_mils(3200.0).radians(), PI));
        assert!(close(Angle::from_degrees(90.0).mils(), 1600.0));
    }

    #[test]
    fn test_arcseconds() {
        assert!(close(Angle::from_arcseconds(3600.0).degrees(), 1.0));
        assert!(close(Angle::from_degrees(0.5).arcseconds(), 1800.0));
    }

    #[test]
    fn test_dms_round_trip() {
        let a = Angle::from_dms(123, 45, 50.0);
        let (d, m, s) = a.dms();
        assert_eq!(d, 123);
        assert_eq!(m, 45);
        assert!((s - 50.0).abs() < 1e-6);

        let neg = Angle::from_dms(-10, 30, 0.0);
        assert!(close(neg.degrees(), -10.5));
        let (d, m, _) = neg.dms();
        assert_eq!(d, -10);
        assert_eq!(m, 30);
    }

    #[test]
    fn test_dms_string() {
        let a = Angle::from_dms(123, 45, 50.0);
        assert_eq!(a.to_dms_string(), "123-45-50.00");
        assert_eq!(Angle::ZERO.to_dms_string(), "0-00-00.00");
    }

    #[test]
    fn test_pseudo_degrees() {
        let a = Angle::from_pseudo_degrees(123.4550);
        assert!(close(a.degrees(), 123.0 + 45.0 / 60.0 + 50.0 / 3600.0));
        assert!((a.pseudo_degrees() - 123.4550).abs() < 1e-6);
    }

    #[test]
    fn test_nmea_degrees() {
        // 4807.038 is 48 degrees 7.038 minutes.
        let a = Angle::from_nmea_degrees(4807.038);
        assert!(close(a.degrees(), 48.0 + 7.038 / 60.0));
        assert!((a.nmea_degrees() - 4807.038).abs() < 1e-6);
    }
}
