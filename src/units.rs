// Traffic unit normalization (binary, base 1024) to megabytes

use std::str::FromStr;

const KIB: f64 = 1024.0;

/// Units vnstat prints in its human-readable output (`B`, `KB`, `MB`, `GB`, `TB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
    Terabytes,
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized traffic unit: {0:?}")]
pub struct UnknownUnit(pub String);

impl FromStr for Unit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "B" => Ok(Unit::Bytes),
            "KB" => Ok(Unit::Kilobytes),
            "MB" => Ok(Unit::Megabytes),
            "GB" => Ok(Unit::Gigabytes),
            "TB" => Ok(Unit::Terabytes),
            _ => Err(UnknownUnit(s.to_string())),
        }
    }
}

impl Unit {
    pub fn to_megabytes(self, value: f64) -> f64 {
        match self {
            Unit::Bytes => value / (KIB * KIB),
            Unit::Kilobytes => value / KIB,
            Unit::Megabytes => value,
            Unit::Gigabytes => value * KIB,
            Unit::Terabytes => value * KIB * KIB,
        }
    }
}

/// Convert `value` expressed in `unit` (case-insensitive) to megabytes.
///
/// An unrecognized unit leaves the value unconverted and logs a warning.
pub fn to_megabytes(value: f64, unit: &str) -> f64 {
    match unit.parse::<Unit>() {
        Ok(u) => u.to_megabytes(value),
        Err(e) => {
            tracing::warn!(error = %e, value, "traffic value left unconverted");
            value
        }
    }
}

/// Round to two decimal places, as exposed on the wire. Exact midpoints go to the
/// even neighbour (131072 B = 0.125 MB becomes 0.12).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
