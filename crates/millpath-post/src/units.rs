//! Output units.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PostError, Result};

/// Millimeters per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// Linear units of the emitted program. Toolpaths are always in mm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    /// Metric output (G21).
    #[default]
    Millimeters,
    /// Imperial output (G20).
    Inches,
}

impl Units {
    /// Convert a millimeter value into these units.
    pub fn to_units(self, mm: f64) -> f64 {
        match self {
            Units::Millimeters => mm,
            Units::Inches => mm / MM_PER_INCH,
        }
    }

    /// Parse a unit name such as `mm`, `metric`, `in` or `inches`.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mm" | "millimeter" | "millimeters" | "metric" => Ok(Units::Millimeters),
            "in" | "inch" | "inches" | "imperial" => Ok(Units::Inches),
            _ => Err(PostError::UnknownUnits(name.to_string())),
        }
    }

    /// Modal unit code.
    pub fn code(self) -> &'static str {
        match self {
            Units::Millimeters => "G21",
            Units::Inches => "G20",
        }
    }

    /// Feed rate suffix used in comments.
    pub fn feed_suffix(self) -> &'static str {
        match self {
            Units::Millimeters => "mm/min",
            Units::Inches => "in/min",
        }
    }

    /// Program keyword for conversational controls.
    pub fn keyword(self) -> &'static str {
        match self {
            Units::Millimeters => "MM",
            Units::Inches => "INCH",
        }
    }
}

impl FromStr for Units {
    type Err = PostError;

    fn from_str(s: &str) -> Result<Self> {
        Units::parse(s)
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Units::Millimeters => "mm",
            Units::Inches => "inches",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_to_units() {
        assert_eq!(Units::Millimeters.to_units(12.5), 12.5);
        assert_relative_eq!(Units::Inches.to_units(25.4), 1.0);
    }

    #[test]
    fn test_parse() {
        assert_eq!("MM".parse::<Units>(), Ok(Units::Millimeters));
        assert_eq!(Units::parse(" inches "), Ok(Units::Inches));
        assert_eq!(
            Units::parse("cubits"),
            Err(PostError::UnknownUnits("cubits".into()))
        );
    }
}
