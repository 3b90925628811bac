//! Glucose unit types, conversion, and range classification
//!
//! Readings carry an explicit unit. Thresholds and derived metrics are
//! expressed in mg/dL, so mmol/L values are normalized with the fixed
//! factor below before any comparison or aggregation.

use serde::{Deserialize, Serialize};

/// Conversion factor from mmol/L to mg/dL.
pub const MMOL_PER_L_TO_MG_PER_DL: f64 = 18.0182;

/// Measurement unit of a glucose value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GlucoseUnit {
    #[serde(rename = "mg/dL")]
    #[default]
    MgDl,
    #[serde(rename = "mmol/L")]
    MmolL,
}

impl GlucoseUnit {
    /// Normalize a value in this unit to mg/dL.
    ///
    /// mmol/L values are converted with the fixed factor and rounded to the
    /// nearest integer, matching how external platform records are stored.
    pub fn to_mg_dl(self, value: f64) -> f64 {
        match self {
            GlucoseUnit::MgDl => value,
            GlucoseUnit::MmolL => (value * MMOL_PER_L_TO_MG_PER_DL).round(),
        }
    }

    /// Format a value with unit suffix
    pub fn format(self, value: f64) -> String {
        match self {
            GlucoseUnit::MgDl => format!("{:.0} mg/dL", value),
            GlucoseUnit::MmolL => format!("{:.1} mmol/L", value),
        }
    }

    /// Get the unit label
    pub fn label(self) -> &'static str {
        match self {
            GlucoseUnit::MgDl => "mg/dL",
            GlucoseUnit::MmolL => "mmol/L",
        }
    }

    /// Parse a unit label as stored in the database
    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "mg/dL" => Some(GlucoseUnit::MgDl),
            "mmol/L" => Some(GlucoseUnit::MmolL),
            _ => None,
        }
    }
}

/// Classification of a glucose value against the active thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlucoseRange {
    Low,    // below the low threshold
    Normal, // low threshold (inclusive) to high threshold (exclusive)
    High,   // high threshold and above
}

impl GlucoseRange {
    /// Get a display label for the range
    pub fn label(self) -> &'static str {
        match self {
            GlucoseRange::Low => "Low",
            GlucoseRange::Normal => "Normal",
            GlucoseRange::High => "High",
        }
    }
}
