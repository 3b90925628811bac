//! The canonical glucose reading record and its provenance tag

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::units::GlucoseUnit;

/// Where a reading came from.
///
/// The provenance decides edit and overwrite policy: manual entries are
/// user-authored and must never be replaced by imported data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Source {
    ManualEntry,
    AppleHealth,
    GoogleFit,
    Other(String),
}

impl Source {
    /// Provenance name as stored in the database
    pub fn as_str(&self) -> &str {
        match self {
            Source::ManualEntry => "Manual Entry",
            Source::AppleHealth => "Apple Health",
            Source::GoogleFit => "Google Fit",
            Source::Other(name) => name,
        }
    }

    /// Manual entries may be edited and are protected from import overwrites.
    pub fn is_user_authored(&self) -> bool {
        matches!(self, Source::ManualEntry)
    }
}

impl From<String> for Source {
    fn from(name: String) -> Self {
        match name.as_str() {
            "Manual Entry" => Source::ManualEntry,
            "Apple Health" => Source::AppleHealth,
            "Google Fit" => Source::GoogleFit,
            _ => Source::Other(name),
        }
    }
}

impl From<Source> for String {
    fn from(source: Source) -> Self {
        source.as_str().to_string()
    }
}

/// A stored glucose reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Opaque unique identifier, assigned by the store at insert time
    pub id: String,
    /// Measured value, interpreted per `unit`
    pub value: f64,
    pub unit: GlucoseUnit,
    /// Moment of measurement, independent of insertion order
    pub timestamp: DateTime<Utc>,
    pub source: Source,
    pub notes: Option<String>,
}

impl Reading {
    /// Value normalized to mg/dL regardless of the stored unit
    pub fn value_mg_dl(&self) -> f64 {
        self.unit.to_mg_dl(self.value)
    }
}

/// A reading as supplied by the caller, before an id is assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReading {
    pub value: f64,
    pub unit: GlucoseUnit,
    pub timestamp: DateTime<Utc>,
    pub source: Source,
    pub notes: Option<String>,
}

impl NewReading {
    /// Convenience constructor for a manual entry in mg/dL
    pub fn manual(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            value,
            unit: GlucoseUnit::MgDl,
            timestamp,
            source: Source::ManualEntry,
            notes: None,
        }
    }

    /// Attach a free-text note
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Assign a fresh id, producing the record the store persists.
    pub(crate) fn into_reading(self) -> Reading {
        Reading {
            id: Uuid::new_v4().to_string(),
            value: self.value,
            unit: self.unit,
            timestamp: self.timestamp,
            source: self.source,
            notes: self.notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_source_name_round_trip() {
        for source in [
            Source::ManualEntry,
            Source::AppleHealth,
            Source::GoogleFit,
            Source::Other("Dexcom".to_string()),
        ] {
            assert_eq!(Source::from(source.as_str().to_string()), source);
        }
    }

    #[test]
    fn test_only_manual_entries_are_user_authored() {
        assert!(Source::ManualEntry.is_user_authored());
        assert!(!Source::AppleHealth.is_user_authored());
        assert!(!Source::Other("Dexcom".to_string()).is_user_authored());
    }

    #[test]
    fn test_value_mg_dl_normalizes_mmol() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap();
        let reading = NewReading {
            value: 10.0,
            unit: GlucoseUnit::MmolL,
            timestamp: ts,
            source: Source::AppleHealth,
            notes: None,
        }
        .into_reading();
        assert_eq!(reading.value_mg_dl(), 180.0);
        assert!(!reading.id.is_empty());
    }
}
