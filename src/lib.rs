//! glucolog — local storage and analysis for personal blood-glucose data
//!
//! The crate is the data core of a single-user glucose tracker: readings
//! are persisted in an embedded SQLite database, threshold settings carry
//! change notification, and summary metrics (average, estimated A1C,
//! time-in-range) are pure functions over a reading set. Records from
//! platform health APIs come in through the [`import::HealthSource`] seam
//! and are deduplicated against what is already stored.
//!
//! UI rendering, chart drawing, and the platform API bindings themselves
//! live outside this crate.

pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod metrics;
pub mod reading;
pub mod settings;
pub mod store;
pub mod units;

pub use error::GlucologError;
pub use import::{ExternalSample, HealthImporter, HealthSource, ImportSummary};
pub use metrics::{A1cStatus, RangePercentages, TimeFrame};
pub use reading::{NewReading, Reading, Source};
pub use settings::{BloodGlucoseRanges, RangesUpdate, SettingsStore};
pub use store::ReadingStore;
pub use units::{GlucoseRange, GlucoseUnit};
