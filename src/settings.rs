//! Persisted threshold settings with change notification
//!
//! Settings live in a small key-value table: the threshold configuration is
//! one JSON-encoded row, the external-sync flag another. Subscribers are
//! invoked synchronously on every successful write, in registration order.

use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::GlucologError;
use crate::units::GlucoseRange;

const RANGES_KEY: &str = "blood_glucose_ranges";
const SYNC_ENABLED_KEY: &str = "health_sync_enabled";

/// Default low threshold in mg/dL
pub const DEFAULT_LOW: f64 = 70.0;
/// Default high threshold in mg/dL
pub const DEFAULT_HIGH: f64 = 180.0;

/// The user's glucose threshold configuration, in mg/dL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodGlucoseRanges {
    pub low: f64,
    pub high: f64,
    /// Override thresholds, effective only while `use_custom_ranges` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_high: Option<f64>,
    #[serde(default)]
    pub use_custom_ranges: bool,
}

impl Default for BloodGlucoseRanges {
    fn default() -> Self {
        Self {
            low: DEFAULT_LOW,
            high: DEFAULT_HIGH,
            custom_low: None,
            custom_high: None,
            use_custom_ranges: false,
        }
    }
}

impl BloodGlucoseRanges {
    /// Low threshold currently in effect
    pub fn effective_low(&self) -> f64 {
        match (self.use_custom_ranges, self.custom_low) {
            (true, Some(low)) => low,
            _ => self.low,
        }
    }

    /// High threshold currently in effect
    pub fn effective_high(&self) -> f64 {
        match (self.use_custom_ranges, self.custom_high) {
            (true, Some(high)) => high,
            _ => self.high,
        }
    }

    /// Classify a mg/dL value against the effective thresholds.
    ///
    /// The low boundary is inclusive on the normal side, the high boundary
    /// exclusive: value == low is Normal, value == high is High.
    pub fn classify(&self, value_mg_dl: f64) -> GlucoseRange {
        if value_mg_dl < self.effective_low() {
            GlucoseRange::Low
        } else if value_mg_dl < self.effective_high() {
            GlucoseRange::Normal
        } else {
            GlucoseRange::High
        }
    }

    fn validate(&self) -> Result<(), GlucologError> {
        let (low, high) = (self.effective_low(), self.effective_high());
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(GlucologError::Validation(format!(
                "low threshold must be below high threshold, got {} / {}",
                low, high
            )));
        }
        Ok(())
    }
}

/// Partial update applied on top of the stored ranges
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangesUpdate {
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub custom_low: Option<f64>,
    pub custom_high: Option<f64>,
    pub use_custom_ranges: Option<bool>,
}

/// Handle returned by `subscribe`, used to remove the listener again
pub type SubscriptionId = u64;

type RangesListener = Box<dyn Fn(&BloodGlucoseRanges)>;

/// SQLite-backed settings store
pub struct SettingsStore {
    conn: Connection,
    subscribers: Vec<(SubscriptionId, RangesListener)>,
    next_subscription: SubscriptionId,
}

impl SettingsStore {
    /// Create or open a settings database at the given path.
    ///
    /// May point at the same file as the reading store; the tables are
    /// disjoint.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GlucologError> {
        let conn = Connection::open(path.as_ref())?;
        Self::init_schema(&conn)?;
        info!("Opened settings store at {}", path.as_ref().display());
        Ok(Self {
            conn,
            subscribers: Vec::new(),
            next_subscription: 0,
        })
    }

    /// Open a transient in-memory settings store, used by tests
    pub fn open_in_memory() -> Result<Self, GlucologError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn,
            subscribers: Vec::new(),
            next_subscription: 0,
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
    }

    fn get_value(&self, key: &str) -> Result<Option<String>, GlucologError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_value(&self, key: &str, value: &str) -> Result<(), GlucologError> {
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Get the stored ranges, or the defaults {70, 180} if none persisted
    pub fn ranges(&self) -> Result<BloodGlucoseRanges, GlucologError> {
        match self.get_value(RANGES_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(BloodGlucoseRanges::default()),
        }
    }

    /// Validate, persist, and announce a full replacement of the ranges
    pub fn set_ranges(&mut self, ranges: BloodGlucoseRanges) -> Result<(), GlucologError> {
        ranges.validate()?;
        let json = serde_json::to_string(&ranges)?;
        self.set_value(RANGES_KEY, &json)?;
        debug!(
            "Thresholds set to {}-{} mg/dL (custom: {})",
            ranges.effective_low(),
            ranges.effective_high(),
            ranges.use_custom_ranges
        );
        self.notify(&ranges);
        Ok(())
    }

    /// Merge a partial update onto the stored ranges, persist, and announce
    pub fn update_ranges(&mut self, update: RangesUpdate) -> Result<(), GlucologError> {
        let mut ranges = self.ranges()?;
        if let Some(low) = update.low {
            ranges.low = low;
        }
        if let Some(high) = update.high {
            ranges.high = high;
        }
        if let Some(custom_low) = update.custom_low {
            ranges.custom_low = Some(custom_low);
        }
        if let Some(custom_high) = update.custom_high {
            ranges.custom_high = Some(custom_high);
        }
        if let Some(use_custom) = update.use_custom_ranges {
            ranges.use_custom_ranges = use_custom;
        }
        self.set_ranges(ranges)
    }

    /// Classify a mg/dL value against the effective stored thresholds
    pub fn range_for_value(&self, value_mg_dl: f64) -> Result<GlucoseRange, GlucologError> {
        Ok(self.ranges()?.classify(value_mg_dl))
    }

    /// Register a listener invoked synchronously after every successful
    /// ranges write. Listeners fire in registration order.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&BloodGlucoseRanges) + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(listener)));
        id
    }

    /// Remove a previously registered listener.
    ///
    /// Returns false when the id was already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    fn notify(&self, ranges: &BloodGlucoseRanges) {
        for (_, listener) in &self.subscribers {
            listener(ranges);
        }
    }

    /// Whether import from external health platforms is enabled
    pub fn sync_enabled(&self) -> Result<bool, GlucologError> {
        Ok(self
            .get_value(SYNC_ENABLED_KEY)?
            .map(|v| v == "true")
            .unwrap_or(false))
    }

    pub fn set_sync_enabled(&mut self, enabled: bool) -> Result<(), GlucologError> {
        self.set_value(SYNC_ENABLED_KEY, if enabled { "true" } else { "false" })
    }
}
