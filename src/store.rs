//! SQLite storage for glucose readings
//!
//! One table, one connection. Schema creation is idempotent so opening an
//! existing database is always safe.

use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{params, Connection};
use std::path::Path;

use crate::error::GlucologError;
use crate::reading::{NewReading, Reading, Source};
use crate::units::GlucoseUnit;

/// SQLite-backed store for readings
pub struct ReadingStore {
    conn: Connection,
}

impl ReadingStore {
    /// Create or open a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GlucologError> {
        let conn = Connection::open(path.as_ref())?;
        Self::init_schema(&conn)?;
        info!("Opened reading store at {}", path.as_ref().display());
        Ok(Self { conn })
    }

    /// Open a transient in-memory database, used by tests
    pub fn open_in_memory() -> Result<Self, GlucologError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS readings (
                id TEXT PRIMARY KEY,
                value REAL NOT NULL,
                unit TEXT NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                source TEXT NOT NULL,
                notes TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_readings_timestamp
                ON readings(timestamp_ms);",
        )
    }

    /// Validate and insert a new reading, returning it with its assigned id
    pub fn add_reading(&self, new: NewReading) -> Result<Reading, GlucologError> {
        if !new.value.is_finite() || new.value <= 0.0 {
            return Err(GlucologError::Validation(format!(
                "glucose value must be a positive number, got {}",
                new.value
            )));
        }

        let reading = new.into_reading();
        self.conn.execute(
            "INSERT INTO readings (id, value, unit, timestamp_ms, source, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                reading.id,
                reading.value,
                reading.unit.label(),
                reading.timestamp.timestamp_millis(),
                reading.source.as_str(),
                reading.notes,
            ],
        )?;

        debug!(
            "Stored reading {} ({} at {})",
            reading.id,
            reading.unit.format(reading.value),
            reading.timestamp
        );
        Ok(reading)
    }

    /// Get all readings, most recent first
    pub fn get_all_readings(&self) -> Result<Vec<Reading>, GlucologError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, value, unit, timestamp_ms, source, notes
             FROM readings ORDER BY timestamp_ms DESC",
        )?;

        let readings = stmt
            .query_map([], Self::row_to_reading)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    /// Get readings with timestamps in the inclusive range, most recent first
    pub fn get_readings_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, GlucologError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, value, unit, timestamp_ms, source, notes
             FROM readings
             WHERE timestamp_ms BETWEEN ?1 AND ?2
             ORDER BY timestamp_ms DESC",
        )?;

        let readings = stmt
            .query_map(
                params![start.timestamp_millis(), end.timestamp_millis()],
                Self::row_to_reading,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    /// Look up a single reading by id
    pub fn get_reading_by_id(&self, id: &str) -> Result<Option<Reading>, GlucologError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, value, unit, timestamp_ms, source, notes
             FROM readings WHERE id = ?1",
        )?;

        match stmt.query_row(params![id], Self::row_to_reading) {
            Ok(reading) => Ok(Some(reading)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite an existing reading, keyed by its id.
    ///
    /// Fails with `NotFound` when the id does not exist.
    pub fn update_reading(&self, reading: &Reading) -> Result<(), GlucologError> {
        if !reading.value.is_finite() || reading.value <= 0.0 {
            return Err(GlucologError::Validation(format!(
                "glucose value must be a positive number, got {}",
                reading.value
            )));
        }

        let updated = self.conn.execute(
            "UPDATE readings SET value = ?1, unit = ?2, timestamp_ms = ?3, source = ?4, notes = ?5
             WHERE id = ?6",
            params![
                reading.value,
                reading.unit.label(),
                reading.timestamp.timestamp_millis(),
                reading.source.as_str(),
                reading.notes,
                reading.id,
            ],
        )?;

        if updated == 0 {
            return Err(GlucologError::NotFound(reading.id.clone()));
        }
        Ok(())
    }

    /// Delete a single reading by id.
    ///
    /// Fails with `NotFound` when the id does not exist.
    pub fn delete_reading(&self, id: &str) -> Result<(), GlucologError> {
        let deleted = self
            .conn
            .execute("DELETE FROM readings WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(GlucologError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Delete every reading, returning the number removed.
    ///
    /// Safe to call on an already-empty store.
    pub fn delete_all_readings(&self) -> Result<usize, GlucologError> {
        let deleted = self.conn.execute("DELETE FROM readings", [])?;
        info!("Deleted all readings ({} rows)", deleted);
        Ok(deleted)
    }

    /// Get total reading count
    pub fn count(&self) -> Result<i64, GlucologError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;
        Ok(count)
    }

    fn row_to_reading(row: &rusqlite::Row) -> Result<Reading, rusqlite::Error> {
        let unit_label: String = row.get(2)?;
        let unit = GlucoseUnit::from_label(&unit_label).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown glucose unit {:?}", unit_label).into(),
            )
        })?;

        let timestamp_ms: i64 = row.get(3)?;
        let timestamp = DateTime::<Utc>::from_timestamp_millis(timestamp_ms).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Integer,
                format!("timestamp {} out of range", timestamp_ms).into(),
            )
        })?;

        let source_name: String = row.get(4)?;
        Ok(Reading {
            id: row.get(0)?,
            value: row.get(1)?,
            unit,
            timestamp,
            source: Source::from(source_name),
            notes: row.get(5)?,
        })
    }
}
