//! Import of readings from external health platforms
//!
//! Platform bindings (HealthKit, Google Fit) live outside this crate and
//! implement `HealthSource`. The importer normalizes units, collapses
//! near-simultaneous duplicates into 5-minute buckets, and never replaces
//! user-authored readings with imported data.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;

use crate::error::GlucologError;
use crate::reading::{NewReading, Source};
use crate::store::ReadingStore;
use crate::units::GlucoseUnit;

/// Width of the deduplication time bucket in milliseconds
const DEDUP_BUCKET_MS: i64 = 5 * 60 * 1000;

/// A raw sample as handed over by a platform health-API binding
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalSample {
    pub value: f64,
    pub unit: GlucoseUnit,
    pub timestamp: DateTime<Utc>,
}

/// Seam implemented by platform health-API bindings
pub trait HealthSource {
    /// Provenance recorded on readings imported from this source
    fn source(&self) -> Source;

    /// Timestamp of the oldest sample the platform holds, `None` when the
    /// platform has no glucose data at all
    fn oldest_sample_time(&mut self) -> Result<Option<DateTime<Utc>>, GlucologError>;

    /// Samples with timestamps inside the inclusive window
    fn samples(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ExternalSample>, GlucologError>;
}

/// Outcome of one import run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    /// Records retrieved from the platform
    pub fetched: usize,
    /// New readings written to the store
    pub imported: usize,
    /// Records skipped because an imported reading already covers them
    pub duplicates: usize,
    /// Records skipped because they collide with a manual entry
    pub user_skipped: usize,
    /// The platform reported no glucose data at all
    pub no_data: bool,
}

/// Key collapsing near-simultaneous readings of the same value: a 5-minute
/// time bucket combined with the mg/dL value.
fn bucket_key(timestamp: DateTime<Utc>, value_mg_dl: f64) -> (i64, i64) {
    (
        timestamp.timestamp_millis().div_euclid(DEDUP_BUCKET_MS),
        value_mg_dl.round() as i64,
    )
}

/// Imports external samples into a reading store
pub struct HealthImporter<'a> {
    store: &'a ReadingStore,
}

impl<'a> HealthImporter<'a> {
    pub fn new(store: &'a ReadingStore) -> Self {
        Self { store }
    }

    /// Import the given window from `source` into the store
    pub fn import<S: HealthSource>(
        &self,
        source: &mut S,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ImportSummary, GlucologError> {
        self.import_with_progress(source, start, end, |_, _| {})
    }

    /// Import, invoking `progress(done, total)` after every record so a
    /// long-running import stays observable
    pub fn import_with_progress<S, F>(
        &self,
        source: &mut S,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        mut progress: F,
    ) -> Result<ImportSummary, GlucologError>
    where
        S: HealthSource,
        F: FnMut(usize, usize),
    {
        let source_tag = source.source();

        // An empty platform is a normal outcome, not an error
        let oldest = match source.oldest_sample_time() {
            Ok(Some(oldest)) => oldest,
            Ok(None) => {
                info!("{} holds no glucose data", source_tag.as_str());
                return Ok(ImportSummary {
                    no_data: true,
                    ..ImportSummary::default()
                });
            }
            Err(e) => {
                warn!(
                    "Could not query oldest sample from {}: {}",
                    source_tag.as_str(),
                    e
                );
                return Err(e);
            }
        };

        // No point requesting records older than the platform holds
        let start = start.max(oldest);
        let samples = match source.samples(start, end) {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Fetch from {} failed: {}", source_tag.as_str(), e);
                return Err(e);
            }
        };

        // Dedup index over everything already stored: bucket -> user-authored?
        let mut seen: HashMap<(i64, i64), bool> = HashMap::new();
        for existing in self.store.get_all_readings()? {
            let key = bucket_key(existing.timestamp, existing.value_mg_dl());
            let user_authored = existing.source.is_user_authored();
            // A manual entry in the bucket always wins over an imported one
            seen.entry(key)
                .and_modify(|v| *v = *v || user_authored)
                .or_insert(user_authored);
        }

        let mut summary = ImportSummary {
            fetched: samples.len(),
            ..ImportSummary::default()
        };

        for (idx, sample) in samples.iter().enumerate() {
            let value_mg_dl = sample.unit.to_mg_dl(sample.value);
            let key = bucket_key(sample.timestamp, value_mg_dl);

            match seen.get(&key) {
                Some(true) => {
                    // Never overwrite or duplicate user-authored data
                    summary.user_skipped += 1;
                }
                Some(false) => {
                    summary.duplicates += 1;
                }
                None => {
                    let new = NewReading {
                        value: value_mg_dl,
                        unit: GlucoseUnit::MgDl,
                        timestamp: sample.timestamp,
                        source: source_tag.clone(),
                        notes: None,
                    };
                    if let Err(e) = self.store.add_reading(new) {
                        // Report how far we got instead of discarding progress
                        return Err(GlucologError::Import {
                            message: e.to_string(),
                            imported: summary.imported,
                            fetched: summary.fetched,
                        });
                    }
                    seen.insert(key, false);
                    summary.imported += 1;
                }
            }
            progress(idx + 1, samples.len());
        }

        info!(
            "Import from {}: {} fetched, {} new, {} duplicates, {} user entries kept",
            source_tag.as_str(),
            summary.fetched,
            summary.imported,
            summary.duplicates,
            summary.user_skipped
        );
        debug!("Import window: {} to {}", start, end);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::NewReading;
    use chrono::TimeZone;

    struct FakeHealth {
        source: Source,
        oldest: Option<DateTime<Utc>>,
        samples: Vec<ExternalSample>,
    }

    impl FakeHealth {
        fn with_samples(samples: Vec<ExternalSample>) -> Self {
            let oldest = samples.iter().map(|s| s.timestamp).min();
            Self {
                source: Source::AppleHealth,
                oldest,
                samples,
            }
        }
    }

    impl HealthSource for FakeHealth {
        fn source(&self) -> Source {
            self.source.clone()
        }

        fn oldest_sample_time(&mut self) -> Result<Option<DateTime<Utc>>, GlucologError> {
            Ok(self.oldest)
        }

        fn samples(
            &mut self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<ExternalSample>, GlucologError> {
            Ok(self
                .samples
                .iter()
                .filter(|s| s.timestamp >= start && s.timestamp <= end)
                .cloned()
                .collect())
        }
    }

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, hour, minute, 0).unwrap()
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (ts(0, 0), ts(23, 59))
    }

    fn sample(value: f64, hour: u32, minute: u32) -> ExternalSample {
        ExternalSample {
            value,
            unit: GlucoseUnit::MgDl,
            timestamp: ts(hour, minute),
        }
    }

    #[test]
    fn test_imports_new_samples() {
        let store = ReadingStore::open_in_memory().unwrap();
        let mut source =
            FakeHealth::with_samples(vec![sample(120.0, 8, 0), sample(140.0, 12, 0)]);
        let (start, end) = window();

        let summary = HealthImporter::new(&store)
            .import(&mut source, start, end)
            .unwrap();

        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.imported, 2);
        assert_eq!(summary.duplicates, 0);
        assert_eq!(store.count().unwrap(), 2);

        let stored = store.get_all_readings().unwrap();
        assert!(stored.iter().all(|r| r.source == Source::AppleHealth));
    }

    #[test]
    fn test_importing_twice_stores_once() {
        let store = ReadingStore::open_in_memory().unwrap();
        let mut source = FakeHealth::with_samples(vec![sample(120.0, 8, 0)]);
        let importer = HealthImporter::new(&store);
        let (start, end) = window();

        importer.import(&mut source, start, end).unwrap();
        let second = importer.import(&mut source, start, end).unwrap();

        assert_eq!(second.imported, 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_manual_entry_is_never_touched() {
        let store = ReadingStore::open_in_memory().unwrap();
        let manual = store
            .add_reading(NewReading::manual(120.0, ts(8, 2)))
            .unwrap();

        // Same value two minutes away: lands in the same 5-minute bucket
        let mut source = FakeHealth::with_samples(vec![sample(120.0, 8, 0)]);
        let (start, end) = window();
        let summary = HealthImporter::new(&store)
            .import(&mut source, start, end)
            .unwrap();

        assert_eq!(summary.user_skipped, 1);
        assert_eq!(summary.imported, 0);
        assert_eq!(store.count().unwrap(), 1);
        let kept = store.get_reading_by_id(&manual.id).unwrap().unwrap();
        assert_eq!(kept, manual);
    }

    #[test]
    fn test_mmol_samples_convert_to_mg_dl() {
        let store = ReadingStore::open_in_memory().unwrap();
        let mut source = FakeHealth::with_samples(vec![ExternalSample {
            value: 10.0,
            unit: GlucoseUnit::MmolL,
            timestamp: ts(8, 0),
        }]);
        let (start, end) = window();

        HealthImporter::new(&store)
            .import(&mut source, start, end)
            .unwrap();

        let stored = &store.get_all_readings().unwrap()[0];
        // 10.0 mmol/L * 18.0182 rounds to 180 mg/dL
        assert_eq!(stored.value, 180.0);
        assert_eq!(stored.unit, GlucoseUnit::MgDl);
    }

    #[test]
    fn test_empty_platform_reports_no_data() {
        let store = ReadingStore::open_in_memory().unwrap();
        let mut source = FakeHealth::with_samples(Vec::new());
        let (start, end) = window();

        let summary = HealthImporter::new(&store)
            .import(&mut source, start, end)
            .unwrap();

        assert!(summary.no_data);
        assert_eq!(summary.fetched, 0);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_window_is_bounded_by_oldest_sample() {
        let store = ReadingStore::open_in_memory().unwrap();
        let mut source = FakeHealth::with_samples(vec![sample(120.0, 8, 0)]);
        // Platform says nothing exists before 08:00; ask from midnight anyway
        let summary = HealthImporter::new(&store)
            .import(&mut source, ts(0, 0), ts(23, 59))
            .unwrap();
        assert_eq!(summary.imported, 1);
    }

    #[test]
    fn test_progress_reported_per_record() {
        let store = ReadingStore::open_in_memory().unwrap();
        let mut source = FakeHealth::with_samples(vec![
            sample(100.0, 6, 0),
            sample(120.0, 12, 0),
            sample(140.0, 18, 0),
        ]);
        let (start, end) = window();

        let mut calls = Vec::new();
        HealthImporter::new(&store)
            .import_with_progress(&mut source, start, end, |done, total| {
                calls.push((done, total))
            })
            .unwrap();

        assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_permission_error_propagates() {
        struct Denied;
        impl HealthSource for Denied {
            fn source(&self) -> Source {
                Source::GoogleFit
            }
            fn oldest_sample_time(&mut self) -> Result<Option<DateTime<Utc>>, GlucologError> {
                Err(GlucologError::Permission(
                    "blood glucose read scope not granted".to_string(),
                ))
            }
            fn samples(
                &mut self,
                _start: DateTime<Utc>,
                _end: DateTime<Utc>,
            ) -> Result<Vec<ExternalSample>, GlucologError> {
                unreachable!()
            }
        }

        let store = ReadingStore::open_in_memory().unwrap();
        let (start, end) = window();
        let result = HealthImporter::new(&store).import(&mut Denied, start, end);
        assert!(matches!(result, Err(GlucologError::Permission(_))));
    }

    #[test]
    fn test_distinct_values_in_same_bucket_both_import() {
        let store = ReadingStore::open_in_memory().unwrap();
        let mut source =
            FakeHealth::with_samples(vec![sample(120.0, 8, 0), sample(125.0, 8, 1)]);
        let (start, end) = window();

        let summary = HealthImporter::new(&store)
            .import(&mut source, start, end)
            .unwrap();

        // Same bucket, different values: not duplicates of each other
        assert_eq!(summary.imported, 2);
    }
}
