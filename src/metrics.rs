//! Summary statistics derived from a set of readings
//!
//! Everything here is a pure function of its inputs; nothing touches the
//! store. Values are normalized to mg/dL before aggregation, so mixed-unit
//! reading sets are handled uniformly.
//!
//! Empty-input conventions differ on purpose: `average` and `estimated_a1c`
//! return `None`, while `RangePercentages` returns all zeros. Both are
//! pinned by long-standing display expectations.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::reading::Reading;
use crate::settings::BloodGlucoseRanges;
use crate::units::GlucoseRange;

/// Arithmetic mean of the readings' mg/dL values, `None` when empty
pub fn average(readings: &[Reading]) -> Option<f64> {
    if readings.is_empty() {
        return None;
    }
    let sum: f64 = readings.iter().map(|r| r.value_mg_dl()).sum();
    Some(sum / readings.len() as f64)
}

/// Smallest and largest mg/dL value, `None` when empty
pub fn min_max(readings: &[Reading]) -> Option<(f64, f64)> {
    readings.iter().map(|r| r.value_mg_dl()).fold(None, |acc, v| {
        Some(match acc {
            None => (v, v),
            Some((min, max)) => (min.min(v), max.max(v)),
        })
    })
}

/// Estimated A1C from average glucose, `None` when empty.
///
/// Uses the ADAG linear approximation `(avg + 46.7) / 28.7`, rounded to one
/// decimal place. This is an estimate, not a clinical measurement, and must
/// be labeled as such wherever it is surfaced.
pub fn estimated_a1c(readings: &[Reading]) -> Option<f64> {
    average(readings).map(|avg| ((avg + 46.7) / 28.7 * 10.0).round() / 10.0)
}

/// Clinical interpretation of an estimated A1C value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum A1cStatus {
    Normal,        // < 5.7
    PreDiabetic,   // 5.7 to 6.5
    Diabetic,      // 6.5 to 9.0
    ExtremelyHigh, // >= 9.0
    NotAvailable,
}

impl A1cStatus {
    /// Classify an estimated A1C; boundaries are closed on the lower side
    pub fn from_a1c(a1c: Option<f64>) -> Self {
        match a1c {
            None => A1cStatus::NotAvailable,
            Some(v) if v < 5.7 => A1cStatus::Normal,
            Some(v) if v < 6.5 => A1cStatus::PreDiabetic,
            Some(v) if v < 9.0 => A1cStatus::Diabetic,
            Some(_) => A1cStatus::ExtremelyHigh,
        }
    }

    /// Get a display label for the status
    pub fn label(self) -> &'static str {
        match self {
            A1cStatus::Normal => "Normal",
            A1cStatus::PreDiabetic => "Pre-Diabetic",
            A1cStatus::Diabetic => "Diabetic",
            A1cStatus::ExtremelyHigh => "Extremely High",
            A1cStatus::NotAvailable => "N/A",
        }
    }
}

/// Share of readings below, inside, and above the configured band
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RangePercentages {
    pub low: f64,
    pub in_range: f64,
    pub high: f64,
}

impl RangePercentages {
    /// Classify each reading against the effective thresholds and divide by
    /// the total. All three fields are zero for an empty input.
    pub fn from_readings(readings: &[Reading], ranges: &BloodGlucoseRanges) -> Self {
        if readings.is_empty() {
            return Self::default();
        }

        let mut low = 0usize;
        let mut in_range = 0usize;
        let mut high = 0usize;
        for reading in readings {
            match ranges.classify(reading.value_mg_dl()) {
                GlucoseRange::Low => low += 1,
                GlucoseRange::Normal => in_range += 1,
                GlucoseRange::High => high += 1,
            }
        }

        let total = readings.len() as f64;
        Self {
            low: low as f64 / total * 100.0,
            in_range: in_range as f64 / total * 100.0,
            high: high as f64 / total * 100.0,
        }
    }
}

/// Symbolic time window selectable in the history views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFrame {
    Hours24,
    Days7,
    Days30,
    Months3,
    Months6,
    Months12,
    /// An explicit day count
    Days(u32),
}

impl TimeFrame {
    /// Parse the symbolic tags used by stored view preferences.
    ///
    /// A bare integer is taken as a day count.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "24hours" => Some(TimeFrame::Hours24),
            "7days" => Some(TimeFrame::Days7),
            "30days" => Some(TimeFrame::Days30),
            "3months" => Some(TimeFrame::Months3),
            "6months" => Some(TimeFrame::Months6),
            "12months" => Some(TimeFrame::Months12),
            _ => tag.parse::<u32>().ok().map(TimeFrame::Days),
        }
    }

    /// Start of the window ending at `reference`.
    ///
    /// Month frames subtract 30-day blocks (90/180/360 days) rather than
    /// doing calendar-month arithmetic; stored display expectations depend
    /// on these exact cutoffs.
    pub fn cutoff(self, reference: DateTime<Utc>) -> DateTime<Utc> {
        let span = match self {
            TimeFrame::Hours24 => Duration::hours(24),
            TimeFrame::Days7 => Duration::days(7),
            TimeFrame::Days30 => Duration::days(30),
            TimeFrame::Months3 => Duration::days(90),
            TimeFrame::Months6 => Duration::days(180),
            TimeFrame::Months12 => Duration::days(360),
            TimeFrame::Days(n) => Duration::days(i64::from(n)),
        };
        reference - span
    }
}

/// Per-day aggregate for trend displays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub count: usize,
    pub average: f64,
    pub percentages: RangePercentages,
}

/// Group readings by calendar day (UTC) and aggregate each group.
///
/// Days appear in ascending date order; days without readings are absent.
pub fn daily_summaries(
    readings: &[Reading],
    ranges: &BloodGlucoseRanges,
) -> Vec<DailySummary> {
    let mut by_day: BTreeMap<NaiveDate, Vec<Reading>> = BTreeMap::new();
    for reading in readings {
        by_day
            .entry(reading.timestamp.date_naive())
            .or_default()
            .push(reading.clone());
    }

    by_day
        .into_iter()
        .map(|(date, group)| DailySummary {
            date,
            count: group.len(),
            // Non-empty by construction
            average: average(&group).unwrap_or(0.0),
            percentages: RangePercentages::from_readings(&group, ranges),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::NewReading;
    use chrono::TimeZone;

    fn reading(value: f64, day: u32, hour: u32) -> Reading {
        let ts = Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap();
        Reading {
            id: format!("test-{}-{}-{}", value, day, hour),
            ..NewReading::manual(value, ts).into_reading()
        }
    }

    #[test]
    fn test_average_of_empty_is_none() {
        assert_eq!(average(&[]), None);
        assert_eq!(estimated_a1c(&[]), None);
        assert_eq!(min_max(&[]), None);
    }

    #[test]
    fn test_average_and_a1c_scenario() {
        // 120 and 150 two hours apart: avg 135, a1c 6.3, status Diabetic
        let readings = vec![reading(120.0, 20, 10), reading(150.0, 20, 12)];
        assert_eq!(average(&readings), Some(135.0));
        assert_eq!(estimated_a1c(&readings), Some(6.3));
        assert_eq!(
            A1cStatus::from_a1c(estimated_a1c(&readings)),
            A1cStatus::Diabetic
        );
    }

    #[test]
    fn test_a1c_rounds_to_one_decimal() {
        let readings = vec![reading(100.0, 20, 10)];
        // (100 + 46.7) / 28.7 = 5.1115... -> 5.1
        assert_eq!(estimated_a1c(&readings), Some(5.1));
    }

    #[test]
    fn test_a1c_status_boundaries() {
        assert_eq!(A1cStatus::from_a1c(Some(5.6)), A1cStatus::Normal);
        assert_eq!(A1cStatus::from_a1c(Some(5.7)), A1cStatus::PreDiabetic);
        assert_eq!(A1cStatus::from_a1c(Some(6.5)), A1cStatus::Diabetic);
        assert_eq!(A1cStatus::from_a1c(Some(9.0)), A1cStatus::ExtremelyHigh);
        assert_eq!(A1cStatus::from_a1c(None), A1cStatus::NotAvailable);
    }

    #[test]
    fn test_min_max() {
        let readings = vec![
            reading(150.0, 20, 8),
            reading(90.0, 20, 12),
            reading(200.0, 20, 18),
        ];
        assert_eq!(min_max(&readings), Some((90.0, 200.0)));
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let ranges = BloodGlucoseRanges::default();
        let readings = vec![
            reading(60.0, 20, 6),
            reading(100.0, 20, 9),
            reading(120.0, 20, 12),
            reading(200.0, 20, 18),
        ];
        let pct = RangePercentages::from_readings(&readings, &ranges);
        assert_eq!(pct.low, 25.0);
        assert_eq!(pct.in_range, 50.0);
        assert_eq!(pct.high, 25.0);
        assert!((pct.low + pct.in_range + pct.high - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentages_of_empty_are_zero() {
        let pct = RangePercentages::from_readings(&[], &BloodGlucoseRanges::default());
        assert_eq!(pct, RangePercentages::default());
    }

    #[test]
    fn test_percentages_honor_boundary_semantics() {
        let ranges = BloodGlucoseRanges::default();
        // 70 is Normal, 180 is High
        let readings = vec![reading(70.0, 20, 8), reading(180.0, 20, 12)];
        let pct = RangePercentages::from_readings(&readings, &ranges);
        assert_eq!(pct.low, 0.0);
        assert_eq!(pct.in_range, 50.0);
        assert_eq!(pct.high, 50.0);
    }

    #[test]
    fn test_seven_day_cutoff() {
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 3, 13, 12, 0, 0).unwrap();
        assert_eq!(TimeFrame::Days7.cutoff(now), expected);
    }

    #[test]
    fn test_month_frames_use_thirty_day_blocks() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(TimeFrame::Months3.cutoff(now), now - Duration::days(90));
        assert_eq!(TimeFrame::Months6.cutoff(now), now - Duration::days(180));
        assert_eq!(TimeFrame::Months12.cutoff(now), now - Duration::days(360));
    }

    #[test]
    fn test_time_frame_tags() {
        assert_eq!(TimeFrame::from_tag("24hours"), Some(TimeFrame::Hours24));
        assert_eq!(TimeFrame::from_tag("7days"), Some(TimeFrame::Days7));
        assert_eq!(TimeFrame::from_tag("3months"), Some(TimeFrame::Months3));
        assert_eq!(TimeFrame::from_tag("45"), Some(TimeFrame::Days(45)));
        assert_eq!(TimeFrame::from_tag("fortnight"), None);
    }

    #[test]
    fn test_daily_summaries_group_by_day() {
        let ranges = BloodGlucoseRanges::default();
        let readings = vec![
            reading(100.0, 21, 8),
            reading(120.0, 20, 9),
            reading(140.0, 20, 19),
        ];
        let days = daily_summaries(&readings, &ranges);

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 3, 20).unwrap());
        assert_eq!(days[0].count, 2);
        assert_eq!(days[0].average, 130.0);
        assert_eq!(days[1].count, 1);
        assert_eq!(days[1].average, 100.0);
    }
}
