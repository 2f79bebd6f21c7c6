/// Lag feature construction for the daily inference job.
///
/// Given the full ordered series of hourly observations, this module builds
/// one wide feature row per timestamp: every measurement lagged by every
/// offset in the short set {1,3,6} and the long set {12,18,24,48,72} hours,
/// 9 × 8 = 72 named columns.
///
/// # Lag alignment
/// Lags are keyed by actual elapsed time, not by row position: the value
/// for `temp_short_lag3h` at 15:00 is the observation recorded at exactly
/// 12:00, or null if that hour is missing from the series. With gap-free
/// hourly data this is identical to shifting the sorted series by N rows;
/// with gaps it yields explicit nulls instead of silently mis-aligned
/// values. Rows without enough history get nulls, never an error.

use chrono::{NaiveDateTime, Timelike};
use std::collections::BTreeMap;

use crate::model::{Observation, PipelineError, MEASUREMENTS};

// ---------------------------------------------------------------------------
// Lag offsets
// ---------------------------------------------------------------------------

/// Short lookback offsets, in hours.
pub const SHORT_LAGS: [i64; 3] = [1, 3, 6];

/// Long lookback offsets, in hours.
pub const LONG_LAGS: [i64; 5] = [12, 18, 24, 48, 72];

/// The longest lookback any feature reaches for, in hours. The series fed
/// to the builder should cover at least this much history before the
/// evaluation point for a fully populated row.
pub const MAX_LAG_HOURS: i64 = 72;

/// Total number of feature columns (9 measurements × 8 offsets).
pub const FEATURE_COUNT: usize = MEASUREMENTS.len() * (SHORT_LAGS.len() + LONG_LAGS.len());

/// Column names in the canonical order the classifier expects: offsets in
/// declaration order (short set, then long set), the 9 measurements within
/// each offset. `{measurement}_{tag}_lag{N}h`.
pub fn feature_names() -> Vec<String> {
    let mut names = Vec::with_capacity(FEATURE_COUNT);
    for (lags, tag) in [(&SHORT_LAGS[..], "short"), (&LONG_LAGS[..], "long")] {
        for lag in lags {
            for measurement in MEASUREMENTS {
                names.push(format!("{}_{}_lag{}h", measurement, tag, lag));
            }
        }
    }
    names
}

// ---------------------------------------------------------------------------
// Feature rows
// ---------------------------------------------------------------------------

/// One evaluation timestamp with its 72 lagged values, ordered as
/// `feature_names()`. Values are fixed as real-or-null at construction
/// time; downstream consumers never re-inspect types.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub timestamp: NaiveDateTime,
    pub values: Vec<Option<f64>>,
}

impl FeatureRow {
    /// Serializes the row as a JSON object keyed by column name, with
    /// nulls for missing lags.
    ///
    /// Non-finite values have no JSON representation and are rejected
    /// here rather than at the database boundary.
    pub fn to_snapshot(&self) -> Result<serde_json::Value, PipelineError> {
        let names = feature_names();
        let mut map = serde_json::Map::with_capacity(names.len());
        for (name, value) in names.into_iter().zip(&self.values) {
            let json_value = match value {
                Some(v) if v.is_finite() => serde_json::json!(v),
                Some(_) => return Err(PipelineError::UnserializableFeature(name)),
                None => serde_json::Value::Null,
            };
            map.insert(name, json_value);
        }
        Ok(serde_json::Value::Object(map))
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds one feature row per observation timestamp from the full series.
///
/// The series does not need to be pre-sorted; lookups are by timestamp.
/// Output rows are ordered by timestamp ascending. Evaluation-hour
/// filtering happens after this step (`rows_at_hour`) so that lags are
/// always computed against the complete series.
pub fn build_lag_features(series: &[Observation]) -> Vec<FeatureRow> {
    let by_time: BTreeMap<NaiveDateTime, &Observation> =
        series.iter().map(|obs| (obs.timestamp, obs)).collect();

    by_time
        .keys()
        .map(|&ts| {
            let mut values = Vec::with_capacity(FEATURE_COUNT);
            for lags in [&SHORT_LAGS[..], &LONG_LAGS[..]] {
                for &lag in lags {
                    let lagged_ts = ts - chrono::Duration::hours(lag);
                    match by_time.get(&lagged_ts) {
                        Some(obs) => values.extend(obs.measurement_values()),
                        None => values.extend([None; 9]),
                    }
                }
            }
            FeatureRow { timestamp: ts, values }
        })
        .collect()
}

/// Restricts rows to the designated evaluation hour of day. Applied after
/// feature construction — rows at other hours still contributed history.
pub fn rows_at_hour(rows: Vec<FeatureRow>, hour: u32) -> Vec<FeatureRow> {
    rows.into_iter()
        .filter(|row| row.timestamp.hour() == hour)
        .collect()
}

/// Picks the most recent row at or after `cutoff`. Rows are assumed to be
/// in ascending timestamp order, as produced by `build_lag_features`.
pub fn latest_row_since(rows: &[FeatureRow], cutoff: NaiveDateTime) -> Option<&FeatureRow> {
    rows.iter().rev().find(|row| row.timestamp >= cutoff)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
