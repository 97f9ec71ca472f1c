//! Snapshot clock and snapshot-indexed series.
//!
//! The [`Snapshots`] index is the analysis horizon every time-varying
//! attribute is aligned with. Profiles arriving from configuration are
//! [`TimeSeries`] values that must be *index-equal* to the snapshots
//! (same name, same length, same timestamps in the same order) before they
//! can be bound.

use std::ops::Range;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::{IndexMismatch, NetworkError, NetworkResult};

/// Default name of the snapshot index (also used for unnamed profile indexes)
pub const DEFAULT_INDEX_NAME: &str = "snapshot";

/// Canonical timestamp layout for profiles and constraint windows
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ACCEPTED_FORMATS: &[&str] = &[
    TIMESTAMP_FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse a timestamp cell. Date-only values are taken as midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for format in ACCEPTED_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

pub fn format_timestamp(stamp: &NaiveDateTime) -> String {
    stamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Ordered, unique timestamps with per-snapshot weights.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshots {
    name: String,
    stamps: Vec<NaiveDateTime>,
    weights: Vec<f64>,
}

impl Default for Snapshots {
    fn default() -> Self {
        Self {
            name: DEFAULT_INDEX_NAME.to_string(),
            stamps: Vec::new(),
            weights: Vec::new(),
        }
    }
}

impl Snapshots {
    /// Build a snapshot index, rejecting unordered or repeated timestamps.
    pub fn new(name: impl Into<String>, stamps: Vec<NaiveDateTime>) -> NetworkResult<Self> {
        if let Some(pair) = stamps.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(NetworkError::InvalidConfig(format!(
                "snapshots must be strictly increasing ({} followed by {})",
                format_timestamp(&pair[0]),
                format_timestamp(&pair[1])
            )));
        }
        let weights = vec![1.0; stamps.len()];
        Ok(Self {
            name: name.into(),
            stamps,
            weights,
        })
    }

    /// `periods` evenly spaced snapshots starting at `start`.
    ///
    /// A horizon that leaves chrono's calendar range is an `InvalidConfig`
    /// error, checked on the last snapshot before anything is allocated.
    pub fn range(start: NaiveDateTime, periods: usize, step: Duration) -> NetworkResult<Self> {
        if step <= Duration::zero() {
            return Err(NetworkError::InvalidConfig(format!(
                "snapshot step must be positive, got {} minutes",
                step.num_minutes()
            )));
        }
        let out_of_range = || {
            NetworkError::InvalidConfig(format!(
                "{} snapshots every {} minutes from {} overflow the calendar",
                periods,
                step.num_minutes(),
                format_timestamp(&start)
            ))
        };
        let count = i32::try_from(periods).map_err(|_| out_of_range())?;
        let stamp_at = |i: i32| {
            step.checked_mul(i)
                .and_then(|offset| start.checked_add_signed(offset))
        };
        if count > 0 && stamp_at(count - 1).is_none() {
            return Err(out_of_range());
        }
        let stamps = (0..count)
            .map(|i| stamp_at(i).ok_or_else(out_of_range))
            .collect::<NetworkResult<Vec<_>>>()?;
        Ok(Self {
            name: DEFAULT_INDEX_NAME.to_string(),
            weights: vec![1.0; stamps.len()],
            stamps,
        })
    }

    /// Hourly snapshots, the horizon most configurations use.
    pub fn hourly(start: NaiveDateTime, periods: usize) -> NetworkResult<Self> {
        Self::range(start, periods, Duration::hours(1))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_weights(mut self, weights: Vec<f64>) -> NetworkResult<Self> {
        if weights.len() != self.stamps.len() {
            return Err(NetworkError::InvalidConfig(format!(
                "{} snapshot weights given for {} snapshots",
                weights.len(),
                self.stamps.len()
            )));
        }
        if let Some((position, weight)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(NetworkError::InvalidConfig(format!(
                "snapshot weight {} at position {} must be finite and non-negative",
                weight, position
            )));
        }
        self.weights = weights;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn stamps(&self) -> &[NaiveDateTime] {
        &self.stamps
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn position(&self, stamp: &NaiveDateTime) -> Option<usize> {
        self.stamps.binary_search(stamp).ok()
    }

    /// Inclusive window `[start, end]` as an index range; either bound may be open.
    pub fn window(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Range<usize> {
        let lo = match start {
            Some(start) => self.stamps.partition_point(|t| *t < start),
            None => 0,
        };
        let hi = match end {
            Some(end) => self.stamps.partition_point(|t| *t <= end),
            None => self.stamps.len(),
        };
        lo..hi.max(lo)
    }

    /// Compare a foreign index against this one: name, then length, then values.
    pub fn compare_index(&self, name: &str, index: &[NaiveDateTime]) -> Result<(), IndexMismatch> {
        if name != self.name {
            return Err(IndexMismatch::Name {
                expected: self.name.clone(),
                found: name.to_string(),
            });
        }
        if index.len() != self.stamps.len() {
            return Err(IndexMismatch::Length {
                expected: self.stamps.len(),
                found: index.len(),
            });
        }
        match self
            .stamps
            .iter()
            .zip(index)
            .position(|(expected, found)| expected != found)
        {
            Some(position) => Err(IndexMismatch::Values {
                position,
                expected: format_timestamp(&self.stamps[position]),
                found: format_timestamp(&index[position]),
            }),
            None => Ok(()),
        }
    }
}

/// A named, timestamp-indexed series of values (a profile).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub index_name: String,
    pub index: Vec<NaiveDateTime>,
    pub values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(index_name: impl Into<String>, index: Vec<NaiveDateTime>, values: Vec<f64>) -> Self {
        debug_assert_eq!(index.len(), values.len());
        Self {
            index_name: index_name.into(),
            index,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value recorded at `stamp` (first occurrence)
    pub fn value_at(&self, stamp: &NaiveDateTime) -> Option<f64> {
        self.index
            .iter()
            .position(|t| t == stamp)
            .map(|i| self.values[i])
    }

    /// Check that this series can be bound to `snapshots` as-is.
    pub fn aligned_with(&self, snapshots: &Snapshots) -> Result<(), IndexMismatch> {
        snapshots.compare_index(&self.index_name, &self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = ts("2024-10-01 13:00:00");
        assert_eq!(parse_timestamp("2024-10-01T13:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-01 13:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-01"), Some(ts("2024-10-01 00:00:00")));
        assert_eq!(parse_timestamp("tomorrow"), None);
    }

    #[test]
    fn test_snapshots_reject_unordered() {
        let stamps = vec![ts("2024-10-01 01:00:00"), ts("2024-10-01 00:00:00")];
        assert!(Snapshots::new("snapshot", stamps).is_err());

        let repeated = vec![ts("2024-10-01 00:00:00"), ts("2024-10-01 00:00:00")];
        assert!(Snapshots::new("snapshot", repeated).is_err());
    }

    #[test]
    fn test_hourly_range() {
        let snapshots = Snapshots::hourly(ts("2024-10-01 00:00:00"), 24).unwrap();
        assert_eq!(snapshots.len(), 24);
        assert_eq!(snapshots.stamps()[23], ts("2024-10-01 23:00:00"));
        assert_eq!(snapshots.weights().iter().sum::<f64>(), 24.0);
        assert_eq!(snapshots.name(), DEFAULT_INDEX_NAME);
    }

    #[test]
    fn test_range_outside_calendar_is_config_error() {
        let start = ts("2024-10-01 00:00:00");
        let century = Duration::days(36_500);
        let err = Snapshots::range(start, 5_000, century).unwrap_err();
        assert!(matches!(err, NetworkError::InvalidConfig(_)));

        let err = Snapshots::range(start, usize::MAX, Duration::minutes(15)).unwrap_err();
        assert!(matches!(err, NetworkError::InvalidConfig(_)));

        assert!(Snapshots::range(start, 3, Duration::zero()).is_err());
        assert!(Snapshots::range(start, 0, Duration::hours(1)).unwrap().is_empty());
    }

    #[test]
    fn test_weights_must_be_finite_and_non_negative() {
        let snapshots = || Snapshots::hourly(ts("2024-10-01 00:00:00"), 3).unwrap();
        assert!(snapshots().with_weights(vec![1.0, 0.0, 2.5]).is_ok());
        assert!(snapshots().with_weights(vec![1.0, f64::NAN, 1.0]).is_err());
        assert!(snapshots().with_weights(vec![f64::INFINITY, 1.0, 1.0]).is_err());
        let err = snapshots().with_weights(vec![1.0, 1.0, -0.5]).unwrap_err();
        assert!(err.to_string().contains("position 2"));
        assert!(snapshots().with_weights(vec![1.0]).is_err());
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let snapshots = Snapshots::hourly(ts("2024-10-01 00:00:00"), 48).unwrap();
        let day2 = snapshots.window(
            Some(ts("2024-10-02 00:00:00")),
            Some(ts("2024-10-02 23:00:00")),
        );
        assert_eq!(day2, 24..48);

        assert_eq!(snapshots.window(None, Some(ts("2024-10-01 02:00:00"))), 0..3);
        assert_eq!(snapshots.window(Some(ts("2024-10-02 22:30:00")), None), 47..48);
        assert_eq!(snapshots.window(None, None), 0..48);
    }

    #[test]
    fn test_window_outside_horizon_is_empty() {
        let snapshots = Snapshots::hourly(ts("2024-10-01 00:00:00"), 4).unwrap();
        let range = snapshots.window(Some(ts("2025-01-01 00:00:00")), None);
        assert!(range.is_empty());
        let inverted = snapshots.window(
            Some(ts("2024-10-01 03:00:00")),
            Some(ts("2024-10-01 01:00:00")),
        );
        assert!(inverted.is_empty());
    }

    #[test]
    fn test_compare_index_reports_first_difference() {
        let snapshots = Snapshots::hourly(ts("2024-10-01 00:00:00"), 3).unwrap();
        let mut index = snapshots.stamps().to_vec();
        index[2] = ts("2024-10-01 05:00:00");

        let err = snapshots.compare_index("snapshot", &index).unwrap_err();
        assert_eq!(
            err,
            IndexMismatch::Values {
                position: 2,
                expected: "2024-10-01 02:00:00".into(),
                found: "2024-10-01 05:00:00".into(),
            }
        );

        let err = snapshots.compare_index("time", snapshots.stamps()).unwrap_err();
        assert!(matches!(err, IndexMismatch::Name { .. }));

        let err = snapshots.compare_index("snapshot", &index[..2]).unwrap_err();
        assert_eq!(err, IndexMismatch::Length { expected: 3, found: 2 });
    }

    #[test]
    fn test_series_alignment() {
        let snapshots = Snapshots::hourly(ts("2024-10-01 00:00:00"), 2).unwrap();
        let series = TimeSeries::new("snapshot", snapshots.stamps().to_vec(), vec![1.0, 2.0]);
        assert!(series.aligned_with(&snapshots).is_ok());
        assert_eq!(series.value_at(&ts("2024-10-01 01:00:00")), Some(2.0));
    }
}
