//! Data types used by the seasonality pipeline.

use chrono::NaiveDate;
use thiserror::Error;

/// Number of 15-minute intervals in a day.
pub const INTERVALS: usize = 96;

/// Column name of the per-day alarm counter in ingest and output formats.
pub const ALARM_COLUMN: &str = "CT_ALARM_24HOUR";

/// Returns the column name of interval `i`, e.g. `V07`.
pub fn volume_column(i: usize) -> String {
    format!("V{:02}", i)
}

/// One detector's recorded volumes for one calendar day.
///
/// Negative entries in `volumes` are sentinels for an invalid or missing
/// reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub site_id: u32,
    pub date: NaiveDate,
    pub detector_id: u16,
    pub volumes: Vec<i32>,
    pub alarm_count: i32,
}

impl Observation {
    pub fn has_sentinel(&self) -> bool {
        self.volumes.iter().any(|v| *v < 0)
    }
}

/// Per-interval means of one detector's valid readings.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorBaseline {
    pub detector_id: u16,
    pub means: [f64; INTERVALS],
}

/// Gap-corrected volumes summed across all detectors for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub volumes: [f64; INTERVALS],
    pub alarm_count: i64,
}

impl DailyAggregate {
    pub(crate) fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            volumes: [0.0; INTERVALS],
            alarm_count: 0,
        }
    }
}

/// Malformed input handed to the aggregator.
#[derive(Debug, Error, PartialEq)]
pub enum AggregateError {
    #[error("detector {detector_id} on {date} has {len} volume entries, expected 96")]
    WrongWidth {
        detector_id: u16,
        date: NaiveDate,
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_column_is_zero_padded() {
        assert_eq!(volume_column(0), "V00");
        assert_eq!(volume_column(7), "V07");
        assert_eq!(volume_column(95), "V95");
    }

    #[test]
    fn test_has_sentinel() {
        let mut obs = Observation {
            site_id: 1,
            date: NaiveDate::from_ymd_opt(2021, 6, 10).unwrap(),
            detector_id: 1,
            volumes: vec![0; INTERVALS],
            alarm_count: 0,
        };
        assert!(!obs.has_sentinel());

        obs.volumes[40] = -1;
        assert!(obs.has_sentinel());
    }
}
