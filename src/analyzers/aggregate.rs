use crate::analyzers::types::{
    AggregateError, DailyAggregate, DetectorBaseline, INTERVALS, Observation,
};
use crate::analyzers::utility::ValidMean;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Per-detector baselines for a batch of observations.
#[derive(Debug, Clone, Default)]
pub struct Baselines {
    by_detector: BTreeMap<u16, DetectorBaseline>,
    unfilled: usize,
}

impl Baselines {
    /// Baseline for `(detector_id, interval)`. Unknown detectors and
    /// out-of-range intervals read as 0.
    pub fn get(&self, detector_id: u16, interval: usize) -> f64 {
        self.by_detector
            .get(&detector_id)
            .and_then(|b| b.means.get(interval))
            .copied()
            .unwrap_or(0.0)
    }

    /// Number of `(detector, interval)` pairs with no valid reading, whose
    /// baseline therefore defaults to 0.
    pub fn unfilled_intervals(&self) -> usize {
        self.unfilled
    }

    pub fn len(&self) -> usize {
        self.by_detector.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_detector.is_empty()
    }
}

fn check_width(obs: &Observation) -> Result<(), AggregateError> {
    if obs.volumes.len() != INTERVALS {
        return Err(AggregateError::WrongWidth {
            detector_id: obs.detector_id,
            date: obs.date,
            len: obs.volumes.len(),
        });
    }
    Ok(())
}

/// Computes, for every detector and interval, the mean of the non-negative
/// readings across the whole batch.
pub fn compute_baselines(observations: &[Observation]) -> Result<Baselines, AggregateError> {
    let mut columns: BTreeMap<u16, [ValidMean; INTERVALS]> = BTreeMap::new();

    for obs in observations {
        check_width(obs)?;

        let stats = columns
            .entry(obs.detector_id)
            .or_insert([ValidMean::default(); INTERVALS]);

        for (stat, value) in stats.iter_mut().zip(&obs.volumes) {
            stat.push(*value);
        }
    }

    let mut unfilled = 0;
    let by_detector = columns
        .into_iter()
        .map(|(detector_id, stats)| {
            let empty = stats.iter().filter(|s| s.count() == 0).count();
            let baseline = DetectorBaseline {
                detector_id,
                means: stats.map(|s| s.mean()),
            };
            if empty > 0 {
                debug!(
                    detector_id = baseline.detector_id,
                    empty_intervals = empty,
                    "Detector has intervals without valid readings"
                );
            }
            unfilled += empty;
            (detector_id, baseline)
        })
        .collect();

    Ok(Baselines {
        by_detector,
        unfilled,
    })
}

/// Returns the observation's volumes with every sentinel replaced by the
/// detector's baseline for that interval.
pub fn impute(obs: &Observation, baselines: &Baselines) -> Result<[f64; INTERVALS], AggregateError> {
    check_width(obs)?;

    let mut filled = [0.0; INTERVALS];
    for (interval, (slot, value)) in filled.iter_mut().zip(&obs.volumes).enumerate() {
        *slot = if *value < 0 {
            baselines.get(obs.detector_id, interval)
        } else {
            *value as f64
        };
    }

    Ok(filled)
}

/// Aggregates a batch of [`Observation`] rows into one [`DailyAggregate`] per
/// date, ordered by date ascending.
///
/// Sentinel readings are imputed from per-detector baselines before the
/// per-day sums are taken. Alarm counts are summed as recorded.
#[tracing::instrument(skip_all, fields(rows = observations.len()))]
pub fn aggregate(observations: &[Observation]) -> Result<Vec<DailyAggregate>, AggregateError> {
    if observations.is_empty() {
        return Ok(Vec::new());
    }

    let baselines = compute_baselines(observations)?;

    let mut days: BTreeMap<NaiveDate, DailyAggregate> = BTreeMap::new();
    let mut imputed_cells = 0usize;

    for obs in observations {
        let filled = impute(obs, &baselines)?;
        imputed_cells += obs.volumes.iter().filter(|v| **v < 0).count();

        let day = days
            .entry(obs.date)
            .or_insert_with(|| DailyAggregate::empty(obs.date));

        for (acc, value) in day.volumes.iter_mut().zip(filled) {
            *acc += value;
        }
        day.alarm_count += obs.alarm_count as i64;
    }

    debug!(
        days = days.len(),
        detectors = baselines.len(),
        imputed_cells,
        unfilled_intervals = baselines.unfilled_intervals(),
        "Seasonality aggregation complete"
    );

    Ok(days.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 6, d).unwrap()
    }

    fn obs(detector_id: u16, d: u32, volumes: Vec<i32>, alarm_count: i32) -> Observation {
        Observation {
            site_id: 100,
            date: day(d),
            detector_id,
            volumes,
            alarm_count,
        }
    }

    fn filled(value: i32) -> Vec<i32> {
        vec![value; INTERVALS]
    }

    fn with_first(first: i32, rest: i32) -> Vec<i32> {
        let mut v = filled(rest);
        v[0] = first;
        v
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        let result = aggregate(&[]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_baseline_is_mean_of_clean_values() {
        let rows = vec![
            obs(1, 10, filled(4), 0),
            obs(1, 11, filled(7), 0),
            obs(1, 12, filled(10), 0),
        ];
        let baselines = compute_baselines(&rows).unwrap();

        for k in 0..INTERVALS {
            assert!((baselines.get(1, k) - 7.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_clean_values_are_not_altered() {
        let rows = vec![obs(1, 10, filled(4), 0), obs(1, 11, filled(7), 0)];
        let baselines = compute_baselines(&rows).unwrap();

        let imputed = impute(&rows[0], &baselines).unwrap();
        assert!(imputed.iter().all(|v| *v == 4.0));
    }

    #[test]
    fn test_sentinel_replaced_by_own_detector_baseline() {
        let rows = vec![
            obs(1, 10, with_first(10, 0), 0),
            obs(1, 11, with_first(-1, 2), 0),
            obs(2, 10, with_first(500, 0), 0),
            obs(2, 11, with_first(300, 0), 0),
        ];
        let baselines = compute_baselines(&rows).unwrap();

        let imputed = impute(&rows[1], &baselines).unwrap();
        assert_eq!(imputed[0], 10.0);
        assert_eq!(imputed[1], 2.0);
    }

    #[test]
    fn test_all_sentinel_column_has_zero_baseline() {
        let rows = vec![
            obs(3, 10, with_first(-1, 5), 0),
            obs(3, 11, with_first(-7, 5), 0),
        ];
        let baselines = compute_baselines(&rows).unwrap();

        assert_eq!(baselines.get(3, 0), 0.0);
        assert_eq!(baselines.get(3, 1), 5.0);
        assert_eq!(baselines.unfilled_intervals(), 1);

        let result = aggregate(&rows).unwrap();
        assert_eq!(result[0].volumes[0], 0.0);
        assert_eq!(result[1].volumes[0], 0.0);
    }

    #[test]
    fn test_unknown_detector_baseline_is_zero() {
        let baselines = compute_baselines(&[obs(1, 10, filled(1), 0)]).unwrap();
        assert_eq!(baselines.get(9, 0), 0.0);
        assert_eq!(baselines.get(1, INTERVALS), 0.0);
        assert_eq!(baselines.len(), 1);
        assert_eq!(baselines.unfilled_intervals(), 0);
    }

    #[test]
    fn test_two_detector_two_day_scenario() {
        let rows = vec![
            obs(1, 10, with_first(10, 0), 1),
            obs(2, 10, with_first(3, 1), 0),
            obs(1, 11, with_first(-1, 2), 2),
            obs(2, 11, with_first(6, 1), 4),
        ];

        let baselines = compute_baselines(&rows).unwrap();
        assert_eq!(baselines.get(1, 0), 10.0);

        let result = aggregate(&rows).unwrap();
        assert_eq!(result.len(), 2);

        assert_eq!(result[0].date, day(10));
        assert_eq!(result[0].volumes[0], 13.0);
        assert_eq!(result[0].volumes[1], 1.0);
        assert_eq!(result[0].alarm_count, 1);

        assert_eq!(result[1].date, day(11));
        assert_eq!(result[1].volumes[0], 10.0 + 6.0);
        assert_eq!(result[1].volumes[1], 3.0);
        assert_eq!(result[1].alarm_count, 6);
    }

    #[test]
    fn test_alarm_count_is_not_imputed() {
        let rows = vec![
            obs(1, 10, filled(-1), -3),
            obs(1, 11, filled(8), 5),
        ];
        let result = aggregate(&rows).unwrap();

        assert_eq!(result[0].alarm_count, -3);
        assert_eq!(result[0].volumes[0], 8.0);
        assert_eq!(result[1].alarm_count, 5);
    }

    #[test]
    fn test_output_is_strictly_increasing_by_date() {
        let rows = vec![
            obs(2, 14, filled(1), 0),
            obs(1, 12, filled(1), 0),
            obs(1, 14, filled(1), 0),
            obs(1, 10, filled(1), 0),
        ];
        let result = aggregate(&rows).unwrap();

        let dates: Vec<_> = result.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(10), day(12), day(14)]);
        assert_eq!(result[2].volumes[0], 2.0);
    }

    #[test]
    fn test_clean_input_equals_raw_group_sum() {
        let rows: Vec<_> = (1..=3u16)
            .flat_map(|det| {
                (10..13u32).map(move |d| {
                    let volumes = (0..INTERVALS as i32).map(|k| k + det as i32 * d as i32).collect();
                    obs(det, d, volumes, det as i32)
                })
            })
            .collect();

        let result = aggregate(&rows).unwrap();
        assert_eq!(result.len(), 3);

        for agg in &result {
            let group: Vec<_> = rows.iter().filter(|o| o.date == agg.date).collect();
            for k in 0..INTERVALS {
                let expected: i64 = group.iter().map(|o| o.volumes[k] as i64).sum();
                assert_eq!(agg.volumes[k], expected as f64);
            }
            let alarms: i64 = group.iter().map(|o| o.alarm_count as i64).sum();
            assert_eq!(agg.alarm_count, alarms);
        }
    }

    #[test]
    fn test_fractional_baseline_is_reproducible() {
        let rows = vec![
            obs(1, 10, filled(1), 0),
            obs(1, 11, filled(2), 0),
            obs(1, 12, filled(2), 0),
            obs(1, 13, filled(-1), 0),
        ];
        let first = aggregate(&rows).unwrap();
        let second = aggregate(&rows).unwrap();

        assert!((first[3].volumes[0] - 5.0 / 3.0).abs() < 1e-3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_wrong_width_fails() {
        let rows = vec![obs(1, 10, filled(1), 0), obs(4, 10, vec![1, 2, 3], 0)];

        let err = aggregate(&rows).unwrap_err();
        assert_eq!(
            err,
            AggregateError::WrongWidth {
                detector_id: 4,
                date: day(10),
                len: 3,
            }
        );
    }
}
