//! Runtime settings, read from the environment (and `.env` via `dotenvy` in
//! the binary).

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Accepted range for the `*_MAX_DAYS` settings.
const MAX_DAYS_RANGE: RangeInclusive<i64> = 1..=36_500;

/// Limits applied to incoming requests before the store is queried.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Earliest date held in the store.
    pub min_date: NaiveDate,
    /// Latest date held in the store.
    pub max_date: NaiveDate,
    /// Number of detectors `all` expands to (`1..=detector_count`).
    pub detector_count: u16,
    /// Maximum inclusive length of a raw extract, in days.
    pub extract_max_days: i64,
    /// Maximum inclusive length of a seasonality request, in days.
    pub seasonality_max_days: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_date: NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date"),
            max_date: NaiveDate::from_ymd_opt(2022, 12, 31).expect("valid date"),
            detector_count: 50,
            extract_max_days: 7,
            seasonality_max_days: 365,
        }
    }
}

impl Settings {
    /// Builds settings from `SCATS_*` environment variables, falling back to
    /// the defaults for any that are unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Settings::from_env`] but with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();

        let min_date = match lookup("SCATS_MIN_DATE") {
            Some(v) => parse_date("SCATS_MIN_DATE", &v)?,
            None => defaults.min_date,
        };
        let max_date = match lookup("SCATS_MAX_DATE") {
            Some(v) => parse_date("SCATS_MAX_DATE", &v)?,
            None => defaults.max_date,
        };

        let settings = Settings {
            min_date,
            max_date,
            detector_count: parse_or("SCATS_DETECTOR_COUNT", &lookup, defaults.detector_count)?,
            extract_max_days: parse_or("SCATS_EXTRACT_MAX_DAYS", &lookup, defaults.extract_max_days)?,
            seasonality_max_days: parse_or(
                "SCATS_SEASONALITY_MAX_DAYS",
                &lookup,
                defaults.seasonality_max_days,
            )?,
        };

        for (key, days) in [
            ("SCATS_EXTRACT_MAX_DAYS", settings.extract_max_days),
            ("SCATS_SEASONALITY_MAX_DAYS", settings.seasonality_max_days),
        ] {
            if !MAX_DAYS_RANGE.contains(&days) {
                anyhow::bail!(
                    "{key} must be between {} and {}, got {days}",
                    MAX_DAYS_RANGE.start(),
                    MAX_DAYS_RANGE.end()
                );
            }
        }

        if settings.min_date > settings.max_date {
            anyhow::bail!(
                "SCATS_MIN_DATE ({}) is after SCATS_MAX_DATE ({})",
                settings.min_date,
                settings.max_date
            );
        }

        Ok(settings)
    }
}

fn parse_date(key: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("{key} must be a date of format YYYY-MM-DD, got '{value}'"))
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value '{v}'")),
        None => Ok(default),
    }
}
