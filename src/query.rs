//! Validation of raw request parameters.
//!
//! Both request kinds take a site id and an inclusive date range. Seasonality
//! requests additionally take a detector allow-list; raw extracts always cover
//! every detector of the site.

use crate::config::Settings;
use chrono::NaiveDate;
use thiserror::Error;

/// Which detectors a request covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorSelection {
    /// Every detector id from 1 up to the configured detector count.
    All,
    /// Every detector id, with no upper bound and including 0.
    Any,
    Only(Vec<u16>),
}

impl DetectorSelection {
    /// Parses the `detectors` parameter: absent, empty or `all` select every
    /// detector, otherwise a comma-separated list of ids.
    pub fn parse(raw: Option<&str>) -> Result<Self, QueryError> {
        match raw.map(str::trim) {
            None | Some("") | Some("all") => Ok(DetectorSelection::All),
            Some(list) => list
                .split(',')
                .map(|id| id.trim().parse::<u16>())
                .collect::<Result<Vec<_>, _>>()
                .map(DetectorSelection::Only)
                .map_err(|_| QueryError::InvalidDetectors),
        }
    }

    /// Returns whether `detector_id` is selected, given the configured count
    /// that `All` expands to.
    pub fn contains(&self, detector_id: u16, detector_count: u16) -> bool {
        match self {
            DetectorSelection::All => (1..=detector_count).contains(&detector_id),
            DetectorSelection::Any => true,
            DetectorSelection::Only(ids) => ids.contains(&detector_id),
        }
    }
}

/// A validated store query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationFilter {
    pub site_id: u32,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub detectors: DetectorSelection,
}

impl ObservationFilter {
    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }
}

/// Raw, unvalidated request parameters as they arrive on the query string.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pub scats_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub detectors: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("'scats_id' must be an integer.")]
    InvalidSiteId,
    #[error("'from' must be a date of format YYYY-MM-DD.")]
    InvalidFrom,
    #[error("'to' must be a date of format YYYY-MM-DD.")]
    InvalidTo,
    #[error("'from' must be a date later than or equal to {0}")]
    FromTooEarly(NaiveDate),
    #[error("'to' must be a date earlier than or equal to {0}")]
    ToTooLate(NaiveDate),
    #[error("Time difference between 'from' and 'to' cannot be more than {0} days.")]
    RangeTooLong(i64),
    #[error("'from' cannot be greater than 'to'.")]
    FromAfterTo,
    #[error("'detectors' must be integers separated by comma.")]
    InvalidDetectors,
}

fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw?.trim(), "%Y-%m-%d").ok()
}

fn validate_common(
    params: &RequestParams,
    settings: &Settings,
    max_days: i64,
) -> Result<(u32, NaiveDate, NaiveDate), QueryError> {
    let site_id = params
        .scats_id
        .as_deref()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .ok_or(QueryError::InvalidSiteId)?;

    let from = parse_date(params.from.as_deref()).ok_or(QueryError::InvalidFrom)?;
    let to = parse_date(params.to.as_deref()).ok_or(QueryError::InvalidTo)?;

    if from < settings.min_date {
        return Err(QueryError::FromTooEarly(settings.min_date));
    }
    if to > settings.max_date {
        return Err(QueryError::ToTooLate(settings.max_date));
    }
    if (to - from).num_days() > max_days.saturating_sub(1) {
        return Err(QueryError::RangeTooLong(max_days));
    }
    if from > to {
        return Err(QueryError::FromAfterTo);
    }

    Ok((site_id, from, to))
}

/// Validates a seasonality request.
pub fn validate_seasonality(
    params: &RequestParams,
    settings: &Settings,
) -> Result<ObservationFilter, QueryError> {
    let detectors = DetectorSelection::parse(params.detectors.as_deref())?;
    let (site_id, from, to) = validate_common(params, settings, settings.seasonality_max_days)?;

    Ok(ObservationFilter {
        site_id,
        from,
        to,
        detectors,
    })
}

/// Validates a raw extract request. The detector parameter is ignored.
pub fn validate_extract(
    params: &RequestParams,
    settings: &Settings,
) -> Result<ObservationFilter, QueryError> {
    let (site_id, from, to) = validate_common(params, settings, settings.extract_max_days)?;

    Ok(ObservationFilter {
        site_id,
        from,
        to,
        detectors: DetectorSelection::Any,
    })
}
