//! CSV parser for SCATS volume exports.
//!
//! Expected columns (any order, extra columns ignored): `NB_SCATS_SITE`,
//! `QT_INTERVAL_COUNT`, `NB_DETECTOR`, `V00`..`V95`, `CT_ALARM_24HOUR`.

use crate::analyzers::types::{ALARM_COLUMN, INTERVALS, Observation, volume_column};
use chrono::NaiveDate;
use flate2::read::GzDecoder;
use std::io::Read;
use thiserror::Error;

pub const SITE_COLUMN: &str = "NB_SCATS_SITE";
pub const DATE_COLUMN: &str = "QT_INTERVAL_COUNT";
pub const DETECTOR_COLUMN: &str = "NB_DETECTOR";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing column '{0}'")]
    MissingColumn(String),
    #[error("line {line}: invalid value '{value}' in column '{column}'")]
    InvalidValue {
        line: u64,
        column: String,
        value: String,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("gzip error: {0}")]
    Gzip(#[from] std::io::Error),
}

/// Column positions resolved from the header row.
struct Layout {
    site: usize,
    date: usize,
    detector: usize,
    volumes: Vec<usize>,
    alarm: usize,
}

impl Layout {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, ParseError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| ParseError::MissingColumn(name.to_string()))
        };

        let volumes = (0..INTERVALS)
            .map(|i| find(&volume_column(i)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Layout {
            site: find(SITE_COLUMN)?,
            date: find(DATE_COLUMN)?,
            detector: find(DETECTOR_COLUMN)?,
            volumes,
            alarm: find(ALARM_COLUMN)?,
        })
    }
}

fn cell<'r>(record: &'r csv::StringRecord, index: usize) -> &'r str {
    record.get(index).unwrap_or("").trim()
}

fn parse_cell<T: std::str::FromStr>(
    record: &csv::StringRecord,
    index: usize,
    column: &str,
    line: u64,
) -> Result<T, ParseError> {
    let raw = cell(record, index);
    raw.parse().map_err(|_| ParseError::InvalidValue {
        line,
        column: column.to_string(),
        value: raw.to_string(),
    })
}

/// Parses a `QT_INTERVAL_COUNT` value. Any time part after the date is
/// dropped, so both `2021-07-01` and `2021-07-01 00:00:00` are accepted.
pub fn parse_interval_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().split([' ', 'T']).next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Decodes CSV bytes, transparently gunzipping them first if needed.
///
/// # Errors
///
/// Returns an error if a required column is missing or any cell fails to
/// parse.
pub fn parse_observations(bytes: &[u8]) -> Result<Vec<Observation>, ParseError> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoded = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut decoded)?;
        return parse_csv(&decoded);
    }
    parse_csv(bytes)
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<Observation>, ParseError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
    let layout = Layout::from_headers(rdr.headers()?)?;

    let mut rows = Vec::new();

    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let raw_date = cell(&record, layout.date);
        let date = parse_interval_date(raw_date).ok_or_else(|| ParseError::InvalidValue {
            line,
            column: DATE_COLUMN.to_string(),
            value: raw_date.to_string(),
        })?;

        let volumes = layout
            .volumes
            .iter()
            .enumerate()
            .map(|(i, &idx)| parse_cell::<i32>(&record, idx, &volume_column(i), line))
            .collect::<Result<Vec<_>, _>>()?;

        rows.push(Observation {
            site_id: parse_cell(&record, layout.site, SITE_COLUMN, line)?,
            date,
            detector_id: parse_cell(&record, layout.detector, DETECTOR_COLUMN, line)?,
            volumes,
            alarm_count: parse_cell(&record, layout.alarm, ALARM_COLUMN, line)?,
        });
    }

    Ok(rows)
}
