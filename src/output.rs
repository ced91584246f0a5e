//! Output formatting and persistence for seasonality results.
//!
//! Supports the JSON table document returned to API callers, plus CSV files
//! for aggregates and raw extracts.

use anyhow::Result;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::{debug, info};

use crate::analyzers::types::{ALARM_COLUMN, DailyAggregate, INTERVALS, Observation, volume_column};
use crate::parser::{DATE_COLUMN, DETECTOR_COLUMN, SITE_COLUMN};
use csv::WriterBuilder;
use std::fs::File;

/// Name of the key column in the table document.
pub const KEY_FIELD: &str = "date";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl TableField {
    fn new(name: impl Into<String>, kind: &str) -> Self {
        Self {
            name: name.into(),
            kind: kind.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    pub fields: Vec<TableField>,
    #[serde(rename = "primaryKey")]
    pub primary_key: Vec<String>,
}

impl TableSchema {
    /// `date`, then `V00`..`V95`, then the alarm count.
    pub fn seasonality() -> Self {
        let mut fields = Vec::with_capacity(INTERVALS + 2);
        fields.push(TableField::new(KEY_FIELD, "date"));
        fields.extend((0..INTERVALS).map(|i| TableField::new(volume_column(i), "number")));
        fields.push(TableField::new(ALARM_COLUMN, "integer"));

        Self {
            fields,
            primary_key: vec![KEY_FIELD.to_string()],
        }
    }
}

/// One data record of the table document, serialized with its fields in
/// schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow(pub DailyAggregate);

impl Serialize for TableRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let agg = &self.0;
        let mut map = serializer.serialize_map(Some(INTERVALS + 2))?;
        map.serialize_entry(KEY_FIELD, &agg.date.format("%Y-%m-%d").to_string())?;
        for (i, volume) in agg.volumes.iter().enumerate() {
            map.serialize_entry(&volume_column(i), volume)?;
        }
        map.serialize_entry(ALARM_COLUMN, &agg.alarm_count)?;
        map.end()
    }
}

/// Seasonality result as a self-describing table: a schema plus one record
/// per day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalityTable {
    pub schema: TableSchema,
    pub data: Vec<TableRow>,
}

impl SeasonalityTable {
    pub fn from_aggregates(rows: Vec<DailyAggregate>) -> Self {
        Self {
            schema: TableSchema::seasonality(),
            data: rows.into_iter().map(TableRow).collect(),
        }
    }

    pub fn aggregates(&self) -> impl Iterator<Item = &DailyAggregate> {
        self.data.iter().map(|r| &r.0)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes a value as JSON to `path`, replacing any existing file.
pub fn write_json(path: &str, value: &impl Serialize) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer(file, value)?;
    debug!(path, "JSON written");
    Ok(())
}

fn volume_headers() -> impl Iterator<Item = String> {
    (0..INTERVALS).map(volume_column)
}

/// Writes daily aggregates to a CSV file with a header row.
pub fn write_aggregates_csv(path: &str, rows: &[DailyAggregate]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;

    let mut header = vec![KEY_FIELD.to_string()];
    header.extend(volume_headers());
    header.push(ALARM_COLUMN.to_string());
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![row.date.format("%Y-%m-%d").to_string()];
        record.extend(row.volumes.iter().map(|v| v.to_string()));
        record.push(row.alarm_count.to_string());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    debug!(path, rows = rows.len(), "Aggregate CSV written");
    Ok(())
}

/// Writes raw observations to a CSV file in the ingest column layout, so the
/// file can be read back by [`crate::parser::parse_observations`].
pub fn write_observations_csv(path: &str, rows: &[Observation]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;

    let mut header = vec![
        SITE_COLUMN.to_string(),
        DATE_COLUMN.to_string(),
        DETECTOR_COLUMN.to_string(),
    ];
    header.extend(volume_headers());
    header.push(ALARM_COLUMN.to_string());
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.site_id.to_string(),
            row.date.format("%Y-%m-%d").to_string(),
            row.detector_id.to_string(),
        ];
        record.extend(row.volumes.iter().map(|v| v.to_string()));
        record.push(row.alarm_count.to_string());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    debug!(path, rows = rows.len(), "Observation CSV written");
    Ok(())
}
