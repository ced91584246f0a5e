//! Observation storage.
//!
//! [`ObservationStore`] is the seam the request pipeline queries.
//! [`MemoryStore`] keeps rows in memory; [`CsvStore`] loads SCATS CSV exports
//! from disk into one.

use crate::analyzers::types::Observation;
use crate::parser::parse_observations;
use crate::query::ObservationFilter;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

/// Source of observations for a site, date range and detector selection.
///
/// Implementations return rows ordered by `(date, detector_id)` with at most
/// one row per pair.
#[async_trait]
pub trait ObservationStore: Send + Sync {
    async fn fetch(&self, filter: &ObservationFilter, detector_count: u16) -> Result<Vec<Observation>>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    rows: Vec<Observation>,
}

impl MemoryStore {
    pub fn new(rows: Vec<Observation>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = Observation>) {
        self.rows.extend(rows);
    }

    /// Filters, orders and deduplicates synchronously.
    pub fn select(&self, filter: &ObservationFilter, detector_count: u16) -> Vec<Observation> {
        let mut selected: Vec<Observation> = self
            .rows
            .iter()
            .filter(|o| {
                o.site_id == filter.site_id
                    && o.date >= filter.from
                    && o.date <= filter.to
                    && filter.detectors.contains(o.detector_id, detector_count)
            })
            .cloned()
            .collect();

        // Stable sort keeps the first-loaded row of each pair ahead of its duplicates.
        selected.sort_by_key(|o| (o.date, o.detector_id));
        selected.dedup_by_key(|o| (o.date, o.detector_id));

        selected
    }
}

#[async_trait]
impl ObservationStore for MemoryStore {
    async fn fetch(&self, filter: &ObservationFilter, detector_count: u16) -> Result<Vec<Observation>> {
        let rows = self.select(filter, detector_count);
        debug!(site_id = filter.site_id, rows = rows.len(), "Observations selected");
        Ok(rows)
    }
}

/// A [`MemoryStore`] populated from SCATS CSV exports on disk.
#[derive(Debug, Default, Clone)]
pub struct CsvStore {
    inner: MemoryStore,
}

fn is_export_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.ends_with(".csv") || name.ends_with(".csv.gz")
}

impl CsvStore {
    /// Loads a single export file, or every `.csv` / `.csv.gz` file directly
    /// inside a directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut store = Self::default();

        if path.is_dir() {
            let mut files = Vec::new();
            for entry in std::fs::read_dir(path)? {
                let entry = entry?;
                let file = entry.path();
                if entry.file_type()?.is_file() && is_export_file(&file) {
                    files.push(file);
                }
            }
            files.sort();

            for file in files {
                store.load_file(&file)?;
            }
        } else {
            store.load_file(path)?;
        }

        info!(path = %path.display(), rows = store.inner.len(), "CSV store loaded");
        Ok(store)
    }

    /// Builds a store from already-fetched bytes, e.g. an HTTP download.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let rows = parse_observations(bytes)?;
        Ok(Self {
            inner: MemoryStore::new(rows),
        })
    }

    fn load_file(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let rows = parse_observations(&bytes).with_context(|| format!("parsing {}", path.display()))?;
        debug!(path = %path.display(), rows = rows.len(), "Export file parsed");
        self.inner.extend(rows);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl ObservationStore for CsvStore {
    async fn fetch(&self, filter: &ObservationFilter, detector_count: u16) -> Result<Vec<Observation>> {
        self.inner.fetch(filter, detector_count).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::{ALARM_COLUMN, INTERVALS, volume_column};
    use crate::query::DetectorSelection;
    use chrono::NaiveDate;
    use std::env;
    use std::fs;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 6, d).unwrap()
    }

    fn obs(site_id: u32, d: u32, detector_id: u16, first: i32) -> Observation {
        let mut volumes = vec![0; INTERVALS];
        volumes[0] = first;
        Observation {
            site_id,
            date: day(d),
            detector_id,
            volumes,
            alarm_count: 0,
        }
    }

    fn filter(from: u32, to: u32, detectors: DetectorSelection) -> ObservationFilter {
        ObservationFilter {
            site_id: 100,
            from: day(from),
            to: day(to),
            detectors,
        }
    }

    #[test]
    fn test_select_filters_orders_and_dedups() {
        let store = MemoryStore::new(vec![
            obs(100, 12, 2, 1),
            obs(100, 11, 2, 1),
            obs(100, 11, 1, 10),
            obs(100, 11, 1, 99),
            obs(200, 11, 1, 1),
            obs(100, 20, 1, 1),
        ]);

        let rows = store.select(&filter(10, 12, DetectorSelection::All), 50);
        let keys: Vec<_> = rows.iter().map(|o| (o.date, o.detector_id)).collect();
        assert_eq!(keys, vec![(day(11), 1), (day(11), 2), (day(12), 2)]);
        assert_eq!(rows[0].volumes[0], 10);
    }

    #[test]
    fn test_select_respects_detector_allow_list() {
        let store = MemoryStore::new(vec![
            obs(100, 11, 1, 1),
            obs(100, 11, 2, 1),
            obs(100, 11, 30, 1),
        ]);

        let only = store.select(&filter(11, 11, DetectorSelection::Only(vec![2])), 50);
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].detector_id, 2);

        let all_of_24 = store.select(&filter(11, 11, DetectorSelection::All), 24);
        assert_eq!(all_of_24.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_matches_select() {
        let store = MemoryStore::new(vec![obs(100, 11, 1, 1), obs(100, 12, 1, 1)]);
        let f = filter(11, 11, DetectorSelection::All);

        let rows = store.fetch(&f, 50).await.unwrap();
        assert_eq!(rows, store.select(&f, 50));
    }

    #[tokio::test]
    async fn test_csv_store_loads_directory() {
        let dir = env::temp_dir().join("scats_seasonality_store_test");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let mut header = vec![
            "NB_SCATS_SITE".to_string(),
            "QT_INTERVAL_COUNT".to_string(),
            "NB_DETECTOR".to_string(),
        ];
        header.extend((0..INTERVALS).map(volume_column));
        header.push(ALARM_COLUMN.to_string());

        let line = |date: &str, det: u16| {
            let mut cells = vec!["100".to_string(), date.to_string(), det.to_string()];
            cells.extend((0..INTERVALS).map(|_| "1".to_string()));
            cells.push("0".to_string());
            cells.join(",")
        };

        fs::write(
            dir.join("a.csv"),
            format!("{}\n{}\n", header.join(","), line("2021-06-11", 1)),
        )
        .unwrap();
        fs::write(
            dir.join("b.csv"),
            format!("{}\n{}\n", header.join(","), line("2021-06-11 00:00:00", 2)),
        )
        .unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let store = CsvStore::open(&dir).unwrap();
        assert_eq!(store.len(), 2);

        let rows = store
            .fetch(&filter(11, 11, DetectorSelection::All), 50)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        fs::remove_dir_all(&dir).unwrap();
    }
}
