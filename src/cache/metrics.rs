//! Durable table of resolved metric values
//!
//! One row per `(indicator, region, year, gender)`. A later upsert with the
//! same key replaces the row; no history is kept. When backed by a file the
//! whole table is rewritten on every upsert, before the row is committed in
//! memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::StorageError;
use crate::data::DataSource;

const METRICS_FILE: &str = "metrics.json";

/// Composite key of a metric row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricKey {
    /// Sotkanet indicator id
    pub indicator_id: u32,
    /// Canonical numeric region id
    pub region: String,
    /// Year the value belongs to (the data year for upstream values)
    pub year: i32,
    /// `total`, `male` or `female`
    pub gender: String,
}

/// Latest known value for one metric key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    #[serde(flatten)]
    pub key: MetricKey,
    /// Relative figure (`value` upstream)
    pub value: f64,
    /// Absolute figure (`absoluteValue` upstream)
    pub absolute_value: f64,
    /// Whether the value is real or simulated
    pub data_source: DataSource,
    /// When this row was last written
    pub last_updated: DateTime<Utc>,
}

/// Upsert-only metrics table, optionally persisted as a JSON file
#[derive(Debug, Default)]
pub struct MetricsTable {
    rows: Mutex<HashMap<MetricKey, MetricRecord>>,
    path: Option<PathBuf>,
}

impl MetricsTable {
    /// Creates a table that lives only in memory
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens (or starts) a table persisted under `dir`.
    ///
    /// An unreadable or corrupt file starts an empty table.
    pub fn open(dir: PathBuf) -> Self {
        let path = dir.join(METRICS_FILE);
        let rows = fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str::<Vec<MetricRecord>>(&content).ok())
            .map(|records| {
                records
                    .into_iter()
                    .map(|record| (record.key.clone(), record))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            rows: Mutex::new(rows),
            path: Some(path),
        }
    }

    /// Inserts or replaces the row for `record.key`
    ///
    /// For a file-backed table the new snapshot is written first and the row
    /// is only committed in memory once the write succeeded.
    ///
    /// # Returns
    /// * `Ok(())` when the row is stored
    /// * `Err(StorageError)` if the file write fails; the table is unchanged
    pub fn upsert(&self, record: MetricRecord) -> Result<(), StorageError> {
        let mut rows = self.rows.lock().map_err(|_| StorageError::Poisoned)?;

        if let Some(ref path) = self.path {
            persist(path, &rows, &record)?;
        }
        rows.insert(record.key.clone(), record);
        Ok(())
    }

    pub fn get(&self, key: &MetricKey) -> Option<MetricRecord> {
        self.rows.lock().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Writes the table as it will look once `record` is upserted
fn persist(
    path: &Path,
    rows: &HashMap<MetricKey, MetricRecord>,
    record: &MetricRecord,
) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut snapshot: Vec<&MetricRecord> = rows
        .values()
        .filter(|row| row.key != record.key)
        .chain(std::iter::once(record))
        .collect();
    snapshot.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));

    fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
    Ok(())
}

fn sort_key(record: &MetricRecord) -> (u32, &str, i32, &str) {
    (
        record.key.indicator_id,
        record.key.region.as_str(),
        record.key.year,
        record.key.gender.as_str(),
    )
}
