//! Dataset shape and the named-source loader
//!
//! Every source (synthetic generation, a CSV file, an external record store)
//! resolves to the same [`Dataset`]. The loader only checks what it must to
//! build that shape: the `at_risk` label column exists and holds 0/1. Value
//! ranges and finiteness are left to the trainer.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};
use vitalrisk_core::Record;

use crate::errors::{Result, TrainerError};
use crate::synthetic::{make_synthetic_profile, SyntheticProfile};

/// Label column name
pub const TARGET_COLUMN: &str = "at_risk";

/// Labeled rows with named feature columns
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    /// Feature column names in file order, label excluded
    pub columns: Vec<String>,
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<u8>,
}

impl Dataset {
    /// Load a CSV with a header row. Cells that do not parse as numbers load
    /// as NaN.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TrainerError::CsvNotFound(path.to_path_buf()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let target_idx = headers
            .iter()
            .position(|h| h == TARGET_COLUMN)
            .ok_or(TrainerError::MissingLabel)?;
        let columns: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != target_idx)
            .map(|(_, h)| h.to_string())
            .collect();
        if columns.is_empty() {
            return Err(TrainerError::NoFeatures);
        }

        let mut features = Vec::new();
        let mut targets = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            let raw_label = record.get(target_idx).unwrap_or_default();
            targets.push(parse_label(raw_label, row_idx + 1)?);

            let row = record
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != target_idx)
                .map(|(_, cell)| cell.parse::<f64>().unwrap_or(f64::NAN))
                .collect();
            features.push(row);
        }

        info!(
            "Loaded {} rows with {} features from {}",
            features.len(),
            columns.len(),
            path.display()
        );
        Ok(Self {
            columns,
            features,
            targets,
        })
    }

    /// Build from name-keyed records; columns are the union of record keys.
    /// A key missing from a record loads as NaN.
    pub fn from_records(records: &[Record]) -> Result<Self> {
        let mut columns: Vec<String> = records
            .iter()
            .flat_map(|r| r.keys())
            .filter(|k| k.as_str() != TARGET_COLUMN)
            .cloned()
            .collect();
        columns.sort();
        columns.dedup();

        let mut features = Vec::with_capacity(records.len());
        let mut targets = Vec::with_capacity(records.len());
        for (row_idx, record) in records.iter().enumerate() {
            let label = record.get(TARGET_COLUMN).ok_or(TrainerError::MissingLabel)?;
            targets.push(parse_label(&label.to_string(), row_idx + 1)?);
            features.push(
                columns
                    .iter()
                    .map(|c| record.get(c).copied().unwrap_or(f64::NAN))
                    .collect(),
            );
        }
        if columns.is_empty() && !records.is_empty() {
            return Err(TrainerError::NoFeatures);
        }

        Ok(Self {
            columns,
            features,
            targets,
        })
    }

    /// Get number of samples
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Check if dataset is empty
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Copy out one column by name.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.features.iter().map(|row| row[idx]).collect())
    }

    /// One row as a name-keyed record, label included.
    pub fn record(&self, row: usize) -> Option<Record> {
        let values = self.features.get(row)?;
        let mut record: Record = self.columns.iter().cloned().zip(values.iter().copied()).collect();
        record.insert(TARGET_COLUMN.to_string(), f64::from(self.targets[row]));
        Some(record)
    }

    /// Keep at most the first `n` rows.
    pub fn truncate(&mut self, n: usize) {
        self.features.truncate(n);
        self.targets.truncate(n);
    }

    pub fn positive_rate(&self) -> f64 {
        if self.targets.is_empty() {
            return 0.0;
        }
        self.targets.iter().filter(|&&y| y == 1).count() as f64 / self.targets.len() as f64
    }

    /// Per-column (min, max) over finite values, for logging.
    pub fn feature_stats(&self) -> Vec<(f64, f64)> {
        let mut stats = vec![(f64::INFINITY, f64::NEG_INFINITY); self.columns.len()];
        for row in &self.features {
            for (s, &v) in stats.iter_mut().zip(row) {
                if v.is_finite() {
                    s.0 = s.0.min(v);
                    s.1 = s.1.max(v);
                }
            }
        }
        stats
    }
}

fn parse_label(raw: &str, row: usize) -> Result<u8> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v == 0.0 => Ok(0),
        Ok(v) if v == 1.0 => Ok(1),
        _ => Err(TrainerError::InvalidLabel {
            row,
            value: raw.to_string(),
        }),
    }
}

/// Named dataset source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Synthetic,
    Csv,
    Db,
}

impl FromStr for DataSource {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "synthetic" => Ok(DataSource::Synthetic),
            "csv" => Ok(DataSource::Csv),
            "db" => Ok(DataSource::Db),
            other => Err(TrainerError::InvalidSource(other.to_string())),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Synthetic => f.write_str("synthetic"),
            DataSource::Csv => f.write_str("csv"),
            DataSource::Db => f.write_str("db"),
        }
    }
}

/// External store of labeled records backing the `db` source.
pub trait RecordStore: Send + Sync {
    /// Fetch up to `limit` records, each carrying an `at_risk` entry.
    fn fetch_records(&self, limit: Option<usize>) -> Result<Vec<Record>>;
}

/// Loader settings
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    pub synthetic_rows: usize,
    pub seed: u64,
    pub profile: SyntheticProfile,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            synthetic_rows: 2000,
            seed: 7,
            profile: SyntheticProfile::Vitals,
        }
    }
}

/// Resolves a named source into a [`Dataset`].
#[derive(Clone, Default)]
pub struct DatasetLoader {
    config: LoaderConfig,
    store: Option<Arc<dyn RecordStore>>,
}

impl fmt::Debug for DatasetLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetLoader")
            .field("config", &self.config)
            .field("store", &self.store.is_some())
            .finish()
    }
}

impl DatasetLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load `source` (`synthetic`, `csv` or `db`), keeping at most `limit` rows.
    pub fn load(
        &self,
        source: &str,
        csv_path: Option<&Path>,
        limit: Option<usize>,
    ) -> Result<Dataset> {
        let source: DataSource = source.parse()?;
        debug!(%source, ?limit, "Loading dataset");

        let mut dataset = match source {
            DataSource::Synthetic => make_synthetic_profile(
                self.config.profile,
                self.config.synthetic_rows,
                self.config.seed,
            )?,
            DataSource::Csv => Dataset::from_csv(csv_path.ok_or(TrainerError::CsvPathRequired)?)?,
            DataSource::Db => {
                let store = self.store.as_ref().ok_or(TrainerError::StoreUnavailable)?;
                Dataset::from_records(&store.fetch_records(limit)?)?
            }
        };

        if let Some(n) = limit {
            dataset.truncate(n);
        }
        info!(
            "Dataset from {source}: {} rows, {} features, positive rate {:.3}",
            dataset.len(),
            dataset.feature_count(),
            dataset.positive_rate()
        );
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(lines: &[&str]) -> anyhow::Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        for line in lines {
            writeln!(file, "{line}")?;
        }
        file.flush()?;
        Ok(file)
    }

    struct FixedStore(Vec<Record>);

    impl RecordStore for FixedStore {
        fn fetch_records(&self, limit: Option<usize>) -> Result<Vec<Record>> {
            let n = limit.unwrap_or(self.0.len()).min(self.0.len());
            Ok(self.0[..n].to_vec())
        }
    }

    struct BrokenStore;

    impl RecordStore for BrokenStore {
        fn fetch_records(&self, _limit: Option<usize>) -> Result<Vec<Record>> {
            Err(TrainerError::Store("connection refused".into()))
        }
    }

    fn record(pairs: &[(&str, f64)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_load_csv() -> anyhow::Result<()> {
        let file = write_csv(&["age_years,heart_rate,at_risk", "30,72,0", "80,110,1"])?;
        let ds = Dataset::from_csv(file.path())?;
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.columns, vec!["age_years", "heart_rate"]);
        assert_eq!(ds.features[1], vec![80.0, 110.0]);
        assert_eq!(ds.targets, vec![0, 1]);
        Ok(())
    }

    #[test]
    fn test_label_column_anywhere() -> anyhow::Result<()> {
        let file = write_csv(&["at_risk,heart_rate", "1,120", "0,70"])?;
        let ds = Dataset::from_csv(file.path())?;
        assert_eq!(ds.columns, vec!["heart_rate"]);
        assert_eq!(ds.targets, vec![1, 0]);
        Ok(())
    }

    #[test]
    fn test_missing_label() -> anyhow::Result<()> {
        let file = write_csv(&["age_years,heart_rate", "30,72"])?;
        let err = Dataset::from_csv(file.path()).unwrap_err();
        assert!(err.to_string().contains("at_risk"));
        Ok(())
    }

    #[test]
    fn test_invalid_label() -> anyhow::Result<()> {
        let file = write_csv(&["heart_rate,at_risk", "72,0", "90,yes"])?;
        let err = Dataset::from_csv(file.path()).unwrap_err();
        assert!(matches!(err, TrainerError::InvalidLabel { row: 2, .. }));
        Ok(())
    }

    #[test]
    fn test_non_numeric_cells_load_as_nan() -> anyhow::Result<()> {
        let file = write_csv(&["age_years,heart_rate,at_risk", "30,n/a,0"])?;
        let ds = Dataset::from_csv(file.path())?;
        assert!(ds.features[0][1].is_nan());
        Ok(())
    }

    #[test]
    fn test_record_round_trip() {
        let ds = Dataset {
            columns: vec!["age_years".into(), "heart_rate".into()],
            features: vec![vec![30.0, 72.0]],
            targets: vec![1],
        };
        let rec = ds.record(0).unwrap();
        assert_eq!(rec["heart_rate"], 72.0);
        assert_eq!(rec[TARGET_COLUMN], 1.0);
        assert!(ds.record(1).is_none());
    }

    #[test]
    fn test_loader_sources() -> anyhow::Result<()> {
        let loader = DatasetLoader::new(LoaderConfig {
            synthetic_rows: 120,
            ..Default::default()
        });
        let ds = loader.load("synthetic", None, None)?;
        assert_eq!(ds.len(), 120);
        assert!(ds.column_index("age_years").is_some());

        let limited = loader.load("synthetic", None, Some(10))?;
        assert_eq!(limited.len(), 10);

        let err = loader.load("invalid_source", None, None).unwrap_err();
        assert!(err.to_string().contains("Invalid source"));

        let err = loader
            .load("csv", Some(Path::new("/nonexistent/file.csv")), None)
            .unwrap_err();
        assert!(err.to_string().contains("CSV not found"));

        assert!(matches!(
            loader.load("csv", None, None),
            Err(TrainerError::CsvPathRequired)
        ));
        Ok(())
    }

    #[test]
    fn test_db_without_store_fails() {
        let loader = DatasetLoader::default();
        assert!(matches!(
            loader.load("db", None, Some(10)),
            Err(TrainerError::StoreUnavailable)
        ));
    }

    #[test]
    fn test_db_store() -> anyhow::Result<()> {
        let store = FixedStore(vec![
            record(&[("age_years", 30.0), ("heart_rate", 72.0), ("at_risk", 0.0)]),
            record(&[("age_years", 81.0), ("at_risk", 1.0)]),
            record(&[("age_years", 45.0), ("heart_rate", 80.0), ("at_risk", 0.0)]),
        ]);
        let loader = DatasetLoader::default().with_store(Arc::new(store));
        let ds = loader.load("db", None, Some(2))?;
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.columns, vec!["age_years", "heart_rate"]);
        assert!(ds.features[1][1].is_nan());

        let broken = DatasetLoader::default().with_store(Arc::new(BrokenStore));
        let err = broken.load("db", None, None).unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        Ok(())
    }
}
