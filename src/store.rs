use std::io::Read;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;

use crate::error::StatsError;
use crate::models::{records_from_rows, CsvScoreRow, RecordFilter, ScoreRecord};

/// Read-only access to score records.
///
/// Every call is an independent query; no snapshot is shared between calls,
/// so two counts taken for one report may observe different store states.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records matching `filter`.
    async fn find(&self, filter: RecordFilter) -> Result<Vec<ScoreRecord>, StatsError>;

    /// Number of records matching `filter`.
    async fn count_records(&self, filter: RecordFilter) -> Result<u64, StatsError>;

    /// Number of distinct learner ids among records matching `filter`.
    async fn count_distinct_learners(&self, filter: RecordFilter) -> Result<u64, StatsError>;
}

/// Store backed by a vector, used for CSV files and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<ScoreRecord>,
}

impl MemoryStore {
    pub fn new(records: Vec<ScoreRecord>) -> Self {
        Self { records }
    }

    pub fn from_reader<R: Read>(reader: R) -> anyhow::Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut rows = Vec::new();
        for result in csv_reader.deserialize::<CsvScoreRow>() {
            rows.push(result?);
        }
        Ok(Self::new(records_from_rows(rows)))
    }

    pub fn from_csv_path(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let store = Self::from_reader(file)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        tracing::info!(
            records = store.len(),
            path = %path.display(),
            "loaded score records from csv"
        );
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    fn matching(&self, filter: RecordFilter) -> impl Iterator<Item = &ScoreRecord> {
        self.records.iter().filter(move |r| filter.matches(r))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find(&self, filter: RecordFilter) -> Result<Vec<ScoreRecord>, StatsError> {
        Ok(self.matching(filter).cloned().collect())
    }

    async fn count_records(&self, filter: RecordFilter) -> Result<u64, StatsError> {
        Ok(self.matching(filter).count() as u64)
    }

    async fn count_distinct_learners(&self, filter: RecordFilter) -> Result<u64, StatsError> {
        let mut learners: Vec<i64> = self.matching(filter).map(|r| r.learner_id).collect();
        learners.sort_unstable();
        learners.dedup();
        Ok(learners.len() as u64)
    }
}
