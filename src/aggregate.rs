use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::StatsError;
use crate::grading::{is_passing, split_by_category, weighted_average};
use crate::models::{
    ClassAverage, LearnerAverage, RecordFilter, ScoreEntry, ScoreRecord, StatsReport,
};
use crate::store::RecordStore;

/// One score entry carrying its parent record's keys.
#[derive(Debug, Clone, Copy)]
pub struct FlatScore<'a> {
    pub learner_id: i64,
    pub class_id: i64,
    pub entry: &'a ScoreEntry,
}

/// Expand every record into one row per score entry. Records with no
/// scores produce no rows.
pub fn flatten(records: &[ScoreRecord]) -> impl Iterator<Item = FlatScore<'_>> {
    records.iter().flat_map(|record| {
        record.scores.iter().map(move |entry| FlatScore {
            learner_id: record.learner_id,
            class_id: record.class_id,
            entry,
        })
    })
}

/// Weighted average per distinct key among the flattened rows.
pub fn averages_by<K>(records: &[ScoreRecord], key: K) -> BTreeMap<i64, f64>
where
    K: Fn(&FlatScore<'_>) -> i64,
{
    let mut groups: BTreeMap<i64, Vec<&ScoreEntry>> = BTreeMap::new();
    for row in flatten(records) {
        groups.entry(key(&row)).or_default().push(row.entry);
    }

    groups
        .into_iter()
        .map(|(id, entries)| (id, weighted_average(&split_by_category(entries))))
        .collect()
}

pub fn build_stats(
    passing_count: u64,
    total_count: u64,
    scope: &str,
) -> Result<StatsReport, StatsError> {
    if total_count == 0 {
        return Err(StatsError::EmptyPopulation {
            scope: scope.to_string(),
        });
    }
    let ratio = passing_count as f64 / total_count as f64;
    Ok(StatsReport {
        passing_count,
        total_count,
        pass_ratio: (ratio * 100.0).round() / 100.0,
    })
}

fn count_passing(averages: &BTreeMap<i64, f64>) -> u64 {
    averages.values().filter(|avg| is_passing(**avg)).count() as u64
}

/// Report engine over an injected record store. Holds no state between calls.
#[derive(Clone)]
pub struct GradeEngine {
    store: Arc<dyn RecordStore>,
}

impl GradeEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// One weighted average per class among the matching records, in class id order.
    /// An empty match yields an empty list.
    pub async fn class_averages(
        &self,
        learner_id: Option<i64>,
    ) -> Result<Vec<ClassAverage>, StatsError> {
        let filter = learner_id.map_or_else(RecordFilter::all, RecordFilter::learner);
        let records = self.store.find(filter).await?;
        tracing::debug!(
            scope = %filter.label(),
            records = records.len(),
            "computing class averages"
        );

        Ok(averages_by(&records, |row| row.class_id)
            .into_iter()
            .map(|(class_id, average)| ClassAverage { class_id, average })
            .collect())
    }

    /// Every class id present in the store, including classes whose records hold no scores.
    pub async fn class_ids(&self) -> Result<Vec<i64>, StatsError> {
        let records = self.store.find(RecordFilter::all()).await?;
        let ids: BTreeSet<i64> = records.iter().map(|r| r.class_id).collect();
        Ok(ids.into_iter().collect())
    }

    /// Each learner's cross-class weighted average, in learner id order.
    pub async fn learner_averages(
        &self,
        filter: RecordFilter,
    ) -> Result<Vec<LearnerAverage>, StatsError> {
        let records = self.store.find(filter).await?;
        Ok(averages_by(&records, |row| row.learner_id)
            .into_iter()
            .map(|(learner_id, average)| LearnerAverage {
                learner_id,
                average,
            })
            .collect())
    }

    /// Pass rate over every learner, each scored across all their classes.
    pub async fn population_stats(&self) -> Result<StatsReport, StatsError> {
        let filter = RecordFilter::all();
        let records = self.store.find(filter).await?;
        let passing = count_passing(&averages_by(&records, |row| row.learner_id));

        // Separate query: learners whose records hold no scores still count here.
        let total = self.store.count_distinct_learners(filter).await?;
        tracing::debug!(passing, total, "population stats");

        build_stats(passing, total, &filter.label()).map_err(|err| {
            tracing::warn!("{err}");
            err
        })
    }

    /// Pass rate among the learners enrolled in `class_id`.
    pub async fn class_stats(&self, class_id: i64) -> Result<StatsReport, StatsError> {
        let filter = RecordFilter::class(class_id);
        let records = self.store.find(filter).await?;
        let passing = count_passing(&averages_by(&records, |row| row.learner_id));

        // Record count, which equals the learner count only while
        // (learner_id, class_id) stays unique in the store.
        let total = self.store.count_records(filter).await?;
        tracing::debug!(class_id, passing, total, "class stats");

        build_stats(passing, total, &filter.label()).map_err(|err| {
            tracing::warn!("{err}");
            err
        })
    }
}
