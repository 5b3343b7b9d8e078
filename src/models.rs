use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Score categories that carry weight in the final grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Exam,
    Quiz,
    Homework,
}

impl Category {
    /// Anything outside the three known names has no category.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "exam" => Some(Self::Exam),
            "quiz" => Some(Self::Quiz),
            "homework" => Some(Self::Homework),
            _ => None,
        }
    }
}

/// One assignment score as stored, e.g. `{"type": "exam", "score": 87.5}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    #[serde(rename = "type")]
    pub category: String,
    #[serde(rename = "score")]
    pub value: f64,
}

impl ScoreEntry {
    pub fn new(category: &str, value: f64) -> Self {
        Self {
            category: category.to_string(),
            value,
        }
    }
}

/// All scores of one learner in one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub learner_id: i64,
    pub class_id: i64,
    pub scores: Vec<ScoreEntry>,
}

/// Score values split by category, each in original order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryBuckets {
    pub exam: Vec<f64>,
    pub quiz: Vec<f64>,
    pub homework: Vec<f64>,
}

/// Equality filter applied by the record store. `None` fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub learner_id: Option<i64>,
    pub class_id: Option<i64>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn learner(learner_id: i64) -> Self {
        Self {
            learner_id: Some(learner_id),
            class_id: None,
        }
    }

    pub fn class(class_id: i64) -> Self {
        Self {
            learner_id: None,
            class_id: Some(class_id),
        }
    }

    pub fn matches(&self, record: &ScoreRecord) -> bool {
        self.learner_id.map_or(true, |id| id == record.learner_id)
            && self.class_id.map_or(true, |id| id == record.class_id)
    }

    pub fn label(&self) -> String {
        match (self.learner_id, self.class_id) {
            (Some(learner), Some(class)) => format!("learner {learner} in class {class}"),
            (Some(learner), None) => format!("learner {learner}"),
            (None, Some(class)) => format!("class {class}"),
            (None, None) => "all learners".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassAverage {
    pub class_id: i64,
    #[serde(rename = "avg")]
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerAverage {
    pub learner_id: i64,
    #[serde(rename = "avg")]
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub passing_count: u64,
    pub total_count: u64,
    pub pass_ratio: f64,
}

/// Flat CSV layout used for import and for the in-memory store.
#[derive(Debug, Clone, Deserialize)]
pub struct CsvScoreRow {
    pub learner_id: i64,
    pub class_id: i64,
    #[serde(rename = "type")]
    pub category: String,
    pub score: f64,
}

/// Fold CSV rows into one record per (learner, class), keeping first-seen order.
pub fn records_from_rows(rows: Vec<CsvScoreRow>) -> Vec<ScoreRecord> {
    let mut records: Vec<ScoreRecord> = Vec::new();
    let mut index: HashMap<(i64, i64), usize> = HashMap::new();

    for row in rows {
        let entry = ScoreEntry {
            category: row.category,
            value: row.score,
        };
        let slot = *index
            .entry((row.learner_id, row.class_id))
            .or_insert_with(|| {
                records.push(ScoreRecord {
                    learner_id: row.learner_id,
                    class_id: row.class_id,
                    scores: Vec::new(),
                });
                records.len() - 1
            });
        records[slot].scores.push(entry);
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(learner_id: i64, class_id: i64, category: &str, score: f64) -> CsvScoreRow {
        CsvScoreRow {
            learner_id,
            class_id,
            category: category.to_string(),
            score,
        }
    }

    #[test]
    fn rows_fold_into_one_record_per_pair() {
        let records = records_from_rows(vec![
            row(1, 10, "exam", 90.0),
            row(2, 10, "quiz", 40.0),
            row(1, 10, "quiz", 70.0),
            row(1, 20, "homework", 100.0),
        ]);

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].learner_id, 1);
        assert_eq!(records[0].class_id, 10);
        assert_eq!(
            records[0].scores,
            vec![ScoreEntry::new("exam", 90.0), ScoreEntry::new("quiz", 70.0)]
        );
        assert_eq!(records[2].class_id, 20);
    }

    #[test]
    fn interleaved_rows_keep_first_seen_record_order() {
        let rows = (0..300)
            .map(|i| row(i % 100, 10 + i % 3, "quiz", i as f64))
            .collect();
        let records = records_from_rows(rows);

        assert_eq!(records.len(), 300);
        assert_eq!((records[0].learner_id, records[0].class_id), (0, 10));
        assert_eq!((records[1].learner_id, records[1].class_id), (1, 11));
        assert_eq!(records[0].scores, vec![ScoreEntry::new("quiz", 0.0)]);
    }

    #[test]
    fn filter_matches_on_both_fields() {
        let record = ScoreRecord {
            learner_id: 3,
            class_id: 7,
            scores: Vec::new(),
        };
        assert!(RecordFilter::all().matches(&record));
        assert!(RecordFilter::learner(3).matches(&record));
        assert!(!RecordFilter::learner(4).matches(&record));
        assert!(RecordFilter::class(7).matches(&record));
        assert!(!RecordFilter::class(8).matches(&record));
    }

    #[test]
    fn score_entry_uses_stored_field_names() {
        let entry: ScoreEntry =
            serde_json::from_str(r#"{"type": "quiz", "score": 61.5}"#).unwrap();
        assert_eq!(entry, ScoreEntry::new("quiz", 61.5));
        assert_eq!(Category::parse(&entry.category), Some(Category::Quiz));
        assert_eq!(Category::parse("project"), None);
    }
}
