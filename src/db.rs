use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::error::StatsError;
use crate::models::{CsvScoreRow, RecordFilter, ScoreEntry, ScoreRecord};
use crate::store::RecordStore;

/// Creates the grades table and its class, learner and (learner, class) indexes.
pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let records = vec![
        (
            1_i64,
            101_i64,
            vec![
                ScoreEntry::new("exam", 88.0),
                ScoreEntry::new("exam", 92.0),
                ScoreEntry::new("quiz", 75.0),
                ScoreEntry::new("homework", 95.0),
            ],
        ),
        (
            1,
            202,
            vec![ScoreEntry::new("exam", 64.0), ScoreEntry::new("quiz", 58.0)],
        ),
        (
            2,
            101,
            vec![
                ScoreEntry::new("exam", 41.0),
                ScoreEntry::new("quiz", 55.0),
                ScoreEntry::new("homework", 60.0),
            ],
        ),
        (
            3,
            202,
            vec![
                ScoreEntry::new("exam", 97.0),
                ScoreEntry::new("quiz", 89.0),
                ScoreEntry::new("homework", 100.0),
            ],
        ),
    ];

    for (learner_id, class_id, scores) in records {
        sqlx::query(
            r#"
            INSERT INTO grade_stats.grades (learner_id, class_id, scores)
            VALUES ($1, $2, $3)
            ON CONFLICT (learner_id, class_id) DO UPDATE
            SET scores = EXCLUDED.scores
            "#,
        )
        .bind(learner_id)
        .bind(class_id)
        .bind(Json(scores))
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Appends each CSV row to its (learner, class) record, creating the record if needed.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvScoreRow>() {
        let row = result?;
        let entry = vec![ScoreEntry {
            category: row.category,
            value: row.score,
        }];

        let result = sqlx::query(
            r#"
            INSERT INTO grade_stats.grades (learner_id, class_id, scores)
            VALUES ($1, $2, $3)
            ON CONFLICT (learner_id, class_id) DO UPDATE
            SET scores = grade_stats.grades.scores || EXCLUDED.scores
            "#,
        )
        .bind(row.learner_id)
        .bind(row.class_id)
        .bind(Json(entry))
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tracing::info!(inserted, path = %csv_path.display(), "imported score entries");
    Ok(inserted)
}

/// Postgres-backed record store.
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const FILTER_CLAUSE: &str = "WHERE ($1::BIGINT IS NULL OR learner_id = $1) \
     AND ($2::BIGINT IS NULL OR class_id = $2)";

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn find(&self, filter: RecordFilter) -> Result<Vec<ScoreRecord>, StatsError> {
        let query = format!(
            "SELECT learner_id, class_id, scores FROM grade_stats.grades {FILTER_CLAUSE} ORDER BY id"
        );
        let rows = sqlx::query(&query)
            .bind(filter.learner_id)
            .bind(filter.class_id)
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let scores: Json<Vec<ScoreEntry>> = row.try_get("scores")?;
            records.push(ScoreRecord {
                learner_id: row.try_get("learner_id")?,
                class_id: row.try_get("class_id")?,
                scores: scores.0,
            });
        }

        tracing::debug!(scope = %filter.label(), records = records.len(), "fetched records");
        Ok(records)
    }

    async fn count_records(&self, filter: RecordFilter) -> Result<u64, StatsError> {
        let query = format!("SELECT COUNT(*) AS total FROM grade_stats.grades {FILTER_CLAUSE}");
        let total: i64 = sqlx::query(&query)
            .bind(filter.learner_id)
            .bind(filter.class_id)
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;
        Ok(total as u64)
    }

    async fn count_distinct_learners(&self, filter: RecordFilter) -> Result<u64, StatsError> {
        let query = format!(
            "SELECT COUNT(DISTINCT learner_id) AS total FROM grade_stats.grades {FILTER_CLAUSE}"
        );
        let total: i64 = sqlx::query(&query)
            .bind(filter.learner_id)
            .bind(filter.class_id)
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;
        Ok(total as u64)
    }
}
