use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::aggregate::GradeEngine;
use crate::error::StatsError;
use crate::grading::{is_passing, PASS_THRESHOLD};
use crate::models::{LearnerAverage, RecordFilter, StatsReport};

#[derive(Debug, Clone)]
pub struct ClassSummary {
    pub class_id: i64,
    pub stats: StatsReport,
}

#[derive(Debug, Clone)]
pub struct ReportData {
    pub population: Option<StatsReport>,
    pub classes: Vec<ClassSummary>,
    pub standings: Vec<LearnerAverage>,
}

/// Runs every query the report needs.
pub async fn collect(engine: &GradeEngine) -> Result<ReportData, StatsError> {
    let population = match engine.population_stats().await {
        Ok(stats) => Some(stats),
        Err(StatsError::EmptyPopulation { .. }) => None,
        Err(err) => return Err(err),
    };

    let mut classes = Vec::new();
    for class_id in engine.class_ids().await? {
        match engine.class_stats(class_id).await {
            Ok(stats) => classes.push(ClassSummary { class_id, stats }),
            // The class can vanish between the two queries.
            Err(StatsError::EmptyPopulation { .. }) => continue,
            Err(err) => return Err(err),
        }
    }

    let mut standings = engine.learner_averages(RecordFilter::all()).await?;
    rank_standings(&mut standings);

    Ok(ReportData {
        population,
        classes,
        standings,
    })
}

/// Highest average first. NaN sorts above every number.
pub fn rank_standings(standings: &mut [LearnerAverage]) {
    standings.sort_by(|a, b| b.average.total_cmp(&a.average));
}

pub fn build_report(generated_at: DateTime<Utc>, data: &ReportData, limit: usize) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Learner Grade Report");
    let _ = writeln!(
        output,
        "Generated {} (passing means a weighted average above {})",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        PASS_THRESHOLD
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## All Learners");

    match &data.population {
        Some(stats) => {
            let _ = writeln!(
                output,
                "- {} of {} learners passing (ratio {:.2})",
                stats.passing_count, stats.total_count, stats.pass_ratio
            );
        }
        None => {
            let _ = writeln!(output, "No learners recorded.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## By Class");

    if data.classes.is_empty() {
        let _ = writeln!(output, "No classes with scores recorded.");
    } else {
        for summary in data.classes.iter() {
            let _ = writeln!(
                output,
                "- class {}: {} of {} passing (ratio {:.2})",
                summary.class_id,
                summary.stats.passing_count,
                summary.stats.total_count,
                summary.stats.pass_ratio
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Learner Standings");

    if data.standings.is_empty() {
        let _ = writeln!(output, "No learners with scores recorded.");
    } else {
        for learner in data.standings.iter().take(limit) {
            let marker = if is_passing(learner.average) {
                "passing"
            } else {
                "below threshold"
            };
            let _ = writeln!(
                output,
                "- learner {}: {:.2} ({})",
                learner.learner_id, learner.average, marker
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScoreEntry, ScoreRecord};
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn record(learner_id: i64, class_id: i64, scores: &[(&str, f64)]) -> ScoreRecord {
        ScoreRecord {
            learner_id,
            class_id,
            scores: scores
                .iter()
                .map(|(category, value)| ScoreEntry::new(category, *value))
                .collect(),
        }
    }

    #[tokio::test]
    async fn report_lists_population_classes_and_standings() {
        let store = MemoryStore::new(vec![
            record(1, 10, &[("exam", 100.0), ("quiz", 100.0), ("homework", 100.0)]),
            record(2, 10, &[("exam", 40.0)]),
            record(2, 20, &[("quiz", 90.0)]),
        ]);
        let engine = GradeEngine::new(Arc::new(store));
        let data = collect(&engine).await.unwrap();

        assert_eq!(data.classes.len(), 2);
        assert_eq!(data.standings[0].learner_id, 1);

        let generated_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let report = build_report(generated_at, &data, 10);

        assert!(report.contains("Generated 2026-03-01 09:30 UTC"));
        assert!(report.contains("- 1 of 2 learners passing (ratio 0.50)"));
        assert!(report.contains("- class 10: 1 of 2 passing (ratio 0.50)"));
        assert!(report.contains("- class 20: 0 of 1 passing (ratio 0.00)"));
        assert!(report.contains("- learner 1: 100.00 (passing)"));
        assert!(report.contains("- learner 2: 47.00 (below threshold)"));
    }

    #[tokio::test]
    async fn empty_store_renders_placeholders() {
        let engine = GradeEngine::new(Arc::new(MemoryStore::default()));
        let data = collect(&engine).await.unwrap();
        let report = build_report(Utc::now(), &data, 10);

        assert!(data.population.is_none());
        assert!(report.contains("No learners recorded."));
        assert!(report.contains("No classes with scores recorded."));
    }

    #[tokio::test]
    async fn classes_without_scores_are_listed() {
        let store = MemoryStore::new(vec![
            record(1, 10, &[("exam", 100.0)]),
            record(2, 30, &[]),
        ]);
        let engine = GradeEngine::new(Arc::new(store));
        let data = collect(&engine).await.unwrap();

        let ids: Vec<i64> = data.classes.iter().map(|c| c.class_id).collect();
        assert_eq!(ids, vec![10, 30]);
        assert_eq!(data.classes[1].stats, engine.class_stats(30).await.unwrap());

        let report = build_report(Utc::now(), &data, 10);
        assert!(report.contains("- class 30: 0 of 1 passing (ratio 0.00)"));
    }

    #[test]
    fn standings_rank_highest_first_regardless_of_nan_position() {
        let mut standings = vec![
            LearnerAverage { learner_id: 1, average: 40.0 },
            LearnerAverage { learner_id: 2, average: f64::NAN },
            LearnerAverage { learner_id: 3, average: 90.0 },
        ];
        rank_standings(&mut standings);
        let ids: Vec<i64> = standings.iter().map(|l| l.learner_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        standings.reverse();
        rank_standings(&mut standings);
        let ids: Vec<i64> = standings.iter().map(|l| l.learner_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}
