use crate::models::{Category, CategoryBuckets, ScoreEntry};

pub const EXAM_WEIGHT: f64 = 0.5;
pub const QUIZ_WEIGHT: f64 = 0.3;
pub const HOMEWORK_WEIGHT: f64 = 0.2;

/// Learners strictly above this weighted average are passing.
pub const PASS_THRESHOLD: f64 = 50.0;

/// Entries with an unrecognised category land in no bucket.
pub fn split_by_category<'a, I>(entries: I) -> CategoryBuckets
where
    I: IntoIterator<Item = &'a ScoreEntry>,
{
    let mut buckets = CategoryBuckets::default();

    for entry in entries {
        match Category::parse(&entry.category) {
            Some(Category::Exam) => buckets.exam.push(entry.value),
            Some(Category::Quiz) => buckets.quiz.push(entry.value),
            Some(Category::Homework) => buckets.homework.push(entry.value),
            None => {}
        }
    }

    buckets
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn contribution(values: &[f64], weight: f64) -> f64 {
    mean(values).map_or(0.0, |m| m * weight)
}

/// Fixed 50/30/20 weighting. A missing category contributes zero; the
/// remaining weights are not renormalised.
pub fn weighted_average(buckets: &CategoryBuckets) -> f64 {
    contribution(&buckets.exam, EXAM_WEIGHT)
        + contribution(&buckets.quiz, QUIZ_WEIGHT)
        + contribution(&buckets.homework, HOMEWORK_WEIGHT)
}

pub fn is_passing(average: f64) -> bool {
    average > PASS_THRESHOLD
}
