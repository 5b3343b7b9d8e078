use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    /// A required identifier was missing or not an integer.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The pass-ratio denominator was zero.
    #[error("no learners found for {scope}")]
    EmptyPopulation { scope: String },

    /// The record store could not be reached or rejected a query.
    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<sqlx::Error> for StatsError {
    fn from(err: sqlx::Error) -> Self {
        StatsError::StoreUnavailable(err.to_string())
    }
}

pub fn parse_id(raw: &str, name: &str) -> Result<i64, StatsError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(StatsError::InvalidArgument(format!("{name} is required")));
    }
    trimmed.parse::<i64>().map_err(|_| {
        StatsError::InvalidArgument(format!("{name} must be an integer, got '{trimmed}'"))
    })
}
