use thiserror::Error;

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),
    #[error("Statistics provider error: {0}")]
    Provider(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for InsightError {
    fn from(err: serde_json::Error) -> Self {
        InsightError::InvalidProfile(err.to_string())
    }
}

pub type InsightResult<T> = Result<T, InsightError>;
