use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("assessment not found: {0}")]
    NotFound(Uuid),

    #[error("unknown section: {0}")]
    UnknownSection(String),

    #[error("invalid data for section {section}: {reason}")]
    InvalidSectionData { section: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
