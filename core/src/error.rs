use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Building '{id}' not found")]
    UnknownBuilding { id: String },

    #[error("Villager '{id}' not found")]
    UnknownVillager { id: String },

    #[error("no save store attached")]
    NoStore,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;

/// Why a deferred operation finished without a value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    #[error("predicate failed: {0}")]
    PredicateFailed(String),

    #[error("predicate panicked: {0}")]
    PredicatePanicked(String),

    #[error("worker thread panicked")]
    WorkerPanicked,

    #[error("operation timed out after {seconds}s")]
    Timeout { seconds: f64 },

    #[error("awaited operation was cancelled")]
    Cancelled,
}
