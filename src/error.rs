use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Task not found: {0}")]
    TaskNotFound(crate::core::task::TaskId),

    #[error("Session not found: {0}")]
    SessionNotFound(uuid::Uuid),

    #[error("Another review session is already active: {0}")]
    SessionActive(uuid::Uuid),

    #[error("Invalid phase transition from {from} to {to}")]
    InvalidPhaseTransition { from: String, to: String },

    #[error("Candidate not found: {0}")]
    CandidateNotFound(uuid::Uuid),

    #[error("Graph changed since session start (expected version {expected}, found {actual})")]
    StaleGraph { expected: u64, actual: u64 },

    #[error("Inserting would create a cycle through edge {from} -> {to}")]
    Cycle {
        from: crate::core::task::TaskId,
        to: crate::core::task::TaskId,
    },

    #[error("Candidate generation failed for gap {gap}: {reason}")]
    GenerationFailed { gap: String, reason: String },

    #[error("External provider error: {0}")]
    Provider(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("No home directory")]
    NoHomeDir,
}

pub type Result<T> = std::result::Result<T, Error>;
