//! Error types for goal-compass.

/// Top-level error type for the onboarding engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown column {column} on table {table}")]
    UnknownColumn { table: String, column: String },
}

/// Errors raised by the wizard itself, as opposed to its store.
///
/// Readiness rejections and out-of-range navigation are not errors; they come
/// back as values from the navigator.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Draft for step {step} is malformed: {reason}")]
    MalformedDraft { step: String, reason: String },

    #[error("Stored draft for step {step} is unreadable: {reason}")]
    CorruptRecord { step: String, reason: String },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
