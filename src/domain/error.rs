//! Domain error types.

/// Top-level error type for labeltrader.
#[derive(Debug, thiserror::Error)]
pub enum LabelTraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("task {task_id} was cancelled")]
    Cancelled { task_id: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LabelTraderError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        LabelTraderError::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    pub fn insufficient(reason: impl Into<String>) -> Self {
        LabelTraderError::InsufficientData {
            reason: reason.into(),
        }
    }
}

impl From<&LabelTraderError> for std::process::ExitCode {
    fn from(err: &LabelTraderError) -> Self {
        let code: u8 = match err {
            LabelTraderError::Io(_) | LabelTraderError::Json(_) => 1,
            LabelTraderError::ConfigParse { .. }
            | LabelTraderError::ConfigMissing { .. }
            | LabelTraderError::ConfigInvalid { .. } => 2,
            LabelTraderError::Database { .. } | LabelTraderError::DatabaseQuery { .. } => 3,
            LabelTraderError::InvalidConfiguration { .. } => 4,
            LabelTraderError::InsufficientData { .. } => 5,
            LabelTraderError::Cancelled { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
