use thiserror::Error;

#[derive(Debug, Error)]
pub enum EquisimError {
    /// A required financial field, sheet or returns series is absent.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// Valuation inputs violate a mathematical precondition.
    #[error("Invalid assumption: {field}: {reason}")]
    InvalidAssumption { field: String, reason: String },

    /// Simulation count, horizon, starting price or returns population is unusable.
    #[error("Invalid simulation parameters: {field}: {reason}")]
    InvalidSimulationParameters { field: String, reason: String },

    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl EquisimError {
    pub(crate) fn assumption(field: &str, reason: impl Into<String>) -> Self {
        EquisimError::InvalidAssumption {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn simulation(field: &str, reason: impl Into<String>) -> Self {
        EquisimError::InvalidSimulationParameters {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn input(field: &str, reason: impl Into<String>) -> Self {
        EquisimError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for EquisimError {
    fn from(e: serde_json::Error) -> Self {
        EquisimError::SerializationError(e.to_string())
    }
}
