use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("detection error: {0}")]
    Detection(String),
    #[error("update cycle aborted: {0}")]
    FatalCycle(String),
    #[error("external service error: {0}")]
    ExternalService(String),
    #[error("state lock poisoned")]
    StateLock,
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
