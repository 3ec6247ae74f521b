use thiserror::Error;

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("solver failed: {0}")]
    Solver(String),
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
}

impl AllocationError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
