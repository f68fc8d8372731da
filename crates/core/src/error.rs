#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Lock backend error: {0}")]
    Backend(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
