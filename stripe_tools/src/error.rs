use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StripeApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Webhook signature rejected: {0}")]
    InvalidSignature(String),
}

impl StripeApiError {
    /// Whether repeating the same request could reasonably succeed. Network failures, rate limiting and server-side
    /// errors are transient; everything else (bad parameters, unknown ids, auth failures) is not.
    pub fn is_transient(&self) -> bool {
        match self {
            StripeApiError::RestRequestError(_) | StripeApiError::RestResponseError(_) => true,
            StripeApiError::QueryError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
