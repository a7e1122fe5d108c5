use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::*;
use marketplace_engine::MarketplaceError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("Webhook signature could not be verified. {0}")]
    InvalidWebhookSignature(String),
    #[error(transparent)]
    Marketplace(#[from] MarketplaceError),
}

impl ServerError {
    /// The machine-readable code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::Marketplace(e) => e.code(),
            Self::AuthenticationError(_) => "UNAUTHENTICATED",
            Self::InvalidRequestBody(_) | Self::InvalidRequestPath(_) => "INVALID_REQUEST",
            Self::InvalidWebhookSignature(_) => "INVALID_SIGNATURE",
            Self::InitializeError(_) | Self::IOError(_) | Self::ConfigurationError(_) | Self::Unspecified(_) => {
                "INTERNAL_ERROR"
            },
        }
    }

    /// Internal details stay in the logs.
    fn client_message(&self) -> String {
        match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => "An internal error occurred. Please try again later.".to_string(),
            _ => self.to_string(),
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Marketplace(e) => match e {
                MarketplaceError::Unauthenticated => StatusCode::UNAUTHORIZED,
                MarketplaceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                MarketplaceError::OutOfStock { .. } => StatusCode::CONFLICT,
                MarketplaceError::PaymentSessionError(_) => StatusCode::BAD_GATEWAY,
                MarketplaceError::PaymentNotCompleted(_) => StatusCode::PAYMENT_REQUIRED,
                MarketplaceError::PaymentVerificationFailed(_) => StatusCode::BAD_GATEWAY,
                MarketplaceError::DuplicateKey(_) => StatusCode::CONFLICT,
                MarketplaceError::Forbidden(_) => StatusCode::FORBIDDEN,
                MarketplaceError::NotCancellable(_) => StatusCode::CONFLICT,
                MarketplaceError::AlreadyCancelled(_) => StatusCode::CONFLICT,
                MarketplaceError::NotFound(_) => StatusCode::NOT_FOUND,
                MarketplaceError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidWebhookSignature(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("💻️ {self}");
        }
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(json!({ "error": { "code": self.code(), "message": self.client_message() } }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided.")]
    MissingToken,
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("The token verifier has not been configured.")]
    VerifierNotConfigured,
}
