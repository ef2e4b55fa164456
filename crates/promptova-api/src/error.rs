//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use promptova_ai::AiError;
use promptova_firestore::{ChargeError, FirestoreError};
use promptova_models::QuotaError;

use crate::services::stripe::StripeError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    PaymentRequired(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    InvalidPrompt(String),

    #[error("Webhook Error: {0}")]
    WebhookRejected(String),

    #[error("{0}")]
    DailyLimitReached(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("AI provider error: {0}")]
    Provider(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Firestore error: {0}")]
    Firestore(#[from] FirestoreError),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) | ApiError::WebhookRejected(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::InvalidPrompt(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::DailyLimitReached(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Provider(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) | ApiError::Firestore(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code for the front end's paywall and limit prompts.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            ApiError::PaymentRequired(_) => Some("insufficient_credits"),
            ApiError::DailyLimitReached(_) => Some("daily_limit_reached"),
            ApiError::InvalidPrompt(_) => Some("invalid_prompt"),
            ApiError::Provider(_) => Some("provider_error"),
            ApiError::WebhookRejected(_) => Some("webhook_rejected"),
            _ => None,
        }
    }

    fn is_internal(&self) -> bool {
        matches!(self, ApiError::Internal(_) | ApiError::Firestore(_))
    }
}

impl From<QuotaError> for ApiError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::InsufficientCredits { .. } => ApiError::PaymentRequired(format!(
                "{}. Please upgrade your plan or buy more credits.",
                err
            )),
            QuotaError::DailyLimitReached { .. } => ApiError::DailyLimitReached(format!(
                "{}. Try again tomorrow or upgrade your plan.",
                err
            )),
        }
    }
}

impl From<ChargeError> for ApiError {
    fn from(err: ChargeError) -> Self {
        match err {
            ChargeError::Quota(quota) => quota.into(),
            ChargeError::Firestore(FirestoreError::NotFound(_)) => {
                ApiError::not_found("User profile not found. Sign in again to create it.")
            }
            ChargeError::Firestore(e) => e.into(),
        }
    }
}

impl From<AiError> for ApiError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::NotConfigured(msg) => ApiError::Unavailable(msg),
            ref e if e.is_rejected_input() => {
                ApiError::InvalidPrompt(format!("The AI provider rejected this prompt: {}", e))
            }
            e => ApiError::Provider(e.to_string()),
        }
    }
}

impl From<StripeError> for ApiError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::NotConfigured(msg) => ApiError::Unavailable(msg.to_string()),
            StripeError::InvalidSignature(_) | StripeError::Json(_) => {
                ApiError::WebhookRejected(err.to_string())
            }
            e => ApiError::Provider(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("Invalid {}", field),
                })
            })
            .collect();
        ApiError::Validation(messages.join("; "))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if self.is_internal() {
            tracing::error!(error = %self, "Request failed with internal error");
            if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                "An internal error occurred".to_string()
            } else {
                self.to_string()
            }
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            detail,
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}
