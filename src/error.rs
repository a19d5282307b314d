//! Error handling for the application

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::availability::{AvailabilityFetchError, SearchError};
use crate::pricing::responses::ErrorResponse;
use crate::pricing::PricingError;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("Availability service error: {0}")]
    Availability(#[from] AvailabilityFetchError),
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Fetch(e) => AppError::Availability(e),
            SearchError::Pricing(e) => AppError::Pricing(e),
        }
    }
}

impl AppError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::Pricing(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.error_type()),
            AppError::Availability(_) => (StatusCode::BAD_GATEWAY, "availability_unavailable"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();

        let message = match &self {
            AppError::Availability(e) => {
                tracing::error!("Availability service error: {}", e);
                "Availability service is unavailable, please try again".to_string()
            }
            other => other.to_string(),
        };

        let details = match &self {
            AppError::Pricing(PricingError::InvalidInput { field, .. }) => {
                Some(serde_json::json!({ "field": field }))
            }
            _ => None,
        };

        let body = ErrorResponse {
            error_type: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
