use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::models::ride::RideStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Lost the accept race, or the ride already belongs to another driver.
    /// Expected under contention; callers should re-poll their offers
    /// instead of retrying blindly.
    #[error("ride already taken")]
    RideAlreadyTaken,

    /// No "sent" offer exists for this (ride, driver) pair.
    #[error("offer not available")]
    OfferNotAvailable,

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: RideStatus, to: RideStatus },

    /// Location index, routing provider or persistence failed. Safe to retry
    /// with backoff for idempotent reads only.
    #[error("upstream unavailable: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_)
            | AppError::OfferNotAvailable
            | AppError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::RideAlreadyTaken => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
