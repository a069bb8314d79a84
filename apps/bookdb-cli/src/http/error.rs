//! API error type.
//!
//! Maps the retrieval error taxonomy onto HTTP statuses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use bookdb_core::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            Error::RecordNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::InvalidEngine(_) => (StatusCode::BAD_REQUEST, "invalid_engine"),
            Error::InvalidFilter(_) => (StatusCode::BAD_REQUEST, "invalid_filter"),
            Error::InvalidQuery(_) => (StatusCode::BAD_REQUEST, "invalid_query"),
            Error::FieldNotFound(_) => (StatusCode::UNPROCESSABLE_ENTITY, "field_not_found"),
            Error::ModelUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "model_unavailable"),
            Error::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            Error::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Error::IndexNotFound(_) => (StatusCode::INTERNAL_SERVER_ERROR, "index_not_found"),
            Error::DimensionMismatch { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "dimension_mismatch"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!("{} ({})", self.0, code);
        } else {
            warn!("{} ({})", self.0, code);
        }
        let body = ErrorResponse { error: self.0.to_string(), code: code.to_string() };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_has_a_status() {
        let cases = [
            (Error::RecordNotFound("x".into()), StatusCode::NOT_FOUND, "not_found"),
            (Error::InvalidEngine("x".into()), StatusCode::BAD_REQUEST, "invalid_engine"),
            (Error::InvalidFilter("x".into()), StatusCode::BAD_REQUEST, "invalid_filter"),
            (Error::InvalidQuery("x".into()), StatusCode::BAD_REQUEST, "invalid_query"),
            (Error::FieldNotFound("synopsis".into()), StatusCode::UNPROCESSABLE_ENTITY, "field_not_found"),
            (Error::ModelUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE, "model_unavailable"),
            (Error::Unavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            (Error::Timeout(10_000), StatusCode::GATEWAY_TIMEOUT, "timeout"),
            (Error::IndexNotFound("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "index_not_found"),
            (
                Error::DimensionMismatch { expected: 768, actual: 64 },
                StatusCode::INTERNAL_SERVER_ERROR,
                "dimension_mismatch",
            ),
            (Error::InconsistentChunk("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            (Error::InvalidConfig("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            (Error::Backend("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            (Error::Other(anyhow::anyhow!("x")), StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        ];
        for (err, status, code) in cases {
            let label = err.to_string();
            assert_eq!(ApiError(err).status_and_code(), (status, code), "{label}");
        }
    }
}
