//! JSON error bodies: `{"error": {"message", "type", "code"}}`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::error::ScoringError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorType {
    InvalidRequestError,
    ServerError,
    ServiceUnavailableError,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub message:    String,
    #[serde(rename = "type")]
    pub error_type: ApiErrorType,
    pub code:       &'static str,
}

#[derive(Debug)]
pub struct ApiError {
    pub status:   StatusCode,
    pub response: ApiErrorResponse,
}

impl ApiError {
    pub fn new(
        status:     StatusCode,
        error_type: ApiErrorType,
        code:       &'static str,
        message:    impl Into<String>,
    ) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                error: ApiErrorDetail { message: message.into(), error_type, code },
            },
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ApiErrorType::InvalidRequestError, code, message)
    }

    pub fn unprocessable(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            ApiErrorType::InvalidRequestError,
            code,
            message,
        )
    }

    pub fn unavailable(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorType::ServiceUnavailableError,
            code,
            message,
        )
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ApiErrorType::ServerError, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<ScoringError> for ApiError {
    fn from(err: ScoringError) -> Self {
        let message = err.to_string();
        match err {
            ScoringError::Schema(_) => Self::unprocessable("schema_mismatch", message),
            ScoringError::UnknownModel(_) => Self::bad_request("unknown_model", message),
            ScoringError::InvalidThreshold(_) => Self::bad_request("invalid_threshold", message),
            ScoringError::ModelUnavailable(_) => Self::unavailable("model_unavailable", message),
            ScoringError::InvalidProbability(_) => {
                tracing::error!("{message}");
                Self::internal("invalid_probability", message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::{SchemaIssue, SchemaMismatch};

    #[test]
    fn test_status_mapping() {
        let schema = SchemaMismatch::single(SchemaIssue::MissingField { field: "plan".into() });
        assert_eq!(ApiError::from(ScoringError::from(schema)).status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            ApiError::from(ScoringError::UnknownModel("rf".into())).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ScoringError::InvalidThreshold(2.0)).status,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_body_shape() {
        let err = ApiError::from(ScoringError::UnknownModel("rf".into()));
        let json = serde_json::to_value(&err.response).unwrap();
        assert_eq!(json["error"]["type"], "invalid_request_error");
        assert_eq!(json["error"]["code"], "unknown_model");
        assert!(json["error"]["message"].as_str().unwrap().contains("rf"));
    }
}
