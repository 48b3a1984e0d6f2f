//! JSON extractor whose rejections use the API error body

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json as AxumJson,
};
use serde::de::DeserializeOwned;

use super::error::{ApiError, ApiErrorType};

/// Drop-in for `axum::Json` on request bodies. A body that cannot be
/// read or deserialised becomes an `ApiError`, never a text/plain reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<S, T> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match AxumJson::<T>::from_request(req, state).await {
            Ok(AxumJson(value)) => Ok(Json(value)),
            Err(rejection) => Err(rejection_to_error(&rejection)),
        }
    }
}

fn rejection_to_error(rejection: &JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            ApiError::bad_request("invalid_request", format!("Invalid request body: {}", err.body_text()))
        }
        JsonRejection::JsonSyntaxError(err) => {
            ApiError::bad_request("json_parse_error", format!("Invalid JSON syntax: {}", err.body_text()))
        }
        JsonRejection::MissingJsonContentType(_) => ApiError::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiErrorType::InvalidRequestError,
            "unsupported_media_type",
            "Missing Content-Type header. Expected 'application/json'.",
        ),
        other => ApiError::new(
            other.status(),
            ApiErrorType::InvalidRequestError,
            "invalid_request",
            other.body_text(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, response::IntoResponse};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct ThresholdBody {
        threshold: f64,
    }

    fn request(content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = axum::http::Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_valid_body_is_extracted() {
        let Json(b) = Json::<ThresholdBody>::from_request(request(Some("application/json"), r#"{"threshold": 0.5}"#), &())
            .await
            .unwrap();
        assert_eq!(b.threshold, 0.5);
    }

    #[tokio::test]
    async fn test_rejections_are_api_errors() {
        let wrong_type = Json::<ThresholdBody>::from_request(
            request(Some("application/json"), r#"{"threshold": "high"}"#),
            &(),
        )
        .await
        .unwrap_err();
        assert_eq!(wrong_type.status, StatusCode::BAD_REQUEST);
        assert_eq!(wrong_type.response.error.code, "invalid_request");

        let syntax = Json::<ThresholdBody>::from_request(request(Some("application/json"), "{"), &())
            .await
            .unwrap_err();
        assert_eq!(syntax.response.error.code, "json_parse_error");

        let no_type = Json::<ThresholdBody>::from_request(request(None, "{}"), &()).await.unwrap_err();
        assert_eq!(no_type.into_response().status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
