//! Schema and predict endpoints

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::error::ApiError;
use crate::api::json::Json as ApiJson;
use crate::api::state::AppState;
use crate::application::predict_use_case::{PredictOutcome, PredictRequest};
use crate::domain::error::ScoringError;
use crate::domain::prediction::ModelKind;
use crate::domain::record::FeatureRecord;
use crate::domain::schema::FeatureSchema;

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub version:     u32,
    pub fingerprint: String,
    pub models:      Vec<ModelKind>,
    pub schema:      FeatureSchema,
}

pub async fn schema(State(state): State<AppState>) -> Json<SchemaResponse> {
    let inferencer = state.predict.inferencer();
    Json(SchemaResponse {
        version:     inferencer.version(),
        fingerprint: inferencer.schema().fingerprint(),
        models:      inferencer.available(),
        schema:      inferencer.schema().clone(),
    })
}

/// Wire form of a predict call. Feature values stay raw JSON until
/// they are typed, so `null` or `true` is reported as a schema problem.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictBody {
    pub features:  Map<String, Value>,
    #[serde(default)]
    pub model:     Option<String>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub autofix:   Option<bool>,
}

impl TryFrom<PredictBody> for PredictRequest {
    type Error = ScoringError;

    fn try_from(body: PredictBody) -> Result<Self, Self::Error> {
        Ok(PredictRequest {
            features:  FeatureRecord::try_from(body.features)?,
            model:     body.model,
            threshold: body.threshold,
            autofix:   body.autofix,
        })
    }
}

pub async fn predict(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PredictBody>,
) -> Result<Json<PredictOutcome>, ApiError> {
    let outcome = PredictRequest::try_from(body)
        .and_then(|request| state.predict.predict(request))
        .map_err(|e| {
            tracing::info!("Rejected prediction request: {e}");
            ApiError::from(e)
        })?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        extract::FromRequest,
        http::{Request, StatusCode},
        response::IntoResponse,
    };

    use crate::api::health::health_check;
    use crate::application::predict_use_case::PredictUseCase;
    use crate::domain::prediction::Threshold;
    use crate::ml::inferencer::tests::inferencer;

    fn state() -> AppState {
        let uc = PredictUseCase::new(inferencer().into(), ModelKind::Gbt, Threshold::default());
        AppState::new(uc)
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Run the body through the extractor, then the handler.
    async fn post_predict(body: &'static str) -> axum::response::Response {
        let req = Request::builder()
            .method("POST")
            .uri("/api/predict")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        match ApiJson::<PredictBody>::from_request(req, &()).await {
            Ok(extracted) => match predict(State(state()), extracted).await {
                Ok(json) => json.into_response(),
                Err(e) => e.into_response(),
            },
            Err(e) => e.into_response(),
        }
    }

    fn assert_error_shape(json: &Value, code: &str) {
        assert_eq!(json["error"]["code"], code);
        assert_eq!(json["error"]["type"], "invalid_request_error");
        assert!(json["error"]["message"].is_string());
    }

    #[tokio::test]
    async fn test_health() {
        let resp = health_check().await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_schema_lists_models_and_fingerprint() {
        let st = state();
        let Json(resp) = schema(State(st.clone())).await;
        assert_eq!(resp.fingerprint, st.predict.inferencer().schema().fingerprint());
        assert_eq!(resp.models, vec![ModelKind::Gbt, ModelKind::Logreg]);
    }

    #[tokio::test]
    async fn test_predict_ok() {
        let resp = post_predict(r#"{"features": {"sessions": 5, "tokens": 10, "plan": "A"}}"#).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let p = json["churn_probability"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&p));
        assert_eq!(json["model"], "gbt");
        assert!(json["fixes"].is_array());
    }

    #[tokio::test]
    async fn test_predict_missing_field_is_422() {
        let resp = post_predict(r#"{"features": {"sessions": 5, "tokens": 10}}"#).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(resp).await;
        assert_error_shape(&json, "schema_mismatch");
        assert!(json["error"]["message"].as_str().unwrap().contains("plan"));
    }

    #[tokio::test]
    async fn test_null_feature_value_is_a_schema_mismatch() {
        let resp = post_predict(r#"{"features": {"sessions": 5, "tokens": 10, "plan": null}}"#).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(resp).await;
        assert_error_shape(&json, "schema_mismatch");
        assert!(json["error"]["message"].as_str().unwrap().contains("'plan'"));
    }

    #[tokio::test]
    async fn test_malformed_bodies_get_json_errors() {
        for body in [
            r#"{"features": {"sessions": 5, "tokens": 10, "plan": "A"}, "threshold": "high"}"#,
            r#"{"model": "gbt"}"#,
            r#"{"features": {"sessions": 5, "tokens": 10, "plan": "A"}, "treshold": 0.9}"#,
        ] {
            let resp = post_predict(body).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
            assert_error_shape(&body_json(resp).await, "invalid_request");
        }
    }

    #[tokio::test]
    async fn test_predict_bad_threshold_is_400() {
        let resp =
            post_predict(r#"{"features": {"sessions": 5, "tokens": 10, "plan": "A"}, "threshold": -0.1}"#).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_error_shape(&body_json(resp).await, "invalid_threshold");
    }
}
