mod health;
mod predict;
mod root;

use crate::{model_service::ModelService, prediction::PredictionError, server::AppState};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;

pub fn api_routes<M: ModelService>() -> Router<AppState<M>> {
    Router::new()
        .route("/", get(root::root::<M>))
        .route("/health", get(health::healthcheck::<M>))
        .route("/predict", post(predict::predict::<M>))
        .route("/predict-base64", post(predict::predict_base64::<M>))
}

#[derive(Serialize)]
pub struct PredictionResponse {
    pub prediction: String,
    pub confidence: f32,
    pub class_index: usize,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for PredictionError {
    fn into_response(self) -> Response {
        tracing::error!("prediction request failed: {}", self);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                detail: format!("Error processing image: {}", self),
            }),
        )
            .into_response()
    }
}
