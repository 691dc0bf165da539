use crate::{model_service::ModelService, server::AppState};
use axum::{extract::State, response::Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthStatus {
    status: String,
    model: String,
}

pub async fn healthcheck<M: ModelService>(State(state): State<AppState<M>>) -> Json<HealthStatus> {
    let status = if state.model.is_some() {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(HealthStatus {
        status: status.into(),
        model: "catarata_detection".into(),
    })
}
