use crate::{model_service::ModelService, server::AppState};
use axum::{extract::State, response::Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct RootStatus {
    status: String,
    message: String,
    model_loaded: bool,
}

pub async fn root<M: ModelService>(State(state): State<AppState<M>>) -> Json<RootStatus> {
    Json(RootStatus {
        status: "online".into(),
        message: "Eyessistant API is running".into(),
        model_loaded: state.model.is_some(),
    })
}
