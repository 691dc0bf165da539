use crate::{
    model_service::ModelService,
    prediction::PredictionError,
    routes::PredictionResponse,
    server::AppState,
};
use axum::{
    body::Bytes,
    extract::{
        multipart::{Multipart, MultipartRejection},
        State,
    },
    response::Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use tracing::instrument;

/// Predicts cataract presence from a multipart image upload.
#[instrument(skip(state, multipart))]
pub async fn predict<M: ModelService>(
    State(state): State<AppState<M>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, PredictionError> {
    // checked before touching the body so a broken payload cannot turn
    // degraded mode into an error
    let Some(model) = state.model.as_ref() else {
        tracing::warn!("predict: model not loaded, returning fallback result");
        return Ok(Json(fallback_response("Model not available - fallback result")));
    };

    let multipart = multipart
        .map_err(|e| PredictionError::Decode(format!("invalid multipart request: {}", e)))?;
    let image_data = read_image_field(multipart).await?;

    let prediction = run_prediction(model.as_ref(), &image_data)?;
    let message = format!(
        "Analysis completed with {:.1}% confidence",
        prediction.confidence * 100.0
    );

    Ok(Json(PredictionResponse {
        prediction: prediction.label,
        confidence: prediction.confidence,
        class_index: prediction.class_index,
        message,
    }))
}

#[derive(Deserialize, Default)]
pub struct PredictBase64Request {
    #[serde(default)]
    image: String,
}

/// Predicts cataract presence from a JSON body carrying a base64 image.
#[instrument(skip(state, body))]
pub async fn predict_base64<M: ModelService>(
    State(state): State<AppState<M>>,
    body: Bytes,
) -> Result<Json<PredictionResponse>, PredictionError> {
    let Some(model) = state.model.as_ref() else {
        tracing::warn!("predict-base64: model not loaded, returning fallback result");
        return Ok(Json(fallback_response("Model not available")));
    };

    // an unparseable body is treated the same as a missing field
    let request: PredictBase64Request = serde_json::from_slice(&body).unwrap_or_default();
    if request.image.is_empty() {
        return Err(PredictionError::Decode(
            "the 'image' field (base64) is required".to_string(),
        ));
    }

    let image_data = STANDARD
        .decode(request.image.as_bytes())
        .map_err(|e| PredictionError::Decode(format!("invalid base64 image: {}", e)))?;

    let prediction = run_prediction(model.as_ref(), &image_data)?;
    let message = format!("Analysis completed: {}", prediction.label);

    Ok(Json(PredictionResponse {
        prediction: prediction.label,
        confidence: prediction.confidence,
        class_index: prediction.class_index,
        message,
    }))
}

/// The single pipeline both predict endpoints feed already-extracted image
/// bytes into.
fn run_prediction<M: ModelService>(
    model: &M,
    image_data: &[u8],
) -> Result<crate::prediction::Prediction, PredictionError> {
    let prediction = model.predict(image_data)?;
    tracing::info!(
        "Prediction: {} (confidence: {:.4})",
        prediction.label,
        prediction.confidence
    );

    Ok(prediction)
}

async fn read_image_field(mut multipart: Multipart) -> Result<Vec<u8>, PredictionError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PredictionError::Decode(format!("invalid multipart request: {}", e)))?
    {
        if field.name() == Some("file") || field.file_name().is_some() {
            let data = field
                .bytes()
                .await
                .map_err(|e| PredictionError::Decode(format!("failed to read upload: {}", e)))?;
            return Ok(data.to_vec());
        }
    }

    Err(PredictionError::Decode(
        "missing image file field".to_string(),
    ))
}

fn fallback_response(message: &str) -> PredictionResponse {
    PredictionResponse {
        prediction: "normal".to_string(),
        confidence: 0.5,
        class_index: 0,
        message: message.to_string(),
    }
}
