use crate::prediction::{Prediction, PredictionError};

/// Seam between the HTTP layer and the inference backend. Implementations
/// must be safe to call from many requests at once.
pub trait ModelService: Send + Sync + 'static {
    fn predict(&self, image_data: &[u8]) -> Result<Prediction, PredictionError>;
}
