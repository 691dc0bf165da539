use crate::{
    config::ModelConfig,
    model_service::ModelService,
    prediction::{postprocess, Prediction, PredictionError, CLASS_LABELS},
};
use image::{imageops::FilterType, GenericImageView};
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

/// Decodes raw image bytes into the `[1, 3, 224, 224]` tensor the model
/// expects: RGB, stretched to 224x224, scaled to `[0, 1]`, channel-first.
/// No mean/std normalization is applied, matching how the model was trained.
fn preprocess(image_data: &[u8]) -> Result<Array<f32, Ix4>, PredictionError> {
    let image_reader = image::ImageReader::new(std::io::Cursor::new(image_data))
        .with_guessed_format()
        .map_err(|e| PredictionError::Decode(format!("error reading image: {}", e)))?;

    let original_img = image_reader
        .decode()
        .map_err(|e| PredictionError::Decode(format!("error decoding image: {}", e)))?;

    let img = original_img.resize_exact(224, 224, FilterType::CatmullRom);

    let mut input = Array::zeros((1, 3, 224, 224));
    for pixel in img.pixels() {
        let x = pixel.0 as _;
        let y = pixel.1 as _;
        // grayscale is expanded and alpha dropped here, the model only ever
        // sees three channels
        let [r, g, b, _] = pixel.2 .0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    Ok(input)
}

#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, Box<dyn std::error::Error>> {
        ort::init().commit()?;

        let num_instances = model_config.num_instances;
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_config.get_model_path())?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}",
            num_instances,
            model_config.get_model_path()
        );

        Ok(Self {
            counter: Arc::new(AtomicUsize::new(0)),
            sessions: Arc::new(sessions),
        })
    }

    fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<Vec<f32>, PredictionError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let session_arc = &self.sessions[index];
        let mut session = session_arc
            .lock()
            .map_err(|e| PredictionError::Inference(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);
        let output_name = session.outputs[0].name.clone();

        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| PredictionError::Inference(format!("failed to build tensor: {}", e)))?;

        let input_tensor = ort::inputs![tensor_ref];

        let outputs = session
            .run(input_tensor)
            .map_err(|e| PredictionError::Inference(format!("inference failed: {}", e)))?;

        let (shape, data) = outputs[output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| PredictionError::Inference(format!("failed to extract tensor: {}", e)))?;

        if data.len() != CLASS_LABELS.len() {
            return Err(PredictionError::Inference(format!(
                "unexpected output shape {:?}",
                shape
            )));
        }

        Ok(data.to_vec())
    }
}

impl ModelService for OrtModelService {
    fn predict(&self, image_data: &[u8]) -> Result<Prediction, PredictionError> {
        let input = preprocess(image_data)?;
        let logits = self.run_inference(&input)?;

        Ok(postprocess(&logits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb, Rgba};
    use std::io::Cursor;

    fn encode_png(img: image::DynamicImage) -> Vec<u8> {
        let mut image_data: Vec<u8> = Vec::new();
        let mut cursor = Cursor::new(&mut image_data);
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        image_data
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 150, Rgb([255, 0, 0]));
        let image_data = encode_png(img.into());

        let input = preprocess(&image_data).unwrap();

        assert_eq!(input.shape(), &[1, 3, 224, 224]);
        assert!(input.iter().all(|&v| (0.0..=1.0).contains(&v)));
        // a uniformly red image stays red after resizing
        assert_eq!(input[[0, 0, 0, 0]], 1.0);
        assert_eq!(input[[0, 1, 0, 0]], 0.0);
        assert_eq!(input[[0, 2, 0, 0]], 0.0);
    }

    #[test]
    fn test_preprocess_expands_grayscale_to_three_channels() {
        let img = ImageBuffer::<Luma<u8>, Vec<u8>>::from_pixel(64, 64, Luma([51]));
        let image_data = encode_png(img.into());

        let input = preprocess(&image_data).unwrap();

        assert_eq!(input.shape(), &[1, 3, 224, 224]);
        assert_eq!(input[[0, 0, 112, 112]], 51.0 / 255.0);
        assert_eq!(input[[0, 1, 112, 112]], 51.0 / 255.0);
        assert_eq!(input[[0, 2, 112, 112]], 51.0 / 255.0);
    }

    #[test]
    fn test_preprocess_drops_alpha() {
        let img = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_pixel(32, 32, Rgba([0, 255, 0, 10]));
        let image_data = encode_png(img.into());

        let input = preprocess(&image_data).unwrap();

        // alpha is discarded, not composited
        assert_eq!(input[[0, 0, 16, 16]], 0.0);
        assert_eq!(input[[0, 1, 16, 16]], 1.0);
        assert_eq!(input[[0, 2, 16, 16]], 0.0);
    }

    #[test]
    fn test_preprocess_rejects_non_image_bytes() {
        let result = preprocess(b"definitely not an image");

        assert!(matches!(result, Err(PredictionError::Decode(_))));
    }
}
