use thiserror::Error;

/// Class index to label mapping the model was trained with.
pub const CLASS_LABELS: [&str; 2] = ["normal", "catarata"];

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
    pub class_index: usize,
}

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Converts raw model logits into a labeled prediction.
///
/// The confidence is the softmax probability of the winning class, rounded
/// to 4 decimal digits. An index outside the label table maps to "unknown".
pub fn postprocess(logits: &[f32]) -> Prediction {
    let probs = softmax(logits);

    let (class_index, _) = logits
        .iter()
        .copied()
        .enumerate()
        .reduce(|best, current| if current.1 > best.1 { current } else { best })
        .unwrap_or((0, 0.0));

    let confidence = round_confidence(probs.get(class_index).copied().unwrap_or(0.0));
    let label = CLASS_LABELS
        .get(class_index)
        .copied()
        .unwrap_or("unknown")
        .to_string();

    Prediction {
        label,
        confidence,
        class_index,
    }
}

// Subtracting the max logit before exponentiating keeps exp() bounded,
// a naive softmax overflows to NaN on large logits.
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp_values: Vec<f32> = logits.iter().map(|&x| (x - max_logit).exp()).collect();
    let sum: f32 = exp_values.iter().sum();

    exp_values.iter().map(|&x| x / sum).collect()
}

fn round_confidence(probability: f32) -> f32 {
    (probability * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_zero_logits_is_uniform() {
        let probs = softmax(&[0.0, 0.0]);

        assert_eq!(probs, vec![0.5, 0.5]);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[2.3, -1.7]);
        let sum: f32 = probs.iter().sum();

        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_softmax_extreme_logits_no_overflow() {
        let probs = softmax(&[1000.0, -1000.0]);

        assert!(probs.iter().all(|p| p.is_finite()));
        assert_eq!(probs[0], 1.0);
        assert_eq!(probs[1], 0.0);
    }

    #[test]
    fn test_postprocess_picks_argmax() {
        let prediction = postprocess(&[-0.4, 1.2]);

        assert_eq!(prediction.class_index, 1);
        assert_eq!(prediction.label, "catarata");
        assert!(prediction.confidence > 0.5);
    }

    #[test]
    fn test_postprocess_zero_logits_is_half_confidence_normal() {
        let prediction = postprocess(&[0.0, 0.0]);

        assert_eq!(prediction.class_index, 0);
        assert_eq!(prediction.label, "normal");
        assert_eq!(prediction.confidence, 0.5);
    }

    #[test]
    fn test_postprocess_rounds_to_four_digits() {
        let prediction = postprocess(&[1.0, 0.0]);

        // softmax([1, 0])[0] = 0.73105857..., rounded to 0.7311
        assert_eq!(prediction.confidence, 0.7311);
    }

    #[test]
    fn test_postprocess_out_of_table_index_is_unknown() {
        let prediction = postprocess(&[0.0, 1.0, 2.0]);

        assert_eq!(prediction.class_index, 2);
        assert_eq!(prediction.label, "unknown");
    }

    #[test]
    fn test_postprocess_is_deterministic() {
        let logits = [0.8, -0.3];

        assert_eq!(postprocess(&logits), postprocess(&logits));
    }
}
