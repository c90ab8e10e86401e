//! Turn network output into a labeled prediction.
//!
use common::{labels, protocol::Prediction};

use crate::{nn::ClassProbabilities, SignError};

/// Resolve the most probable class to its label.
///
/// Confidence is the class probability in percent, rounded to two decimals. A network output
/// without any finite probability is an inference error.
pub fn resolve(probabilities: &ClassProbabilities) -> Result<Prediction, SignError> {
    let (class_id, probability) = probabilities.argmax();
    if !probability.is_finite() {
        return Err(SignError::Inference(format!(
            "best class {} has probability {}",
            class_id, probability
        )));
    }
    let label = labels::label(class_id).ok_or(SignError::UnknownClass(class_id))?;

    Ok(Prediction {
        class_id,
        label: label.to_owned(),
        confidence: to_percent(probability),
    })
}

fn to_percent(probability: f32) -> f64 {
    (f64::from(probability) * 10_000.0).round() / 100.0
}

#[cfg(test)]
mod test {
    use super::*;
    use common::labels::{LABELS, NUM_CLASSES};

    fn peaked(index: usize, value: f32) -> ClassProbabilities {
        let mut values = [(1.0 - value) / (NUM_CLASSES - 1) as f32; NUM_CLASSES];
        values[index] = value;
        ClassProbabilities::new(values)
    }

    #[test]
    fn test_every_class_resolves_to_its_label() -> Result<(), SignError> {
        for (class_id, label) in LABELS.iter().enumerate() {
            let prediction = resolve(&peaked(class_id, 0.8))?;
            assert_eq!(prediction.class_id, class_id);
            assert_eq!(prediction.label, *label);
            assert_eq!(prediction.confidence, 80.0);
        }

        Ok(())
    }

    #[test]
    fn test_table_boundaries() -> Result<(), SignError> {
        assert_eq!(resolve(&peaked(0, 0.5))?.label, "Speed limit (20km/h)");
        assert_eq!(
            resolve(&peaked(42, 0.5))?.label,
            "End of no passing for vehicles > 3.5 tons"
        );

        Ok(())
    }

    #[test]
    fn test_non_finite_output_is_rejected() {
        let all_nan = ClassProbabilities::new([f32::NAN; NUM_CLASSES]);
        assert!(matches!(resolve(&all_nan), Err(SignError::Inference(_))));

        let mut values = [0.1; NUM_CLASSES];
        values[5] = f32::INFINITY;
        assert!(matches!(
            resolve(&ClassProbabilities::new(values)),
            Err(SignError::Inference(_))
        ));

        // A single NaN next to finite values still resolves.
        let mut values = [0.0; NUM_CLASSES];
        values[0] = f32::NAN;
        values[9] = 0.6;
        assert_eq!(resolve(&ClassProbabilities::new(values)).unwrap().class_id, 9);
    }

    #[test]
    fn test_confidence_rounding() {
        assert_eq!(to_percent(0.97314), 97.31);
        assert_eq!(to_percent(0.97316), 97.32);
        assert_eq!(to_percent(1.0), 100.0);
        assert_eq!(to_percent(0.0), 0.0);
        assert_eq!(to_percent(0.9), 90.0);
    }
}
