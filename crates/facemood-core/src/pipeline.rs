//! Inference pipeline: preprocess → classify → arg-max → label.
//!
//! Never fails. Every input produces an [`Outcome`], so the caller can
//! persist and render degraded results the same way as successful ones.

use crate::classifier::ClassifierSlot;
use crate::labels;
use crate::preprocess::{self, PreprocessError};
use crate::profile::ModelProfile;
use crate::types::{Outcome, Prediction};
use ndarray::Array4;
use std::path::Path;

/// Classifies uploaded images with an injected classifier.
#[derive(Debug, Clone)]
pub struct InferencePipeline {
    classifier: ClassifierSlot,
    profile: ModelProfile,
}

impl InferencePipeline {
    pub fn new(classifier: ClassifierSlot, profile: ModelProfile) -> Self {
        if classifier.is_loaded() {
            tracing::info!(
                profile = %profile.name,
                labels = profile.labels.len(),
                width = profile.input_width,
                height = profile.input_height,
                "inference pipeline ready"
            );
        } else {
            tracing::warn!(profile = %profile.name, "inference pipeline running without a model");
        }
        Self { classifier, profile }
    }

    pub fn is_available(&self) -> bool {
        self.classifier.is_loaded()
    }

    pub fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    /// Classify an image file already written to disk.
    pub fn classify_file(&self, path: &Path) -> Outcome {
        self.run(|| preprocess::preprocess_file(path, &self.profile))
    }

    /// Classify an encoded image held in memory.
    pub fn classify_bytes(&self, bytes: &[u8]) -> Outcome {
        self.run(|| preprocess::preprocess(bytes, &self.profile))
    }

    fn run<F>(&self, prepare: F) -> Outcome
    where
        F: FnOnce() -> Result<Array4<f32>, PreprocessError>,
    {
        // Skip all image work when there is nothing to feed it to.
        let ClassifierSlot::Loaded(classifier) = &self.classifier else {
            return Outcome::Unavailable;
        };

        let input = match prepare() {
            Ok(input) => input,
            Err(e) => {
                tracing::warn!(error = %e, "preprocessing failed");
                return Outcome::DecodeError(e.to_string());
            }
        };

        let scores = match classifier.scores(&input) {
            Ok(scores) => scores,
            Err(e) => {
                tracing::warn!(error = %e, "classifier invocation failed");
                return Outcome::InferenceError(e.to_string());
            }
        };

        let Some((index, confidence)) = labels::argmax(&scores) else {
            tracing::warn!(len = scores.len(), "classifier returned no usable scores");
            return Outcome::InferenceError(format!(
                "classifier returned no usable scores ({} values)",
                scores.len()
            ));
        };

        if scores.len() != self.profile.labels.len() {
            tracing::debug!(
                outputs = scores.len(),
                labels = self.profile.labels.len(),
                "output width differs from label table"
            );
        }

        let label = self.profile.label(index).map(str::to_string);
        tracing::debug!(index, confidence, label = ?label, "classified");

        Outcome::Success(Prediction {
            index,
            label,
            confidence,
            scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierError, EmotionClassifier};
    use crate::labels::{FER2013_LABELS, MODEL_NOT_LOADED, PREDICTION_ERROR, UNKNOWN};
    use crate::preprocess::tests::png_bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Returns fixed scores and records the shape it was fed.
    struct FixedScores {
        scores: Vec<f32>,
        calls: Arc<AtomicUsize>,
    }

    impl EmotionClassifier for FixedScores {
        fn scores(&self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
            assert_eq!(input.shape(), &[1, 48, 48, 1]);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.scores.clone())
        }
    }

    struct Failing;

    impl EmotionClassifier for Failing {
        fn scores(&self, _input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
            Err(ClassifierError::InferenceFailed("shape mismatch".into()))
        }
    }

    fn pipeline_with(scores: Vec<f32>) -> (InferencePipeline, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = FixedScores {
            scores,
            calls: calls.clone(),
        };
        (
            InferencePipeline::new(classifier.into(), ModelProfile::default()),
            calls,
        )
    }

    fn one_hot(index: usize, len: usize) -> Vec<f32> {
        (0..len).map(|i| if i == index { 0.94 } else { 0.01 }).collect()
    }

    #[test]
    fn test_happy_face() {
        let (pipeline, calls) = pipeline_with(one_hot(3, 7));
        let outcome = pipeline.classify_bytes(&png_bytes(120, 90, [200, 180, 160]));
        assert_eq!(outcome.emotion(), "happy");
        assert_eq!(outcome.message(), "You are smiling. You seem happy!");
        let p = outcome.prediction().unwrap();
        assert_eq!(p.index, 3);
        assert!((p.confidence - 0.94).abs() < 1e-6);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_every_index_maps_into_label_set() {
        for i in 0..7 {
            let (pipeline, _) = pipeline_with(one_hot(i, 7));
            let outcome = pipeline.classify_bytes(&png_bytes(48, 48, [1, 2, 3]));
            assert_eq!(outcome.emotion(), FER2013_LABELS[i]);
        }
    }

    #[test]
    fn test_index_outside_table_is_unknown() {
        let (pipeline, _) = pipeline_with(one_hot(7, 8));
        let outcome = pipeline.classify_bytes(&png_bytes(48, 48, [0, 0, 0]));
        assert_eq!(outcome.emotion(), UNKNOWN);
        assert_eq!(outcome.prediction().unwrap().index, 7);
    }

    #[test]
    fn test_unavailable_skips_image_work() {
        let pipeline = InferencePipeline::new(ClassifierSlot::Unavailable, ModelProfile::default());
        // Garbage bytes would be a DecodeError if they were looked at.
        let outcome = pipeline.classify_bytes(b"garbage");
        assert!(matches!(outcome, Outcome::Unavailable));
        assert_eq!(outcome.emotion(), MODEL_NOT_LOADED);
        assert!(!pipeline.is_available());
    }

    #[test]
    fn test_decode_error() {
        let (pipeline, calls) = pipeline_with(one_hot(0, 7));
        let outcome = pipeline.classify_bytes(b"not an image");
        assert!(matches!(outcome, Outcome::DecodeError(_)));
        assert_eq!(outcome.emotion(), PREDICTION_ERROR);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let (pipeline, _) = pipeline_with(one_hot(0, 7));
        let outcome = pipeline.classify_file(Path::new("/nonexistent/upload.png"));
        assert!(matches!(outcome, Outcome::DecodeError(_)));
    }

    #[test]
    fn test_classifier_failure_is_inference_error() {
        let pipeline = InferencePipeline::new(Failing.into(), ModelProfile::default());
        let outcome = pipeline.classify_bytes(&png_bytes(48, 48, [9, 9, 9]));
        assert!(matches!(outcome, Outcome::InferenceError(_)));
        assert_eq!(outcome.emotion(), PREDICTION_ERROR);
        assert!(outcome.error().unwrap().contains("shape mismatch"));
    }

    #[test]
    fn test_empty_scores_is_inference_error() {
        let (pipeline, _) = pipeline_with(vec![]);
        let outcome = pipeline.classify_bytes(&png_bytes(48, 48, [9, 9, 9]));
        assert!(matches!(outcome, Outcome::InferenceError(_)));
    }

    #[test]
    fn test_classify_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        std::fs::write(&path, png_bytes(60, 60, [90, 90, 90])).unwrap();

        let (pipeline, _) = pipeline_with(one_hot(6, 7));
        assert_eq!(pipeline.classify_file(&path).emotion(), "neutral");
    }
}
