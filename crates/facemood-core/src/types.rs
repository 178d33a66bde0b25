use crate::labels::{self, MODEL_NOT_LOADED, PREDICTION_ERROR, UNKNOWN};
use serde::Serialize;
use std::borrow::Cow;

/// A completed classification.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    /// Arg-max index into the classifier output.
    pub index: usize,
    /// Label for `index`, or `None` when the label table does not cover it.
    pub label: Option<String>,
    /// Score at `index`.
    pub confidence: f32,
    /// Raw output distribution.
    pub scores: Vec<f32>,
}

impl Prediction {
    /// Label, or `unknown` when the index fell outside the label table.
    pub fn emotion(&self) -> &str {
        self.label.as_deref().unwrap_or(UNKNOWN)
    }
}

/// Result of one pass through the inference pipeline.
///
/// Every variant is a normal outcome: callers persist and render all of
/// them, only the emotion label differs.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success(Prediction),
    /// No classifier was loaded for this process.
    Unavailable,
    /// The upload could not be read, decoded or resized.
    DecodeError(String),
    /// The classifier rejected the input or returned unusable output.
    InferenceError(String),
}

impl Outcome {
    /// Emotion label to persist: a profile label or one of the sentinels.
    pub fn emotion(&self) -> &str {
        match self {
            Outcome::Success(p) => p.emotion(),
            Outcome::Unavailable => MODEL_NOT_LOADED,
            Outcome::DecodeError(_) | Outcome::InferenceError(_) => PREDICTION_ERROR,
        }
    }

    /// Human-readable message for the result page.
    pub fn message(&self) -> Cow<'static, str> {
        labels::friendly_message(self.emotion())
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        match self {
            Outcome::Success(p) => Some(p),
            _ => None,
        }
    }

    /// Error detail for degraded outcomes.
    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::DecodeError(e) | Outcome::InferenceError(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(index: usize, label: Option<&str>) -> Prediction {
        Prediction {
            index,
            label: label.map(str::to_string),
            confidence: 0.9,
            scores: vec![],
        }
    }

    #[test]
    fn test_success_emotion() {
        let outcome = Outcome::Success(prediction(3, Some("happy")));
        assert_eq!(outcome.emotion(), "happy");
        assert_eq!(outcome.message(), "You are smiling. You seem happy!");
        assert!(outcome.error().is_none());
    }

    #[test]
    fn test_unlabelled_index_is_unknown() {
        let outcome = Outcome::Success(prediction(9, None));
        assert_eq!(outcome.emotion(), UNKNOWN);
        assert_eq!(outcome.message(), "Emotion detected: unknown");
    }

    #[test]
    fn test_sentinel_outcomes() {
        assert_eq!(Outcome::Unavailable.emotion(), MODEL_NOT_LOADED);
        assert_eq!(Outcome::DecodeError("bad".into()).emotion(), PREDICTION_ERROR);
        assert_eq!(Outcome::InferenceError("bad".into()).emotion(), PREDICTION_ERROR);
        assert_eq!(Outcome::InferenceError("boom".into()).error(), Some("boom"));
        assert!(Outcome::Unavailable.prediction().is_none());
    }
}
