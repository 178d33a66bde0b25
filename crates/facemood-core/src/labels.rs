//! Emotion labels, sentinel values and the label → message dictionary.

use std::borrow::Cow;

/// Output order of the reference FER-2013 network.
pub const FER2013_LABELS: [&str; 7] = ["angry", "disgust", "fear", "happy", "sad", "surprise", "neutral"];

/// No classifier was available for this process.
pub const MODEL_NOT_LOADED: &str = "model_not_loaded";
/// Decoding, preprocessing or inference failed.
pub const PREDICTION_ERROR: &str = "prediction_error";
/// The arg-max index fell outside the label table.
pub const UNKNOWN: &str = "unknown";

/// Advisory shown when the classifier is unavailable.
pub const MODEL_NOT_LOADED_MESSAGE: &str =
    "Model not loaded. Please ensure the model file is present or the server has internet access to auto-download it.";

const MESSAGES: [(&str, &str); 8] = [
    ("happy", "You are smiling. You seem happy!"),
    ("sad", "You are frowning. Why are you sad?"),
    ("angry", "You look angry. Take a deep breath — breathe in, breathe out."),
    ("surprise", "You look surprised! What happened?"),
    ("fear", "You seem worried or afraid. Are you okay?"),
    ("disgust", "You look displeased. Is something bothering you?"),
    ("neutral", "You look calm and neutral."),
    (MODEL_NOT_LOADED, MODEL_NOT_LOADED_MESSAGE),
];

/// Whether a label is one of the degraded-outcome sentinels.
pub fn is_sentinel(label: &str) -> bool {
    matches!(label, MODEL_NOT_LOADED | PREDICTION_ERROR | UNKNOWN)
}

/// Human-readable sentence for a label or sentinel.
///
/// Total over all inputs: labels without a dedicated sentence get
/// `Emotion detected: <label>`.
pub fn friendly_message(label: &str) -> Cow<'static, str> {
    MESSAGES
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, msg)| Cow::Borrowed(*msg))
        .unwrap_or_else(|| Cow::Owned(format!("Emotion detected: {label}")))
}

/// Index and value of the largest score. NaN entries never win.
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, s)| !s.is_nan())
        .fold(None, |best, (i, s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
}
