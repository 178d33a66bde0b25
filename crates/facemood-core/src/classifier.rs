//! Emotion classifier via ONNX Runtime.
//!
//! Wraps a single-input, single-output network that maps a preprocessed
//! grayscale batch to a score per label.

use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("classifier session lock poisoned")]
    Poisoned,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Anything that can score a preprocessed batch against a label table.
pub trait EmotionClassifier: Send + Sync {
    /// Return one score per output class for a single-item batch.
    fn scores(&self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError>;
}

/// ONNX Runtime backed classifier.
pub struct OnnxClassifier {
    // `Session::run` needs exclusive access.
    session: Mutex<Session>,
}

impl OnnxClassifier {
    /// Load an ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, ClassifierError> {
        if !Path::new(model_path).exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded emotion model"
        );

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl EmotionClassifier for OnnxClassifier {
    fn scores(&self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
        let mut session = self.session.lock().map_err(|_| ClassifierError::Poisoned)?;

        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::InferenceFailed(format!("score extraction: {e}")))?;

        Ok(raw.to_vec())
    }
}

/// Process-wide classifier handle, decided once at startup.
#[derive(Clone)]
pub enum ClassifierSlot {
    Loaded(Arc<dyn EmotionClassifier>),
    Unavailable,
}

impl ClassifierSlot {
    /// Load an ONNX classifier, degrading to `Unavailable` on any failure.
    pub fn load_onnx(model_path: &Path) -> Self {
        let path = model_path.to_string_lossy();
        match OnnxClassifier::load(&path) {
            Ok(classifier) => ClassifierSlot::Loaded(Arc::new(classifier)),
            Err(e) => {
                tracing::warn!(
                    path = %path,
                    error = %e,
                    "could not load emotion model; predictions will report model_not_loaded"
                );
                ClassifierSlot::Unavailable
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, ClassifierSlot::Loaded(_))
    }
}

impl<C: EmotionClassifier + 'static> From<C> for ClassifierSlot {
    fn from(classifier: C) -> Self {
        ClassifierSlot::Loaded(Arc::new(classifier))
    }
}

impl std::fmt::Debug for ClassifierSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierSlot::Loaded(_) => f.write_str("Loaded"),
            ClassifierSlot::Unavailable => f.write_str("Unavailable"),
        }
    }
}
