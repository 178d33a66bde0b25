//! facemood-core: Facial emotion classification engine.
//!
//! Decodes an uploaded photo, reduces it to the classifier's grayscale
//! input tensor, runs an ONNX emotion model and maps the result to a
//! label and a friendly message.

pub mod artifact;
pub mod classifier;
pub mod labels;
pub mod pipeline;
pub mod preprocess;
pub mod profile;
pub mod types;

pub use artifact::{ensure_artifact, ArtifactStatus};
pub use classifier::{ClassifierSlot, EmotionClassifier, OnnxClassifier};
pub use pipeline::InferencePipeline;
pub use profile::ModelProfile;
pub use types::{Outcome, Prediction};
