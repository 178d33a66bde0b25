use facemood_core::InferencePipeline;
use facemood_store::SubmissionStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Shared, read-only application state.
pub struct AppState {
    pub pipeline: InferencePipeline,
    pub store: SubmissionStore,
    /// Directory uploads are written to and served from.
    pub upload_dir: PathBuf,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(pipeline: InferencePipeline, store: SubmissionStore, upload_dir: PathBuf) -> Self {
        Self {
            pipeline,
            store,
            upload_dir,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;
