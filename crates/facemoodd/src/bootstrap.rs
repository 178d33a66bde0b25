//! Startup: directories, schema, model artifact and classifier.

use crate::config::Config;
use crate::state::{AppState, SharedState};
use anyhow::{Context, Result};
use facemood_core::artifact::{self, ArtifactFetcher};
use facemood_core::{ensure_artifact, ClassifierSlot, InferencePipeline, ModelProfile};
use facemood_store::SubmissionStore;
use std::sync::Arc;

/// Prepare everything the routes need, using the default fetchers.
pub async fn bootstrap(config: &Config) -> Result<SharedState> {
    bootstrap_with(config, artifact::default_fetchers).await
}

/// Like [`bootstrap`] with a custom fetcher chain.
///
/// Fetchers are built on the blocking pool, so `fetchers` may construct
/// blocking HTTP clients.
pub async fn bootstrap_with<F>(config: &Config, fetchers: F) -> Result<SharedState>
where
    F: FnOnce() -> Vec<Box<dyn ArtifactFetcher>> + Send + 'static,
{
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("failed to create upload dir {}", config.upload_dir.display()))?;

    let store = SubmissionStore::new(&config.db_path);
    store
        .init_schema()
        .await
        .with_context(|| format!("failed to initialize database {}", config.db_path.display()))?;

    let profile = config
        .profile()
        .with_context(|| format!("invalid model profile {:?}", config.model_profile))?;

    let classifier = load_classifier(config, &profile, fetchers).await;

    Ok(Arc::new(AppState::new(
        InferencePipeline::new(classifier, profile),
        store,
        config.upload_dir.clone(),
    )))
}

/// Download (if allowed) and load the classifier. Never fails.
async fn load_classifier<F>(config: &Config, profile: &ModelProfile, fetchers: F) -> ClassifierSlot
where
    F: FnOnce() -> Vec<Box<dyn ArtifactFetcher>> + Send + 'static,
{
    let model_path = config.model_path.clone();
    let profile = profile.clone();
    let auto_download = config.auto_download;

    let loaded = tokio::task::spawn_blocking(move || {
        if auto_download {
            ensure_artifact(&model_path, &profile, &fetchers());
        } else if !model_path.exists() {
            tracing::warn!(path = %model_path.display(), "model artifact missing and auto-download disabled");
        }
        ClassifierSlot::load_onnx(&model_path)
    })
    .await;

    loaded.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "model loading task failed");
        ClassifierSlot::Unavailable
    })
}
