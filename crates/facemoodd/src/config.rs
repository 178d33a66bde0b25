use facemood_core::profile::{ModelProfile, ProfileError, DEFAULT_PROFILE};
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address to listen on (default: 0.0.0.0:5000).
    pub bind_addr: String,
    /// Directory uploaded photos are written to and served from.
    pub upload_dir: PathBuf,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Local path of the classifier artifact.
    pub model_path: PathBuf,
    /// Built-in profile name or path to a profile TOML.
    pub model_profile: String,
    /// Overrides the profile's download URL.
    pub model_url: Option<String>,
    /// Whether to download the artifact at startup when it is missing.
    pub auto_download: bool,
    /// Largest accepted request body for `/predict`.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from `FACEMOOD_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("FACEMOOD_BIND").unwrap_or_else(|_| "0.0.0.0:5000".to_string()),
            upload_dir: env_path("FACEMOOD_UPLOAD_DIR", "uploads"),
            db_path: env_path("FACEMOOD_DB_PATH", "database.db"),
            model_path: env_path("FACEMOOD_MODEL_PATH", "face_emotionModel.onnx"),
            model_profile: std::env::var("FACEMOOD_MODEL_PROFILE")
                .unwrap_or_else(|_| DEFAULT_PROFILE.to_string()),
            model_url: std::env::var("FACEMOOD_MODEL_URL").ok(),
            auto_download: std::env::var("FACEMOOD_AUTO_DOWNLOAD")
                .map(|v| v != "0")
                .unwrap_or(true),
            max_upload_bytes: env_usize("FACEMOOD_MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
        }
    }

    /// Resolve the model profile, applying the URL override.
    pub fn profile(&self) -> Result<ModelProfile, ProfileError> {
        Ok(ModelProfile::resolve(&self.model_profile)?.with_model_url(self.model_url.clone()))
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_override() {
        let config = Config {
            bind_addr: "127.0.0.1:0".into(),
            upload_dir: "uploads".into(),
            db_path: "database.db".into(),
            model_path: "m.onnx".into(),
            model_profile: "ferplus".into(),
            model_url: Some("https://mirror.invalid/ferplus.onnx".into()),
            auto_download: false,
            max_upload_bytes: 1024,
        };
        let profile = config.profile().unwrap();
        assert_eq!(profile.name, "ferplus");
        assert_eq!(profile.model_url, "https://mirror.invalid/ferplus.onnx");
    }

    #[test]
    fn test_unknown_profile() {
        let config = Config {
            model_profile: "nope".into(),
            ..Config::from_env()
        };
        assert!(config.profile().is_err());
    }
}
