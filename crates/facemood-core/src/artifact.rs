//! Classifier artifact acquisition.
//!
//! Makes sure the model file exists locally, downloading it once from the
//! profile's URL if needed. Fetchers are tried in order; the first that
//! produces a verified file wins. Downloads land in a temporary file next
//! to the target and are renamed into place only when complete.

use crate::profile::ModelProfile;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("{program} exited with {status}")]
    Command { program: String, status: String },
    #[error("downloaded file is empty")]
    Empty,
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    Checksum { expected: String, actual: String },
    #[error("downloaded file is a {0}, not an ONNX model")]
    Format(&'static str),
}

/// Leading bytes of formats ONNX Runtime cannot load.
const FOREIGN_MAGIC: [(&[u8], &str); 4] = [
    (b"\x89HDF\r\n\x1a\n", "HDF5 file (Keras)"),
    (b"PK\x03\x04", "zip archive (PyTorch)"),
    (b"<!DOCTYPE", "HTML page"),
    (b"<html", "HTML page"),
];

/// One mechanism for transferring a remote file to a local path.
pub trait ArtifactFetcher: Send + Sync {
    fn name(&self) -> &str;
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError>;
}

/// In-process HTTP download.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("facemood/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl ArtifactFetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let mut response = self.client.get(url).send()?.error_for_status()?;
        let mut file = File::create(dest)?;
        let bytes = response.copy_to(&mut file)?;
        file.sync_all()?;
        tracing::debug!(url, bytes, "http download finished");
        Ok(())
    }
}

/// Download through an external transfer tool.
pub struct CommandFetcher {
    program: &'static str,
    args: fn(&str, &Path) -> Vec<String>,
}

impl CommandFetcher {
    pub fn curl() -> Self {
        Self {
            program: "curl",
            args: |url, dest| {
                vec![
                    "-fsSL".into(),
                    "-o".into(),
                    dest.display().to_string(),
                    url.into(),
                ]
            },
        }
    }

    pub fn wget() -> Self {
        Self {
            program: "wget",
            args: |url, dest| vec!["-q".into(), "-O".into(), dest.display().to_string(), url.into()],
        }
    }
}

impl ArtifactFetcher for CommandFetcher {
    fn name(&self) -> &str {
        self.program
    }

    fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let status = Command::new(self.program)
            .args((self.args)(url, dest))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()?;
        if !status.success() {
            return Err(FetchError::Command {
                program: self.program.to_string(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

/// Primary in-process HTTP client, then the external `curl` and `wget` tools.
pub fn default_fetchers() -> Vec<Box<dyn ArtifactFetcher>> {
    let mut fetchers: Vec<Box<dyn ArtifactFetcher>> = Vec::new();
    match HttpFetcher::new() {
        Ok(http) => fetchers.push(Box::new(http)),
        Err(e) => tracing::warn!(error = %e, "http client unavailable; using external tools only"),
    }
    fetchers.push(Box::new(CommandFetcher::curl()));
    fetchers.push(Box::new(CommandFetcher::wget()));
    fetchers
}

/// What [`ensure_artifact`] found or did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactStatus {
    /// The file already existed; nothing was fetched.
    Present,
    /// The file was downloaded by the named fetcher.
    Downloaded { via: String },
    /// The file is absent and could not be obtained.
    Missing,
}

impl ArtifactStatus {
    pub fn is_available(&self) -> bool {
        !matches!(self, ArtifactStatus::Missing)
    }
}

/// Ensure the artifact exists at `path`, making one download round if not.
///
/// Never fails: every problem is logged and reported as `Missing`.
pub fn ensure_artifact(
    path: &Path,
    profile: &ModelProfile,
    fetchers: &[Box<dyn ArtifactFetcher>],
) -> ArtifactStatus {
    if path.exists() {
        match sniff_foreign(path) {
            Ok(Some(kind)) => {
                tracing::warn!(path = %path.display(), kind, "existing model artifact is not ONNX; replacing it");
                if let Err(e) = std::fs::remove_file(path) {
                    tracing::warn!(path = %path.display(), error = %e, "cannot remove stale model artifact");
                    return ArtifactStatus::Present;
                }
            }
            _ => {
                tracing::debug!(path = %path.display(), "model artifact present");
                return ArtifactStatus::Present;
            }
        }
    }

    let url = profile.model_url.trim();
    if url.is_empty() {
        tracing::warn!(path = %path.display(), profile = %profile.name, "model artifact missing and profile has no URL");
        return ArtifactStatus::Missing;
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!(dir = %parent.display(), error = %e, "cannot create model directory");
            return ArtifactStatus::Missing;
        }
    }

    tracing::info!(url, path = %path.display(), "model artifact not found locally; downloading");

    for fetcher in fetchers {
        let partial = partial_path(path);
        let result = fetcher
            .fetch(url, &partial)
            .and_then(|()| verify(&partial, profile.sha256.as_deref()))
            .and_then(|()| std::fs::rename(&partial, path).map_err(FetchError::from));

        match result {
            Ok(()) => {
                tracing::info!(via = fetcher.name(), path = %path.display(), "model artifact downloaded");
                return ArtifactStatus::Downloaded {
                    via: fetcher.name().to_string(),
                };
            }
            Err(e) => {
                tracing::warn!(via = fetcher.name(), error = %e, "model download attempt failed");
                let _ = std::fs::remove_file(&partial);
            }
        }
    }

    tracing::warn!(
        url,
        path = %path.display(),
        "automatic model download failed; continuing without a model"
    );
    ArtifactStatus::Missing
}

fn partial_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    path.with_file_name(format!(".{file_name}.{}.part", uuid::Uuid::new_v4().simple()))
}

fn verify(path: &Path, expected_sha256: Option<&str>) -> Result<(), FetchError> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(FetchError::Empty);
    }
    if let Some(kind) = sniff_foreign(path)? {
        return Err(FetchError::Format(kind));
    }

    let Some(expected) = expected_sha256 else {
        return Ok(());
    };

    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    let actual = format!("{:x}", hasher.finalize());
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(FetchError::Checksum {
            expected: expected.trim().to_string(),
            actual,
        });
    }
    Ok(())
}

/// Name of the container format if `path` starts with a known non-ONNX magic.
fn sniff_foreign(path: &Path) -> std::io::Result<Option<&'static str>> {
    let mut head = Vec::with_capacity(16);
    File::open(path)?.take(16).read_to_end(&mut head)?;
    Ok(FOREIGN_MAGIC
        .iter()
        .find(|(magic, _)| head.starts_with(magic))
        .map(|(_, kind)| *kind))
}
