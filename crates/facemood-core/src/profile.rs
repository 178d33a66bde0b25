//! Model profiles.
//!
//! A profile ties one classifier artifact to its input geometry, pixel
//! scaling and ordered label table. Built-in profiles are embedded at
//! compile time from `contrib/models/*.toml`; any other profile can be
//! loaded from a TOML file at runtime.

use image::imageops::FilterType;
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

const PROFILE_FER2013: &str = include_str!("../../../contrib/models/fer2013.toml");
const PROFILE_FERPLUS: &str = include_str!("../../../contrib/models/ferplus.toml");

/// Name of the profile used when none is configured.
pub const DEFAULT_PROFILE: &str = "fer2013";

static BUILTIN: OnceLock<Vec<ModelProfile>> = OnceLock::new();

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("failed to read profile {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid profile TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid profile: {0}")]
    Invalid(String),
    #[error("unknown built-in profile: {0}")]
    Unknown(String),
}

/// Memory layout of the single-item input batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[1, H, W, 1]`, as exported from Keras.
    Nhwc,
    /// `[1, 1, H, W]`, as exported from PyTorch/CNTK.
    Nchw,
}

/// Resampling filter used when resizing to the input size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Description of a classifier artifact and how to feed it.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelProfile {
    pub name: String,
    /// Remote location the artifact is fetched from when missing locally.
    pub model_url: String,
    /// Expected lowercase hex SHA-256 of the artifact, if known.
    #[serde(default)]
    pub sha256: Option<String>,
    pub input_width: u32,
    pub input_height: u32,
    pub layout: TensorLayout,
    /// Pixel intensities are divided by this before inference.
    pub pixel_divisor: f32,
    #[serde(default = "default_filter")]
    pub filter: ResizeFilter,
    /// Output index order of the network.
    pub labels: Vec<String>,
}

fn default_filter() -> ResizeFilter {
    ResizeFilter::Nearest
}

impl ModelProfile {
    /// Parse and validate a profile from TOML source.
    pub fn from_toml(src: &str) -> Result<Self, ProfileError> {
        let profile: ModelProfile = toml::from_str(src)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Load a profile from a TOML file on disk.
    pub fn from_file(path: &Path) -> Result<Self, ProfileError> {
        let src = std::fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&src)
    }

    /// Resolve a profile by built-in name, falling back to a file path.
    pub fn resolve(name_or_path: &str) -> Result<Self, ProfileError> {
        if let Some(profile) = builtin(name_or_path) {
            return Ok(profile.clone());
        }
        let path = Path::new(name_or_path);
        if path.extension().is_some_and(|ext| ext == "toml") || path.exists() {
            return Self::from_file(path);
        }
        Err(ProfileError::Unknown(name_or_path.to_string()))
    }

    /// Replace the remote artifact location, e.g. from configuration.
    pub fn with_model_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.model_url = url;
        }
        self
    }

    /// Label at the given output index, if the table covers it.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Shape of the single-item input batch for this profile.
    pub fn input_shape(&self) -> [usize; 4] {
        let (w, h) = (self.input_width as usize, self.input_height as usize);
        match self.layout {
            TensorLayout::Nhwc => [1, h, w, 1],
            TensorLayout::Nchw => [1, 1, h, w],
        }
    }

    fn validate(&self) -> Result<(), ProfileError> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(ProfileError::Invalid(format!(
                "{}: input size must be non-zero, got {}x{}",
                self.name, self.input_width, self.input_height
            )));
        }
        if !(self.pixel_divisor.is_finite() && self.pixel_divisor > 0.0) {
            return Err(ProfileError::Invalid(format!(
                "{}: pixel_divisor must be positive, got {}",
                self.name, self.pixel_divisor
            )));
        }
        if self.labels.is_empty() {
            return Err(ProfileError::Invalid(format!("{}: empty label table", self.name)));
        }
        Ok(())
    }
}

impl Default for ModelProfile {
    fn default() -> Self {
        builtin(DEFAULT_PROFILE)
            .cloned()
            .unwrap_or_else(|| ModelProfile {
                name: DEFAULT_PROFILE.to_string(),
                model_url: String::new(),
                sha256: None,
                input_width: 48,
                input_height: 48,
                layout: TensorLayout::Nhwc,
                pixel_divisor: 255.0,
                filter: ResizeFilter::Nearest,
                labels: crate::labels::FER2013_LABELS
                    .iter()
                    .map(|l| l.to_string())
                    .collect(),
            })
    }
}

fn builtin_profiles() -> &'static Vec<ModelProfile> {
    BUILTIN.get_or_init(|| {
        let mut db = Vec::new();
        for src in [PROFILE_FER2013, PROFILE_FERPLUS] {
            match ModelProfile::from_toml(src) {
                Ok(p) => db.push(p),
                Err(e) => tracing::error!(error = %e, "bad built-in model profile"),
            }
        }
        db
    })
}

/// Look up a built-in profile by name.
pub fn builtin(name: &str) -> Option<&'static ModelProfile> {
    builtin_profiles().iter().find(|p| p.name == name)
}

/// List all built-in profiles.
pub fn list_builtin() -> &'static [ModelProfile] {
    builtin_profiles()
}
