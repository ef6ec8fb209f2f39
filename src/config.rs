//! Configuration types for document export.
//!
//! All export behaviour is controlled through [`ExportConfig`], built via its
//! [`ExportConfigBuilder`] or read from the process environment with
//! [`ExportConfig::from_env`]. Deployment variants (a local desktop tool, a
//! container behind a file server, a CI job) are configuration profiles of
//! the same pipeline: they differ only in the values held here.
//!
//! # Design choice: builder over constructor
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest. Setters clamp out-of-range values;
//! [`ExportConfigBuilder::build`] rejects combinations that cannot work.

use crate::error::ExportError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Default public prefix under which export folders are served.
pub const DEFAULT_BASE_URL: &str = "http://localhost:9003/files";

/// Configuration for an [`crate::Exporter`].
///
/// # Example
/// ```rust
/// use edgequake_export::{ExportConfig, ImageSource};
///
/// let config = ExportConfig::builder()
///     .output_dir("/srv/exports")
///     .base_url("https://files.example.com/exports/")
///     .image_source(ImageSource::None)
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url, "https://files.example.com/exports");
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// Root directory under which one `export_<id>_<timestamp>` folder is
    /// created per request. Default: `./output`.
    pub output_dir: PathBuf,

    /// Public URL prefix matching `output_dir`. Never ends with `/`.
    /// Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Keep generated files forever unless a request overrides it. Default: false.
    pub persistent: bool,

    /// Delay before a non-persistent export folder is deleted. Default: 60 min.
    pub cleanup_delay: Duration,

    /// Which provider answers `image_query` references. Default: Unsplash.
    pub image_source: ImageSource,

    /// Unsplash API access key (`Client-ID`).
    pub unsplash_access_key: Option<String>,

    /// Base URL of a local Stable Diffusion web API, e.g. `http://127.0.0.1:7860`.
    pub local_sd_url: Option<String>,

    /// Optional bearer token for the local Stable Diffusion API.
    pub local_sd_api_key: Option<String>,

    /// Directory scanned once at startup for `.docx` / `.pptx` / `.xlsx` templates.
    pub template_dir: Option<PathBuf>,

    /// Upper bound for any single image search, generation or download. Default: 30 s.
    ///
    /// A stalled provider must not hang a render. There is no retry: a
    /// timed-out image is a permanent failure for that one block.
    pub image_timeout_secs: u64,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            base_url: DEFAULT_BASE_URL.to_string(),
            persistent: false,
            cleanup_delay: Duration::from_secs(60 * 60),
            image_source: ImageSource::default(),
            unsplash_access_key: None,
            local_sd_url: None,
            local_sd_api_key: None,
            template_dir: None,
            image_timeout_secs: 30,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("output_dir", &self.output_dir)
            .field("base_url", &self.base_url)
            .field("persistent", &self.persistent)
            .field("cleanup_delay", &self.cleanup_delay)
            .field("image_source", &self.image_source)
            .field(
                "unsplash_access_key",
                &self.unsplash_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("local_sd_url", &self.local_sd_url)
            .field(
                "local_sd_api_key",
                &self.local_sd_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("template_dir", &self.template_dir)
            .field("image_timeout_secs", &self.image_timeout_secs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ExportProgressCallback>"),
            )
            .finish()
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a configuration from the process environment.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `FILE_EXPORT_DIR` | `output_dir` |
    /// | `FILE_EXPORT_BASE_URL` | `base_url` |
    /// | `PERSISTENT_FILES` | `persistent` |
    /// | `FILES_DELAY` (minutes) | `cleanup_delay` |
    /// | `IMAGE_SOURCE` | `image_source` |
    /// | `UNSPLASH_ACCESS_KEY` | `unsplash_access_key` |
    /// | `LOCAL_SD_URL` / `LOCAL_SD_API_KEY` | local generation backend |
    /// | `FILE_EXPORT_TEMPLATE_DIR` | `template_dir` |
    /// | `IMAGE_TIMEOUT_SECS` | `image_timeout_secs` |
    pub fn from_env() -> Result<Self, ExportError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ExportConfig::from_env`] with an injectable lookup, so tests
    /// never touch the real process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ExportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut builder = Self::builder();

        if let Some(dir) = get("FILE_EXPORT_DIR") {
            builder = builder.output_dir(dir);
        }
        if let Some(url) = get("FILE_EXPORT_BASE_URL") {
            builder = builder.base_url(url);
        }
        if let Some(flag) = get("PERSISTENT_FILES") {
            builder = builder.persistent(parse_bool(&flag));
        }
        if let Some(minutes) = get("FILES_DELAY") {
            let minutes: u64 = minutes.trim().parse().map_err(|_| {
                ExportError::InvalidConfig(format!(
                    "FILES_DELAY must be a whole number of minutes, got '{minutes}'"
                ))
            })?;
            builder = builder.cleanup_delay(Duration::from_secs(minutes * 60));
        }
        if let Some(source) = get("IMAGE_SOURCE") {
            builder = builder.image_source(ImageSource::parse(&source));
        }
        if let Some(key) = get("UNSPLASH_ACCESS_KEY") {
            builder = builder.unsplash_access_key(key);
        }
        if let Some(url) = get("LOCAL_SD_URL") {
            builder = builder.local_sd_url(url);
        }
        if let Some(key) = get("LOCAL_SD_API_KEY") {
            builder = builder.local_sd_api_key(key);
        }
        if let Some(dir) = get("FILE_EXPORT_TEMPLATE_DIR") {
            builder = builder.template_dir(dir);
        }
        if let Some(secs) = get("IMAGE_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ExportError::InvalidConfig(format!(
                    "IMAGE_TIMEOUT_SECS must be a whole number, got '{secs}'"
                ))
            })?;
            builder = builder.image_timeout_secs(secs);
        }

        builder.build()
    }
}

/// Builder for [`ExportConfig`].
#[derive(Debug)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn persistent(mut self, v: bool) -> Self {
        self.config.persistent = v;
        self
    }

    pub fn cleanup_delay(mut self, delay: Duration) -> Self {
        self.config.cleanup_delay = delay;
        self
    }

    pub fn image_source(mut self, source: ImageSource) -> Self {
        self.config.image_source = source;
        self
    }

    pub fn unsplash_access_key(mut self, key: impl Into<String>) -> Self {
        self.config.unsplash_access_key = Some(key.into());
        self
    }

    pub fn local_sd_url(mut self, url: impl Into<String>) -> Self {
        self.config.local_sd_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn local_sd_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.local_sd_api_key = Some(key.into());
        self
    }

    pub fn template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.template_dir = Some(dir.into());
        self
    }

    pub fn image_timeout_secs(mut self, secs: u64) -> Self {
        self.config.image_timeout_secs = secs.clamp(1, 300);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, ExportError> {
        let c = &self.config;
        if c.base_url.is_empty() {
            return Err(ExportError::InvalidConfig(
                "base_url must not be empty".into(),
            ));
        }
        if c.output_dir.as_os_str().is_empty() {
            return Err(ExportError::InvalidConfig(
                "output_dir must not be empty".into(),
            ));
        }
        if !c.persistent && c.cleanup_delay.is_zero() {
            return Err(ExportError::InvalidConfig(
                "cleanup_delay must be > 0 when files are not persistent".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Provider that turns an `image_query` into an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    /// Keyed photo search on api.unsplash.com (default).
    #[default]
    Unsplash,
    /// Local Stable Diffusion web API (`/sdapi/v1/txt2img`).
    LocalSd,
    /// Never resolve queries; every `image_query` becomes a placeholder.
    None,
}

impl ImageSource {
    /// Parse an `IMAGE_SOURCE` value. Unknown values disable image search.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "unsplash" => ImageSource::Unsplash,
            "local_sd" | "local-sd" | "localsd" => ImageSource::LocalSd,
            "none" | "off" => ImageSource::None,
            other => {
                warn!("Image source unknown: '{other}', image search disabled");
                ImageSource::None
            }
        }
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
