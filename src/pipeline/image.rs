//! Image resolution: turn an image reference into decoded pixels or a
//! definite [`BlockError`].
//!
//! Renderers never talk to the network themselves. They hand every `src`
//! they meet to an [`ImageResolver`] and degrade to a placeholder on `Err`.
//!
//! ## Providers
//!
//! `image_query:` references go through one [`ImageProvider`], chosen by
//! [`crate::config::ImageSource`]:
//!
//! - **Unsplash**: keyed photo search. Answers with a URL, which is then
//!   downloaded with the same client.
//! - **Local SD**: a Stable Diffusion web API. Answers with base64 bytes.
//!
//! A missing key or URL is logged once at construction and the resolver
//! then reports [`BlockError::NoProvider`] for queries. It is never fatal.
//!
//! ## Why a single timeout-bounded client?
//!
//! The local generation backend can take arbitrarily long. Every request
//! (search, generation, download) is bounded by `image_timeout_secs` and
//! never retried, so a stalled provider costs at most one timeout per block.

use crate::config::{ExportConfig, ImageSource};
use crate::error::{BlockError, ExportError};
use crate::tree::IMAGE_QUERY_PREFIX;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GenericImageView};
use serde_json::{json, Value};
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

const UNSPLASH_SEARCH_URL: &str = "https://api.unsplash.com/search/photos";

/// Longest edge kept when embedding; larger pictures are downscaled.
const MAX_EDGE_PX: u32 = 1600;

// ── References ───────────────────────────────────────────────────────────────

/// A parsed image `src`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// `image_query:<text>`: ask the configured provider.
    Query(String),
    /// Absolute `http(s)://` URL.
    Remote(String),
    /// Anything else is a filesystem path.
    Local(PathBuf),
}

impl ImageRef {
    pub fn parse(src: &str) -> Self {
        let src = src.trim();
        if let Some(query) = src.strip_prefix(IMAGE_QUERY_PREFIX) {
            ImageRef::Query(query.trim().to_string())
        } else if src.starts_with("http://") || src.starts_with("https://") {
            ImageRef::Remote(src.to_string())
        } else {
            ImageRef::Local(PathBuf::from(src.strip_prefix("file://").unwrap_or(src)))
        }
    }

    /// Human-readable reference used in placeholders and logs.
    pub fn describe(&self) -> String {
        match self {
            ImageRef::Query(q) => q.clone(),
            ImageRef::Remote(url) => url.clone(),
            ImageRef::Local(path) => path.display().to_string(),
        }
    }
}

// ── Resolved images ──────────────────────────────────────────────────────────

/// A decoded image, re-encoded as PNG for the backends.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ResolvedImage {
    /// Validate and decode raw bytes in any format `image` understands.
    pub fn from_bytes(reference: &str, bytes: &[u8]) -> Result<Self, BlockError> {
        let img = image::load_from_memory(bytes).map_err(|e| BlockError::DecodeFailed {
            reference: reference.to_string(),
            detail: e.to_string(),
        })?;
        Self::from_image(reference, img)
    }

    pub fn from_image(reference: &str, img: DynamicImage) -> Result<Self, BlockError> {
        let img = if img.width() > MAX_EDGE_PX || img.height() > MAX_EDGE_PX {
            img.thumbnail(MAX_EDGE_PX, MAX_EDGE_PX)
        } else {
            img
        };
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(BlockError::DecodeFailed {
                reference: reference.to_string(),
                detail: "image has no pixels".into(),
            });
        }

        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| BlockError::DecodeFailed {
                reference: reference.to_string(),
                detail: e.to_string(),
            })?;
        debug!("Decoded image '{reference}' → {width}x{height}, {} bytes PNG", png.len());

        Ok(Self { png, width, height })
    }

    /// Packed 8-bit RGB samples, alpha dropped.
    pub fn rgb8(&self) -> Result<Vec<u8>, image::ImageError> {
        Ok(image::load_from_memory(&self.png)?.to_rgb8().into_raw())
    }

    /// Height / width.
    pub fn aspect(&self) -> f64 {
        self.height as f64 / self.width as f64
    }
}

// ── Capability traits ────────────────────────────────────────────────────────

/// Turns an [`ImageRef`] into pixels. The only image boundary renderers see.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    async fn resolve(&self, reference: &ImageRef) -> Result<ResolvedImage, BlockError>;
}

/// What a provider answers for a query.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderHit {
    Bytes(Vec<u8>),
    Url(String),
}

/// One image search or generation backend.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means the provider answered but had nothing for the query.
    async fn search(&self, query: &str) -> Result<Option<ProviderHit>, BlockError>;
}

// ── HTTP implementation ──────────────────────────────────────────────────────

/// Default resolver: network providers plus local file reads.
pub struct HttpImageResolver {
    client: reqwest::Client,
    provider: Option<Box<dyn ImageProvider>>,
    timeout_secs: u64,
}

impl HttpImageResolver {
    /// Build the client and pick the provider named in the configuration.
    pub fn from_config(config: &ExportConfig) -> Result<Self, ExportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.image_timeout_secs))
            .build()
            .map_err(|e| ExportError::Internal(format!("HTTP client: {e}")))?;

        let provider: Option<Box<dyn ImageProvider>> = match config.image_source {
            ImageSource::Unsplash => match &config.unsplash_access_key {
                Some(key) => Some(Box::new(UnsplashProvider {
                    client: client.clone(),
                    access_key: key.clone(),
                    timeout_secs: config.image_timeout_secs,
                })),
                None => {
                    warn!("UNSPLASH_ACCESS_KEY is not set, image queries will use placeholders");
                    None
                }
            },
            ImageSource::LocalSd => match &config.local_sd_url {
                Some(url) => Some(Box::new(LocalSdProvider {
                    client: client.clone(),
                    base_url: url.clone(),
                    api_key: config.local_sd_api_key.clone(),
                    timeout_secs: config.image_timeout_secs,
                })),
                None => {
                    warn!("LOCAL_SD_URL is not set, image queries will use placeholders");
                    None
                }
            },
            ImageSource::None => None,
        };

        Ok(Self {
            client,
            provider,
            timeout_secs: config.image_timeout_secs,
        })
    }

    /// Replace the provider, keeping the client.
    pub fn with_provider(mut self, provider: Box<dyn ImageProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn provider_name(&self) -> Option<&'static str> {
        self.provider.as_ref().map(|p| p.name())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, BlockError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(url, self.timeout_secs, e))?;

        if !response.status().is_success() {
            return Err(BlockError::FetchFailed {
                reference: url.to_string(),
                detail: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| request_error(url, self.timeout_secs, e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageResolver for HttpImageResolver {
    async fn resolve(&self, reference: &ImageRef) -> Result<ResolvedImage, BlockError> {
        let described = reference.describe();
        let bytes = match reference {
            ImageRef::Query(query) => {
                let provider = self.provider.as_ref().ok_or(BlockError::NoProvider)?;
                debug!("Searching {} for '{query}'", provider.name());
                match provider.search(query).await? {
                    Some(ProviderHit::Bytes(bytes)) => bytes,
                    Some(ProviderHit::Url(url)) => self.download(&url).await?,
                    None => {
                        return Err(BlockError::ImageNotFound {
                            query: query.clone(),
                        })
                    }
                }
            }
            ImageRef::Remote(url) => self.download(url).await?,
            ImageRef::Local(path) => {
                tokio::fs::read(path)
                    .await
                    .map_err(|e| BlockError::FetchFailed {
                        reference: described.clone(),
                        detail: e.to_string(),
                    })?
            }
        };

        tokio::task::spawn_blocking(move || ResolvedImage::from_bytes(&described, &bytes))
            .await
            .map_err(|e| BlockError::DecodeFailed {
                reference: reference.describe(),
                detail: format!("decode task failed: {e}"),
            })?
    }
}

fn request_error(reference: &str, secs: u64, e: reqwest::Error) -> BlockError {
    if e.is_timeout() {
        BlockError::Timeout {
            reference: reference.to_string(),
            secs,
        }
    } else {
        BlockError::FetchFailed {
            reference: reference.to_string(),
            detail: e.to_string(),
        }
    }
}

/// Photo search on api.unsplash.com.
struct UnsplashProvider {
    client: reqwest::Client,
    access_key: String,
    timeout_secs: u64,
}

#[async_trait]
impl ImageProvider for UnsplashProvider {
    fn name(&self) -> &'static str {
        "unsplash"
    }

    async fn search(&self, query: &str) -> Result<Option<ProviderHit>, BlockError> {
        let response = self
            .client
            .get(UNSPLASH_SEARCH_URL)
            .query(&[
                ("query", query),
                ("per_page", "1"),
                ("orientation", "landscape"),
            ])
            .header("Authorization", format!("Client-ID {}", self.access_key))
            .send()
            .await
            .map_err(|e| request_error(query, self.timeout_secs, e))?;

        if !response.status().is_success() {
            return Err(BlockError::FetchFailed {
                reference: query.to_string(),
                detail: format!("Unsplash answered HTTP {}", response.status()),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| request_error(query, self.timeout_secs, e))?;
        Ok(unsplash_first_url(&body).map(ProviderHit::Url))
    }
}

fn unsplash_first_url(body: &Value) -> Option<String> {
    body.pointer("/results/0/urls/regular")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Stable Diffusion web API (`/sdapi/v1/txt2img`).
struct LocalSdProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

#[async_trait]
impl ImageProvider for LocalSdProvider {
    fn name(&self) -> &'static str {
        "local_sd"
    }

    async fn search(&self, query: &str) -> Result<Option<ProviderHit>, BlockError> {
        let url = format!("{}/sdapi/v1/txt2img", self.base_url);
        let mut request = self.client.post(&url).json(&json!({
            "prompt": query,
            "steps": 20,
            "width": 512,
            "height": 512,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| request_error(query, self.timeout_secs, e))?;
        if !response.status().is_success() {
            return Err(BlockError::FetchFailed {
                reference: query.to_string(),
                detail: format!("local SD answered HTTP {}", response.status()),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| request_error(query, self.timeout_secs, e))?;
        let Some(encoded) = body.pointer("/images/0").and_then(Value::as_str) else {
            return Ok(None);
        };
        decode_base64_image(query, encoded).map(|bytes| Some(ProviderHit::Bytes(bytes)))
    }
}

/// Accepts bare base64 or a `data:image/...;base64,` URI.
fn decode_base64_image(reference: &str, encoded: &str) -> Result<Vec<u8>, BlockError> {
    let payload = encoded
        .split_once("base64,")
        .map(|(_, data)| data)
        .unwrap_or(encoded);
    STANDARD
        .decode(payload.trim())
        .map_err(|e| BlockError::DecodeFailed {
            reference: reference.to_string(),
            detail: format!("invalid base64: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    pub(crate) fn tiny_png() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 2, Rgba([10, 20, 30, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn parse_references() {
        assert_eq!(
            ImageRef::parse("image_query: red fox"),
            ImageRef::Query("red fox".into())
        );
        assert_eq!(
            ImageRef::parse("https://x.test/a.png"),
            ImageRef::Remote("https://x.test/a.png".into())
        );
        assert_eq!(
            ImageRef::parse("file:///tmp/a.png"),
            ImageRef::Local(PathBuf::from("/tmp/a.png"))
        );
    }

    #[test]
    fn decode_valid_png() {
        let img = ResolvedImage::from_bytes("t", &tiny_png()).unwrap();
        assert_eq!((img.width, img.height), (4, 2));
        assert_eq!(img.rgb8().unwrap().len(), 4 * 2 * 3);
        assert!((img.aspect() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn decode_garbage_fails() {
        let err = ResolvedImage::from_bytes("junk", b"<html>404</html>").unwrap_err();
        assert!(matches!(err, BlockError::DecodeFailed { .. }));
    }

    #[test]
    fn base64_with_data_uri_prefix() {
        let raw = tiny_png();
        let encoded = format!("data:image/png;base64,{}", STANDARD.encode(&raw));
        assert_eq!(decode_base64_image("q", &encoded).unwrap(), raw);
        assert!(decode_base64_image("q", "***").is_err());
    }

    #[test]
    fn unsplash_response_shape() {
        let body = json!({"results": [{"urls": {"regular": "https://images.test/1.jpg"}}]});
        assert_eq!(
            unsplash_first_url(&body).as_deref(),
            Some("https://images.test/1.jpg")
        );
        assert_eq!(unsplash_first_url(&json!({"results": []})), None);
    }

    #[tokio::test]
    async fn missing_key_means_no_provider() {
        let config = ExportConfig::default();
        let resolver = HttpImageResolver::from_config(&config).unwrap();
        assert_eq!(resolver.provider_name(), None);
        let err = resolver
            .resolve(&ImageRef::Query("cats".into()))
            .await
            .unwrap_err();
        assert_eq!(err, BlockError::NoProvider);
    }

    #[tokio::test]
    async fn local_file_is_read_and_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, tiny_png()).unwrap();

        let resolver = HttpImageResolver::from_config(&ExportConfig::default()).unwrap();
        let img = resolver.resolve(&ImageRef::Local(path)).await.unwrap();
        assert_eq!(img.width, 4);

        let missing = resolver
            .resolve(&ImageRef::Local(dir.path().join("nope.png")))
            .await
            .unwrap_err();
        assert!(matches!(missing, BlockError::FetchFailed { .. }));
    }
}
