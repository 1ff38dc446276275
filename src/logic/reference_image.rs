//! Reference image - precomputed global-importance plot
//!
//! Fetched from a remote URL on every predict action. Failure never fails
//! the request; the page shows the error message in the image's place.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;
use thiserror::Error;

use crate::constants::MAX_REFERENCE_IMAGE_BYTES;

#[derive(Debug, Error)]
pub enum ImageFetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("server returned HTTP {0}")]
    Status(u16),

    #[error("response is not a PNG, JPEG, GIF or WebP image{0}")]
    NotAnImage(String),

    #[error("image exceeds {0} bytes")]
    TooLarge(usize),
}

/// What the page shows under the reference heading
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReferenceImage {
    Loaded { mime: &'static str, data_uri: String },
    Unavailable { message: String },
}

/// Recognise an image by its leading bytes
pub fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";

    if bytes.starts_with(PNG) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl ImageFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Download the image and check that it really is one
    pub async fn fetch(&self) -> Result<(&'static str, Vec<u8>), ImageFetchError> {
        let mut response = self.client.get(&self.url).send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageFetchError::Status(status.as_u16()));
        }
        if response
            .content_length()
            .is_some_and(|len| len as usize > MAX_REFERENCE_IMAGE_BYTES)
        {
            return Err(ImageFetchError::TooLarge(MAX_REFERENCE_IMAGE_BYTES));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Chunked bodies carry no length up front
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            if bytes.len() + chunk.len() > MAX_REFERENCE_IMAGE_BYTES {
                return Err(ImageFetchError::TooLarge(MAX_REFERENCE_IMAGE_BYTES));
            }
            bytes.extend_from_slice(&chunk);
        }

        match sniff_image(&bytes) {
            Some(mime) => Ok((mime, bytes)),
            None => Err(ImageFetchError::NotAnImage(
                content_type.map(|ct| format!(" (got {})", ct)).unwrap_or_default(),
            )),
        }
    }

    /// Fetch for display; failures become an inline message
    pub async fn load(&self) -> ReferenceImage {
        match self.fetch().await {
            Ok((mime, bytes)) => ReferenceImage::Loaded {
                mime,
                data_uri: format!("data:{};base64,{}", mime, BASE64.encode(&bytes)),
            },
            Err(e) => {
                tracing::warn!("Reference image fetch from {} failed: {}", self.url, e);
                ReferenceImage::Unavailable {
                    message: format!("Unable to load the image, please check the link. Error: {}", e),
                }
            }
        }
    }

    fn classify(&self, err: reqwest::Error) -> ImageFetchError {
        if err.is_timeout() {
            ImageFetchError::Timeout(self.timeout.as_secs())
        } else {
            ImageFetchError::Network(err.to_string())
        }
    }
}
