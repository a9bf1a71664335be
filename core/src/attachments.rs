//! Image attachments and their resolution into request content.
//!
//! Local images are read and inlined as base64 `data:` URLs. Remote URLs are
//! passed through by reference and never fetched.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Url;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{SaverError, SaverResult};

const FALLBACK_MIME: &str = "image/png";

/// An image supplied with a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// Image file on the local filesystem
    Path(PathBuf),
    /// Already-loaded bytes, e.g. a browser upload, with the original file name
    Bytes { file_name: String, data: Vec<u8> },
    /// Remote image referenced by URL
    Url(String),
}

impl ImageRef {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Url(_))
    }

    /// Resolves this attachment to the `image_url` value sent to the provider
    pub async fn resolve(&self) -> SaverResult<String> {
        match self {
            Self::Path(path) => {
                let data = tokio::fs::read(path).await.map_err(|e| {
                    SaverError::Attachment(format!("Image not found: {} ({})", path.display(), e))
                })?;
                debug!("Encoding {} bytes from {}", data.len(), path.display());
                Ok(data_url(&data, mime_for_path(path)))
            }
            Self::Bytes { file_name, data } => {
                if data.is_empty() {
                    return Err(SaverError::Attachment(format!(
                        "Uploaded image is empty: {}",
                        file_name
                    )));
                }
                Ok(data_url(data, mime_for_path(Path::new(file_name))))
            }
            Self::Url(raw) => {
                let url = raw.trim();
                validate_url(url)?;
                Ok(url.to_string())
            }
        }
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Bytes { file_name, data } => write!(f, "{} ({} bytes)", file_name, data.len()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// Resolves every attachment in order, failing on the first unusable one
pub async fn resolve_all(attachments: &[ImageRef]) -> SaverResult<Vec<String>> {
    let mut resolved = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        resolved.push(attachment.resolve().await?);
    }
    Ok(resolved)
}

/// Guesses an image MIME type from the file extension
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") | Some("jpe") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/vnd.microsoft.icon",
        _ => FALLBACK_MIME,
    }
}

fn data_url(data: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(data))
}

fn validate_url(raw: &str) -> SaverResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| SaverError::Attachment(format!("Invalid image URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" | "data" => Ok(url),
        scheme => Err(SaverError::Attachment(format!(
            "Unsupported image URL scheme '{}' in {}",
            scheme, raw
        ))),
    }
}
