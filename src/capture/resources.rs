use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::join_all;
use image::{ImageError, RgbaImage};
use reqwest::Client;
use thiserror::Error;
use url::Url;

pub const DEFAULT_RESOURCE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Failed to read resource: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed data URL: {0}")]
    InvalidDataUrl(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Resource {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("Failed to decode image: {0}")]
    Decode(#[from] ImageError),
}

/// Fetches and decodes the image resources a surface references.
#[derive(Debug, Clone)]
pub struct ResourceLoader {
    http: Client,
}

impl ResourceLoader {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Loads every source concurrently. Sources that cannot be loaded are
    /// logged and left out of the result.
    pub async fn load_all(
        &self,
        sources: &[String],
        origin: Option<&Url>,
    ) -> HashMap<String, RgbaImage> {
        let mut unique: Vec<&String> = sources.iter().collect();
        unique.sort();
        unique.dedup();

        let loads = unique.into_iter().map(|src| async move {
            let result = self.load(src, origin).await;
            (src, result)
        });

        let mut images = HashMap::new();
        for (src, result) in join_all(loads).await {
            match result {
                Ok(img) => {
                    images.insert(src.clone(), img);
                }
                Err(err) => {
                    log::warn!(
                        "Image resource {} unavailable, leaving region empty: {}",
                        abbreviate(src),
                        err
                    );
                }
            }
        }
        images
    }

    pub async fn load(&self, src: &str, origin: Option<&Url>) -> Result<RgbaImage, ResourceError> {
        let bytes = self.fetch_bytes(src, origin).await?;
        Ok(image::load_from_memory(&bytes)?.to_rgba8())
    }

    async fn fetch_bytes(&self, src: &str, origin: Option<&Url>) -> Result<Vec<u8>, ResourceError> {
        let src = src.trim();
        if src.starts_with("data:") {
            return decode_data_url(src);
        }

        match Url::parse(src) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => self.fetch_http(url).await,
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| ResourceError::NotFound(src.to_string()))?;
                read_to_buffer(&path).await
            }
            // Drive letters parse as one-character schemes.
            Ok(url) if url.scheme().len() == 1 => read_to_buffer(Path::new(src)).await,
            Ok(_) => Err(ResourceError::NotFound(src.to_string())),
            Err(_) => match origin {
                Some(origin) if src.starts_with('/') && origin.scheme() != "file" => {
                    let url = origin
                        .join(src)
                        .map_err(|_| ResourceError::NotFound(src.to_string()))?;
                    self.fetch_http(url).await
                }
                _ => read_to_buffer(Path::new(src)).await,
            },
        }
    }

    async fn fetch_http(&self, url: Url) -> Result<Vec<u8>, ResourceError> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Reads a whole file into memory.
pub async fn read_to_buffer(path: &Path) -> Result<Vec<u8>, ResourceError> {
    tokio::fs::read(path).await.map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => ResourceError::NotFound(path.display().to_string()),
        _ => ResourceError::Io(err),
    })
}

/// Reads an image file and encodes it as a `data:` URL, the form image
/// slots are populated with.
pub async fn read_as_data_url(path: &Path) -> Result<String, ResourceError> {
    let bytes = read_to_buffer(path).await?;
    let mime = image::guess_format(&bytes)
        .map(mime_for)
        .unwrap_or("application/octet-stream");
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}

fn mime_for(format: image::ImageFormat) -> &'static str {
    match format {
        image::ImageFormat::Png => "image/png",
        image::ImageFormat::Jpeg => "image/jpeg",
        image::ImageFormat::Gif => "image/gif",
        image::ImageFormat::WebP => "image/webp",
        image::ImageFormat::Bmp => "image/bmp",
        _ => "application/octet-stream",
    }
}

fn decode_data_url(src: &str) -> Result<Vec<u8>, ResourceError> {
    let invalid = || ResourceError::InvalidDataUrl(abbreviate(src));
    let body = src.strip_prefix("data:").ok_or_else(invalid)?;
    let (header, payload) = body.split_once(',').ok_or_else(invalid)?;
    if header.split(';').any(|part| part.eq_ignore_ascii_case("base64")) {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD.decode(compact).map_err(|_| invalid())
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

fn abbreviate(src: &str) -> String {
    const LIMIT: usize = 64;
    if src.chars().count() <= LIMIT {
        src.to_string()
    } else {
        let head: String = src.chars().take(LIMIT).collect();
        format!("{head}\u{2026}")
    }
}

/// Resolves a slot source given on the command line: existing files become
/// `data:` URLs, anything else is passed through.
pub async fn slot_source(value: &str) -> Result<String, ResourceError> {
    if value.starts_with("data:") || value.starts_with("http://") || value.starts_with("https://")
    {
        return Ok(value.to_string());
    }
    read_as_data_url(&PathBuf::from(value)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    fn png_bytes(color: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(3, 2, Rgba(color));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageOutputFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn decodes_base64_data_url() {
        let bytes = png_bytes([1, 2, 3, 255]);
        let url = format!("data:image/png;base64,{}", STANDARD.encode(&bytes));
        assert_eq!(decode_data_url(&url).unwrap(), bytes);
    }

    #[test]
    fn rejects_data_url_without_payload_separator() {
        assert!(matches!(
            decode_data_url("data:image/png;base64"),
            Err(ResourceError::InvalidDataUrl(_))
        ));
    }

    #[tokio::test]
    async fn read_as_data_url_tags_png_mime() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("slot.png");
        std::fs::write(&path, png_bytes([9, 9, 9, 255])).unwrap();

        let url = read_as_data_url(&path).await.expect("data url");
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn missing_file_maps_to_not_found() {
        let err = read_to_buffer(Path::new("/nonexistent/slot.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn load_all_skips_unavailable_sources() {
        let dir = TempDir::new().expect("tempdir");
        let good = dir.path().join("good.png");
        std::fs::write(&good, png_bytes([200, 10, 10, 255])).unwrap();

        let loader = ResourceLoader::new(DEFAULT_RESOURCE_TIMEOUT).expect("loader");
        let sources = vec![
            good.display().to_string(),
            dir.path().join("missing.png").display().to_string(),
            "data:image/png;base64,@@@".to_string(),
        ];
        let images = loader.load_all(&sources, None).await;

        assert_eq!(images.len(), 1);
        let img = images.get(&sources[0]).expect("good image loaded");
        assert_eq!(img.dimensions(), (3, 2));
    }
}
