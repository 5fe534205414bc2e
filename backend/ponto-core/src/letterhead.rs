// src/letterhead.rs
use lopdf::{xobject, Object, Stream};
use std::path::Path;
use tracing::{error, info};
use url::Url;

use crate::error::ReportError;

/// Decoded letterhead image, ready to embed as an image XObject.
#[derive(Debug, Clone)]
pub struct Letterhead {
    image: Stream,
    width_px: i64,
    height_px: i64,
}

impl Letterhead {
    /// Loads the image from an `http(s)` URL or a local file path.
    pub async fn load(source: &str) -> Result<Self, ReportError> {
        let bytes = match Url::parse(source) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
                fetch(url).await?
            }
            _ => read_file(source)?,
        };
        Self::from_bytes(bytes, source)
    }

    pub fn from_bytes(bytes: Vec<u8>, source: &str) -> Result<Self, ReportError> {
        let decode_failure = |message: String| ReportError::Letterhead {
            source_desc: source.to_string(),
            message,
        };
        let image = xobject::image_from(bytes).map_err(|e| decode_failure(e.to_string()))?;
        let width_px = image
            .dict
            .get(b"Width")
            .and_then(Object::as_i64)
            .map_err(|e| decode_failure(e.to_string()))?;
        let height_px = image
            .dict
            .get(b"Height")
            .and_then(Object::as_i64)
            .map_err(|e| decode_failure(e.to_string()))?;
        if width_px <= 0 || height_px <= 0 {
            return Err(decode_failure("image has no pixels".to_string()));
        }

        info!("Letterhead loaded from {} ({}x{})", source, width_px, height_px);
        Ok(Self {
            image,
            width_px,
            height_px,
        })
    }

    pub(crate) fn image(&self) -> &Stream {
        &self.image
    }

    /// Largest (width, height) fitting in a `box_w` x `box_h` box with the
    /// image's aspect ratio.
    pub fn fit_within(&self, box_w: f32, box_h: f32) -> (f32, f32) {
        let ratio = self.width_px as f32 / self.height_px as f32;
        if box_w / box_h > ratio {
            (box_h * ratio, box_h)
        } else {
            (box_w, box_w / ratio)
        }
    }
}

async fn fetch(url: Url) -> Result<Vec<u8>, ReportError> {
    info!("Downloading letterhead from {}", url);
    let response = reqwest::get(url.clone()).await?;
    let status = response.status();
    if !status.is_success() {
        error!("Letterhead download from {} returned {}", url, status);
        return Err(ReportError::Letterhead {
            source_desc: url.to_string(),
            message: format!("HTTP {}", status),
        });
    }
    Ok(response.bytes().await?.to_vec())
}

fn read_file(source: &str) -> Result<Vec<u8>, ReportError> {
    std::fs::read(Path::new(source)).map_err(|e| {
        error!("Failed to read letterhead file {}: {}", source, e);
        ReportError::Letterhead {
            source_desc: source.to_string(),
            message: e.to_string(),
        }
    })
}
