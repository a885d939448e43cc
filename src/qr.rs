//! Share code for a finished export. Strictly best effort: nothing here can
//! fail an export.

use anyhow::{Context, Result};
use image::{ImageEncoder, Luma};
use image::codecs::png::PngEncoder;
use qrcode::QrCode;
use tracing::debug;

use crate::config::ShareOptions;
use crate::error::Error;
use crate::tasks::capture::{ExportArtifact, data_uri};

/// What the QR code should point at: `base-url` + filename when a base URL is
/// configured, otherwise the image itself.
pub fn share_payload(artifact: &ExportArtifact, options: &ShareOptions) -> Option<String> {
    if !options.enabled {
        return None;
    }
    Some(match &options.base_url {
        Some(base) => format!("{}/{}", base.trim_end_matches('/'), artifact.filename),
        None => artifact.bitmap_data_uri.clone(),
    })
}

/// Renders `payload` as a PNG QR code data URI. Failures (most often a
/// payload beyond QR capacity) are logged and yield `None`.
pub fn share_code(payload: &str, min_dimension: u32) -> Option<String> {
    match render_png(payload, min_dimension) {
        Ok(png) => Some(data_uri("image/png", &png)),
        Err(err) => {
            let err = Error::SecondaryArtifact(err);
            debug!(error = %err, payload_len = payload.len(), "share code skipped");
            None
        }
    }
}

fn render_png(payload: &str, min_dimension: u32) -> Result<Vec<u8>> {
    let code = QrCode::new(payload.as_bytes()).context("failed to generate QR code")?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(min_dimension, min_dimension)
        .build();
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::L8,
        )
        .context("failed to encode QR code")?;
    Ok(out)
}
