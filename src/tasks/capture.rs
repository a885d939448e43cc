//! Export of the live composition into a standalone bitmap.
//!
//! One export runs at a time per pipeline, and one capture at a time per
//! composition. While it runs, input on the composition is locked and
//! export-excluded controls are hidden; both are undone by a drop guard
//! whatever the outcome.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use base64::Engine;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};
use tokio::sync::{OnceCell, mpsc};
use tracing::{debug, info, warn};

use crate::composition::{self, ControlKind, SharedComposition};
use crate::config::{ExportFormat, ExportOptions};
use crate::error::{Error, Result};
use crate::events::{ExportMilestone, ExportProgress};
use crate::processing::layout::Size;
use crate::render::{self, text::FontBook, text::FontSource};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureStrategy {
    /// Rasterize the live layout at `pixel_density` device pixels per
    /// logical pixel.
    LiveScene { pixel_density: f32 },
    /// Redraw onto a canvas of exactly `width` x `height` pixels. The frame is
    /// re-laid out at the canvas aspect ratio and the pan offset is carried
    /// over proportionally.
    FixedCanvas { width: u32, height: u32 },
}

/// Finished export, ready for the download and sharing collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub bitmap_data_uri: String,
    pub mime_type: &'static str,
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

impl ExportArtifact {
    /// Raw encoded bytes behind the data URI.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        let payload = self
            .bitmap_data_uri
            .split_once(";base64,")
            .map(|(_, payload)| payload)
            .ok_or_else(|| Error::Capture(anyhow!("artifact is not a base64 data URI")))?;
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|err| Error::Capture(err.into()))
    }
}

pub struct CapturePipeline {
    options: ExportOptions,
    fonts: Arc<dyn FontSource>,
    font_cache: OnceCell<Arc<FontBook>>,
    in_flight: AtomicBool,
}

impl CapturePipeline {
    pub fn new(options: ExportOptions, fonts: Arc<dyn FontSource>) -> Self {
        Self {
            options,
            fonts,
            font_cache: OnceCell::new(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Captures the composition. A call made while another export is in
    /// flight fails with [`Error::ExportInProgress`] without touching the
    /// composition. Progress milestones are sent with `try_send`, so a full
    /// or closed channel never stalls the export.
    pub async fn export(
        &self,
        composition: &SharedComposition,
        progress: Option<&mpsc::Sender<ExportProgress>>,
    ) -> Result<ExportArtifact> {
        let Some(_flight) = FlightGuard::acquire(&self.in_flight) else {
            debug!("export rejected; another export is in flight");
            return Err(Error::ExportInProgress);
        };
        let reporter = Reporter { tx: progress };
        let result = self.run(composition, &reporter).await;
        match &result {
            Ok(artifact) => info!(
                filename = %artifact.filename,
                width = artifact.width,
                height = artifact.height,
                "export complete"
            ),
            Err(err) => warn!(error = %err, "export failed"),
        }
        result
    }

    async fn run(&self, composition: &SharedComposition, reporter: &Reporter<'_>) -> Result<ExportArtifact> {
        let restore = {
            let mut comp = composition::lock(composition);
            comp.check_exportable()?;
            let hidden = comp.begin_export()?;
            reporter.send(ExportMilestone::Located);
            RestoreGuard {
                composition: Arc::clone(composition),
                hidden,
            }
        };
        reporter.send(ExportMilestone::ControlsHidden);

        let fonts = self.fonts().await?;
        let snapshot = {
            let comp = composition::lock(composition);
            comp.check_exportable()?;
            comp.export_snapshot()
        };
        reporter.send(ExportMilestone::DependenciesReady);

        let (snapshot, density) = match self.options.capture_strategy() {
            CaptureStrategy::LiveScene { pixel_density } => (snapshot, pixel_density),
            CaptureStrategy::FixedCanvas { width, height } => {
                let Some((frame, density)) =
                    fixed_canvas_frame(snapshot.layout.frame.width, width, height)
                else {
                    return Err(Error::ExportPrecondition(
                        "fixed canvas needs a non-empty frame".into(),
                    ));
                };
                let snapshot = snapshot.refit(frame);
                let size = render::output_size(&snapshot, density).map_err(Error::Capture)?;
                if size != (width, height) {
                    return Err(Error::ExportPrecondition(format!(
                        "a {width}x{height} canvas is too short for the frame; it needs {}x{}",
                        size.0, size.1
                    )));
                }
                (snapshot, density)
            }
        };

        let bitmap = tokio::task::spawn_blocking(move || render::rasterize(&snapshot, density, &fonts))
            .await
            .map_err(|err| Error::Capture(anyhow!("rasterizer task failed: {err}")))?
            .map_err(Error::Capture)?;
        let (width, height) = bitmap.dimensions();
        debug!(width, height, density, "composition rasterized");
        reporter.send(ExportMilestone::Rasterized);

        let format = self.options.format;
        let quality = self.options.jpeg_quality;
        let encoded = tokio::task::spawn_blocking(move || encode(bitmap, format, quality))
            .await
            .map_err(|err| Error::Capture(anyhow!("encoder task failed: {err}")))??;
        reporter.send(ExportMilestone::Encoded);

        let artifact = ExportArtifact {
            bitmap_data_uri: data_uri(format.mime_type(), &encoded),
            mime_type: format.mime_type(),
            filename: export_filename(&self.options.filename_prefix, format, Utc::now()),
            width,
            height,
        };
        drop(restore);
        reporter.send(ExportMilestone::Complete);
        Ok(artifact)
    }

    async fn fonts(&self) -> Result<Arc<FontBook>> {
        let book = self
            .font_cache
            .get_or_try_init(|| async {
                let source = Arc::clone(&self.fonts);
                let book = tokio::task::spawn_blocking(move || source.load())
                    .await
                    .map_err(|err| Error::Capture(anyhow!("font loader task failed: {err}")))?
                    .map_err(|err| Error::Capture(err.context("loading fonts")))?;
                Ok::<_, Error>(Arc::new(book))
            })
            .await?;
        Ok(Arc::clone(book))
    }
}

/// Logical frame and pixel density that map a frame of `logical_width` onto
/// a `width` x `height` canvas. The frame keeps its width and takes the
/// canvas aspect ratio.
pub fn fixed_canvas_frame(logical_width: f32, width: u32, height: u32) -> Option<(Size, f32)> {
    if !(logical_width > 0.0) || width == 0 || height == 0 {
        return None;
    }
    let density = width as f32 / logical_width;
    Some((Size::new(logical_width, height as f32 / density), density))
}

/// Encodes RGBA8 pixels. JPEG has no alpha, so the bitmap is flattened to RGB.
pub fn encode(bitmap: RgbaImage, format: ExportFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
    let (width, height) = bitmap.dimensions();
    let mut out = Vec::new();
    match format {
        ExportFormat::Png => PngEncoder::new(&mut out)
            .write_image(bitmap.as_raw(), width, height, ExtendedColorType::Rgba8)
            .map_err(Error::Encode)?,
        ExportFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(bitmap).into_rgb8();
            JpegEncoder::new_with_quality(&mut out, jpeg_quality)
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                .map_err(Error::Encode)?
        }
    }
    Ok(out)
}

pub fn data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime_type};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// `<prefix>-2026-01-05T18-30-00-250Z.png`: an ISO-8601 UTC timestamp with
/// `:` and `.` replaced so it is safe in file names.
pub fn export_filename(prefix: &str, format: ExportFormat, at: DateTime<Utc>) -> String {
    format!(
        "{prefix}-{}.{}",
        at.format("%Y-%m-%dT%H-%M-%S-%3fZ"),
        format.extension()
    )
}

struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Puts hidden controls back and unlocks input on every exit path.
struct RestoreGuard {
    composition: SharedComposition,
    hidden: Vec<ControlKind>,
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        composition::lock(&self.composition).end_export(&self.hidden);
        debug!(restored = self.hidden.len(), "export controls restored");
    }
}

struct Reporter<'a> {
    tx: Option<&'a mpsc::Sender<ExportProgress>>,
}

impl Reporter<'_> {
    fn send(&self, milestone: ExportMilestone) {
        let Some(tx) = self.tx else {
            return;
        };
        if tx.try_send(milestone.into()).is_err() {
            debug!(?milestone, "progress receiver unavailable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn filename_has_sortable_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 18, 30, 0).unwrap()
            + chrono::Duration::milliseconds(250);
        assert_eq!(
            export_filename("once-again-12", ExportFormat::Png, at),
            "once-again-12-2026-01-05T18-30-00-250Z.png"
        );
        assert!(export_filename("x", ExportFormat::Jpeg, at).ends_with(".jpg"));
    }

    #[test]
    fn encodes_png_and_jpeg() {
        let bitmap = RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        let png = encode(bitmap.clone(), ExportFormat::Png, 90).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        let jpeg = encode(bitmap, ExportFormat::Jpeg, 90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn data_uri_round_trips_through_artifact() {
        let artifact = ExportArtifact {
            bitmap_data_uri: data_uri("image/png", b"abc"),
            mime_type: "image/png",
            filename: "f.png".into(),
            width: 1,
            height: 1,
        };
        assert_eq!(artifact.bytes().unwrap(), b"abc");
    }

    #[test]
    fn fixed_canvas_keeps_frame_width() {
        let (frame, density) = fixed_canvas_frame(600.0, 1080, 1440).unwrap();
        assert!((density - 1.8).abs() < 1e-6);
        assert_eq!(frame.width, 600.0);
        assert!((frame.height - 800.0).abs() < 1e-3);
        assert!(fixed_canvas_frame(0.0, 1080, 1440).is_none());
        assert!(fixed_canvas_frame(600.0, 1080, 0).is_none());
    }

    #[test]
    fn flight_guard_is_exclusive() {
        let flag = AtomicBool::new(false);
        let first = FlightGuard::acquire(&flag);
        assert!(first.is_some());
        assert!(FlightGuard::acquire(&flag).is_none());
        drop(first);
        assert!(FlightGuard::acquire(&flag).is_some());
    }
}
