use std::sync::Arc;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use memory_frame::composition::{self, Composition, ControlKind, SharedComposition};
use memory_frame::config::{ExportFormat, ExportOptions, FrameDesign, OverlayToggles, StrategyKind};
use memory_frame::error::Error;
use memory_frame::events::{ExportMilestone, ExportProgress};
use memory_frame::processing::layout::{Offset, Size};
use memory_frame::render::{self, text::FontBook, text::FontSource, text::SystemFonts};
use memory_frame::tasks::capture::{CapturePipeline, ExportArtifact};
use memory_frame::tasks::loader::Photo;
use memory_frame::transform::TransformLimits;
use tokio::sync::mpsc;

const PAPER: [u8; 4] = [0xF5, 0xF1, 0xE8, 255];
const BLUE: Rgba<u8> = Rgba([10, 20, 230, 255]);
const RED: Rgba<u8> = Rgba([230, 20, 10, 255]);

struct NoFonts;

impl FontSource for NoFonts {
    fn load(&self) -> anyhow::Result<FontBook> {
        Ok(FontBook::default())
    }
}

struct BrokenFonts;

impl FontSource for BrokenFonts {
    fn load(&self) -> anyhow::Result<FontBook> {
        anyhow::bail!("font service unavailable")
    }
}

struct SlowFonts;

impl FontSource for SlowFonts {
    fn load(&self) -> anyhow::Result<FontBook> {
        std::thread::sleep(Duration::from_millis(200));
        Ok(FontBook::default())
    }
}

fn plain_overlays() -> OverlayToggles {
    OverlayToggles {
        film_grain: false,
        warm_tone: false,
        light_leak: false,
        grain_seed: 0,
    }
}

fn composition_with(photo: Option<RgbaImage>) -> SharedComposition {
    let mut comp = Composition::new(
        FrameDesign::default(),
        TransformLimits::default(),
        plain_overlays(),
    );
    if let Some(image) = photo {
        assert!(comp.mount_photo(Photo::new(image, "test")));
    }
    comp.into_shared()
}

/// Left half red, right half blue.
fn split_photo() -> RgbaImage {
    RgbaImage::from_fn(400, 300, |x, _| if x < 200 { RED } else { BLUE })
}

fn pipeline(fonts: Arc<dyn FontSource>) -> CapturePipeline {
    CapturePipeline::new(ExportOptions::default(), fonts)
}

fn decode(artifact: &ExportArtifact) -> RgbaImage {
    let bytes = artifact.bytes().unwrap();
    image::load_from_memory(&bytes).unwrap().to_rgba8()
}

fn is_near(px: &Rgba<u8>, want: Rgba<u8>) -> bool {
    px.0.iter()
        .zip(want.0.iter())
        .all(|(a, b)| (i16::from(*a) - i16::from(*b)).abs() <= 6)
}

fn assert_restored(comp: &SharedComposition) {
    let comp = composition::lock(comp);
    assert!(comp.controls().iter().all(|c| c.visible));
    assert!(!comp.is_input_locked());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn export_produces_opaque_paper_png_at_double_density() {
    let comp = composition_with(Some(split_photo()));
    let artifact = pipeline(Arc::new(NoFonts)).export(&comp, None).await.unwrap();

    assert_eq!(artifact.mime_type, "image/png");
    assert!(artifact.bitmap_data_uri.starts_with("data:image/png;base64,"));
    assert!(artifact.filename.starts_with("once-again-12-"));
    assert!(artifact.filename.ends_with(".png"));

    let frame = composition::lock(&comp).layout().frame;
    assert_eq!(artifact.width, (frame.width * 2.0).round() as u32);
    assert_eq!(artifact.height, (frame.height * 2.0).round() as u32);

    let img = decode(&artifact);
    assert_eq!((img.width(), img.height()), (artifact.width, artifact.height));
    assert!(img.pixels().all(|p| p[3] == 255));
    assert_eq!(img.get_pixel(2, 2).0, PAPER);
    assert_eq!(img.get_pixel(img.width() - 3, img.height() - 3).0, PAPER);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn progress_is_monotonic_and_ends_at_complete() {
    let comp = composition_with(Some(split_photo()));
    let (tx, mut rx) = mpsc::channel::<ExportProgress>(8);
    pipeline(Arc::new(NoFonts))
        .export(&comp, Some(&tx))
        .await
        .unwrap();
    drop(tx);

    let mut seen = Vec::new();
    while let Some(p) = rx.recv().await {
        seen.push(p);
    }
    assert!(seen.windows(2).all(|w| w[0].percent <= w[1].percent));
    assert_eq!(seen.first().map(|p| p.milestone), Some(ExportMilestone::Located));
    let last = seen.last().unwrap();
    assert_eq!((last.milestone, last.percent), (ExportMilestone::Complete, 100));
    assert_eq!(seen.iter().filter(|p| p.percent == 100).count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_export_rolls_back_and_never_completes() {
    let comp = composition_with(Some(split_photo()));
    let (tx, mut rx) = mpsc::channel::<ExportProgress>(8);
    let err = pipeline(Arc::new(BrokenFonts))
        .export(&comp, Some(&tx))
        .await
        .unwrap_err();
    drop(tx);

    assert!(matches!(err, Error::Capture(_)));
    assert!(err.is_retryable());
    assert_restored(&comp);
    while let Some(p) = rx.recv().await {
        assert!(p.percent < 100);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn export_without_photo_fails_precondition() {
    let comp = composition_with(None);
    let err = pipeline(Arc::new(NoFonts))
        .export(&comp, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExportPrecondition(_)));
    assert_restored(&comp);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_export_is_rejected() {
    let comp = composition_with(Some(split_photo()));
    composition::lock(&comp).set_text("class of '12");
    let before = composition::lock(&comp).settings().clone();

    let pipeline = pipeline(Arc::new(SlowFonts));
    let (first, second) = tokio::join!(pipeline.export(&comp, None), pipeline.export(&comp, None));

    assert!(first.is_ok());
    assert!(matches!(second, Err(Error::ExportInProgress)));
    assert!(!pipeline.is_busy());
    assert_restored(&comp);
    assert_eq!(composition::lock(&comp).settings(), &before);

    // the pipeline is usable again afterwards
    assert!(pipeline.export(&comp, None).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn composition_is_frozen_while_fonts_load() {
    let comp = composition_with(Some(RgbaImage::from_pixel(400, 300, BLUE)));
    let (frame, center) = {
        let c = composition::lock(&comp);
        (c.layout().frame, c.layout().viewport.center())
    };
    let pipeline = pipeline(Arc::new(SlowFonts));

    let (result, (restarted, resized, unmounted)) = tokio::join!(pipeline.export(&comp, None), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut c = composition::lock(&comp);
        (
            c.restart(),
            c.resize(Size::new(300.0, 900.0)),
            c.unmount_photo(),
        )
    });

    assert!(!restarted && !resized && !unmounted);
    let artifact = result.unwrap();
    assert_eq!(artifact.width, (frame.width * 2.0).round() as u32);
    assert_eq!(artifact.height, (frame.height * 2.0).round() as u32);
    let img = decode(&artifact);
    let (cx, cy) = ((center.x * 2.0) as u32, (center.y * 2.0) as u32);
    assert!(is_near(img.get_pixel(cx, cy), BLUE));

    assert_restored(&comp);
    let mut c = composition::lock(&comp);
    assert!(c.photo().is_some());
    assert!(c.restart());
    assert!(c.photo().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pipelines_sharing_a_composition_capture_one_at_a_time() {
    let comp = composition_with(Some(split_photo()));
    let first = pipeline(Arc::new(SlowFonts));
    let second = pipeline(Arc::new(NoFonts));

    let (first_result, (second_result, locked)) = tokio::join!(first.export(&comp, None), async {
        let result = second.export(&comp, None).await;
        let locked = composition::lock(&comp).is_input_locked();
        (result, locked)
    });

    assert!(first_result.is_ok());
    assert!(matches!(second_result, Err(Error::ExportInProgress)));
    assert!(locked, "the first capture must keep input locked");
    assert!(!second.is_busy());
    assert_restored(&comp);

    assert!(second.export(&comp, None).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn excluded_controls_never_reach_the_bitmap() {
    let comp = composition_with(Some(RgbaImage::from_pixel(400, 300, BLUE)));
    let (live, control_center) = {
        let mut c = composition::lock(&comp);
        c.set_scale(3.0);
        let rect = c.control_rect(ControlKind::ResetTransform);
        (c.snapshot(), rect.center())
    };
    let (x, y) = (
        (control_center.x * 2.0) as u32,
        (control_center.y * 2.0) as u32,
    );

    let live_img = render::rasterize(&live, 2.0, &FontBook::default()).unwrap();
    assert!(!is_near(live_img.get_pixel(x, y), BLUE));

    let artifact = pipeline(Arc::new(NoFonts)).export(&comp, None).await.unwrap();
    let img = decode(&artifact);
    assert!(is_near(img.get_pixel(x, y), BLUE), "{:?}", img.get_pixel(x, y));
    assert_restored(&comp);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn committed_pan_is_reproduced() {
    let comp = composition_with(Some(split_photo()));
    let pipeline = pipeline(Arc::new(NoFonts));
    let center = {
        let mut c = composition::lock(&comp);
        c.set_scale(3.0);
        c.pan(Offset::new(10_000.0, 0.0));
        c.layout().viewport.center()
    };
    let (cx, cy) = ((center.x * 2.0) as u32, (center.y * 2.0) as u32);

    // photo pushed right: its left (red) half sits under the center
    let img = decode(&pipeline.export(&comp, None).await.unwrap());
    assert!(is_near(img.get_pixel(cx, cy), RED));

    composition::lock(&comp).pan(Offset::new(-20_000.0, 0.0));
    let img = decode(&pipeline.export(&comp, None).await.unwrap());
    assert!(is_near(img.get_pixel(cx, cy), BLUE));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_annotation_leaves_no_placeholder() {
    let comp = composition_with(Some(split_photo()));
    let annotation = composition::lock(&comp).layout().annotation;
    assert!(composition::lock(&comp).export_snapshot().placeholder.is_none());

    let fonts = SystemFonts::default().load().unwrap_or_default();
    let pipeline = CapturePipeline::new(ExportOptions::default(), Arc::new(SystemFonts::default()));
    let Ok(artifact) = pipeline.export(&comp, None).await else {
        // no usable fonts on this machine; the snapshot check above still holds
        return;
    };
    let img = decode(&artifact);
    let x0 = (annotation.x * 2.0) as u32;
    let x1 = (annotation.right() * 2.0) as u32;
    let y0 = (annotation.y * 2.0).ceil() as u32;
    let y1 = (annotation.bottom() * 2.0) as u32;
    for y in y0..y1 {
        for x in x0..x1 {
            assert_eq!(img.get_pixel(x, y).0, PAPER, "ink at {x},{y}");
        }
    }

    if !fonts.is_empty() {
        // the live preview does show the placeholder in the same slot
        let live = composition::lock(&comp).snapshot();
        let live_img = render::rasterize(&live, 2.0, &fonts).unwrap();
        let inked = (y0..y1).any(|y| (x0..x1).any(|x| live_img.get_pixel(x, y).0 != PAPER));
        assert!(inked);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn annotation_text_is_carried_verbatim() {
    let comp = composition_with(Some(split_photo()));
    let text = "Arun & Meera\nBatch of 2012";
    composition::lock(&comp).set_text(text);
    let snapshot = composition::lock(&comp).export_snapshot();
    assert_eq!(snapshot.text, text);
    assert!(snapshot.placeholder.is_none());
    assert_eq!(snapshot.layout.annotation_rows, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fixed_canvas_strategy_hits_exact_size() {
    let comp = composition_with(Some(split_photo()));
    let options = ExportOptions {
        strategy: StrategyKind::FixedCanvas,
        canvas: [540, 720],
        ..ExportOptions::default()
    };
    let artifact = CapturePipeline::new(options, Arc::new(NoFonts))
        .export(&comp, None)
        .await
        .unwrap();
    assert_eq!((artifact.width, artifact.height), (540, 720));
    let img = decode(&artifact);
    assert_eq!((img.width(), img.height()), (540, 720));
    assert_eq!(img.get_pixel(1, 1).0, PAPER);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fixed_canvas_never_grows_past_its_size() {
    let comp = composition_with(Some(split_photo()));

    let tall = ExportOptions {
        strategy: StrategyKind::FixedCanvas,
        canvas: [1080, 1920],
        ..ExportOptions::default()
    };
    let artifact = CapturePipeline::new(tall, Arc::new(NoFonts))
        .export(&comp, None)
        .await
        .unwrap();
    assert_eq!((artifact.width, artifact.height), (1080, 1920));

    let short = ExportOptions {
        strategy: StrategyKind::FixedCanvas,
        canvas: [1080, 400],
        ..ExportOptions::default()
    };
    let err = CapturePipeline::new(short, Arc::new(NoFonts))
        .export(&comp, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExportPrecondition(_)), "{err}");
    assert_restored(&comp);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn jpeg_export_uses_jpeg_naming() {
    let comp = composition_with(Some(split_photo()));
    let options = ExportOptions {
        format: ExportFormat::Jpeg,
        jpeg_quality: 90,
        ..ExportOptions::default()
    };
    let artifact = CapturePipeline::new(options, Arc::new(NoFonts))
        .export(&comp, None)
        .await
        .unwrap();
    assert_eq!(artifact.mime_type, "image/jpeg");
    assert!(artifact.filename.ends_with(".jpg"));
    let img = decode(&artifact);
    assert_eq!(img.width(), artifact.width);
}
