use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::processing::color::HexColor;
use crate::processing::layout::{FrameLayout, MAX_ANNOTATION_ROWS, Size};
use crate::tasks::capture::{CaptureStrategy, fixed_canvas_frame};
use crate::transform::TransformLimits;

pub const PAPER: HexColor = HexColor::rgb(0xF5, 0xF1, 0xE8);
pub const BURGUNDY: HexColor = HexColor::rgb(0x2D, 0x1B, 0x1E);
pub const BROWN: HexColor = HexColor::rgb(0x8B, 0x6F, 0x47);
pub const BROWN_LIGHT: HexColor = HexColor::rgb(0xA0, 0x82, 0x6D);
pub const GOLD: HexColor = HexColor::rgb(0xD4, 0xAF, 0x37);

/// Static design of the frame: size, copy and palette.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct FrameDesign {
    /// Logical frame size in pixels at density 1.
    pub size: Size,
    pub padding: f32,
    pub paper_color: HexColor,
    pub title: String,
    pub subtitle: String,
    pub footer_lines: Vec<String>,
    /// Shown in the live preview when the annotation is empty. Never exported.
    pub placeholder: String,
    pub colors: TextColors,
}

impl Default for FrameDesign {
    fn default() -> Self {
        Self {
            size: Size::new(600.0, 800.0),
            padding: 32.0,
            paper_color: PAPER,
            title: "Once Again '12".into(),
            subtitle: "Where memories meet the present".into(),
            footer_lines: vec![
                "Once Again '12".into(),
                "ICS Ottapalam".into(),
                "Meet up on 5th jan 2026".into(),
            ],
            placeholder: "Add your name or message...".into(),
            colors: TextColors::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct TextColors {
    pub title: HexColor,
    pub subtitle: HexColor,
    pub annotation: HexColor,
    pub placeholder: HexColor,
    pub footer: HexColor,
    pub rule: HexColor,
    pub accent: HexColor,
}

impl Default for TextColors {
    fn default() -> Self {
        Self {
            title: BURGUNDY,
            subtitle: BROWN,
            annotation: BURGUNDY,
            placeholder: BROWN_LIGHT,
            footer: BROWN,
            rule: BROWN_LIGHT,
            accent: GOLD,
        }
    }
}

/// Decorative overlay toggles. The defaults are the "magic" look: grain and
/// warm tone on, light leak off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct OverlayToggles {
    pub film_grain: bool,
    pub warm_tone: bool,
    pub light_leak: bool,
    /// Seed for the grain noise so repeated exports are identical.
    pub grain_seed: u64,
}

impl Default for OverlayToggles {
    fn default() -> Self {
        Self {
            film_grain: true,
            warm_tone: true,
            light_leak: false,
            grain_seed: 1209,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct FontOptions {
    /// Preferred serif families, first match wins.
    pub serif: Vec<String>,
    pub sans: Vec<String>,
    /// Font files loaded ahead of the system database.
    pub files: Vec<PathBuf>,
}

impl Default for FontOptions {
    fn default() -> Self {
        Self {
            serif: vec![
                "Playfair Display".into(),
                "DejaVu Serif".into(),
                "Liberation Serif".into(),
            ],
            sans: vec![
                "Inter".into(),
                "DejaVu Sans".into(),
                "Liberation Sans".into(),
            ],
            files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Rasterize the live layout at a pixel density.
    #[default]
    LiveScene,
    /// Re-lay the frame out on a fixed canvas size.
    FixedCanvas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
}

impl ExportFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ExportOptions {
    pub strategy: StrategyKind,
    pub pixel_density: f32,
    pub canvas: [u32; 2],
    pub format: ExportFormat,
    pub jpeg_quality: u8,
    pub filename_prefix: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::LiveScene,
            pixel_density: 2.0,
            canvas: [1080, 1440],
            format: ExportFormat::Png,
            jpeg_quality: 100,
            filename_prefix: "once-again-12".into(),
        }
    }
}

impl ExportOptions {
    pub fn capture_strategy(&self) -> CaptureStrategy {
        match self.strategy {
            StrategyKind::LiveScene => CaptureStrategy::LiveScene {
                pixel_density: self.pixel_density,
            },
            StrategyKind::FixedCanvas => CaptureStrategy::FixedCanvas {
                width: self.canvas[0],
                height: self.canvas[1],
            },
        }
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.pixel_density > 0.0 && self.pixel_density <= 8.0,
            "export.pixel-density must be in (0, 8]"
        );
        ensure!(
            self.canvas[0] > 0 && self.canvas[1] > 0,
            "export.canvas must be non-zero"
        );
        ensure!(
            (1..=100).contains(&self.jpeg_quality),
            "export.jpeg-quality must be between 1 and 100"
        );
        ensure!(
            !self.filename_prefix.trim().is_empty(),
            "export.filename-prefix must not be empty"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ShareOptions {
    pub enabled: bool,
    /// When set the QR code points at `base-url` + filename instead of
    /// embedding the image itself.
    pub base_url: Option<String>,
    pub min_dimension: u32,
}

impl Default for ShareOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            min_dimension: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    pub frame: FrameDesign,
    /// Scale limits and auto-fit ratios.
    pub transform: TransformLimits,
    /// Overlays active when a session starts or restarts.
    pub overlays: OverlayToggles,
    pub fonts: FontOptions,
    pub export: ExportOptions,
    pub share: ShareOptions,
}

impl Configuration {
    pub fn from_yaml_str(yaml: &str) -> crate::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Self::from_yaml_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.frame.size.is_measurable(),
            "frame.size must be positive in both dimensions"
        );
        ensure!(
            self.frame.padding >= 0.0 && self.frame.padding * 2.0 < self.frame.size.width,
            "frame.padding must be non-negative and leave room for content"
        );
        ensure!(
            self.frame.paper_color.is_opaque(),
            "frame.paper-color must be opaque"
        );
        self.transform
            .validate()
            .context("invalid transform configuration")?;
        self.export.validate()?;
        if let CaptureStrategy::FixedCanvas { width, height } = self.export.capture_strategy() {
            ensure!(
                self.fixed_canvas_fits(width, height),
                "export.canvas {width}x{height} is too short for the frame at {} wide",
                self.frame.size.width
            );
        }
        ensure!(
            self.share.min_dimension > 0,
            "share.min-dimension must be greater than zero"
        );
        Ok(self)
    }

    /// Whether a fixed canvas keeps its exact size with the tallest
    /// annotation. A canvas that leaves the photo less than
    /// [`MIN_VIEWPORT_HEIGHT`](crate::processing::layout::MIN_VIEWPORT_HEIGHT)
    /// would make the frame grow past it.
    fn fixed_canvas_fits(&self, width: u32, height: u32) -> bool {
        let Some((frame, density)) = fixed_canvas_frame(self.frame.size.width, width, height)
        else {
            return false;
        };
        let layout = FrameLayout::compute(
            frame,
            self.frame.padding,
            MAX_ANNOTATION_ROWS,
            self.frame.footer_lines.len(),
        );
        (layout.frame.height * density).round() as u32 == height
    }
}
