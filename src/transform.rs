//! Pan/zoom model of the photo inside the frame's content viewport.
//!
//! [`TransformEngine`] is the only writer of [`FrameSettings`]. Every update
//! is clamped against the bound rectangle derived from the latest container
//! and content geometry, so the photo never leaves the viewport, not even
//! for a single pointer event.

use anyhow::{Result as AnyResult, ensure};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::processing::layout::{Offset, Size};

pub const DEFAULT_MIN_SCALE: f32 = 0.5;
pub const DEFAULT_MAX_SCALE: f32 = 3.0;
pub const DEFAULT_FIT_WIDTH_RATIO: f32 = 0.96;
pub const DEFAULT_FIT_HEIGHT_RATIO: f32 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontStyle {
    #[default]
    Serif,
    Sans,
}

impl FontStyle {
    pub fn toggled(self) -> Self {
        match self {
            Self::Serif => Self::Sans,
            Self::Sans => Self::Serif,
        }
    }
}

/// Session-scoped edit state of the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSettings {
    photo_offset: Offset,
    photo_scale: f32,
    text: String,
    font_style: FontStyle,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            photo_offset: Offset::ZERO,
            photo_scale: 1.0,
            text: String::new(),
            font_style: FontStyle::Serif,
        }
    }
}

impl FrameSettings {
    pub fn photo_offset(&self) -> Offset {
        self.photo_offset
    }

    pub fn photo_scale(&self) -> f32 {
        self.photo_scale
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn font_style(&self) -> FontStyle {
        self.font_style
    }

    /// Offset and scale have not been touched since the photo was accepted.
    pub fn has_default_transform(&self) -> bool {
        self.photo_offset == Offset::ZERO && self.photo_scale == 1.0
    }
}

/// Legal range for pan offsets; symmetric around zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundRectangle {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl BoundRectangle {
    pub const ZERO: Self = Self {
        min_x: 0.0,
        max_x: 0.0,
        min_y: 0.0,
        max_y: 0.0,
    };

    pub fn clamp(&self, offset: Offset) -> Offset {
        Offset::new(
            offset.x.clamp(self.min_x, self.max_x),
            offset.y.clamp(self.min_y, self.max_y),
        )
    }

    pub fn contains(&self, offset: Offset) -> bool {
        (self.min_x..=self.max_x).contains(&offset.x) && (self.min_y..=self.max_y).contains(&offset.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct TransformLimits {
    pub min_scale: f32,
    pub max_scale: f32,
    /// Share of the container width the auto-fit tries to fill.
    pub fit_width_ratio: f32,
    /// Share of the container height auto-fit must never exceed.
    pub fit_height_ratio: f32,
}

impl Default for TransformLimits {
    fn default() -> Self {
        Self {
            min_scale: DEFAULT_MIN_SCALE,
            max_scale: DEFAULT_MAX_SCALE,
            fit_width_ratio: DEFAULT_FIT_WIDTH_RATIO,
            fit_height_ratio: DEFAULT_FIT_HEIGHT_RATIO,
        }
    }
}

impl TransformLimits {
    pub fn clamp_scale(&self, scale: f32) -> f32 {
        if scale.is_nan() {
            return 1.0_f32.clamp(self.min_scale, self.max_scale);
        }
        scale.clamp(self.min_scale, self.max_scale)
    }

    pub fn validate(&self) -> AnyResult<()> {
        ensure!(
            self.min_scale > 0.0 && self.min_scale.is_finite(),
            "transform.min-scale must be positive"
        );
        ensure!(
            self.max_scale.is_finite() && self.min_scale <= 1.0 && 1.0 <= self.max_scale,
            "transform scales must satisfy min-scale <= 1 <= max-scale"
        );
        ensure!(
            self.fit_width_ratio > 0.0 && self.fit_width_ratio <= 1.0,
            "transform.fit-width-ratio must be in (0, 1]"
        );
        ensure!(
            self.fit_height_ratio > 0.0 && self.fit_height_ratio <= 1.0,
            "transform.fit-height-ratio must be in (0, 1]"
        );
        Ok(())
    }
}

fn axis_bound(container: f32, content: f32, scale: f32) -> f32 {
    let scaled = content * scale;
    if scaled > container {
        (scaled - container) / 2.0
    } else {
        0.0
    }
}

/// Legal pan range for `content` displayed at `scale` inside `container`.
/// An axis on which the scaled content fits collapses to `{0, 0}`.
pub fn compute_bounds(container: Size, content: Size, scale: f32) -> BoundRectangle {
    let bx = axis_bound(container.width, content.width, scale);
    let by = axis_bound(container.height, content.height, scale);
    BoundRectangle {
        min_x: -bx,
        max_x: bx,
        min_y: -by,
        max_y: by,
    }
}

pub fn apply_pan(current: Offset, delta: Offset, bounds: &BoundRectangle) -> Offset {
    bounds.clamp(Offset::new(current.x + delta.x, current.y + delta.y))
}

/// Scale for a two-contact gesture relative to where it started.
pub fn apply_pinch_zoom(
    initial_scale: f32,
    initial_distance: f32,
    current_distance: f32,
    limits: &TransformLimits,
) -> f32 {
    if !(initial_distance > 0.0) || !current_distance.is_finite() {
        return limits.clamp_scale(initial_scale);
    }
    limits.clamp_scale(initial_scale * (current_distance / initial_distance))
}

/// Scale that fills `fit_width_ratio` of the container width without the
/// scaled content exceeding `fit_height_ratio` of its height.
pub fn auto_fit_scale(container: Size, content: Size, limits: &TransformLimits) -> f32 {
    if !container.is_measurable() || !content.is_measurable() {
        return 1.0;
    }
    let target_width = container.width * limits.fit_width_ratio;
    let scale_x = target_width / content.width;
    let max_height = container.height * limits.fit_height_ratio;
    let scale_y = if content.height * scale_x > max_height {
        max_height / content.height
    } else {
        scale_x
    };
    limits.clamp_scale(scale_x.min(scale_y))
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Geometry {
    container: Size,
    content: Size,
}

/// Owner and single writer of [`FrameSettings`].
#[derive(Debug, Clone)]
pub struct TransformEngine {
    settings: FrameSettings,
    limits: TransformLimits,
    geometry: Option<Geometry>,
    bounds: BoundRectangle,
    auto_fit_armed: bool,
}

impl TransformEngine {
    pub fn new(limits: TransformLimits) -> Self {
        Self {
            settings: FrameSettings::default(),
            limits,
            geometry: None,
            bounds: BoundRectangle::ZERO,
            auto_fit_armed: false,
        }
    }

    pub fn settings(&self) -> &FrameSettings {
        &self.settings
    }

    pub fn limits(&self) -> &TransformLimits {
        &self.limits
    }

    pub fn bounds(&self) -> BoundRectangle {
        self.bounds
    }

    pub fn has_geometry(&self) -> bool {
        self.geometry.is_some()
    }

    pub fn auto_fit_pending(&self) -> bool {
        self.auto_fit_armed
    }

    /// A new photo was accepted: fresh settings, auto-fit armed for its
    /// first measurable geometry.
    pub fn begin_photo(&mut self) {
        self.settings = FrameSettings::default();
        self.geometry = None;
        self.bounds = BoundRectangle::ZERO;
        self.auto_fit_armed = true;
    }

    /// Session restart: drop the photo geometry and every edit.
    pub fn clear(&mut self) {
        self.settings = FrameSettings::default();
        self.geometry = None;
        self.bounds = BoundRectangle::ZERO;
        self.auto_fit_armed = false;
    }

    /// Feeds the latest laid-out container and displayed content sizes.
    ///
    /// Unmeasurable input leaves all state untouched and reports
    /// [`Error::GeometryUnavailable`]; the next geometry signal retries.
    /// The first measurable geometry after [`Self::begin_photo`] runs the
    /// one-time auto-fit.
    pub fn observe_geometry(&mut self, container: Size, content: Size) -> Result<()> {
        if !container.is_measurable() || !content.is_measurable() {
            return Err(Error::GeometryUnavailable);
        }
        self.geometry = Some(Geometry { container, content });
        self.refresh_bounds();

        if self.auto_fit_armed {
            self.auto_fit_armed = false;
            if self.settings.has_default_transform() {
                let scale = auto_fit_scale(container, content, &self.limits);
                debug!(scale, "auto-fit applied");
                self.settings.photo_scale = scale;
                self.settings.photo_offset = Offset::ZERO;
                // bounds above were computed for the pre-fit scale
                self.refresh_bounds();
            } else {
                debug!("auto-fit skipped; settings already edited");
            }
        }
        Ok(())
    }

    /// Incremental pointer drag. Without geometry this is a no-op.
    pub fn pan(&mut self, delta: Offset) -> Offset {
        if self.geometry.is_some() && delta.x.is_finite() && delta.y.is_finite() {
            self.settings.photo_offset = apply_pan(self.settings.photo_offset, delta, &self.bounds);
        }
        self.settings.photo_offset
    }

    pub fn pinch(&mut self, initial_scale: f32, initial_distance: f32, current_distance: f32) -> f32 {
        let scale = apply_pinch_zoom(
            initial_scale,
            initial_distance,
            current_distance,
            &self.limits,
        );
        self.set_scale(scale)
    }

    pub fn set_scale(&mut self, scale: f32) -> f32 {
        self.settings.photo_scale = self.limits.clamp_scale(scale);
        self.refresh_bounds();
        self.settings.photo_scale
    }

    /// Explicit user reset of position and zoom.
    pub fn reset(&mut self) {
        self.settings.photo_offset = Offset::ZERO;
        self.settings.photo_scale = 1.0;
        self.refresh_bounds();
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.settings.text = text.into();
    }

    pub fn set_font_style(&mut self, style: FontStyle) {
        self.settings.font_style = style;
    }

    pub fn toggle_font(&mut self) -> FontStyle {
        self.settings.font_style = self.settings.font_style.toggled();
        self.settings.font_style
    }

    fn refresh_bounds(&mut self) {
        self.bounds = match self.geometry {
            Some(g) => compute_bounds(g.container, g.content, self.settings.photo_scale),
            None => BoundRectangle::ZERO,
        };
        self.settings.photo_offset = self.bounds.clamp(self.settings.photo_offset);
    }
}
