//! Frame geometry: sizes, rectangles and the slot layout of the frame.

use serde::Deserialize;

pub const TITLE_PX: f32 = 40.0;
pub const SUBTITLE_PX: f32 = 18.0;
pub const ANNOTATION_PX: f32 = 18.0;
pub const ANNOTATION_LINE_HEIGHT: f32 = 1.5;
pub const FOOTER_LEAD_PX: f32 = 18.0;
pub const FOOTER_PX: f32 = 14.0;
pub const LINE_SPACING: f32 = 1.4;
pub const HEADER_GAP: f32 = 24.0;
pub const FOOTER_GAP: f32 = 24.0;
pub const ANNOTATION_GAP: f32 = 8.0;
pub const MIN_VIEWPORT_HEIGHT: f32 = 300.0;
pub const MAX_ANNOTATION_ROWS: usize = 3;
pub const CONTROL_SIZE: f32 = 32.0;
pub const CONTROL_INSET: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(from = "[f32; 2]")]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl From<[f32; 2]> for Size {
    fn from([width, height]: [f32; 2]) -> Self {
        Self { width, height }
    }
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Both dimensions are finite and strictly positive.
    pub fn is_measurable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }
}

/// A pan offset or point, origin at the center of whatever it is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offset {
    pub x: f32,
    pub y: f32,
}

impl Offset {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    pub fn distance(&self, other: &Offset) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_center(center: Offset, size: Size) -> Self {
        Self::new(
            center.x - size.width / 2.0,
            center.y - size.height / 2.0,
            size.width,
            size.height,
        )
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn center(&self) -> Offset {
        Offset::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }
}

/// Displayed size of content inside a container at scale 1: shrunk to fit,
/// never enlarged.
pub fn fit_within(natural: Size, container: Size) -> Size {
    if !natural.is_measurable() || !container.is_measurable() {
        return Size::default();
    }
    let scale = (container.width / natural.width)
        .min(container.height / natural.height)
        .min(1.0);
    natural.scaled(scale)
}

/// Number of visible annotation rows: one per explicit line, between 1 and 3.
pub fn annotation_rows(text: &str) -> usize {
    text.split('\n').count().clamp(1, MAX_ANNOTATION_ROWS)
}

/// Logical rectangles of every slot in the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLayout {
    pub frame: Rect,
    pub header: Rect,
    pub viewport: Rect,
    pub annotation: Rect,
    pub footer: Rect,
    pub annotation_rows: usize,
}

impl FrameLayout {
    /// Lays the header, photo viewport, annotation and footer out top to
    /// bottom. The viewport takes whatever height remains; when that is less
    /// than [`MIN_VIEWPORT_HEIGHT`] the frame grows instead.
    pub fn compute(frame: Size, padding: f32, annotation_rows: usize, footer_lines: usize) -> Self {
        let padding = padding.max(0.0);
        let inner_w = (frame.width - 2.0 * padding).max(0.0);
        let header_h = header_height();
        let annotation_h = annotation_rows.max(1) as f32 * ANNOTATION_PX * ANNOTATION_LINE_HEIGHT;
        let footer_h = footer_height(footer_lines);
        let fixed = 2.0 * padding
            + header_h
            + HEADER_GAP
            + FOOTER_GAP
            + annotation_h
            + ANNOTATION_GAP
            + footer_h;
        let viewport_h = (frame.height - fixed).max(MIN_VIEWPORT_HEIGHT);
        let frame_h = fixed + viewport_h;

        let header = Rect::new(padding, padding, inner_w, header_h);
        let viewport = Rect::new(padding, header.bottom() + HEADER_GAP, inner_w, viewport_h);
        let annotation = Rect::new(
            padding,
            viewport.bottom() + FOOTER_GAP,
            inner_w,
            annotation_h,
        );
        let footer = Rect::new(
            padding,
            annotation.bottom() + ANNOTATION_GAP,
            inner_w,
            footer_h,
        );

        Self {
            frame: Rect::new(0.0, 0.0, frame.width.max(0.0), frame_h),
            header,
            viewport,
            annotation,
            footer,
            annotation_rows: annotation_rows.max(1),
        }
    }

    /// Top edge of the separator drawn above the annotation.
    pub fn rule_y(&self) -> f32 {
        self.viewport.bottom() + FOOTER_GAP / 2.0
    }

    pub fn reset_control(&self) -> Rect {
        Rect::new(
            self.viewport.right() - CONTROL_INSET - CONTROL_SIZE,
            self.viewport.bottom() - CONTROL_INSET - CONTROL_SIZE,
            CONTROL_SIZE,
            CONTROL_SIZE,
        )
    }

    pub fn font_toggle_control(&self) -> Rect {
        let side = CONTROL_SIZE * 0.875;
        Rect::new(self.annotation.right() - side, self.annotation.y, side, side)
    }
}

fn header_height() -> f32 {
    TITLE_PX * 1.2 + 4.0 + SUBTITLE_PX * LINE_SPACING
}

fn footer_height(lines: usize) -> f32 {
    match lines {
        0 => 0.0,
        n => FOOTER_LEAD_PX * LINE_SPACING + (n - 1) as f32 * FOOTER_PX * LINE_SPACING,
    }
}
