//! CPU rasterizer for composition snapshots.
//!
//! Everything is laid out in logical pixels and multiplied by the density at
//! draw time, so a live preview and a 2x export share one code path.

pub mod canvas;
pub mod overlays;
pub mod text;

use ab_glyph::{FontArc, PxScale};
use anyhow::{Result, ensure};
use image::RgbaImage;
use tracing::{debug, warn};

use crate::composition::{CompositionSnapshot, ControlKind};
use crate::config::PAPER;
use crate::processing::color::HexColor;
use crate::processing::layout::{
    ANNOTATION_LINE_HEIGHT, ANNOTATION_PX, FOOTER_LEAD_PX, FOOTER_PX, LINE_SPACING, Offset, Rect,
    SUBTITLE_PX, TITLE_PX,
};
use crate::transform::FontStyle;

use self::canvas::Canvas;
use self::text::{FontBook, draw_centered_line, wrap_text};

/// Largest edge the rasterizer will allocate.
pub const MAX_DIMENSION: u32 = 16_384;
const MIN_ANNOTATION_PX: f32 = 10.0;

pub fn output_size(snapshot: &CompositionSnapshot, density: f32) -> Result<(u32, u32)> {
    ensure!(
        density.is_finite() && density > 0.0,
        "pixel density must be positive"
    );
    let frame = snapshot.layout.frame;
    let width = (frame.width * density).round();
    let height = (frame.height * density).round();
    ensure!(
        width >= 1.0 && height >= 1.0,
        "composition has no rendered size"
    );
    ensure!(
        width <= MAX_DIMENSION as f32 && height <= MAX_DIMENSION as f32,
        "output of {width}x{height} exceeds {MAX_DIMENSION}px"
    );
    Ok((width as u32, height as u32))
}

/// Draws the snapshot back to front: paper, header, photo, overlays,
/// annotation, footer and finally whichever controls the snapshot carries.
pub fn rasterize(snapshot: &CompositionSnapshot, density: f32, fonts: &FontBook) -> Result<RgbaImage> {
    let (width, height) = output_size(snapshot, density)?;
    let paper = if snapshot.paper.is_opaque() {
        snapshot.paper
    } else {
        PAPER
    };
    let mut canvas = Canvas::new(width, height, paper);
    let layout = snapshot.layout;
    let colors = &snapshot.design.colors;
    if fonts.is_empty() {
        warn!("no fonts available; skipping text");
    }

    // header
    if let Some(font) = fonts.face(FontStyle::Serif) {
        let header = layout.header.scaled(density);
        let title_box = TITLE_PX * 1.2 * density;
        draw_centered_line(
            &mut canvas,
            font,
            &snapshot.design.title,
            colors.title,
            header.center().x,
            header.y,
            title_box,
            TITLE_PX * density,
        );
        draw_centered_line(
            &mut canvas,
            font,
            &snapshot.design.subtitle,
            colors.subtitle,
            header.center().x,
            header.y + title_box + 4.0 * density,
            SUBTITLE_PX * LINE_SPACING * density,
            SUBTITLE_PX * density,
        );
    }

    // photo
    let viewport = layout.viewport.scaled(density);
    if let Some(photo) = &snapshot.photo {
        let size = snapshot.content.scaled(snapshot.scale * density);
        let center = viewport.center();
        let offset = snapshot.offset.scaled(density);
        let dest = Rect::from_center(Offset::new(center.x + offset.x, center.y + offset.y), size);
        debug!(
            x = dest.x,
            y = dest.y,
            width = dest.width,
            height = dest.height,
            "drawing photo"
        );
        canvas.draw_image(photo, dest, viewport)?;
    }

    if snapshot.overlays.warm_tone {
        overlays::warm_tone(&mut canvas, viewport);
    }
    if snapshot.overlays.film_grain {
        let cell = density.round().max(1.0) as u32;
        overlays::film_grain(&mut canvas, viewport, snapshot.overlays.grain_seed, cell);
    }
    if snapshot.overlays.light_leak {
        overlays::light_leak(&mut canvas, viewport);
    }

    // separator above the annotation
    let rule_w = layout.annotation.width * 0.3;
    let rule = Rect::new(
        layout.annotation.center().x - rule_w / 2.0,
        layout.rule_y(),
        rule_w,
        1.0,
    );
    canvas.fill_rect(rule.scaled(density), colors.rule);

    let annotation_font = fonts.face(snapshot.font_style);
    if let Some(font) = annotation_font {
        if !snapshot.text.is_empty() {
            draw_annotation(&mut canvas, font, &snapshot.text, colors.annotation, layout.annotation, density);
        } else if let Some(placeholder) = &snapshot.placeholder {
            draw_annotation(&mut canvas, font, placeholder, colors.placeholder, layout.annotation, density);
        }
    }

    if let Some(font) = fonts.face(FontStyle::Serif) {
        let footer = layout.footer.scaled(density);
        let mut top = footer.y;
        for (i, line) in snapshot.design.footer_lines.iter().enumerate() {
            let px = if i == 0 { FOOTER_LEAD_PX } else { FOOTER_PX };
            let line_height = px * LINE_SPACING * density;
            draw_centered_line(
                &mut canvas,
                font,
                line,
                colors.footer,
                footer.center().x,
                top,
                line_height,
                px * density,
            );
            top += line_height;
        }
    }

    for (kind, rect) in &snapshot.controls {
        draw_control(&mut canvas, fonts, *kind, rect.scaled(density), colors.accent, paper);
    }

    Ok(canvas.into_image())
}

/// Wraps to the slot width and shrinks the font until every line fits the
/// slot's rows; below the minimum size the line pitch is compressed instead.
fn draw_annotation(
    canvas: &mut Canvas,
    font: &FontArc,
    text: &str,
    color: HexColor,
    slot: Rect,
    density: f32,
) {
    let slot = slot.scaled(density);
    let mut px = ANNOTATION_PX;
    let mut lines = wrap_text(text, font, PxScale::from(px * density), slot.width);
    while lines.len() > slot_rows(slot, density) && px > MIN_ANNOTATION_PX {
        px = (px - 1.0).max(MIN_ANNOTATION_PX);
        lines = wrap_text(text, font, PxScale::from(px * density), slot.width);
    }
    let pitch = (px * ANNOTATION_LINE_HEIGHT * density).min(slot.height / lines.len().max(1) as f32);
    let block = pitch * lines.len() as f32;
    let mut top = slot.y + (slot.height - block).max(0.0) / 2.0;
    for line in &lines {
        draw_centered_line(canvas, font, line, color, slot.center().x, top, pitch, px * density);
        top += pitch;
    }
}

fn slot_rows(slot: Rect, density: f32) -> usize {
    (slot.height / (ANNOTATION_PX * ANNOTATION_LINE_HEIGHT * density)).round().max(1.0) as usize
}

fn draw_control(
    canvas: &mut Canvas,
    fonts: &FontBook,
    kind: ControlKind,
    rect: Rect,
    accent: HexColor,
    paper: HexColor,
) {
    let c = rect.center();
    let radius = rect.width.min(rect.height) / 2.0;
    canvas.fill_circle(c.x, c.y, radius, accent.rgb_channels(), 0.85);
    match kind {
        ControlKind::ResetTransform => {
            canvas.stroke_circle(c.x, c.y, radius * 0.45, (radius * 0.12).max(1.0), paper.rgb_channels(), 1.0);
        }
        ControlKind::FontToggle => {
            if let Some(font) = fonts.face(FontStyle::Serif) {
                draw_centered_line(canvas, font, "Aa", paper, c.x, rect.y, rect.height, radius);
            }
        }
    }
}
