//! Font discovery and glyph rasterization.
#![allow(clippy::too_many_arguments)]

use std::fs;

use ab_glyph::{Font, FontArc, FontVec, PxScale, ScaleFont, point};
use anyhow::{Context, Result};
use fontdb::{Database, Family, Query, Source};
use tracing::{debug, warn};

use crate::config::FontOptions;
use crate::processing::color::HexColor;
use crate::render::canvas::Canvas;
use crate::transform::FontStyle;

/// Faces used by the frame. Either may be missing; text drawn with a missing
/// face falls back to the other one, and is skipped when both are absent.
#[derive(Clone, Default)]
pub struct FontBook {
    pub serif: Option<FontArc>,
    pub sans: Option<FontArc>,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("serif", &self.serif.is_some())
            .field("sans", &self.sans.is_some())
            .finish()
    }
}

impl FontBook {
    pub fn face(&self, style: FontStyle) -> Option<&FontArc> {
        let (wanted, other) = match style {
            FontStyle::Serif => (&self.serif, &self.sans),
            FontStyle::Sans => (&self.sans, &self.serif),
        };
        wanted.as_ref().or(other.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.serif.is_none() && self.sans.is_none()
    }
}

/// Where an export gets its fonts from. Loading may block.
pub trait FontSource: Send + Sync {
    fn load(&self) -> Result<FontBook>;
}

/// Configured font files first, then the system font database.
#[derive(Debug, Clone, Default)]
pub struct SystemFonts {
    options: FontOptions,
}

impl SystemFonts {
    pub fn new(options: FontOptions) -> Self {
        Self { options }
    }
}

impl FontSource for SystemFonts {
    fn load(&self) -> Result<FontBook> {
        let mut db = Database::new();
        for path in &self.options.files {
            db.load_font_file(path)
                .with_context(|| format!("failed to load font file {}", path.display()))?;
        }
        db.load_system_fonts();
        debug!(faces = db.len(), "font database ready");

        let serif = pick_face(&db, &self.options.serif, Family::Serif)?;
        let sans = pick_face(&db, &self.options.sans, Family::SansSerif)?;
        let mut book = FontBook { serif, sans };
        if book.is_empty() {
            // any face beats rendering no text at all
            for face in db.faces() {
                if let Some(font) = load_face(&db, face.id)? {
                    book.serif = Some(font);
                    break;
                }
            }
        }
        if book.is_empty() {
            warn!("no usable font faces found; text will not be rendered");
        }
        Ok(book)
    }
}

fn pick_face(db: &Database, preferred: &[String], generic: Family<'_>) -> Result<Option<FontArc>> {
    let families = preferred
        .iter()
        .map(|name| Family::Name(name.as_str()))
        .chain(std::iter::once(generic));
    for family in families {
        if let Some(id) = db.query(&Query {
            families: &[family],
            ..Default::default()
        }) && let Some(font) = load_face(db, id)?
        {
            return Ok(Some(font));
        }
    }
    Ok(None)
}

fn load_face(db: &Database, id: fontdb::ID) -> Result<Option<FontArc>> {
    let face = db.face(id).context("missing font face in database")?;
    let data = match &face.source {
        Source::Binary(data) => data.as_ref().as_ref().to_vec(),
        Source::File(path) => {
            fs::read(path).with_context(|| format!("failed to read font at {}", path.display()))?
        }
        Source::SharedFile(_, data) => data.as_ref().as_ref().to_vec(),
    };
    match FontVec::try_from_vec_and_index(data, face.index) {
        Ok(font) => Ok(Some(FontArc::new(font))),
        Err(err) => {
            debug!(family = ?face.families.first(), error = %err, "skipping undecodable face");
            Ok(None)
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LineMetrics {
    pub ascent: f32,
    pub descent: f32,
}

pub fn line_metrics(font: &FontArc, scale: PxScale) -> LineMetrics {
    let scaled = font.as_scaled(scale);
    LineMetrics {
        ascent: scaled.ascent(),
        descent: scaled.descent().abs(),
    }
}

pub fn measure_text(text: &str, font: &FontArc, scale: PxScale) -> f32 {
    let scaled_font = font.as_scaled(scale);
    let mut width = 0.0f32;
    let mut previous = None;
    for ch in text.chars() {
        if ch.is_control() {
            continue;
        }
        let glyph_id = scaled_font.glyph_id(ch);
        if let Some(prev) = previous {
            width += scaled_font.kern(prev, glyph_id);
        }
        width += scaled_font.h_advance(glyph_id);
        previous = Some(glyph_id);
    }
    width.max(0.0)
}

/// Greedy word wrap; explicit newlines always break. A word wider than
/// `max_width` on its own is broken between characters.
pub fn wrap_text(text: &str, font: &FontArc, scale: PxScale, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current_line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current_line.is_empty() {
                word.to_string()
            } else {
                format!("{current_line} {word}")
            };
            if measure_text(&candidate, font, scale) <= max_width {
                current_line = candidate;
                continue;
            }
            if !current_line.is_empty() {
                lines.push(std::mem::take(&mut current_line));
            }
            for ch in word.chars() {
                current_line.push(ch);
                if current_line.chars().nth(1).is_some()
                    && measure_text(&current_line, font, scale) > max_width
                {
                    current_line.pop();
                    lines.push(std::mem::take(&mut current_line));
                    current_line.push(ch);
                }
            }
        }
        lines.push(current_line);
    }
    lines
}

pub fn draw_text(
    canvas: &mut Canvas,
    font: &FontArc,
    text: &str,
    color: HexColor,
    left: f32,
    baseline: f32,
    scale: PxScale,
) {
    let scaled = font.as_scaled(scale);
    let rgb = color.rgb_channels();
    let alpha = color.alpha();
    let mut cursor_x = left;
    let mut previous = None;
    for ch in text.chars() {
        if ch.is_control() {
            continue;
        }
        let glyph = scaled.glyph_id(ch);
        if let Some(prev) = previous {
            cursor_x += scaled.kern(prev, glyph);
        }
        let advance = scaled.h_advance(glyph);
        let mut positioned = scaled.scaled_glyph(ch);
        positioned.position = point(cursor_x, baseline);
        if let Some(outline) = font.outline_glyph(positioned) {
            let bounds = outline.px_bounds();
            outline.draw(|x, y, coverage| {
                canvas.blend_pixel(
                    (bounds.min.x + x as f32).floor() as i64,
                    (bounds.min.y + y as f32).floor() as i64,
                    rgb,
                    alpha * coverage,
                );
            });
        }
        cursor_x += advance;
        previous = Some(glyph);
    }
}

/// Draws one line horizontally centered on `center_x`, vertically centered in
/// a line box starting at `top`.
pub fn draw_centered_line(
    canvas: &mut Canvas,
    font: &FontArc,
    text: &str,
    color: HexColor,
    center_x: f32,
    top: f32,
    line_height: f32,
    px: f32,
) {
    let scale = PxScale::from(px);
    let metrics = line_metrics(font, scale);
    let width = measure_text(text, font, scale);
    let baseline = top + (line_height - (metrics.ascent + metrics.descent)) / 2.0 + metrics.ascent;
    draw_text(canvas, font, text, color, center_x - width / 2.0, baseline, scale);
}
