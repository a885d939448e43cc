// Drawing helpers pass explicit geometry and color arguments.
#![allow(clippy::too_many_arguments)]

use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use image::{Rgba, RgbaImage};

use crate::processing::color::{HexColor, blend_normal};
use crate::processing::layout::Rect;

/// Opaque RGBA8 drawing surface in device pixels.
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: HexColor) -> Self {
        let [r, g, b] = background.rgb_channels();
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255])),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Source-over blend of one pixel; out-of-range coordinates are dropped.
    pub fn blend_pixel(&mut self, x: i64, y: i64, color: [u8; 3], alpha: f32) {
        if x < 0 || y < 0 || x >= i64::from(self.width()) || y >= i64::from(self.height()) {
            return;
        }
        blend_normal(self.image.get_pixel_mut(x as u32, y as u32), color, alpha);
    }

    pub fn fill_rect(&mut self, rect: Rect, color: HexColor) {
        let Some((x0, y0, x1, y1)) = self.pixel_span(rect) else {
            return;
        };
        let rgb = color.rgb_channels();
        let alpha = color.alpha();
        for y in y0..y1 {
            for x in x0..x1 {
                blend_normal(self.image.get_pixel_mut(x, y), rgb, alpha);
            }
        }
    }

    /// Anti-aliased filled circle.
    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: [u8; 3], alpha: f32) {
        let rect = Rect::new(cx - radius - 1.0, cy - radius - 1.0, radius * 2.0 + 2.0, radius * 2.0 + 2.0);
        let Some((x0, y0, x1, y1)) = self.pixel_span(rect) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let d = (x as f32 + 0.5 - cx).hypot(y as f32 + 0.5 - cy);
                let coverage = (radius - d + 0.5).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    blend_normal(self.image.get_pixel_mut(x, y), color, alpha * coverage);
                }
            }
        }
    }

    /// Anti-aliased ring of the given stroke width.
    pub fn stroke_circle(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        stroke: f32,
        color: [u8; 3],
        alpha: f32,
    ) {
        let outer = radius + stroke / 2.0;
        let rect = Rect::new(cx - outer - 1.0, cy - outer - 1.0, outer * 2.0 + 2.0, outer * 2.0 + 2.0);
        let Some((x0, y0, x1, y1)) = self.pixel_span(rect) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let d = (x as f32 + 0.5 - cx).hypot(y as f32 + 0.5 - cy);
                let coverage = (stroke / 2.0 - (d - radius).abs() + 0.5).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    blend_normal(self.image.get_pixel_mut(x, y), color, alpha * coverage);
                }
            }
        }
    }

    /// Draws `src` stretched into `dest`, showing only the part inside `clip`.
    /// The visible region is cropped out of the source and resampled once.
    pub fn draw_image(&mut self, src: &RgbaImage, dest: Rect, clip: Rect) -> Result<()> {
        if src.width() == 0 || src.height() == 0 || dest.width <= 0.0 || dest.height <= 0.0 {
            return Ok(());
        }
        let Some(visible) = dest
            .intersect(&clip)
            .and_then(|r| r.intersect(&self.bounds()))
        else {
            return Ok(());
        };
        let x0 = visible.x.round().max(0.0) as u32;
        let y0 = visible.y.round().max(0.0) as u32;
        let x1 = (visible.right().round() as u32).min(self.width());
        let y1 = (visible.bottom().round() as u32).min(self.height());
        if x1 <= x0 || y1 <= y0 {
            return Ok(());
        }
        let (target_w, target_h) = (x1 - x0, y1 - y0);

        let sx = f64::from(src.width()) / f64::from(dest.width);
        let sy = f64::from(src.height()) / f64::from(dest.height);
        let left = ((f64::from(x0) - f64::from(dest.x)) * sx).clamp(0.0, f64::from(src.width()));
        let top = ((f64::from(y0) - f64::from(dest.y)) * sy).clamp(0.0, f64::from(src.height()));
        let crop_w = (f64::from(target_w) * sx).min(f64::from(src.width()) - left);
        let crop_h = (f64::from(target_h) * sy).min(f64::from(src.height()) - top);
        if crop_w <= 0.0 || crop_h <= 0.0 {
            return Ok(());
        }

        let patch = resize_region(src, left, top, crop_w, crop_h, target_w, target_h)?;
        for (px, py, pixel) in patch.enumerate_pixels() {
            let alpha = f32::from(pixel[3]) / 255.0;
            blend_normal(
                self.image.get_pixel_mut(x0 + px, y0 + py),
                [pixel[0], pixel[1], pixel[2]],
                alpha,
            );
        }
        Ok(())
    }

    /// Whole-pixel span `[x0, x1) x [y0, y1)` of `rect` clipped to the canvas.
    pub fn pixel_span(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let r = rect.intersect(&self.bounds())?;
        let x0 = r.x.floor().max(0.0) as u32;
        let y0 = r.y.floor().max(0.0) as u32;
        let x1 = (r.right().ceil() as u32).min(self.width());
        let y1 = (r.bottom().ceil() as u32).min(self.height());
        (x1 > x0 && y1 > y0).then_some((x0, y0, x1, y1))
    }
}

fn resize_region(
    source: &RgbaImage,
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    target_w: u32,
    target_h: u32,
) -> Result<RgbaImage> {
    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for photo resize")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom))
        .crop(left, top, width, height);
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("photo resize failed")?;
    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| anyhow!("failed to construct resized RGBA image"))
}
