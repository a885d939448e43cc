//! Decorative layers drawn over the photo viewport.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{BROWN, GOLD};
use crate::processing::color::{blend_normal, blend_overlay, blend_screen};
use crate::processing::layout::Rect;
use crate::render::canvas::Canvas;

const WARM_START_ALPHA: f32 = 0.15;
const WARM_END_ALPHA: f32 = 0.10;
const GRAIN_STRENGTH: f32 = 0.08;
const LEAK_COLOR: [u8; 3] = [255, 176, 96];
const LEAK_ALPHA: f32 = 0.35;

/// 135 degree gradient from translucent gold to brown, overlay-blended.
pub fn warm_tone(canvas: &mut Canvas, area: Rect) {
    let Some((x0, y0, x1, y1)) = canvas.pixel_span(area) else {
        return;
    };
    let gold = GOLD.rgb_channels();
    let brown = BROWN.rgb_channels();
    let span = (area.width + area.height).max(1.0);
    let image = canvas.image_mut();
    for y in y0..y1 {
        for x in x0..x1 {
            let t = (((x as f32 - area.x) + (y as f32 - area.y)) / span).clamp(0.0, 1.0);
            let color = lerp_rgb(gold, brown, t);
            let alpha = WARM_START_ALPHA + (WARM_END_ALPHA - WARM_START_ALPHA) * t;
            blend_overlay(image.get_pixel_mut(x, y), color, alpha);
        }
    }
}

/// Seeded monochrome noise. `cell` is the grain size in device pixels so the
/// texture looks the same at every export density.
pub fn film_grain(canvas: &mut Canvas, area: Rect, seed: u64, cell: u32) {
    let Some((x0, y0, x1, y1)) = canvas.pixel_span(area) else {
        return;
    };
    let cell = cell.max(1);
    let cols = (x1 - x0).div_ceil(cell) as usize;
    let mut rng = StdRng::seed_from_u64(seed);
    let noise: Vec<f32> = (0..cols * (y1 - y0).div_ceil(cell) as usize)
        .map(|_| rng.random::<f32>() * 2.0 - 1.0)
        .collect();
    let image = canvas.image_mut();
    for y in y0..y1 {
        for x in x0..x1 {
            let idx = ((y - y0) / cell) as usize * cols + ((x - x0) / cell) as usize;
            let n = noise[idx];
            let target = if n >= 0.0 { [255, 255, 255] } else { [0, 0, 0] };
            blend_normal(image.get_pixel_mut(x, y), target, n.abs() * GRAIN_STRENGTH);
        }
    }
}

/// Warm radial glow entering from the top-right corner.
pub fn light_leak(canvas: &mut Canvas, area: Rect) {
    let Some((x0, y0, x1, y1)) = canvas.pixel_span(area) else {
        return;
    };
    let cx = area.x + area.width * 0.85;
    let cy = area.y + area.height * 0.15;
    let radius = area.width.max(area.height) * 0.6;
    let image = canvas.image_mut();
    for y in y0..y1 {
        for x in x0..x1 {
            let d = (x as f32 + 0.5 - cx).hypot(y as f32 + 0.5 - cy) / radius;
            if d >= 1.0 {
                continue;
            }
            let falloff = (1.0 - d) * (1.0 - d);
            blend_screen(image.get_pixel_mut(x, y), LEAK_COLOR, LEAK_ALPHA * falloff);
        }
    }
}

fn lerp_rgb(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let mix = |a: u8, b: u8| (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8;
    [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2])]
}
