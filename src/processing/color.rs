use std::fmt;
use std::str::FromStr;

use image::Rgba;
use palette::{Srgb, Srgba};
use serde::de::{self, Deserializer};
use serde::Deserialize;

/// An sRGB color written as `#RRGGBB` or `#RRGGBBAA` in configuration.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HexColor(pub Rgba<u8>);

impl HexColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self(Rgba([r, g, b, 255]))
    }

    pub fn rgb_channels(&self) -> [u8; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    pub fn alpha(&self) -> f32 {
        f32::from(self.0[3]) / 255.0
    }

    pub fn is_opaque(&self) -> bool {
        self.0[3] == 255
    }
}

impl fmt::Debug for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0.0;
        write!(f, "#{r:02X}{g:02X}{b:02X}{a:02X}")
    }
}

impl FromStr for HexColor {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse_hex_color(input)
            .map(HexColor)
            .ok_or_else(|| format!("invalid hex color {input:?}"))
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

pub fn parse_hex_color(input: &str) -> Option<Rgba<u8>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(rgba) = Srgba::<u8>::from_str(trimmed) {
        return Some(Rgba([rgba.red, rgba.green, rgba.blue, rgba.alpha]));
    }

    let rgb = Srgb::<u8>::from_str(trimmed).ok()?;
    Some(Rgba([rgb.red, rgb.green, rgb.blue, 255]))
}

/// Source-over blend of an opaque color onto `dst` with the given coverage.
pub fn blend_normal(dst: &mut Rgba<u8>, src: [u8; 3], alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    for (channel, s) in dst.0.iter_mut().take(3).zip(src) {
        let d = f32::from(*channel);
        *channel = (f32::from(s) * alpha + d * (1.0 - alpha)).round() as u8;
    }
    let da = f32::from(dst[3]) / 255.0;
    dst[3] = ((alpha + da * (1.0 - alpha)) * 255.0).round() as u8;
}

/// Overlay blend of `src` onto an opaque backdrop.
pub fn blend_overlay(dst: &mut Rgba<u8>, src: [u8; 3], alpha: f32) {
    mix_with(dst, src, alpha, |b, s| {
        if b < 0.5 {
            2.0 * b * s
        } else {
            1.0 - 2.0 * (1.0 - b) * (1.0 - s)
        }
    });
}

/// Screen blend; never darkens.
pub fn blend_screen(dst: &mut Rgba<u8>, src: [u8; 3], alpha: f32) {
    mix_with(dst, src, alpha, |b, s| 1.0 - (1.0 - b) * (1.0 - s));
}

fn mix_with(dst: &mut Rgba<u8>, src: [u8; 3], alpha: f32, mode: impl Fn(f32, f32) -> f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    for (channel, s) in dst.0.iter_mut().take(3).zip(src) {
        let b = f32::from(*channel) / 255.0;
        let mixed = mode(b, f32::from(s) / 255.0);
        let out = b * (1.0 - alpha) + mixed * alpha;
        *channel = (out.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
}
