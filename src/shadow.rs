//! Post-raster drop shadow.
//!
//! Backends without SVG filter support get their shadow painted here: the
//! rendered frame's alpha is blurred with three successive box blurs (the
//! usual Gaussian approximation), offset, tinted, and composited under the
//! frame.

use crate::bitmap::Bitmap;
use crate::variant::DropShadow;

/// Applies `shadow` under `bitmap`.
///
/// `scale` converts the shadow's source-unit geometry to pixels
/// (`targetSize / sourceViewBoxWidth`); the vertical offset is negated going
/// from SVG to raster space.
pub fn drop_shadow(bitmap: &Bitmap, shadow: &DropShadow, scale: f64) -> Bitmap {
    let width = bitmap.width as usize;
    let height = bitmap.height as usize;

    let mut alpha: Vec<f32> = bitmap
        .pixels
        .iter()
        .map(|p| ((p >> 24) & 0xFF) as f32 / 255.0)
        .collect();

    gaussian_blur(&mut alpha, width, height, shadow.blur * scale);

    let dx = (shadow.dx * scale).round() as i32;
    let dy = (-shadow.dy * scale).round() as i32;
    let opacity = shadow.opacity.clamp(0.0, 1.0) as f32;
    let (cr, cg, cb) = parse_color(&shadow.color);

    let mut out = Bitmap::new(bitmap.width, bitmap.height);
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let src = bitmap.get(x as u32, y as u32);

            let (sx, sy) = (x - dx, y - dy);
            let shadow_alpha = if sx >= 0 && sy >= 0 && (sx as usize) < width && (sy as usize) < height
            {
                alpha[sy as usize * width + sx as usize] * opacity
            } else {
                0.0
            };

            out.set(x as u32, y as u32, over(src, shadow_alpha, cr, cg, cb));
        }
    }

    out
}

/// Source-over composite of a premultiplied pixel onto a shadow sample.
fn over(src: u32, shadow_alpha: f32, r: u8, g: u8, b: u8) -> u32 {
    if shadow_alpha <= 0.0 {
        return src;
    }

    let sa = (src >> 24) & 0xFF;
    let remainder = shadow_alpha * (1.0 - sa as f32 / 255.0);

    let channel = |src_channel: u32, tint: u8| -> u32 {
        let shadow_channel = f32::from(tint) * remainder;
        (src_channel as f32 + shadow_channel + 0.5).min(255.0) as u32
    };

    let a = channel(sa, 255);
    let r = channel((src >> 16) & 0xFF, r);
    let g = channel((src >> 8) & 0xFF, g);
    let b = channel(src & 0xFF, b);
    (a << 24) | (r << 16) | (g << 8) | b
}

/// Three box blurs approximating a Gaussian of the given standard deviation.
fn gaussian_blur(values: &mut [f32], width: usize, height: usize, sigma: f64) {
    // Box size per the SVG filter specification.
    let d = (sigma * 3.0 * (2.0 * std::f64::consts::PI).sqrt() / 4.0 + 0.5).floor() as usize;
    if d < 2 {
        return;
    }

    let mut scratch = vec![0.0f32; values.len()];
    for _ in 0..3 {
        box_blur_rows(values, &mut scratch, width, height, d);
        // Transposed pass blurs columns.
        box_blur_cols(&mut scratch, values, width, height, d);
    }
}

fn box_blur_rows(src: &[f32], dst: &mut [f32], width: usize, height: usize, d: usize) {
    let left = d / 2;
    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        let out = &mut dst[y * width..(y + 1) * width];
        box_blur_line(row, out, left, d);
    }
}

fn box_blur_cols(src: &[f32], dst: &mut [f32], width: usize, height: usize, d: usize) {
    let left = d / 2;
    let mut column = vec![0.0f32; height];
    let mut blurred = vec![0.0f32; height];

    for x in 0..width {
        for y in 0..height {
            column[y] = src[y * width + x];
        }
        box_blur_line(&column, &mut blurred, left, d);
        for y in 0..height {
            dst[y * width + x] = blurred[y];
        }
    }
}

// Windowed sum; out-of-range samples contribute zero.  Lines here are at
// most a few hundred samples, so the direct sum beats bookkeeping.
fn box_blur_line(src: &[f32], dst: &mut [f32], left: usize, d: usize) {
    let n = src.len() as isize;
    let norm = 1.0 / d as f32;

    for (i, out) in dst.iter_mut().enumerate() {
        let start = i as isize - left as isize;
        let lo = start.clamp(0, n) as usize;
        let hi = (start + d as isize).clamp(0, n) as usize;
        *out = if lo < hi {
            src[lo..hi].iter().sum::<f32>() * norm
        } else {
            0.0
        };
    }
}

fn parse_color(literal: &str) -> (u8, u8, u8) {
    let hex = literal.strip_prefix('#').unwrap_or(literal);
    let parse = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(0)
    };
    (parse(0..2), parse(2..4), parse(4..6))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(size: u32, x: u32, y: u32) -> Bitmap {
        let mut bitmap = Bitmap::new(size, size);
        bitmap.set(x, y, 0xFFFF_FFFF);
        bitmap
    }

    fn shadow() -> DropShadow {
        DropShadow {
            blur: 16.0,
            dx: 32.0,
            dy: -32.0,
            opacity: 1.0,
            color: String::from("#000000"),
        }
    }

    #[test]
    fn shadow_appears_offset_from_source() {
        // Scale 32/256: blur 2px, offset (+4, +4).
        let out = drop_shadow(&dot(32, 10, 10), &shadow(), 32.0 / 256.0);

        // The source pixel is untouched (shadow composites under it).
        assert_eq!(out.get(10, 10), 0xFFFF_FFFF);

        // Around the offset position there is shadow alpha but no color.
        let shadowed = out.get(14, 14);
        assert!(shadowed >> 24 > 0, "no shadow alpha at offset");
        assert_eq!(shadowed & 0x00FF_FFFF, 0);

        // Far corners stay empty.
        assert_eq!(out.get(0, 31), 0);
    }

    #[test]
    fn opacity_scales_shadow_alpha() {
        let full = drop_shadow(&dot(32, 10, 10), &shadow(), 0.125);
        let half = drop_shadow(
            &dot(32, 10, 10),
            &DropShadow {
                opacity: 0.5,
                ..shadow()
            },
            0.125,
        );

        let fa = full.get(14, 14) >> 24;
        let ha = half.get(14, 14) >> 24;
        assert!(ha < fa, "half-opacity shadow not lighter: {ha} vs {fa}");
    }

    #[test]
    fn tint_follows_configured_color() {
        let tinted = drop_shadow(
            &dot(32, 10, 10),
            &DropShadow {
                color: String::from("#ff0000"),
                ..shadow()
            },
            0.125,
        );

        let pixel = tinted.get(14, 14);
        assert!(pixel >> 24 > 0);
        assert!((pixel >> 16) & 0xFF > 0, "red channel empty");
        assert_eq!(pixel & 0xFF, 0, "blue channel tinted");
    }

    #[test]
    fn zero_blur_is_a_hard_shadow() {
        let out = drop_shadow(
            &dot(32, 10, 10),
            &DropShadow {
                blur: 0.0,
                ..shadow()
            },
            0.125,
        );

        assert_eq!(out.get(14, 14) >> 24, 255);
        assert_eq!(out.get(15, 14), 0);
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_color("#102030"), (0x10, 0x20, 0x30));
        assert_eq!(parse_color("#ff000080"), (0xFF, 0, 0));
        assert_eq!(parse_color("bogus"), (0, 0, 0));
    }
}
