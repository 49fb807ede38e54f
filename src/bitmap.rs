//! ARGB raster frames.
//!
//! Renderer backends produce premultiplied ARGB rasters; encoders consume
//! them by value.  Pixels are packed `0xAARRGGBB` words, the layout both the
//! Xcursor format and Windows DIBs derive from.

use std::io;

use rgb::RGBA8;

use crate::error::{BitmapError, Error};
use crate::rect::IRect;

/// A pixel consisting of R, G, B and A values.
pub type Pixel = RGBA8;

pub trait PixelOps {
    fn premultiply(self) -> Self;
    fn unpremultiply(self) -> Self;
    fn to_u32(&self) -> u32;
    fn from_u32(x: u32) -> Self;
}

impl PixelOps for Pixel {
    /// Returns a premultiplied value of this pixel.
    #[inline]
    fn premultiply(self) -> Self {
        let a = self.a as u32;
        self.map_rgb(|x| (((x as u32) * a + 127) / 255) as u8)
    }

    /// Returns an unpremultiplied value of this pixel.
    ///
    /// For a fully transparent pixel, a transparent black pixel will be
    /// returned.
    #[inline]
    fn unpremultiply(self) -> Self {
        if self.a == 0 {
            Self {
                r: 0,
                g: 0,
                b: 0,
                a: 0,
            }
        } else {
            let alpha = f32::from(self.a) / 255.0;
            self.map_rgb(|x| ((f32::from(x) / alpha) + 0.5) as u8)
        }
    }

    /// Returns the pixel value as a packed `0xAARRGGBB` word.
    #[inline]
    fn to_u32(&self) -> u32 {
        (u32::from(self.a) << 24)
            | (u32::from(self.r) << 16)
            | (u32::from(self.g) << 8)
            | u32::from(self.b)
    }

    /// Converts a packed `0xAARRGGBB` word into a `Pixel`.
    #[inline]
    fn from_u32(x: u32) -> Self {
        Self {
            r: ((x >> 16) & 0xFF) as u8,
            g: ((x >> 8) & 0xFF) as u8,
            b: (x & 0xFF) as u8,
            a: ((x >> 24) & 0xFF) as u8,
        }
    }
}

/// A premultiplied ARGB raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    /// `width * height` packed `0xAARRGGBB` words, premultiplied, row-major.
    pub pixels: Vec<u32>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32) -> Bitmap {
        Bitmap {
            width,
            height,
            pixels: vec![0; (width * height) as usize],
        }
    }

    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u32>) -> Bitmap {
        assert_eq!(pixels.len(), (width * height) as usize);
        Bitmap {
            width,
            height,
            pixels,
        }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.pixels[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, pixel: u32) {
        self.pixels[(y * self.width + x) as usize] = pixel;
    }

    /// Bounding box of pixels with nonzero alpha; `None` for a fully
    /// transparent bitmap.
    pub fn opaque_bounds(&self) -> Option<IRect> {
        let mut bounds: Option<IRect> = None;

        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) >> 24 != 0 {
                    let pixel = IRect::new(x as i32, y as i32, x as i32 + 1, y as i32 + 1);
                    bounds = Some(match bounds {
                        Some(b) => b.union(&pixel),
                        None => pixel,
                    });
                }
            }
        }

        bounds
    }

    /// Copies the `rect` portion out of this bitmap; areas outside the
    /// source are transparent.
    pub fn copy_rect(&self, rect: IRect) -> Bitmap {
        let mut out = Bitmap::new(rect.width() as u32, rect.height() as u32);

        for y in 0..out.height {
            let sy = rect.y0 + y as i32;
            if sy < 0 || sy >= self.height as i32 {
                continue;
            }
            for x in 0..out.width {
                let sx = rect.x0 + x as i32;
                if sx < 0 || sx >= self.width as i32 {
                    continue;
                }
                out.set(x, y, self.get(sx as u32, sy as u32));
            }
        }

        out
    }
}

/// One rendered cursor frame, ready for an encoder.
#[derive(Debug, Clone)]
pub struct Frame {
    pub bitmap: Bitmap,
    /// Hotspot in bitmap pixels.
    pub hotspot: (u32, u32),
    /// X11 nominal size; ignored by the Windows encoders.
    pub nominal: u32,
    /// Per-frame delay in milliseconds; 0 for static cursors.
    pub delay_millis: u32,
    /// 1-based animation frame number; 0 for static cursors.
    pub frame_no: u32,
}

impl Frame {
    pub fn validate(&self, max_dimension: u32) -> Result<(), BitmapError> {
        let (w, h) = (self.bitmap.width, self.bitmap.height);
        if w == 0 || h == 0 || w > max_dimension || h > max_dimension {
            return Err(BitmapError::DimensionOutOfRange {
                width: w,
                height: h,
                max: max_dimension,
            });
        }

        let (x, y) = self.hotspot;
        if x >= w || y >= h {
            return Err(BitmapError::HotspotOutOfBounds {
                x,
                y,
                width: w,
                height: h,
            });
        }

        Ok(())
    }
}

/// Encodes a premultiplied bitmap as a straight-alpha RGBA PNG stream.
pub fn encode_png(bitmap: &Bitmap) -> Result<Vec<u8>, Error> {
    let mut rgba = Vec::with_capacity(bitmap.pixels.len() * 4);
    for &word in &bitmap.pixels {
        let pixel = Pixel::from_u32(word).unpremultiply();
        rgba.extend_from_slice(&[pixel.r, pixel.g, pixel.b, pixel.a]);
    }

    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, bitmap.width, bitmap.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(png_error)?;
    writer.write_image_data(&rgba).map_err(png_error)?;
    writer.finish().map_err(png_error)?;
    Ok(out)
}

fn png_error(e: png::EncodingError) -> Error {
    match e {
        png::EncodingError::IoError(e) => Error::Io(e),
        other => Error::Io(io::Error::new(io::ErrorKind::InvalidData, other)),
    }
}

/// X11 nominal size for a raster: the mean extent scaled by the size
/// scheme's nominal factor, rounded to the next even integer.
pub fn nominal_size(width: u32, height: u32, nominal_factor: f64) -> u32 {
    let mean = f64::from(width + height) / 2.0;
    let rounded = (mean * nominal_factor).round() as u32;
    (rounded + 1) & !1
}

/// Crops `bitmap` to its opaque content, padded back out to a square
/// (clamped to the bitmap bounds), translating `hotspot` along.
///
/// A fully transparent bitmap is returned unchanged.
pub fn crop_to_content(bitmap: &Bitmap, hotspot: (u32, u32)) -> (Bitmap, (u32, u32)) {
    let Some(bounds) = bitmap.opaque_bounds() else {
        return (bitmap.clone(), hotspot);
    };

    let image = IRect::new(0, 0, bitmap.width as i32, bitmap.height as i32);
    let square = pad_to_square(bounds, image);

    let cropped = bitmap.copy_rect(square);
    let hx = (hotspot.0 as i32 - square.x0).clamp(0, square.width() - 1) as u32;
    let hy = (hotspot.1 as i32 - square.y0).clamp(0, square.height() - 1) as u32;

    (cropped, (hx, hy))
}

/// Centers `bitmap` on a square canvas of its larger extent.
pub fn center_to_square(bitmap: &Bitmap, hotspot: (u32, u32)) -> (Bitmap, (u32, u32)) {
    if bitmap.width == bitmap.height {
        return (bitmap.clone(), hotspot);
    }

    let side = bitmap.width.max(bitmap.height) as i32;
    let dx = (side - bitmap.width as i32) / 2;
    let dy = (side - bitmap.height as i32) / 2;

    let out = bitmap.copy_rect(IRect::new(-dx, -dy, side - dx, side - dy));
    (out, (hotspot.0 + dx as u32, hotspot.1 + dy as u32))
}

/// Expands `bounds` on its deficient axis until square, keeping the growth
/// centered and clamped inside `limit`.
fn pad_to_square(bounds: IRect, limit: IRect) -> IRect {
    let side = bounds.width().max(bounds.height());
    let (x0, x1) = pad_axis(bounds.x0, bounds.x1, side, limit.x0, limit.x1);
    let (y0, y1) = pad_axis(bounds.y0, bounds.y1, side, limit.y0, limit.y1);
    IRect::new(x0, y0, x1, y1)
}

fn pad_axis(mut lo: i32, mut hi: i32, side: i32, min: i32, max: i32) -> (i32, i32) {
    let deficit = side - (hi - lo);
    if deficit > 0 {
        lo -= deficit / 2;
        hi += deficit - deficit / 2;

        if lo < min {
            hi += min - lo;
            lo = min;
        }
        if hi > max {
            lo -= hi - max;
            hi = max;
        }
        lo = lo.max(min);
    }
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn packs_and_unpacks_pixels() {
        let p = Pixel {
            r: 0x11,
            g: 0x22,
            b: 0x33,
            a: 0x44,
        };
        assert_eq!(p.to_u32(), 0x4411_2233);
        assert_eq!(Pixel::from_u32(0x4411_2233), p);
    }

    #[test]
    fn nominal_sizes_round_to_even() {
        assert_eq!(nominal_size(32, 32, 1.0), 32);
        // 32.5 rounds to 33, then up to the next even integer.
        assert_eq!(nominal_size(33, 32, 1.0), 34);
        assert_eq!(nominal_size(32, 32, 1.5), 48);
        assert_eq!(nominal_size(24, 24, 1.25), 30);
        // 32 * 1.03 = 32.96 -> 33 -> next even 34
        assert_eq!(nominal_size(32, 32, 1.03), 34);
    }

    #[test]
    fn opaque_bounds_ignores_transparent_pixels() {
        let mut bitmap = Bitmap::new(8, 8);
        assert_eq!(bitmap.opaque_bounds(), None);

        bitmap.set(2, 3, 0xFF00_0000);
        bitmap.set(5, 4, 0x0100_0000);
        // Color without alpha does not count.
        bitmap.set(7, 7, 0x00FF_FFFF);

        assert_eq!(bitmap.opaque_bounds(), Some(IRect::new(2, 3, 6, 5)));
    }

    #[test]
    fn crops_and_translates_hotspot() {
        let mut bitmap = Bitmap::new(16, 16);
        bitmap.set(4, 4, 0xFF11_1111);
        bitmap.set(9, 7, 0xFF22_2222);

        let (cropped, hotspot) = crop_to_content(&bitmap, (5, 5));

        // Bounds 4..10 x 4..8 padded to a 6x6 square.
        assert_eq!((cropped.width, cropped.height), (6, 6));
        assert_eq!(hotspot, (1, 2));
        assert_eq!(cropped.get(0, 1), 0xFF11_1111);
        assert_eq!(cropped.get(5, 4), 0xFF22_2222);
    }

    #[test]
    fn crop_clamps_to_image_bounds() {
        let mut bitmap = Bitmap::new(8, 8);
        // Content hugging the right edge: 6..8 x 1..7.
        for y in 1..7 {
            bitmap.set(6, y, 0xFF00_00FF);
            bitmap.set(7, y, 0xFF00_00FF);
        }

        let (cropped, _) = crop_to_content(&bitmap, (7, 3));
        assert_eq!((cropped.width, cropped.height), (6, 6));

        let (full, hotspot) = crop_to_content(&Bitmap::new(4, 4), (1, 2));
        assert_eq!((full.width, full.height), (4, 4));
        assert_eq!(hotspot, (1, 2));
    }

    #[test]
    fn centers_on_square_canvas() {
        let mut bitmap = Bitmap::new(4, 8);
        bitmap.set(0, 0, 0xFFAB_CDEF);

        let (square, hotspot) = center_to_square(&bitmap, (0, 0));
        assert_eq!((square.width, square.height), (8, 8));
        assert_eq!(hotspot, (2, 0));
        assert_eq!(square.get(2, 0), 0xFFAB_CDEF);
    }

    #[test]
    fn validates_frames() {
        let frame = Frame {
            bitmap: Bitmap::new(32, 32),
            hotspot: (31, 0),
            nominal: 32,
            delay_millis: 0,
            frame_no: 0,
        };
        assert!(frame.validate(256).is_ok());

        let oversized = Frame {
            bitmap: Bitmap::new(300, 300),
            ..frame.clone()
        };
        assert!(matches!(
            oversized.validate(256),
            Err(BitmapError::DimensionOutOfRange { .. })
        ));

        let bad_hotspot = Frame {
            hotspot: (32, 0),
            ..frame
        };
        assert!(matches!(
            bad_hotspot.validate(256),
            Err(BitmapError::HotspotOutOfBounds { .. })
        ));
    }

    // Floating-point reference implementation
    fn premultiply_float(pixel: Pixel) -> Pixel {
        let alpha = f64::from(pixel.a) / 255.0;
        pixel.map_rgb(|x| ((f64::from(x) * alpha) + 0.5) as u8)
    }

    prop_compose! {
        fn arbitrary_pixel()(a: u8, r: u8, g: u8, b: u8) -> Pixel {
            Pixel { r, g, b, a }
        }
    }

    proptest! {
        #[test]
        fn pixel_premultiply(pixel in arbitrary_pixel()) {
            prop_assert_eq!(pixel.premultiply(), premultiply_float(pixel));
        }

        #[test]
        fn pixel_unpremultiply(pixel in arbitrary_pixel()) {
            let roundtrip = pixel.premultiply().unpremultiply();
            if pixel.a == 0 {
                prop_assert_eq!(roundtrip, Pixel::default());
            } else {
                // roundtrip can't be perfect, the accepted error depends on alpha
                let tolerance = 0xff / pixel.a;
                prop_assert!((i16::from(roundtrip.r) - i16::from(pixel.r)).unsigned_abs() as u8 <= tolerance);
                prop_assert!((i16::from(roundtrip.g) - i16::from(pixel.g)).unsigned_abs() as u8 <= tolerance);
                prop_assert!((i16::from(roundtrip.b) - i16::from(pixel.b)).unsigned_abs() as u8 <= tolerance);
                prop_assert_eq!(pixel.a, roundtrip.a);
            }
        }
    }
}
