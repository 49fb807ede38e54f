//! Windows cursor containers: static CUR files and RIFF-based ANI
//! animations.
//!
//! A CUR file is an ICO variant (resource type 2) whose directory entries
//! carry the hotspot where an icon would store color counts.  Directory
//! entries are kept sorted by pixel width; each image payload is either a
//! PNG stream or a classic DIB with its 1-bpp AND mask.

use std::collections::BTreeMap;
use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use cast::{u16, u8};

use crate::bitmap::{encode_png, Frame, Pixel, PixelOps};
use crate::error::{BitmapError, Error};

/// Windows cursors cap out at 256 pixels; a width of 256 is stored as 0.
pub const MAX_DIMENSION: u32 = 256;

const ICONDIR_SIZE: u32 = 6;
const ICONDIRENTRY_SIZE: u32 = 16;

/// Payload format for one directory image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// PNG stream; the format Vista and later prefer for 32-bit images.
    Png,
    /// BITMAPINFOHEADER + XOR pixels + AND mask, for legacy consumers.
    Dib,
}

struct DirEntry {
    width: u32,
    height: u32,
    hotspot: (u16, u16),
    data: Vec<u8>,
}

/// Encoder for one static cursor (or one animation frame).
#[derive(Default)]
pub struct CurEncoder {
    entries: Vec<DirEntry>,
}

impl CurEncoder {
    pub fn new() -> CurEncoder {
        CurEncoder::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Adds a resolution to the cursor.  32-bit ARGB input always encodes
    /// as PNG; use [`CurEncoder::add_frame_with`] to force a DIB payload.
    pub fn add_frame(&mut self, frame: &Frame) -> Result<(), Error> {
        self.add_frame_with(frame, Payload::Png)
    }

    pub fn add_frame_with(&mut self, frame: &Frame, payload: Payload) -> Result<(), Error> {
        frame.validate(MAX_DIMENSION)?;

        let data = match payload {
            Payload::Png => encode_png(&frame.bitmap)?,
            Payload::Dib => encode_dib(frame),
        };

        self.entries.push(DirEntry {
            width: frame.bitmap.width,
            height: frame.bitmap.height,
            hotspot: (
                u16(frame.hotspot.0).expect("hotspot within 256"),
                u16(frame.hotspot.1).expect("hotspot within 256"),
            ),
            data,
        });

        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out).expect("writing to a Vec");
        out
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        // Width-ascending directory; equal widths keep insertion order.
        let mut order: Vec<&DirEntry> = self.entries.iter().collect();
        order.sort_by_key(|e| e.width);

        w.write_u16::<LittleEndian>(0)?; // reserved
        w.write_u16::<LittleEndian>(2)?; // resource type: cursor
        w.write_u16::<LittleEndian>(u16(self.entries.len() as u64).expect("entry count"))?;

        let mut offset = ICONDIR_SIZE + ICONDIRENTRY_SIZE * self.entries.len() as u32;
        for entry in &order {
            w.write_u8(stored_dimension(entry.width))?;
            w.write_u8(stored_dimension(entry.height))?;
            w.write_u8(0)?; // color count
            w.write_u8(0)?; // reserved
            w.write_u16::<LittleEndian>(entry.hotspot.0)?;
            w.write_u16::<LittleEndian>(entry.hotspot.1)?;
            w.write_u32::<LittleEndian>(entry.data.len() as u32)?;
            w.write_u32::<LittleEndian>(offset)?;
            offset += entry.data.len() as u32;
        }

        for entry in &order {
            w.write_all(&entry.data)?;
        }

        Ok(())
    }
}

fn stored_dimension(value: u32) -> u8 {
    if value == MAX_DIMENSION {
        0
    } else {
        u8(value).expect("dimension within 256")
    }
}

/// BITMAPINFOHEADER + bottom-up unpremultiplied BGRA rows + 1-bpp AND mask.
/// The stored DIB height is twice the image height to cover the mask.
fn encode_dib(frame: &Frame) -> Vec<u8> {
    let bitmap = &frame.bitmap;
    let (w, h) = (bitmap.width, bitmap.height);

    let mask_stride = ((w + 31) / 32) * 4;
    let mut out = Vec::with_capacity((40 + w * h * 4 + mask_stride * h) as usize);

    out.write_u32::<LittleEndian>(40).unwrap(); // biSize
    out.write_i32::<LittleEndian>(w as i32).unwrap();
    out.write_i32::<LittleEndian>(2 * h as i32).unwrap(); // image + mask
    out.write_u16::<LittleEndian>(1).unwrap(); // planes
    out.write_u16::<LittleEndian>(32).unwrap(); // bits per pixel
    out.write_u32::<LittleEndian>(0).unwrap(); // BI_RGB
    out.write_u32::<LittleEndian>(w * h * 4 + mask_stride * h).unwrap();
    out.write_i32::<LittleEndian>(0).unwrap(); // x pixels per meter
    out.write_i32::<LittleEndian>(0).unwrap(); // y pixels per meter
    out.write_u32::<LittleEndian>(0).unwrap(); // colors used
    out.write_u32::<LittleEndian>(0).unwrap(); // colors important

    // XOR image, bottom-up.
    for y in (0..h).rev() {
        for x in 0..w {
            let pixel = Pixel::from_u32(bitmap.get(x, y)).unpremultiply();
            out.extend_from_slice(&[pixel.b, pixel.g, pixel.r, pixel.a]);
        }
    }

    // AND mask, bottom-up, MSB first, rows padded to 32 bits; a set bit
    // marks a transparent pixel.
    for y in (0..h).rev() {
        let mut row = vec![0u8; mask_stride as usize];
        for x in 0..w {
            if bitmap.get(x, y) >> 24 == 0 {
                row[(x / 8) as usize] |= 0x80 >> (x % 8);
            }
        }
        out.extend_from_slice(&row);
    }

    out
}

/// Per-frame display rate in jiffies (1/60 s).
///
/// Animations carrying explicit per-frame delays convert those; fixed-rate
/// animations derive the rate directly.
pub fn jiffies(delay_millis: Option<u32>, frame_rate: f64) -> u32 {
    match delay_millis {
        Some(ms) => (60.0 * f64::from(ms) / 1000.0).round() as u32,
        None => (60.0 / frame_rate).round() as u32,
    }
}

/// Encoder for an animated cursor.
///
/// Frames accumulate as per-frame [`CurEncoder`]s keyed by frame number;
/// the RIFF container is written at the end.
pub struct AniEncoder {
    name: String,
    artist: Option<String>,
    jiffies: u32,
    frames: BTreeMap<u32, CurEncoder>,
}

impl AniEncoder {
    pub fn new(name: &str, jiffies: u32) -> AniEncoder {
        AniEncoder {
            name: name.to_string(),
            artist: None,
            jiffies,
            frames: BTreeMap::new(),
        }
    }

    /// Attribution written into the optional INFO list.
    pub fn set_artist(&mut self, artist: &str) {
        self.artist = Some(artist.to_string());
    }

    pub fn add_frame(&mut self, frame: &Frame) -> Result<(), Error> {
        self.frames
            .entry(frame.frame_no)
            .or_insert_with(CurEncoder::new)
            .add_frame(frame)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        if self.frames.is_empty() {
            return Err(Error::Bitmap(BitmapError::EmptyAnimation(
                self.name.clone(),
            )));
        }

        let mut info = Vec::new();
        write_info_chunk(&mut info, b"INAM", &self.name);
        if let Some(ref artist) = self.artist {
            write_info_chunk(&mut info, b"IART", artist);
        }

        let mut fram = Vec::new();
        fram.extend_from_slice(b"fram");
        for encoder in self.frames.values() {
            let icon = encoder.to_bytes();
            fram.extend_from_slice(b"icon");
            fram.write_u32::<LittleEndian>(icon.len() as u32).unwrap();
            fram.extend_from_slice(&icon);
            if icon.len() % 2 != 0 {
                fram.push(0);
            }
        }

        let frame_count = self.frames.len() as u32;
        let mut body = Vec::new();
        body.extend_from_slice(b"ACON");

        body.extend_from_slice(b"LIST");
        body.write_u32::<LittleEndian>(4 + info.len() as u32).unwrap();
        body.extend_from_slice(b"INFO");
        body.extend_from_slice(&info);

        body.extend_from_slice(b"anih");
        body.write_u32::<LittleEndian>(36).unwrap();
        body.write_u32::<LittleEndian>(36).unwrap(); // cbSize
        body.write_u32::<LittleEndian>(frame_count).unwrap(); // cFrames
        body.write_u32::<LittleEndian>(frame_count).unwrap(); // cSteps
        body.write_u32::<LittleEndian>(0).unwrap(); // cx
        body.write_u32::<LittleEndian>(0).unwrap(); // cy
        body.write_u32::<LittleEndian>(0).unwrap(); // cBitCount
        body.write_u32::<LittleEndian>(0).unwrap(); // cPlanes
        body.write_u32::<LittleEndian>(self.jiffies).unwrap(); // jifRate
        body.write_u32::<LittleEndian>(1).unwrap(); // flags: icon data, no seq

        body.extend_from_slice(b"LIST");
        body.write_u32::<LittleEndian>(fram.len() as u32).unwrap();
        body.extend_from_slice(&fram);

        let mut out = Vec::with_capacity(body.len() + 8);
        out.extend_from_slice(b"RIFF");
        out.write_u32::<LittleEndian>(body.len() as u32).unwrap();
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), Error> {
        let bytes = self.to_bytes()?;
        w.write_all(&bytes)?;
        Ok(())
    }
}

fn write_info_chunk(out: &mut Vec<u8>, id: &[u8; 4], value: &str) {
    // NUL-terminated text, padded to an even chunk size.
    let mut text = value.as_bytes().to_vec();
    text.push(0);

    out.extend_from_slice(id);
    out.write_u32::<LittleEndian>(text.len() as u32).unwrap();
    out.extend_from_slice(&text);
    if text.len() % 2 != 0 {
        out.push(0);
    }
}
