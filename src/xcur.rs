//! The Xcursor file format.
//!
//! An Xcursor file is a table of contents over typed chunks.  Image chunks
//! are keyed by their nominal size (the logical cursor size a desktop asks
//! for); several images under one nominal size form an animation.  Pixels
//! are premultiplied ARGB words, little-endian.
//!
//! The writer keeps the table sorted by nominal size with a stable sort, so
//! animation frames of one size stay in insertion order.  The reader walks
//! chunks in file order and refuses overlapping or backward chunk offsets.

use std::io::{self, Write};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::bitmap::{center_to_square, crop_to_content, Frame};
use crate::error::{BitmapError, ContainerError};

const MAGIC: u32 = 0x7275_6358; // "Xcur"
const FILE_HEADER_SIZE: u32 = 16;
const FILE_VERSION: u32 = 0x0001_0000;
const TOC_ENTRY_SIZE: u32 = 12;

const CHUNK_IMAGE: u32 = 0xFFFD_0002;
const CHUNK_COMMENT: u32 = 0xFFFE_0001;
const IMAGE_HEADER_SIZE: u32 = 36;
const COMMENT_HEADER_SIZE: u32 = 20;
const IMAGE_VERSION: u32 = 1;

/// Largest image extent the format admits.
pub const MAX_DIMENSION: u32 = 0x7FFF;

/// One image chunk: a cursor bitmap under a nominal size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XcurImage {
    pub nominal: u32,
    pub width: u32,
    pub height: u32,
    pub xhot: u32,
    pub yhot: u32,
    /// Frame delay in milliseconds; 0 for static images.
    pub delay: u32,
    /// Premultiplied ARGB words, row-major.
    pub pixels: Vec<u32>,
}

impl XcurImage {
    fn validate(&self) -> Result<(), BitmapError> {
        if self.width == 0
            || self.height == 0
            || self.width > MAX_DIMENSION
            || self.height > MAX_DIMENSION
        {
            return Err(BitmapError::DimensionOutOfRange {
                width: self.width,
                height: self.height,
                max: MAX_DIMENSION,
            });
        }
        if self.xhot >= self.width || self.yhot >= self.height {
            return Err(BitmapError::HotspotOutOfBounds {
                x: self.xhot,
                y: self.yhot,
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// Writer for one Xcursor file.
#[derive(Default)]
pub struct XcurEncoder {
    images: Vec<XcurImage>,
}

impl XcurEncoder {
    pub fn new() -> XcurEncoder {
        XcurEncoder::default()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn add_image(&mut self, image: XcurImage) -> Result<(), BitmapError> {
        image.validate()?;
        self.images.push(image);
        Ok(())
    }

    /// Adds a rendered frame.  With `crop` the bitmap shrinks to its opaque
    /// content (padded back out to a square); otherwise non-square content
    /// is centered on a square canvas.  The hotspot follows either way.
    pub fn add_frame(&mut self, frame: &Frame, crop: bool) -> Result<(), BitmapError> {
        let (bitmap, hotspot) = if crop {
            crop_to_content(&frame.bitmap, frame.hotspot)
        } else {
            center_to_square(&frame.bitmap, frame.hotspot)
        };

        self.add_image(XcurImage {
            nominal: frame.nominal,
            width: bitmap.width,
            height: bitmap.height,
            xhot: hotspot.0,
            yhot: hotspot.1,
            delay: frame.delay_millis,
            pixels: bitmap.pixels,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out).expect("writing to a Vec");
        out
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        // Nominal-size order; stable, so frames of one size keep their
        // insertion (frame) order.
        let mut order: Vec<&XcurImage> = self.images.iter().collect();
        order.sort_by_key(|image| image.nominal);

        let ntoc = order.len() as u32;
        w.write_u32::<LittleEndian>(MAGIC)?;
        w.write_u32::<LittleEndian>(FILE_HEADER_SIZE)?;
        w.write_u32::<LittleEndian>(FILE_VERSION)?;
        w.write_u32::<LittleEndian>(ntoc)?;

        let mut position = FILE_HEADER_SIZE + TOC_ENTRY_SIZE * ntoc;
        for image in &order {
            w.write_u32::<LittleEndian>(CHUNK_IMAGE)?;
            w.write_u32::<LittleEndian>(image.nominal)?;
            w.write_u32::<LittleEndian>(position)?;
            position += IMAGE_HEADER_SIZE + 4 * image.width * image.height;
        }

        for image in &order {
            w.write_u32::<LittleEndian>(IMAGE_HEADER_SIZE)?;
            w.write_u32::<LittleEndian>(CHUNK_IMAGE)?;
            w.write_u32::<LittleEndian>(image.nominal)?;
            w.write_u32::<LittleEndian>(IMAGE_VERSION)?;
            w.write_u32::<LittleEndian>(image.width)?;
            w.write_u32::<LittleEndian>(image.height)?;
            w.write_u32::<LittleEndian>(image.xhot)?;
            w.write_u32::<LittleEndian>(image.yhot)?;
            w.write_u32::<LittleEndian>(image.delay)?;
            for &pixel in &image.pixels {
                w.write_u32::<LittleEndian>(pixel)?;
            }
        }

        Ok(())
    }
}

/// A comment chunk: copyright (1), license (2) or other (3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XcurComment {
    pub subtype: u32,
    pub text: String,
}

/// Non-fatal observations the reader reports through its callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XcurWarning {
    /// An animated-looking size group whose frames carry no delay.
    ZeroDelay { nominal: u32 },

    /// A chunk of a type this reader does not know; skipped.
    UnknownChunk { chunk_type: u32, offset: u64 },
}

/// Decoded contents of an Xcursor file, images in file order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct XcurFile {
    pub images: Vec<XcurImage>,
    pub comments: Vec<XcurComment>,
}

impl XcurFile {
    /// Groups images into per-nominal-size animations, sizes in first-seen
    /// order and frames in file order.
    pub fn frames(&self) -> Vec<(u32, Vec<&XcurImage>)> {
        let mut groups: Vec<(u32, Vec<&XcurImage>)> = Vec::new();

        for image in &self.images {
            match groups.iter_mut().find(|(nominal, _)| *nominal == image.nominal) {
                Some((_, frames)) => frames.push(image),
                None => groups.push((image.nominal, vec![image])),
            }
        }

        groups
    }

    /// Re-encodes this file.  For files produced by [`XcurEncoder`] this is
    /// the identity on bytes.
    pub fn encode(&self) -> Result<Vec<u8>, BitmapError> {
        let mut encoder = XcurEncoder::new();
        for image in &self.images {
            encoder.add_image(image.clone())?;
        }
        Ok(encoder.to_bytes())
    }
}

/// Decodes an Xcursor file.
///
/// Malformed structure is fatal; unknown chunk types and suspicious delays
/// are reported through `warn` and do not abort.
pub fn decode(data: &[u8], warn: &mut dyn FnMut(XcurWarning)) -> Result<XcurFile, ContainerError> {
    let mut reader = Reader { data, offset: 0 };

    if reader.read_u32()? != MAGIC {
        return Err(ContainerError::BadMagic);
    }
    let header = reader.read_u32()?;
    if header != FILE_HEADER_SIZE {
        return Err(ContainerError::UnsupportedHeaderSize {
            size: header,
            offset: 4,
        });
    }
    let _version = reader.read_u32()?;
    let ntoc = reader.read_u32()?;

    if u64::from(FILE_HEADER_SIZE) + u64::from(ntoc) * u64::from(TOC_ENTRY_SIZE)
        > data.len() as u64
    {
        return Err(ContainerError::Truncated {
            offset: data.len() as u64,
        });
    }

    let mut toc = Vec::with_capacity(ntoc as usize);
    for _ in 0..ntoc {
        let chunk_type = reader.read_u32()?;
        let subtype = reader.read_u32()?;
        let position = reader.read_u32()?;
        toc.push((chunk_type, subtype, position));
    }

    // Chunks are visited in file order regardless of their table order.
    let mut order: Vec<usize> = (0..toc.len()).collect();
    order.sort_by_key(|&i| toc[i].2);

    let mut file = XcurFile::default();
    let mut end_of_previous = FILE_HEADER_SIZE + TOC_ENTRY_SIZE * ntoc;

    for i in order {
        let (toc_type, toc_subtype, position) = toc[i];

        if position < end_of_previous {
            return Err(ContainerError::OverlappingChunk {
                offset: u64::from(position),
            });
        }

        let mut chunk = Reader {
            data,
            offset: position as usize,
        };
        let chunk_header = chunk.read_u32()?;
        let chunk_type = chunk.read_u32()?;
        let chunk_subtype = chunk.read_u32()?;
        let _chunk_version = chunk.read_u32()?;

        if chunk_type != toc_type || chunk_subtype != toc_subtype {
            return Err(ContainerError::TocMismatch {
                offset: u64::from(position),
            });
        }

        match chunk_type {
            CHUNK_IMAGE => {
                if chunk_header != IMAGE_HEADER_SIZE {
                    return Err(ContainerError::UnsupportedHeaderSize {
                        size: chunk_header,
                        offset: u64::from(position),
                    });
                }

                let width = chunk.read_u32()?;
                let height = chunk.read_u32()?;
                let xhot = chunk.read_u32()?;
                let yhot = chunk.read_u32()?;
                let delay = chunk.read_u32()?;

                if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
                    return Err(ContainerError::InvalidDimensions {
                        width,
                        height,
                        offset: u64::from(position),
                    });
                }
                if xhot >= width || yhot >= height {
                    return Err(ContainerError::InvalidHotspot {
                        x: xhot,
                        y: yhot,
                        offset: u64::from(position),
                    });
                }

                let mut pixels = Vec::with_capacity((width * height) as usize);
                for _ in 0..width * height {
                    pixels.push(chunk.read_u32()?);
                }

                file.images.push(XcurImage {
                    nominal: chunk_subtype,
                    width,
                    height,
                    xhot,
                    yhot,
                    delay,
                    pixels,
                });

                end_of_previous = position + IMAGE_HEADER_SIZE + 4 * width * height;
            }

            CHUNK_COMMENT => {
                if chunk_header != COMMENT_HEADER_SIZE {
                    return Err(ContainerError::UnsupportedHeaderSize {
                        size: chunk_header,
                        offset: u64::from(position),
                    });
                }

                let length = chunk.read_u32()?;
                let text = chunk.read_bytes(length as usize)?;
                file.comments.push(XcurComment {
                    subtype: chunk_subtype,
                    text: String::from_utf8_lossy(text).into_owned(),
                });

                end_of_previous = position + COMMENT_HEADER_SIZE + length;
            }

            other => {
                warn(XcurWarning::UnknownChunk {
                    chunk_type: other,
                    offset: u64::from(position),
                });
                // Unknown length; assume the bare chunk header.
                end_of_previous = position + 16;
            }
        }
    }

    for (nominal, frames) in file.frames() {
        if frames.len() > 1 && frames.iter().any(|f| f.delay == 0) {
            warn(XcurWarning::ZeroDelay { nominal });
        }
    }

    Ok(file)
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn read_u32(&mut self) -> Result<u32, ContainerError> {
        let bytes = self.read_bytes(4)?;
        Ok(LittleEndian::read_u32(bytes))
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ContainerError> {
        if self.offset + len > self.data.len() {
            return Err(ContainerError::Truncated {
                offset: self.data.len() as u64,
            });
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }
}
