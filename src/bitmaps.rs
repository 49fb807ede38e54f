//! Raw PNG bitmap output.
//!
//! The BITMAPS mode (and the Mousecape assembly flow built on it) wants the
//! rendered frames as plain PNG files: static cursors directly in the
//! output directory, animated cursors in a subdirectory per cursor.

use std::fs;
use std::path::{Path, PathBuf};

use crate::bitmap::{encode_png, Frame};
use crate::error::Error;

/// Writes rendered frames as a PNG directory tree.
pub struct BitmapWriter {
    out_dir: PathBuf,
}

impl BitmapWriter {
    pub fn new(out_dir: &Path) -> BitmapWriter {
        BitmapWriter {
            out_dir: out_dir.to_path_buf(),
        }
    }

    /// Writes one frame, returning the path written.
    pub fn write_frame(&self, target_name: &str, frame: &Frame, animated: bool) -> Result<PathBuf, Error> {
        let dir = if animated {
            self.out_dir.join(target_name)
        } else {
            self.out_dir.clone()
        };
        fs::create_dir_all(&dir)?;

        let frame_no = animated.then_some(frame.frame_no);
        let path = dir.join(file_name(target_name, frame.bitmap.width, frame_no));

        let png = encode_png(&frame.bitmap)?;
        fs::write(&path, png)?;
        Ok(path)
    }
}

/// `<cursorName>[-0]<size>[-<frameNo>].png`; the extra `0` keeps sizes below
/// 100 lexically sorted among three-digit ones.
fn file_name(name: &str, size: u32, frame_no: Option<u32>) -> String {
    let mut file = format!("{name}-{size:03}");
    if let Some(frame_no) = frame_no {
        file.push_str(&format!("-{frame_no:02}"));
    }
    file.push_str(".png");
    file
}
