//! Error types.
//!
//! The taxonomy is behavioral: an error's kind tells the pipeline whether to
//! abort the current cursor, the current file, or the whole run.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors reading an SVG cursor source.
///
/// Reported per file; the pipeline aborts the current cursor and continues
/// with the next source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The file could not be read at all.
    #[error("cannot read source: {0}")]
    Unreadable(io::Error),

    /// The XML could not be parsed.
    #[error("XML parse error: {0}")]
    Xml(String),

    /// The document has no `<svg>` root element.
    #[error("document has no <svg> root element")]
    NotSvg,

    #[error("malformed viewBox \"{0}\"")]
    MalformedViewBox(String),

    /// An `align-anchor` path whose `d` does not start with a move command.
    #[error("malformed anchor path data \"{0}\"")]
    MalformedAnchor(String),

    #[error("attribute \"{attr}\": {message}")]
    InvalidAttribute { attr: String, message: String },
}

impl SourceError {
    pub fn invalid_attribute(attr: &str, message: impl ToString) -> SourceError {
        SourceError::InvalidAttribute {
            attr: attr.to_string(),
            message: message.to_string(),
        }
    }
}

/// Errors assembling rendered bitmaps into a cursor.
#[derive(Debug, Error)]
pub enum BitmapError {
    #[error("bitmap dimensions {width}\u{d7}{height} outside 1..={max}")]
    DimensionOutOfRange { width: u32, height: u32, max: u32 },

    #[error("hotspot ({x}, {y}) outside {width}\u{d7}{height} bitmap")]
    HotspotOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("animation \"{0}\" has no frames")]
    EmptyAnimation(String),

    /// An animated cursor whose frames do not all cover the same resolutions.
    #[error("animation \"{name}\": frame {frame} does not cover the same resolutions as the other frames")]
    SparseResolutions { name: String, frame: u32 },
}

/// Errors decoding a cursor container file.
///
/// Fatal for the file being decoded; each variant carries the offending
/// offset where one exists.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("not an Xcursor file")]
    BadMagic,

    #[error("unsupported header size {size} at offset {offset}")]
    UnsupportedHeaderSize { size: u32, offset: u64 },

    #[error("chunk at offset {offset} overlaps the preceding chunk")]
    OverlappingChunk { offset: u64 },

    #[error("chunk at offset {offset} does not match its table entry")]
    TocMismatch { offset: u64 },

    #[error("file truncated at offset {offset}")]
    Truncated { offset: u64 },

    #[error("invalid image dimensions {width}\u{d7}{height} at offset {offset}")]
    InvalidDimensions {
        width: u32,
        height: u32,
        offset: u64,
    },

    #[error("hotspot ({x}, {y}) outside image at offset {offset}")]
    InvalidHotspot { x: u32, y: u32, offset: u64 },
}

/// Configuration loading and validation errors.
///
/// These abort the run before anything is emitted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: {message}", path.display())]
    Invalid { path: PathBuf, message: String },
}

/// Top-level error for the rendering pipeline and the binaries.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: SourceError,
    },

    #[error(transparent)]
    Bitmap(#[from] BitmapError),

    #[error("{}: {source}", path.display())]
    Container {
        path: PathBuf,
        #[source]
        source: ContainerError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A source cursor name with no target-name mapping, in strict mode.
    /// The pipeline warns and skips; surfaced only through the API.
    #[error("no target name mapped for cursor \"{0}\"")]
    MissingMapping(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("renderer backend: {0}")]
    Backend(String),

    /// API misuse; a programmer error, not a data error.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("encoding workers did not finish within {0:?}")]
    EncodeTimeout(Duration),
}

impl Error {
    pub fn source_error(path: impl Into<PathBuf>, source: SourceError) -> Error {
        Error::Source {
            path: path.into(),
            source,
        }
    }

    pub fn container(path: impl Into<PathBuf>, source: ContainerError) -> Error {
        Error::Container {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error, per the CLI contract: 2 for
    /// configuration errors, 3 for I/O errors, 4 for everything else.
    /// (Argument errors exit 1 before an `Error` ever exists.)
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => 2,
            Error::Io(_) => 3,
            _ => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let config = Error::Config(ConfigError::Invalid {
            path: PathBuf::from("render.json"),
            message: String::from("no themes"),
        });
        assert_eq!(config.exit_code(), 2);

        let io = Error::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.exit_code(), 3);

        assert_eq!(Error::InvalidState("busy").exit_code(), 4);
        assert_eq!(Error::MissingMapping(String::from("wait")).exit_code(), 4);
    }

    #[test]
    fn container_errors_carry_offsets() {
        let err = ContainerError::OverlappingChunk { offset: 0x30 };
        assert!(err.to_string().contains("48"));
    }
}
