//! Render SVG cursor sources into platform cursor themes.
//!
//! `mousegen` takes a directory of hand-authored SVG cursors plus a little
//! JSON configuration and produces Windows cursors (CUR and RIFF-based ANI),
//! X11 Xcursor files, or plain PNG bitmap trees, for several theme variants
//! at once: recolored palettes, thinner or thicker strokes, optional drop
//! shadows, and multiple size schemes.
//!
//! The interesting parts live in a few layers:
//!
//! * [`document`] is a small mutable XML DOM; sources are rewritten in
//!   place before rendering (color substitution, stroke adjustment,
//!   grid alignment).
//! * [`metadata`] reads the cursor extensions embedded in the sources:
//!   the `cursor-hotspot` circle and the `align-anchor` paths.
//! * [`align`] nudges the viewBox origin and anchored groups so hinted
//!   strokes land on whole pixels at every rendered size, and derives the
//!   per-size integer hotspot.
//! * [`cur`] and [`xcur`] are the binary encoders (and, for Xcursor, the
//!   decoder).
//! * [`pipeline`] drives theme x cursor x size scheme x resolution, keeps
//!   animations assembling across source files, and hands encode work to
//!   [`encoding`] workers when asked to.
//!
//! Rasterization itself is not here: a [`backend::RendererBackend`]
//! implementation turns prepared documents into premultiplied ARGB rasters.

#![warn(nonstandard_style, rust_2018_idioms, unused)]
#![warn(trivial_casts, trivial_numeric_casts)]
#![allow(clippy::too_many_arguments)]

pub use crate::backend::RendererBackend;
pub use crate::bitmap::{Bitmap, Frame};
pub use crate::config::{Animation, Project, SizeScheme, ThemeConfig};
pub use crate::document::Document;
pub use crate::error::{BitmapError, ConfigError, ContainerError, Error, SourceError};
pub use crate::pipeline::{OutputMode, RenderPipeline, RenderPlan, VariantConfig};
pub use crate::settings::{AsyncMode, Settings};

pub mod align;
pub mod backend;
pub mod bitmap;
pub mod bitmaps;
pub mod config;
pub mod cur;
pub mod document;
pub mod encoding;
pub mod error;
pub mod hotspots;
pub mod metadata;
mod parsers;
pub mod pipeline;
mod rect;
#[cfg(feature = "resvg")]
pub mod resvg_backend;
pub mod settings;
pub mod shadow;
pub mod variant;
mod viewbox;
pub mod xcur;

pub use crate::rect::{IRect, Rect};
pub use crate::viewbox::ViewBox;

#[doc(hidden)]
pub mod test_utils;
