//! Pixel-grid alignment.
//!
//! Hinted elements in a cursor source carry anchors; before rendering at a
//! given pixel size the viewBox origin and the anchored groups are nudged so
//! those anchors land on whole pixel centers.  The nudges are fractions of a
//! source unit, so they are invisible at the drawing's scale but keep 1px
//! strokes crisp at small raster sizes.

use std::collections::HashMap;

use crate::document::{Document, ElementPath, NodeExt};
use crate::metadata::CursorMetadata;
use crate::parsers::format_coord;
use crate::rect::Rect;

/// Source hotspot components above this value, or below zero, are truncated
/// toward zero instead of rounded, preserving placement at the very edge of
/// the bitmap.
const HOTSPOT_EDGE: f64 = 120.0;

/// The computed alignment for one (source, target-size) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    /// Adjusted viewBox, origin possibly fractional.
    pub view_box: Rect,

    /// Per-group translation landing each child anchor on the grid.
    pub child_offsets: HashMap<ElementPath, (f64, f64)>,

    /// Hotspot in target pixels.
    pub hotspot: (u32, u32),
}

/// Computes the alignment of `metadata` onto a `target_size` pixel grid.
///
/// `view_box` is the (possibly size-scheme-expanded) square source viewBox.
pub fn align(metadata: &CursorMetadata, view_box: Rect, target_size: u32) -> Alignment {
    let scale = f64::from(target_size) / view_box.width();

    let (anchor_x, anchor_y) = metadata.root_anchor;
    let origin = (
        view_box.x0 + residue(anchor_x, view_box.x0, scale) / scale,
        view_box.y0 + residue(anchor_y, view_box.y0, scale) / scale,
    );

    let aligned_box = Rect::new(
        origin.0,
        origin.1,
        origin.0 + view_box.width(),
        origin.1 + view_box.height(),
    );

    let mut child_offsets = HashMap::new();
    for (path, &(x, y)) in &metadata.child_anchors {
        let dx = -residue(x, origin.0, scale) / scale;
        let dy = -residue(y, origin.1, scale) / scale;
        child_offsets.insert(path.clone(), (dx, dy));
    }

    let hotspot = aligned_hotspot(metadata.hotspot, origin, scale, target_size);

    Alignment {
        view_box: aligned_box,
        child_offsets,
        hotspot,
    }
}

/// Sub-pixel residue of point `p` on the grid implied by `origin` and
/// `scale`, in pixels.
fn residue(p: f64, origin: f64, scale: f64) -> f64 {
    let scaled = (p - origin) * scale;
    scaled - scaled.round()
}

/// Maps a source hotspot through the viewBox-to-target affine.
///
/// Components are rounded to the nearest pixel, except that source
/// components beyond the edge threshold truncate toward zero, and the result
/// is clamped into the bitmap.
fn aligned_hotspot(
    hotspot: (f64, f64),
    origin: (f64, f64),
    scale: f64,
    target_size: u32,
) -> (u32, u32) {
    let component = |source: f64, origin: f64| -> u32 {
        let mapped = (source - origin) * scale;
        let snapped = if source > HOTSPOT_EDGE || source < 0.0 {
            mapped.trunc()
        } else {
            mapped.round()
        };
        let max = f64::from(target_size - 1);
        snapped.clamp(0.0, max) as u32
    };

    (
        component(hotspot.0, origin.0),
        component(hotspot.1, origin.1),
    )
}

/// Applies an alignment to a prepared document: rewrites the root `viewBox`
/// and sets a `translate` on every child-anchor group.
///
/// All written values are absolute, so re-applying an alignment (or applying
/// one for a different size to a fresh copy) never accumulates drift.
pub fn apply(document: &Document, alignment: &Alignment) {
    let root = document.root();

    let vb = alignment.view_box;
    root.set_attribute(
        "viewBox",
        &format!(
            "{} {} {} {}",
            format_coord(vb.x0),
            format_coord(vb.y0),
            format_coord(vb.width()),
            format_coord(vb.height())
        ),
    );

    for (path, &(dx, dy)) in &alignment.child_offsets {
        if let Some(group) = path.resolve(&root) {
            group.set_attribute(
                "transform",
                &format!("translate({} {})", format_coord(dx), format_coord(dy)),
            );
        }
    }
}
