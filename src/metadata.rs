//! Cursor metadata embedded in SVG sources.
//!
//! Sources reserve a few ids and classes: `circle#cursor-hotspot` marks the
//! pointer position, `path#align-anchor` marks the point that must land on a
//! whole pixel, and `path.align-anchor` inside a group marks the same for
//! that group.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::document::{Document, ElementPath, Node, NodeExt};
use crate::error::SourceError;
use crate::parsers::Parse;
use crate::viewbox::ViewBox;

/// Hotspot assumed when a source does not declare one, in source units of
/// the nominal 256-unit canvas.
pub const DEFAULT_HOTSPOT: (f64, f64) = (128.0, 128.0);

/// Initial move command of a path: optional whitespace, `m`/`M`, whitespace,
/// then two signed decimals separated by whitespace and/or a single comma.
static MOVE_COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*[mM]\s+([+-]?[0-9]*\.?[0-9]+)(?:\s*,\s*|\s+)([+-]?[0-9]*\.?[0-9]+)",
    )
    .unwrap()
});

/// Everything the aligner needs to know about one source SVG.
#[derive(Debug, Clone)]
pub struct CursorMetadata {
    /// The source canvas in user units.
    pub view_box: ViewBox,

    /// Hotspot in source coordinates.
    pub hotspot: (f64, f64),

    /// Root alignment anchor in source coordinates.
    pub root_anchor: (f64, f64),

    /// Per-group alignment anchors, keyed by the path of the anchor's parent
    /// element.
    pub child_anchors: HashMap<ElementPath, (f64, f64)>,
}

impl CursorMetadata {
    pub fn read(document: &Document) -> Result<CursorMetadata, SourceError> {
        let root = document.root();
        if !root.is_named("svg") {
            return Err(SourceError::NotSvg);
        }

        let view_box = match root.attribute("viewBox") {
            Some(ref value) => ViewBox::parse_str(value)
                .map_err(|_| SourceError::MalformedViewBox(value.clone()))?,
            None => return Err(SourceError::MalformedViewBox(String::new())),
        };

        let hotspot = match document.element_by_id("cursor-hotspot") {
            Some(ref circle) if circle.is_named("circle") => hotspot_of(circle),
            _ => {
                warn!("no cursor-hotspot element; assuming {:?}", DEFAULT_HOTSPOT);
                DEFAULT_HOTSPOT
            }
        };

        let root_anchor = match document.element_by_id("align-anchor") {
            Some(ref path) => anchor_point(path)?,
            None => (0.0, 0.0),
        };

        let mut child_anchors = HashMap::new();
        for node in document.elements() {
            if !node.is_named("path") || !node.has_class("align-anchor") {
                continue;
            }

            let Some(parent) = node.parent() else {
                continue;
            };

            // A path at root level is the root anchor, handled above.
            if parent.parent().is_none() {
                continue;
            }

            child_anchors.insert(ElementPath::of(&parent), anchor_point(&node)?);
        }

        Ok(CursorMetadata {
            view_box,
            hotspot,
            root_anchor,
            child_anchors,
        })
    }
}

fn hotspot_of(circle: &Node) -> (f64, f64) {
    let coord = |name: &str| -> Option<f64> {
        let value = circle.attribute(name)?;
        let result = match f64::parse_str(&value) {
            Ok(n) => Some(n),
            Err(_) => None,
        };
        result
    };

    let x = coord("cx");
    let y = coord("cy");
    if x.is_none() || y.is_none() {
        warn!(
            "cursor-hotspot is missing cx/cy; assuming {:?}",
            DEFAULT_HOTSPOT
        );
    }

    (
        x.unwrap_or(DEFAULT_HOTSPOT.0),
        y.unwrap_or(DEFAULT_HOTSPOT.1),
    )
}

fn anchor_point(path: &Node) -> Result<(f64, f64), SourceError> {
    let d = path.attribute("d").unwrap_or_default();

    let captures = MOVE_COMMAND
        .captures(&d)
        .ok_or_else(|| SourceError::MalformedAnchor(d.clone()))?;

    // The regex only matches plain decimals, which always parse.
    let x = captures[1].parse::<f64>().unwrap();
    let y = captures[2].parse::<f64>().unwrap();
    Ok((x, y))
}
