//! Per-variant transformations of a source document.
//!
//! A theme variant is a recolored, restroked, optionally shadowed rendition
//! of the same sources.  All transformations here rewrite the document tree
//! in place; the pipeline works on a deep copy per variant.

use std::collections::HashMap;

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::{new_element, Document, ElementPath, NodeExt};
use crate::parsers::format_coord;

/// A hex color literal as it may appear in an attribute value.
static COLOR_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").unwrap());

/// Color palette: replacement colors keyed by the literal they replace.
///
/// Keys are matched case-insensitively; replacement literals are emitted as
/// configured.
#[derive(Debug, Clone, Default)]
pub struct Palette {
    map: HashMap<String, String>,
}

impl Palette {
    pub fn new<I, S, T>(pairs: I) -> Palette
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: Into<String>,
    {
        Palette {
            map: pairs
                .into_iter()
                .map(|(from, to)| (from.as_ref().to_ascii_lowercase(), to.into()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn replacement(&self, literal: &str) -> Option<&str> {
        self.map.get(&literal.to_ascii_lowercase()).map(|s| &**s)
    }
}

/// Index of every color literal in a document and where it occurs.
pub struct ColorIndex {
    // literal (lowercased) -> attribute positions holding it
    entries: HashMap<String, Vec<(ElementPath, String)>>,
}

impl ColorIndex {
    pub fn build(document: &Document) -> ColorIndex {
        let mut entries: HashMap<String, Vec<(ElementPath, String)>> = HashMap::new();

        for node in document.elements() {
            let path = ElementPath::of(&node);
            if let crate::document::NodeData::Element(ref element) = *node.borrow() {
                element.each_attribute(|qual, value| {
                    if COLOR_LITERAL.is_match(value) {
                        entries
                            .entry(value.to_ascii_lowercase())
                            .or_default()
                            .push((path.clone(), qual.local.to_string()));
                    }
                });
            }
        }

        ColorIndex { entries }
    }

    /// Distinct color literals present in the document, sorted.
    pub fn colors(&self) -> Vec<&str> {
        self.entries.keys().map(|k| &**k).sorted().collect()
    }

    /// Replaces every indexed literal that the palette maps; literals absent
    /// from the palette stay as they are.
    pub fn apply(&self, document: &Document, palette: &Palette) {
        if palette.is_empty() {
            return;
        }

        let root = document.root();
        for (literal, positions) in &self.entries {
            let Some(replacement) = palette.replacement(literal) else {
                continue;
            };

            for (path, attribute) in positions {
                if let Some(node) = path.resolve(&root) {
                    node.set_attribute(attribute, replacement);
                }
            }
        }
    }
}

/// Stroke-width adjustment options for one variant.
#[derive(Debug, Clone)]
pub struct StrokeOptions {
    /// Configured stroke width in source units; `None` keeps the sources'.
    pub width: Option<f64>,

    /// The stroke width the sources were designed with.
    pub base_width: f64,

    /// Upper bound on how much of a thinning is turned into fill expansion
    /// instead; `None` disables the compensation.
    pub expand_fill_limit: Option<f64>,

    /// Minimum rendered stroke in pixels, as a ratio of the source canvas;
    /// 0 disables.
    pub min_width_ratio: f64,

    /// Round the rendered stroke to whole pixels.
    pub whole_pixel: bool,
}

impl Default for StrokeOptions {
    fn default() -> Self {
        StrokeOptions {
            width: None,
            base_width: 16.0,
            expand_fill_limit: None,
            min_width_ratio: 0.0,
            whole_pixel: false,
        }
    }
}

impl StrokeOptions {
    /// The (strokeDiff, fillOffset) pair for this configuration.
    ///
    /// Thinning below the base width is shifted into fill expansion up to
    /// the configured limit; only the remainder thins the stroke.
    pub fn deltas(&self) -> (f64, f64) {
        let Some(width) = self.width else {
            return (0.0, 0.0);
        };

        let thinning = self.base_width - width;
        match self.expand_fill_limit {
            Some(limit) if limit > 0.0 && thinning > 0.0 => {
                let fill_offset = thinning.min(limit);
                let stroke_diff = if thinning > limit {
                    limit - thinning
                } else {
                    0.0
                };
                (stroke_diff, fill_offset)
            }
            _ => (width - self.base_width, 0.0),
        }
    }
}

/// Offsets the `stroke-width` of every stroked element by `stroke_diff` and,
/// when `fill_offset` is positive, outlines fill-only shapes with a stroke
/// of twice the offset painted under the fill, which grows the silhouette by
/// the offset on every side.
pub fn adjust_strokes(document: &Document, stroke_diff: f64, fill_offset: f64) {
    for node in document.elements() {
        if let Some(value) = node.attribute("stroke-width") {
            if let Ok(width) = value.trim().parse::<f64>() {
                let adjusted = (width + stroke_diff).max(0.0);
                node.set_attribute("stroke-width", &format_coord(adjusted));
            }
        } else if fill_offset > 0.0 {
            if node.id().as_deref() == Some("cursor-hotspot") || node.has_class("align-anchor") {
                continue;
            }

            let Some(fill) = node.attribute("fill") else {
                continue;
            };
            if !COLOR_LITERAL.is_match(&fill) || node.attribute("stroke").is_some() {
                continue;
            }

            node.set_attribute("stroke", &fill);
            node.set_attribute("stroke-width", &format_coord(fill_offset * 2.0));
            node.set_attribute("paint-order", "stroke");
        }
    }
}

/// Converts a stroke width in source units to the width actually used at
/// `target_size`, applying the minimum-stroke and whole-pixel rules.
pub fn stroke_for_size(
    units: f64,
    options: &StrokeOptions,
    canvas_size: f64,
    target_size: u32,
) -> f64 {
    let mut units = units;

    if options.min_width_ratio > 0.0 {
        let min_units = canvas_size * options.min_width_ratio / f64::from(target_size);
        if units < min_units {
            units = min_units;
        }
    }

    if options.whole_pixel {
        let scale = f64::from(target_size) / canvas_size;
        let pixels = units * scale;
        // Round with a 0.25 bias: 0.75 rounds up to 1.
        let rounded = (pixels + 0.25).floor();
        units = rounded / scale;
    }

    units
}

/// Rewrites every `stroke-width` in the document for the given target size.
pub fn apply_pixel_strokes(
    document: &Document,
    options: &StrokeOptions,
    canvas_size: f64,
    target_size: u32,
) {
    if options.min_width_ratio <= 0.0 && !options.whole_pixel {
        return;
    }

    for node in document.elements() {
        let Some(value) = node.attribute("stroke-width") else {
            continue;
        };
        let Ok(units) = value.trim().parse::<f64>() else {
            continue;
        };

        let sized = stroke_for_size(units, options, canvas_size, target_size);
        node.set_attribute("stroke-width", &format_coord(sized));
    }
}

/// Drop-shadow parameters.  `dy` is in SVG coordinates (positive is down);
/// the raster filter receives the negated value.
#[derive(Debug, Clone, PartialEq)]
pub struct DropShadow {
    pub blur: f64,
    pub dx: f64,
    pub dy: f64,
    pub opacity: f64,
    pub color: String,
}

impl Default for DropShadow {
    fn default() -> Self {
        DropShadow {
            blur: 6.0,
            dx: 12.0,
            dy: 12.0,
            opacity: 0.5,
            color: String::from("#000000"),
        }
    }
}

/// Wraps the document's pointer layer in an `feDropShadow` filter.
///
/// Existing `<defs>` stay where they are; everything else moves under a new
/// group carrying the filter reference.
pub fn apply_svg_shadow(document: &Document, shadow: &DropShadow) {
    let mut root = document.root();

    let filter = new_element("filter");
    filter.set_attribute("id", "drop-shadow");
    filter.set_attribute("x", "-50%");
    filter.set_attribute("y", "-50%");
    filter.set_attribute("width", "200%");
    filter.set_attribute("height", "200%");

    let fe = new_element("feDropShadow");
    fe.set_attribute("stdDeviation", &format_coord(shadow.blur));
    fe.set_attribute("dx", &format_coord(shadow.dx));
    fe.set_attribute("dy", &format_coord(shadow.dy));
    fe.set_attribute("flood-color", &shadow.color);
    fe.set_attribute("flood-opacity", &format_coord(shadow.opacity));
    {
        let mut filter = filter.clone();
        filter.append(fe);
    }

    let defs = root.children().find(|c| c.is_named("defs"));
    let defs = match defs {
        Some(defs) => defs,
        None => {
            let defs = new_element("defs");
            root.prepend(defs.clone());
            defs
        }
    };
    {
        let mut defs = defs.clone();
        defs.append(filter);
    }

    let mut group = new_element("g");
    group.set_attribute("filter", "url(#drop-shadow)");

    let to_wrap: Vec<_> = root
        .children()
        .filter(|c| !c.is_named("defs"))
        .collect();
    for mut child in to_wrap {
        child.detach();
        group.append(child);
    }
    root.append(group);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn substitutes_colors_case_insensitively() {
        let doc = Document::parse(
            r##"<svg><path fill="#ff0000"/><path fill="#FF0000" stroke="#00ff00"/></svg>"##,
        )
        .unwrap();

        let index = ColorIndex::build(&doc);
        assert_eq!(index.colors(), vec!["#00ff00", "#ff0000"]);

        let palette = Palette::new([("#FF0000", "#00FF00")]);
        index.apply(&doc, &palette);

        assert_eq!(
            doc.to_string(),
            r##"<svg><path fill="#00FF00"/><path fill="#00FF00" stroke="#00ff00"/></svg>"##
        );

        // Applying again, or applying an empty palette, changes nothing.
        index.apply(&doc, &palette);
        index.apply(&doc, &Palette::default());
        assert_eq!(
            doc.to_string(),
            r##"<svg><path fill="#00FF00"/><path fill="#00FF00" stroke="#00ff00"/></svg>"##
        );
    }

    #[test]
    fn leaves_unmapped_literals_alone() {
        let doc = Document::parse(r##"<svg><path fill="#123456"/></svg>"##).unwrap();
        let index = ColorIndex::build(&doc);
        index.apply(&doc, &Palette::new([("#ff0000", "#00ff00")]));
        assert_eq!(doc.to_string(), r##"<svg><path fill="#123456"/></svg>"##);
    }

    #[test]
    fn stroke_deltas() {
        let mut options = StrokeOptions {
            width: Some(12.0),
            ..StrokeOptions::default()
        };

        // Plain thinning without compensation.
        assert_eq!(options.deltas(), (-4.0, 0.0));

        // Thinning within the limit becomes fill expansion only.
        options.expand_fill_limit = Some(6.0);
        assert_eq!(options.deltas(), (0.0, 4.0));

        // Thinning beyond the limit: the remainder still thins the stroke.
        options.width = Some(8.0);
        options.expand_fill_limit = Some(2.0);
        assert_eq!(options.deltas(), (-6.0, 2.0));

        // Thickening is never compensated.
        options.width = Some(20.0);
        assert_eq!(options.deltas(), (4.0, 0.0));

        options.width = None;
        assert_eq!(options.deltas(), (0.0, 0.0));
    }

    #[test]
    fn adjusts_stroke_widths() {
        let doc =
            Document::parse(r##"<svg><path stroke-width="16" d="m 0,0"/></svg>"##).unwrap();
        adjust_strokes(&doc, -4.0, 0.0);
        assert_eq!(
            doc.to_string(),
            r##"<svg><path stroke-width="12" d="m 0,0"/></svg>"##
        );
    }

    #[test]
    fn expands_fills_with_underpainted_stroke() {
        let doc = Document::parse(
            r##"<svg><path fill="#ffffff"/><circle id="cursor-hotspot" fill="#112233"/></svg>"##,
        )
        .unwrap();
        adjust_strokes(&doc, 0.0, 2.0);

        let expanded = doc.root().children().next().unwrap();
        assert_eq!(expanded.attribute("stroke").as_deref(), Some("#ffffff"));
        assert_eq!(expanded.attribute("stroke-width").as_deref(), Some("4"));
        assert_eq!(expanded.attribute("paint-order").as_deref(), Some("stroke"));

        // The hotspot marker is never expanded.
        let hotspot = doc.element_by_id("cursor-hotspot").unwrap();
        assert_eq!(hotspot.attribute("stroke"), None);
    }

    #[test]
    fn minimum_stroke_bumps_thin_strokes() {
        let options = StrokeOptions {
            min_width_ratio: 0.5,
            ..StrokeOptions::default()
        };

        // Threshold = 256 * 0.5 / 32 = 4 source units.
        assert_eq!(stroke_for_size(2.0, &options, 256.0, 32), 4.0);
        assert_eq!(stroke_for_size(6.0, &options, 256.0, 32), 6.0);
    }

    #[test]
    fn whole_pixel_stroke_rounds_with_bias() {
        let options = StrokeOptions {
            whole_pixel: true,
            ..StrokeOptions::default()
        };

        // 6 units at 32/256 is 0.75px, which rounds *up* to 1px = 8 units.
        assert_eq!(stroke_for_size(6.0, &options, 256.0, 32), 8.0);
        // 5.9 units is 0.7375px, which rounds down to 0.
        assert_eq!(stroke_for_size(5.9, &options, 256.0, 32), 0.0);
        // 12 units at 32/256 is 1.5px -> 1px.
        assert_eq!(stroke_for_size(12.0, &options, 256.0, 32), 8.0);
        // 14.4 units is 1.8px -> 2px.
        assert_eq!(stroke_for_size(14.4, &options, 256.0, 32), 16.0);
    }

    #[test]
    fn wraps_pointer_layer_in_shadow_filter() {
        let doc = Document::parse(r#"<svg viewBox="0 0 256 256"><defs/><path d="m 0,0"/></svg>"#)
            .unwrap();
        apply_svg_shadow(&doc, &DropShadow::default());

        assert_eq!(
            doc.to_string(),
            concat!(
                r#"<svg viewBox="0 0 256 256">"#,
                r#"<defs><filter id="drop-shadow" x="-50%" y="-50%" width="200%" height="200%">"#,
                r##"<feDropShadow stdDeviation="6" dx="12" dy="12" flood-color="#000000" flood-opacity="0.5"/>"##,
                r#"</filter></defs>"#,
                r#"<g filter="url(#drop-shadow)"><path d="m 0,0"/></g>"#,
                "</svg>"
            )
        );
    }

    #[test]
    fn shadow_creates_defs_when_missing() {
        let doc = Document::parse(r#"<svg><path d="m 0,0"/></svg>"#).unwrap();
        apply_svg_shadow(&doc, &DropShadow::default());

        let root = doc.root();
        assert!(root.children().next().unwrap().is_named("defs"));
        assert!(root.children().last().unwrap().is_named("g"));
    }
}
