// Command-line interface for mousegen.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

#[derive(Parser, Debug)]
#[command(
    name = "mousegen",
    version,
    about = "Render SVG cursor sources into platform cursor themes",
    group(ArgGroup::new("outputs").required(true).multiple(true)
        .args(["windows_cursors", "linux_cursors", "mousecape_theme"]))
)]
pub struct Cli {
    /// Project directory containing render.json and the SVG sources
    pub project: PathBuf,

    /// Build directory for the rendered themes [default: <project>/themes]
    pub build_dir: Option<PathBuf>,

    /// Render Windows CUR/ANI cursor themes
    #[arg(long)]
    pub windows_cursors: bool,

    /// Render X11 Xcursor themes
    #[arg(long)]
    pub linux_cursors: bool,

    /// Render the PNG bitmap tree a Mousecape theme is assembled from
    #[arg(long)]
    pub mousecape_theme: bool,

    /// Add a drop-shadow variant of every theme
    #[arg(long)]
    pub pointer_shadow: bool,

    /// Thin-stroke variant, optionally with an explicit width
    #[arg(long, value_name = "W", num_args = 0..=1, default_missing_value = "12", require_equals = true)]
    pub thin_stroke: Option<f64>,

    /// Custom stroke width with an optional directory label
    #[arg(long, value_name = "W[:LABEL]", value_parser = parse_stroke_width)]
    pub stroke_width: Option<StrokeWidthArg>,

    /// Render every stroke and shadow combination
    #[arg(long)]
    pub all_variants: bool,

    /// Size schemes to render (repeatable)
    #[arg(short = 's', long = "size-scheme", value_name = "SCHEME")]
    pub size_schemes: Vec<String>,

    /// Target pixel sizes, overriding the configuration (repeatable)
    #[arg(short = 'r', long = "target-size", value_name = "PIXELS")]
    pub target_sizes: Vec<u32>,

    /// Only render themes whose name contains the filter
    #[arg(short = 't', long = "theme", value_name = "FILTER")]
    pub theme_filter: Option<String>,

    /// Only render the named cursors (repeatable)
    #[arg(short = 'f', long = "cursor", value_name = "NAME")]
    pub cursor_filter: Vec<String>,

    /// Only re-render cursors whose artifact already exists
    #[arg(long)]
    pub update_existing: bool,

    /// Round rendered stroke widths to whole pixels
    #[arg(long)]
    pub whole_pixel_stroke: bool,

    /// Compensate stroke thinning by expanding fills, up to a limit
    #[arg(long, value_name = "LIMIT", num_args = 0..=1, default_missing_value = "2", require_equals = true)]
    pub expand_fill: Option<f64>,
}

/// A `--stroke-width` argument: the width, and an optional label naming the
/// variant's output directory.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeWidthArg {
    pub width: f64,
    pub label: Option<String>,
}

fn parse_stroke_width(value: &str) -> Result<StrokeWidthArg, String> {
    let (width, label) = match value.split_once(':') {
        Some((width, label)) if !label.is_empty() => (width, Some(label.to_string())),
        Some((width, _)) => (width, None),
        None => (value, None),
    };

    let width: f64 = width
        .parse()
        .map_err(|_| format!("invalid stroke width \"{value}\""))?;
    if !(width > 0.0 && width.is_finite()) {
        return Err(format!("stroke width must be positive, got \"{value}\""));
    }

    Ok(StrokeWidthArg { width, label })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stroke_width_with_label() {
        assert_eq!(
            parse_stroke_width("12"),
            Ok(StrokeWidthArg {
                width: 12.0,
                label: None
            })
        );
        assert_eq!(
            parse_stroke_width("10.5:Slim"),
            Ok(StrokeWidthArg {
                width: 10.5,
                label: Some(String::from("Slim"))
            })
        );
        assert_eq!(parse_stroke_width("8:").unwrap().label, None);
        assert!(parse_stroke_width("thin").is_err());
        assert!(parse_stroke_width("-4").is_err());
    }

    #[test]
    fn requires_an_output_flag() {
        assert!(Cli::try_parse_from(["mousegen", "proj"]).is_err());
        assert!(Cli::try_parse_from(["mousegen", "--linux-cursors", "proj"]).is_ok());
        assert!(Cli::try_parse_from([
            "mousegen",
            "--windows-cursors",
            "--linux-cursors",
            "proj"
        ])
        .is_ok());
    }

    #[test]
    fn optional_values_take_defaults() {
        let cli = Cli::try_parse_from([
            "mousegen",
            "--linux-cursors",
            "--thin-stroke",
            "--expand-fill",
            "proj",
        ])
        .unwrap();
        assert_eq!(cli.thin_stroke, Some(12.0));
        assert_eq!(cli.expand_fill, Some(2.0));

        let cli = Cli::try_parse_from([
            "mousegen",
            "--linux-cursors",
            "--thin-stroke=10",
            "--expand-fill=4.5",
            "proj",
        ])
        .unwrap();
        assert_eq!(cli.thin_stroke, Some(10.0));
        assert_eq!(cli.expand_fill, Some(4.5));
    }
}
