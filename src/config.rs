//! Project configuration.
//!
//! A cursor project is a directory with JSON configuration next to the SVG
//! sources: `render.json` declares the themes, `animations.json` the
//! animated cursors, and `win-names.json` / `x11-names.json` /
//! `mac-names.json` map source names onto platform cursor names.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::variant::Palette;

static COLOR_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").unwrap());

/// Animation frame sources are recognized by a 2-3 digit suffix.
static FRAME_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+)-([0-9]{2,3})$").unwrap());

/// Resolutions rendered when neither the theme nor the command line says
/// otherwise.
pub const DEFAULT_RESOLUTIONS: &[u32] = &[32, 48, 64, 96, 128];

/// One theme from `render.json`.
#[derive(Debug, Clone)]
pub struct ThemeConfig {
    pub name: String,
    pub source_dir: PathBuf,
    pub out_subdir: String,
    /// Cursor names to render; empty renders everything.
    pub cursor_filter: Vec<String>,
    /// Size schemes to render; empty means the default scheme.
    pub sizes: Vec<String>,
    /// Pixel resolutions; empty falls back to [`DEFAULT_RESOLUTIONS`].
    pub resolutions: Vec<u32>,
    pub palette: Palette,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeEntry {
    dir: String,
    out: Option<String>,
    #[serde(default)]
    cursors: Vec<String>,
    #[serde(default)]
    sizes: Vec<String>,
    #[serde(default)]
    resolutions: Vec<u32>,
    #[serde(default)]
    colors: Vec<ColorMapping>,
    default_subdir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColorMapping {
    #[serde(rename = "match")]
    pub match_color: String,
    pub replace: String,
}

/// A named rendering size: canvas expansion plus nominal-size scale.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeScheme {
    pub name: String,
    /// ViewBox expansion applied to the nominal 256-unit source canvas.
    pub canvas_factor: f64,
    /// Scale for the X11 nominal size reported in Xcursor files.
    pub nominal_factor: f64,
    pub display_name: Option<String>,
    /// Permanent schemes tag the output directory.
    pub permanent: bool,
}

impl SizeScheme {
    pub fn defaults() -> Vec<SizeScheme> {
        vec![
            SizeScheme {
                name: String::from("normal"),
                canvas_factor: 1.0,
                nominal_factor: 1.0,
                display_name: None,
                permanent: false,
            },
            SizeScheme {
                name: String::from("large"),
                canvas_factor: 1.25,
                nominal_factor: 1.25,
                display_name: Some(String::from("Large")),
                permanent: true,
            },
            SizeScheme {
                name: String::from("extra-large"),
                canvas_factor: 1.5,
                nominal_factor: 1.5,
                display_name: Some(String::from("Extra-Large")),
                permanent: true,
            },
        ]
    }

    pub fn named(name: &str) -> Option<SizeScheme> {
        SizeScheme::defaults()
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

/// One animated cursor from `animations.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub name: String,
    pub duration_seconds: f64,
    pub frame_rate: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnimationEntry {
    duration_seconds: f64,
    frame_rate: f64,
}

impl Animation {
    pub fn frame_count(&self) -> u32 {
        (self.duration_seconds * self.frame_rate).ceil() as u32
    }

    pub fn delay_millis(&self) -> u32 {
        (1000.0 / self.frame_rate).round() as u32
    }

    pub fn jiffies(&self) -> u32 {
        crate::cur::jiffies(Some(self.delay_millis()), self.frame_rate)
    }

    /// Animation clock time of a 1-based frame.
    pub fn sample_time(&self, frame_no: u32) -> f64 {
        f64::from(frame_no - 1) / self.frame_rate
    }

    pub fn with_rate_gain(&self, gain: f64) -> Animation {
        Animation {
            frame_rate: self.frame_rate * gain,
            ..self.clone()
        }
    }
}

/// The project's animations, looked up case-insensitively.
#[derive(Debug, Default, Clone)]
pub struct AnimationSet {
    animations: Vec<Animation>,
}

impl AnimationSet {
    pub fn new(animations: Vec<Animation>) -> AnimationSet {
        AnimationSet { animations }
    }

    pub fn get(&self, name: &str) -> Option<&Animation> {
        self.animations
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Matches a source file stem of the form `<animation>-<NN>`; returns
    /// the animation and the frame number.
    pub fn frame_file(&self, stem: &str) -> Option<(&Animation, u32)> {
        let captures = FRAME_SUFFIX.captures(stem)?;
        let animation = self.get(&captures[1])?;
        let frame_no: u32 = captures[2].parse().ok()?;
        Some((animation, frame_no))
    }
}

/// Case-insensitive source-to-target cursor name mapping.
///
/// Target names are kept unique by appending `_N`; in all-cursors mode an
/// unmapped source maps onto its own name.
pub struct CursorNames {
    targets: HashMap<String, String>,
    used: HashSet<String>,
    all_cursors: bool,
}

impl CursorNames {
    pub fn new<I>(pairs: I, all_cursors: bool) -> CursorNames
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut names = CursorNames {
            targets: HashMap::new(),
            used: HashSet::new(),
            all_cursors,
        };
        for (source, target) in pairs {
            let unique = names.unique(target);
            names.targets.insert(source.to_lowercase(), unique);
        }
        names
    }

    /// Whether unmapped sources are skipped rather than passed through.
    pub fn strict(&self) -> bool {
        !self.all_cursors
    }

    pub fn target_for(&mut self, source: &str) -> Option<String> {
        if let Some(target) = self.targets.get(&source.to_lowercase()) {
            return Some(target.clone());
        }
        if !self.all_cursors {
            return None;
        }

        let unique = self.unique(source.to_string());
        self.targets.insert(source.to_lowercase(), unique.clone());
        Some(unique)
    }

    fn unique(&mut self, base: String) -> String {
        let mut candidate = base.clone();
        let mut n = 1;
        while !self.used.insert(candidate.to_lowercase()) {
            n += 1;
            candidate = format!("{base}_{n}");
        }
        candidate
    }
}

/// Everything loaded from a project directory.
pub struct Project {
    pub root: PathBuf,
    pub themes: Vec<ThemeConfig>,
    pub animations: AnimationSet,
    pub win_names: Vec<(String, String)>,
    pub x11_names: Vec<(String, String)>,
    pub mac_names: Vec<(String, String)>,
}

impl Project {
    pub fn load(root: &Path) -> Result<Project, ConfigError> {
        let render: Map<String, Value> = read_json(&root.join("render.json"))?;

        let mut themes = Vec::new();
        for (name, value) in render {
            let entry: ThemeEntry =
                serde_json::from_value(value).map_err(|e| ConfigError::Json {
                    path: root.join("render.json"),
                    source: e,
                })?;
            themes.push(theme_config(root, name, entry)?);
        }
        if themes.is_empty() {
            return Err(ConfigError::Invalid {
                path: root.join("render.json"),
                message: String::from("no themes configured"),
            });
        }

        let animations: Map<String, Value> =
            read_json_optional(&root.join("animations.json"))?.unwrap_or_default();
        let mut animation_list = Vec::new();
        for (name, value) in animations {
            let entry: AnimationEntry =
                serde_json::from_value(value).map_err(|e| ConfigError::Json {
                    path: root.join("animations.json"),
                    source: e,
                })?;
            if entry.frame_rate <= 0.0 || entry.duration_seconds <= 0.0 {
                return Err(ConfigError::Invalid {
                    path: root.join("animations.json"),
                    message: format!("animation \"{name}\" has a non-positive duration or rate"),
                });
            }
            animation_list.push(Animation {
                name,
                duration_seconds: entry.duration_seconds,
                frame_rate: entry.frame_rate,
            });
        }

        Ok(Project {
            root: root.to_path_buf(),
            themes,
            animations: AnimationSet::new(animation_list),
            win_names: read_names(&root.join("win-names.json"))?,
            x11_names: read_names(&root.join("x11-names.json"))?,
            mac_names: read_names(&root.join("mac-names.json"))?,
        })
    }
}

fn theme_config(root: &Path, name: String, entry: ThemeEntry) -> Result<ThemeConfig, ConfigError> {
    for mapping in &entry.colors {
        for literal in [&mapping.match_color, &mapping.replace] {
            if !COLOR_LITERAL.is_match(literal) {
                return Err(ConfigError::Invalid {
                    path: root.join("render.json"),
                    message: format!("theme \"{name}\": bad color literal \"{literal}\""),
                });
            }
        }
    }

    for &resolution in &entry.resolutions {
        if resolution == 0 || resolution > 0x7FFF {
            return Err(ConfigError::Invalid {
                path: root.join("render.json"),
                message: format!("theme \"{name}\": resolution {resolution} out of range"),
            });
        }
    }

    for scheme in &entry.sizes {
        if SizeScheme::named(scheme).is_none() {
            return Err(ConfigError::Invalid {
                path: root.join("render.json"),
                message: format!("theme \"{name}\": unknown size scheme \"{scheme}\""),
            });
        }
    }

    let out_subdir = entry
        .out
        .or(entry.default_subdir)
        .unwrap_or_else(|| name.clone());

    Ok(ThemeConfig {
        source_dir: root.join(&entry.dir),
        out_subdir,
        cursor_filter: entry.cursors,
        sizes: entry.sizes,
        resolutions: entry.resolutions,
        palette: Palette::new(
            entry
                .colors
                .iter()
                .map(|c| (c.match_color.clone(), c.replace.clone())),
        ),
        name,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| ConfigError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

fn read_json_optional<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).map(Some).map_err(|e| ConfigError::Json {
            path: path.to_path_buf(),
            source: e,
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn read_names(path: &Path) -> Result<Vec<(String, String)>, ConfigError> {
    let map: Option<Map<String, Value>> = read_json_optional(path)?;
    let Some(map) = map else {
        return Ok(Vec::new());
    };

    let mut names = Vec::new();
    for (source, target) in map {
        match target {
            Value::String(target) => names.push((source, target)),
            Value::Null => (), // explicitly unmapped
            _ => {
                return Err(ConfigError::Invalid {
                    path: path.to_path_buf(),
                    message: format!("\"{source}\": target name must be a string"),
                })
            }
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_project() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("render.json"),
            r##"{
                "classic": {
                    "dir": "svg/classic",
                    "out": "Sample-Classic",
                    "colors": [{"match": "#00FF00", "replace": "#FF0000"}]
                },
                "mono": {
                    "dir": "svg/mono",
                    "defaultSubdir": "Sample-Mono",
                    "cursors": ["left_ptr"],
                    "sizes": ["normal", "large"],
                    "resolutions": [32, 48]
                }
            }"##,
        )
        .unwrap();
        fs::write(
            dir.path().join("animations.json"),
            r#"{"wait": {"durationSeconds": 6, "frameRate": 3}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("x11-names.json"),
            r#"{"pointer": "left_ptr", "unused": null}"#,
        )
        .unwrap();

        let project = Project::load(dir.path()).unwrap();
        assert_eq!(project.themes.len(), 2);

        let classic = &project.themes[0];
        assert_eq!(classic.name, "classic");
        assert_eq!(classic.out_subdir, "Sample-Classic");
        assert_eq!(classic.source_dir, dir.path().join("svg/classic"));
        assert!(classic.resolutions.is_empty());
        assert_eq!(classic.palette.replacement("#00ff00"), Some("#FF0000"));

        let mono = &project.themes[1];
        assert_eq!(mono.out_subdir, "Sample-Mono");
        assert_eq!(mono.cursor_filter, vec!["left_ptr"]);
        assert_eq!(mono.sizes, vec!["normal", "large"]);
        assert_eq!(mono.resolutions, vec![32, 48]);

        assert!(project.animations.get("WAIT").is_some());
        assert_eq!(project.x11_names, vec![(String::from("pointer"), String::from("left_ptr"))]);
        assert!(project.win_names.is_empty());
    }

    #[test]
    fn missing_render_json_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Project::load(dir.path()),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn rejects_bad_color_literals() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("render.json"),
            r##"{"t": {"dir": "svg", "colors": [{"match": "red", "replace": "#00FF00"}]}}"##,
        )
        .unwrap();
        assert!(matches!(
            Project::load(dir.path()),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn rejects_unknown_size_scheme() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("render.json"),
            r#"{"t": {"dir": "svg", "sizes": ["jumbo"]}}"#,
        )
        .unwrap();
        assert!(matches!(
            Project::load(dir.path()),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn animation_derivations() {
        let slow = Animation {
            name: String::from("wait"),
            duration_seconds: 6.0,
            frame_rate: 3.0,
        };
        assert_eq!(slow.frame_count(), 18);
        assert_eq!(slow.delay_millis(), 333);
        assert_eq!(slow.jiffies(), 20);
        assert_eq!(slow.sample_time(1), 0.0);
        assert_eq!(slow.sample_time(4), 1.0);

        let fast = Animation {
            name: String::from("spin"),
            duration_seconds: 0.75,
            frame_rate: 24.0,
        };
        assert_eq!(fast.frame_count(), 18);
        assert_eq!(fast.delay_millis(), 42);

        let gained = fast.with_rate_gain(2.0);
        assert_eq!(gained.frame_rate, 48.0);
        assert_eq!(gained.frame_count(), 36);
    }

    #[test]
    fn recognizes_frame_files() {
        let set = AnimationSet::new(vec![Animation {
            name: String::from("wait"),
            duration_seconds: 1.0,
            frame_rate: 12.0,
        }]);

        let (animation, frame) = set.frame_file("wait-01").unwrap();
        assert_eq!(animation.name, "wait");
        assert_eq!(frame, 1);

        assert_eq!(set.frame_file("Wait-012").unwrap().1, 12);
        assert!(set.frame_file("wait-1").is_none()); // one digit
        assert!(set.frame_file("wait-0001").is_none()); // four digits
        assert!(set.frame_file("spinner-01").is_none()); // unknown animation
        assert!(set.frame_file("wait").is_none());
    }

    #[test]
    fn target_names_stay_unique() {
        let mut names = CursorNames::new(
            vec![
                (String::from("pointer"), String::from("arrow")),
                (String::from("hand"), String::from("Arrow")),
                (String::from("busy"), String::from("wait")),
            ],
            false,
        );

        assert_eq!(names.target_for("POINTER").as_deref(), Some("arrow"));
        assert_eq!(names.target_for("hand").as_deref(), Some("Arrow_2"));
        assert_eq!(names.target_for("busy").as_deref(), Some("wait"));
        assert_eq!(names.target_for("unknown"), None);
        assert!(names.strict());
    }

    #[test]
    fn all_cursors_mode_passes_unmapped_names_through() {
        let mut names = CursorNames::new(
            vec![(String::from("pointer"), String::from("left_ptr"))],
            true,
        );

        assert_eq!(names.target_for("pointer").as_deref(), Some("left_ptr"));
        assert_eq!(names.target_for("extra").as_deref(), Some("extra"));
        // Stable across repeated lookups.
        assert_eq!(names.target_for("extra").as_deref(), Some("extra"));
        // A source whose own name collides with a mapped target is suffixed.
        assert_eq!(names.target_for("left_ptr").as_deref(), Some("left_ptr_2"));
    }

    #[test]
    fn builtin_size_schemes() {
        let normal = SizeScheme::named("normal").unwrap();
        assert_eq!(normal.canvas_factor, 1.0);
        assert!(!normal.permanent);

        let large = SizeScheme::named("Large").unwrap();
        assert!(large.permanent);
        assert_eq!(large.display_name.as_deref(), Some("Large"));

        assert!(SizeScheme::named("jumbo").is_none());
    }
}
