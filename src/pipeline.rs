//! The rendering pipeline.
//!
//! Drives theme variant x cursor x size scheme x resolution (x animation
//! frame), feeding prepared documents to the renderer backend and rendered
//! frames to the cursor encoders.  Animated cursors whose frames arrive as
//! separate source files accumulate in deferred builders that are only
//! sealed once the whole source directory has been walked.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::align;
use crate::backend::RendererBackend;
use crate::bitmap::{nominal_size, Frame};
use crate::bitmaps::BitmapWriter;
use crate::config::{Animation, AnimationSet, CursorNames, SizeScheme, ThemeConfig};
use crate::cur::{AniEncoder, CurEncoder};
use crate::document::Document;
use crate::encoding::{Lane, Scheduler};
use crate::error::{BitmapError, Error, SourceError};
use crate::hotspots::HotspotStore;
use crate::metadata::CursorMetadata;
use crate::rect::Rect;
use crate::settings::Settings;
use crate::shadow;
use crate::variant::{self, ColorIndex, DropShadow, StrokeOptions};
use crate::xcur::XcurEncoder;

/// Which artifact family a pipeline emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// CUR / ANI files.
    WindowsCursors,
    /// Xcursor files.
    LinuxCursors,
    /// Plain PNG trees (also the input for Mousecape assembly).
    Bitmaps,
}

/// A theme combined with one set of variant options.
#[derive(Clone)]
pub struct VariantConfig {
    pub theme: ThemeConfig,
    pub stroke: StrokeOptions,
    /// Directory tag for a non-default stroke, e.g. "Thin".
    pub stroke_label: Option<String>,
    pub shadow: Option<DropShadow>,
    /// Render the shadow as an SVG filter; otherwise it is applied to the
    /// raster after rendering.
    pub svg_shadow: bool,
}

impl VariantConfig {
    pub fn plain(theme: ThemeConfig) -> VariantConfig {
        VariantConfig {
            theme,
            stroke: StrokeOptions::default(),
            stroke_label: None,
            shadow: None,
            svg_shadow: false,
        }
    }

    /// The deduplication key: one directory per distinct variant.
    pub fn key(&self, scheme: &SizeScheme) -> (String, String, String, String) {
        (
            self.theme.name.clone(),
            scheme.name.clone(),
            self.stroke_label.clone().unwrap_or_default(),
            if self.shadow.is_some() {
                String::from("Shadow")
            } else {
                String::new()
            },
        )
    }

    pub fn output_dir(&self, base: &Path, scheme: &SizeScheme) -> PathBuf {
        let mut name = self.theme.out_subdir.clone();
        if scheme.permanent {
            name.push('-');
            name.push_str(scheme.display_name.as_deref().unwrap_or(&scheme.name));
        }
        if let Some(ref label) = self.stroke_label {
            name.push('-');
            name.push_str(label);
        }
        if self.shadow.is_some() {
            name.push_str("-Shadow");
        }
        base.join(name)
    }
}

/// Everything one pipeline run needs to know.
pub struct RenderPlan {
    pub variants: Vec<VariantConfig>,
    pub animations: AnimationSet,
    /// Source-to-target name pairs for this output flavor.
    pub names: Vec<(String, String)>,
    /// Render cursors without a target-name mapping under their own name.
    pub all_cursors: bool,
    /// Extra cursor filter from the command line; empty keeps everything.
    pub cursor_filter: Vec<String>,
    /// Size-scheme filter; empty keeps each theme's schemes.
    pub scheme_filter: Vec<String>,
    /// Resolution override; empty falls back to the theme's (or defaults).
    pub resolutions: Vec<u32>,
}

pub struct RenderPipeline {
    backend: Box<dyn RendererBackend>,
    mode: OutputMode,
    out_base: PathBuf,
    settings: Settings,
    update_existing: bool,
    scheduler: Scheduler,
    stores: HashMap<PathBuf, HotspotStore>,
    deferred: BTreeMap<(PathBuf, String), BuilderHandle>,
    current: Option<CurrentBuild>,
}

struct CurrentBuild {
    source: PathBuf,
    document: Document,
    metadata: CursorMetadata,
    view_box: Rect,
    scheme: SizeScheme,
    stroke: StrokeOptions,
    raster_shadow: Option<DropShadow>,
    animation: Option<CurrentAnimation>,
    out_dir: PathBuf,
    target: String,
    /// `None` when the frames go to a deferred (animation) builder.
    static_handle: Option<BuilderHandle>,
}

#[derive(Clone)]
struct CurrentAnimation {
    animation: Animation,
    /// Frame number when the source file is a single pre-sampled frame;
    /// `None` when the backend samples the animation clock itself.
    frame_no: Option<u32>,
}

enum CursorBuilder {
    Cur(CurEncoder),
    Ani(AniEncoder),
    Xcur { encoder: XcurEncoder, crop: bool },
    Bitmaps { writer: BitmapWriter, target: String, animated: bool },
}

impl CursorBuilder {
    fn add_frame(&mut self, frame: &Frame) -> Result<(), Error> {
        match self {
            CursorBuilder::Cur(encoder) => encoder.add_frame(frame),
            CursorBuilder::Ani(encoder) => encoder.add_frame(frame),
            CursorBuilder::Xcur { encoder, crop } => {
                encoder.add_frame(frame, *crop).map_err(Error::Bitmap)
            }
            CursorBuilder::Bitmaps {
                writer,
                target,
                animated,
            } => writer.write_frame(target, frame, *animated).map(|_| ()),
        }
    }

    fn finish(self, dest: &Path) -> Result<(), Error> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        match self {
            CursorBuilder::Cur(encoder) => {
                let mut file = fs::File::create(dest)?;
                encoder.write_to(&mut file)?;
            }
            CursorBuilder::Ani(encoder) => {
                let mut file = fs::File::create(dest)?;
                encoder.write_to(&mut file)?;
            }
            CursorBuilder::Xcur { encoder, .. } => {
                let mut file = fs::File::create(dest)?;
                encoder.write_to(&mut file)?;
            }
            // Frames were written as they arrived.
            CursorBuilder::Bitmaps { .. } => (),
        }
        Ok(())
    }
}

/// Producer-side handle on a builder whose jobs may run on a worker.
struct BuilderHandle {
    lane: Lane,
    slot: Arc<Mutex<Option<CursorBuilder>>>,
    dest: PathBuf,
    target: String,
    animated: bool,
    /// frame number -> requested resolutions, for the coverage invariant.
    frame_resolutions: BTreeMap<u32, BTreeSet<u32>>,
}

impl BuilderHandle {
    fn new(lane: Lane, builder: CursorBuilder, dest: PathBuf, target: &str, animated: bool) -> BuilderHandle {
        BuilderHandle {
            lane,
            slot: Arc::new(Mutex::new(Some(builder))),
            dest,
            target: target.to_string(),
            animated,
            frame_resolutions: BTreeMap::new(),
        }
    }

    fn add_frame(&mut self, frame: Frame, resolution: u32) -> Result<(), Error> {
        if self.animated {
            self.frame_resolutions
                .entry(frame.frame_no)
                .or_default()
                .insert(resolution);
        }

        let slot = self.slot.clone();
        self.lane.submit(Box::new(move || {
            let mut guard = slot.lock().unwrap();
            let builder = guard
                .as_mut()
                .ok_or(Error::InvalidState("frame added to a sealed builder"))?;
            builder.add_frame(&frame)
        }))
    }

    /// Seals the builder: the terminal encode job writes the artifact.
    fn finish(self) -> Result<PathBuf, Error> {
        // Every frame must cover the same resolutions.
        if let Some(reference) = self.frame_resolutions.values().next() {
            for (frame, resolutions) in &self.frame_resolutions {
                if resolutions != reference {
                    return Err(Error::Bitmap(BitmapError::SparseResolutions {
                        name: self.target.clone(),
                        frame: *frame,
                    }));
                }
            }
        }

        let slot = self.slot;
        let dest = self.dest.clone();
        self.lane.submit(Box::new(move || {
            let builder = slot
                .lock()
                .unwrap()
                .take()
                .ok_or(Error::InvalidState("builder sealed twice"))?;
            builder.finish(&dest)
        }))?;

        Ok(self.dest)
    }
}

impl RenderPipeline {
    pub fn new(
        backend: Box<dyn RendererBackend>,
        mode: OutputMode,
        out_base: &Path,
        settings: Settings,
    ) -> RenderPipeline {
        let scheduler = Scheduler::new(settings.async_mode, settings.queue_capacity);
        RenderPipeline {
            backend,
            mode,
            out_base: out_base.to_path_buf(),
            settings,
            update_existing: false,
            scheduler,
            stores: HashMap::new(),
            deferred: BTreeMap::new(),
            current: None,
        }
    }

    /// Restricts rendering to cursors whose artifact already exists.
    pub fn update_existing(&mut self, update: bool) {
        self.update_existing = update;
    }

    /// Renders everything the plan asks for.  Per-source errors are
    /// reported and skipped; infrastructure errors abort.
    pub fn run(&mut self, plan: &RenderPlan) -> Result<(), Error> {
        let mut names = CursorNames::new(plan.names.iter().cloned(), plan.all_cursors);

        let mut by_dir: BTreeMap<PathBuf, Vec<&VariantConfig>> = BTreeMap::new();
        for variant in &plan.variants {
            by_dir
                .entry(variant.theme.source_dir.clone())
                .or_default()
                .push(variant);
        }

        for (dir, variants) in by_dir {
            let files = walk_svg_files(&dir, &plan.animations)?;
            debug!("{}: {} cursor sources", dir.display(), files.len());

            for file in &files {
                if let Err(error) = self.render_file(file, &variants, plan, &mut names) {
                    if recoverable(&error) {
                        warn!("{error}; skipping");
                    } else {
                        return Err(error);
                    }
                }
            }
        }

        Ok(())
    }

    fn render_file(
        &mut self,
        file: &Path,
        variants: &[&VariantConfig],
        plan: &RenderPlan,
        names: &mut CursorNames,
    ) -> Result<(), Error> {
        let stem = match file.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => return Ok(()),
        };

        // A frame file renders one pre-sampled animation frame; a source
        // named exactly like an animation is sampled by the backend.
        let (cursor_name, animation) = match plan.animations.frame_file(&stem) {
            Some((animation, frame_no)) => (
                animation.name.clone(),
                Some(CurrentAnimation {
                    animation: animation.clone(),
                    frame_no: Some(frame_no),
                }),
            ),
            None => match plan.animations.get(&stem) {
                Some(animation) => (
                    stem.clone(),
                    Some(CurrentAnimation {
                        animation: animation.clone(),
                        frame_no: None,
                    }),
                ),
                None => (stem.clone(), None),
            },
        };

        let animation = animation.map(|mut a| {
            a.animation = a.animation.with_rate_gain(self.settings.anim_rate_gain);
            a
        });

        if !matches_filter(&plan.cursor_filter, &cursor_name) {
            return Ok(());
        }

        for variant in variants {
            if !matches_filter(&variant.theme.cursor_filter, &cursor_name) {
                continue;
            }

            let Some(target) = names.target_for(&cursor_name) else {
                warn!("no target name for cursor \"{cursor_name}\"; skipping");
                continue;
            };

            for scheme in schemes_for(variant, &plan.scheme_filter) {
                let resolutions = self.resolutions_for(variant, plan, animation.is_some());
                if resolutions.is_empty() {
                    continue;
                }

                if !self.should_render(variant, &scheme, &target, animation.is_some()) {
                    debug!("\"{target}\" has no existing artifact; skipping (update mode)");
                    continue;
                }

                let result = (|| {
                    self.set_file(file, variant, &scheme, &target, animation.clone())?;
                    for &resolution in &resolutions {
                        self.render_target_size(resolution)?;
                    }
                    self.save_current()
                })();
                if let Err(error) = result {
                    // Abandon the half-built cursor so the next source can
                    // start cleanly.
                    self.current = None;
                    return Err(error);
                }
            }
        }

        Ok(())
    }

    fn resolutions_for(
        &self,
        variant: &VariantConfig,
        plan: &RenderPlan,
        animated: bool,
    ) -> Vec<u32> {
        let mut resolutions: Vec<u32> = if !plan.resolutions.is_empty() {
            plan.resolutions.clone()
        } else if !variant.theme.resolutions.is_empty() {
            variant.theme.resolutions.clone()
        } else {
            crate::config::DEFAULT_RESOLUTIONS.to_vec()
        };

        if self.mode == OutputMode::WindowsCursors {
            resolutions.retain(|&r| {
                if r > crate::cur::MAX_DIMENSION {
                    warn!("resolution {r} exceeds the Windows cursor limit; skipping");
                    false
                } else {
                    true
                }
            });
        }

        // Animations only render a window of the requested resolutions.
        if animated && resolutions.len() > 1 {
            resolutions.retain(|&r| {
                r >= self.settings.min_anim_size && r <= self.settings.max_anim_size
            });
        }

        resolutions
    }

    /// Whether the update-existing policy lets this cursor render.
    fn should_render(
        &self,
        variant: &VariantConfig,
        scheme: &SizeScheme,
        target: &str,
        animated: bool,
    ) -> bool {
        if !self.update_existing {
            return true;
        }

        let out_dir = variant.output_dir(&self.out_base, scheme);

        // Static bitmaps have no single artifact; any frame of the cursor
        // counts.
        if self.mode == OutputMode::Bitmaps && !animated {
            let prefix = format!("{target}-");
            return match fs::read_dir(&out_dir) {
                Ok(entries) => entries
                    .flatten()
                    .any(|e| e.file_name().to_string_lossy().starts_with(&prefix)),
                Err(_) => false,
            };
        }

        artifact_path(self.mode, &out_dir, target, animated).exists()
    }

    /// Starts one cursor build: parses the source, applies the variant
    /// transformations, reads the metadata, claims the builder.
    fn set_file(
        &mut self,
        path: &Path,
        variant: &VariantConfig,
        scheme: &SizeScheme,
        target: &str,
        animation: Option<CurrentAnimation>,
    ) -> Result<(), Error> {
        if self.current.is_some() {
            return Err(Error::InvalidState("setFile during an unfinished build"));
        }

        let text = fs::read_to_string(path)
            .map_err(|e| Error::source_error(path, SourceError::Unreadable(e)))?;
        let document =
            Document::parse(&text).map_err(|e| Error::source_error(path, e))?;

        // Variant preparation: colors, stroke deltas, optional SVG shadow.
        if !variant.theme.palette.is_empty() {
            let index = ColorIndex::build(&document);
            index.apply(&document, &variant.theme.palette);
        }

        let (stroke_diff, fill_offset) = variant.stroke.deltas();
        if stroke_diff != 0.0 || fill_offset > 0.0 {
            variant::adjust_strokes(&document, stroke_diff, fill_offset);
        }

        let raster_shadow = match variant.shadow {
            Some(ref shadow) if variant.svg_shadow => {
                variant::apply_svg_shadow(&document, shadow);
                None
            }
            Some(ref shadow) => Some(shadow.clone()),
            None => None,
        };

        // Metadata comes from the prepared tree so that anchor paths
        // resolve in what the aligner will actually rewrite.
        let metadata =
            CursorMetadata::read(&document).map_err(|e| Error::source_error(path, e))?;
        let view_box = expand_view_box(*metadata.view_box, scheme.canvas_factor);

        let out_dir = variant.output_dir(&self.out_base, scheme);
        let animated = animation.is_some();

        let static_handle = if animated {
            let key = (out_dir.clone(), target.to_string());
            if !self.deferred.contains_key(&key) {
                let handle = self.new_builder(&out_dir, target, animation.as_ref())?;
                self.deferred.insert(key, handle);
            }
            None
        } else {
            Some(self.new_builder(&out_dir, target, None)?)
        };

        self.current = Some(CurrentBuild {
            source: path.to_path_buf(),
            document,
            metadata,
            view_box,
            scheme: scheme.clone(),
            stroke: variant.stroke.clone(),
            raster_shadow,
            animation,
            out_dir,
            target: target.to_string(),
            static_handle,
        });

        Ok(())
    }

    fn new_builder(
        &mut self,
        out_dir: &Path,
        target: &str,
        animation: Option<&CurrentAnimation>,
    ) -> Result<BuilderHandle, Error> {
        let animated = animation.is_some();
        let dest = artifact_path(self.mode, out_dir, target, animated);

        let builder = match (self.mode, animation) {
            (OutputMode::WindowsCursors, Some(current)) => CursorBuilder::Ani(AniEncoder::new(
                target,
                current.animation.jiffies(),
            )),
            (OutputMode::WindowsCursors, None) => CursorBuilder::Cur(CurEncoder::new()),
            (OutputMode::LinuxCursors, _) => CursorBuilder::Xcur {
                encoder: XcurEncoder::new(),
                crop: self.settings.crop_to_content,
            },
            (OutputMode::Bitmaps, _) => CursorBuilder::Bitmaps {
                writer: BitmapWriter::new(out_dir),
                target: target.to_string(),
                animated,
            },
        };

        Ok(BuilderHandle::new(
            self.scheduler.lane(),
            builder,
            dest,
            target,
            animated,
        ))
    }

    /// Renders the current cursor at one pixel size and feeds the frames to
    /// its builder.
    pub fn render_target_size(&mut self, target_size: u32) -> Result<(), Error> {
        let Self {
            ref mut backend,
            ref mut current,
            ref mut deferred,
            ref mut stores,
            ..
        } = *self;

        let current = current
            .as_mut()
            .ok_or(Error::InvalidState("renderTargetSize without setFile"))?;

        // Per-size document: pixel-stroke rules and grid alignment are a
        // function of the target size, applied to a fresh copy.
        let document = current.document.duplicate();
        variant::apply_pixel_strokes(
            &document,
            &current.stroke,
            current.view_box.width(),
            target_size,
        );

        let alignment = align::align(&current.metadata, current.view_box, target_size);
        align::apply(&document, &alignment);

        let store = match stores.entry(current.out_dir.clone()) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                fs::create_dir_all(&current.out_dir)?;
                e.insert(HotspotStore::load(&current.out_dir)?)
            }
        };
        store.set(&current.target, target_size, alignment.hotspot);

        let handle = match current.static_handle {
            Some(ref mut handle) => handle,
            None => deferred
                .get_mut(&(current.out_dir.clone(), current.target.clone()))
                .ok_or(Error::InvalidState("deferred builder disappeared"))?,
        };

        backend.set_document(&document)?;

        let nominal = nominal_size(target_size, target_size, current.scheme.nominal_factor);
        let raster_shadow = current.raster_shadow.clone();
        let shadow_scale = f64::from(target_size) / current.view_box.width();

        match current.animation {
            None => {
                let mut bitmap = backend.render_static(target_size)?;
                if let Some(ref drop) = raster_shadow {
                    bitmap = shadow::drop_shadow(&bitmap, drop, shadow_scale);
                }
                handle.add_frame(
                    Frame {
                        bitmap,
                        hotspot: alignment.hotspot,
                        nominal,
                        delay_millis: 0,
                        frame_no: 0,
                    },
                    target_size,
                )?;
            }

            Some(CurrentAnimation {
                ref animation,
                frame_no: Some(frame_no),
            }) => {
                let mut bitmap = backend.render_static(target_size)?;
                if let Some(ref drop) = raster_shadow {
                    bitmap = shadow::drop_shadow(&bitmap, drop, shadow_scale);
                }
                handle.add_frame(
                    Frame {
                        bitmap,
                        hotspot: alignment.hotspot,
                        nominal,
                        delay_millis: animation.delay_millis(),
                        frame_no,
                    },
                    target_size,
                )?;
            }

            Some(CurrentAnimation {
                ref animation,
                frame_no: None,
            }) => {
                let delay = animation.delay_millis();
                let hotspot = alignment.hotspot;
                backend.render_animation(target_size, animation, &mut |frame_no, mut bitmap| {
                    if let Some(ref drop) = raster_shadow {
                        bitmap = shadow::drop_shadow(&bitmap, drop, shadow_scale);
                    }
                    handle.add_frame(
                        Frame {
                            bitmap,
                            hotspot,
                            nominal,
                            delay_millis: delay,
                            frame_no,
                        },
                        target_size,
                    )
                })?;
            }
        }

        backend.reset_view();
        Ok(())
    }

    /// Completes the current cursor build.  Static builders are sealed;
    /// animation builders stay deferred until [`RenderPipeline::finalize`].
    pub fn save_current(&mut self) -> Result<(), Error> {
        let current = self
            .current
            .take()
            .ok_or(Error::InvalidState("saveCurrent without setFile"))?;

        if let Some(handle) = current.static_handle {
            let dest = handle.finish()?;
            info!(
                cursor = %current.target,
                size_scheme = %current.scheme.name,
                "{} -> {}",
                current.source.display(),
                dest.display()
            );
        }

        Ok(())
    }

    /// Seals all deferred animation builders, waits for the encode workers
    /// and writes the hotspot stores.
    pub fn finalize(mut self) -> Result<(), Error> {
        if self.current.is_some() {
            return Err(Error::InvalidState("finalize during an unfinished build"));
        }

        let deferred = std::mem::take(&mut self.deferred);
        for ((_, target), handle) in deferred {
            let dest = handle.finish()?;
            info!(cursor = %target, "{}", dest.display());
        }

        self.scheduler.finalize(self.settings.finalize_timeout)?;

        for store in self.stores.values_mut() {
            store.save()?;
        }

        Ok(())
    }
}

fn recoverable(error: &Error) -> bool {
    matches!(
        error,
        Error::Source { .. } | Error::Bitmap(_) | Error::MissingMapping(_)
    )
}

fn matches_filter(filter: &[String], name: &str) -> bool {
    filter.is_empty() || filter.iter().any(|f| f.eq_ignore_ascii_case(name))
}

fn schemes_for(variant: &VariantConfig, filter: &[String]) -> Vec<SizeScheme> {
    let configured: Vec<SizeScheme> = if variant.theme.sizes.is_empty() {
        vec![SizeScheme::named("normal").expect("builtin scheme")]
    } else {
        variant
            .theme
            .sizes
            .iter()
            .filter_map(|name| SizeScheme::named(name))
            .collect()
    };

    configured
        .into_iter()
        .filter(|scheme| matches_filter(filter, &scheme.name))
        .collect()
}

fn artifact_path(mode: OutputMode, out_dir: &Path, target: &str, animated: bool) -> PathBuf {
    match mode {
        OutputMode::WindowsCursors if animated => out_dir.join(format!("{target}.ani")),
        OutputMode::WindowsCursors => out_dir.join(format!("{target}.cur")),
        OutputMode::LinuxCursors => out_dir.join("cursors").join(target),
        OutputMode::Bitmaps => out_dir.join(target),
    }
}

/// Expands a viewBox around its center.
fn expand_view_box(view_box: Rect, factor: f64) -> Rect {
    if factor == 1.0 {
        return view_box;
    }

    let extra_w = view_box.width() * (factor - 1.0) / 2.0;
    let extra_h = view_box.height() * (factor - 1.0) / 2.0;
    Rect::new(
        view_box.x0 - extra_w,
        view_box.y0 - extra_h,
        view_box.x1 + extra_w,
        view_box.y1 + extra_h,
    )
}

/// Collects the `.svg` sources under `dir`: case-insensitive extension,
/// two levels deep, following symlinks, deduplicated by real path.  Files
/// sort by path except that animation frame files sort by frame number, so
/// builders always see frames in ascending order.
fn walk_svg_files(dir: &Path, animations: &AnimationSet) -> Result<Vec<PathBuf>, Error> {
    let mut files = Vec::new();
    let mut seen = HashSet::new();
    collect_svg_files(dir, 0, &mut files, &mut seen)?;

    files.sort_by_cached_key(|path| {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        match animations.frame_file(stem) {
            Some((animation, frame_no)) => (
                path.parent().map(Path::to_path_buf),
                animation.name.to_lowercase(),
                frame_no,
            ),
            None => (
                path.parent().map(Path::to_path_buf),
                stem.to_lowercase(),
                0,
            ),
        }
    });

    Ok(files)
}

fn collect_svg_files(
    dir: &Path,
    depth: usize,
    files: &mut Vec<PathBuf>,
    seen: &mut HashSet<PathBuf>,
) -> Result<(), Error> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        // Follows symlinks.
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("{}: {e}", path.display());
                continue;
            }
        };

        if metadata.is_dir() {
            if depth == 0 {
                collect_svg_files(&path, depth + 1, files, seen)?;
            }
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("svg"))
            .unwrap_or(false)
        {
            let real = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            if seen.insert(real) {
                files.push(path);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Animation;

    fn theme(out: &str) -> ThemeConfig {
        ThemeConfig {
            name: String::from("test"),
            source_dir: PathBuf::from("/nonexistent"),
            out_subdir: out.to_string(),
            cursor_filter: Vec::new(),
            sizes: Vec::new(),
            resolutions: Vec::new(),
            palette: Default::default(),
        }
    }

    #[test]
    fn variant_output_directories() {
        let base = Path::new("/out");
        let normal = SizeScheme::named("normal").unwrap();
        let large = SizeScheme::named("large").unwrap();

        let plain = VariantConfig::plain(theme("Sample"));
        assert_eq!(plain.output_dir(base, &normal), Path::new("/out/Sample"));
        // Permanent schemes tag the directory.
        assert_eq!(
            plain.output_dir(base, &large),
            Path::new("/out/Sample-Large")
        );

        let mut thin = VariantConfig::plain(theme("Sample"));
        thin.stroke_label = Some(String::from("Thin"));
        thin.shadow = Some(DropShadow::default());
        assert_eq!(
            thin.output_dir(base, &normal),
            Path::new("/out/Sample-Thin-Shadow")
        );

        assert_ne!(plain.key(&normal), plain.key(&large));
        assert_ne!(plain.key(&normal), thin.key(&normal));
    }

    #[test]
    fn artifact_paths_by_mode() {
        let out = Path::new("/out/theme");
        assert_eq!(
            artifact_path(OutputMode::WindowsCursors, out, "wait", true),
            Path::new("/out/theme/wait.ani")
        );
        assert_eq!(
            artifact_path(OutputMode::WindowsCursors, out, "arrow", false),
            Path::new("/out/theme/arrow.cur")
        );
        assert_eq!(
            artifact_path(OutputMode::LinuxCursors, out, "left_ptr", false),
            Path::new("/out/theme/cursors/left_ptr")
        );
        assert_eq!(
            artifact_path(OutputMode::Bitmaps, out, "left_ptr", false),
            Path::new("/out/theme/left_ptr")
        );
    }

    #[test]
    fn view_box_expansion_is_centered() {
        let expanded = expand_view_box(Rect::new(0.0, 0.0, 256.0, 256.0), 1.25);
        assert_eq!(expanded, Rect::new(-32.0, -32.0, 288.0, 288.0));

        let unchanged = expand_view_box(Rect::new(0.0, 0.0, 256.0, 256.0), 1.0);
        assert_eq!(unchanged, Rect::new(0.0, 0.0, 256.0, 256.0));
    }

    #[test]
    fn walks_two_levels_sorted_with_frame_ordering() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("extra");
        let subsub = sub.join("deeper");
        fs::create_dir_all(&subsub).unwrap();

        fs::write(dir.path().join("b.svg"), "<svg/>").unwrap();
        fs::write(dir.path().join("a.SVG"), "<svg/>").unwrap();
        fs::write(dir.path().join("readme.txt"), "no").unwrap();
        // Mixed-width frame numbers would sort wrong lexically.
        fs::write(dir.path().join("wait-02.svg"), "<svg/>").unwrap();
        fs::write(dir.path().join("wait-010.svg"), "<svg/>").unwrap();
        fs::write(sub.join("c.svg"), "<svg/>").unwrap();
        fs::write(subsub.join("d.svg"), "<svg/>").unwrap();

        let animations = AnimationSet::new(vec![Animation {
            name: String::from("wait"),
            duration_seconds: 1.0,
            frame_rate: 12.0,
        }]);

        let files = walk_svg_files(dir.path(), &animations).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        // Root before subdirectory, frames in numeric order, no txt, no
        // third level.
        assert_eq!(names, vec!["a.SVG", "b.svg", "wait-02.svg", "wait-010.svg", "c.svg"]);
    }

    #[test]
    fn scheme_selection_and_filters() {
        let mut config = theme("Sample");
        config.sizes = vec![String::from("normal"), String::from("large")];
        let variant = VariantConfig::plain(config);

        let all = schemes_for(&variant, &[]);
        assert_eq!(all.len(), 2);

        let filtered = schemes_for(&variant, &[String::from("LARGE")]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "large");

        assert!(matches_filter(&[], "anything"));
        assert!(matches_filter(&[String::from("Wait")], "wait"));
        assert!(!matches_filter(&[String::from("wait")], "arrow"));
    }
}
