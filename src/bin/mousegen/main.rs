mod cli;

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use mousegen::pipeline::{OutputMode, RenderPipeline, RenderPlan, VariantConfig};
use mousegen::variant::{DropShadow, StrokeOptions};
use mousegen::{Error, Project, RendererBackend, Settings};

use cli::Cli;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            // The whole chain of causes, outermost first.
            let mut message = error.to_string();
            let mut source = std::error::Error::source(&error);
            while let Some(cause) = source {
                message.push_str(&format!(": {cause}"));
                source = cause.source();
            }
            error!("{message}");
            ExitCode::from(error.exit_code() as u8)
        }
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    let settings = Settings::from_env();
    let project = Project::load(&cli.project)?;

    let build_dir = cli
        .build_dir
        .clone()
        .unwrap_or_else(|| project.root.join("themes"));

    let variants = build_variants(&project, &cli);
    if variants.is_empty() {
        error!("no themes match the requested filters");
        return Ok(());
    }

    let modes: Vec<(OutputMode, &Vec<(String, String)>)> = [
        (cli.windows_cursors, OutputMode::WindowsCursors, &project.win_names),
        (cli.linux_cursors, OutputMode::LinuxCursors, &project.x11_names),
        (cli.mousecape_theme, OutputMode::Bitmaps, &project.mac_names),
    ]
    .into_iter()
    .filter(|(selected, _, _)| *selected)
    .map(|(_, mode, names)| (mode, names))
    .collect();

    for (mode, names) in modes {
        let plan = RenderPlan {
            variants: variants.clone(),
            animations: project.animations.clone(),
            names: names.clone(),
            // Without a name map there is nothing to be strict about.
            all_cursors: names.is_empty(),
            cursor_filter: cli.cursor_filter.clone(),
            scheme_filter: cli.size_schemes.clone(),
            resolutions: cli.target_sizes.clone(),
        };

        let mut pipeline =
            RenderPipeline::new(make_backend()?, mode, &build_dir, settings.clone());
        pipeline.update_existing(cli.update_existing);
        pipeline.run(&plan)?;
        pipeline.finalize()?;
    }

    Ok(())
}

/// Expands the configured themes into the requested stroke/shadow variants.
fn build_variants(project: &Project, cli: &Cli) -> Vec<VariantConfig> {
    let themes: Vec<_> = project
        .themes
        .iter()
        .filter(|theme| match cli.theme_filter {
            Some(ref filter) => theme
                .name
                .to_lowercase()
                .contains(&filter.to_lowercase()),
            None => true,
        })
        .cloned()
        .collect();

    // Stroke choices: the sources' own stroke, plus any requested variants.
    let mut strokes: Vec<(Option<f64>, Option<String>)> = Vec::new();
    if let Some(width) = cli.thin_stroke {
        strokes.push((Some(width), Some(String::from("Thin"))));
    }
    if let Some(ref custom) = cli.stroke_width {
        strokes.push((Some(custom.width), custom.label.clone()));
    }
    if cli.all_variants || strokes.is_empty() {
        strokes.insert(0, (None, None));
    }

    let shadows: Vec<Option<DropShadow>> = if cli.all_variants {
        vec![None, Some(DropShadow::default())]
    } else if cli.pointer_shadow {
        vec![Some(DropShadow::default())]
    } else {
        vec![None]
    };

    let mut variants = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for theme in &themes {
        for (width, label) in &strokes {
            for shadow in &shadows {
                let variant = VariantConfig {
                    theme: theme.clone(),
                    stroke: StrokeOptions {
                        width: *width,
                        expand_fill_limit: cli.expand_fill,
                        whole_pixel: cli.whole_pixel_stroke,
                        ..StrokeOptions::default()
                    },
                    stroke_label: label.clone(),
                    shadow: shadow.clone(),
                    svg_shadow: true,
                };

                // One output directory per distinct variant.
                let key = (
                    theme.name.clone(),
                    label.clone().unwrap_or_default(),
                    shadow.is_some(),
                );
                if seen.insert(key) {
                    variants.push(variant);
                }
            }
        }
    }

    variants
}

#[cfg(feature = "resvg")]
fn make_backend() -> Result<Box<dyn RendererBackend>, Error> {
    Ok(Box::new(mousegen::resvg_backend::ResvgBackend::new()))
}

#[cfg(not(feature = "resvg"))]
fn make_backend() -> Result<Box<dyn RendererBackend>, Error> {
    Err(Error::Backend(String::from(
        "this build carries no SVG renderer; rebuild with --features resvg",
    )))
}
