//! Inspect an Xcursor file: table of contents, image inventory, comments.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use mousegen::xcur::{self, XcurWarning};

#[derive(Parser)]
#[command(name = "xcurinfo", version, about = "Print the contents of an Xcursor file")]
struct Cli {
    /// Xcursor file to inspect
    file: PathBuf,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    ExitCode::SUCCESS
                }
                _ => ExitCode::from(1),
            };
        }
    };

    let data = match fs::read(&cli.file) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("{}: {e}", cli.file.display());
            return ExitCode::from(3);
        }
    };

    let mut warnings = Vec::new();
    let file = match xcur::decode(&data, &mut |w| warnings.push(w)) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("{}: {e}", cli.file.display());
            return ExitCode::from(4);
        }
    };

    println!(
        "{}: {} images, {} bytes",
        cli.file.display(),
        file.images.len(),
        data.len()
    );

    for (nominal, frames) in file.frames() {
        if frames.len() == 1 {
            let image = frames[0];
            println!(
                "  size {nominal}: {}x{}, hotspot ({}, {})",
                image.width, image.height, image.xhot, image.yhot
            );
        } else {
            println!("  size {nominal}: {} frames", frames.len());
            for (i, image) in frames.iter().enumerate() {
                println!(
                    "    frame {}: {}x{}, hotspot ({}, {}), delay {} ms",
                    i + 1,
                    image.width,
                    image.height,
                    image.xhot,
                    image.yhot,
                    image.delay
                );
            }
        }
    }

    for comment in &file.comments {
        let kind = match comment.subtype {
            1 => "copyright",
            2 => "license",
            _ => "comment",
        };
        println!("  {kind}: {}", comment.text);
    }

    for warning in &warnings {
        match warning {
            XcurWarning::ZeroDelay { nominal } => {
                eprintln!("warning: size {nominal} animates with zero frame delay");
            }
            XcurWarning::UnknownChunk { chunk_type, offset } => {
                eprintln!("warning: unknown chunk type {chunk_type:#010x} at offset {offset}");
            }
        }
    }

    ExitCode::SUCCESS
}
