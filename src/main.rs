mod display;
mod error;
mod geometry;
mod input;
mod pipeline;
mod refine;
mod segmentation;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use display::{Surface, WindowSurface};
use image::Rgb;
use input::ImageSource;
use pipeline::{SegmentOptions, SegmentOutput};
use refine::BrushSettings;
use segmentation::GrabCut;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image to segment
    image: PathBuf,

    /// Box around the object as `left,top,right,bottom` in image pixels
    /// (whole image if empty)
    #[arg(long = "box", default_value = "", allow_hyphen_values = true)]
    region: String,

    /// Open the interactive refinement windows after the first pass
    #[arg(long)]
    refine: bool,

    /// Initial brush radius in pixels
    #[arg(long, default_value_t = 15)]
    brush_size: u32,

    /// Colour of foreground strokes as `r,g,b`
    #[arg(long, default_value = "0,255,0", value_parser = parse_color)]
    fg_color: Rgb<u8>,

    /// Colour of background strokes as `r,g,b`
    #[arg(long, default_value = "255,0,0", value_parser = parse_color)]
    bg_color: Rgb<u8>,

    /// Segmentation iterations per pass
    #[arg(long, default_value_t = segmentation::ITERATIONS)]
    iterations: u32,

    /// Images with a larger side are scaled down to this size
    #[arg(long, default_value_t = geometry::MAX_DIMENSION)]
    max_dimension: u32,

    /// Where to write the segmented image
    #[arg(short, long, default_value = "segmented.png")]
    output: PathBuf,

    /// Where to write the preview with the box drawn on it
    #[arg(long)]
    preview_output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn parse_color(s: &str) -> Result<Rgb<u8>, String> {
    let channels = s
        .split(',')
        .map(|c| c.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid colour {:?}: {}", s, e))?;
    match channels.as_slice() {
        &[r, g, b] => Ok(Rgb([r, g, b])),
        _ => Err(format!("invalid colour {:?}: expected r,g,b", s)),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("boxcut starting");

    let options = SegmentOptions {
        brush: BrushSettings {
            size: args.brush_size,
            fg_color: args.fg_color,
            bg_color: args.bg_color,
        },
        iterations: args.iterations,
        max_dimension: args.max_dimension,
    };

    let mut engine = GrabCut::default();
    let mut window = args.refine.then(WindowSurface::new);

    let SegmentOutput {
        boxed_preview,
        segmented,
        outcome,
    } = pipeline::segment(
        &mut engine,
        ImageSource::Path(args.image.clone()),
        &args.region,
        &options,
        window.as_mut().map(|w| w as &mut dyn Surface),
    )
    .with_context(|| format!("Failed to segment {}", args.image.display()))?;

    if let Some(outcome) = outcome {
        tracing::info!("Refinement {:?}", outcome);
    }

    segmented
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    tracing::info!("Segmented image written to {}", args.output.display());

    if let Some(path) = &args.preview_output {
        boxed_preview
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Preview written to {}", path.display());
    }

    Ok(())
}
