//! detect_frame - run the detector once over an image file
//!
//! Prints the detections and optionally writes an annotated copy of the
//! image with boxes and labels drawn on.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use framesight::{DetectorAdapter, DetectorOptions, OverlayRenderer};

#[derive(Parser, Debug)]
#[command(name = "detect_frame", about = "One-shot object detection over an image file")]
struct Args {
    /// Input image (JPEG)
    image: PathBuf,

    /// Model reference: stub://name or a path to an ONNX artifact
    #[arg(long, env = "FRAMESIGHT_MODEL", default_value = "stub://detector")]
    model: String,

    /// Minimum confidence for a detection to be retained
    #[arg(long, default_value_t = 0.6)]
    threshold: f32,

    /// Result cap
    #[arg(long, default_value_t = 3)]
    max_results: usize,

    /// Labels file for file-backed models (one label per line)
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Write an annotated copy of the image here (JPEG)
    #[arg(long)]
    output: Option<PathBuf>,

    /// TrueType font for label text in the annotated copy
    #[arg(long)]
    font: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let image = image::open(&args.image)
        .with_context(|| format!("open image {}", args.image.display()))?
        .to_rgb8();

    let options = DetectorOptions {
        model: args.model,
        max_results: args.max_results,
        score_threshold: args.threshold,
        labels_path: args.labels,
        ..DetectorOptions::default()
    };
    let adapter = DetectorAdapter::new(options).context("load detection model")?;
    let detections = adapter.detect(&image).context("run detection")?;

    if detections.is_empty() {
        println!("no detections at threshold {:.2}", adapter.score_threshold());
    }
    for detection in detections.iter() {
        let bb = detection.bounding_box;
        match detection.top_category() {
            Some(category) => println!(
                "{}: {:.1}%  ({:.0},{:.0})-({:.0},{:.0})",
                category.label,
                category.score * 100.0,
                bb.left,
                bb.top,
                bb.right,
                bb.bottom
            ),
            None => println!(
                "?  ({:.0},{:.0})-({:.0},{:.0})",
                bb.left, bb.top, bb.right, bb.bottom
            ),
        }
    }

    if let Some(output) = args.output {
        let renderer = match args.font {
            Some(path) => {
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("read font {}", path.display()))?;
                OverlayRenderer::with_font_bytes(bytes)?
            }
            None => OverlayRenderer::new(),
        };
        let annotated = renderer.annotate(&image, &detections);
        annotated
            .save(&output)
            .with_context(|| format!("write annotated image {}", output.display()))?;
        println!("annotated copy written to {}", output.display());
    }

    Ok(())
}
