//! Show recording metadata and sample the timeline.

use std::path::PathBuf;

use zoomreel_common::clock::format_mm_ss;
use zoomreel_common::config::AppConfig;
use zoomreel_project_model::{interpolate_sorted, CropRegion};

pub fn run(
    path: PathBuf,
    at: Vec<f64>,
    crop: Option<CropRegion>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let (metadata, timeline) = super::load_timeline(&path, crop, config)?;
    let region = timeline.crop();

    println!("Recording: {}", path.display());
    println!("  Started: {} (unix ms)", metadata.start_time);
    println!(
        "  Duration: {} ({} ms)",
        format_mm_ss(metadata.duration),
        metadata.duration
    );
    println!(
        "  Crop: {}x{} at ({}, {})",
        region.width, region.height, region.x, region.y
    );
    println!("  Device pixel ratio: {}", metadata.dpr());
    println!();

    let keyframes = timeline.sorted();
    println!("Keyframes ({}):", keyframes.len());
    for (i, kf) in keyframes.iter().enumerate() {
        println!(
            "  [{i:>3}] {:>8} ms  scale {:>4.2}  center ({:.1}, {:.1})",
            kf.time_ms, kf.scale, kf.center.x, kf.center.y
        );
    }

    if !at.is_empty() {
        println!();
        println!("Samples:");
        for t in at {
            let state = interpolate_sorted(&keyframes, region, t);
            println!(
                "  {t:>10.2} ms  scale {:.4}  center ({:.2}, {:.2})",
                state.scale, state.center.x, state.center.y
            );
        }
    }

    Ok(())
}
