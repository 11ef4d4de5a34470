//! Dry-run of the export loop.

use std::path::PathBuf;

use zoomreel_common::config::AppConfig;
use zoomreel_project_model::{interpolate_sorted, CropRegion};
use zoomreel_render_engine::{frame_count, project, step_time_ms, ExportSettings};

pub fn run(
    path: PathBuf,
    duration_ms: Option<u64>,
    fps: Option<u32>,
    size: Option<(u32, u32)>,
    every: u64,
    crop: Option<CropRegion>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let (metadata, timeline) = super::load_timeline(&path, crop, config)?;

    let mut settings = ExportSettings::from_defaults(&config.export, metadata.dpr());
    if let Some(fps) = fps {
        anyhow::ensure!(fps > 0, "fps must be positive");
        settings.fps = fps;
    }
    settings.output_size = size;

    let duration_ms = duration_ms.unwrap_or(metadata.duration);
    let total = frame_count(duration_ms, settings.fps);
    let (width, height) = settings.output_size_for(timeline.crop());

    println!("Export plan for {}", path.display());
    println!("  Source duration: {duration_ms} ms");
    println!("  Frames: {total} @ {} fps", settings.fps);
    println!("  Output: {width}x{height}");
    println!();
    println!(
        "  {:>6}  {:>10}  {:>6}  {:>28}  {:>28}",
        "step", "time (ms)", "scale", "src (x, y, w, h)", "dst (x, y, w, h)"
    );

    let keyframes = timeline.sorted();
    let every = every.max(1);
    for index in (0..total).filter(|i| i % every == 0 || *i == total - 1) {
        let time_ms = step_time_ms(index, settings.fps);
        let state = interpolate_sorted(&keyframes, timeline.crop(), time_ms);
        let p = project(
            timeline.crop(),
            &state,
            settings.device_pixel_ratio,
            width,
            height,
        );
        println!(
            "  {index:>6}  {time_ms:>10.2}  {:>6.3}  {:>28}  {:>28}",
            state.scale,
            format!(
                "{:.1}, {:.1}, {:.1}, {:.1}",
                p.src.x, p.src.y, p.src.width, p.src.height
            ),
            format!(
                "{:.1}, {:.1}, {:.1}, {:.1}",
                p.dst.x, p.dst.y, p.dst.width, p.dst.height
            ),
        );
    }

    Ok(())
}
