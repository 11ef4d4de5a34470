//! Export a recording to video.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use zoomreel_common::config::AppConfig;
use zoomreel_platform_core::{FsPersistence, Persistence, SeekableSource};
use zoomreel_project_model::CropRegion;
use zoomreel_render_engine::{
    export_file_name, ExportDriver, ExportProgress, ExportSettings, FfmpegEncoder, FfmpegSource,
};

pub async fn run(
    video: PathBuf,
    metadata: PathBuf,
    output: Option<PathBuf>,
    fps: Option<u32>,
    size: Option<(u32, u32)>,
    crop: Option<CropRegion>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    println!("Exporting recording: {}", video.display());

    let (meta, timeline) = super::load_timeline(&metadata, crop, config)?;

    let mut settings = ExportSettings::from_defaults(&config.export, meta.dpr());
    if let Some(fps) = fps {
        anyhow::ensure!(fps > 0, "fps must be positive");
        settings.fps = fps;
    }
    settings.output_size = size;

    let output_path = output.unwrap_or_else(|| {
        config.output_dir.join(export_file_name(
            &config.export.file_prefix,
            chrono::Utc::now().timestamp_millis(),
            settings.file_extension(),
        ))
    });

    let mut source = FfmpegSource::open(&video)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open video: {e}"))?;
    if source.duration_ms().abs_diff(meta.duration) > 1000 {
        tracing::warn!(
            video_ms = source.duration_ms(),
            metadata_ms = meta.duration,
            "Video and metadata durations disagree; using the video's"
        );
    }

    let (width, height) = settings.output_size_for(timeline.crop());
    println!("  Output: {}", output_path.display());
    println!("  Resolution: {width}x{height} @ {} fps", settings.fps);
    println!("  Keyframes: {}", timeline.len());

    let progress_cb: Box<dyn Fn(ExportProgress) + Send> = Box::new(|p| {
        print!(
            "\r  Progress: {:.1}% ({}/{} frames, ETA: {:.0}s)  ",
            p.progress * 100.0,
            p.frames_rendered,
            p.total_frames,
            p.eta_secs,
        );
        let _ = std::io::stdout().flush();
    });

    let mut driver = ExportDriver::new(settings).with_progress(progress_cb);
    let cancel = driver.cancel_flag();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.store(true, Ordering::Relaxed);
        }
    });

    let mut encoder = FfmpegEncoder::new();
    let result = driver.run(&mut source, &mut encoder, &timeline).await;
    ctrl_c.abort();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            println!("\nExport failed: {e}");
            return Err(e.into());
        }
    };

    let persistence = FsPersistence::new();
    if let Err(e) = persistence.save(&output_path, &outcome.bytes).await {
        let kept = fallback_path(&output_path);
        persistence
            .save(&kept, &outcome.bytes)
            .await
            .map_err(|e2| {
                anyhow::anyhow!("Failed to save export: {e}; fallback also failed: {e2}")
            })?;
        tracing::warn!(
            error = %e,
            kept = %kept.display(),
            "Export kept at fallback path"
        );
        anyhow::bail!(
            "Failed to save export: {e}. Encoded video kept at {}",
            kept.display()
        );
    }

    println!("\nExport complete: {}", output_path.display());
    println!(
        "  {} frames in {:.1}s",
        outcome.frames_rendered,
        outcome.elapsed.as_secs_f64()
    );
    if outcome.seek_timeouts > 0 {
        println!(
            "  {} step(s) used a best-effort frame after a slow seek",
            outcome.seek_timeouts
        );
    }

    Ok(())
}

/// Where encoded bytes go when the requested output cannot be written.
fn fallback_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "zoomreel_export".into());
    std::env::temp_dir().join(name)
}
