//! Export configuration and job management.
//!
//! The export driver steps through the recorded source at exact frame
//! instants. Each step seeks, waits for the seek (bounded by a safety
//! timeout), composes the zoomed view and explicitly pushes one frame to
//! the encoder, so output frame `i` always shows source time `i / fps`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use zoomreel_common::config::ExportDefaults;
use zoomreel_common::error::{ZoomreelError, ZoomreelResult};
use zoomreel_platform_core::{extension_for_mime, Encoder, EncoderSettings, SeekableSource};
use zoomreel_project_model::{interpolate_sorted, CropRegion, Timeline};

use crate::compositor::Compositor;

/// Export parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    /// Output frame rate.
    pub fps: u32,

    /// Safety timeout for a single seek.
    pub seek_timeout: Duration,

    /// Delay after each pushed frame.
    pub step_yield: Duration,

    /// Output size; defaults to the crop region in physical pixels.
    pub output_size: Option<(u32, u32)>,

    /// Device pixel ratio the source was captured at.
    pub device_pixel_ratio: f64,

    pub mime_type: String,
    pub video_bitrate_bps: u64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self::from_defaults(&ExportDefaults::default(), 1.0)
    }
}

impl ExportSettings {
    pub fn from_defaults(defaults: &ExportDefaults, device_pixel_ratio: f64) -> Self {
        Self {
            fps: defaults.fps.max(1),
            seek_timeout: Duration::from_millis(defaults.seek_timeout_ms),
            step_yield: Duration::from_millis(defaults.step_yield_ms),
            output_size: None,
            device_pixel_ratio,
            mime_type: defaults.mime_type.clone(),
            video_bitrate_bps: defaults.video_bitrate_bps,
        }
    }

    /// Resolved output size for `crop`, always even.
    pub fn output_size_for(&self, crop: &CropRegion) -> (u32, u32) {
        match self.output_size {
            Some((width, height)) => (even(width), even(height)),
            None => crop.even_pixel_size(self.device_pixel_ratio),
        }
    }

    /// Output file extension for the configured container.
    pub fn file_extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }

    /// Encoder frame interval.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }
}

fn even(v: u32) -> u32 {
    (v / 2).max(1) * 2
}

/// Number of export steps for a source of `duration_ms` at `fps`.
///
/// Steps sit at `i * 1000 / fps` ms for every `i` whose time does not
/// exceed the duration.
pub fn frame_count(duration_ms: u64, fps: u32) -> u64 {
    duration_ms * u64::from(fps.max(1)) / 1000 + 1
}

/// Source time of step `index`, in milliseconds.
pub fn step_time_ms(index: u64, fps: u32) -> f64 {
    (index * 1000) as f64 / f64::from(fps.max(1))
}

/// Output file name: `{prefix}{unix_ms}.{extension}`.
pub fn export_file_name(prefix: &str, unix_ms: i64, extension: &str) -> String {
    format!("{prefix}{unix_ms}.{extension}")
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    Idle,
    Initializing,
    Rendering,
    Finalizing,
    Complete,
    Failed,
}

/// Snapshot of an in-flight export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportJob {
    pub source_duration_ms: u64,
    pub fps: u32,

    /// Index of the step being rendered.
    pub step_index: u64,

    /// Source time of the current step.
    pub current_time_ms: f64,

    pub total_frames: u64,
    pub stage: ExportStage,
}

impl ExportJob {
    pub fn new(source_duration_ms: u64, fps: u32) -> Self {
        Self {
            source_duration_ms,
            fps,
            step_index: 0,
            current_time_ms: 0.0,
            total_frames: frame_count(source_duration_ms, fps),
            stage: ExportStage::Idle,
        }
    }

    /// Step length in milliseconds.
    pub fn step_ms(&self) -> f64 {
        1000.0 / f64::from(self.fps.max(1))
    }
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Export progress report.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames pushed so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Result of a completed export.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    /// Encoded output.
    pub bytes: Vec<u8>,

    pub width: u32,
    pub height: u32,
    pub frames_rendered: u64,

    /// Steps that proceeded after the seek safety timeout.
    pub seek_timeouts: u64,

    /// Wall time spent exporting.
    pub elapsed: Duration,
}

/// Drives a deterministic frame-by-frame export.
pub struct ExportDriver {
    settings: ExportSettings,
    cancel: Arc<AtomicBool>,
    progress: Option<ProgressCallback>,
    job: ExportJob,
}

impl ExportDriver {
    pub fn new(settings: ExportSettings) -> Self {
        let job = ExportJob::new(0, settings.fps);
        Self {
            settings,
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
            job,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Flag that aborts the export when set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn job(&self) -> &ExportJob {
        &self.job
    }

    /// Render `timeline` over `source` into `encoder`.
    ///
    /// On cancellation or failure the encoder is aborted and nothing is
    /// returned.
    pub async fn run(
        &mut self,
        source: &mut dyn SeekableSource,
        encoder: &mut dyn Encoder,
        timeline: &Timeline,
    ) -> ZoomreelResult<ExportOutcome> {
        let started = Instant::now();
        self.job = ExportJob::new(source.duration_ms(), self.settings.fps);
        self.job.stage = ExportStage::Initializing;
        self.report(0, started);

        let crop = *timeline.crop();
        let (width, height) = self.settings.output_size_for(&crop);
        tracing::info!(
            duration_ms = self.job.source_duration_ms,
            fps = self.settings.fps,
            step_ms = self.job.step_ms(),
            total_frames = self.job.total_frames,
            width,
            height,
            "Starting export"
        );

        let encoder_settings = EncoderSettings {
            width,
            height,
            fps: self.settings.fps,
            mime_type: self.settings.mime_type.clone(),
            video_bitrate_bps: self.settings.video_bitrate_bps,
        };
        if let Err(e) = encoder.start(&encoder_settings).await {
            return Err(self.fail(encoder, encode_failure(e)).await);
        }

        let keyframes = timeline.sorted();
        let mut compositor = Compositor::new(width, height);
        let mut seek_timeouts = 0u64;
        let mut frames_rendered = 0u64;
        self.job.stage = ExportStage::Rendering;

        for index in 0..self.job.total_frames {
            let time_ms = step_time_ms(index, self.settings.fps);
            self.job.step_index = index;
            self.job.current_time_ms = time_ms;

            if self.cancel.load(Ordering::Relaxed) {
                return Err(self.abort(encoder, time_ms).await);
            }

            match tokio::time::timeout(self.settings.seek_timeout, source.seek(time_ms / 1000.0))
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(ZoomreelError::SeekTimeout { .. })) | Err(_) => {
                    seek_timeouts += 1;
                    let timeout = ZoomreelError::SeekTimeout {
                        time_ms,
                        timeout_ms: self.settings.seek_timeout.as_millis() as u64,
                    };
                    tracing::warn!(error = %timeout, "Proceeding with best-effort frame");
                }
                Ok(Err(e)) => return Err(self.fail(encoder, e).await),
            }

            let state = interpolate_sorted(&keyframes, &crop, time_ms);
            match source.current_frame() {
                Some(frame) => {
                    compositor.render(frame, &crop, &state, self.settings.device_pixel_ratio);
                }
                None => compositor.clear(),
            }

            if let Err(e) = encoder.push_frame(compositor.surface()).await {
                return Err(self.fail(encoder, encode_failure(e)).await);
            }
            frames_rendered += 1;
            self.report(frames_rendered, started);
            tracing::trace!(index, time_ms, scale = state.scale, "Frame pushed");

            tokio::time::sleep(self.settings.step_yield).await;
        }

        self.job.stage = ExportStage::Finalizing;
        self.report(frames_rendered, started);

        // Let the last pushed frame occupy one full encoder tick.
        tokio::time::sleep(self.settings.frame_interval()).await;
        if self.cancel.load(Ordering::Relaxed) {
            let time_ms = self.job.current_time_ms;
            return Err(self.abort(encoder, time_ms).await);
        }

        let bytes = match encoder.stop().await {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.fail(encoder, encode_failure(e)).await),
        };

        self.job.stage = ExportStage::Complete;
        self.report(frames_rendered, started);
        let elapsed = started.elapsed();
        tracing::info!(
            frames = frames_rendered,
            seek_timeouts,
            bytes = bytes.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Export complete"
        );

        Ok(ExportOutcome {
            bytes,
            width,
            height,
            frames_rendered,
            seek_timeouts,
            elapsed,
        })
    }

    async fn abort(&mut self, encoder: &mut dyn Encoder, time_ms: f64) -> ZoomreelError {
        tracing::info!(time_ms, "Export cancelled");
        self.fail(encoder, ZoomreelError::ExportAborted { time_ms })
            .await
    }

    async fn fail(&mut self, encoder: &mut dyn Encoder, error: ZoomreelError) -> ZoomreelError {
        encoder.abort().await;
        self.job.stage = ExportStage::Failed;
        if !matches!(error, ZoomreelError::ExportAborted { .. }) {
            tracing::error!(error = %error, step = self.job.step_index, "Export failed");
        }
        let frames = self.job.step_index;
        self.report(frames, Instant::now());
        error
    }

    fn report(&self, frames_rendered: u64, started: Instant) {
        let Some(cb) = &self.progress else {
            return;
        };
        let total = self.job.total_frames.max(1);
        let progress = match self.job.stage {
            ExportStage::Complete => 1.0,
            _ => (frames_rendered as f64 / total as f64).min(1.0),
        };
        let eta_secs = if frames_rendered > 0 {
            let per_frame = started.elapsed().as_secs_f64() / frames_rendered as f64;
            per_frame * total.saturating_sub(frames_rendered) as f64
        } else {
            0.0
        };
        cb(ExportProgress {
            progress,
            frames_rendered,
            total_frames: self.job.total_frames,
            eta_secs,
            stage: self.job.stage,
        });
    }
}

fn encode_failure(e: ZoomreelError) -> ZoomreelError {
    match e {
        ZoomreelError::EncodeFailure { .. } => e,
        other => ZoomreelError::encode(other.to_string()),
    }
}
