//! ffmpeg-backed export input and output.
//!
//! [`FfmpegSource`] decodes single frames on demand with `ffmpeg -ss`;
//! [`FfmpegEncoder`] pipes raw RGBA frames into an ffmpeg child process and
//! returns the finished file's bytes on stop.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use image::RgbaImage;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};

use zoomreel_common::error::{ZoomreelError, ZoomreelResult};
use zoomreel_platform_core::{Encoder, EncoderSettings, Frame, SeekableSource};

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Width, height and duration of the first video stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeInfo {
    pub width: u32,
    pub height: u32,
    pub duration_ms: u64,
}

/// Run ffprobe on `path`.
pub async fn probe(path: &Path) -> ZoomreelResult<ProbeInfo> {
    let output = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height:format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| ZoomreelError::capture_unavailable(format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(ZoomreelError::capture_unavailable(format!(
            "ffprobe failed for {}: {}",
            path.display(),
            stderr_tail(&output.stderr)
        )));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    parse_probe(&json).ok_or_else(|| {
        ZoomreelError::capture_unavailable(format!(
            "ffprobe reported no usable video stream in {}",
            path.display()
        ))
    })
}

fn parse_probe(json: &serde_json::Value) -> Option<ProbeInfo> {
    let stream = json.get("streams")?.get(0)?;
    let width = u32::try_from(stream.get("width")?.as_u64()?).ok()?;
    let height = u32::try_from(stream.get("height")?.as_u64()?).ok()?;
    // WebM from a live encoder often carries no stream duration, only a
    // container one, and ffprobe prints it as a string.
    let duration_secs = match json.get("format")?.get("duration")? {
        serde_json::Value::String(s) => s.parse::<f64>().ok()?,
        v => v.as_f64()?,
    };
    if width == 0 || height == 0 || !duration_secs.is_finite() || duration_secs < 0.0 {
        return None;
    }
    Some(ProbeInfo {
        width,
        height,
        duration_ms: (duration_secs * 1000.0).round() as u64,
    })
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().rev().take(5).collect();
    lines.into_iter().rev().collect::<Vec<_>>().join(" | ")
}

/// A recorded video file decoded one frame per seek.
#[derive(Debug)]
pub struct FfmpegSource {
    path: PathBuf,
    info: ProbeInfo,
    frame: Option<Frame>,
}

impl FfmpegSource {
    pub async fn open(path: impl Into<PathBuf>) -> ZoomreelResult<Self> {
        let path = path.into();
        let info = probe(&path).await?;
        tracing::info!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            duration_ms = info.duration_ms,
            "Opened export source"
        );
        Ok(Self {
            path,
            info,
            frame: None,
        })
    }
}

#[async_trait]
impl SeekableSource for FfmpegSource {
    fn duration_ms(&self) -> u64 {
        self.info.duration_ms
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    async fn seek(&mut self, time_secs: f64) -> ZoomreelResult<()> {
        let output = tokio::process::Command::new("ffmpeg")
            .args(["-v", "error", "-ss"])
            .arg(format!("{time_secs:.6}"))
            .arg("-i")
            .arg(&self.path)
            .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ZoomreelError::capture_unavailable(format!("failed to run ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(ZoomreelError::capture_unavailable(format!(
                "ffmpeg could not decode {} at {time_secs:.3}s: {}",
                self.path.display(),
                stderr_tail(&output.stderr)
            )));
        }

        // Seeking at or past the last frame decodes nothing; keep the
        // previous frame in that case.
        if output.stdout.is_empty() {
            tracing::debug!(time_secs, "No frame decoded at seek target");
            return Ok(());
        }

        match RgbaImage::from_raw(self.info.width, self.info.height, output.stdout) {
            Some(frame) => {
                self.frame = Some(frame);
                Ok(())
            }
            None => Err(ZoomreelError::capture_unavailable(format!(
                "decoded frame does not match {}x{}",
                self.info.width, self.info.height
            ))),
        }
    }

    fn current_frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_output_path(extension: &str) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "zoomreel-encode-{}-{n}.{extension}",
        std::process::id()
    ))
}

/// ffmpeg arguments for encoding raw RGBA from stdin into `output`.
pub fn encoder_args(settings: &EncoderSettings, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-v",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-s",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(format!("{}x{}", settings.width, settings.height));
    args.extend(["-r".to_string(), settings.fps.to_string()]);
    args.extend(["-i".to_string(), "pipe:0".to_string()]);

    match settings.file_extension() {
        "mp4" => args.extend(
            ["-c:v", "libx264", "-preset", "medium", "-movflags", "+faststart"]
                .iter()
                .map(|s| s.to_string()),
        ),
        "gif" => {}
        _ => args.extend(
            ["-c:v", "libvpx-vp9", "-deadline", "good", "-row-mt", "1"]
                .iter()
                .map(|s| s.to_string()),
        ),
    }
    if settings.file_extension() != "gif" {
        args.extend([
            "-b:v".to_string(),
            settings.video_bitrate_bps.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
        ]);
    }
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Encodes pushed frames with an ffmpeg child process.
#[derive(Debug, Default)]
pub struct FfmpegEncoder {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    output: Option<PathBuf>,
    frame_size: (u32, u32),
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    async fn cleanup(&mut self) {
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        if let Some(path) = self.output.take() {
            let _ = tokio::fs::remove_file(path).await;
        }
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn start(&mut self, settings: &EncoderSettings) -> ZoomreelResult<()> {
        if self.child.is_some() {
            return Err(ZoomreelError::encode("encoder already started"));
        }
        let output = temp_output_path(settings.file_extension());
        let args = encoder_args(settings, &output);
        tracing::debug!(args = ?args, "Spawning ffmpeg encoder");

        let mut child = tokio::process::Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ZoomreelError::encode(format!("failed to spawn ffmpeg: {e}")))?;

        self.stdin = child.stdin.take();
        self.child = Some(child);
        self.output = Some(output);
        self.frame_size = (settings.width, settings.height);
        Ok(())
    }

    async fn push_frame(&mut self, frame: &Frame) -> ZoomreelResult<()> {
        if frame.dimensions() != self.frame_size {
            return Err(ZoomreelError::encode(format!(
                "frame is {:?}, encoder expects {:?}",
                frame.dimensions(),
                self.frame_size
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ZoomreelError::encode("encoder is not running"))?;
        stdin
            .write_all(frame.as_raw())
            .await
            .map_err(|e| ZoomreelError::encode(format!("ffmpeg stdin closed: {e}")))
    }

    async fn stop(&mut self) -> ZoomreelResult<Vec<u8>> {
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }
        let child = self
            .child
            .take()
            .ok_or_else(|| ZoomreelError::encode("encoder is not running"))?;
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ZoomreelError::encode(format!("ffmpeg did not exit cleanly: {e}")))?;

        let path = self
            .output
            .take()
            .ok_or_else(|| ZoomreelError::encode("encoder has no output file"))?;
        if !output.status.success() {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(ZoomreelError::encode(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            )));
        }

        let bytes = tokio::fs::read(&path).await?;
        let _ = tokio::fs::remove_file(&path).await;
        Ok(bytes)
    }

    async fn abort(&mut self) {
        tracing::debug!("Aborting ffmpeg encoder");
        self.cleanup().await;
    }
}
