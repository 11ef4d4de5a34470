//! Recording session management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

use zoomreel_common::clock::{format_mm_ss, RecordingClock};
use zoomreel_common::config::RecordingDefaults;
use zoomreel_common::error::{ZoomreelError, ZoomreelResult};
use zoomreel_platform_core::{
    extension_for_mime, CaptureSource, CursorPosition, Encoder, EncoderSettings, Frame,
    FrameStream, Persistence, StreamConstraints, TriggerAction,
};
use zoomreel_project_model::{
    clamp_scale, CropRegion, DeletePolicy, LogicalPoint, RecordingMetadata, Timeline, MIN_SCALE,
};

/// Captured frames buffered between the stream reader and the encoder.
const FRAME_QUEUE_DEPTH: usize = 8;

/// Configuration for a live capture session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Pointer/zoom sampling rate in Hz.
    pub sampler_hz: u32,

    /// Countdown steps shown before recording starts.
    pub countdown_steps: u32,

    /// Length of a single countdown step.
    pub countdown_step: Duration,

    /// Both selection sides must exceed this size (logical units).
    pub min_region_size: f64,

    /// Scale change per zoom signal.
    pub zoom_step: f64,

    /// Coalescing window for keyframe inserts.
    pub coalesce_window_ms: u64,

    /// Deletion rule for the recorded timeline.
    pub delete_policy: DeletePolicy,

    /// Capture source to open; the first listed source when unset.
    pub source_id: Option<String>,

    /// Resolution bounds requested from the capture source.
    pub constraints: StreamConstraints,

    /// Realtime encoder frame rate.
    pub fps: u32,

    /// Realtime encoder container/codec hint.
    pub mime_type: String,

    /// Realtime encoder bitrate.
    pub video_bitrate_bps: u64,

    /// Device pixel ratio of the captured display.
    pub device_pixel_ratio: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&RecordingDefaults::default())
    }
}

impl From<&RecordingDefaults> for SessionConfig {
    fn from(defaults: &RecordingDefaults) -> Self {
        Self {
            sampler_hz: defaults.sampler_hz.max(1),
            countdown_steps: defaults.countdown_steps,
            countdown_step: Duration::from_millis(defaults.countdown_step_ms),
            min_region_size: defaults.min_region_size,
            zoom_step: defaults.zoom_step,
            coalesce_window_ms: defaults.coalesce_window_ms,
            delete_policy: if defaults.protect_anchor {
                DeletePolicy::ProtectAnchor
            } else {
                DeletePolicy::AllowAny
            },
            source_id: defaults.source_id.clone(),
            constraints: StreamConstraints::default(),
            fps: defaults.fps.max(1),
            mime_type: defaults.mime_type.clone(),
            video_bitrate_bps: 10_000_000,
            device_pixel_ratio: 1.0,
        }
    }
}

/// State of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing selected, not recording.
    Idle,
    /// Selection overlay is active.
    Selecting,
    /// A region was drawn and waits for confirmation.
    AwaitingConfirmation,
    /// Counting down to the start of recording.
    Countdown,
    /// Frames are flowing to the encoder.
    Recording,
    /// Recording finished; a [`Recording`] is available.
    Stopped,
}

/// What the recording HUD displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HudState {
    pub state: SessionState,

    /// Elapsed recording time, `MM:SS`.
    pub timer: String,

    /// Current zoom scale.
    pub scale: f64,

    /// Remaining countdown step, while counting down.
    pub countdown: Option<u32>,
}

impl HudState {
    fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            timer: format_mm_ss(0),
            scale: MIN_SCALE,
            countdown: None,
        }
    }

    /// Scale label, e.g. `Zoom: 1.2x`.
    pub fn scale_label(&self) -> String {
        format!("Zoom: {}x", format_scale(self.scale))
    }
}

fn format_scale(scale: f64) -> String {
    if scale.fract() == 0.0 {
        format!("{scale:.1}")
    } else {
        let text = format!("{scale:.2}");
        text.trim_end_matches('0').to_string()
    }
}

fn round_scale(scale: f64) -> f64 {
    (scale * 100.0).round() / 100.0
}

/// Zoom direction for a single signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

/// A finished recording held in memory until persisted or discarded.
#[derive(Debug, Clone)]
pub struct Recording {
    /// Keyframes captured during the recording; editable until persisted.
    pub timeline: Timeline,

    /// Encoded video, absent when the encoder failed to finalize.
    pub video: Option<Vec<u8>>,

    /// Wall-clock start, Unix milliseconds.
    pub started_at_ms: i64,

    pub duration_ms: u64,
    pub frames_encoded: u64,
    pub device_pixel_ratio: f64,
    pub mime_type: String,
}

impl Recording {
    pub fn crop(&self) -> &CropRegion {
        self.timeline.crop()
    }

    /// Metadata document for this recording.
    pub fn metadata(&self) -> RecordingMetadata {
        RecordingMetadata::from_timeline(
            &self.timeline,
            self.started_at_ms,
            self.duration_ms,
            self.device_pixel_ratio,
        )
    }

    /// File extension matching the realtime encoder's container.
    pub fn file_extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

/// Paths written by [`CaptureSession::persist`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedRecording {
    pub video_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// A live capture session.
///
/// Drives the selection → countdown → recording → stopped lifecycle,
/// feeds captured frames to the encoder and samples zoom input into a
/// [`Timeline`].
pub struct CaptureSession {
    config: SessionConfig,
    state: SessionState,
    capture: Box<dyn CaptureSource>,
    encoder: Box<dyn Encoder>,
    crop: Option<CropRegion>,
    stream: Option<Box<dyn FrameStream>>,
    clock: Option<RecordingClock>,
    timeline: Option<Timeline>,
    current_scale: f64,
    zoom_pending: bool,
    last_cursor: Option<CursorPosition>,
    frames_encoded: u64,
    recording: Option<Recording>,
    hud: watch::Sender<HudState>,
}

impl CaptureSession {
    pub fn new(
        config: SessionConfig,
        capture: Box<dyn CaptureSource>,
        encoder: Box<dyn Encoder>,
    ) -> Self {
        let (hud, _) = watch::channel(HudState::idle());
        Self {
            config,
            state: SessionState::Idle,
            capture,
            encoder,
            crop: None,
            stream: None,
            clock: None,
            timeline: None,
            current_scale: MIN_SCALE,
            zoom_pending: false,
            last_cursor: None,
            frames_encoded: 0,
            recording: None,
            hud,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Subscribe to HUD updates.
    pub fn hud(&self) -> watch::Receiver<HudState> {
        self.hud.subscribe()
    }

    /// The selected (or recorded) crop region.
    pub fn crop(&self) -> Option<&CropRegion> {
        self.crop.as_ref()
    }

    pub fn current_scale(&self) -> f64 {
        self.current_scale
    }

    /// The live timeline while recording, otherwise the finished one.
    pub fn timeline(&self) -> Option<&Timeline> {
        self.timeline
            .as_ref()
            .or_else(|| self.recording.as_ref().map(|r| &r.timeline))
    }

    /// Editable timeline of the finished recording.
    pub fn timeline_mut(&mut self) -> Option<&mut Timeline> {
        if self.state != SessionState::Stopped {
            return None;
        }
        self.recording.as_mut().map(|r| &mut r.timeline)
    }

    pub fn recording(&self) -> Option<&Recording> {
        self.recording.as_ref()
    }

    /// Milliseconds since recording started.
    pub fn elapsed_ms(&self) -> u64 {
        self.clock.as_ref().map(RecordingClock::elapsed_ms).unwrap_or(0)
    }

    /// Enter selection mode.
    ///
    /// A previously finished recording stays available until a new one
    /// actually starts.
    pub fn begin_selection(&mut self) -> ZoomreelResult<()> {
        match self.state {
            SessionState::Idle
            | SessionState::Selecting
            | SessionState::AwaitingConfirmation
            | SessionState::Stopped => {
                self.crop = None;
                self.set_state(SessionState::Selecting);
                Ok(())
            }
            state => Err(ZoomreelError::invalid_state(state, "begin selection")),
        }
    }

    /// Commit a drawn region.
    ///
    /// Regions not exceeding the minimum size on both sides are rejected
    /// and the session stays in selection mode.
    pub fn commit_selection(&mut self, region: CropRegion) -> ZoomreelResult<()> {
        if self.state != SessionState::Selecting {
            return Err(ZoomreelError::invalid_state(self.state, "commit selection"));
        }
        let min = self.config.min_region_size;
        if !region.exceeds(min) {
            tracing::debug!(
                width = region.width,
                height = region.height,
                "Selection too small"
            );
            return Err(ZoomreelError::InvalidRegion {
                width: region.width,
                height: region.height,
                min,
            });
        }

        tracing::info!(
            x = region.x,
            y = region.y,
            width = region.width,
            height = region.height,
            "Region selected"
        );
        self.crop = Some(region);
        self.set_state(SessionState::AwaitingConfirmation);
        Ok(())
    }

    /// Drop the drawn region and return to drawing.
    pub fn cancel_selection(&mut self) -> ZoomreelResult<()> {
        if self.state != SessionState::AwaitingConfirmation {
            return Err(ZoomreelError::invalid_state(self.state, "cancel selection"));
        }
        self.crop = None;
        self.set_state(SessionState::Selecting);
        Ok(())
    }

    /// Confirm the region: count down, then start recording.
    ///
    /// On capture or encoder failure the session returns to `Idle`.
    pub async fn confirm(&mut self) -> ZoomreelResult<()> {
        if self.state != SessionState::AwaitingConfirmation {
            return Err(ZoomreelError::invalid_state(self.state, "confirm selection"));
        }
        let Some(crop) = self.crop else {
            return Err(ZoomreelError::invalid_state(self.state, "confirm without region"));
        };

        self.set_state(SessionState::Countdown);
        for step in (1..=self.config.countdown_steps).rev() {
            self.hud.send_modify(|hud| hud.countdown = Some(step));
            tracing::debug!(step, "Countdown");
            tokio::time::sleep(self.config.countdown_step).await;
        }
        self.hud.send_modify(|hud| hud.countdown = None);

        match self.start_recording(crop).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, "Failed to start recording");
                self.crop = None;
                self.set_state(SessionState::Idle);
                Err(e)
            }
        }
    }

    async fn start_recording(&mut self, crop: CropRegion) -> ZoomreelResult<()> {
        let source_id = match &self.config.source_id {
            Some(id) => id.clone(),
            None => {
                let sources = self
                    .capture
                    .list_sources()
                    .await
                    .map_err(as_capture_unavailable)?;
                sources
                    .into_iter()
                    .next()
                    .map(|s| s.id)
                    .ok_or_else(|| ZoomreelError::capture_unavailable("no capture sources"))?
            }
        };

        tracing::info!(source = %source_id, "Opening capture stream");
        let mut stream = self
            .capture
            .open_stream(&source_id, self.config.constraints)
            .await
            .map_err(as_capture_unavailable)?;

        let Some(first) = stream.next_frame().await else {
            stream.close();
            return Err(ZoomreelError::capture_unavailable(
                "capture stream ended before the first frame",
            ));
        };

        let settings = EncoderSettings {
            width: first.width(),
            height: first.height(),
            fps: self.config.fps,
            mime_type: self.config.mime_type.clone(),
            video_bitrate_bps: self.config.video_bitrate_bps,
        };
        if let Err(e) = self.encoder.start(&settings).await {
            stream.close();
            return Err(as_encode_failure(e));
        }
        if let Err(e) = self.encoder.push_frame(&first).await {
            self.encoder.abort().await;
            stream.close();
            return Err(as_encode_failure(e));
        }

        self.stream = Some(stream);
        self.clock = Some(RecordingClock::start());
        self.timeline = Some(
            Timeline::with_policy(crop, self.config.delete_policy)
                .with_coalesce_window(self.config.coalesce_window_ms),
        );
        self.current_scale = MIN_SCALE;
        self.zoom_pending = false;
        self.last_cursor = None;
        self.frames_encoded = 1;
        self.recording = None;
        self.set_state(SessionState::Recording);

        tracing::info!(
            width = settings.width,
            height = settings.height,
            fps = settings.fps,
            "Recording started"
        );
        Ok(())
    }

    /// Apply one zoom signal; ignored outside of recording.
    pub fn adjust_zoom(&mut self, direction: ZoomDirection) {
        if self.state != SessionState::Recording {
            return;
        }
        let delta = match direction {
            ZoomDirection::In => self.config.zoom_step,
            ZoomDirection::Out => -self.config.zoom_step,
        };
        self.current_scale = round_scale(clamp_scale(self.current_scale + delta));
        self.zoom_pending = true;
        let scale = self.current_scale;
        self.hud.send_modify(|hud| hud.scale = scale);
        tracing::debug!(scale, "Zoom adjusted");
    }

    /// One sampler tick: record a keyframe if a zoom signal is pending.
    pub fn sample(&mut self, cursor: CursorPosition) {
        self.last_cursor = Some(cursor);
        if !self.zoom_pending || self.state != SessionState::Recording {
            return;
        }
        let (Some(timeline), Some(clock)) = (self.timeline.as_mut(), self.clock.as_ref()) else {
            return;
        };
        let center = timeline.crop().to_local(LogicalPoint::new(cursor.x, cursor.y));
        let time_ms = clock.elapsed_ms();
        timeline.insert(time_ms, center, self.current_scale);
        self.zoom_pending = false;
        tracing::trace!(time_ms, scale = self.current_scale, "Keyframe recorded");
    }

    /// Route a trigger action according to the current state.
    pub async fn dispatch(&mut self, action: TriggerAction) -> ZoomreelResult<()> {
        match (action, self.state) {
            (TriggerAction::ToggleRecording, SessionState::Recording) => self.stop().await.map(|_| ()),
            (TriggerAction::StartSelection, SessionState::Recording) | (_, SessionState::Countdown) => {
                tracing::debug!(action = action.as_str(), state = ?self.state, "Action ignored");
                Ok(())
            }
            (TriggerAction::ToggleRecording | TriggerAction::StartSelection, _) => {
                self.begin_selection()
            }
            (TriggerAction::ZoomIn, _) => {
                self.adjust_zoom(ZoomDirection::In);
                Ok(())
            }
            (TriggerAction::ZoomOut, _) => {
                self.adjust_zoom(ZoomDirection::Out);
                Ok(())
            }
        }
    }

    /// Drive the recording until it is toggled off, the trigger channel
    /// closes, or the capture stream ends.
    ///
    /// Runs the sampler at `sampler_hz`, refreshes the HUD timer once per
    /// second and forwards every captured frame to the encoder.
    pub async fn run(
        &mut self,
        actions: &mut mpsc::Receiver<TriggerAction>,
        cursor: &watch::Receiver<CursorPosition>,
    ) -> ZoomreelResult<&Recording> {
        if self.state != SessionState::Recording {
            return Err(ZoomreelError::invalid_state(self.state, "run"));
        }
        let Some(mut stream) = self.stream.take() else {
            return Err(ZoomreelError::invalid_state(self.state, "run without stream"));
        };

        let period = Duration::from_secs_f64(1.0 / f64::from(self.config.sampler_hz.max(1)));
        let mut sampler = tokio::time::interval(period);
        sampler.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut hud_timer = tokio::time::interval(Duration::from_secs(1));
        hud_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let (stop_reader, mut stop_rx) = oneshot::channel::<()>();
        let (frame_tx, mut frames) = mpsc::channel::<Frame>(FRAME_QUEUE_DEPTH);
        let reader = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    frame = stream.next_frame() => match frame {
                        Some(frame) => {
                            if frame_tx.send(frame).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            stream
        });

        let mut failure = None;
        loop {
            tokio::select! {
                frame = frames.recv() => match frame {
                    Some(frame) => {
                        if let Err(e) = self.push_captured(&frame).await {
                            failure = Some(e);
                            break;
                        }
                    }
                    None => {
                        tracing::info!("Capture stream ended");
                        break;
                    }
                },
                _ = sampler.tick() => {
                    let position = *cursor.borrow();
                    self.sample(position);
                }
                _ = hud_timer.tick() => self.publish_hud(),
                action = actions.recv() => match action {
                    Some(TriggerAction::ToggleRecording) | None => break,
                    Some(TriggerAction::ZoomIn) => self.adjust_zoom(ZoomDirection::In),
                    Some(TriggerAction::ZoomOut) => self.adjust_zoom(ZoomDirection::Out),
                    Some(TriggerAction::StartSelection) => {
                        tracing::debug!("Selection ignored while recording");
                    }
                },
            }
        }

        let _ = stop_reader.send(());
        if failure.is_none() {
            // Frames already captured still reach the encoder.
            while let Some(frame) = frames.recv().await {
                if let Err(e) = self.push_captured(&frame).await {
                    failure = Some(e);
                    break;
                }
            }
        }
        drop(frames);

        self.last_cursor = Some(*cursor.borrow());
        match reader.await {
            Ok(stream) => self.stream = Some(stream),
            Err(e) => tracing::warn!(error = %e, "Capture reader task failed"),
        }

        if let Some(e) = failure {
            tracing::error!(error = %e, "Encoder rejected frame");
            self.fail_recording().await;
            return Err(e);
        }
        self.stop().await
    }

    /// Stop recording and finalize the encoder.
    ///
    /// A pending zoom signal is flushed into the timeline first. If the
    /// encoder fails to finalize, the timeline is still kept.
    pub async fn stop(&mut self) -> ZoomreelResult<&Recording> {
        if self.state != SessionState::Recording {
            return Err(ZoomreelError::invalid_state(self.state, "stop"));
        }
        if self.zoom_pending {
            let cursor = self
                .last_cursor
                .unwrap_or_else(|| self.screen_center_cursor());
            self.sample(cursor);
        }
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }

        let duration_ms = self.elapsed_ms();
        let (video, outcome) = match self.encoder.stop().await {
            Ok(bytes) => (Some(bytes), Ok(())),
            Err(e) => (None, Err(as_encode_failure(e))),
        };

        self.set_state(SessionState::Stopped);
        let recording = self.take_recording(video, duration_ms)?;
        match &outcome {
            Ok(()) => tracing::info!(
                duration_ms,
                frames = recording.frames_encoded,
                keyframes = recording.timeline.len(),
                "Recording stopped"
            ),
            Err(e) => tracing::error!(error = %e, "Encoder failed to finalize"),
        }
        match outcome {
            Ok(()) => Ok(&*recording),
            Err(e) => Err(e),
        }
    }

    async fn push_captured(&mut self, frame: &Frame) -> ZoomreelResult<()> {
        self.encoder
            .push_frame(frame)
            .await
            .map_err(as_encode_failure)?;
        self.frames_encoded += 1;
        Ok(())
    }

    async fn fail_recording(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        self.encoder.abort().await;
        let duration_ms = self.elapsed_ms();
        self.set_state(SessionState::Stopped);
        let _ = self.take_recording(None, duration_ms);
    }

    fn take_recording(
        &mut self,
        video: Option<Vec<u8>>,
        duration_ms: u64,
    ) -> ZoomreelResult<&mut Recording> {
        let timeline = self
            .timeline
            .take()
            .ok_or_else(|| ZoomreelError::invalid_state(self.state, "finish without timeline"))?;
        let started_at_ms = self
            .clock
            .take()
            .map(|c| c.epoch_wall_ms())
            .unwrap_or_default();
        Ok(self.recording.insert(Recording {
            timeline,
            video,
            started_at_ms,
            duration_ms,
            frames_encoded: self.frames_encoded,
            device_pixel_ratio: self.config.device_pixel_ratio,
            mime_type: self.config.mime_type.clone(),
        }))
    }

    fn screen_center_cursor(&self) -> CursorPosition {
        match self.timeline.as_ref() {
            Some(timeline) => {
                let center = timeline.crop().to_screen(timeline.crop().local_center());
                CursorPosition::new(center.x, center.y)
            }
            None => CursorPosition::new(0.0, 0.0),
        }
    }

    /// Write the finished recording's video and metadata into `dir`.
    ///
    /// Files are named after the recording's start time. On failure the
    /// recording stays in memory for a retry.
    pub async fn persist(
        &self,
        persistence: &dyn Persistence,
        dir: &Path,
    ) -> ZoomreelResult<PersistedRecording> {
        let Some(recording) = self.recording.as_ref() else {
            return Err(ZoomreelError::invalid_state(self.state, "persist"));
        };
        let Some(video) = recording.video.as_ref() else {
            return Err(ZoomreelError::encode(
                "recording has no finalized video to persist",
            ));
        };

        let stem = format!("recording_{}", recording.started_at_ms);
        let video_path = dir.join(format!("{stem}.{}", recording.file_extension()));
        let metadata_path = dir.join(format!("{stem}.json"));

        let metadata = recording
            .metadata()
            .to_json_value()
            .map_err(|e| ZoomreelError::persistence(&metadata_path, e.to_string()))?;

        persistence.save(&video_path, video).await?;
        persistence.save_metadata(&metadata_path, &metadata).await?;

        tracing::info!(
            video = %video_path.display(),
            metadata = %metadata_path.display(),
            "Recording persisted"
        );
        Ok(PersistedRecording {
            video_path,
            metadata_path,
        })
    }

    /// Abandon whatever is in progress and return to `Idle`.
    pub async fn discard(&mut self) {
        if self.state == SessionState::Recording {
            self.encoder.abort().await;
        }
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        self.crop = None;
        self.clock = None;
        self.timeline = None;
        self.recording = None;
        self.current_scale = MIN_SCALE;
        self.zoom_pending = false;
        self.frames_encoded = 0;
        self.set_state(SessionState::Idle);
        self.hud.send_replace(HudState::idle());
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            tracing::debug!(from = ?self.state, to = ?state, "Session state change");
        }
        self.state = state;
        self.publish_hud();
    }

    fn publish_hud(&self) {
        let timer = format_mm_ss(self.elapsed_ms());
        let state = self.state;
        let scale = self.current_scale;
        self.hud.send_modify(|hud| {
            hud.state = state;
            hud.timer = timer;
            hud.scale = scale;
        });
    }
}

fn as_capture_unavailable(e: ZoomreelError) -> ZoomreelError {
    match e {
        ZoomreelError::CaptureUnavailable { .. } => e,
        other => ZoomreelError::capture_unavailable(other.to_string()),
    }
}

fn as_encode_failure(e: ZoomreelError) -> ZoomreelError {
    match e {
        ZoomreelError::EncodeFailure { .. } => e,
        other => ZoomreelError::encode(other.to_string()),
    }
}
