//! Export driver behaviour against in-memory sources and encoders.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};

use zoomreel_common::error::{ZoomreelError, ZoomreelResult};
use zoomreel_platform_core::{Encoder, EncoderSettings, Frame, SeekableSource};
use zoomreel_project_model::{CropRegion, LogicalPoint, Timeline};
use zoomreel_render_engine::{ExportDriver, ExportProgress, ExportSettings, ExportStage};

/// Source whose frame encodes the seek target in its red channel.
struct FakeSource {
    duration_ms: u64,
    seeks: Vec<f64>,
    stall_at: Option<usize>,
    gradient: bool,
    frame: Option<Frame>,
}

impl FakeSource {
    fn new(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            seeks: Vec::new(),
            stall_at: None,
            gradient: false,
            frame: None,
        }
    }
}

#[async_trait]
impl SeekableSource for FakeSource {
    fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn frame_size(&self) -> (u32, u32) {
        (16, 12)
    }

    async fn seek(&mut self, time_secs: f64) -> ZoomreelResult<()> {
        let index = self.seeks.len();
        self.seeks.push(time_secs);
        if self.stall_at == Some(index) {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        let frame = if self.gradient {
            RgbaImage::from_fn(16, 12, |x, y| Rgba([(x * 16) as u8, (y * 16) as u8, 0, 255]))
        } else {
            let shade = (index % 256) as u8;
            RgbaImage::from_pixel(16, 12, Rgba([shade, 0, 0, 255]))
        };
        self.frame = Some(frame);
        Ok(())
    }

    fn current_frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }
}

#[derive(Debug, Default)]
struct EncoderLog {
    settings: Option<EncoderSettings>,
    frames: Vec<u8>,
    /// Red and green of output pixel (1, 2) per pushed frame.
    near_corner: Vec<[u8; 2]>,
    stopped: bool,
    aborted: bool,
}

#[derive(Default)]
struct FakeEncoder {
    log: Arc<Mutex<EncoderLog>>,
    fail_on_frame: Option<usize>,
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn start(&mut self, settings: &EncoderSettings) -> ZoomreelResult<()> {
        self.log.lock().unwrap().settings = Some(settings.clone());
        Ok(())
    }

    async fn push_frame(&mut self, frame: &Frame) -> ZoomreelResult<()> {
        let mut log = self.log.lock().unwrap();
        if self.fail_on_frame == Some(log.frames.len()) {
            return Err(ZoomreelError::encode("disk full"));
        }
        let (w, h) = frame.dimensions();
        log.frames.push(frame.get_pixel(w / 2, h / 2).0[0]);
        let [r, g, ..] = frame.get_pixel(1, 2).0;
        log.near_corner.push([r, g]);
        Ok(())
    }

    async fn stop(&mut self) -> ZoomreelResult<Vec<u8>> {
        let mut log = self.log.lock().unwrap();
        log.stopped = true;
        Ok(vec![log.frames.len() as u8])
    }

    async fn abort(&mut self) {
        self.log.lock().unwrap().aborted = true;
    }
}

fn timeline() -> Timeline {
    // Crop covers the whole 16x12 source.
    let mut timeline = Timeline::new(CropRegion::new(0.0, 0.0, 16.0, 12.0));
    timeline.insert(1000, LogicalPoint::new(8.0, 6.0), 2.0);
    timeline
}

#[tokio::test(start_paused = true)]
async fn test_two_second_source_yields_61_frames() {
    let log = Arc::new(Mutex::new(EncoderLog::default()));
    let mut encoder = FakeEncoder {
        log: log.clone(),
        ..Default::default()
    };
    let mut source = FakeSource::new(2000);
    let mut driver = ExportDriver::new(ExportSettings::default());

    let outcome = driver
        .run(&mut source, &mut encoder, &timeline())
        .await
        .unwrap();

    assert_eq!(outcome.frames_rendered, 61);
    assert_eq!(outcome.seek_timeouts, 0);
    assert_eq!((outcome.width, outcome.height), (16, 12));
    assert_eq!(outcome.bytes, vec![61]);
    assert_eq!(driver.job().stage, ExportStage::Complete);

    assert_eq!(source.seeks.len(), 61);
    for (i, secs) in source.seeks.iter().enumerate() {
        let expected = (i as u64 * 1000) as f64 / 30.0 / 1000.0;
        assert_eq!(*secs, expected, "seek {i}");
    }
    assert_eq!(*source.seeks.last().unwrap(), 2.0);

    // Every pushed frame came from its own seek.
    let log = log.lock().unwrap();
    let expected: Vec<u8> = (0..61).collect();
    assert_eq!(log.frames, expected);
    assert!(log.stopped);
    assert!(!log.aborted);
    assert_eq!(log.settings.as_ref().unwrap().fps, 30);
}

#[tokio::test(start_paused = true)]
async fn test_each_step_renders_zoom_at_its_time() {
    let log = Arc::new(Mutex::new(EncoderLog::default()));
    let mut encoder = FakeEncoder {
        log: log.clone(),
        ..Default::default()
    };
    let mut source = FakeSource::new(2000);
    source.gradient = true;
    let mut driver = ExportDriver::new(ExportSettings::default());

    driver
        .run(&mut source, &mut encoder, &timeline())
        .await
        .unwrap();

    // Source pixel (x, y) carries [x * 16, y * 16]; output pixel (1, 2)
    // samples deeper into the frame as the zoom grows toward 2x at 1000 ms.
    let log = log.lock().unwrap();
    assert_eq!(log.near_corner.len(), 61);
    assert_eq!(log.near_corner[0], [16, 32]); // 1.0x: source (1, 2)
    assert_eq!(log.near_corner[15], [48, 48]); // 1.5x: source (3, 3)
    assert_eq!(log.near_corner[30], [64, 64]); // 2.0x: source (4, 4)
    assert_eq!(log.near_corner[60], [64, 64]); // held after the last keyframe
}

#[tokio::test(start_paused = true)]
async fn test_stalled_seek_is_counted_and_export_continues() {
    let log = Arc::new(Mutex::new(EncoderLog::default()));
    let mut encoder = FakeEncoder {
        log: log.clone(),
        ..Default::default()
    };
    let mut source = FakeSource::new(1000);
    source.stall_at = Some(5);
    let mut driver = ExportDriver::new(ExportSettings::default());

    let outcome = driver
        .run(&mut source, &mut encoder, &timeline())
        .await
        .unwrap();

    assert_eq!(outcome.frames_rendered, 31);
    assert_eq!(outcome.seek_timeouts, 1);
    assert!(outcome.elapsed >= Duration::from_millis(800));

    // The timed-out step reuses the previous frame.
    let log = log.lock().unwrap();
    assert_eq!(log.frames[5], 4);
    assert_eq!(log.frames[6], 6);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_aborts_encoder_and_discards_output() {
    let log = Arc::new(Mutex::new(EncoderLog::default()));
    let mut encoder = FakeEncoder {
        log: log.clone(),
        ..Default::default()
    };
    let mut source = FakeSource::new(2000);
    let driver = ExportDriver::new(ExportSettings::default());
    let cancel = driver.cancel_flag();
    let mut driver = driver.with_progress(Box::new(move |p: ExportProgress| {
        if p.frames_rendered == 10 {
            cancel.store(true, Ordering::Relaxed);
        }
    }));

    let err = driver
        .run(&mut source, &mut encoder, &timeline())
        .await
        .unwrap_err();

    assert!(matches!(err, ZoomreelError::ExportAborted { .. }));
    assert_eq!(driver.job().stage, ExportStage::Failed);
    let log = log.lock().unwrap();
    assert_eq!(log.frames.len(), 10);
    assert!(log.aborted);
    assert!(!log.stopped);
}

#[tokio::test(start_paused = true)]
async fn test_encoder_failure_marks_job_failed() {
    let log = Arc::new(Mutex::new(EncoderLog::default()));
    let mut encoder = FakeEncoder {
        log: log.clone(),
        fail_on_frame: Some(3),
    };
    let mut source = FakeSource::new(2000);
    let mut driver = ExportDriver::new(ExportSettings::default());

    let err = driver
        .run(&mut source, &mut encoder, &timeline())
        .await
        .unwrap_err();

    assert!(matches!(err, ZoomreelError::EncodeFailure { .. }));
    assert_eq!(driver.job().stage, ExportStage::Failed);
    assert!(log.lock().unwrap().aborted);
}

#[tokio::test(start_paused = true)]
async fn test_progress_reports_every_stage() {
    let reports = Arc::new(Mutex::new(Vec::<ExportProgress>::new()));
    let sink = reports.clone();
    let mut driver = ExportDriver::new(ExportSettings {
        output_size: Some((32, 24)),
        ..ExportSettings::default()
    })
    .with_progress(Box::new(move |p: ExportProgress| sink.lock().unwrap().push(p)));

    let mut source = FakeSource::new(100);
    let mut encoder = FakeEncoder::default();
    let outcome = driver
        .run(&mut source, &mut encoder, &timeline())
        .await
        .unwrap();
    assert_eq!((outcome.width, outcome.height), (32, 24));

    let reports = reports.lock().unwrap();
    assert_eq!(reports.first().unwrap().stage, ExportStage::Initializing);
    assert!(reports.iter().any(|p| p.stage == ExportStage::Finalizing));
    let last = reports.last().unwrap();
    assert_eq!(last.stage, ExportStage::Complete);
    assert_eq!(last.progress, 1.0);
    assert_eq!(last.total_frames, 4);

    let rendering: Vec<u64> = reports
        .iter()
        .filter(|p| p.stage == ExportStage::Rendering)
        .map(|p| p.frames_rendered)
        .collect();
    assert_eq!(rendering, vec![1, 2, 3, 4]);
}
