//! Zoomreel Capture Engine
//!
//! Orchestrates the interactive phase of a recording: region selection,
//! the countdown, and the live loop that forwards captured frames to the
//! realtime encoder while sampling pointer and zoom input into the
//! keyframe store.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  CaptureSession                  │
//! │  ┌──────────────┐ ┌─────────────┐ ┌────────────┐ │
//! │  │ FrameStream  │ │ 30 Hz       │ │ Trigger    │ │
//! │  │ (host)       │ │ sampler     │ │ actions    │ │
//! │  └──────┬───────┘ └──────┬──────┘ └─────┬──────┘ │
//! │         ▼                ▼              │        │
//! │  ┌──────────────┐ ┌─────────────┐       │        │
//! │  │ Encoder      │ │ Timeline    │◄──────┘        │
//! │  │ (host)       │ │ (keyframes) │                │
//! │  └──────────────┘ └─────────────┘                │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod session;

pub use session::*;
