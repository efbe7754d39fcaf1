pub mod canvas;
pub mod detector;
#[cfg(feature = "face-detect")]
pub mod face;
pub mod fps;
pub mod frames;
pub mod imaging;
pub mod overlay;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use canvas::{HeadlessCanvas, RenderCanvas};
pub use detector::{DetectionState, Detector};
pub use fps::FpsEstimator;
pub use frames::{spawn_frame_task, BlankFrames, FfmpegFrames, Frame, FrameError, FrameFeed, FrameSource};
pub use overlay::{Color, DrawInstruction, DrawKind, OverlayConfig, OverlayInput, View};

/// One located object, in frame pixels. `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

/// Finds objects of interest in a frame. Runs on the control loop task.
pub trait ObjectLocator {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    fn name(&self) -> &str;
}

/// `[detector]` section. Without a `model` no locator is loaded.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// SeetaFace frontal cascade, e.g. `seeta_fd_frontal_v1.0.bin`.
    pub model: Option<String>,
    pub min_face_size: u32,
    pub score_threshold: f64,
    pub pyramid_scale: f32,
    pub window_step: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self { model: None, min_face_size: 30, score_threshold: 2.0, pyramid_scale: 0.8, window_step: 4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoSourceKind {
    /// Decode the vehicle stream with an external `ffmpeg`.
    Ffmpeg,
    /// Black frames at a fixed rate.
    Blank,
    /// No video at all.
    Off,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub source: VideoSourceKind,
    pub ffmpeg: String,
    /// Where the vehicle sends its H.264 stream once `streamon` succeeds.
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Rate of the blank source.
    pub blank_fps: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            source: VideoSourceKind::Ffmpeg,
            ffmpeg: "ffmpeg".into(),
            url: "udp://0.0.0.0:11111".into(),
            width: 960,
            height: 720,
            blank_fps: 30,
        }
    }
}
