use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::VideoConfig;

const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame unavailable: {0}")]
    Unavailable(String),
}

/// One decoded video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub seq: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[async_trait]
pub trait FrameSource: Send {
    /// Waits for the next frame.
    async fn next_frame(&mut self) -> Result<Frame, FrameError>;

    /// Releases whatever produces the frames.
    async fn close(&mut self) {}

    fn describe(&self) -> String;
}

/// Latest-frame handoff from the frame task to the control loop.
pub type FrameFeed = watch::Receiver<Option<Arc<Frame>>>;

/// Runs `source` on its own task until `cancel` fires, publishing each frame
/// as the latest. A failing source is retried; consumers keep the previous
/// frame meanwhile.
pub fn spawn_frame_task(mut source: Box<dyn FrameSource>, cancel: CancellationToken) -> (FrameFeed, JoinHandle<()>) {
    let (tx, rx) = watch::channel(None);
    let handle = tokio::spawn(async move {
        info!("video: {}", source.describe());
        let mut failing = false;
        loop {
            let res = tokio::select! {
                _ = cancel.cancelled() => break,
                r = source.next_frame() => r,
            };
            match res {
                Ok(frame) => {
                    if failing {
                        info!("video recovered");
                        failing = false;
                    }
                    if tx.send(Some(Arc::new(frame))).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    if !failing {
                        warn!("{}; keeping last frame", e);
                        failing = true;
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }
        source.close().await;
        debug!("frame task stopped");
    });
    (rx, handle)
}

/// Decodes the vehicle's stream with an external `ffmpeg` emitting raw RGB
/// frames on stdout. The process is restarted after it exits.
pub struct FfmpegFrames {
    cfg: VideoConfig,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    seq: u64,
    buf: Vec<u8>,
}

impl FfmpegFrames {
    pub fn new(cfg: VideoConfig) -> Self {
        let size = cfg.width as usize * cfg.height as usize * 3;
        Self { cfg, child: None, stdout: None, seq: 0, buf: vec![0; size] }
    }

    fn spawn(&mut self) -> Result<(), FrameError> {
        let mut cmd = Command::new(&self.cfg.ffmpeg);
        cmd.args([
            "-hide_banner", "-loglevel", "error",
            "-fflags", "nobuffer",
            "-flags", "low_delay",
            "-i", &self.cfg.url,
            "-vf", &format!("scale={}:{}", self.cfg.width, self.cfg.height),
            "-pix_fmt", "rgb24",
            "-f", "rawvideo",
            "-",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

        debug!("video: spawning {} for {}", self.cfg.ffmpeg, self.cfg.url);
        let mut child = cmd
            .spawn()
            .map_err(|e| FrameError::Unavailable(format!("run {}: {}", self.cfg.ffmpeg, e)))?;
        self.stdout = child.stdout.take();
        self.child = Some(child);
        Ok(())
    }

    async fn stop(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                debug!("video: kill ffmpeg: {}", e);
            }
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegFrames {
    async fn next_frame(&mut self) -> Result<Frame, FrameError> {
        if self.stdout.is_none() {
            self.spawn()?;
        }
        let Some(stdout) = self.stdout.as_mut() else {
            return Err(FrameError::Unavailable("ffmpeg stdout not captured".into()));
        };
        let read = stdout.read_exact(&mut self.buf).await;
        if let Err(e) = read {
            self.stop().await;
            return Err(FrameError::Unavailable(format!("video stream ended: {}", e)));
        }

        let image = RgbImage::from_raw(self.cfg.width, self.cfg.height, self.buf.clone())
            .ok_or_else(|| FrameError::Unavailable("short frame".into()))?;
        self.seq += 1;
        Ok(Frame { seq: self.seq, image })
    }

    async fn close(&mut self) {
        self.stop().await;
    }

    fn describe(&self) -> String {
        format!("ffmpeg {} ({}x{})", self.cfg.url, self.cfg.width, self.cfg.height)
    }
}

/// Black frames at a fixed rate.
pub struct BlankFrames {
    width: u32,
    height: u32,
    ticker: Interval,
    seq: u64,
}

impl BlankFrames {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { width, height, ticker, seq: 0 }
    }
}

#[async_trait]
impl FrameSource for BlankFrames {
    async fn next_frame(&mut self) -> Result<Frame, FrameError> {
        self.ticker.tick().await;
        self.seq += 1;
        Ok(Frame { seq: self.seq, image: RgbImage::new(self.width, self.height) })
    }

    fn describe(&self) -> String {
        format!("blank {}x{}", self.width, self.height)
    }
}
