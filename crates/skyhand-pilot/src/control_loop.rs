use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use skyhand_fc::FlightError;
use skyhand_input::InputAdapter;
use skyhand_vision::{FrameFeed, RenderCanvas};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::ControlConfig;
use crate::session::{Flow, Session};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Quit,
    Emergency,
    Cancelled,
    /// The loop body panicked; shutdown still ran.
    Panicked,
}

/// Fixed-rate operator loop: poll input, dispatch actions, transmit, refresh
/// telemetry, take the latest frame and render.
pub struct ControlLoop<'a> {
    session: &'a mut Session,
    input: &'a mut dyn InputAdapter,
    canvas: &'a mut dyn RenderCanvas,
    frames: Option<FrameFeed>,
    cfg: ControlConfig,
}

impl<'a> ControlLoop<'a> {
    pub fn new(
        session: &'a mut Session,
        input: &'a mut dyn InputAdapter,
        canvas: &'a mut dyn RenderCanvas,
        frames: Option<FrameFeed>,
        cfg: ControlConfig,
    ) -> Self {
        Self { session, input, canvas, frames, cfg }
    }

    /// Runs until quit, emergency, cancellation or a panic in the loop body.
    /// Shutdown runs on every one of those paths. The only error is an
    /// emergency stop that went unacknowledged.
    pub async fn run(self, cancel: CancellationToken) -> Result<LoopExit, FlightError> {
        let Self { session, input, canvas, frames, cfg } = self;
        info!(
            "control loop: {} every {:?}",
            input.describe(),
            cfg.command_interval()
        );

        let body = drive(&mut *session, &mut *input, &mut *canvas, frames, &cfg, &cancel);
        let outcome = match AssertUnwindSafe(body).catch_unwind().await {
            Ok(r) => r,
            Err(_) => {
                error!("control loop panicked; shutting down");
                Ok(LoopExit::Panicked)
            }
        };

        let shutdown = session.shutdown().await;
        canvas.release();

        match (outcome, shutdown) {
            (Err(e), _) | (Ok(_), Err(e)) => {
                error!("{}; the vehicle may still be airborne", e);
                Err(e)
            }
            (Ok(exit), Ok(())) => {
                info!("control loop stopped: {:?}", exit);
                Ok(exit)
            }
        }
    }
}

async fn drive(
    session: &mut Session,
    input: &mut dyn InputAdapter,
    canvas: &mut dyn RenderCanvas,
    mut frames: Option<FrameFeed>,
    cfg: &ControlConfig,
    cancel: &CancellationToken,
) -> Result<LoopExit, FlightError> {
    let mut ticker = interval(cfg.command_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut next_telemetry = Instant::now();
    let mut next_render = Instant::now();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(LoopExit::Cancelled),
            _ = ticker.tick() => {}
        }

        let snapshot = input.poll();
        for action in &snapshot.actions {
            debug!("action {:?} in {}", action, session.state());
            if let Flow::Stop(exit) = session.dispatch(*action).await? {
                return Ok(exit);
            }
        }

        session.steer(&snapshot).await;

        let now = Instant::now();
        if now >= next_telemetry {
            session.refresh_telemetry().await;
            next_telemetry = now + cfg.telemetry_interval();
        }

        if let Some(feed) = frames.as_mut() {
            if feed.has_changed().unwrap_or(false) {
                let latest = feed.borrow_and_update().clone();
                if let Some(frame) = latest {
                    session.on_frame(frame);
                }
            }
        }

        if now >= next_render {
            session.render(canvas);
            next_render = now + cfg.render_interval();
        }
    }
}
