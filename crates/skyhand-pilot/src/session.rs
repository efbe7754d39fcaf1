use std::sync::Arc;

use skyhand_fc::link::read_telemetry;
use skyhand_fc::{FlightError, FlightLink, FlightStateMachine, SafetyGate, SafetyThresholds, VelocityMixer, Warning};
use skyhand_input::{Action, InputSnapshot};
use skyhand_proto::{FlightState, Telemetry, VelocityCommand};
use skyhand_vision::overlay::{self, OverlayConfig, OverlayInput, View};
use skyhand_vision::fps::DEFAULT_CALC_INTERVAL;
use skyhand_vision::imaging::edge_view;
use skyhand_vision::{Detector, FpsEstimator, Frame, RenderCanvas};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::ControlConfig;
use crate::control_loop::LoopExit;

const FALLBACK_FRAME_HEIGHT: u32 = 720;

/// What the loop does after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop(LoopExit),
}

/// Everything one flight session owns: the link, the flight state and the
/// per-tick values the overlay shows. The control loop is its only mutator.
pub struct Session {
    link: Box<dyn FlightLink>,
    fsm: FlightStateMachine,
    gate: SafetyGate,
    mixer: VelocityMixer,
    detector: Detector,
    fps: FpsEstimator,
    overlay: OverlayConfig,

    telemetry: Telemetry,
    warnings: Vec<Warning>,
    command: VelocityCommand,
    active: Vec<&'static str>,
    frame: Option<Arc<Frame>>,
    /// Edge view of `frame`, built on first render after it arrives.
    edges: Option<Arc<Frame>>,
    render_failing: bool,
}

impl Session {
    pub fn new(
        link: Box<dyn FlightLink>,
        cfg: &ControlConfig,
        thresholds: SafetyThresholds,
        overlay: OverlayConfig,
        detector: Detector,
    ) -> Self {
        let gate = SafetyGate::new(thresholds);
        Self {
            link,
            fsm: FlightStateMachine::new(gate, cfg.timings(), cfg.emergency_action),
            gate,
            mixer: cfg.mixer(),
            detector,
            fps: FpsEstimator::starting_at(DEFAULT_CALC_INTERVAL, Instant::now().into_std()),
            overlay,
            telemetry: Telemetry::empty_now(),
            warnings: Vec::new(),
            command: VelocityCommand::ZERO,
            active: Vec::new(),
            frame: None,
            edges: None,
            render_failing: false,
        }
    }

    pub fn state(&self) -> FlightState {
        self.fsm.state()
    }

    pub fn gate(&self) -> &SafetyGate {
        &self.gate
    }

    pub fn link_mut(&mut self) -> &mut dyn FlightLink {
        self.link.as_mut()
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Runs one operator action. Only an unacknowledged emergency stop is an
    /// error; every other failure is logged and flight continues.
    pub async fn dispatch(&mut self, action: Action) -> Result<Flow, FlightError> {
        match action {
            Action::Takeoff => {
                if let Err(e) = self.fsm.request_takeoff(self.link.as_mut()).await {
                    warn!("takeoff: {}", e);
                }
            }
            Action::Land => {
                if let Err(e) = self.fsm.request_land(self.link.as_mut()).await {
                    warn!("land: {}", e);
                }
            }
            Action::ToggleDetector => {
                self.detector.toggle();
            }
            Action::Emergency => {
                match self.fsm.emergency(self.link.as_mut()).await {
                    Err(e @ FlightError::EmergencyTimeout(_)) => return Err(e),
                    Err(e) => warn!("emergency: {}", e),
                    Ok(_) => {}
                }
                return Ok(Flow::Stop(LoopExit::Emergency));
            }
            Action::Photo => info!("photo capture is not supported by the flight link"),
            Action::Quit => return Ok(Flow::Stop(LoopExit::Quit)),
        }
        Ok(Flow::Continue)
    }

    /// Mixes the snapshot and hands the command to the state machine, which
    /// transmits it only while flying.
    pub async fn steer(&mut self, input: &InputSnapshot) {
        self.command = self.mixer.mix(input);
        self.active = self.mixer.active_labels(input);
        if let Err(e) = self.fsm.tick(self.link.as_mut(), self.command).await {
            warn!("{}", e);
        }
    }

    pub async fn refresh_telemetry(&mut self) {
        self.telemetry = read_telemetry(self.link.as_mut()).await;
        self.warnings = self.gate.warnings(self.telemetry.battery_percent, self.telemetry.temperature_c);
    }

    pub fn on_frame(&mut self, frame: Arc<Frame>) {
        self.fps.update_at(Instant::now().into_std());
        self.detector.process(&frame);
        self.frame = Some(frame);
        self.edges = None;
    }

    /// Renders both views onto `canvas`. Canvas failures are logged once
    /// per outage.
    pub fn render(&mut self, canvas: &mut dyn RenderCanvas) {
        if self.edges.is_none() {
            self.edges = self.frame.as_deref().map(|f| Arc::new(edge_view(f)));
        }
        let input = OverlayInput {
            state: self.fsm.state(),
            telemetry: &self.telemetry,
            thermal: self.telemetry.temperature_c.map(|t| self.gate.thermal_level(t)),
            warnings: &self.warnings,
            detection: self.detector.state(),
            detections: self.detector.detections(),
            active_controls: &self.active,
            command: self.command,
            fps: self.fps.rate(),
            frame_height: self.frame.as_ref().map_or(FALLBACK_FRAME_HEIGHT, |f| f.height()),
        };
        let mut result = Ok(());
        for view in [View::Primary, View::Derived] {
            let frame = match view {
                View::Primary => self.frame.as_deref(),
                View::Derived => self.edges.as_deref(),
            };
            let draw = overlay::render(&self.overlay, &input, view);
            result = result.and_then(|_| canvas.submit(view, frame, &draw));
        }
        match result {
            Ok(()) if self.render_failing => {
                info!("display recovered");
                self.render_failing = false;
            }
            Ok(()) => {}
            Err(e) if !self.render_failing => {
                warn!("display: {:#}", e);
                self.render_failing = true;
            }
            Err(_) => {}
        }
    }

    /// Brings the vehicle down if it is not grounded, then releases the
    /// video stream. Fails only if the emergency stop went unacknowledged.
    pub async fn shutdown(&mut self) -> Result<(), FlightError> {
        let mut result = Ok(());
        let state = self.fsm.state();
        if state.is_airborne() {
            warn!("shutting down while {}: running emergency sequence", state);
            match self.fsm.emergency(self.link.as_mut()).await {
                Err(e @ FlightError::EmergencyTimeout(_)) => result = Err(e),
                Err(e) => warn!("shutdown emergency: {}", e),
                Ok(_) => {}
            }
        }
        self.command = VelocityCommand::ZERO;
        if let Err(e) = self.link.streamoff().await {
            warn!("streamoff: {}", e);
        }
        info!("session closed");
        result
    }
}
