use std::time::Duration;

use serde::Deserialize;
use skyhand_proto::{FlightState, VelocityCommand};
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::link::{FlightLink, LinkError};
use crate::safety::{Refusal, SafetyGate, Verdict};

/// What the emergency sequence sends after the zero command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmergencyAction {
    /// Immediate land. The vehicle descends under control.
    Land,
    /// Motor cut. The vehicle drops.
    CutMotors,
}

impl Default for EmergencyAction {
    fn default() -> Self {
        EmergencyAction::Land
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FlightTimings {
    pub takeoff_timeout: Duration,
    pub land_timeout: Duration,
    /// Hover pause between the zero command and `land`.
    pub stop_pause: Duration,
    /// Wait after a failed `land` before assuming the vehicle is down.
    pub land_settle: Duration,
    pub emergency_timeout: Duration,
}

impl Default for FlightTimings {
    fn default() -> Self {
        Self {
            takeoff_timeout: Duration::from_secs(7),
            land_timeout: Duration::from_secs(7),
            stop_pause: Duration::from_millis(500),
            land_settle: Duration::from_secs(3),
            emergency_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NoOp,
    /// The tick's command went out to the vehicle.
    Transmitted,
    Changed { from: FlightState, to: FlightState },
}

#[derive(Debug, Error)]
pub enum FlightError {
    #[error("flight refused: {0}")]
    Refused(#[from] Refusal),
    #[error("{op} failed: {source}")]
    Command {
        op: &'static str,
        #[source]
        source: LinkError,
    },
    #[error("emergency stop not acknowledged within {0:?}")]
    EmergencyTimeout(Duration),
}

impl FlightError {
    fn command(op: &'static str, source: LinkError) -> Self {
        FlightError::Command { op, source }
    }
}

/// Sole owner of the flight state. Every state change goes through one of
/// the request methods; every (state, request) pair has a defined outcome.
pub struct FlightStateMachine {
    state: FlightState,
    gate: SafetyGate,
    timings: FlightTimings,
    emergency_action: EmergencyAction,
}

impl FlightStateMachine {
    pub fn new(gate: SafetyGate, timings: FlightTimings, emergency_action: EmergencyAction) -> Self {
        Self { state: FlightState::Grounded, gate, timings, emergency_action }
    }

    pub fn state(&self) -> FlightState {
        self.state
    }

    fn enter(&mut self, next: FlightState) -> FlightState {
        let prev = std::mem::replace(&mut self.state, next);
        if prev != next {
            debug!("flight state {:?} -> {:?}", prev, next);
        }
        prev
    }

    /// Grounded → TakingOff → Flying, behind the preflight gate. A refused
    /// gate sends nothing to the vehicle.
    pub async fn request_takeoff(&mut self, link: &mut dyn FlightLink) -> Result<Outcome, FlightError> {
        if self.state != FlightState::Grounded {
            debug!("takeoff ignored in {:?}", self.state);
            return Ok(Outcome::NoOp);
        }

        let battery = link.get_battery().await.map_err(|e| warn!("preflight battery read failed: {}", e)).ok();
        let temperature = link.get_temperature().await.map_err(|e| warn!("preflight temperature read failed: {}", e)).ok();

        if let Verdict::Refuse(r) = self.gate.check_flight_ready(battery, temperature) {
            warn!("takeoff refused: {}", r);
            return Err(r.into());
        }
        for w in self.gate.warnings(battery, temperature) {
            warn!("preflight: {}", w);
        }

        let from = self.enter(FlightState::TakingOff);
        info!("taking off (may take up to {:?})", self.timings.takeoff_timeout);

        let res = match timeout(self.timings.takeoff_timeout, link.takeoff()).await {
            Ok(r) => r,
            Err(_) => Err(LinkError::Timeout { op: "takeoff".into(), after: self.timings.takeoff_timeout }),
        };
        match res {
            Ok(()) => {
                self.enter(FlightState::Flying);
                info!("airborne");
                Ok(Outcome::Changed { from, to: FlightState::Flying })
            }
            Err(e) => {
                self.enter(FlightState::Grounded);
                warn!("takeoff failed: {}; check surface, lighting and propellers", e);
                Err(FlightError::command("takeoff", e))
            }
        }
    }

    /// Flying → Landing → Grounded. A failed `land` still ends Grounded
    /// after the settle delay: the vehicle usually lands regardless.
    pub async fn request_land(&mut self, link: &mut dyn FlightLink) -> Result<Outcome, FlightError> {
        if self.state != FlightState::Flying {
            debug!("land ignored in {:?}", self.state);
            return Ok(Outcome::NoOp);
        }

        if let Err(e) = link.set_velocity(VelocityCommand::ZERO).await {
            warn!("stop command before landing failed: {}", e);
        }
        let from = self.enter(FlightState::Landing);
        info!("landing");
        sleep(self.timings.stop_pause).await;

        let res = match timeout(self.timings.land_timeout, link.land()).await {
            Ok(r) => r,
            Err(_) => Err(LinkError::Timeout { op: "land".into(), after: self.timings.land_timeout }),
        };
        match res {
            Ok(()) => {
                self.enter(FlightState::Grounded);
                info!("landed");
                Ok(Outcome::Changed { from, to: FlightState::Grounded })
            }
            Err(e) => {
                warn!("land failed: {}; vehicle may have landed anyway", e);
                sleep(self.timings.land_settle).await;
                self.enter(FlightState::Grounded);
                Err(FlightError::command("land", e))
            }
        }
    }

    /// From any state: one zero command, one stop instruction, then
    /// Grounded whether or not the vehicle acknowledged in time.
    pub async fn emergency(&mut self, link: &mut dyn FlightLink) -> Result<Outcome, FlightError> {
        let from = self.enter(FlightState::Emergency);
        let action = self.emergency_action;
        warn!("EMERGENCY: stopping ({:?})", action);

        let sequence = async {
            if let Err(e) = link.set_velocity(VelocityCommand::ZERO).await {
                warn!("emergency zero command failed: {}", e);
            }
            match action {
                EmergencyAction::Land => link.land().await,
                EmergencyAction::CutMotors => link.emergency_stop().await,
            }
        };
        let res = timeout(self.timings.emergency_timeout, sequence).await;
        self.enter(FlightState::Grounded);

        match res {
            Ok(Ok(())) => {
                info!("emergency stop complete");
                Ok(Outcome::Changed { from, to: FlightState::Grounded })
            }
            Ok(Err(e)) => {
                warn!("emergency stop failed: {}; manual intervention may be required", e);
                Err(FlightError::command("emergency stop", e))
            }
            Err(_) => Err(FlightError::EmergencyTimeout(self.timings.emergency_timeout)),
        }
    }

    /// Per-tick RC transmission. Only while Flying; the vehicle treats a gap
    /// in commands as a fault, so this is never skipped when airborne.
    pub async fn tick(&mut self, link: &mut dyn FlightLink, cmd: VelocityCommand) -> Result<Outcome, FlightError> {
        if self.state != FlightState::Flying {
            return Ok(Outcome::NoOp);
        }
        link.set_velocity(cmd).await.map_err(|e| FlightError::command("set_velocity", e))?;
        Ok(Outcome::Transmitted)
    }
}
