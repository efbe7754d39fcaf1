use std::future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use skyhand_proto::VelocityCommand;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::link::{FlightLink, LinkError};

/// One recorded call on a [`SimLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCall {
    Connect,
    GetBattery,
    GetTemperature,
    GetHeight,
    GetFlightTime,
    StreamOn,
    StreamOff,
    Takeoff,
    Land,
    EmergencyStop,
    SetVelocity(VelocityCommand),
}

impl LinkCall {
    /// Calls that move the vehicle.
    pub fn is_motion(&self) -> bool {
        matches!(self, LinkCall::Takeoff | LinkCall::Land | LinkCall::EmergencyStop | LinkCall::SetVelocity(_))
    }
}

/// Shared view of the calls made on a [`SimLink`]. Stays valid after the
/// link itself has been moved into a session.
#[derive(Debug, Clone, Default)]
pub struct SimJournal {
    calls: Arc<Mutex<Vec<LinkCall>>>,
}

impl SimJournal {
    fn push(&self, call: LinkCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<LinkCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    pub fn count(&self, call: LinkCall) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }
}

/// Failures to inject. Each flag makes the matching call fail until cleared.
#[derive(Debug, Clone, Default)]
pub struct SimFaults {
    pub connect: bool,
    pub takeoff: bool,
    pub land: bool,
    pub set_velocity: bool,
    pub streamon: bool,
    /// Every sensor query fails.
    pub telemetry: bool,
    /// `land` never completes.
    pub hang_land: bool,
}

/// Starting condition of the simulated vehicle.
#[derive(Debug, Clone)]
pub struct SimVehicle {
    pub battery: f32,
    pub temperature_c: i32,
    /// Random ± spread added to every temperature reading.
    pub temperature_jitter: i32,
    /// Battery percent lost per second airborne.
    pub drain_per_s: f32,
    /// How long takeoff and land take to complete.
    pub maneuver_time: Duration,
}

impl SimVehicle {
    /// Deterministic vehicle: no drain, no jitter, instant maneuvers.
    pub fn calm() -> Self {
        Self {
            battery: 80.0,
            temperature_c: 45,
            temperature_jitter: 0,
            drain_per_s: 0.0,
            maneuver_time: Duration::ZERO,
        }
    }
}

impl Default for SimVehicle {
    fn default() -> Self {
        Self {
            battery: 87.0,
            temperature_c: 52,
            temperature_jitter: 2,
            drain_per_s: 0.15,
            maneuver_time: Duration::from_millis(1_500),
        }
    }
}

/// cm/s of climb at full vertical command.
const CLIMB_RATE: f32 = 100.0;
const TAKEOFF_HEIGHT_CM: f32 = 80.0;

/// In-memory vehicle behind the [`FlightLink`] trait.
pub struct SimLink {
    vehicle: SimVehicle,
    faults: SimFaults,
    journal: SimJournal,

    streaming: bool,
    airborne_since: Option<Instant>,
    flight_time: Duration,
    height_cm: f32,
    vertical: i32,
    last_update: Instant,
}

impl SimLink {
    pub fn new(vehicle: SimVehicle) -> Self {
        Self {
            vehicle,
            faults: SimFaults::default(),
            journal: SimJournal::default(),
            streaming: false,
            airborne_since: None,
            flight_time: Duration::ZERO,
            height_cm: 0.0,
            vertical: 0,
            last_update: Instant::now(),
        }
    }

    pub fn with_faults(mut self, faults: SimFaults) -> Self {
        self.faults = faults;
        self
    }

    pub fn journal(&self) -> SimJournal {
        self.journal.clone()
    }

    pub fn faults_mut(&mut self) -> &mut SimFaults {
        &mut self.faults
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn is_airborne(&self) -> bool {
        self.airborne_since.is_some()
    }

    /// Advances battery drain and height to now.
    fn advance(&mut self) {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        if self.airborne_since.is_none() {
            return;
        }
        self.vehicle.battery = (self.vehicle.battery - self.vehicle.drain_per_s * dt).max(0.0);
        self.height_cm = (self.height_cm + self.vertical as f32 / 100.0 * CLIMB_RATE * dt).max(0.0);
    }

    fn touch_down(&mut self) {
        self.advance();
        if let Some(since) = self.airborne_since.take() {
            self.flight_time += since.elapsed();
        }
        self.height_cm = 0.0;
        self.vertical = 0;
    }

    fn sensor(&mut self, call: LinkCall, what: &'static str) -> Result<(), LinkError> {
        self.journal.push(call);
        self.advance();
        if self.faults.telemetry {
            return Err(LinkError::NoTelemetry(what));
        }
        Ok(())
    }
}

fn rejected(op: &str) -> LinkError {
    LinkError::Rejected { op: op.into(), reply: "error (injected)".into() }
}

#[async_trait]
impl FlightLink for SimLink {
    async fn connect(&mut self) -> Result<(), LinkError> {
        self.journal.push(LinkCall::Connect);
        if self.faults.connect {
            return Err(LinkError::Timeout { op: "command".into(), after: Duration::from_secs(7) });
        }
        info!("sim vehicle connected");
        Ok(())
    }

    async fn get_battery(&mut self) -> Result<u8, LinkError> {
        self.sensor(LinkCall::GetBattery, "battery")?;
        Ok(self.vehicle.battery.round().clamp(0.0, 100.0) as u8)
    }

    async fn get_temperature(&mut self) -> Result<i32, LinkError> {
        self.sensor(LinkCall::GetTemperature, "temperature")?;
        let j = self.vehicle.temperature_jitter.abs();
        let noise = if j == 0 { 0 } else { rand::thread_rng().gen_range(-j..=j) };
        Ok(self.vehicle.temperature_c + noise)
    }

    async fn get_height(&mut self) -> Result<i32, LinkError> {
        self.sensor(LinkCall::GetHeight, "height")?;
        Ok(self.height_cm.round() as i32)
    }

    async fn get_flight_time(&mut self) -> Result<u32, LinkError> {
        self.sensor(LinkCall::GetFlightTime, "flight time")?;
        let current = self.airborne_since.map(|s| s.elapsed()).unwrap_or_default();
        Ok((self.flight_time + current).as_secs() as u32)
    }

    async fn streamon(&mut self) -> Result<(), LinkError> {
        self.journal.push(LinkCall::StreamOn);
        if self.faults.streamon {
            return Err(rejected("streamon"));
        }
        self.streaming = true;
        Ok(())
    }

    async fn streamoff(&mut self) -> Result<(), LinkError> {
        self.journal.push(LinkCall::StreamOff);
        self.streaming = false;
        Ok(())
    }

    async fn takeoff(&mut self) -> Result<(), LinkError> {
        self.journal.push(LinkCall::Takeoff);
        if self.faults.takeoff {
            return Err(rejected("takeoff"));
        }
        sleep(self.vehicle.maneuver_time).await;
        self.advance();
        self.airborne_since = Some(Instant::now());
        self.height_cm = TAKEOFF_HEIGHT_CM;
        debug!("sim vehicle airborne");
        Ok(())
    }

    async fn land(&mut self) -> Result<(), LinkError> {
        self.journal.push(LinkCall::Land);
        if self.faults.hang_land {
            return future::pending().await;
        }
        if self.faults.land {
            return Err(rejected("land"));
        }
        sleep(self.vehicle.maneuver_time).await;
        self.touch_down();
        debug!("sim vehicle landed");
        Ok(())
    }

    async fn emergency_stop(&mut self) -> Result<(), LinkError> {
        self.journal.push(LinkCall::EmergencyStop);
        self.touch_down();
        Ok(())
    }

    async fn set_velocity(&mut self, cmd: VelocityCommand) -> Result<(), LinkError> {
        self.journal.push(LinkCall::SetVelocity(cmd));
        if self.faults.set_velocity {
            return Err(rejected("rc"));
        }
        self.advance();
        self.vertical = cmd.vertical();
        Ok(())
    }

    fn describe(&self) -> String {
        "simulated vehicle".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn battery_drains_only_while_airborne() {
        let mut link = SimLink::new(SimVehicle { battery: 50.0, drain_per_s: 1.0, ..SimVehicle::calm() });
        sleep(Duration::from_secs(10)).await;
        assert_eq!(link.get_battery().await.unwrap(), 50);

        link.takeoff().await.unwrap();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(link.get_battery().await.unwrap(), 40);
        assert_eq!(link.get_flight_time().await.unwrap(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn height_follows_vertical_command() {
        let mut link = SimLink::new(SimVehicle::calm());
        link.takeoff().await.unwrap();
        assert_eq!(link.get_height().await.unwrap(), 80);

        link.set_velocity(VelocityCommand::new(0, 0, 50, 0)).await.unwrap();
        sleep(Duration::from_secs(2)).await;
        assert_eq!(link.get_height().await.unwrap(), 180);

        link.land().await.unwrap();
        assert_eq!(link.get_height().await.unwrap(), 0);
        assert!(!link.is_airborne());
    }

    #[tokio::test]
    async fn injected_faults_surface_as_errors() {
        let mut link = SimLink::new(SimVehicle::calm()).with_faults(SimFaults {
            telemetry: true,
            connect: true,
            ..SimFaults::default()
        });
        assert!(link.connect().await.is_err());
        assert!(matches!(link.get_battery().await, Err(LinkError::NoTelemetry("battery"))));
    }

    #[tokio::test]
    async fn journal_records_in_order() {
        let mut link = SimLink::new(SimVehicle::calm());
        let journal = link.journal();
        link.connect().await.unwrap();
        link.streamon().await.unwrap();
        link.streamoff().await.unwrap();
        assert_eq!(journal.calls(), vec![LinkCall::Connect, LinkCall::StreamOn, LinkCall::StreamOff]);
        assert!(!link.is_streaming());
    }
}
