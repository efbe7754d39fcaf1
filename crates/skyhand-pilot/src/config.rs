use std::time::Duration;

use serde::Deserialize;
use skyhand_fc::{EmergencyAction, FlightTimings, OpposingKeys, VelocityMixer};

/// Floor for the tick period; the vehicle drops commands sent faster.
pub const MIN_COMMAND_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Magnitude applied by a held movement key, 0..=100.
    pub speed: i32,
    pub opposing_keys: OpposingKeys,

    pub command_interval_ms: u64,
    pub telemetry_interval_ms: u64,
    pub render_interval_ms: u64,

    /// Wait after `streamon` while the vehicle's sensors settle.
    pub calibration_delay_s: u64,

    pub takeoff_timeout_ms: u64,
    pub land_timeout_ms: u64,
    pub stop_pause_ms: u64,
    pub land_settle_ms: u64,
    pub emergency_timeout_ms: u64,
    pub emergency_action: EmergencyAction,

    /// Start with detection on (ignored without a locator).
    pub detector_enabled: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        let t = FlightTimings::default();
        Self {
            speed: 50,
            opposing_keys: OpposingKeys::Cancel,
            command_interval_ms: 20,
            telemetry_interval_ms: 1_000,
            render_interval_ms: 33,
            calibration_delay_s: 10,
            takeoff_timeout_ms: t.takeoff_timeout.as_millis() as u64,
            land_timeout_ms: t.land_timeout.as_millis() as u64,
            stop_pause_ms: t.stop_pause.as_millis() as u64,
            land_settle_ms: t.land_settle.as_millis() as u64,
            emergency_timeout_ms: t.emergency_timeout.as_millis() as u64,
            emergency_action: EmergencyAction::Land,
            detector_enabled: false,
        }
    }
}

impl ControlConfig {
    pub fn command_interval(&self) -> Duration {
        Duration::from_millis(self.command_interval_ms).max(MIN_COMMAND_INTERVAL)
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms.max(1))
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms.max(1))
    }

    pub fn calibration_delay(&self) -> Duration {
        Duration::from_secs(self.calibration_delay_s)
    }

    pub fn timings(&self) -> FlightTimings {
        FlightTimings {
            takeoff_timeout: Duration::from_millis(self.takeoff_timeout_ms),
            land_timeout: Duration::from_millis(self.land_timeout_ms),
            stop_pause: Duration::from_millis(self.stop_pause_ms),
            land_settle: Duration::from_millis(self.land_settle_ms),
            emergency_timeout: Duration::from_millis(self.emergency_timeout_ms),
        }
    }

    pub fn mixer(&self) -> VelocityMixer {
        VelocityMixer::new(self.speed, self.opposing_keys)
    }
}
