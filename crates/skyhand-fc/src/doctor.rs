use std::fmt;

use anyhow::Result;
use skyhand_proto::Telemetry;

use crate::link::{read_telemetry, FlightLink};
use crate::safety::{SafetyGate, SafetyThresholds, Verdict, Warning};
use crate::LinkConfig;

pub fn check_thresholds(t: &SafetyThresholds) -> Result<()> {
    anyhow::ensure!(t.critical_battery <= t.low_battery, "safety.critical_battery must not exceed safety.low_battery");
    anyhow::ensure!(t.low_battery <= 100, "safety.low_battery must be a percentage");
    anyhow::ensure!(t.high_temp <= t.overheat_temp, "safety.high_temp must not exceed safety.overheat_temp");
    anyhow::ensure!(t.overheat_temp < 150, "safety.overheat_temp implausibly high");
    Ok(())
}

pub fn check_link_config(cfg: &LinkConfig) -> Result<()> {
    anyhow::ensure!(!cfg.host.trim().is_empty(), "link.host missing");
    anyhow::ensure!(cfg.command_port > 0, "link.command_port invalid");
    anyhow::ensure!(
        cfg.state_port != cfg.local_command_port || cfg.state_port == 0,
        "link.state_port and link.local_command_port collide"
    );
    let to = cfg.response_timeout();
    anyhow::ensure!(to.as_millis() >= 100 && to.as_secs() <= 30, "link.response_timeout_ms should be 100..30000");
    anyhow::ensure!(cfg.state_wait().as_millis() >= 100, "link.state_wait_ms should be at least 100");
    Ok(())
}

/// Readings and gate verdicts from a live link.
#[derive(Debug, Clone)]
pub struct SensorReport {
    pub link: String,
    pub telemetry: Telemetry,
    pub verdict: Verdict,
    pub warnings: Vec<Warning>,
}

impl fmt::Display for SensorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt<T: fmt::Display>(v: Option<T>, unit: &str) -> String {
            v.map(|x| format!("{}{}", x, unit)).unwrap_or_else(|| "N/A".into())
        }
        let t = &self.telemetry;
        writeln!(f, "link:        {}", self.link)?;
        writeln!(f, "battery:     {}", opt(t.battery_percent, "%"))?;
        writeln!(f, "temperature: {}", opt(t.temperature_c, "°C"))?;
        writeln!(f, "height:      {}", opt(t.height_cm, "cm"))?;
        writeln!(f, "flight time: {}", opt(t.flight_time_s, "s"))?;
        match self.verdict {
            Verdict::Allow => writeln!(f, "preflight:   OK")?,
            Verdict::Refuse(r) => writeln!(f, "preflight:   REFUSED ({})", r)?,
        }
        for w in &self.warnings {
            writeln!(f, "warning:     {}", w)?;
        }
        Ok(())
    }
}

/// Connects, reads every sensor once and runs the preflight gate. Never
/// commands the vehicle to move.
pub async fn sensor_report(link: &mut dyn FlightLink, gate: &SafetyGate) -> Result<SensorReport> {
    link.connect().await.map_err(|e| anyhow::anyhow!("connect to {}: {}", link.describe(), e))?;
    let telemetry = read_telemetry(link).await;
    let verdict = gate.check_flight_ready(telemetry.battery_percent, telemetry.temperature_c);
    let warnings = gate.warnings(telemetry.battery_percent, telemetry.temperature_c);
    Ok(SensorReport { link: link.describe(), telemetry, verdict, warnings })
}
