use std::fmt;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Battery and temperature limits. Read-only once loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SafetyThresholds {
    /// Below this battery percentage flight is refused.
    pub critical_battery: u8,
    /// Below this the operator is warned.
    pub low_battery: u8,
    /// Above this temperature (°C) flight is refused.
    pub overheat_temp: i32,
    /// Above this the operator is warned.
    pub high_temp: i32,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self { critical_battery: 10, low_battery: 15, overheat_temp: 80, high_temp: 70 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Refusal {
    #[error("battery critically low ({battery}%, minimum {min}%)")]
    CriticalBattery { battery: u8, min: u8 },
    #[error("vehicle overheating ({temperature}°C, maximum {max}°C)")]
    Overheat { temperature: i32, max: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Refuse(Refusal),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// Non-blocking conditions shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Warning {
    LowBattery(u8),
    HighTemp(i32),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::LowBattery(b) => write!(f, "battery low ({}%), charge soon", b),
            Warning::HighTemp(t) => write!(f, "temperature high ({}°C), consider cooling", t),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalLevel {
    Normal,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy)]
pub struct SafetyGate {
    thresholds: SafetyThresholds,
}

impl SafetyGate {
    pub fn new(thresholds: SafetyThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &SafetyThresholds {
        &self.thresholds
    }

    /// Gate applied right after connecting, before the video stream starts.
    pub fn check_connect(&self, battery: Option<u8>) -> Verdict {
        match battery {
            Some(b) if b < self.thresholds.critical_battery => Verdict::Refuse(Refusal::CriticalBattery {
                battery: b,
                min: self.thresholds.critical_battery,
            }),
            Some(_) => Verdict::Allow,
            None => {
                warn!("battery level unknown; not blocking connect");
                Verdict::Allow
            }
        }
    }

    /// Preflight gate for takeoff. Unknown readings never block.
    pub fn check_flight_ready(&self, battery: Option<u8>, temperature: Option<i32>) -> Verdict {
        if let Verdict::Refuse(r) = self.check_connect(battery) {
            return Verdict::Refuse(r);
        }
        match temperature {
            Some(t) if t > self.thresholds.overheat_temp => Verdict::Refuse(Refusal::Overheat {
                temperature: t,
                max: self.thresholds.overheat_temp,
            }),
            Some(_) => Verdict::Allow,
            None => {
                warn!("temperature unknown; not blocking takeoff");
                Verdict::Allow
            }
        }
    }

    /// At most one warning of each kind, battery first.
    pub fn warnings(&self, battery: Option<u8>, temperature: Option<i32>) -> Vec<Warning> {
        let mut out = Vec::new();
        if let Some(b) = battery {
            if b < self.thresholds.low_battery {
                out.push(Warning::LowBattery(b));
            }
        }
        if let Some(t) = temperature {
            if t > self.thresholds.high_temp {
                out.push(Warning::HighTemp(t));
            }
        }
        out
    }

    pub fn thermal_level(&self, temperature: i32) -> ThermalLevel {
        if temperature > self.thresholds.overheat_temp {
            ThermalLevel::Critical
        } else if temperature > self.thresholds.high_temp {
            ThermalLevel::Warning
        } else {
            ThermalLevel::Normal
        }
    }
}
