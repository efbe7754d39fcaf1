use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlightState {
    Grounded,
    TakingOff,
    Flying,
    Landing,
    Emergency,
}

impl FlightState {
    pub fn is_airborne(self) -> bool {
        !matches!(self, FlightState::Grounded)
    }

    /// Operator-facing label used by the overlay.
    pub fn label(self) -> &'static str {
        match self {
            FlightState::Grounded => "ON GROUND",
            FlightState::TakingOff => "TAKING OFF",
            FlightState::Flying => "FLYING",
            FlightState::Landing => "LANDING",
            FlightState::Emergency => "EMERGENCY",
        }
    }
}

impl Default for FlightState {
    fn default() -> Self {
        FlightState::Grounded
    }
}

impl fmt::Display for FlightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
