pub mod doctor;
pub mod link;
pub mod mixer;
pub mod safety;
pub mod sim;
pub mod state;
pub mod udp;

use serde::Deserialize;

pub use link::{FlightLink, LinkError};
pub use mixer::{OpposingKeys, VelocityMixer};
pub use safety::{Refusal, SafetyGate, SafetyThresholds, Verdict, Warning};
pub use state::{EmergencyAction, FlightError, FlightStateMachine, FlightTimings, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Vehicle SDK over UDP.
    Udp,
    /// In-process simulated vehicle.
    Sim,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub kind: LinkKind,

    /// Vehicle address. The vehicle is its own access point, 192.168.10.1.
    pub host: String,
    pub command_port: u16,

    /// Local port for command replies; 0 picks an ephemeral one.
    pub local_command_port: u16,

    /// Local port the vehicle streams its state datagrams to.
    pub state_port: u16,

    /// Reply wait per command. Takeoff can take up to 7s.
    pub response_timeout_ms: Option<u64>,

    /// State datagrams older than this count as missing telemetry.
    pub state_max_age_ms: Option<u64>,

    /// How long `connect` waits for the first state datagram.
    pub state_wait_ms: Option<u64>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            kind: LinkKind::Udp,
            host: "192.168.10.1".into(),
            command_port: 8889,
            local_command_port: 0,
            state_port: 8890,
            response_timeout_ms: None,
            state_max_age_ms: None,
            state_wait_ms: None,
        }
    }
}

impl LinkConfig {
    pub fn response_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.response_timeout_ms.unwrap_or(7_000))
    }

    pub fn state_max_age(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.state_max_age_ms.unwrap_or(2_000))
    }

    pub fn state_wait(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.state_wait_ms.unwrap_or(3_000))
    }
}
