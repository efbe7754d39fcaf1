use std::time::Duration;

use async_trait::async_trait;
use skyhand_proto::{telemetry::now_unix_ms, Telemetry, VelocityCommand};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("link not connected")]
    NotConnected,
    #[error("{op} timed out after {after:?}")]
    Timeout { op: String, after: Duration },
    #[error("{op} rejected by vehicle: {reply}")]
    Rejected { op: String, reply: String },
    #[error("no {0} telemetry received yet")]
    NoTelemetry(&'static str),
    #[error("no state datagram on port {port} within {within:?}; is UDP {port} firewalled or the vehicle's Wi-Fi not joined?")]
    NoStateData { port: u16, within: Duration },
    #[error("link i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Command and telemetry channel to the vehicle. Every operation may fail;
/// callers decide whether a failure matters.
#[async_trait]
pub trait FlightLink: Send {
    async fn connect(&mut self) -> Result<(), LinkError>;

    async fn get_battery(&mut self) -> Result<u8, LinkError>;
    async fn get_temperature(&mut self) -> Result<i32, LinkError>;
    async fn get_height(&mut self) -> Result<i32, LinkError>;
    async fn get_flight_time(&mut self) -> Result<u32, LinkError>;

    async fn streamon(&mut self) -> Result<(), LinkError>;
    async fn streamoff(&mut self) -> Result<(), LinkError>;

    async fn takeoff(&mut self) -> Result<(), LinkError>;
    async fn land(&mut self) -> Result<(), LinkError>;
    /// Cuts the motors immediately. The vehicle drops.
    async fn emergency_stop(&mut self) -> Result<(), LinkError>;

    async fn set_velocity(&mut self, cmd: VelocityCommand) -> Result<(), LinkError>;

    fn describe(&self) -> String;
}

/// Queries every reading independently; a failed query leaves its field
/// empty.
pub async fn read_telemetry(link: &mut dyn FlightLink) -> Telemetry {
    let battery_percent = link.get_battery().await.map_err(|e| debug!("battery query: {}", e)).ok();
    let temperature_c = link.get_temperature().await.map_err(|e| debug!("temperature query: {}", e)).ok();
    let height_cm = link.get_height().await.map_err(|e| debug!("height query: {}", e)).ok();
    let flight_time_s = link.get_flight_time().await.map_err(|e| debug!("flight time query: {}", e)).ok();

    Telemetry { ts_unix_ms: now_unix_ms(), battery_percent, temperature_c, height_cm, flight_time_s }
}
