pub mod command;
pub mod state;
pub mod telemetry;

pub use command::VelocityCommand;
pub use state::FlightState;
pub use telemetry::Telemetry;
