pub mod config;
pub mod control_loop;
pub mod session;
pub mod startup;

pub use config::ControlConfig;
pub use control_loop::{ControlLoop, LoopExit};
pub use session::Session;
pub use startup::{startup, StartupError};
