use thiserror::Error;
use tracing::{info, warn};

use crate::snapshot::InputSnapshot;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("input device unavailable: {0}")]
    Unavailable(String),
}

impl DeviceError {
    pub fn unavailable(e: impl std::fmt::Display) -> Self {
        DeviceError::Unavailable(e.to_string())
    }
}

/// One operator input source, sampled exactly once per loop tick.
pub trait InputAdapter {
    fn poll(&mut self) -> InputSnapshot;

    /// Short description for logs and the controls table.
    fn describe(&self) -> String;
}

/// Tracks whether the underlying device is currently failing so the
/// transition is logged once instead of on every tick.
#[derive(Debug, Default)]
pub(crate) struct DeviceHealth {
    degraded: bool,
}

impl DeviceHealth {
    pub(crate) fn degrade(&mut self, err: &DeviceError) {
        if !self.degraded {
            warn!("{}; reporting neutral input until it recovers", err);
            self.degraded = true;
        }
    }

    pub(crate) fn recover(&mut self) {
        if self.degraded {
            info!("input device recovered");
            self.degraded = false;
        }
    }
}
