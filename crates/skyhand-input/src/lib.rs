pub mod adapter;
pub mod gamepad;
pub mod keyboard;
pub mod mapping;
pub mod snapshot;
pub mod term;

#[cfg(feature = "gamepad")]
pub mod gilrs_pad;

use serde::Deserialize;

pub use adapter::{DeviceError, InputAdapter};
pub use mapping::{ControllerKind, ControllerMapping, MappingOverrides};
pub use snapshot::{Action, Axes, Control, InputSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Keyboard,
    Gamepad,
}

impl Default for Scheme {
    fn default() -> Self {
        Scheme::Keyboard
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub scheme: Scheme,

    /// Terminals that never report key releases: a key counts as held for
    /// this long after its last press/repeat event. Default 750ms.
    pub key_hold_ms: Option<u64>,

    /// Per-field overrides applied on top of the detected controller layout.
    pub mapping: Option<MappingOverrides>,
}
