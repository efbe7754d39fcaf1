use serde::Deserialize;
use tracing::info;

pub const DEFAULT_DEADZONE: f32 = 0.08;
pub const XBOX_DEADZONE: f32 = 0.09;

/// Button indices are positions in this order. Pad drivers report buttons
/// by physical position, so one index means the same spot on every
/// controller family.
pub const BUTTON_LABELS: [&str; 17] = [
    "West (X / Square)",
    "South (A / Cross)",
    "East (B / Circle)",
    "North (Y / Triangle)",
    "LB / L1",
    "RB / R1",
    "LT / L2",
    "RT / R2",
    "View / Select",
    "Menu / Start",
    "Guide / PS",
    "Left stick press",
    "Right stick press",
    "D-pad up",
    "D-pad down",
    "D-pad left",
    "D-pad right",
];

pub fn button_label(index: usize) -> String {
    BUTTON_LABELS.get(index).map_or_else(|| format!("Button {}", index), |l| l.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    Xbox,
    PlayStation,
    Generic,
}

/// Raw axis indices feeding each normalized axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AxisMap {
    pub yaw: usize,
    pub throttle: usize,
    pub roll: usize,
    pub pitch: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AxisInvert {
    pub yaw: bool,
    pub throttle: bool,
    pub roll: bool,
    pub pitch: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ButtonMap {
    pub takeoff: usize,
    pub land: usize,
    pub toggle_detector: usize,
    pub emergency: usize,
    pub photo: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerMapping {
    pub kind: ControllerKind,
    pub axes: AxisMap,
    pub invert: AxisInvert,
    pub deadzone: f32,
    pub buttons: ButtonMap,
}

/// Optional `[input.mapping]` section. Each group replaces the detected one
/// wholesale.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MappingOverrides {
    pub deadzone: Option<f32>,
    pub axes: Option<AxisMap>,
    pub invert: Option<AxisInvert>,
    pub buttons: Option<ButtonMap>,
}

impl ControllerMapping {
    /// Default (PlayStation-style) layout. Sticks report "down" as positive,
    /// so both Y axes are inverted.
    pub fn standard() -> Self {
        Self {
            kind: ControllerKind::Generic,
            axes: AxisMap { yaw: 0, throttle: 1, roll: 2, pitch: 3 },
            invert: AxisInvert { yaw: false, throttle: true, roll: false, pitch: true },
            deadzone: DEFAULT_DEADZONE,
            buttons: ButtonMap { takeoff: 3, land: 1, toggle_detector: 2, emergency: 4, photo: 0 },
        }
    }

    /// Y takes off, A lands, B toggles detection, LB is the emergency stop
    /// and X takes a photo: the same positions as the default layout, with
    /// a wider deadzone.
    pub fn xbox() -> Self {
        Self { kind: ControllerKind::Xbox, deadzone: XBOX_DEADZONE, ..Self::standard() }
    }

    /// Picks the layout from the name the device reports, matching known
    /// vendor strings case-insensitively. Unknown names get the default
    /// layout.
    pub fn for_device(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("xbox") {
            info!("controller: Xbox layout for {:?}", name);
            Self::xbox()
        } else if lower.contains("ps4") || lower.contains("playstation") {
            info!("controller: PlayStation layout for {:?}", name);
            Self { kind: ControllerKind::PlayStation, ..Self::standard() }
        } else {
            info!("controller: generic device {:?}, using PlayStation-style layout", name);
            Self::standard()
        }
    }

    pub fn with_overrides(mut self, o: &MappingOverrides) -> Self {
        if let Some(dz) = o.deadzone { self.deadzone = dz.clamp(0.0, 1.0); }
        if let Some(a) = o.axes { self.axes = a; }
        if let Some(i) = o.invert { self.invert = i; }
        if let Some(b) = o.buttons { self.buttons = b; }
        self
    }
}

/// `|raw| < deadzone` reads as exactly zero; anything else passes through
/// unscaled.
pub fn apply_deadzone(raw: f32, deadzone: f32) -> f32 {
    if !raw.is_finite() || raw.abs() < deadzone { 0.0 } else { raw }
}
