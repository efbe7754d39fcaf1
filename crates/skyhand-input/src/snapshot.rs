use std::collections::BTreeSet;

/// Normalized stick axes, each in `[-1.0, 1.0]`, deadzone and sign
/// inversion already applied.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Axes {
    pub yaw: f32,
    pub throttle: f32,
    pub roll: f32,
    pub pitch: f32,
}

/// Discrete movement controls (keyboard scheme). Held for as long as the key
/// is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Control {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
    YawLeft,
    YawRight,
}

impl Control {
    pub fn label(self) -> &'static str {
        match self {
            Control::Forward => "FWD",
            Control::Backward => "BACK",
            Control::Left => "LEFT",
            Control::Right => "RIGHT",
            Control::Up => "UP",
            Control::Down => "DOWN",
            Control::YawLeft => "ROT-L",
            Control::YawRight => "ROT-R",
        }
    }

    pub const ALL: [Control; 8] = [
        Control::Forward,
        Control::Backward,
        Control::Left,
        Control::Right,
        Control::Up,
        Control::Down,
        Control::YawLeft,
        Control::YawRight,
    ];
}

/// Edge-triggered operator requests. Reported once, on the tick the key or
/// button went down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Takeoff,
    Land,
    ToggleDetector,
    Emergency,
    Photo,
    Quit,
}

/// Everything the rest of the loop needs from the operator for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSnapshot {
    pub axes: Axes,
    pub held: BTreeSet<Control>,
    /// In the order they were pressed.
    pub actions: Vec<Action>,
    /// Set when the device could not be read this tick.
    pub degraded: bool,
}

impl InputSnapshot {
    /// Zero axes, nothing held, no actions.
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn degraded() -> Self {
        Self { degraded: true, ..Self::default() }
    }

    pub fn is_held(&self, c: Control) -> bool {
        self.held.contains(&c)
    }
}
