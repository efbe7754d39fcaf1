use serde::{Deserialize, Serialize};

pub const VELOCITY_LIMIT: i32 = 100;

/// Four-axis RC command. Components are always within
/// `[-VELOCITY_LIMIT, VELOCITY_LIMIT]`; the only way to build one is through
/// [`VelocityCommand::new`], which clamps. Deserializing goes through it
/// too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawCommand")]
pub struct VelocityCommand {
    lateral: i32,
    longitudinal: i32,
    vertical: i32,
    yaw: i32,
}

#[derive(Deserialize)]
struct RawCommand {
    lateral: i32,
    longitudinal: i32,
    vertical: i32,
    yaw: i32,
}

impl From<RawCommand> for VelocityCommand {
    fn from(r: RawCommand) -> Self {
        Self::new(r.lateral, r.longitudinal, r.vertical, r.yaw)
    }
}

impl VelocityCommand {
    pub const ZERO: Self = Self { lateral: 0, longitudinal: 0, vertical: 0, yaw: 0 };

    pub fn new(lateral: i32, longitudinal: i32, vertical: i32, yaw: i32) -> Self {
        Self {
            lateral: clamp_axis(lateral),
            longitudinal: clamp_axis(longitudinal),
            vertical: clamp_axis(vertical),
            yaw: clamp_axis(yaw),
        }
    }

    pub fn lateral(&self) -> i32 { self.lateral }
    pub fn longitudinal(&self) -> i32 { self.longitudinal }
    pub fn vertical(&self) -> i32 { self.vertical }
    pub fn yaw(&self) -> i32 { self.yaw }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// `(lr, fb, ud, yaw)` in the order the vehicle expects.
    pub fn as_tuple(&self) -> (i32, i32, i32, i32) {
        (self.lateral, self.longitudinal, self.vertical, self.yaw)
    }
}

fn clamp_axis(v: i32) -> i32 {
    v.clamp(-VELOCITY_LIMIT, VELOCITY_LIMIT)
}
