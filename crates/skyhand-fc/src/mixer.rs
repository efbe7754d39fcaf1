use serde::Deserialize;
use skyhand_input::{Control, InputSnapshot};
use skyhand_proto::command::{VelocityCommand, VELOCITY_LIMIT};

/// What to do when both keys of an opposing pair are held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpposingKeys {
    /// Both contributions cancel to zero.
    #[default]
    Cancel,
    /// The second key of the pair wins: back over forward, right over left,
    /// down over up, yaw-right over yaw-left.
    LastWins,
}

pub const DEFAULT_SPEED: i32 = 50;

/// Keys evaluated last in each pair, and so kept under [`OpposingKeys::LastWins`].
const LAST_WINNERS: [Control; 4] = [Control::Backward, Control::Right, Control::Down, Control::YawRight];

/// Turns an input snapshot into a velocity command. Pure; whether the
/// result is sent is the state machine's call.
#[derive(Debug, Clone, Copy)]
pub struct VelocityMixer {
    speed: i32,
    opposing: OpposingKeys,
}

impl Default for VelocityMixer {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED, OpposingKeys::default())
    }
}

impl VelocityMixer {
    pub fn new(speed: i32, opposing: OpposingKeys) -> Self {
        Self { speed: speed.clamp(0, VELOCITY_LIMIT), opposing }
    }

    pub fn mix(&self, input: &InputSnapshot) -> VelocityCommand {
        let a = input.axes;
        let lateral = self.key_axis(input, Control::Left, Control::Right).unwrap_or_else(|| scale(a.roll));
        let longitudinal =
            self.key_axis(input, Control::Backward, Control::Forward).unwrap_or_else(|| scale(a.pitch));
        let vertical = self.key_axis(input, Control::Down, Control::Up).unwrap_or_else(|| scale(a.throttle));
        let yaw = self.key_axis(input, Control::YawLeft, Control::YawRight).unwrap_or_else(|| scale(a.yaw));

        VelocityCommand::new(lateral, longitudinal, vertical, yaw)
    }

    /// `None` when neither key is held and the analog axis applies.
    fn key_axis(&self, input: &InputSnapshot, neg: Control, pos: Control) -> Option<i32> {
        match (input.is_held(neg), input.is_held(pos)) {
            (false, false) => None,
            (true, false) => Some(-self.speed),
            (false, true) => Some(self.speed),
            (true, true) => Some(match self.opposing {
                OpposingKeys::Cancel => 0,
                OpposingKeys::LastWins => {
                    if LAST_WINNERS.contains(&neg) { -self.speed } else { self.speed }
                }
            }),
        }
    }

    /// Overlay labels for the held controls, in display order.
    pub fn active_labels(&self, input: &InputSnapshot) -> Vec<&'static str> {
        Control::ALL.iter().filter(|c| input.is_held(**c)).map(|c| c.label()).collect()
    }
}

fn scale(v: f32) -> i32 {
    if v.is_nan() {
        return 0;
    }
    ((v * 100.0) as i32).clamp(-VELOCITY_LIMIT, VELOCITY_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyhand_input::Axes;

    fn held(controls: &[Control]) -> InputSnapshot {
        InputSnapshot { held: controls.iter().copied().collect(), ..InputSnapshot::neutral() }
    }

    #[test]
    fn analog_axes_truncate_toward_zero() {
        let input = InputSnapshot {
            axes: Axes { yaw: 0.5, throttle: -0.255, roll: 1.0, pitch: -0.999 },
            ..InputSnapshot::neutral()
        };
        assert_eq!(VelocityMixer::default().mix(&input).as_tuple(), (100, -99, -25, 50));
    }

    #[test]
    fn neutral_input_hovers() {
        assert!(VelocityMixer::default().mix(&InputSnapshot::neutral()).is_zero());
    }

    #[test]
    fn forward_key_overrides_pitch_axis() {
        let mut input = held(&[Control::Forward]);
        input.axes.pitch = -0.8;
        input.axes.roll = 0.3;
        assert_eq!(VelocityMixer::default().mix(&input).as_tuple(), (30, 50, 0, 0));
    }

    #[test]
    fn opposing_keys_cancel_by_default() {
        let input = held(&[Control::Forward, Control::Backward, Control::YawLeft, Control::YawRight]);
        assert!(VelocityMixer::default().mix(&input).is_zero());
    }

    #[test]
    fn opposing_keys_last_wins() {
        let m = VelocityMixer::new(40, OpposingKeys::LastWins);
        let input = held(&Control::ALL);
        assert_eq!(m.mix(&input).as_tuple(), (40, -40, -40, 40));
    }

    #[test]
    fn speed_is_bounded() {
        let m = VelocityMixer::new(250, OpposingKeys::Cancel);
        assert_eq!(m.mix(&held(&[Control::Up])).vertical(), 100);
    }

    #[test]
    fn labels_follow_display_order() {
        let input = held(&[Control::YawRight, Control::Forward, Control::Up]);
        assert_eq!(VelocityMixer::default().active_labels(&input), vec!["FWD", "UP", "ROT-R"]);
        assert!(VelocityMixer::default().active_labels(&InputSnapshot::neutral()).is_empty());
    }
}
