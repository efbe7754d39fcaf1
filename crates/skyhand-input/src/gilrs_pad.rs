use gilrs::{Axis, Button, EventType, GamepadId, Gilrs};

use crate::adapter::DeviceError;
use crate::gamepad::{GamepadDevice, PadSample};

/// Axis index order exposed to [`crate::ControllerMapping`].
const AXES: [Axis; 6] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::RightStickX,
    Axis::RightStickY,
    Axis::LeftZ,
    Axis::RightZ,
];

/// Button index order exposed to [`crate::ControllerMapping`]; mirrors
/// [`crate::mapping::BUTTON_LABELS`].
const BUTTONS: [Button; 17] = [
    Button::West,
    Button::South,
    Button::East,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::Mode,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
];

pub fn button_index(b: Button) -> Option<usize> {
    BUTTONS.iter().position(|x| *x == b)
}

pub struct GilrsGamepad {
    gilrs: Gilrs,
    id: GamepadId,
    name: String,
}

impl GilrsGamepad {
    /// Opens the first connected controller.
    pub fn open_first() -> Result<Self, DeviceError> {
        let gilrs = Gilrs::new().map_err(|e| DeviceError::unavailable(format!("gilrs init: {}", e)))?;
        let (id, name) = gilrs
            .gamepads()
            .next()
            .map(|(id, pad)| (id, pad.name().to_string()))
            .ok_or_else(|| DeviceError::unavailable("no joystick/controller detected"))?;
        Ok(Self { gilrs, id, name })
    }
}

impl GamepadDevice for GilrsGamepad {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample(&mut self) -> Result<PadSample, DeviceError> {
        let mut pressed = Vec::new();
        while let Some(ev) = self.gilrs.next_event() {
            if ev.id != self.id {
                continue;
            }
            if let EventType::ButtonPressed(b, _) = ev.event {
                if let Some(i) = button_index(b) {
                    pressed.push(i);
                }
            }
        }

        let pad = self.gilrs.gamepad(self.id);
        if !pad.is_connected() {
            return Err(DeviceError::unavailable(format!("{} disconnected", self.name)));
        }

        // gilrs reports stick-up as positive; flip Y to the joystick convention.
        let axes = AXES
            .iter()
            .map(|a| match a {
                Axis::LeftStickY | Axis::RightStickY => -pad.value(*a),
                _ => pad.value(*a),
            })
            .collect();

        Ok(PadSample { axes, pressed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{BUTTON_LABELS, ControllerMapping};

    #[test]
    fn index_table_matches_labels() {
        assert_eq!(BUTTONS.len(), BUTTON_LABELS.len());
    }

    #[test]
    fn xbox_layout_resolves_to_face_buttons() {
        let b = ControllerMapping::xbox().buttons;
        assert_eq!(button_index(Button::North), Some(b.takeoff));
        assert_eq!(button_index(Button::South), Some(b.land));
        assert_eq!(button_index(Button::East), Some(b.toggle_detector));
        assert_eq!(button_index(Button::LeftTrigger), Some(b.emergency));
        assert_eq!(button_index(Button::West), Some(b.photo));
        assert_eq!(button_index(Button::Unknown), None);
    }
}
