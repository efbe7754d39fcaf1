use crate::adapter::{DeviceError, DeviceHealth, InputAdapter};
use crate::mapping::{apply_deadzone, button_label, ControllerMapping, MappingOverrides};
use crate::snapshot::{Action, Axes, InputSnapshot};

/// Raw controller state for one tick. Axis values follow the usual joystick
/// convention: stick down / right is positive.
#[derive(Debug, Clone, Default)]
pub struct PadSample {
    pub axes: Vec<f32>,
    /// Button indices that went down since the previous sample, oldest first.
    pub pressed: Vec<usize>,
}

pub trait GamepadDevice {
    fn name(&self) -> &str;
    fn sample(&mut self) -> Result<PadSample, DeviceError>;
}

pub struct GamepadAdapter<D> {
    device: D,
    mapping: ControllerMapping,
    health: DeviceHealth,
}

impl<D: GamepadDevice> GamepadAdapter<D> {
    /// Detects the layout once, from the name the device reports.
    pub fn new(device: D, overrides: Option<&MappingOverrides>) -> Self {
        let mut mapping = ControllerMapping::for_device(device.name());
        if let Some(o) = overrides {
            mapping = mapping.with_overrides(o);
        }
        Self { device, mapping, health: DeviceHealth::default() }
    }

    pub fn mapping(&self) -> &ControllerMapping {
        &self.mapping
    }

    fn axis(&self, sample: &PadSample, index: usize, invert: bool) -> f32 {
        let raw = sample.axes.get(index).copied().unwrap_or(0.0);
        let v = apply_deadzone(raw, self.mapping.deadzone);
        let v = if invert { -v } else { v };
        v.clamp(-1.0, 1.0)
    }

    fn translate(&self, sample: &PadSample) -> InputSnapshot {
        let m = &self.mapping;
        let axes = Axes {
            yaw: self.axis(sample, m.axes.yaw, m.invert.yaw),
            throttle: self.axis(sample, m.axes.throttle, m.invert.throttle),
            roll: self.axis(sample, m.axes.roll, m.invert.roll),
            pitch: self.axis(sample, m.axes.pitch, m.invert.pitch),
        };

        let b = &m.buttons;
        let actions = sample
            .pressed
            .iter()
            .filter_map(|&i| {
                // Emergency wins when a layout override maps two roles to one button.
                if i == b.emergency { Some(Action::Emergency) }
                else if i == b.takeoff { Some(Action::Takeoff) }
                else if i == b.land { Some(Action::Land) }
                else if i == b.toggle_detector { Some(Action::ToggleDetector) }
                else if i == b.photo { Some(Action::Photo) }
                else { None }
            })
            .collect();

        InputSnapshot { axes, actions, ..InputSnapshot::neutral() }
    }
}

impl<D: GamepadDevice> InputAdapter for GamepadAdapter<D> {
    fn poll(&mut self) -> InputSnapshot {
        match self.device.sample() {
            Ok(sample) => {
                self.health.recover();
                self.translate(&sample)
            }
            Err(e) => {
                self.health.degrade(&e);
                InputSnapshot::degraded()
            }
        }
    }

    fn describe(&self) -> String {
        format!("gamepad {:?} ({:?} layout)", self.device.name(), self.mapping.kind)
    }
}

pub fn describe_buttons(m: &ControllerMapping) -> Vec<(String, &'static str)> {
    vec![
        ("Left stick".into(), "Throttle (Y) / Yaw (X)"),
        ("Right stick".into(), "Pitch (Y) / Roll (X)"),
        (button_label(m.buttons.takeoff), "Take off"),
        (button_label(m.buttons.land), "Land"),
        (button_label(m.buttons.toggle_detector), "Toggle detector"),
        (button_label(m.buttons.emergency), "EMERGENCY STOP and quit"),
        (button_label(m.buttons.photo), "Photo (unsupported)"),
    ]
}
