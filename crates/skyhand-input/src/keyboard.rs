use std::collections::{BTreeSet, HashMap, HashSet};

use crate::adapter::{DeviceError, DeviceHealth, InputAdapter};
use crate::snapshot::{Action, Control, InputSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Always lowercase.
    Char(char),
    Esc,
    /// Ctrl-C while the terminal is in raw mode.
    Interrupt,
}

/// Raw key state for one tick.
#[derive(Debug, Clone, Default)]
pub struct KeySample {
    pub held: HashSet<Key>,
    /// Keys that went down since the previous sample, oldest first.
    pub pressed: Vec<Key>,
}

pub trait KeyboardDevice {
    fn sample(&mut self) -> Result<KeySample, DeviceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Move(Control),
    Act(Action),
}

#[derive(Debug, Clone)]
pub struct KeyBindings {
    map: HashMap<Key, Binding>,
}

impl KeyBindings {
    /// W/S forward/back, A/D left/right, I/P up/down, Q/E yaw, T takeoff,
    /// L land, F detector, ESC quit.
    pub fn canonical() -> Self {
        let map = HashMap::from([
            (Key::Char('w'), Binding::Move(Control::Forward)),
            (Key::Char('s'), Binding::Move(Control::Backward)),
            (Key::Char('a'), Binding::Move(Control::Left)),
            (Key::Char('d'), Binding::Move(Control::Right)),
            (Key::Char('i'), Binding::Move(Control::Up)),
            (Key::Char('p'), Binding::Move(Control::Down)),
            (Key::Char('q'), Binding::Move(Control::YawLeft)),
            (Key::Char('e'), Binding::Move(Control::YawRight)),
            (Key::Char('t'), Binding::Act(Action::Takeoff)),
            (Key::Char('l'), Binding::Act(Action::Land)),
            (Key::Char('f'), Binding::Act(Action::ToggleDetector)),
            (Key::Esc, Binding::Act(Action::Quit)),
            (Key::Interrupt, Binding::Act(Action::Quit)),
        ]);
        Self { map }
    }

    pub fn get(&self, key: Key) -> Option<Binding> {
        self.map.get(&key).copied()
    }

    /// `(key label, description)` rows for the controls table.
    pub fn describe() -> Vec<(&'static str, &'static str)> {
        vec![
            ("W/A/S/D", "Move forward/left/back/right (hold)"),
            ("I/P", "Move up/down (hold)"),
            ("Q/E", "Rotate left/right (hold)"),
            ("T", "Take off"),
            ("L", "Land"),
            ("F", "Toggle detector"),
            ("ESC", "Land if flying and quit"),
        ]
    }
}

pub struct KeyboardAdapter<D> {
    device: D,
    bindings: KeyBindings,
    health: DeviceHealth,
}

impl<D: KeyboardDevice> KeyboardAdapter<D> {
    pub fn new(device: D) -> Self {
        Self::with_bindings(device, KeyBindings::canonical())
    }

    pub fn with_bindings(device: D, bindings: KeyBindings) -> Self {
        Self { device, bindings, health: DeviceHealth::default() }
    }

    fn translate(&self, sample: &KeySample) -> InputSnapshot {
        let held: BTreeSet<Control> = sample
            .held
            .iter()
            .filter_map(|k| match self.bindings.get(*k) {
                Some(Binding::Move(c)) => Some(c),
                _ => None,
            })
            .collect();

        let actions = sample
            .pressed
            .iter()
            .filter_map(|k| match self.bindings.get(*k) {
                Some(Binding::Act(a)) => Some(a),
                _ => None,
            })
            .collect();

        InputSnapshot { held, actions, ..InputSnapshot::neutral() }
    }
}

impl<D: KeyboardDevice> InputAdapter for KeyboardAdapter<D> {
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
        "keyboard".into()
    }
}
