use std::collections::HashMap;
use std::io::stdout;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use tracing::{debug, info};

use crate::adapter::DeviceError;
use crate::keyboard::{Key, KeyboardDevice, KeySample};

/// Longer than the usual 500-660ms delay before a terminal starts
/// auto-repeating, so a held key is not dropped between its first press and
/// the first repeat.
pub const DEFAULT_KEY_HOLD: Duration = Duration::from_millis(750);

/// Keyboard read from the controlling terminal in raw mode.
///
/// Terminals with the kitty keyboard protocol report releases and we track
/// held keys exactly. Everywhere else a key stays held for `hold_window`
/// after its last press or auto-repeat event.
pub struct TerminalKeyboard {
    held: HashMap<Key, Instant>,
    hold_window: Duration,
    enhanced: bool,
}

impl TerminalKeyboard {
    pub fn open(hold_window: Duration) -> Result<Self, DeviceError> {
        terminal::enable_raw_mode().map_err(DeviceError::unavailable)?;

        let enhanced = matches!(terminal::supports_keyboard_enhancement(), Ok(true))
            && execute!(
                stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .is_ok();
        if enhanced {
            info!("keyboard: terminal reports key releases");
        } else {
            info!("keyboard: no release events, holding keys for {:?}", hold_window);
        }

        Ok(Self { held: HashMap::new(), hold_window, enhanced })
    }

    fn on_key(&mut self, ev: KeyEvent, now: Instant, pressed: &mut Vec<Key>) {
        let Some(key) = translate(&ev) else { return; };
        match ev.kind {
            KeyEventKind::Press => {
                if self.held.insert(key, now).is_none() {
                    pressed.push(key);
                }
            }
            KeyEventKind::Repeat => {
                self.held.insert(key, now);
            }
            KeyEventKind::Release => {
                self.held.remove(&key);
            }
        }
    }

    fn expire(&mut self, now: Instant) {
        if !self.enhanced {
            let window = self.hold_window;
            self.held.retain(|_, last| now.duration_since(*last) < window);
        }
    }
}

impl KeyboardDevice for TerminalKeyboard {
    fn sample(&mut self) -> Result<KeySample, DeviceError> {
        let now = Instant::now();
        let mut pressed = Vec::new();

        while event::poll(Duration::ZERO).map_err(DeviceError::unavailable)? {
            match event::read().map_err(DeviceError::unavailable)? {
                Event::Key(ev) => self.on_key(ev, now, &mut pressed),
                Event::FocusLost => self.held.clear(),
                other => debug!("keyboard: ignoring {:?}", other),
            }
        }

        self.expire(now);

        Ok(KeySample { held: self.held.keys().copied().collect(), pressed })
    }
}

impl Drop for TerminalKeyboard {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(stdout(), PopKeyboardEnhancementFlags);
        }
        let _ = terminal::disable_raw_mode();
    }
}

fn translate(ev: &KeyEvent) -> Option<Key> {
    match ev.code {
        KeyCode::Char('c') if ev.modifiers.contains(KeyModifiers::CONTROL) => Some(Key::Interrupt),
        KeyCode::Char(c) => Some(Key::Char(c.to_ascii_lowercase())),
        KeyCode::Esc => Some(Key::Esc),
        _ => None,
    }
}
