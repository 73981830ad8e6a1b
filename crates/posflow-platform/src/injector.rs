//! Input injection using `enigo`.

use crate::{PlatformError, PlatformResult};
use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use posflow_core::keys::{Chord, Modifier};
use posflow_core::ports::{InputInjector, PortError};
use posflow_core::MouseButton;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Real input injector using `enigo` crate.
pub struct EnigoInjector {
    enigo: Mutex<Enigo>,
}

impl EnigoInjector {
    pub fn new() -> PlatformResult<Self> {
        let enigo = Enigo::new(&Settings::default()).map_err(|e| {
            PlatformError::InjectionFailed(format!("failed to create Enigo: {e}"))
        })?;
        Ok(Self {
            enigo: Mutex::new(enigo),
        })
    }

    fn with_enigo<T>(
        &self,
        f: impl FnOnce(&mut Enigo) -> PlatformResult<T>,
    ) -> Result<T, PortError> {
        let mut enigo = self
            .enigo
            .lock()
            .map_err(|_| PortError::InjectionUnavailable("injector lock poisoned".into()))?;
        f(&mut enigo).map_err(PortError::from)
    }
}

fn failed(e: enigo::InputError) -> PlatformError {
    PlatformError::InjectionFailed(e.to_string())
}

impl InputInjector for EnigoInjector {
    fn move_to(&self, x: i32, y: i32) -> Result<(), PortError> {
        debug!(x, y, "injecting move");
        self.with_enigo(|enigo| enigo.move_mouse(x, y, Coordinate::Abs).map_err(failed))
    }

    fn click(&self, x: i32, y: i32, button: MouseButton) -> Result<(), PortError> {
        debug!(x, y, ?button, "injecting click");
        self.with_enigo(|enigo| {
            enigo.move_mouse(x, y, Coordinate::Abs).map_err(failed)?;
            enigo
                .button(mouse_button_to_enigo(button), Direction::Click)
                .map_err(failed)
        })
    }

    fn key_press(&self, key: &str) -> Result<(), PortError> {
        debug!(key, "injecting key press");
        let chord = Chord::parse(key).ok_or_else(|| PlatformError::InvalidKey(key.to_string()))?;
        let target = parse_key(&chord.key)?;
        let held: Vec<Key> = chord.modifiers.iter().map(modifier_to_enigo).collect();

        self.with_enigo(|enigo| {
            for k in &held {
                enigo.key(*k, Direction::Press).map_err(failed)?;
            }
            let result = enigo.key(target, Direction::Click).map_err(failed);
            // Release even when the tap failed so no modifier stays down.
            for k in held.iter().rev() {
                if let Err(e) = enigo.key(*k, Direction::Release) {
                    warn!(error = %e, "failed to release modifier");
                }
            }
            result
        })
    }

    fn type_text(&self, text: &str) -> Result<(), PortError> {
        debug!(len = text.len(), "injecting text");
        self.with_enigo(|enigo| enigo.text(text).map_err(failed))
    }
}

fn mouse_button_to_enigo(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

fn modifier_to_enigo(m: Modifier) -> Key {
    match m {
        Modifier::Ctrl => Key::Control,
        Modifier::Alt => Key::Alt,
        Modifier::Shift => Key::Shift,
        Modifier::Meta => Key::Meta,
    }
}

/// Parse a canonical key name into an enigo Key.
/// Single characters map to unicode keys.
fn parse_key(key: &str) -> PlatformResult<Key> {
    let mut chars = key.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Ok(match c {
            ' ' => Key::Space,
            c => Key::Unicode(c),
        });
    }

    let parsed = match key {
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,

        "shift" => Key::Shift,
        "ctrl" => Key::Control,
        "alt" => Key::Alt,
        "meta" => Key::Meta,

        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,

        "backspace" => Key::Backspace,
        "delete" => Key::Delete,
        "enter" => Key::Return,
        "tab" => Key::Tab,
        "esc" => Key::Escape,
        "space" => Key::Space,
        "capslock" => Key::CapsLock,

        #[cfg(not(target_os = "macos"))]
        "insert" => Key::Insert,
        #[cfg(not(target_os = "macos"))]
        "printscreen" => Key::PrintScr,
        #[cfg(not(target_os = "macos"))]
        "pause" => Key::Pause,
        #[cfg(not(target_os = "macos"))]
        "numlock" => Key::Numlock,

        _ => return Err(PlatformError::InvalidKey(key.to_string())),
    };

    Ok(parsed)
}
