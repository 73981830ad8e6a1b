//! Global input hook for recording and hotkeys, built on `rdev`.
//!
//! Events are delivered with canonical key names (see `posflow_core::keys`)
//! and absolute pixel positions. Button events carry the last position seen
//! by the hook, since `rdev` reports buttons without coordinates.

use crossbeam_channel::{bounded, Receiver, Sender};
use posflow_core::{MouseButton, RawEventType};
use rdev::{listen, Event, EventType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// A raw input event captured by the hook.
#[derive(Debug, Clone, PartialEq)]
pub struct HookEvent {
    /// Milliseconds since the hook started.
    pub timestamp_ms: u64,
    pub event: RawEventType,
}

/// Handle to the running input hook.
pub struct InputHookHandle {
    event_rx: Receiver<HookEvent>,
    stopped: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    started: Instant,
}

impl InputHookHandle {
    pub fn receiver(&self) -> &Receiver<HookEvent> {
        &self.event_rx
    }

    pub fn try_recv(&self) -> Option<HookEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<HookEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Milliseconds since the hook started, on the same base as event stamps.
    pub fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Stop delivering events.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for InputHookHandle {
    fn drop(&mut self) {
        self.stop();
        // rdev's listener never returns; the thread is left detached and
        // drops events once stopped.
        let _ = self.thread.take();
    }
}

/// Start capturing global input events on a dedicated thread.
pub fn start_input_hook() -> InputHookHandle {
    let (event_tx, event_rx) = bounded(1024);
    let stopped = Arc::new(AtomicBool::new(false));
    let started = Instant::now();

    let thread_stopped = stopped.clone();
    let thread = thread::spawn(move || run_hook(event_tx, thread_stopped, started));

    InputHookHandle {
        event_rx,
        stopped,
        thread: Some(thread),
        started,
    }
}

fn run_hook(event_tx: Sender<HookEvent>, stopped: Arc<AtomicBool>, started: Instant) {
    info!("Input hook thread started (rdev)");
    let mut translator = Translator::default();

    let callback = move |event: Event| {
        if stopped.load(Ordering::Relaxed) {
            return;
        }
        let Some(raw) = translator.translate(event.event_type) else {
            return;
        };
        let hook_event = HookEvent {
            timestamp_ms: started.elapsed().as_millis() as u64,
            event: raw,
        };
        if let Err(e) = event_tx.try_send(hook_event) {
            warn!("Failed to send input event: {}", e);
        }
    };

    if let Err(error) = listen(callback) {
        error!(?error, "Input hook error");
    }
    info!("Input hook thread exiting");
}

/// Turns `rdev` events into [`RawEventType`], filling in button positions.
#[derive(Debug, Default)]
struct Translator {
    last_pos: (i32, i32),
}

impl Translator {
    fn translate(&mut self, event: EventType) -> Option<RawEventType> {
        let (x, y) = self.last_pos;
        Some(match event {
            EventType::MouseMove { x, y } => {
                self.last_pos = (x.round() as i32, y.round() as i32);
                RawEventType::MouseMove {
                    x: self.last_pos.0,
                    y: self.last_pos.1,
                }
            }
            EventType::ButtonPress(button) => RawEventType::MouseDown {
                x,
                y,
                button: map_button(button)?,
            },
            EventType::ButtonRelease(button) => RawEventType::MouseUp {
                x,
                y,
                button: map_button(button)?,
            },
            EventType::Wheel { delta_x, delta_y } => RawEventType::Scroll { delta_x, delta_y },
            EventType::KeyPress(key) => RawEventType::KeyDown {
                key: format_key(key),
            },
            EventType::KeyRelease(key) => RawEventType::KeyUp {
                key: format_key(key),
            },
        })
    }
}

fn map_button(button: rdev::Button) -> Option<MouseButton> {
    match button {
        rdev::Button::Left => Some(MouseButton::Left),
        rdev::Button::Right => Some(MouseButton::Right),
        rdev::Button::Middle => Some(MouseButton::Middle),
        rdev::Button::Unknown(_) => None,
    }
}

/// Canonical name for an `rdev` key.
fn format_key(key: rdev::Key) -> String {
    use rdev::Key;

    let name = match key {
        Key::Alt => "alt",
        Key::AltGr => "alt",
        Key::ControlLeft | Key::ControlRight => "ctrl",
        Key::ShiftLeft | Key::ShiftRight => "shift",
        Key::MetaLeft | Key::MetaRight => "meta",
        Key::Backspace => "backspace",
        Key::CapsLock => "capslock",
        Key::Delete => "delete",
        Key::End => "end",
        Key::Home => "home",
        Key::PageDown => "pagedown",
        Key::PageUp => "pageup",
        Key::Escape => "esc",
        Key::Return | Key::KpReturn => "enter",
        Key::Space => "space",
        Key::Tab => "tab",
        Key::UpArrow => "up",
        Key::DownArrow => "down",
        Key::LeftArrow => "left",
        Key::RightArrow => "right",
        Key::PrintScreen => "printscreen",
        Key::ScrollLock => "scrolllock",
        Key::Pause => "pause",
        Key::NumLock => "numlock",
        Key::Insert => "insert",
        Key::Function => "fn",
        Key::F1 => "f1",
        Key::F2 => "f2",
        Key::F3 => "f3",
        Key::F4 => "f4",
        Key::F5 => "f5",
        Key::F6 => "f6",
        Key::F7 => "f7",
        Key::F8 => "f8",
        Key::F9 => "f9",
        Key::F10 => "f10",
        Key::F11 => "f11",
        Key::F12 => "f12",
        Key::BackQuote => "`",
        Key::Num1 | Key::Kp1 => "1",
        Key::Num2 | Key::Kp2 => "2",
        Key::Num3 | Key::Kp3 => "3",
        Key::Num4 | Key::Kp4 => "4",
        Key::Num5 | Key::Kp5 => "5",
        Key::Num6 | Key::Kp6 => "6",
        Key::Num7 | Key::Kp7 => "7",
        Key::Num8 | Key::Kp8 => "8",
        Key::Num9 | Key::Kp9 => "9",
        Key::Num0 | Key::Kp0 => "0",
        Key::Minus | Key::KpMinus => "-",
        Key::KpPlus => "+",
        Key::KpMultiply => "*",
        Key::KpDivide | Key::Slash => "/",
        Key::KpDelete => "delete",
        Key::Equal => "=",
        Key::LeftBracket => "[",
        Key::RightBracket => "]",
        Key::SemiColon => ";",
        Key::Quote => "'",
        Key::BackSlash | Key::IntlBackslash => "\\",
        Key::Comma => ",",
        Key::Dot => ".",
        Key::KeyA => "a",
        Key::KeyB => "b",
        Key::KeyC => "c",
        Key::KeyD => "d",
        Key::KeyE => "e",
        Key::KeyF => "f",
        Key::KeyG => "g",
        Key::KeyH => "h",
        Key::KeyI => "i",
        Key::KeyJ => "j",
        Key::KeyK => "k",
        Key::KeyL => "l",
        Key::KeyM => "m",
        Key::KeyN => "n",
        Key::KeyO => "o",
        Key::KeyP => "p",
        Key::KeyQ => "q",
        Key::KeyR => "r",
        Key::KeyS => "s",
        Key::KeyT => "t",
        Key::KeyU => "u",
        Key::KeyV => "v",
        Key::KeyW => "w",
        Key::KeyX => "x",
        Key::KeyY => "y",
        Key::KeyZ => "z",
        Key::Unknown(code) => return format!("unknown_{code}"),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use posflow_core::keys::Chord;

    #[test]
    fn test_format_key_canonical() {
        assert_eq!(format_key(rdev::Key::ControlLeft), "ctrl");
        assert_eq!(format_key(rdev::Key::Escape), "esc");
        assert_eq!(format_key(rdev::Key::F8), "f8");
        assert_eq!(format_key(rdev::Key::KeyQ), "q");
        assert_eq!(format_key(rdev::Key::Unknown(77)), "unknown_77");
        // Hook names must survive chord normalization unchanged.
        for key in [rdev::Key::Return, rdev::Key::UpArrow, rdev::Key::PageDown] {
            let name = format_key(key);
            assert_eq!(Chord::parse(&name).unwrap().key, name);
        }
    }

    #[test]
    fn test_buttons_use_last_position() {
        let mut translator = Translator::default();
        translator.translate(EventType::MouseMove { x: 10.4, y: 20.6 });
        assert_eq!(
            translator.translate(EventType::ButtonPress(rdev::Button::Left)),
            Some(RawEventType::MouseDown {
                x: 10,
                y: 21,
                button: MouseButton::Left
            })
        );
        assert_eq!(
            translator.translate(EventType::ButtonRelease(rdev::Button::Unknown(4))),
            None
        );
    }
}
