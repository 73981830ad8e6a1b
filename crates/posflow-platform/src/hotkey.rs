//! Global hotkeys: the control signal source for a run.
//!
//! A [`HotkeyMatcher`] turns the hook's key stream into [`Hotkey`] presses.
//! A [`HotkeyListener`] runs one on its own thread and forwards the matching
//! control signals to the executor. It only ever enqueues, so it never
//! waits on the executor.

use crate::input_hook::HookEvent;
use crate::{PlatformError, PlatformResult};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use posflow_core::keys::{normalize_key, Chord, Modifier, Modifiers};
use posflow_core::{ControlSignal, HotkeySettings, RawEventType, SessionState, SignalSender, StateCell};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hotkey {
    StartStop,
    PauseResume,
    Kill,
    EmergencyStop,
}

/// Signal a hotkey stands for given the current session state. `None` when
/// the press means nothing in that state.
pub fn signal_for(hotkey: Hotkey, state: SessionState) -> Option<ControlSignal> {
    match (hotkey, state) {
        (Hotkey::StartStop, SessionState::Stopped) => Some(ControlSignal::Start),
        (Hotkey::StartStop, _) => Some(ControlSignal::Stop),
        (Hotkey::PauseResume, SessionState::Running) => Some(ControlSignal::Pause),
        (Hotkey::PauseResume, SessionState::Paused) => Some(ControlSignal::Resume),
        (Hotkey::PauseResume, SessionState::Stopped) => None,
        (Hotkey::Kill, _) => Some(ControlSignal::Cancel),
        (Hotkey::EmergencyStop, _) => Some(ControlSignal::EmergencyStop),
    }
}

/// Matches key events against the configured bindings.
#[derive(Debug, Clone)]
pub struct HotkeyMatcher {
    bindings: Vec<(Chord, Hotkey)>,
    held: Modifiers,
    /// Non-modifier keys currently down, so auto-repeat fires once.
    down: HashSet<String>,
}

impl HotkeyMatcher {
    pub fn from_settings(settings: &HotkeySettings) -> PlatformResult<Self> {
        let parse = |keys: &Vec<String>, hotkey| {
            Chord::from_parts(keys)
                .map(|chord| (chord, hotkey))
                .ok_or_else(|| PlatformError::InvalidKey(keys.join("+")))
        };
        Ok(Self {
            bindings: vec![
                parse(&settings.start_stop, Hotkey::StartStop)?,
                parse(&settings.pause_resume, Hotkey::PauseResume)?,
                parse(&settings.kill, Hotkey::Kill)?,
                parse(&settings.emergency_stop, Hotkey::EmergencyStop)?,
            ],
            held: Modifiers::empty(),
            down: HashSet::new(),
        })
    }

    /// Bound chords, for excluding them from recordings.
    pub fn chords(&self) -> Vec<Chord> {
        self.bindings.iter().map(|(c, _)| c.clone()).collect()
    }

    /// Feed one raw event; returns the hotkey it completes, if any.
    pub fn feed(&mut self, event: &RawEventType) -> Option<Hotkey> {
        match event {
            RawEventType::KeyDown { key } => {
                if let Some(m) = Modifier::from_name(key) {
                    self.held.insert(m);
                    return None;
                }
                let key = normalize_key(key);
                if !self.down.insert(key.clone()) {
                    return None;
                }
                let pressed = Chord::new(self.held, &key);
                self.bindings
                    .iter()
                    .find(|(chord, _)| *chord == pressed)
                    .map(|(_, hotkey)| *hotkey)
            }
            RawEventType::KeyUp { key } => {
                match Modifier::from_name(key) {
                    Some(m) => self.held.remove(m),
                    None => {
                        self.down.remove(&normalize_key(key));
                    }
                }
                None
            }
            _ => None,
        }
    }
}

/// Handle to a running hotkey listener thread.
pub struct HotkeyListener {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl HotkeyListener {
    /// Listen on `events`, sending signals chosen by the state in `state`.
    pub fn spawn(
        events: Receiver<HookEvent>,
        mut matcher: HotkeyMatcher,
        signals: SignalSender,
        state: StateCell,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        let thread = thread::spawn(move || {
            info!("Hotkey listener started");
            while !thread_stop.load(Ordering::Relaxed) {
                let event = match events.recv_timeout(Duration::from_millis(100)) {
                    Ok(event) => event,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                };
                let Some(hotkey) = matcher.feed(&event.event) else {
                    continue;
                };
                let current = state.get();
                match signal_for(hotkey, current) {
                    Some(ControlSignal::EmergencyStop) => {
                        info!("Emergency stop hotkey");
                        signals.emergency_stop();
                    }
                    Some(signal) => {
                        info!(?hotkey, ?signal, "Hotkey pressed");
                        signals.send(signal);
                    }
                    None => debug!(?hotkey, ?current, "hotkey ignored in this state"),
                }
            }
            info!("Hotkey listener exiting");
        });

        Self {
            stop,
            thread: Some(thread),
        }
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}
