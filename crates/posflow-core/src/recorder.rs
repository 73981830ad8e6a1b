//! Recording engine: captures input events and converts them to an
//! [`ActionSequence`] of monitor-relative actions.

use crate::keys::{Chord, Modifier, Modifiers};
use crate::{
    from_absolute, Action, ActionKind, ActionSequence, MonitorGeometry, MouseButton,
    SequenceMeta, SessionState,
};
use tracing::{debug, info, warn};

/// Events emitted by the recorder.
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    StateChanged {
        old: SessionState,
        new: SessionState,
    },
    /// An action was appended (for UI feedback).
    ActionCaptured { index: usize, action: Action },
    /// A raw event could not become an action.
    EventSkipped { reason: String },
}

/// Raw event types from the input hook. Positions are absolute pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEventType {
    MouseMove { x: i32, y: i32 },
    MouseDown { x: i32, y: i32, button: MouseButton },
    MouseUp { x: i32, y: i32, button: MouseButton },
    Scroll { delta_x: i64, delta_y: i64 },
    KeyDown { key: String },
    KeyUp { key: String },
}

/// The recorder collects raw input events and converts them to actions.
///
/// Timestamps are milliseconds on any monotonic base, as long as one base is
/// used for the whole session.
#[derive(Debug, Default)]
pub struct Recorder {
    state: SessionState,
    geometry: MonitorGeometry,
    actions: Vec<Action>,
    /// Pause-adjusted timestamp of each recorded action.
    stamps: Vec<u64>,
    pause_started: Option<u64>,
    total_paused_ms: u64,
    last_mouse_pos: (i32, i32),
    held: Modifiers,
    ignored: Vec<Chord>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chords that are never recorded, typically the control hotkeys.
    pub fn with_ignored(mut self, chords: Vec<Chord>) -> Self {
        self.ignored = chords;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn last_mouse_position(&self) -> (i32, i32) {
        self.last_mouse_pos
    }

    fn transition(&mut self, new: SessionState) -> Option<RecorderEvent> {
        let old = self.state;
        if old == new {
            return None;
        }
        self.state = new;
        info!(?old, ?new, "Recorder state transition");
        Some(RecorderEvent::StateChanged { old, new })
    }

    /// Start recording against `geometry`. No-op unless stopped.
    pub fn start(&mut self, geometry: MonitorGeometry) -> Option<RecorderEvent> {
        if self.state != SessionState::Stopped {
            return None;
        }

        self.geometry = geometry;
        self.actions.clear();
        self.stamps.clear();
        self.pause_started = None;
        self.total_paused_ms = 0;
        self.held = Modifiers::empty();

        self.transition(SessionState::Running)
    }

    pub fn pause(&mut self, timestamp_ms: u64) -> Option<RecorderEvent> {
        if self.state != SessionState::Running {
            return None;
        }
        self.pause_started = Some(timestamp_ms);
        self.transition(SessionState::Paused)
    }

    pub fn resume(&mut self, timestamp_ms: u64) -> Option<RecorderEvent> {
        if self.state != SessionState::Paused {
            return None;
        }
        if let Some(started) = self.pause_started.take() {
            self.total_paused_ms += timestamp_ms.saturating_sub(started);
        }
        self.transition(SessionState::Running)
    }

    /// Stop recording and build the sequence. `None` when not recording.
    ///
    /// The gap to the next action becomes each action's `delay`, since the
    /// executor applies a delay after running the action.
    pub fn stop(&mut self, meta: SequenceMeta) -> Option<ActionSequence> {
        if self.state == SessionState::Stopped {
            return None;
        }
        self.transition(SessionState::Stopped);

        let mut actions = std::mem::take(&mut self.actions);
        let stamps = std::mem::take(&mut self.stamps);
        for (i, action) in actions.iter_mut().enumerate() {
            action.delay = match stamps.get(i + 1) {
                Some(next) => next.saturating_sub(stamps[i]) as f64 / 1000.0,
                None => 0.0,
            };
        }

        info!(actions = actions.len(), "Recording stopped");
        Some(ActionSequence { meta, actions })
    }

    /// Feed one raw event.
    pub fn push_event(&mut self, timestamp_ms: u64, event: RawEventType) -> Option<RecorderEvent> {
        // Position and modifiers are tracked in every state so a pause
        // never leaves a modifier stuck.
        match &event {
            RawEventType::MouseMove { x, y }
            | RawEventType::MouseDown { x, y, .. }
            | RawEventType::MouseUp { x, y, .. } => self.last_mouse_pos = (*x, *y),
            RawEventType::KeyUp { key } => {
                if let Some(m) = Modifier::from_name(key) {
                    self.held.remove(m);
                }
            }
            _ => {}
        }

        let held_before = self.held;
        if let RawEventType::KeyDown { key } = &event {
            if let Some(m) = Modifier::from_name(key) {
                self.held.insert(m);
                return None;
            }
        }

        if self.state != SessionState::Running {
            return None;
        }
        let adjusted = timestamp_ms.saturating_sub(self.total_paused_ms);

        let kind = match event {
            RawEventType::MouseDown { x, y, button } => match from_absolute(x, y, &self.geometry) {
                Ok((monitor, rel_x, rel_y)) => ActionKind::Click {
                    monitor,
                    rel_x,
                    rel_y,
                    button,
                    jitter: None,
                },
                Err(e) => {
                    warn!(x, y, error = %e, "click outside every monitor, skipped");
                    return Some(RecorderEvent::EventSkipped {
                        reason: e.to_string(),
                    });
                }
            },
            RawEventType::KeyDown { key } => {
                let chord = Chord::new(held_before, &key);
                if self.ignored.contains(&chord) {
                    debug!(%chord, "ignored control chord");
                    return None;
                }
                ActionKind::KeyPress {
                    key: chord.to_string(),
                }
            }
            RawEventType::MouseMove { .. }
            | RawEventType::MouseUp { .. }
            | RawEventType::Scroll { .. }
            | RawEventType::KeyUp { .. } => return None,
        };

        let action = Action::new(kind);
        debug!(adjusted, kind = action.kind_name(), "Recording action");
        self.actions.push(action.clone());
        self.stamps.push(adjusted);

        Some(RecorderEvent::ActionCaptured {
            index: self.actions.len() - 1,
            action,
        })
    }
}
