//! Control signals between the hotkey listener and the executor.
//!
//! The listener side only ever enqueues; the executor drains at checkpoints.

use crate::SessionState;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Start,
    Pause,
    Resume,
    Stop,
    Cancel,
    EmergencyStop,
}

impl ControlSignal {
    /// Signals that end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ControlSignal::Stop | ControlSignal::Cancel | ControlSignal::EmergencyStop
        )
    }
}

/// Constructor for a connected sender/receiver pair.
pub struct SignalChannel;

impl SignalChannel {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (SignalSender, SignalReceiver) {
        let (tx, rx) = unbounded();
        let emergency = Arc::new(AtomicBool::new(false));
        (
            SignalSender {
                tx,
                emergency: emergency.clone(),
            },
            SignalReceiver { rx, emergency },
        )
    }
}

/// Producer half. Cheap to clone, never blocks.
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: Sender<ControlSignal>,
    emergency: Arc<AtomicBool>,
}

impl SignalSender {
    pub fn send(&self, signal: ControlSignal) {
        if signal == ControlSignal::EmergencyStop {
            self.emergency.store(true, Ordering::SeqCst);
        }
        if let Err(e) = self.tx.send(signal) {
            warn!("Failed to send control signal: {}", e);
        }
    }

    /// Raise the sticky emergency flag and enqueue `EmergencyStop`.
    ///
    /// The flag is seen at the next checkpoint even when other signals are
    /// still queued ahead of it.
    pub fn emergency_stop(&self) {
        self.send(ControlSignal::EmergencyStop);
    }
}

/// Consumer half, owned by one executor.
#[derive(Debug)]
pub struct SignalReceiver {
    rx: Receiver<ControlSignal>,
    emergency: Arc<AtomicBool>,
}

impl SignalReceiver {
    pub fn try_recv(&self) -> Option<ControlSignal> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<ControlSignal, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn emergency_raised(&self) -> bool {
        self.emergency.load(Ordering::SeqCst)
    }

    /// Discard everything queued and lower the emergency flag.
    pub(crate) fn reset(&self) {
        let mut dropped = 0usize;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "discarded stale control signals");
        }
        self.emergency.store(false, Ordering::SeqCst);
    }
}

/// Lock-free view of a [`SessionState`], written by the executor and read by
/// the hotkey listener to decide what a toggle key means.
#[derive(Debug, Clone, Default)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn get(&self) -> SessionState {
        match self.0.load(Ordering::SeqCst) {
            1 => SessionState::Running,
            2 => SessionState::Paused,
            _ => SessionState::Stopped,
        }
    }

    pub fn set(&self, state: SessionState) {
        let raw = match state {
            SessionState::Stopped => 0,
            SessionState::Running => 1,
            SessionState::Paused => 2,
        };
        self.0.store(raw, Ordering::SeqCst);
    }
}
