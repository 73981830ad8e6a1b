//! Player: runs a sequence on its own thread.

use super::{EngineEvent, Executor, RunReport, StateCell};
use crate::{ActionSequence, ExecError, SessionState};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::info;

/// Handle to a running player thread.
pub struct PlayerHandle {
    events: Receiver<EngineEvent>,
    state: StateCell,
    thread: JoinHandle<Result<RunReport, ExecError>>,
}

impl PlayerHandle {
    /// Event stream of the underlying executor.
    pub fn events(&self) -> &Receiver<EngineEvent> {
        &self.events
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the run to end. A panic on the player thread is re-raised.
    pub fn join(self) -> Result<RunReport, ExecError> {
        match self.thread.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

pub struct Player;

impl Player {
    /// Run `sequence` on a new thread. With `arm`, the thread first waits for
    /// a `Start` signal; a terminal signal during that wait ends the run as
    /// `Cancelled` without executing anything.
    pub fn spawn(
        executor: Arc<Executor>,
        sequence: ActionSequence,
        loops: u32,
        arm: bool,
    ) -> PlayerHandle {
        let events = executor.events();
        let state = executor.state_cell();

        let thread = thread::spawn(move || {
            info!("Player thread started");
            let result = if arm {
                executor.run_armed(&sequence, loops, None)
            } else {
                executor.run(&sequence, loops)
            };
            info!("Player thread exiting");
            result
        });

        PlayerHandle {
            events,
            state,
            thread,
        }
    }
}
