//! Execution engine: action state machine + player thread.
//!
//! A run walks the sequence `loops` times. Between any two side effects the
//! executor passes a checkpoint, where queued control signals are applied:
//! stop/cancel end the run, pause blocks on the signal channel until resume.
//! Every sleep is cut into `check_interval` chunks so no checkpoint is ever
//! further apart than one chunk, one injected input or one condition poll.

mod clock;
mod player;
mod signal;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use player::{Player, PlayerHandle};
pub use signal::{ControlSignal, SignalChannel, SignalReceiver, SignalSender, StateCell};

use crate::condition::{Probe, ProbeResult, TextMatcher};
use crate::ports::{PixelBuffer, Ports};
use crate::{
    to_absolute, to_absolute_rect, validate_sequence, AbsRect, Action, ActionKind,
    ActionSequence, ExecError, ExecutionSettings, MonitorGeometry, PollSpec, SessionState,
    MAX_CLICK_JITTER,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Absolute coordinates an action resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTarget {
    None,
    Point { x: i32, y: i32 },
    Rect(AbsRect),
}

/// Snapshot of a run, pushed by the executor after every action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunProgress {
    pub action_index: usize,
    /// 1-based loop iteration.
    pub iteration: u32,
    /// Actions completed so far, across iterations.
    pub executed: u64,
    /// Wall time since the run started, minus time spent paused.
    pub elapsed_active: Duration,
    pub last_error: Option<ExecError>,
    /// Center of the most recent template match.
    pub last_match: Option<(i32, i32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    /// `action_index` is `None` only when the run failed before reaching any
    /// action.
    Aborted {
        reason: ExecError,
        action_index: Option<usize>,
    },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub progress: RunProgress,
}

/// Events emitted by the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged {
        old: SessionState,
        new: SessionState,
    },
    LoopStarted {
        iteration: u32,
        total: u32,
    },
    ActionStarting {
        index: usize,
        iteration: u32,
        kind: String,
    },
    /// Coordinates resolved; emitted identically in live and dry runs.
    ActionResolved {
        index: usize,
        iteration: u32,
        kind: String,
        target: ResolvedTarget,
        dry_run: bool,
    },
    ConditionMet {
        index: usize,
        location: Option<(i32, i32)>,
    },
    /// A timed-out wait that the run continued past.
    ActionSkipped {
        index: usize,
        reason: String,
    },
    ActionCompleted {
        index: usize,
    },
    IterationCompleted {
        iteration: u32,
    },
    Progress(RunProgress),
    Finished(RunOutcome),
}

/// Interprets action sequences against a set of ports.
///
/// One executor runs at most one sequence at a time; the signal receiver it
/// owns is what ties it to a particular hotkey listener.
pub struct Executor {
    ports: Ports,
    settings: ExecutionSettings,
    clock: Arc<dyn Clock>,
    signals: SignalReceiver,
    state: StateCell,
    event_tx: Sender<EngineEvent>,
    event_rx: Receiver<EngineEvent>,
    active: AtomicBool,
}

struct ActiveGuard<'a>(&'a AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Executor {
    pub fn new(ports: Ports, settings: ExecutionSettings, signals: SignalReceiver) -> Self {
        let (event_tx, event_rx) = bounded(1024);
        Self {
            ports,
            settings,
            clock: Arc::new(SystemClock::new()),
            signals,
            state: StateCell::default(),
            event_tx,
            event_rx,
            active: AtomicBool::new(false),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    /// Shared view of the session state, for the hotkey listener.
    pub fn state_cell(&self) -> StateCell {
        self.state.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Event stream. All clones share one queue.
    pub fn events(&self) -> Receiver<EngineEvent> {
        self.event_rx.clone()
    }

    /// Block until `Start` arrives. Returns `false` on a terminal signal or
    /// when `timeout` elapses first.
    pub fn wait_for_start(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        info!("Waiting for start signal");
        loop {
            if self.signals.emergency_raised() {
                return false;
            }
            let wait = match deadline {
                Some(d) => match d.checked_duration_since(Instant::now()) {
                    Some(left) => left.min(self.settings.pause_poll()),
                    None => return false,
                },
                None => self.settings.pause_poll(),
            };
            match self.signals.recv_timeout(wait) {
                Ok(ControlSignal::Start) => return true,
                Ok(signal) if signal.is_terminal() => {
                    info!(?signal, "Start wait aborted");
                    return false;
                }
                Ok(signal) => debug!(?signal, "ignored while waiting for start"),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    /// Run `sequence` `loops` times (at least once) on the calling thread.
    ///
    /// Only a second concurrent run is an `Err`; every other failure ends
    /// the run and is reported through [`RunOutcome::Aborted`].
    pub fn run(&self, sequence: &ActionSequence, loops: u32) -> Result<RunReport, ExecError> {
        let _guard = self.claim()?;

        // Anything queued now targets a state the run is not in yet.
        self.signals.reset();
        Ok(self.run_claimed(sequence, loops))
    }

    /// Wait for `Start`, then run as [`Executor::run`] does.
    ///
    /// Signals queued after `Start` apply to the run. A terminal signal or
    /// an elapsed `timeout` before `Start` ends it as `Cancelled` without
    /// executing anything.
    pub fn run_armed(
        &self,
        sequence: &ActionSequence,
        loops: u32,
        timeout: Option<Duration>,
    ) -> Result<RunReport, ExecError> {
        let _guard = self.claim()?;

        if !self.wait_for_start(timeout) {
            self.signals.reset();
            let outcome = RunOutcome::Cancelled;
            self.emit(EngineEvent::Finished(outcome.clone()));
            return Ok(RunReport {
                outcome,
                progress: RunProgress::default(),
            });
        }
        Ok(self.run_claimed(sequence, loops))
    }

    fn claim(&self) -> Result<ActiveGuard<'_>, ExecError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Rejected run request: a run is already active");
            return Err(ExecError::AlreadyRunning);
        }
        Ok(ActiveGuard(&self.active))
    }

    fn run_claimed(&self, sequence: &ActionSequence, loops: u32) -> RunReport {
        let loops = loops.max(1);
        info!(
            name = %sequence.meta.name,
            actions = sequence.actions.len(),
            loops,
            dry_run = self.settings.dry_run,
            "Run starting"
        );

        let mut run = Run::new(self);
        let outcome = run.execute(sequence, loops);
        run.progress.elapsed_active = run.active_elapsed();

        match &outcome {
            RunOutcome::Completed => info!(executed = run.progress.executed, "Run completed"),
            RunOutcome::Cancelled => info!(executed = run.progress.executed, "Run cancelled"),
            RunOutcome::Aborted {
                reason,
                action_index,
            } => error!(error = %reason, ?action_index, "Run aborted"),
        }

        // Leftover signals and the emergency flag belong to this run only.
        self.signals.reset();

        self.emit(EngineEvent::Progress(run.progress.clone()));
        self.emit(EngineEvent::Finished(outcome.clone()));

        RunReport {
            outcome,
            progress: run.progress,
        }
    }

    fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to emit event: {}", e);
        }
    }
}

/// Why a run stopped early.
enum Halt {
    Cancelled,
    Failed(ExecError),
}

impl From<ExecError> for Halt {
    fn from(err: ExecError) -> Self {
        Halt::Failed(err)
    }
}

/// State of one run. Lives on the executing thread only.
struct Run<'a> {
    exec: &'a Executor,
    dry_run: bool,
    geometry: MonitorGeometry,
    progress: RunProgress,
    rng: StdRng,
    templates: HashMap<String, Arc<PixelBuffer>>,
    started: Duration,
    paused_total: Duration,
    paused_since: Option<Duration>,
}

/// Seconds to a `Duration`. Too large saturates, negative or NaN is zero.
fn secs(seconds: f64) -> Duration {
    match Duration::try_from_secs_f64(seconds) {
        Ok(duration) => duration,
        Err(_) if seconds > 0.0 => Duration::MAX,
        Err(_) => Duration::ZERO,
    }
}

impl<'a> Run<'a> {
    fn new(exec: &'a Executor) -> Self {
        let rng = match exec.settings.jitter_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            exec,
            dry_run: exec.settings.dry_run,
            geometry: MonitorGeometry::default(),
            progress: RunProgress::default(),
            rng,
            templates: HashMap::new(),
            started: exec.clock.now(),
            paused_total: Duration::ZERO,
            paused_since: None,
        }
    }

    fn execute(&mut self, sequence: &ActionSequence, loops: u32) -> RunOutcome {
        if let Err(errors) = validate_sequence(sequence) {
            for e in &errors {
                warn!(%e, "invalid action");
            }
            let first = &errors[0];
            let reason = ExecError::InvalidAction(first.to_string());
            self.progress.last_error = Some(reason.clone());
            return RunOutcome::Aborted {
                reason,
                action_index: Some(first.index),
            };
        }

        match self.exec.ports.monitors.enumerate_monitors() {
            Ok(geometry) if !geometry.is_empty() => {
                debug!(monitors = geometry.len(), "geometry captured");
                self.geometry = geometry;
            }
            Ok(_) => {
                let reason = ExecError::CaptureUnavailable("no monitors detected".into());
                self.progress.last_error = Some(reason.clone());
                return RunOutcome::Aborted {
                    reason,
                    action_index: None,
                };
            }
            Err(e) => {
                let reason = ExecError::from(e);
                self.progress.last_error = Some(reason.clone());
                return RunOutcome::Aborted {
                    reason,
                    action_index: None,
                };
            }
        }

        self.transition(SessionState::Running);
        let result = self.run_loops(sequence, loops);
        if let Some(since) = self.paused_since.take() {
            self.paused_total += self.exec.clock.now().saturating_sub(since);
        }
        self.transition(SessionState::Stopped);

        match result {
            Ok(()) => RunOutcome::Completed,
            Err((Halt::Cancelled, _)) => RunOutcome::Cancelled,
            Err((Halt::Failed(reason), index)) => {
                self.progress.last_error = Some(reason.clone());
                RunOutcome::Aborted {
                    reason,
                    action_index: Some(index),
                }
            }
        }
    }

    fn run_loops(&mut self, sequence: &ActionSequence, loops: u32) -> Result<(), (Halt, usize)> {
        for iteration in 1..=loops {
            self.progress.iteration = iteration;
            self.exec.emit(EngineEvent::LoopStarted {
                iteration,
                total: loops,
            });

            for (index, action) in sequence.actions.iter().enumerate() {
                self.progress.action_index = index;
                self.step(index, action).map_err(|halt| (halt, index))?;
            }

            self.exec.emit(EngineEvent::IterationCompleted { iteration });
            if iteration < loops {
                let gap = self.exec.settings.inter_loop_delay();
                self.sleep_checked(gap)
                    .map_err(|halt| (halt, self.progress.action_index))?;
            }
        }
        Ok(())
    }

    fn step(&mut self, index: usize, action: &Action) -> Result<(), Halt> {
        self.checkpoint()?;
        let iteration = self.progress.iteration;
        debug!(index, iteration, kind = action.kind_name(), "dispatching");
        self.exec.emit(EngineEvent::ActionStarting {
            index,
            iteration,
            kind: action.kind_name().to_string(),
        });

        match self.dispatch(index, action) {
            Ok(()) => {
                self.progress.executed += 1;
                self.exec.emit(EngineEvent::ActionCompleted { index });
            }
            Err(Halt::Failed(e)) if e.is_timeout() && self.exec.settings.continue_on_timeout => {
                warn!(index, error = %e, "condition timed out, continuing");
                self.exec.emit(EngineEvent::ActionSkipped {
                    index,
                    reason: e.to_string(),
                });
                self.progress.last_error = Some(e);
            }
            Err(halt) => return Err(halt),
        }

        self.checkpoint()?;
        let delay = self.jittered_delay(action.delay);
        self.sleep_checked(delay)?;

        self.progress.elapsed_active = self.active_elapsed();
        self.exec.emit(EngineEvent::Progress(self.progress.clone()));
        Ok(())
    }

    fn dispatch(&mut self, index: usize, action: &Action) -> Result<(), Halt> {
        let exec = self.exec;
        let injector = &exec.ports.injector;

        match &action.kind {
            ActionKind::Click {
                monitor,
                rel_x,
                rel_y,
                button,
                jitter,
            } => {
                let (x, y) = to_absolute(*monitor, *rel_x, *rel_y, &self.geometry)
                    .map_err(ExecError::from)?;
                let radius = jitter.or(exec.settings.default_click_jitter).unwrap_or(0);
                let (x, y) = self.jitter_point(*monitor, x, y, radius)?;
                self.resolved(index, action, ResolvedTarget::Point { x, y });
                if self.dry_run {
                    return self.checkpoint();
                }
                injector.move_to(x, y).map_err(ExecError::from)?;
                self.checkpoint()?;
                injector.click(x, y, *button).map_err(ExecError::from)?;
            }
            ActionKind::Wait { seconds } => {
                self.resolved(index, action, ResolvedTarget::None);
                self.sleep_checked(secs(*seconds))?;
            }
            ActionKind::KeyPress { key } => {
                self.resolved(index, action, ResolvedTarget::None);
                if !self.dry_run {
                    injector.key_press(key).map_err(ExecError::from)?;
                }
            }
            ActionKind::TypeText { text, press_enter } => {
                self.resolved(index, action, ResolvedTarget::None);
                if !self.dry_run {
                    injector.type_text(text).map_err(ExecError::from)?;
                    if *press_enter {
                        self.checkpoint()?;
                        injector.key_press("enter").map_err(ExecError::from)?;
                    }
                }
            }
            ActionKind::WaitForPixel {
                monitor,
                rel_x,
                rel_y,
                color,
                tolerance,
                poll,
            } => {
                let (x, y) = to_absolute(*monitor, *rel_x, *rel_y, &self.geometry)
                    .map_err(ExecError::from)?;
                self.resolved(index, action, ResolvedTarget::Point { x, y });
                let probe = Probe::Pixel {
                    monitor: *monitor,
                    x,
                    y,
                    color: *color,
                    tolerance: *tolerance,
                };
                self.poll_condition(index, &probe, poll)?;
            }
            ActionKind::WaitForArea {
                monitor,
                rect,
                metric,
                op,
                threshold,
                poll,
            } => {
                let rect = to_absolute_rect(*monitor, rect, &self.geometry)
                    .map_err(ExecError::from)?;
                self.resolved(index, action, ResolvedTarget::Rect(rect));
                let probe = Probe::Area {
                    monitor: *monitor,
                    rect,
                    metric: *metric,
                    op: *op,
                    threshold: *threshold,
                };
                self.poll_condition(index, &probe, poll)?;
            }
            ActionKind::WaitForTemplate {
                template,
                monitor,
                region,
                threshold,
                poll,
            } => {
                let rect = match region {
                    Some(region) => to_absolute_rect(*monitor, region, &self.geometry),
                    None => self.geometry.get(*monitor).map(|b| b.as_rect()),
                }
                .map_err(ExecError::from)?;
                let reference = self.template(template)?;
                self.resolved(index, action, ResolvedTarget::Rect(rect));
                let probe = Probe::Template {
                    monitor: *monitor,
                    rect,
                    template: &*reference,
                    threshold: *threshold,
                };
                if let Some(location) = self.poll_condition(index, &probe, poll)? {
                    self.progress.last_match = Some(location);
                }
            }
            ActionKind::WaitForText {
                monitor,
                rect,
                pattern,
                mode,
                poll,
            } => {
                let rect = to_absolute_rect(*monitor, rect, &self.geometry)
                    .map_err(ExecError::from)?;
                let matcher = TextMatcher::new(pattern, *mode)
                    .map_err(|e| ExecError::InvalidAction(format!("pattern: {e}")))?;
                self.resolved(index, action, ResolvedTarget::Rect(rect));
                let probe = Probe::Text {
                    monitor: *monitor,
                    rect,
                    matcher: &matcher,
                };
                self.poll_condition(index, &probe, poll)?;
            }
        }

        Ok(())
    }

    fn resolved(&self, index: usize, action: &Action, target: ResolvedTarget) {
        debug!(index, kind = action.kind_name(), ?target, dry_run = self.dry_run, "resolved");
        self.exec.emit(EngineEvent::ActionResolved {
            index,
            iteration: self.progress.iteration,
            kind: action.kind_name().to_string(),
            target,
            dry_run: self.dry_run,
        });
    }

    /// Poll `probe` until it holds, or fail once `timeout` of active time
    /// has passed. Returns the match location for template probes.
    fn poll_condition(
        &mut self,
        index: usize,
        probe: &Probe<'_>,
        poll: &PollSpec,
    ) -> Result<Option<(i32, i32)>, Halt> {
        if self.dry_run {
            self.checkpoint()?;
            self.exec.emit(EngineEvent::ConditionMet {
                index,
                location: None,
            });
            return Ok(None);
        }

        let exec = self.exec;
        let timeout = secs(poll.timeout);
        let interval = secs(poll.poll_interval);
        let started = self.active_elapsed();
        let mut captured = false;
        let mut last_failure = None;
        let mut polls = 0u32;

        loop {
            self.checkpoint()?;
            polls += 1;
            match probe.evaluate(&*exec.ports.capture, &*exec.ports.recognizer) {
                ProbeResult::Met(location) => {
                    debug!(index, polls, ?location, "condition met");
                    exec.emit(EngineEvent::ConditionMet { index, location });
                    return Ok(location);
                }
                ProbeResult::NotMet => captured = true,
                ProbeResult::CaptureFailed(e) => last_failure = Some(e),
            }

            let waited = self.active_elapsed().saturating_sub(started);
            if waited >= timeout {
                break;
            }
            self.sleep_checked(interval.min(timeout - waited))?;
        }

        debug!(index, polls, "condition not met before timeout");
        match last_failure {
            Some(e) if !captured => Err(ExecError::CaptureUnavailable(e).into()),
            _ => Err(ExecError::ConditionTimeout(timeout).into()),
        }
    }

    fn template(&mut self, id: &str) -> Result<Arc<PixelBuffer>, Halt> {
        if let Some(image) = self.templates.get(id) {
            return Ok(image.clone());
        }
        let image = self
            .exec
            .ports
            .templates
            .load(id)
            .map_err(|e| ExecError::InvalidAction(format!("template `{id}`: {e}")))?;
        debug!(id, width = image.width(), height = image.height(), "template loaded");
        let image = Arc::new(image);
        self.templates.insert(id.to_string(), image.clone());
        Ok(image)
    }

    fn jitter_point(&mut self, monitor: u32, x: i32, y: i32, radius: u32) -> Result<(i32, i32), Halt> {
        if radius == 0 {
            return Ok((x, y));
        }
        let r = i32::try_from(radius)
            .ok()
            .filter(|r| *r as u32 <= MAX_CLICK_JITTER)
            .ok_or_else(|| {
                ExecError::InvalidAction(format!(
                    "jitter {radius} exceeds the {MAX_CLICK_JITTER} px limit"
                ))
            })?;
        let (dx, dy) = loop {
            let dx = self.rng.gen_range(-r..=r);
            let dy = self.rng.gen_range(-r..=r);
            if (dx as i64).pow(2) + (dy as i64).pow(2) <= (r as i64).pow(2) {
                break (dx, dy);
            }
        };
        let bounds = self.geometry.get(monitor).map_err(ExecError::from)?;
        Ok(bounds.clamp(x.saturating_add(dx), y.saturating_add(dy)))
    }

    fn jittered_delay(&mut self, seconds: f64) -> Duration {
        let ratio = self.exec.settings.delay_jitter_ratio;
        if ratio > 0.0 && seconds > 0.0 {
            secs(seconds * self.rng.gen_range(1.0 - ratio..=1.0 + ratio))
        } else {
            secs(seconds)
        }
    }

    fn active_elapsed(&self) -> Duration {
        let now = self.exec.clock.now();
        let paused_now = self
            .paused_since
            .map(|since| now.saturating_sub(since))
            .unwrap_or_default();
        now.saturating_sub(self.started)
            .saturating_sub(self.paused_total)
            .saturating_sub(paused_now)
    }

    /// Sleep in `check_interval` chunks with a checkpoint between chunks.
    /// Dry runs only pass the checkpoint.
    fn sleep_checked(&mut self, duration: Duration) -> Result<(), Halt> {
        if self.dry_run {
            return self.checkpoint();
        }
        let chunk = self.exec.settings.check_interval();
        let mut remaining = duration;
        while !remaining.is_zero() {
            self.checkpoint()?;
            let step = remaining.min(chunk);
            self.exec.clock.sleep(step);
            remaining -= step;
        }
        self.checkpoint()
    }

    /// Apply queued signals; block here while paused.
    fn checkpoint(&mut self) -> Result<(), Halt> {
        if self.exec.signals.emergency_raised() {
            warn!("Emergency stop");
            return Err(Halt::Cancelled);
        }
        while let Some(signal) = self.exec.signals.try_recv() {
            self.apply(signal)?;
        }
        if self.exec.state.get() == SessionState::Paused {
            self.wait_while_paused()?;
        }
        Ok(())
    }

    fn wait_while_paused(&mut self) -> Result<(), Halt> {
        let poll = self.exec.settings.pause_poll();
        while self.exec.state.get() == SessionState::Paused {
            if self.exec.signals.emergency_raised() {
                warn!("Emergency stop while paused");
                return Err(Halt::Cancelled);
            }
            match self.exec.signals.recv_timeout(poll) {
                Ok(signal) => self.apply(signal)?,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Signal source gone while paused, cancelling");
                    return Err(Halt::Cancelled);
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, signal: ControlSignal) -> Result<(), Halt> {
        debug!(?signal, state = ?self.exec.state.get(), "control signal");
        match signal {
            ControlSignal::Stop | ControlSignal::Cancel | ControlSignal::EmergencyStop => {
                info!(?signal, "Run interrupted");
                Err(Halt::Cancelled)
            }
            ControlSignal::Pause => {
                if self.exec.state.get() == SessionState::Running {
                    self.paused_since = Some(self.exec.clock.now());
                    self.transition(SessionState::Paused);
                }
                Ok(())
            }
            ControlSignal::Resume => {
                if self.exec.state.get() == SessionState::Paused {
                    if let Some(since) = self.paused_since.take() {
                        self.paused_total += self.exec.clock.now().saturating_sub(since);
                    }
                    self.transition(SessionState::Running);
                }
                Ok(())
            }
            ControlSignal::Start => Ok(()),
        }
    }

    fn transition(&self, new: SessionState) {
        let old = self.exec.state.get();
        if old != new {
            self.exec.state.set(new);
            info!(?old, ?new, "state transition");
            self.exec.emit(EngineEvent::StateChanged { old, new });
        }
    }
}
