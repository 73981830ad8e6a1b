use super::*;
use crate::ports::{
    FixedMonitors, InputInjector, MonitorSource, PortError, ScreenCapture, TemplateStore,
    TextRecognizer,
};
use crate::{
    AreaMetric, Color, CompareOp, MonitorBox, MouseButton, RelRect, TextMatchMode,
};
use image::{Rgb, RgbImage};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Move(i32, i32),
    Click(i32, i32, MouseButton),
    Key(String),
    Type(String),
}

/// Sends `signal` through `tx` once the `n`-th call happened.
struct Trigger {
    after: usize,
    signal: ControlSignal,
}

fn fire(trigger: &Mutex<Option<Trigger>>, count: usize, tx: &SignalSender) {
    let mut guard = trigger.lock().unwrap();
    if guard.as_ref().map_or(false, |t| t.after == count) {
        let t = guard.take().unwrap();
        match t.signal {
            ControlSignal::EmergencyStop => tx.emergency_stop(),
            other => tx.send(other),
        }
    }
}

struct MockInjector {
    calls: Mutex<Vec<Call>>,
    clicks: Mutex<usize>,
    /// Clicks are recorded, then rejected.
    reject_clicks: Mutex<bool>,
    trigger: Mutex<Option<Trigger>>,
    tx: SignalSender,
}

impl MockInjector {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn clicks(&self) -> usize {
        *self.clicks.lock().unwrap()
    }

    fn after_click(&self, after: usize, signal: ControlSignal) {
        *self.trigger.lock().unwrap() = Some(Trigger { after, signal });
    }

    fn set_clicks_rejected(&self) {
        *self.reject_clicks.lock().unwrap() = true;
    }
}

impl InputInjector for MockInjector {
    fn move_to(&self, x: i32, y: i32) -> Result<(), PortError> {
        self.calls.lock().unwrap().push(Call::Move(x, y));
        Ok(())
    }

    fn click(&self, x: i32, y: i32, button: MouseButton) -> Result<(), PortError> {
        self.calls.lock().unwrap().push(Call::Click(x, y, button));
        let count = {
            let mut clicks = self.clicks.lock().unwrap();
            *clicks += 1;
            *clicks
        };
        fire(&self.trigger, count, &self.tx);
        if *self.reject_clicks.lock().unwrap() {
            return Err(PortError::InjectionUnavailable("input blocked".into()));
        }
        Ok(())
    }

    fn key_press(&self, key: &str) -> Result<(), PortError> {
        self.calls.lock().unwrap().push(Call::Key(key.to_string()));
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), PortError> {
        self.calls.lock().unwrap().push(Call::Type(text.to_string()));
        Ok(())
    }
}

/// Every capture returns a solid image of the requested size.
struct MockCapture {
    color: Mutex<Option<[u8; 3]>>,
    captures: Mutex<Vec<(u32, AbsRect)>>,
    trigger: Mutex<Option<Trigger>>,
    tx: SignalSender,
}

impl MockCapture {
    fn count(&self) -> usize {
        self.captures.lock().unwrap().len()
    }

    fn after_capture(&self, after: usize, signal: ControlSignal) {
        *self.trigger.lock().unwrap() = Some(Trigger { after, signal });
    }

    fn set_unavailable(&self) {
        *self.color.lock().unwrap() = None;
    }
}

impl ScreenCapture for MockCapture {
    fn capture_region(&self, monitor_id: u32, rect: AbsRect) -> Result<PixelBuffer, PortError> {
        let count = {
            let mut captures = self.captures.lock().unwrap();
            captures.push((monitor_id, rect));
            captures.len()
        };
        fire(&self.trigger, count, &self.tx);
        match *self.color.lock().unwrap() {
            Some(rgb) => Ok(RgbImage::from_pixel(
                rect.width.max(1),
                rect.height.max(1),
                Rgb(rgb),
            )),
            None => Err(PortError::CaptureUnavailable("no display".into())),
        }
    }
}

struct FixedText(&'static str);

impl TextRecognizer for FixedText {
    fn recognize(&self, _image: &PixelBuffer) -> Result<String, PortError> {
        Ok(self.0.to_string())
    }
}

struct MapTemplates(HashMap<String, PixelBuffer>);

impl TemplateStore for MapTemplates {
    fn load(&self, id: &str) -> Result<PixelBuffer, PortError> {
        self.0
            .get(id)
            .cloned()
            .ok_or_else(|| PortError::TemplateUnavailable(id.to_string()))
    }
}

struct NoMonitors;

impl MonitorSource for NoMonitors {
    fn enumerate_monitors(&self) -> Result<MonitorGeometry, PortError> {
        Err(PortError::CaptureUnavailable("display server unreachable".into()))
    }
}

const GRAY: [u8; 3] = [10, 10, 10];

fn geometry() -> MonitorGeometry {
    MonitorGeometry::from_boxes([
        MonitorBox::new(0, 0, 1920, 1080),
        MonitorBox::new(1920, 0, 1280, 1024),
    ])
}

struct Harness {
    injector: Arc<MockInjector>,
    capture: Arc<MockCapture>,
    clock: Arc<ManualClock>,
    tx: SignalSender,
    executor: Arc<Executor>,
}

impl Harness {
    fn new(settings: ExecutionSettings) -> Self {
        Self::with_monitors(settings, Arc::new(FixedMonitors(geometry())))
    }

    fn with_monitors(settings: ExecutionSettings, monitors: Arc<dyn MonitorSource>) -> Self {
        let (tx, rx) = SignalChannel::new();
        let injector = Arc::new(MockInjector {
            calls: Mutex::new(Vec::new()),
            clicks: Mutex::new(0),
            reject_clicks: Mutex::new(false),
            trigger: Mutex::new(None),
            tx: tx.clone(),
        });
        let capture = Arc::new(MockCapture {
            color: Mutex::new(Some(GRAY)),
            captures: Mutex::new(Vec::new()),
            trigger: Mutex::new(None),
            tx: tx.clone(),
        });
        let mut templates = HashMap::new();
        templates.insert(
            "gray_patch".to_string(),
            RgbImage::from_pixel(4, 4, Rgb(GRAY)),
        );
        let ports = Ports {
            injector: injector.clone(),
            capture: capture.clone(),
            recognizer: Arc::new(FixedText("  Ready ")),
            monitors,
            templates: Arc::new(MapTemplates(templates)),
        };
        let clock = Arc::new(ManualClock::new());
        let executor = Arc::new(Executor::new(ports, settings, rx).with_clock(clock.clone()));
        Self {
            injector,
            capture,
            clock,
            tx,
            executor,
        }
    }

    fn events(&self) -> Vec<EngineEvent> {
        self.executor.events().try_iter().collect()
    }
}

fn click(monitor: u32, rel_x: f64, rel_y: f64) -> Action {
    Action::new(ActionKind::Click {
        monitor,
        rel_x,
        rel_y,
        button: MouseButton::Left,
        jitter: None,
    })
}

fn key(key: &str) -> Action {
    Action::new(ActionKind::KeyPress { key: key.into() })
}

fn area(op: CompareOp, threshold: f64, timeout: f64) -> Action {
    Action::new(ActionKind::WaitForArea {
        monitor: 1,
        rect: RelRect::new(0.25, 0.25, 0.5, 0.5),
        metric: AreaMetric::AvgBrightness,
        op,
        threshold,
        poll: PollSpec {
            timeout,
            poll_interval: 0.5,
        },
    })
}

fn pixel(color: Color, timeout: f64) -> Action {
    Action::new(ActionKind::WaitForPixel {
        monitor: 2,
        rel_x: 0.5,
        rel_y: 0.5,
        color,
        tolerance: 0,
        poll: PollSpec {
            timeout,
            poll_interval: 0.5,
        },
    })
}

fn seq(actions: Vec<Action>) -> ActionSequence {
    ActionSequence::new("test", actions)
}

#[test]
fn test_loops_dispatch_in_order() {
    let h = Harness::new(ExecutionSettings::default());
    let sequence = seq(vec![click(1, 0.5, 0.5), key("f5")]);

    let report = h.executor.run(&sequence, 3).unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.progress.executed, 6);
    assert_eq!(report.progress.iteration, 3);
    let one_loop = vec![
        Call::Move(960, 540),
        Call::Click(960, 540, MouseButton::Left),
        Call::Key("f5".into()),
    ];
    assert_eq!(
        h.injector.calls(),
        [one_loop.clone(), one_loop.clone(), one_loop].concat()
    );

    let iterations: Vec<u32> = h
        .events()
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::IterationCompleted { iteration } => Some(iteration),
            _ => None,
        })
        .collect();
    assert_eq!(iterations, vec![1, 2, 3]);
    // Two inter-loop gaps of the default 100ms.
    assert_eq!(report.progress.elapsed_active, Duration::from_millis(200));
    assert_eq!(h.executor.state(), SessionState::Stopped);
}

#[test]
fn test_pause_resume_excludes_paused_time() {
    let h = Harness::new(ExecutionSettings::default());
    h.injector.after_click(1, ControlSignal::Pause);
    let sequence = seq(vec![
        click(1, 0.1, 0.1).with_delay(1.0),
        click(1, 0.2, 0.2).with_delay(1.0),
        click(1, 0.3, 0.3).with_delay(1.0),
    ]);

    let handle = Player::spawn(h.executor.clone(), sequence, 1, false);
    loop {
        let event = handle
            .events()
            .recv_timeout(Duration::from_secs(5))
            .expect("executor never paused");
        if let EngineEvent::StateChanged {
            new: SessionState::Paused,
            ..
        } = event
        {
            break;
        }
    }
    assert_eq!(handle.state(), SessionState::Paused);
    assert_eq!(h.injector.clicks(), 1);

    h.clock.advance(Duration::from_secs(10));
    h.tx.send(ControlSignal::Resume);

    let report = handle.join().unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.progress.executed, 3);
    assert_eq!(h.injector.clicks(), 3);
    assert_eq!(report.progress.elapsed_active, Duration::from_secs(3));
    assert_eq!(h.clock.now(), Duration::from_secs(13));
}

#[test]
fn test_cancel_during_poll() {
    let h = Harness::new(ExecutionSettings::default());
    h.capture.after_capture(2, ControlSignal::Cancel);
    let sequence = seq(vec![pixel(Color::new(255, 0, 0), 30.0), key("enter")]);

    let report = h.executor.run(&sequence, 1).unwrap();

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(h.capture.count(), 2);
    assert!(h.clock.now() <= Duration::from_millis(500));
    assert!(h.injector.calls().is_empty());
}

#[test]
fn test_emergency_stop_mid_sequence() {
    let h = Harness::new(ExecutionSettings::default());
    h.injector.after_click(1, ControlSignal::EmergencyStop);
    let sequence = seq(vec![click(1, 0.1, 0.1), click(1, 0.2, 0.2)]);

    let report = h.executor.run(&sequence, 5).unwrap();

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(h.injector.clicks(), 1);
}

#[test]
fn test_area_black_met_on_first_poll() {
    let h = Harness::new(ExecutionSettings::default());
    *h.capture.color.lock().unwrap() = Some([0, 0, 0]);
    let sequence = seq(vec![area(CompareOp::Lt, 50.0, 5.0)]);

    let report = h.executor.run(&sequence, 1).unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(h.capture.count(), 1);
    assert_eq!(
        h.capture.captures.lock().unwrap()[0],
        (1, AbsRect::new(480, 270, 960, 540))
    );
    assert!(h.events().contains(&EngineEvent::ConditionMet {
        index: 0,
        location: None
    }));
}

#[test]
fn test_area_timeout_aborts_at_index() {
    let h = Harness::new(ExecutionSettings::default());
    *h.capture.color.lock().unwrap() = Some([0, 0, 0]);
    let sequence = seq(vec![click(1, 0.5, 0.5), area(CompareOp::Gt, 10.0, 2.0), key("x")]);

    let report = h.executor.run(&sequence, 1).unwrap();

    assert_eq!(
        report.outcome,
        RunOutcome::Aborted {
            reason: ExecError::ConditionTimeout(Duration::from_secs(2)),
            action_index: Some(1),
        }
    );
    // Polls at 0, 0.5, 1.0, 1.5 and 2.0 seconds.
    assert_eq!(h.capture.count(), 5);
    assert_eq!(h.clock.now(), Duration::from_secs(2));
    assert!(!h.injector.calls().contains(&Call::Key("x".into())));
}

#[test]
fn test_continue_on_timeout_skips_action() {
    let settings = ExecutionSettings {
        continue_on_timeout: true,
        ..Default::default()
    };
    let h = Harness::new(settings);
    let sequence = seq(vec![area(CompareOp::Gt, 200.0, 1.0), key("x")]);

    let report = h.executor.run(&sequence, 1).unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.progress.executed, 1);
    assert!(matches!(
        report.progress.last_error,
        Some(ExecError::ConditionTimeout(_))
    ));
    assert_eq!(h.injector.calls(), vec![Call::Key("x".into())]);
    assert!(h
        .events()
        .iter()
        .any(|e| matches!(e, EngineEvent::ActionSkipped { index: 0, .. })));
}

#[test]
fn test_capture_unavailable_when_every_poll_fails() {
    let h = Harness::new(ExecutionSettings::default());
    h.capture.set_unavailable();
    let sequence = seq(vec![pixel(Color::new(255, 0, 0), 1.0)]);

    let report = h.executor.run(&sequence, 1).unwrap();

    assert!(matches!(
        report.outcome,
        RunOutcome::Aborted {
            reason: ExecError::CaptureUnavailable(_),
            action_index: Some(0),
        }
    ));
}

#[test]
fn test_injection_failure_aborts_without_retry() {
    let h = Harness::new(ExecutionSettings::default());
    h.injector.set_clicks_rejected();
    let sequence = seq(vec![key("a"), click(1, 0.5, 0.5), key("b")]);

    let report = h.executor.run(&sequence, 2).unwrap();

    assert!(matches!(
        report.outcome,
        RunOutcome::Aborted {
            reason: ExecError::InjectionUnavailable(_),
            action_index: Some(1),
        }
    ));
    assert_eq!(h.injector.clicks(), 1);
    assert_eq!(
        h.injector.calls(),
        vec![
            Call::Key("a".into()),
            Call::Move(960, 540),
            Call::Click(960, 540, MouseButton::Left),
        ]
    );
    assert_eq!(report.progress.executed, 1);
    assert!(matches!(
        report.progress.last_error,
        Some(ExecError::InjectionUnavailable(_))
    ));
}

#[test]
fn test_oversized_jitter_is_invalid_not_a_panic() {
    let h = Harness::new(ExecutionSettings::default());
    let sequence = seq(vec![Action::new(ActionKind::Click {
        monitor: 1,
        rel_x: 0.5,
        rel_y: 0.5,
        button: MouseButton::Left,
        jitter: Some(u32::MAX),
    })]);

    let report = h.executor.run(&sequence, 1).unwrap();

    assert!(matches!(
        report.outcome,
        RunOutcome::Aborted {
            reason: ExecError::InvalidAction(_),
            action_index: Some(0),
        }
    ));
    assert!(h.injector.calls().is_empty());
}

#[test]
fn test_oversized_default_jitter_aborts_click() {
    // Settings built in code skip `ExecutionSettings::validate`.
    let settings = ExecutionSettings {
        default_click_jitter: Some(u32::MAX),
        ..Default::default()
    };
    let h = Harness::new(settings);

    let report = h.executor.run(&seq(vec![click(1, 0.5, 0.5)]), 1).unwrap();

    assert!(matches!(
        report.outcome,
        RunOutcome::Aborted {
            reason: ExecError::InvalidAction(_),
            action_index: Some(0),
        }
    ));
    assert!(h.injector.calls().is_empty());
}

#[test]
fn test_zero_check_interval_still_finishes_sleep() {
    let settings = ExecutionSettings {
        check_interval_ms: 0,
        ..Default::default()
    };
    let h = Harness::new(settings);
    let sequence = seq(vec![Action::new(ActionKind::Wait { seconds: 0.25 })]);

    let report = h.executor.run(&sequence, 1).unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(h.clock.now(), Duration::from_millis(250));
}

#[test]
fn test_secs_saturates() {
    assert_eq!(secs(1.5), Duration::from_millis(1500));
    assert_eq!(secs(1e30), Duration::MAX);
    assert_eq!(secs(-1.0), Duration::ZERO);
    assert_eq!(secs(f64::NAN), Duration::ZERO);
}

#[test]
fn test_huge_timeout_keeps_polling() {
    let h = Harness::new(ExecutionSettings::default());
    h.capture.after_capture(3, ControlSignal::Cancel);
    let sequence = seq(vec![area(CompareOp::Gt, 200.0, 1e30)]);

    let report = h.executor.run(&sequence, 1).unwrap();

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(h.capture.count(), 3);
    assert_eq!(h.clock.now(), Duration::from_secs(1));
}

#[test]
fn test_unknown_monitor_aborts_without_injection() {
    let h = Harness::new(ExecutionSettings::default());
    let sequence = seq(vec![click(3, 0.5, 0.5)]);

    let report = h.executor.run(&sequence, 1).unwrap();

    assert_eq!(
        report.outcome,
        RunOutcome::Aborted {
            reason: ExecError::UnknownMonitor(3),
            action_index: Some(0),
        }
    );
    assert!(h.injector.calls().is_empty());
}

#[test]
fn test_invalid_action_rejected_before_dispatch() {
    let h = Harness::new(ExecutionSettings::default());
    let sequence = seq(vec![key("a"), click(1, 1.5, 0.5)]);

    let report = h.executor.run(&sequence, 1).unwrap();

    assert!(matches!(
        report.outcome,
        RunOutcome::Aborted {
            reason: ExecError::InvalidAction(_),
            action_index: Some(1),
        }
    ));
    assert!(h.injector.calls().is_empty());
}

#[test]
fn test_monitor_enumeration_failure_has_no_index() {
    let h = Harness::with_monitors(ExecutionSettings::default(), Arc::new(NoMonitors));
    let report = h.executor.run(&seq(vec![key("a")]), 1).unwrap();

    assert!(matches!(
        report.outcome,
        RunOutcome::Aborted {
            reason: ExecError::CaptureUnavailable(_),
            action_index: None,
        }
    ));
}

#[test]
fn test_missing_template_is_invalid_action() {
    let h = Harness::new(ExecutionSettings::default());
    let sequence = seq(vec![Action::new(ActionKind::WaitForTemplate {
        template: "missing".into(),
        monitor: 1,
        region: None,
        threshold: 0.9,
        poll: PollSpec::default(),
    })]);

    let report = h.executor.run(&sequence, 1).unwrap();

    assert!(matches!(
        report.outcome,
        RunOutcome::Aborted {
            reason: ExecError::InvalidAction(_),
            action_index: Some(0),
        }
    ));
    assert_eq!(h.capture.count(), 0);
}

#[test]
fn test_stale_signals_dropped_at_start() {
    let h = Harness::new(ExecutionSettings::default());
    h.tx.send(ControlSignal::Stop);
    h.tx.emergency_stop();

    let report = h.executor.run(&seq(vec![key("a")]), 1).unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
}

#[test]
fn test_second_run_rejected_while_active() {
    let h = Harness::new(ExecutionSettings::default());
    h.injector.after_click(1, ControlSignal::Pause);
    let sequence = seq(vec![click(1, 0.5, 0.5), click(1, 0.6, 0.6)]);

    let handle = Player::spawn(h.executor.clone(), sequence.clone(), 1, false);
    while handle.state() != SessionState::Paused {
        std::thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(
        h.executor.run(&sequence, 1).unwrap_err(),
        ExecError::AlreadyRunning
    );

    h.tx.send(ControlSignal::Stop);
    assert_eq!(handle.join().unwrap().outcome, RunOutcome::Cancelled);
    assert_eq!(h.injector.clicks(), 1);
}

#[test]
fn test_signal_right_after_start_is_kept() {
    let h = Harness::new(ExecutionSettings::default());
    h.tx.send(ControlSignal::Start);
    h.tx.send(ControlSignal::Stop);

    let report = h
        .executor
        .run_armed(&seq(vec![key("a")]), 1, Some(Duration::from_secs(1)))
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert!(h.injector.calls().is_empty());
}

#[test]
fn test_armed_run_after_emergency_stop() {
    let h = Harness::new(ExecutionSettings::default());
    h.injector.after_click(1, ControlSignal::EmergencyStop);
    let first = h.executor.run(&seq(vec![click(1, 0.5, 0.5)]), 1).unwrap();
    assert_eq!(first.outcome, RunOutcome::Cancelled);

    h.tx.send(ControlSignal::Start);
    let second = h
        .executor
        .run_armed(&seq(vec![key("a")]), 1, Some(Duration::from_secs(1)))
        .unwrap();
    assert_eq!(second.outcome, RunOutcome::Completed);
    assert!(h.injector.calls().contains(&Call::Key("a".into())));
}

#[test]
fn test_armed_run_times_out_without_start() {
    let h = Harness::new(ExecutionSettings::default());
    let report = h
        .executor
        .run_armed(&seq(vec![key("a")]), 1, Some(Duration::from_millis(50)))
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert!(h.injector.calls().is_empty());
    assert!(h
        .events()
        .contains(&EngineEvent::Finished(RunOutcome::Cancelled)));
}

#[test]
fn test_armed_player_waits_for_start() {
    let h = Harness::new(ExecutionSettings::default());
    let handle = Player::spawn(h.executor.clone(), seq(vec![key("a")]), 1, true);
    h.tx.send(ControlSignal::Pause);
    h.tx.send(ControlSignal::Start);

    let report = handle.join().unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(h.injector.calls(), vec![Call::Key("a".into())]);
}

fn resolved_targets(events: &[EngineEvent]) -> Vec<(usize, ResolvedTarget)> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::ActionResolved { index, target, .. } => Some((*index, *target)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_dry_run_reports_live_coordinates() {
    let sequence = seq(vec![
        Action::new(ActionKind::Click {
            monitor: 2,
            rel_x: 0.25,
            rel_y: 0.75,
            button: MouseButton::Right,
            jitter: Some(6),
        }),
        pixel(Color::new(10, 10, 10), 5.0),
        area(CompareOp::Lt, 50.0, 5.0),
        Action::new(ActionKind::WaitForTemplate {
            template: "gray_patch".into(),
            monitor: 2,
            region: Some(RelRect::new(0.0, 0.0, 0.1, 0.1)),
            threshold: 0.9,
            poll: PollSpec::default(),
        }),
        Action::new(ActionKind::WaitForText {
            monitor: 1,
            rect: RelRect::new(0.0, 0.9, 0.5, 0.1),
            pattern: "ready".into(),
            mode: TextMatchMode::Exact,
            poll: PollSpec::default(),
        }),
        Action::new(ActionKind::TypeText {
            text: "gg".into(),
            press_enter: true,
        })
        .with_delay(0.5),
    ]);

    let settings = ExecutionSettings {
        jitter_seed: Some(42),
        ..Default::default()
    };
    let dry = Harness::new(ExecutionSettings {
        dry_run: true,
        ..settings.clone()
    });
    let live = Harness::new(settings);

    let dry_report = dry.executor.run(&sequence, 2).unwrap();
    let live_report = live.executor.run(&sequence, 2).unwrap();

    assert_eq!(dry_report.outcome, RunOutcome::Completed);
    assert_eq!(live_report.outcome, RunOutcome::Completed);
    assert_eq!(dry_report.progress.executed, live_report.progress.executed);

    let dry_targets = resolved_targets(&dry.events());
    let live_targets = resolved_targets(&live.events());
    assert_eq!(dry_targets.len(), 12);
    assert_eq!(dry_targets, live_targets);

    assert!(dry.injector.calls().is_empty());
    assert_eq!(dry.capture.count(), 0);
    assert_eq!(dry.clock.now(), Duration::ZERO);

    // The jittered click stays within six pixels of the unjittered point.
    match dry_targets[0].1 {
        ResolvedTarget::Point { x, y } => {
            assert!((x - (1920 + 320)).abs() <= 6);
            assert!((y - 768).abs() <= 6);
        }
        other => panic!("unexpected target: {other:?}"),
    }
    assert_eq!(
        dry_targets[3].1,
        ResolvedTarget::Rect(AbsRect::new(1920, 0, 128, 102))
    );
    assert_eq!(live_report.progress.last_match, Some((1922, 2)));
}
