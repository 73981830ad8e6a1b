//! `posflow record`: capture clicks and key presses into a macro.

use crate::report;
use anyhow::{bail, Context, Result};
use clap::Args;
use posflow_core::ports::MonitorSource;
use posflow_core::{
    MonitorGeometry, Recorder, RecorderEvent, SequenceMeta, SessionState, Settings,
};
use posflow_platform::{start_input_hook, Hotkey, HotkeyMatcher, InputHookHandle, SystemMonitors};
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Name to save the macro under
    pub name: String,

    /// Start recording immediately instead of on the start/stop hotkey
    #[arg(long)]
    pub now: bool,

    /// Free-form description stored with the macro
    #[arg(long)]
    pub description: Option<String>,

    /// Overwrite an existing macro with the same name
    #[arg(long)]
    pub force: bool,
}

enum Ending {
    Save,
    Discard,
}

pub fn execute(args: RecordArgs, settings: Settings) -> Result<ExitCode> {
    let store = crate::macro_store(&settings);
    if !args.force && store.load(&args.name).is_ok() {
        bail!("macro `{}` already exists (use --force to overwrite)", args.name);
    }

    let geometry = SystemMonitors::new()
        .enumerate_monitors()
        .context("failed to enumerate monitors")?;
    let mut matcher =
        HotkeyMatcher::from_settings(&settings.hotkeys).context("invalid hotkey binding")?;
    let chords = matcher.chords();
    let mut recorder = Recorder::new().with_ignored(chords.clone());
    let hook = start_input_hook();

    if let [start, pause, kill, _] = chords.as_slice() {
        println!("hotkeys: {start} start/stop, {pause} pause/resume, {kill} discard");
    }
    if args.now {
        print_event(recorder.start(geometry.clone()));
    }

    let ending = record_loop(&hook, &mut matcher, &mut recorder, &geometry);
    hook.stop();

    let mut meta = SequenceMeta::named(&args.name);
    meta.description = args.description;
    let Some(sequence) = recorder.stop(meta) else {
        println!("nothing recorded");
        return Ok(ExitCode::from(2));
    };

    match ending {
        Ending::Discard => {
            println!("recording discarded");
            Ok(ExitCode::from(2))
        }
        Ending::Save => {
            let path = store.save(&sequence).context("failed to save macro")?;
            info!(?path, actions = sequence.actions.len(), "Recording saved");
            println!("saved {} action(s) to {}", sequence.actions.len(), path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_event(event: Option<RecorderEvent>) {
    if let Some(event) = event {
        println!("{}", report::recorder_line(&event));
    }
}

fn record_loop(
    hook: &InputHookHandle,
    matcher: &mut HotkeyMatcher,
    recorder: &mut Recorder,
    geometry: &MonitorGeometry,
) -> Ending {
    loop {
        let Some(event) = hook.recv_timeout(Duration::from_millis(100)) else {
            if !hook.is_running() {
                return Ending::Save;
            }
            continue;
        };
        let ts = event.timestamp_ms;

        match matcher.feed(&event.event) {
            Some(Hotkey::StartStop) if recorder.state() == SessionState::Stopped => {
                print_event(recorder.start(geometry.clone()));
            }
            Some(Hotkey::StartStop) | Some(Hotkey::EmergencyStop) => return Ending::Save,
            Some(Hotkey::PauseResume) => match recorder.state() {
                SessionState::Running => print_event(recorder.pause(ts)),
                SessionState::Paused => print_event(recorder.resume(ts)),
                SessionState::Stopped => {}
            },
            Some(Hotkey::Kill) => return Ending::Discard,
            None => {
                print_event(recorder.push_event(ts, event.event));
            }
        }
    }
}
