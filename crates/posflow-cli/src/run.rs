//! `posflow run`: replay a macro with hotkey control.

use crate::report;
use anyhow::{bail, Context, Result};
use clap::Args;
use posflow_core::{EngineEvent, Executor, Player, RunOutcome, Settings, SignalChannel};
use posflow_platform::{start_input_hook, system_ports, HotkeyListener, HotkeyMatcher};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Saved macro name, or a path to a .json/.yaml macro file
    pub target: String,

    /// Number of iterations (defaults to execution.default_loop_count)
    #[arg(short = 'n', long)]
    pub loops: Option<u32>,

    /// Resolve and report every action without injecting or capturing
    #[arg(long)]
    pub dry_run: bool,

    /// Skip a timed-out wait instead of aborting the run
    #[arg(long)]
    pub continue_on_timeout: bool,

    /// Seed for click and delay jitter
    #[arg(long)]
    pub seed: Option<u64>,

    /// Wait for the start/stop hotkey before running
    #[arg(long)]
    pub wait_start: bool,

    /// Do not install the global hotkey listener
    #[arg(long, conflicts_with = "wait_start")]
    pub no_hotkeys: bool,
}

pub fn execute(args: RunArgs, settings: Settings) -> Result<ExitCode> {
    let store = crate::macro_store(&settings);
    let sequence = crate::load_macro(&store, &args.target)?;

    let mut execution = settings.execution.clone();
    execution.dry_run |= args.dry_run;
    execution.continue_on_timeout |= args.continue_on_timeout;
    if args.seed.is_some() {
        execution.jitter_seed = args.seed;
    }
    let loops = args.loops.unwrap_or(execution.default_loop_count);
    if loops == 0 {
        bail!("--loops must be at least 1");
    }

    let ports = system_ports(&settings).context("failed to initialize platform ports")?;
    let (sender, receiver) = SignalChannel::new();
    let executor = Arc::new(Executor::new(ports, execution, receiver));

    // Keep the hook and listener alive for the whole run.
    let _hotkeys = if args.no_hotkeys {
        None
    } else {
        let matcher =
            HotkeyMatcher::from_settings(&settings.hotkeys).context("invalid hotkey binding")?;
        let chords = matcher.chords();
        let hook = start_input_hook();
        let listener = HotkeyListener::spawn(
            hook.receiver().clone(),
            matcher,
            sender.clone(),
            executor.state_cell(),
        );
        if let [start, pause, kill, emergency] = chords.as_slice() {
            println!(
                "hotkeys: {start} start/stop, {pause} pause/resume, {kill} kill, {emergency} emergency stop"
            );
        }
        Some((hook, listener))
    };

    info!(
        name = %sequence.meta.name,
        actions = sequence.actions.len(),
        loops,
        "Starting run"
    );
    if args.wait_start {
        println!("armed: press the start hotkey to begin");
    }

    let handle = Player::spawn(executor, sequence, loops, args.wait_start);
    loop {
        match handle.events().recv_timeout(Duration::from_millis(200)) {
            Ok(event) => {
                if let Some(line) = report::engine_line(&event) {
                    println!("{line}");
                }
                if matches!(event, EngineEvent::Finished(_)) {
                    break;
                }
            }
            Err(_) if handle.is_finished() => break,
            Err(_) => {}
        }
    }

    let report = handle.join()?;
    println!("{}", report::summary(&report));
    Ok(match report.outcome {
        RunOutcome::Completed => ExitCode::SUCCESS,
        RunOutcome::Cancelled => ExitCode::from(2),
        RunOutcome::Aborted { .. } => {
            eprintln!("{}", report::outcome_text(&report.outcome));
            ExitCode::FAILURE
        }
    })
}
