//! Plain progress lines for executor and recorder events.

use posflow_core::{EngineEvent, RecorderEvent, ResolvedTarget, RunOutcome, RunReport};

fn target(target: &ResolvedTarget) -> String {
    match target {
        ResolvedTarget::None => String::new(),
        ResolvedTarget::Point { x, y } => format!(" at ({x}, {y})"),
        ResolvedTarget::Rect(r) => {
            format!(" in [{}, {} {}x{}]", r.left, r.top, r.width, r.height)
        }
    }
}

/// One line per interesting event. Progress snapshots are not printed.
pub fn engine_line(event: &EngineEvent) -> Option<String> {
    Some(match event {
        EngineEvent::StateChanged { new, .. } => format!("state: {new:?}"),
        EngineEvent::LoopStarted { iteration, total } => format!("loop {iteration}/{total}"),
        EngineEvent::ActionResolved {
            index,
            kind,
            target: t,
            dry_run,
            ..
        } => {
            let prefix = if *dry_run { "[dry-run] " } else { "" };
            format!("{prefix}#{index} {kind}{}", target(t))
        }
        EngineEvent::ConditionMet {
            index,
            location: Some((x, y)),
        } => format!("#{index} matched at ({x}, {y})"),
        EngineEvent::ActionSkipped { index, reason } => format!("#{index} skipped: {reason}"),
        EngineEvent::Finished(outcome) => format!("finished: {}", outcome_text(outcome)),
        _ => return None,
    })
}

pub fn outcome_text(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Completed => "completed".into(),
        RunOutcome::Cancelled => "cancelled".into(),
        RunOutcome::Aborted {
            reason,
            action_index: Some(i),
        } => format!("aborted at action #{i}: {reason}"),
        RunOutcome::Aborted {
            reason,
            action_index: None,
        } => format!("aborted before the first action: {reason}"),
    }
}

pub fn summary(report: &RunReport) -> String {
    let p = &report.progress;
    format!(
        "{} action(s) executed over {} iteration(s) in {:.1}s",
        p.executed,
        p.iteration,
        p.elapsed_active.as_secs_f64()
    )
}

pub fn recorder_line(event: &RecorderEvent) -> String {
    match event {
        RecorderEvent::StateChanged { new, .. } => format!("recording: {new:?}"),
        RecorderEvent::ActionCaptured { index, action } => {
            format!("#{index} {}", serde_json::to_string(&action.kind).unwrap_or_default())
        }
        RecorderEvent::EventSkipped { reason } => format!("skipped: {reason}"),
    }
}
