//! Structural validation of action sequences.
//!
//! Catches malformed or out-of-range fields before anything is dispatched.
//! Checks that need the live monitor table (unknown monitor ids, rectangles
//! past a monitor edge after conversion) happen at resolution time instead.

use crate::keys::Chord;
use crate::{
    Action, ActionKind, ActionSequence, PollSpec, RelRect, TextMatchMode, MAX_CLICK_JITTER,
};
use serde::{Deserialize, Serialize};

/// Validation error with context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Index of the offending action.
    pub index: usize,
    /// Path to the problematic field (e.g., "actions[0].rel_x").
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.path, self.message)
    }
}

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate every action of a sequence, collecting all problems.
pub fn validate_sequence(sequence: &ActionSequence) -> ValidationResult {
    let mut errors = Vec::new();
    for (index, action) in sequence.actions.iter().enumerate() {
        if let Err(mut found) = validate_action(action, index) {
            errors.append(&mut found);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a single action at position `index`.
pub fn validate_action(action: &Action, index: usize) -> ValidationResult {
    let mut errors = Vec::new();
    collect(action, index, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

struct Ctx<'a> {
    index: usize,
    errors: &'a mut Vec<ValidationError>,
}

impl Ctx<'_> {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            index: self.index,
            path: format!("actions[{}].{}", self.index, field),
            message: message.into(),
        });
    }

    fn ratio(&mut self, field: &str, value: f64) {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            self.push(field, format!("{value} is outside [0, 1]"));
        }
    }

    fn seconds(&mut self, field: &str, value: f64) {
        if !value.is_finite() || value < 0.0 {
            self.push(field, format!("{value} must be a non-negative number of seconds"));
        }
    }

    fn monitor(&mut self, monitor: u32) {
        if monitor == 0 {
            self.push("monitor", "Monitor ids start at 1");
        }
    }

    fn rect(&mut self, field: &str, rect: &RelRect) {
        self.ratio(&format!("{field}.left"), rect.left);
        self.ratio(&format!("{field}.top"), rect.top);
        self.ratio(&format!("{field}.width"), rect.width);
        self.ratio(&format!("{field}.height"), rect.height);
        if rect.left + rect.width > 1.0 + 1e-9 {
            self.push(field, "left + width exceeds the monitor");
        }
        if rect.top + rect.height > 1.0 + 1e-9 {
            self.push(field, "top + height exceeds the monitor");
        }
    }

    fn poll(&mut self, poll: &PollSpec) {
        if !poll.poll_interval.is_finite() || poll.poll_interval <= 0.0 {
            self.push("poll_interval", "Poll interval must be greater than 0");
        } else if !poll.timeout.is_finite() || poll.timeout < poll.poll_interval {
            self.push(
                "timeout",
                format!(
                    "timeout {} must be at least the poll interval {}",
                    poll.timeout, poll.poll_interval
                ),
            );
        }
    }

    fn not_empty(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(field, format!("{field} cannot be empty"));
        }
    }
}

fn collect(action: &Action, index: usize, errors: &mut Vec<ValidationError>) {
    let mut ctx = Ctx { index, errors };
    ctx.seconds("delay", action.delay);

    match &action.kind {
        ActionKind::Click {
            monitor,
            rel_x,
            rel_y,
            jitter,
            ..
        } => {
            ctx.monitor(*monitor);
            ctx.ratio("rel_x", *rel_x);
            ctx.ratio("rel_y", *rel_y);
            if let Some(radius) = jitter.filter(|r| *r > MAX_CLICK_JITTER) {
                ctx.push(
                    "jitter",
                    format!("{radius} exceeds the {MAX_CLICK_JITTER} px jitter limit"),
                );
            }
        }
        ActionKind::Wait { seconds } => ctx.seconds("seconds", *seconds),
        ActionKind::KeyPress { key } => {
            if key.trim().is_empty() {
                ctx.push("key", "key cannot be empty");
            } else if Chord::parse(key).is_none() {
                ctx.push("key", format!("malformed key chord `{key}`"));
            }
        }
        ActionKind::TypeText { text, .. } => ctx.not_empty("text", text),
        ActionKind::WaitForPixel {
            monitor,
            rel_x,
            rel_y,
            poll,
            ..
        } => {
            ctx.monitor(*monitor);
            ctx.ratio("rel_x", *rel_x);
            ctx.ratio("rel_y", *rel_y);
            ctx.poll(poll);
        }
        ActionKind::WaitForArea {
            monitor,
            rect,
            threshold,
            poll,
            ..
        } => {
            ctx.monitor(*monitor);
            ctx.rect("rect", rect);
            if !threshold.is_finite() {
                ctx.push("threshold", "Threshold must be a finite number");
            }
            ctx.poll(poll);
        }
        ActionKind::WaitForTemplate {
            template,
            monitor,
            region,
            threshold,
            poll,
        } => {
            ctx.not_empty("template", template);
            ctx.monitor(*monitor);
            if let Some(region) = region {
                ctx.rect("region", region);
            }
            ctx.ratio("threshold", *threshold);
            ctx.poll(poll);
        }
        ActionKind::WaitForText {
            monitor,
            rect,
            pattern,
            mode,
            poll,
        } => {
            ctx.monitor(*monitor);
            ctx.rect("rect", rect);
            ctx.not_empty("pattern", pattern);
            if *mode == TextMatchMode::Regex {
                if let Err(e) = regex::Regex::new(pattern.trim()) {
                    ctx.push("pattern", format!("invalid regex: {e}"));
                }
            }
            ctx.poll(poll);
        }
    }
}
