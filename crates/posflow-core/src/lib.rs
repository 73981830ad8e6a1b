//! posflow-core: domain model + execution primitives.
//!
//! Design goal: keep this crate UI-agnostic and platform-agnostic.
//! Platform specific I/O (inject/capture/hook) lives in `posflow-platform`
//! and reaches the executor only through the traits in [`ports`].

mod condition;
mod config;
mod engine;
mod error;
mod geometry;
pub mod keys;
pub mod ports;
mod recorder;
mod storage;
mod validate;

pub use condition::{
    area_metric, area_satisfied, match_template, pixel_matches, TemplateMatch, TextMatcher,
};
pub use config::{
    config_dir, data_dir, ConfigError, ExecutionSettings, HotkeySettings, LoggingSettings,
    OcrSettings, Settings,
};
pub use engine::{
    Clock, ControlSignal, EngineEvent, Executor, ManualClock, Player, PlayerHandle,
    ResolvedTarget, RunOutcome, RunProgress, RunReport, SignalChannel, SignalReceiver,
    SignalSender, StateCell, SystemClock,
};
pub use error::ExecError;
pub use geometry::{
    from_absolute, to_absolute, to_absolute_rect, AbsRect, GeometryError, MonitorBox,
    MonitorGeometry,
};
pub use recorder::{RawEventType, Recorder, RecorderEvent};
pub use storage::{load_path, MacroStore, StorageError, StorageResult};
pub use validate::{validate_action, validate_sequence, ValidationError, ValidationResult};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Largest click jitter radius, in pixels.
pub const MAX_CLICK_JITTER: u32 = 1_000;

/// Execution or recording session state.
///
/// `Stopped` is both the initial and the terminal state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// A recorded macro: metadata plus an ordered list of actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSequence {
    pub meta: SequenceMeta,
    pub actions: Vec<Action>,
}

impl ActionSequence {
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            meta: SequenceMeta::named(name),
            actions,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceMeta {
    pub name: String,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(with = "time::serde::rfc3339", default = "OffsetDateTime::now_utc")]
    pub created: OffsetDateTime,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_author() -> String {
    "posflow".into()
}

fn default_version() -> String {
    "1.0".into()
}

impl SequenceMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            author: default_author(),
            created: OffsetDateTime::now_utc(),
            description: None,
            version: default_version(),
        }
    }
}

/// One step of a macro. `delay` (seconds) is applied after the step ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(flatten)]
    pub kind: ActionKind,
    #[serde(default)]
    pub delay: f64,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self { kind, delay: 0.0 }
    }

    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay = seconds;
        self
    }

    /// Short name of the action kind, as used in the macro file.
    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Click at a monitor-relative position.
    Click {
        monitor: u32,
        rel_x: f64,
        rel_y: f64,
        #[serde(default)]
        button: MouseButton,
        /// Random offset radius in pixels, at most [`MAX_CLICK_JITTER`].
        #[serde(default)]
        jitter: Option<u32>,
    },
    /// Plain delay.
    Wait { seconds: f64 },
    /// Press a key or a `+` joined chord such as `ctrl+c`.
    KeyPress { key: String },
    /// Type literal text.
    TypeText {
        text: String,
        #[serde(default)]
        press_enter: bool,
    },
    WaitForPixel {
        monitor: u32,
        rel_x: f64,
        rel_y: f64,
        color: Color,
        #[serde(default)]
        tolerance: u8,
        #[serde(flatten)]
        poll: PollSpec,
    },
    WaitForArea {
        monitor: u32,
        rect: RelRect,
        metric: AreaMetric,
        op: CompareOp,
        threshold: f64,
        #[serde(flatten)]
        poll: PollSpec,
    },
    WaitForTemplate {
        /// Reference image identifier resolved by the template store.
        template: String,
        #[serde(default = "default_monitor")]
        monitor: u32,
        #[serde(default)]
        region: Option<RelRect>,
        threshold: f64,
        #[serde(flatten)]
        poll: PollSpec,
    },
    WaitForText {
        monitor: u32,
        rect: RelRect,
        pattern: String,
        #[serde(default)]
        mode: TextMatchMode,
        #[serde(flatten)]
        poll: PollSpec,
    },
}

fn default_monitor() -> u32 {
    1
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Click { .. } => "click",
            ActionKind::Wait { .. } => "wait",
            ActionKind::KeyPress { .. } => "key_press",
            ActionKind::TypeText { .. } => "type_text",
            ActionKind::WaitForPixel { .. } => "wait_for_pixel",
            ActionKind::WaitForArea { .. } => "wait_for_area",
            ActionKind::WaitForTemplate { .. } => "wait_for_template",
            ActionKind::WaitForText { .. } => "wait_for_text",
        }
    }
}

/// Timeout and poll interval of a wait-type action, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollSpec {
    pub timeout: f64,
    pub poll_interval: f64,
}

impl Default for PollSpec {
    fn default() -> Self {
        Self {
            timeout: 30.0,
            poll_interval: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// True when every channel is within `tolerance` of `other`.
    pub fn within(&self, other: &Color, tolerance: u8) -> bool {
        let close = |a: u8, b: u8| a.abs_diff(b) <= tolerance;
        close(self.r, other.r) && close(self.g, other.g) && close(self.b, other.b)
    }
}

/// Rectangle in monitor-relative ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl RelRect {
    pub const FULL: RelRect = RelRect {
        left: 0.0,
        top: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaMetric {
    /// Mean luma over the region.
    AvgBrightness,
    /// Mean spread between the highest and lowest channel per pixel.
    ChannelDiff,
}

/// Comparison operators for area metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "<", alias = "lt")]
    Lt,
    #[serde(rename = ">", alias = "gt")]
    Gt,
    #[serde(rename = "<=", alias = "lte")]
    Lte,
    #[serde(rename = ">=", alias = "gte")]
    Gte,
    #[serde(rename = "==", alias = "eq")]
    Eq,
}

impl CompareOp {
    /// Evaluate `left <op> right`.
    pub fn evaluate(&self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Lt => left < right,
            CompareOp::Gt => left > right,
            CompareOp::Lte => left <= right,
            CompareOp::Gte => left >= right,
            CompareOp::Eq => (left - right).abs() < 1e-6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMatchMode {
    #[default]
    Contains,
    Exact,
    Regex,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_within_is_per_channel() {
        let target = Color::new(255, 0, 0);
        assert!(target.within(&Color::new(250, 5, 5), 10));
        assert!(!target.within(&Color::new(200, 0, 0), 10));
    }

    #[test]
    fn test_compare_op() {
        assert!(CompareOp::Lt.evaluate(1.0, 2.0));
        assert!(!CompareOp::Gt.evaluate(1.0, 2.0));
        assert!(CompareOp::Lte.evaluate(2.0, 2.0));
        assert!(CompareOp::Gte.evaluate(2.0, 2.0));
        assert!(CompareOp::Eq.evaluate(0.1 + 0.2, 0.3));
    }

    #[test]
    fn test_action_json_shape() {
        let json = r#"{
            "meta": { "name": "demo", "created": "2024-05-01T10:00:00Z" },
            "actions": [
                { "type": "click", "monitor": 2, "rel_x": 0.25, "rel_y": 0.5, "button": "right", "delay": 0.2 },
                { "type": "wait", "seconds": 1.5 },
                { "type": "type_text", "text": "hello", "press_enter": true },
                { "type": "wait_for_area", "monitor": 1,
                  "rect": { "left": 0.1, "top": 0.1, "width": 0.2, "height": 0.2 },
                  "metric": "avg_brightness", "op": "<", "threshold": 50,
                  "timeout": 5, "poll_interval": 0.5 }
            ]
        }"#;
        let seq: ActionSequence = serde_json::from_str(json).unwrap();
        assert_eq!(seq.meta.name, "demo");
        assert_eq!(seq.meta.author, "posflow");
        assert_eq!(seq.actions.len(), 4);
        assert_eq!(
            seq.actions[0].kind,
            ActionKind::Click {
                monitor: 2,
                rel_x: 0.25,
                rel_y: 0.5,
                button: MouseButton::Right,
                jitter: None,
            }
        );
        assert_eq!(seq.actions[0].delay, 0.2);
        assert_eq!(seq.actions[1].delay, 0.0);
        match &seq.actions[3].kind {
            ActionKind::WaitForArea { op, poll, .. } => {
                assert_eq!(*op, CompareOp::Lt);
                assert_eq!(poll.timeout, 5.0);
            }
            other => panic!("unexpected action: {other:?}"),
        }

        let back = serde_json::to_string(&seq).unwrap();
        assert!(back.contains("\"type\":\"wait_for_area\""));
        assert!(back.contains("\"op\":\"<\""));
    }

    #[test]
    fn test_template_monitor_defaults_to_primary() {
        let action: Action = serde_json::from_str(
            r#"{ "type": "wait_for_template", "template": "ok_button", "threshold": 0.9,
                 "timeout": 10, "poll_interval": 1 }"#,
        )
        .unwrap();
        match action.kind {
            ActionKind::WaitForTemplate { monitor, region, .. } => {
                assert_eq!(monitor, 1);
                assert!(region.is_none());
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }
}
