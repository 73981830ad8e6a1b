//! Key names and `+` joined chords.
//!
//! Canonical names are lowercase: `ctrl`, `alt`, `shift`, `meta`, `enter`,
//! `esc`, `f1`..`f24`, arrows as `up`/`down`/`left`/`right`, and single
//! characters for printable keys.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Meta,
}

impl Modifier {
    pub const ALL: [Modifier; 4] = [Modifier::Ctrl, Modifier::Alt, Modifier::Shift, Modifier::Meta];

    /// Recognize a modifier under any of its common spellings, left/right
    /// variants included.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "ctrl" | "control" | "lctrl" | "rctrl" | "controlleft" | "controlright" => {
                Some(Modifier::Ctrl)
            }
            "alt" | "lalt" | "ralt" | "altgr" | "option" => Some(Modifier::Alt),
            "shift" | "lshift" | "rshift" | "shiftleft" | "shiftright" => Some(Modifier::Shift),
            "meta" | "win" | "super" | "cmd" | "command" | "metaleft" | "metaright" => {
                Some(Modifier::Meta)
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Shift => "shift",
            Modifier::Meta => "meta",
        }
    }

    fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

/// A set of held modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers(u8);

impl Modifiers {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, m: Modifier) {
        self.0 |= m.bit();
    }

    pub fn remove(&mut self, m: Modifier) {
        self.0 &= !m.bit();
    }

    pub fn contains(&self, m: Modifier) -> bool {
        self.0 & m.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Held modifiers in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Modifier> + '_ {
        Modifier::ALL.into_iter().filter(|m| self.contains(*m))
    }
}

/// Map a key name to its canonical spelling.
pub fn normalize_key(name: &str) -> String {
    if let Some(m) = Modifier::from_name(name) {
        return m.name().to_string();
    }
    let trimmed = name.trim();
    if trimmed.chars().count() == 1 {
        return trimmed.to_lowercase();
    }
    match trimmed.to_lowercase().as_str() {
        "escape" => "esc".into(),
        "return" => "enter".into(),
        "uparrow" => "up".into(),
        "downarrow" => "down".into(),
        "leftarrow" => "left".into(),
        "rightarrow" => "right".into(),
        "del" => "delete".into(),
        "back" => "backspace".into(),
        "pgup" => "pageup".into(),
        "pgdn" => "pagedown".into(),
        other => other.to_string(),
    }
}

/// A key with the modifiers held while it is pressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chord {
    pub modifiers: Modifiers,
    /// Canonical name of the final key. A chord made only of modifiers keeps
    /// its last modifier here.
    pub key: String,
}

impl Chord {
    pub fn new(modifiers: Modifiers, key: &str) -> Self {
        Self {
            modifiers,
            key: normalize_key(key),
        }
    }

    /// Parse `ctrl+shift+s`. A lone `+` is the plus key.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text == "+" {
            return Some(Self::new(Modifiers::empty(), "+"));
        }
        let parts: Vec<&str> = text.split('+').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        Self::from_parts(&parts)
    }

    /// Build from a list of key names, the last one being the key.
    pub fn from_parts<S: AsRef<str>>(parts: &[S]) -> Option<Self> {
        let (last, held) = parts.split_last()?;
        let mut modifiers = Modifiers::empty();
        for part in held {
            modifiers.insert(Modifier::from_name(part.as_ref())?);
        }
        Some(Self::new(modifiers, last.as_ref()))
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in self.modifiers.iter() {
            write!(f, "{}+", m.name())?;
        }
        write!(f, "{}", self.key)
    }
}
