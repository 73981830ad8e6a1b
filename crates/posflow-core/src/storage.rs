//! Macro storage and persistence.

use crate::ActionSequence;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Macro not found: {0}")]
    NotFound(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

const EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// A directory of saved macros, one file per macro.
///
/// New macros are written as pretty JSON; YAML files placed in the directory
/// by hand are read as well.
#[derive(Debug, Clone)]
pub struct MacroStore {
    dir: PathBuf,
}

impl MacroStore {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> StorageResult<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
            info!(dir = ?self.dir, "Created macros directory");
        }
        Ok(())
    }

    fn find(&self, name: &str) -> Option<PathBuf> {
        let stem = sanitize_filename(name);
        EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{stem}.{ext}")))
            .find(|p| p.exists())
    }

    /// Save a macro under its own name, replacing any previous version.
    pub fn save(&self, sequence: &ActionSequence) -> StorageResult<PathBuf> {
        self.ensure_dir()?;
        let path = self
            .dir
            .join(format!("{}.json", sanitize_filename(&sequence.meta.name)));

        let json = serde_json::to_string_pretty(sequence)?;
        fs::write(&path, json)?;

        info!(?path, actions = sequence.actions.len(), "Saved macro");
        Ok(path)
    }

    /// Load a macro by name.
    pub fn load(&self, name: &str) -> StorageResult<ActionSequence> {
        let path = self
            .find(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        load_path(&path)
    }

    /// Delete a macro by name.
    pub fn delete(&self, name: &str) -> StorageResult<()> {
        let path = self
            .find(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        fs::remove_file(&path)?;
        info!(?path, "Deleted macro");
        Ok(())
    }

    /// List saved macro names, sorted and deduplicated.
    pub fn list(&self) -> StorageResult<Vec<String>> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let known = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| EXTENSIONS.contains(&e))
                .unwrap_or(false);
            if known {
                if let Some(name) = path.file_stem() {
                    names.push(name.to_string_lossy().to_string());
                }
            }
        }

        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// Load a macro file directly; the format follows the extension.
pub fn load_path(path: &Path) -> StorageResult<ActionSequence> {
    let content = fs::read_to_string(path)?;
    let is_yaml = path
        .extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false);
    let sequence: ActionSequence = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };

    debug!(?path, actions = sequence.actions.len(), "Loaded macro");
    Ok(sequence)
}

/// Sanitize a macro name to be a valid filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}
