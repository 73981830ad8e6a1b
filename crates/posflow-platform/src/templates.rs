//! Reference images for `wait_for_template`, read from a directory.

use posflow_core::ports::{PixelBuffer, PortError, TemplateStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

const EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Template store over a directory. An id is a file name, with or without
/// its extension.
pub struct DirTemplateStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, PixelBuffer>>,
}

impl DirTemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn resolve(&self, id: &str) -> Option<PathBuf> {
        // Ids never escape the directory.
        if id.contains("..") || Path::new(id).is_absolute() {
            return None;
        }
        let direct = self.dir.join(id);
        if direct.is_file() {
            return Some(direct);
        }
        EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{id}.{ext}")))
            .find(|p| p.is_file())
    }
}

impl TemplateStore for DirTemplateStore {
    fn load(&self, id: &str) -> Result<PixelBuffer, PortError> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(image) = cache.get(id) {
                return Ok(image.clone());
            }
        }

        let path = self
            .resolve(id)
            .ok_or_else(|| PortError::TemplateUnavailable(format!("no image for `{id}`")))?;
        let image = image::open(&path)
            .map_err(|e| PortError::TemplateUnavailable(format!("{}: {e}", path.display())))?
            .to_rgb8();
        debug!(?path, width = image.width(), height = image.height(), "Loaded template");

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(id.to_string(), image.clone());
        }
        Ok(image)
    }
}
