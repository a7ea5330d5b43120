use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::shared::constants::{
    DEFAULT_DATABASE_PATH, DEFAULT_MATCH_THRESHOLD, DEFAULT_MAX_ANNOTATIONS,
};

/// User-adjustable recognition settings, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Minimum spacing between frames forwarded to recognition (0 = every frame).
    pub detect_interval_ms: u64,
    pub threshold: f64,
    /// Size of the annotation pool. Only read when a session is created.
    pub max_annotations: usize,
    pub database_path: PathBuf,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            detect_interval_ms: 0,
            threshold: DEFAULT_MATCH_THRESHOLD,
            max_annotations: DEFAULT_MAX_ANNOTATIONS,
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

impl RecognitionSettings {
    pub fn detect_interval(&self) -> Duration {
        Duration::from_millis(self.detect_interval_ms)
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Facewatch").join("settings.json"))
    }

    /// Loads persisted settings, falling back to defaults on any failure.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            if let Err(e) = self.save_to(&path) {
                log::warn!("Failed to save settings to {}: {e}", path.display());
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
