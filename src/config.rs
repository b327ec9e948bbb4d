use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const APP_FOLDER_NAME: &str = "Ikonic MenuBar";
pub const PREFERENCES_FILE: &str = "preferences.json";
pub const HOME_OVERRIDE_ENV: &str = "IKONIC_HOME";

pub const DEFAULT_ICON_HEIGHT: u32 = 18;
pub const MIN_ICON_HEIGHT: u32 = 12;
pub const MAX_ICON_HEIGHT: u32 = 32;
pub const DEFAULT_OVERLAY_STRENGTH: f32 = 0.5;

#[derive(Error, Debug)]
pub enum PreferencesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Preferences parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Application-support folder holding saved images and the preference file.
pub fn app_support_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(HOME_OVERRIDE_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_FOLDER_NAME)
}

/// Flat key/value preference record, stored under the historical key names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    #[serde(rename = "SelectedImageName", skip_serializing_if = "Option::is_none")]
    pub selected_image: Option<String>,
    #[serde(rename = "AllSavedImages")]
    pub saved_images: Vec<String>,
    #[serde(rename = "OverlayEnabled")]
    pub overlay_enabled: bool,
    #[serde(rename = "OverlayStrength")]
    pub overlay_strength: f32,
    #[serde(rename = "LaunchAtLogin")]
    pub launch_at_login: bool,
    #[serde(rename = "ImageHeight")]
    pub icon_height: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            selected_image: None,
            saved_images: Vec::new(),
            overlay_enabled: false,
            overlay_strength: DEFAULT_OVERLAY_STRENGTH,
            launch_at_login: false,
            icon_height: DEFAULT_ICON_HEIGHT,
        }
    }
}

impl Preferences {
    /// Missing or unreadable stores fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        match Self::try_load_from(path) {
            Ok(Some(prefs)) => prefs,
            Ok(None) => {
                debug!(path = %path.display(), "no preferences stored yet, using defaults");
                Self::default()
            }
            Err(err) => {
                warn!(path = %path.display(), "failed to read preferences: {err}");
                Self::default()
            }
        }
    }

    pub fn try_load_from(path: &Path) -> Result<Option<Self>, PreferencesError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let mut prefs: Preferences = serde_json::from_str(&content)?;
        prefs.sanitize();
        Ok(Some(prefs))
    }

    pub fn save_to(&self, path: &Path) {
        if let Err(err) = self.try_save_to(path) {
            warn!(path = %path.display(), "failed to save preferences: {err}");
        }
    }

    pub fn try_save_to(&self, path: &Path) -> Result<(), PreferencesError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;

        // Atomic write
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, content)?;
        fs::rename(temp_path, path)?;
        Ok(())
    }

    pub fn set_icon_height(&mut self, height: i64) {
        self.icon_height = height.clamp(MIN_ICON_HEIGHT as i64, MAX_ICON_HEIGHT as i64) as u32;
    }

    pub fn adjust_icon_height(&mut self, delta: i64) {
        self.set_icon_height(self.icon_height as i64 + delta);
    }

    pub fn set_overlay_strength(&mut self, strength: f32) {
        self.overlay_strength = if strength.is_finite() {
            strength.clamp(0.0, 1.0)
        } else {
            DEFAULT_OVERLAY_STRENGTH
        };
    }

    /// Overlay alpha to apply, if the mask is switched on.
    pub fn overlay(&self) -> Option<f32> {
        self.overlay_enabled.then_some(self.overlay_strength)
    }

    fn sanitize(&mut self) {
        self.set_icon_height(self.icon_height as i64);
        self.set_overlay_strength(self.overlay_strength);
        let mut seen = std::collections::HashSet::new();
        self.saved_images
            .retain(|name| !name.is_empty() && seen.insert(name.clone()));
        if self.selected_image.as_deref() == Some("") {
            self.selected_image = None;
        }
    }
}
