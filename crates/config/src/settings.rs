// User settings
// Loaded from ~/.config/tally/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Year used for dates without one; the current year when unset
    #[serde(rename = "run.workingYear", skip_serializing_if = "Option::is_none")]
    pub working_year: Option<i32>,

    #[serde(rename = "run.defaultTemplate", skip_serializing_if = "Option::is_none")]
    pub default_template: Option<PathBuf>,

    /// Directory for reports written without --output
    #[serde(rename = "run.outputDir", skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Treat unmatched invoices and skipped sheets as failure
    #[serde(rename = "run.strict")]
    pub strict: bool,
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tally")
            .join("settings.json")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => {
                // Strip comments (lines starting with //)
                let cleaned: String = contents
                    .lines()
                    .filter(|line| !line.trim().starts_with("//"))
                    .collect::<Vec<_>>()
                    .join("\n");

                match serde_json::from_str(&cleaned) {
                    Ok(settings) => settings,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "settings.json unreadable, using defaults");
                        Self::default()
                    }
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read settings.json");
                Self::default()
            }
        }
    }

    /// Save current settings to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}
