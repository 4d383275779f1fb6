//! Centralized surface-generation options with TOML preset support.
//!
//! Chunking, worker pool sizing and the default scene light live here.
//! Options serialize to/from TOML so presets can be stored next to the
//! structures they were tuned for.

mod lighting;
mod surface;
mod workers;

use std::path::Path;

pub use lighting::LightingOptions;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
pub use surface::{SurfaceOptions, MIN_VOLUME_BUDGET};
pub use workers::WorkerOptions;

use crate::error::SurfaceError;

/// Top-level options container. All sub-structs use `#[serde(default)]` so
/// partial TOML files (e.g. only overriding `[workers]`) work correctly.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[serde(default)]
pub struct Options {
    /// Chunking and extraction parameters.
    pub surface: SurfaceOptions,
    /// Worker pool sizing.
    pub workers: WorkerOptions,
    /// Default scene light.
    pub lighting: LightingOptions,
}

impl Options {
    /// Generate JSON Schema describing the UI-exposed options.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Options)
    }

    /// Copy with every section clamped to usable values.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            surface: self.surface.clamped(),
            workers: self.workers.clamped(),
            lighting: self.lighting.clone(),
        }
    }

    /// Load options from a TOML file. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Io`] if the file cannot be read and
    /// [`SurfaceError::OptionsParse`] if it is not valid options TOML.
    pub fn load(path: &Path) -> Result<Self, SurfaceError> {
        let content = std::fs::read_to_string(path)?;
        let options: Self = toml::from_str(&content)
            .map_err(|e| SurfaceError::OptionsParse(e.to_string()))?;
        log::info!("Loaded surface options from {}", path.display());
        Ok(options.clamped())
    }

    /// Save options to a TOML file (pretty-printed).
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::OptionsParse`] if serialization fails and
    /// [`SurfaceError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), SurfaceError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SurfaceError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        log::info!("Saved surface options to {}", path.display());
        Ok(())
    }

    /// List available preset names (TOML file stems) in a directory.
    #[must_use]
    pub fn list_presets(dir: &Path) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) =
                        path.file_stem().and_then(|s| s.to_str())
                    {
                        names.push(stem.to_owned());
                    }
                }
            }
        }
        names.sort();
        names
    }
}
