// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiler settings, stored as RON.

use crate::evaluators::ShaderStage;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Knobs shared by both back ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Material name, used in symbol names and the generated header
    pub material_name: String,
    /// Program stage to generate
    pub stage: ShaderStage,
    /// Varyings passed from the vertex to the fragment stage
    pub varyings: Vec<String>,
    /// Files included at the top of generated programs
    pub includes: Vec<String>,
    /// Varying sampled when a Sample 2D node has no UV input
    pub texcoord_varying: String,
    /// Interface (varying definition) handed to the program toolchain
    pub interface_name: String,
    /// Trace every operation transferred to a pipeline
    pub trace_operations: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            material_name: "Material".to_string(),
            stage: ShaderStage::Fragment,
            varyings: vec!["v_normal".to_string(), "v_texcoord".to_string()],
            includes: vec!["bgfx_shader.sh".to_string(), "shaderLib.sh".to_string()],
            texcoord_varying: "v_texcoord".to_string(),
            interface_name: "varying.def.sc".to_string(),
            trace_operations: false,
        }
    }
}

impl CompilerSettings {
    /// Settings for a named material
    pub fn for_material(name: impl Into<String>) -> Self {
        Self {
            material_name: name.into(),
            ..Self::default()
        }
    }

    /// Serialize to RON format
    pub fn to_ron(&self) -> Result<String, SettingsError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Deserialize from RON format; missing fields keep their defaults
    pub fn from_ron(s: &str) -> Result<Self, SettingsError> {
        Ok(ron::from_str(s)?)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_ron(&content)?;
        tracing::debug!(path = %path.display(), "Loaded compiler settings");
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}

/// Error loading or saving settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// File could not be read or written
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid settings RON
    #[error("Invalid settings: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be serialized
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] ron::Error),
}
