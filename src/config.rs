use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::Path;

/// Session-scoped debugger configuration, fixed when a debug target is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LaunchConfig {
    /// Stop on the first line of the root script.
    pub suspend_on_startup: bool,
    /// Stop on the first line of every script that gets loaded (includes included scripts).
    pub suspend_on_script_load: bool,
    /// Show dynamically generated code (wrappers, injected snippets) in stack traces.
    pub show_dynamic_code: bool,
}

impl LaunchConfig {
    /// Parse configuration from a TOML document, missing keys default to `false`.
    pub fn from_toml(data: &str) -> Result<Self, Error> {
        Ok(toml::de::from_str(data)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let data = read_to_string(path)?;
        Self::from_toml(&data)
    }
}
