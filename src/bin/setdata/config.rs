//! Persistent CLI settings

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use setdata::{Error, Result, SetFormat};

/// Defaults applied when a command line leaves them out
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Template JSON file or directory of per-type files
    pub templates: Option<PathBuf>,
    /// Game format used when `--format` is not given
    pub format: Option<SetFormat>,
    /// Skip objects that fail to decode instead of aborting
    pub best_effort: bool,
    /// Indent exported JSON
    pub pretty_json: bool,
}

impl Config {
    /// Default settings file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("setdata");
            p.push("config.json");
            p
        })
    }

    /// Load settings. A missing default file yields the defaults; a missing
    /// explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) if !p.exists() => return Err(Error::FileNotFound(p.to_path_buf())),
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };
        let json = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save settings, creating the parent directory
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
