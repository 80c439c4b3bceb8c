// ============================================================
// Layer 6 — Config Store
// ============================================================
// Persists pipeline configurations as pretty-printed JSON so an
// experiment can be rerun with exactly the same knobs.
//
// File naming convention:
//   configs/
//     federated.json     ← FederatedConfig
//     centralized.json   ← CentralizedConfig
//     p13n.json          ← P13nConfig
//
// Any Serialize type works; the name is chosen by the caller.
// Every config type uses #[serde(default)], so a hand-written
// file only needs the fields it changes.
//
// Reference: serde_json crate documentation
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::{Path, PathBuf}};

/// Saves and loads named JSON configs inside one directory.
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Write `config` to `{dir}/{name}.json`, creating `dir` if needed.
    pub fn save<T: Serialize>(&self, name: &str, config: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create config dir '{}'", self.dir.display()))?;

        let path = self.path(name);
        let json = serde_json::to_string_pretty(config)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved config '{}' to '{}'", name, path.display());
        Ok(path)
    }

    /// Read `{dir}/{name}.json` back into a config.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.path(name);

        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;

        serde_json::from_str(&json)
            .with_context(|| format!("Cannot parse config '{}'", path.display()))
    }
}
