use crate::host::Reporter;
use crate::model::{ALL_PLAYLISTS, OrderSet};
use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = "config.json";

/// Per-playlist order rules plus the global text-file mode switches.
///
/// A playlist has an entry iff its rule chain is non-empty; clearing the
/// rules removes the entry. The reserved identity [`ALL_PLAYLISTS`] holds
/// the default applied to playlists without an entry of their own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playlists: BTreeMap<String, OrderSet>,
    #[serde(default)]
    pub file_listener_enabled: bool,
    #[serde(default)]
    pub use_relative_paths: bool,
    #[serde(default)]
    pub enforce_forward_slash: bool,
    #[serde(default)]
    pub excluded_playlists: BTreeSet<String>,
}

impl Config {
    pub fn order_for(&self, name: &str) -> Option<&OrderSet> {
        self.playlists.get(name)
    }

    /// Inserts or replaces the playlist's rule chain; an empty chain (or
    /// `None`) removes the entry instead.
    pub fn set_order(&mut self, name: &str, order: Option<OrderSet>) {
        match order {
            Some(order) if !order.is_empty() => {
                self.playlists.insert(name.to_string(), order);
            }
            _ => {
                self.playlists.remove(name);
            }
        }
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_playlists.contains(name)
    }

    /// The playlist's own entry, or the [`ALL_PLAYLISTS`] default when the
    /// playlist has none and is not excluded from the default.
    pub fn resolved_order_for(&self, name: &str) -> Option<&OrderSet> {
        if let Some(order) = self.playlists.get(name) {
            return Some(order);
        }
        if name != ALL_PLAYLISTS && !self.is_excluded(name) {
            return self.playlists.get(ALL_PLAYLISTS);
        }
        None
    }

    /// Playlists whose effective configuration differs between `old` and
    /// `self`: entries added or changed in `self`, plus entries removed
    /// from `self` when an [`ALL_PLAYLISTS`] default exists to fall back
    /// to. The default identity itself never appears in the fallback
    /// branch.
    pub fn modified_playlists(&self, old: &Config) -> HashSet<String> {
        let mut changed = HashSet::new();

        for name in self.playlists.keys().chain(old.playlists.keys()) {
            let old_order = old.playlists.get(name);
            let new_order = self.playlists.get(name);

            match (old_order, new_order) {
                (_, Some(new_order)) if old_order != Some(new_order) => {
                    changed.insert(name.clone());
                }
                (Some(_), None)
                    if name != ALL_PLAYLISTS && self.playlists.contains_key(ALL_PLAYLISTS) =>
                {
                    changed.insert(name.clone());
                }
                _ => {}
            }
        }

        changed
    }

    /// Loads the configuration, upgrading the legacy on-disk shape in
    /// place. Missing file is a default configuration; a read or parse
    /// failure is an error for the caller to absorb.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        // The pre-flags schema was a bare {"PlaylistConfig": {name: rules}}
        // document. Convert it and persist the upgraded form right away so
        // the old shape is only ever read once.
        if let Some(legacy) = value.get("PlaylistConfig") {
            let playlists: BTreeMap<String, OrderSet> = serde_json::from_value(legacy.clone())
                .with_context(|| format!("failed to migrate legacy config {}", path.display()))?;
            let config = Config {
                playlists: playlists
                    .into_iter()
                    .filter(|(_, order)| !order.is_empty())
                    .collect(),
                ..Config::default()
            };
            info!("migrated legacy config at {}", path.display());
            config.save(path)?;
            return Ok(config);
        }

        let config: Config = serde_json::from_value(value)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Like [`Config::load`] but never fails: errors are reported and an
    /// empty default takes their place, so startup always has a
    /// configuration to run with.
    pub fn load_or_default(path: &Path, reporter: &dyn Reporter) -> Config {
        match Config::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!("falling back to default config: {err:#}");
                reporter.report(&format!("Error loading configuration: {err:#}"));
                Config::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}
