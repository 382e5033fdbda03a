use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use jsonschema::{validator_for, Validator};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What to do with the cache when the durable write behind a mutation fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WriteFailurePolicy {
    /// Leave the cache untouched so it keeps matching the store.
    #[default]
    SkipCacheEdit,
    /// Apply the cache edit regardless of the write outcome.
    ApplyAnyway,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct LimitsConfig {
    /// Fixed effects an owner may hold without the unlimited capability.
    #[serde(default = "default_max_fixed_effects")]
    pub max_fixed_effects: usize,
    /// Blocks between an owner and a newly created fixed effect.
    #[serde(default = "default_max_fixed_effect_creation_distance")]
    pub max_fixed_effect_creation_distance: u32,
    /// Worlds in which particles never spawn (exact names).
    #[serde(default)]
    pub disabled_worlds: Vec<String>,
}

fn default_max_fixed_effects() -> usize {
    5
}

fn default_max_fixed_effect_creation_distance() -> u32 {
    128
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_fixed_effects: default_max_fixed_effects(),
            max_fixed_effect_creation_distance: default_max_fixed_effect_creation_distance(),
            disabled_worlds: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct StoreConfig {
    /// Directory holding `particles.sqlite` (defaults to `./state`).
    #[serde(default)]
    pub state_dir: Option<String>,
    #[serde(default)]
    pub write_failure_policy: WriteFailurePolicy,
}

impl StoreConfig {
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("state"))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

static CONFIG_SCHEMA: Lazy<Validator> = Lazy::new(|| {
    let schema = schemars::schema_for!(Config);
    let schema_value = serde_json::to_value(&schema).expect("schema value");
    validator_for(&schema_value).expect("valid schema")
});

/// Returns the JSON schema describing the configuration structure.
///
/// # Panics
///
/// Panics if schema generation fails; this indicates a programming error.
pub fn config_schema_json() -> serde_json::Value {
    let schema = schemars::schema_for!(Config);
    serde_json::to_value(&schema).expect("schema json")
}

pub fn write_schema_file(path: impl AsRef<Path>) -> std::io::Result<()> {
    let schema_json = config_schema_json();
    std::fs::write(path, serde_json::to_string_pretty(&schema_json)?)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let raw: toml::Value = toml::from_str(content)?;
    let json_value = serde_json::to_value(&raw)?;
    let validation_errors: Vec<_> = CONFIG_SCHEMA
        .iter_errors(&json_value)
        .map(|e| e.to_string())
        .collect();
    if !validation_errors.is_empty() {
        return Err(anyhow::anyhow!(validation_errors.join(", ")));
    }
    let cfg: Config = toml::from_str(content)?;
    Ok(cfg)
}

pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    parse_config(&content).with_context(|| format!("parse config {}", path.display()))
}

/// Where server-wide settings come from.
pub trait SettingsSource: Send + Sync {
    fn load(&self) -> Result<Config>;
}

impl SettingsSource for Config {
    fn load(&self) -> Result<Config> {
        Ok(self.clone())
    }
}

/// Settings read from a TOML file on every (re)load.
#[derive(Debug, Clone)]
pub struct TomlSettings {
    path: PathBuf,
}

impl TomlSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingsSource for TomlSettings {
    fn load(&self) -> Result<Config> {
        load_config(&self.path)
    }
}

/// Settings loaded from their source on first access and kept until
/// [`LazySettings::reload`].
#[derive(Clone)]
pub struct LazySettings {
    source: Arc<dyn SettingsSource>,
    current: Arc<RwLock<Option<Arc<Config>>>>,
}

impl LazySettings {
    pub fn new(source: impl SettingsSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
            current: Arc::new(RwLock::new(None)),
        }
    }

    pub fn fixed(config: Config) -> Self {
        Self::new(config)
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::new(TomlSettings::new(path))
    }

    pub fn get(&self) -> Arc<Config> {
        if let Some(cfg) = self.current.read().as_ref() {
            return cfg.clone();
        }
        let mut slot = self.current.write();
        if let Some(cfg) = slot.as_ref() {
            return cfg.clone();
        }
        let cfg = Arc::new(self.load_or_default());
        *slot = Some(cfg.clone());
        cfg
    }

    /// Re-reads the source; the next [`get`](Self::get) sees the new values.
    pub fn reload(&self) -> Arc<Config> {
        let cfg = Arc::new(self.load_or_default());
        *self.current.write() = Some(cfg.clone());
        info!(target: "pps::config", "settings reloaded");
        cfg
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    fn load_or_default(&self) -> Config {
        match self.source.load() {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!(target: "pps::config", error = %format!("{err:#}"), "settings unavailable; using defaults");
                Config::default()
            }
        }
    }
}

impl Default for LazySettings {
    fn default() -> Self {
        Self::fixed(Config::default())
    }
}

impl std::fmt::Debug for LazySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazySettings")
            .field("current", &*self.current.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        loads: Arc<AtomicUsize>,
    }

    impl SettingsSource for Counting {
        fn load(&self) -> Result<Config> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Config::default())
        }
    }

    #[test]
    fn parses_sections_and_defaults() {
        let cfg = parse_config(
            r#"
            [limits]
            max_fixed_effects = 2
            disabled_worlds = ["nether"]

            [store]
            write_failure_policy = "apply_anyway"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.limits.max_fixed_effects, 2);
        assert_eq!(cfg.limits.max_fixed_effect_creation_distance, 128);
        assert_eq!(cfg.limits.disabled_worlds, vec!["nether".to_string()]);
        assert_eq!(cfg.store.write_failure_policy, WriteFailurePolicy::ApplyAnyway);
        assert_eq!(cfg.store.state_dir(), PathBuf::from("state"));

        let empty = parse_config("").unwrap();
        assert_eq!(empty.store.write_failure_policy, WriteFailurePolicy::SkipCacheEdit);
    }

    #[test]
    fn schema_rejects_wrong_types() {
        let err = parse_config("[limits]\nmax_fixed_effects = \"many\"\n").unwrap_err();
        assert!(err.to_string().contains("many"));
        assert!(parse_config("[store]\nwrite_failure_policy = \"sometimes\"\n").is_err());
    }

    #[test]
    fn schema_json_lists_sections() {
        let schema = config_schema_json();
        let props = &schema["properties"];
        assert!(props.get("limits").is_some());
        assert!(props.get("store").is_some());
    }

    #[test]
    fn lazy_settings_load_once_until_reload() {
        let loads = Arc::new(AtomicUsize::new(0));
        let settings = LazySettings::new(Counting {
            loads: loads.clone(),
        });
        assert!(!settings.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        settings.get();
        settings.get();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        settings.reload();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reload_picks_up_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pps.toml");
        std::fs::write(&path, "[limits]\nmax_fixed_effects = 3\n").unwrap();
        let settings = LazySettings::from_file(&path);
        assert_eq!(settings.get().limits.max_fixed_effects, 3);

        std::fs::write(&path, "[limits]\nmax_fixed_effects = 9\n").unwrap();
        assert_eq!(settings.get().limits.max_fixed_effects, 3);
        assert_eq!(settings.reload().limits.max_fixed_effects, 9);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LazySettings::from_file(dir.path().join("absent.toml"));
        assert_eq!(settings.get().limits.max_fixed_effects, 5);
        assert!(load_config(dir.path().join("absent.toml")).is_err());
    }
}
