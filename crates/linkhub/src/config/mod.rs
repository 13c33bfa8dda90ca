//! Static configuration and settings-backed feature toggles.

use crate::error::{BridgeError, BridgeResult};
use crate::store::SettingsStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "LINKHUB_DATA_DIR";

pub const DEFAULT_DATA_DIR: &str = "data";

/// Settings keys understood by the bridge.
pub mod keys {
    pub const ALLOWED_DIRS: &str = "allowed_dirs";
    pub const DESCRIBE_ON_INSTALL: &str = "describe_on_install";
    pub const INDEX_ON_INSTALL: &str = "index_on_install";
    pub const ELEVATION_FALLBACK: &str = "elevation_fallback";
    pub const DESCRIPTION_CONFIGURED: &str = "description_configured";
}

/// Resource limits applied while installing and scanning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Enumeration stops once this many executable candidates were collected.
    pub max_enumerated_candidates: usize,
    /// Candidates echoed back in an installation result.
    pub max_reported_candidates: usize,
    pub max_archive_entries: usize,
    /// Upper bound on the sum of declared uncompressed entry sizes.
    pub max_unpacked_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_enumerated_candidates: 2048,
            max_reported_candidates: 20,
            max_archive_entries: 50_000,
            max_unpacked_bytes: 8 * 1024 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub data_dir: Option<PathBuf>,
    pub limits: Limits,
}

/// Load a config file; `.yaml`/`.yml` as YAML, everything else as JSON.
pub fn load_config_file(path: &Path) -> BridgeResult<BridgeConfig> {
    let data = fs::read_to_string(path)
        .map_err(|err| BridgeError::io("failed to read config file", err))?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    if is_yaml {
        serde_yml::from_str(&data).map_err(|err| {
            BridgeError::bad_input(
                "failed to parse yaml config",
                serde_json::json!({ "path": path.display().to_string(), "source": err.to_string() }),
            )
        })
    } else {
        serde_json::from_str(&data).map_err(|err| {
            BridgeError::bad_input(
                "failed to parse json config",
                serde_json::json!({ "path": path.display().to_string(), "source": err.to_string() }),
            )
        })
    }
}

/// Data directory precedence: explicit flag, environment, config file, default.
pub fn resolve_data_dir(flag: Option<PathBuf>, config: &BridgeConfig) -> PathBuf {
    flag.or_else(|| std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
        .or_else(|| config.data_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Switches held in the settings store. Missing or unparseable values fall
/// back to the defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureToggles {
    pub describe_on_install: bool,
    pub index_on_install: bool,
    pub elevation_fallback: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            describe_on_install: true,
            index_on_install: true,
            elevation_fallback: true,
        }
    }
}

impl FeatureToggles {
    pub fn load(settings: &dyn SettingsStore) -> BridgeResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            describe_on_install: read_flag(
                settings,
                keys::DESCRIBE_ON_INSTALL,
                defaults.describe_on_install,
            )?,
            index_on_install: read_flag(settings, keys::INDEX_ON_INSTALL, defaults.index_on_install)?,
            elevation_fallback: read_flag(
                settings,
                keys::ELEVATION_FALLBACK,
                defaults.elevation_fallback,
            )?,
        })
    }
}

pub(crate) fn read_flag(settings: &dyn SettingsStore, key: &str, default: bool) -> BridgeResult<bool> {
    Ok(settings
        .get(key)?
        .and_then(|value| parse_flag(&value))
        .unwrap_or(default))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
