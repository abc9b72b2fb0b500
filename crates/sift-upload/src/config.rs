use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use sift_archive::UnpackOptions;
use sift_store::StorageConfig;

use crate::check::CheckSettings;
use crate::error::Result;

/// What a second mutator does while a workspace is busy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Block until the first call finishes.
    #[default]
    Wait,
    /// Fail fast with [`crate::Error::Busy`].
    Fail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnpackLimits {
    pub max_depth: usize,
    pub max_entries: usize,
    pub max_total_bytes: u64,
}

impl Default for UnpackLimits {
    fn default() -> Self {
        let defaults = UnpackOptions::default();
        Self {
            max_depth: defaults.max_depth,
            max_entries: defaults.max_entries,
            max_total_bytes: defaults.max_total_bytes,
        }
    }
}

/// Settings for a workspace service.
///
/// Loaded from an optional TOML file, then overridden by `SIFT_` environment
/// variables. Nested keys use a double underscore, so
/// `SIFT_UNPACK__MAX_DEPTH=2` sets `unpack.max_depth`.
///
/// ```toml
/// max_file_bytes = 52428800
/// conflict = "fail"
///
/// [storage]
/// kind = "quarantine"
/// ephemeral_root = "/fast/sift"
/// durable_root = "/shared/sift"
///
/// [unpack]
/// max_depth = 2
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    /// Directory for workspace metadata documents. In memory when unset.
    pub metadata_dir: Option<PathBuf>,
    pub unpack: UnpackLimits,
    pub max_file_bytes: u64,
    pub max_package_bytes: u64,
    pub case_insensitive: bool,
    pub conflict: ConflictPolicy,
    /// Upper bound on checking passes per call.
    pub max_passes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            metadata_dir: None,
            unpack: UnpackLimits::default(),
            max_file_bytes: 50 * 1024 * 1024,
            max_package_bytes: 200 * 1024 * 1024,
            case_insensitive: false,
            conflict: ConflictPolicy::default(),
            max_passes: 8,
        }
    }
}

impl Config {
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed("SIFT_").split("__"))
    }

    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(file))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().map_err(Box::new)?;
        tracing::debug!(?config, "loaded configuration");
        Ok(config)
    }

    pub fn check_settings(&self) -> CheckSettings {
        CheckSettings {
            max_file_bytes: self.max_file_bytes,
            max_package_bytes: self.max_package_bytes,
        }
    }

    pub fn unpack_options(&self) -> UnpackOptions {
        UnpackOptions::new()
            .max_depth(self.unpack.max_depth)
            .max_entries(self.unpack.max_entries)
            .max_total_bytes(self.unpack.max_total_bytes)
            .case_insensitive(self.case_insensitive)
    }
}
