//! Screening configuration
//!
//! Loaded from YAML (`config/watchlist.yaml` by default). Every section and
//! field has a default, so an empty document is a valid configuration.
//! A few fields can be overridden from the environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `WATCHLIST_DATA_DIR` | `data.directory` |
//! | `WATCHLIST_REFRESH_INTERVAL_SECS` | `refresh.interval_secs` |
//! | `WATCHLIST_MIN_MATCH` | `search.default_threshold` |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::model::SourceList;
use crate::reader::Section;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ScreeningConfig {
    pub refresh: RefreshConfig,
    pub data: DataConfig,
    pub search: SearchConfig,
    pub scoring: ScoringWeights,
}

/// Configuration for reload scheduling
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between scheduled reloads; 0 disables the timer
    pub interval_secs: u64,
    pub startup_mode: StartupMode,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 12 * 60 * 60,
            startup_mode: StartupMode::Sync,
        }
    }
}

/// Startup mode for the initial load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupMode {
    /// Start immediately and load in the background
    Async,
    /// Wait until the first load completes
    #[default]
    Sync,
}

/// Where the raw list files live
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DataConfig {
    pub directory: PathBuf,
    /// Lists to load; empty means all
    pub included_lists: Vec<SourceList>,
    /// File name overrides per section
    pub files: BTreeMap<Section, String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("data"),
            included_lists: Vec::new(),
            files: BTreeMap::new(),
        }
    }
}

impl DataConfig {
    pub fn includes(&self, list: SourceList) -> bool {
        self.included_lists.is_empty() || self.included_lists.contains(&list)
    }

    /// File name for a section, honoring overrides
    pub fn file_name(&self, section: Section) -> &str {
        self.files
            .get(&section)
            .map(String::as_str)
            .unwrap_or_else(|| section.default_file_name())
    }

    pub fn path_for(&self, section: Section) -> PathBuf {
        self.directory.join(self.file_name(section))
    }
}

/// Query defaults and index build settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Minimum score for a hit when the query does not set one
    pub default_threshold: f64,
    pub default_limit: usize,
    pub max_limit: usize,
    /// Characters per token used by the prefix pre-filter
    pub prefix_len: usize,
    pub strip_legal_suffixes: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_threshold: 0.80,
            default_limit: 10,
            max_limit: 500,
            prefix_len: 3,
            strip_legal_suffixes: true,
        }
    }
}

/// Weights of the optional score refinements
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub address_weight: f64,
    pub program_weight: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            address_weight: 0.10,
            program_weight: 0.05,
        }
    }
}

impl ScreeningConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: ScreeningConfig = if content.trim().is_empty() {
            ScreeningConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply `WATCHLIST_*` environment overrides, then re-validate
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(dir) = lookup("WATCHLIST_DATA_DIR") {
            self.data.directory = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("WATCHLIST_REFRESH_INTERVAL_SECS") {
            self.refresh.interval_secs = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("WATCHLIST_REFRESH_INTERVAL_SECS: {raw:?}"))
            })?;
        }
        if let Some(raw) = lookup("WATCHLIST_MIN_MATCH") {
            self.search.default_threshold = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("WATCHLIST_MIN_MATCH: {raw:?}")))?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let search = &self.search;
        if !(0.0..=1.0).contains(&search.default_threshold) {
            return Err(ConfigError::Invalid(format!(
                "search.default_threshold must be within [0, 1], got {}",
                search.default_threshold
            )));
        }
        if search.max_limit == 0 {
            return Err(ConfigError::Invalid("search.max_limit must be > 0".into()));
        }
        if search.default_limit == 0 || search.default_limit > search.max_limit {
            return Err(ConfigError::Invalid(format!(
                "search.default_limit must be within 1..={}, got {}",
                search.max_limit, search.default_limit
            )));
        }
        if search.prefix_len == 0 {
            return Err(ConfigError::Invalid("search.prefix_len must be > 0".into()));
        }
        for (name, weight) in [
            ("scoring.address_weight", self.scoring.address_weight),
            ("scoring.program_weight", self.scoring.program_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be within [0, 1], got {weight}"
                )));
            }
        }
        Ok(())
    }
}
