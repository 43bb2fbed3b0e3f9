//! Configuration file loading for engine matches.
//!
//! Engines are declared in `arena.toml`:
//!
//! ```toml
//! max_plies = 200
//!
//! [engines.stockfish]
//! path = "/usr/bin/stockfish"
//! depth = 8
//! randomize = { min = -50, max = 50 }
//!
//! [engines.stockfish.options]
//! Threads = 2
//! "Skill Level" = 10
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::match_runner::DEFAULT_MAX_PLIES;

/// Errors that can occur when loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// Requested engine was not found in the configuration.
    #[error("Engine not found: {0}")]
    EngineNotFound(String),
    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Value of a UCI option as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Int(n) => write!(f, "{}", n),
            OptionValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Inclusive range for randomized evaluation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: i64,
    pub max: i64,
}

/// Options sent to every engine unless `base_options = false`.
pub const BASE_OPTIONS: &[(&str, &str)] = &[
    ("Write Debug Log", "false"),
    ("Contempt Factor", "0"),
    ("Contempt", "0"),
    ("Min Split Depth", "0"),
    ("Threads", "1"),
    ("Hash", "16"),
    ("MultiPV", "1"),
    ("Skill Level", "20"),
    ("Move Overhead", "30"),
    ("Minimum Thinking Time", "20"),
    ("Slow Mover", "80"),
    ("UCI_Chess960", "false"),
];

/// Parameters drawn from [`EngineConfig::randomize`].
const RANDOMIZED_OPTIONS: &[&str] = &["Contempt", "Contempt Factor"];

/// Configuration for one UCI engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the engine executable.
    pub path: PathBuf,
    /// Extra command-line arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Search depth for `go depth`. Defaults to 2.
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default)]
    pub ponder: bool,
    /// Whether to send [`BASE_OPTIONS`] before the explicit options.
    #[serde(default = "default_true")]
    pub base_options: bool,
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub randomize: Option<ParamRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout_ms: Option<u64>,
}

fn default_depth() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

impl EngineConfig {
    /// Default configuration for the engine at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            depth: default_depth(),
            ponder: false,
            base_options: true,
            options: BTreeMap::new(),
            randomize: None,
            read_timeout_ms: None,
        }
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the depth is zero or the
    /// randomize range is inverted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.depth == 0 {
            return Err(ConfigError::Invalid(format!(
                "{}: depth must be positive",
                self.path.display()
            )));
        }
        if let Some(range) = self.randomize {
            if range.min > range.max {
                return Err(ConfigError::Invalid(format!(
                    "{}: randomize min {} exceeds max {}",
                    self.path.display(),
                    range.min,
                    range.max
                )));
            }
        }
        Ok(())
    }

    /// Produces the ordered `setoption` list for this engine.
    ///
    /// `Ponder` comes first, then the base options, then randomized
    /// parameters drawn from `rng`, then explicit options. A later entry
    /// with the same name replaces the earlier value in place.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if [`validate`](Self::validate) fails.
    pub fn resolve_options<R: Rng>(
        &self,
        rng: &mut R,
    ) -> Result<Vec<(String, String)>, ConfigError> {
        self.validate()?;
        let mut resolved = Vec::new();
        upsert(&mut resolved, "Ponder", self.ponder.to_string());

        if self.base_options {
            for (name, value) in BASE_OPTIONS {
                upsert(&mut resolved, name, value.to_string());
            }
        }

        if let Some(range) = self.randomize {
            for name in RANDOMIZED_OPTIONS {
                let value = rng.gen_range(range.min..=range.max);
                upsert(&mut resolved, name, value.to_string());
            }
        }

        for (name, value) in &self.options {
            upsert(&mut resolved, name, value.to_string());
        }
        Ok(resolved)
    }
}

fn upsert(options: &mut Vec<(String, String)>, name: &str, value: String) {
    match options.iter_mut().find(|(n, _)| n == name) {
        Some(entry) => entry.1 = value,
        None => options.push((name.to_string(), value)),
    }
}

/// Main configuration structure, loaded from `arena.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Map of engine names to their configurations.
    #[serde(default)]
    pub engines: BTreeMap<String, EngineConfig>,
    /// Half-move ceiling after which a match is drawn.
    #[serde(default = "default_max_plies")]
    pub max_plies: usize,
}

fn default_max_plies() -> usize {
    DEFAULT_MAX_PLIES
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            engines: BTreeMap::new(),
            max_plies: DEFAULT_MAX_PLIES,
        }
    }
}

impl ArenaConfig {
    /// Loads `arena.toml` from the working directory, or defaults if the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file exists but cannot be read,
    /// [`ConfigError::ParseError`] if the file contains invalid TOML, or
    /// [`ConfigError::Invalid`] if an engine entry fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads and validates the file at `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        PathBuf::from("arena.toml")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engines.values().try_for_each(EngineConfig::validate)
    }

    /// Retrieves an engine configuration by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EngineNotFound`] if no engine with the given name exists.
    pub fn get_engine(&self, name: &str) -> Result<&EngineConfig, ConfigError> {
        self.engines
            .get(name)
            .ok_or_else(|| ConfigError::EngineNotFound(name.to_string()))
    }

    /// Looks `name` up, treating unknown names as an executable path.
    pub fn resolve(&self, name: &str) -> EngineConfig {
        match self.get_engine(name) {
            Ok(config) => config.clone(),
            Err(_) => EngineConfig::new(name),
        }
    }
}
