//! Experiment configuration file.
//!
//! ```toml
//! [experiment]
//! treatment = "team"        # individual | chat | team, or I / C / T
//! group_size = 2
//! num_rounds = 20
//! alpha = 0.5
//! theta = 100
//! sync_scope = "group"      # group | session
//!
//! [simulation]
//! participants = 10
//! seed = 42
//! barrier_timeout_ms = 5000
//! strategy = { kind = "fixed", value = 50 }
//! ```
//!
//! The `[experiment]` table is validated while it is deserialized, so a
//! parsed [`ExperimentFile`] always holds a usable [`ExperimentConfig`].

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use search_types::{ConfigurationError, ExperimentConfig};

/// Environment variable naming a config file to use instead of the default.
pub const CONFIG_ENV: &str = "SEARCH_EXPERIMENT_CONFIG";

const DEFAULT_PARTICIPANTS: u32 = 4;
const DEFAULT_BARRIER_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config at {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config at {}", path.display())]
    Validation {
        path: PathBuf,
        #[source]
        source: SimulationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Validation { path, .. } => path,
        }
    }
}

/// Settings of the simulated session that do not fit the experiment itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("a session needs at least one participant")]
    NoParticipants,
    #[error("fixed reservation wage {value} is outside [0, {theta}]")]
    FixedWageOutOfRange { value: i64, theta: u32 },
    #[error("barrier timeout must be positive")]
    ZeroBarrierTimeout,
    #[error(transparent)]
    Experiment(#[from] ConfigurationError),
}

/// How simulated participants pick their reservation wage each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReservationStrategy {
    /// The same wage every round.
    Fixed { value: i64 },
    /// Uniform over `[0, theta]`, drawn fresh each round.
    #[default]
    Uniform,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub participants: u32,
    /// `None` seeds from the OS.
    pub seed: Option<u64>,
    pub strategy: ReservationStrategy,
    pub barrier_timeout_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            participants: DEFAULT_PARTICIPANTS,
            seed: None,
            strategy: ReservationStrategy::default(),
            barrier_timeout_ms: DEFAULT_BARRIER_TIMEOUT_MS,
        }
    }
}

impl SimulationConfig {
    #[must_use]
    pub fn barrier_timeout(&self) -> Duration {
        Duration::from_millis(self.barrier_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentFile {
    pub experiment: ExperimentConfig,
    pub simulation: SimulationConfig,
}

impl ExperimentFile {
    /// Parse and cross-check a config document. `path` is only used for errors.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: ExperimentFile = toml::from_str(content).map_err(|source| {
            tracing::warn!(path = %path.display(), "Failed to parse config: {source}");
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        file.validate().map_err(|source| {
            tracing::warn!(path = %path.display(), "Invalid config: {source}");
            ConfigError::Validation {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(file)
    }

    /// Checks that span both tables. Re-run after applying command-line
    /// overrides.
    pub fn validate(&self) -> Result<(), SimulationError> {
        let simulation = &self.simulation;
        if simulation.participants == 0 {
            return Err(SimulationError::NoParticipants);
        }
        if simulation.barrier_timeout_ms == 0 {
            return Err(SimulationError::ZeroBarrierTimeout);
        }
        if let ReservationStrategy::Fixed { value } = simulation.strategy {
            let theta = self.experiment.theta();
            if value < 0 || value > i64::from(theta) {
                return Err(SimulationError::FixedWageOutOfRange { value, theta });
            }
        }
        let group_size = self.experiment.group_size();
        if !simulation.participants.is_multiple_of(group_size) {
            return Err(ConfigurationError::IndivisibleGroups {
                participants: simulation.participants as usize,
                group_size,
            }
            .into());
        }
        Ok(())
    }

    /// Read a specific file. A missing file is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            tracing::warn!(path = %path.display(), "Failed to read config: {source}");
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let file = Self::parse(&content, path)?;
        tracing::info!(path = %path.display(), "Loaded config");
        Ok(file)
    }

    /// Load from `explicit`, else the file named by [`CONFIG_ENV`], else
    /// `~/.search-experiment/config.toml`.
    ///
    /// Only the last one may be absent, in which case defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let env = std::env::var_os(CONFIG_ENV);
        match resolve_path(explicit, env, dirs::home_dir()) {
            Some(ConfigSource::Required(path)) => Self::load_from(&path),
            Some(ConfigSource::Default(path)) if path.exists() => Self::load_from(&path),
            Some(ConfigSource::Default(path)) => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }
}

/// Where a config file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named by the user; must exist.
    Required(PathBuf),
    /// The per-user default; may be absent.
    Default(PathBuf),
}

/// Pick the config file from the flag, the environment, and the home directory.
#[must_use]
pub fn resolve_path(
    explicit: Option<&Path>,
    env: Option<OsString>,
    home: Option<PathBuf>,
) -> Option<ConfigSource> {
    if let Some(path) = explicit {
        return Some(ConfigSource::Required(path.to_path_buf()));
    }
    if let Some(value) = env.filter(|value| !value.is_empty()) {
        return Some(ConfigSource::Required(PathBuf::from(value)));
    }
    home.map(|home| ConfigSource::Default(default_path_in(&home)))
}

fn default_path_in(home: &Path) -> PathBuf {
    home.join(".search-experiment").join("config.toml")
}
