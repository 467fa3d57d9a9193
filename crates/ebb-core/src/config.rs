//! Configuration loading and typed config structures for the law engine.
//!
//! The canonical configuration lives in `ebb-config.yaml` at the project
//! root. [`LawConfig`] mirrors its structure section by section; every
//! field has a default, so a partial file (or an empty one) is valid.
//!
//! # Environment overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `EBB_SEED` | `world.seed` |
//! | `EBB_MAX_TICKS` | `run.max_ticks` |

use std::path::Path;

use ebb_laws::{
    AggregationConfig, CosmicConfig, CulturalConfig, DiffusionConfig, EvolutionConfig,
    KineticsConfig, MetabolismConfig, PhysicsConfig, PopulationConfig, ThermodynamicsConfig,
    ValidationConfig, ViolationPolicy,
};
use ebb_ledger::LedgerConfig;
use ebb_store::SpatialConfig;
use serde::Deserialize;
use tracing::warn;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level law engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LawConfig {
    /// Seed, name and commit policy.
    #[serde(default)]
    pub world: WorldConfig,

    /// Ledger tolerances and ring sizes.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Octree shape.
    #[serde(default)]
    pub spatial: SpatialConfig,

    /// Stellar forcing.
    #[serde(default)]
    pub cosmic: CosmicConfig,

    /// Heat transfer and phases.
    #[serde(default)]
    pub thermodynamics: ThermodynamicsConfig,

    /// Reaction kinetics.
    #[serde(default)]
    pub kinetics: KineticsConfig,

    /// Brownian motion.
    #[serde(default)]
    pub diffusion: DiffusionConfig,

    /// Aggregation and disaggregation.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Periodic ledger cross-check.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Rigid-body bridge.
    #[serde(default)]
    pub physics: PhysicsConfig,

    /// Organism energy budgets.
    #[serde(default)]
    pub metabolism: MetabolismConfig,

    /// Selection and fission.
    #[serde(default)]
    pub evolution: EvolutionConfig,

    /// Trophic population model.
    #[serde(default)]
    pub population: PopulationConfig,

    /// Meme transmission.
    #[serde(default)]
    pub cultural: CulturalConfig,

    /// Run loop bounds and pacing.
    #[serde(default)]
    pub run: RunConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LawConfig {
    /// Load configuration from a YAML file and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string and apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override fields from `EBB_SEED` and `EBB_MAX_TICKS` when set.
    /// Unparseable values are logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("EBB_SEED") {
            match val.parse() {
                Ok(seed) => self.world.seed = seed,
                Err(_) => warn!(value = %val, "Ignoring unparseable EBB_SEED"),
            }
        }
        if let Ok(val) = std::env::var("EBB_MAX_TICKS") {
            match val.parse() {
                Ok(max_ticks) => self.run.max_ticks = max_ticks,
                Err(_) => warn!(value = %val, "Ignoring unparseable EBB_MAX_TICKS"),
            }
        }
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable world name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Seed for the world's random number generator.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Whether unbalanced transformations are committed.
    #[serde(default)]
    pub violation_policy: ViolationPolicy,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
            violation_policy: ViolationPolicy::default(),
        }
    }
}

/// Run loop configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    /// Simulated seconds per tick.
    #[serde(default = "default_tick_delta")]
    pub tick_delta: f64,

    /// Real-time milliseconds between ticks (0 = as fast as possible).
    #[serde(default)]
    pub tick_interval_ms: u64,

    /// Stop after this many ticks (0 = unlimited).
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Stop after this many wall-clock seconds (0 = unlimited).
    #[serde(default)]
    pub max_real_time_seconds: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tick_delta: default_tick_delta(),
            tick_interval_ms: 0,
            max_ticks: default_max_ticks(),
            max_real_time_seconds: 0,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Line format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    "Ebb Bloom".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_tick_delta() -> f64 {
    0.1
}

const fn default_max_ticks() -> u64 {
    600
}

fn default_log_level() -> String {
    "info".to_owned()
}
