use super::semantics::ScoreSemantics;
use crate::core::graph::triangulation::EliminationHeuristic;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

/// Where and how each junction-tree node keeps its assignments.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", deny_unknown_fields)]
pub enum StorageConfig {
    /// Keep every feasible assignment in a growable list.
    #[default]
    Unbounded,
    /// Keep every feasible assignment, packed into one flat state buffer.
    Packed,
    /// Keep only the `k` best assignments per node. Makes inference approximate.
    KeepBest { k: usize },
    /// Keep every assignment, but fail the run once a node holds more than `max`.
    Capped { max: usize },
    /// Keep a uniform random sample of `k` assignments per node. Makes
    /// inference approximate.
    Sample { k: usize, seed: u64 },
    /// Keep every assignment in one binary record file per node, readable
    /// with [`DiskContainer::open`](crate::engine::containers::DiskContainer::open)
    /// after the run.
    ///
    /// This persists node tables; it does not lower peak memory. Duplicate
    /// detection and each retained assignment's derivations stay in memory
    /// for back-tracking.
    Disk { directory: PathBuf },
}

impl StorageConfig {
    /// True if the storage may discard feasible assignments.
    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::KeepBest { .. } | Self::Sample { .. })
    }
}

/// Whether node potential tables are computed up front or on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableMode {
    #[default]
    Eager,
    /// Evaluate on demand through a shared score cache.
    Lazy,
}

/// Ceilings that turn combinatorial blow-up into a reportable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ResourceLimits {
    /// Largest joint domain any junction-tree node may have.
    pub max_domain_size: Option<u64>,
    /// Largest number of assignments any node may retain.
    pub max_assignments_per_node: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    pub num_solutions: usize,
    pub semantics: ScoreSemantics,
    pub storage: StorageConfig,
    pub heuristic: EliminationHeuristic,
    pub table_mode: TableMode,
    pub limits: ResourceLimits,
}

impl InferenceConfig {
    pub fn builder() -> InferenceConfigBuilder {
        InferenceConfigBuilder::new()
    }

    /// True if the settings alone may make the result approximate.
    pub fn is_lossy(&self) -> bool {
        self.storage.is_lossy()
    }

    /// Loads a configuration from a TOML file.
    ///
    /// Keys are kebab-case and mirror the builder; only `num-solutions` is
    /// required. Unknown keys are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Toml`] if the file cannot be
    /// read or parsed, and the builder's errors for invalid values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: ConfigFile = toml::from_str(&content).map_err(|e| ConfigError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;

        let mut builder = InferenceConfigBuilder::new();
        builder.num_solutions = file.num_solutions;
        builder.semantics = file.semantics;
        builder.storage = file.storage;
        builder.heuristic = file.heuristic;
        builder.table_mode = file.table_mode;
        builder.limits = file.limits;
        builder.build()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ConfigFile {
    num_solutions: Option<usize>,
    semantics: Option<ScoreSemantics>,
    storage: Option<StorageConfig>,
    heuristic: Option<EliminationHeuristic>,
    table_mode: Option<TableMode>,
    limits: Option<ResourceLimits>,
}

#[derive(Default)]
pub struct InferenceConfigBuilder {
    num_solutions: Option<usize>,
    semantics: Option<ScoreSemantics>,
    storage: Option<StorageConfig>,
    heuristic: Option<EliminationHeuristic>,
    table_mode: Option<TableMode>,
    limits: Option<ResourceLimits>,
}

impl InferenceConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_solutions(mut self, n: usize) -> Self {
        self.num_solutions = Some(n);
        self
    }
    pub fn semantics(mut self, semantics: ScoreSemantics) -> Self {
        self.semantics = Some(semantics);
        self
    }
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.storage = Some(storage);
        self
    }
    pub fn heuristic(mut self, heuristic: EliminationHeuristic) -> Self {
        self.heuristic = Some(heuristic);
        self
    }
    pub fn table_mode(mut self, mode: TableMode) -> Self {
        self.table_mode = Some(mode);
        self
    }
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn build(self) -> Result<InferenceConfig, ConfigError> {
        let num_solutions = self
            .num_solutions
            .ok_or(ConfigError::MissingParameter("num_solutions"))?;
        if num_solutions == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "num_solutions",
                reason: "must be at least 1".to_string(),
            });
        }

        let storage = self.storage.unwrap_or_default();
        match &storage {
            StorageConfig::KeepBest { k: 0 } | StorageConfig::Sample { k: 0, .. } => {
                return Err(ConfigError::InvalidParameter {
                    name: "storage.k",
                    reason: "must be at least 1".to_string(),
                });
            }
            StorageConfig::Capped { max: 0 } => {
                return Err(ConfigError::InvalidParameter {
                    name: "storage.max",
                    reason: "must be at least 1".to_string(),
                });
            }
            StorageConfig::KeepBest { k } if *k < num_solutions => {
                warn!(
                    k,
                    num_solutions, "Keep-best bound is smaller than the number of requested solutions."
                );
            }
            _ => {}
        }

        let limits = self.limits.unwrap_or_default();
        if limits.max_domain_size == Some(0) || limits.max_assignments_per_node == Some(0) {
            return Err(ConfigError::InvalidParameter {
                name: "limits",
                reason: "ceilings must be positive".to_string(),
            });
        }

        Ok(InferenceConfig {
            num_solutions,
            semantics: self.semantics.unwrap_or_default(),
            storage,
            heuristic: self.heuristic.unwrap_or_default(),
            table_mode: self.table_mode.unwrap_or_default(),
            limits,
        })
    }
}
