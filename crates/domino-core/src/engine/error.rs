use thiserror::Error;

use super::config::ConfigError;
use super::containers::ContainerError;
use crate::core::graph::DecompositionError;
use crate::core::graph::junction_tree::NodeIndex;
use crate::core::io::solutions::SolutionTableError;
use crate::core::models::system::ModelError;

/// Broad class of an [`EngineError`], for callers deciding how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller misuse; fix the setup, do not retry as-is.
    Configuration,
    /// A ceiling was hit; retry with a coarser decomposition or tighter bounds.
    ResourceExhausted,
    /// An engine bug; the run produced no trustworthy result.
    Internal,
    Io,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Model error: {source}")]
    Model {
        #[from]
        source: ModelError,
    },

    #[error("Decomposition failed: {source}")]
    Decomposition {
        #[from]
        source: DecompositionError,
    },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Assignment container error at node {node}: {source}")]
    Container {
        node: NodeIndex,
        source: ContainerError,
    },

    #[error("Resource limit exceeded at node {node}: {resource} is {size}, limit is {limit}")]
    ResourceExhausted {
        node: NodeIndex,
        resource: &'static str,
        size: u128,
        limit: u128,
    },

    #[error("Failed to write '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to export solutions to '{path}': {source}")]
    Csv {
        path: String,
        source: SolutionTableError,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Model { .. } | EngineError::Decomposition { .. } => {
                ErrorKind::Configuration
            }
            EngineError::Config { source } => match source {
                ConfigError::Io { .. } => ErrorKind::Io,
                _ => ErrorKind::Configuration,
            },
            EngineError::Container { source, .. } => match source {
                ContainerError::CapacityExceeded { .. } => ErrorKind::ResourceExhausted,
                ContainerError::Storage { .. } => ErrorKind::Io,
                ContainerError::WidthMismatch { .. } | ContainerError::ReadOnly => {
                    ErrorKind::Internal
                }
            },
            EngineError::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            EngineError::Io { .. } | EngineError::Csv { .. } => ErrorKind::Io,
            EngineError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_resource_exhausted(&self) -> bool {
        self.kind() == ErrorKind::ResourceExhausted
    }
}
