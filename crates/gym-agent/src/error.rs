use gym_agent_core::BuildError;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigError;

/// Errors that stop the application from starting.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration is incomplete or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The catalog could not be loaded.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The agent could not be assembled.
    #[error("Failed to build the assistant: {0}")]
    Build(#[from] BuildError),

    /// The server could not bind or stopped serving.
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}
