//! Configuration management.
//!
//! Configuration is read from environment variables, after an optional
//! `.env` file has been loaded by the binaries:
//! - `OPENAI_API_KEY` - Required. The API key of the model provider.
//! - `OPENAI_BASE_URL` - Optional. Defaults to `https://api.openai.com/v1`.
//! - `OPENAI_MODEL` - Optional. Defaults to `gpt-4o-mini`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `MAX_TOOL_ROUNDS` - Optional. Tool rounds allowed per turn. Defaults to `10`.
//! - `CATALOG_PATH` - Optional. A JSON catalog replacing the built-in one.
//! - `STREAM_TOOL_EVENTS` - Optional. Forward tool activity over SSE. Defaults to `false`.

use std::path::PathBuf;

use gym_agent_core::DEFAULT_MAX_TOOL_ROUNDS;
use gym_agent_openai_model::{OpenAIConfig, OpenAIConfigBuilder};
use thiserror::Error;

use crate::catalog::{Catalog, CatalogError};

/// Error type for [`Config::from_env`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// A variable is set to something unusable.
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Application configuration.
#[derive(Clone)]
pub struct Config {
    /// Model provider API key
    pub openai_api_key: String,

    /// Model provider base URL, provider default if unset
    pub openai_base_url: Option<String>,

    /// Model identifier, provider default if unset
    pub openai_model: Option<String>,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Tool rounds allowed in a single turn
    pub max_tool_rounds: usize,

    /// Catalog file, the built-in catalog if unset
    pub catalog_path: Option<PathBuf>,

    /// Whether `tool` records are sent over SSE
    pub stream_tool_events: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("openai_api_key", &"<redacted>")
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("catalog_path", &self.catalog_path)
            .field("stream_tool_events", &self.stream_tool_events)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENAI_API_KEY` is not set,
    /// and `ConfigError::InvalidValue` if a numeric or boolean variable
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any source of variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset, as `.env` templates often leave them.
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let openai_api_key = var("OPENAI_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = var("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let max_tool_rounds = var("MAX_TOOL_ROUNDS")
            .map(|v| {
                v.trim().parse::<usize>().map_err(|e| {
                    ConfigError::InvalidValue("MAX_TOOL_ROUNDS".to_string(), format!("{}", e))
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_MAX_TOOL_ROUNDS);
        if max_tool_rounds == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_TOOL_ROUNDS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let stream_tool_events = var("STREAM_TOOL_EVENTS")
            .map(|v| {
                parse_bool(&v)
                    .map_err(|e| ConfigError::InvalidValue("STREAM_TOOL_EVENTS".to_string(), e))
            })
            .transpose()?
            .unwrap_or(false);

        Ok(Self {
            openai_api_key,
            openai_base_url: var("OPENAI_BASE_URL"),
            openai_model: var("OPENAI_MODEL"),
            host,
            port,
            max_tool_rounds,
            catalog_path: var("CATALOG_PATH").map(PathBuf::from),
            stream_tool_events,
        })
    }

    /// Returns the provider configuration.
    pub fn openai_config(&self) -> OpenAIConfig {
        let mut builder = OpenAIConfigBuilder::with_api_key(&self.openai_api_key);
        if let Some(base_url) = &self.openai_base_url {
            builder = builder.with_base_url(base_url);
        }
        if let Some(model) = &self.openai_model {
            builder = builder.with_model(model);
        }
        builder.build()
    }

    /// Loads the configured catalog.
    pub fn load_catalog(&self) -> Result<Catalog, CatalogError> {
        match &self.catalog_path {
            Some(path) => Catalog::from_path(path),
            None => Catalog::builtin(),
        }
    }

    /// Returns the address the server binds to.
    #[inline]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}
