use std::sync::Arc;

use gym_agent_core::checkpoint::CheckpointStore;
use gym_agent_core::{Agent, AgentBuilder, BuildError};
use gym_agent_model::ModelProvider;
use gym_agent_openai_model::OpenAIProvider;

use crate::Error;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::tools::*;

/// The instructions of the equipment consultant persona.
pub const SYSTEM_PROMPT: &str = include_str!("./system_prompt.md");

/// An assistant builder.
///
/// The assistant is an [`Agent`] with the catalog tools registered and the
/// consultant persona as its system prompt.
pub struct AssistantBuilder {
    agent_builder: AgentBuilder,
    catalog: Arc<Catalog>,
}

impl AssistantBuilder {
    /// Creates an assistant builder answering from `catalog`.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
        catalog: Arc<Catalog>,
    ) -> Self {
        let agent_builder = AgentBuilder::with_model_provider(provider)
            .with_system_prompt(SYSTEM_PROMPT);
        Self {
            agent_builder,
            catalog,
        }
    }

    /// Replaces the built-in system prompt.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.agent_builder = self.agent_builder.with_system_prompt(prompt);
        self
    }

    /// Sets how many tool rounds a single turn may take.
    #[inline]
    pub fn with_max_tool_rounds(mut self, max_tool_rounds: usize) -> Self {
        self.agent_builder =
            self.agent_builder.with_max_tool_rounds(max_tool_rounds);
        self
    }

    /// Sets where conversations are kept between turns.
    #[inline]
    pub fn with_checkpoint_store(
        mut self,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        self.agent_builder = self.agent_builder.with_checkpoint_store(store);
        self
    }

    /// Builds the assistant.
    pub fn build(self) -> Result<Agent, BuildError> {
        let catalog = self.catalog;
        self.agent_builder
            .with_tool(SearchProductTool::new(Arc::clone(&catalog)))
            .with_tool(GetProductsTool::new(Arc::clone(&catalog)))
            .with_tool(SearchCompanyTool::new(catalog))
            .build()
    }
}

/// Builds the assistant described by `config`, backed by an
/// OpenAI-compatible API.
pub fn build_from_config(config: &Config) -> Result<Agent, Error> {
    let catalog = Arc::new(config.load_catalog()?);
    info!("catalog has {} products", catalog.all().len());
    let provider = OpenAIProvider::new(config.openai_config());
    let agent = AssistantBuilder::with_model_provider(provider, catalog)
        .with_max_tool_rounds(config.max_tool_rounds)
        .build()?;
    Ok(agent)
}
