use std::sync::Arc;

use gym_agent_model::{ModelProvider, SamplingConfig};

use super::{Agent, BuildError};
use crate::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use crate::model_client::ModelClient;
use crate::tool::{AnyTool, Manager as ToolManager, Tool, ToolObject};

/// The default bound of Acting steps in a single turn.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;

/// [`Agent`] builder.
pub struct AgentBuilder {
    pub(crate) model_client: ModelClient,
    pub(crate) system_prompt: Option<String>,
    pub(crate) tools: Vec<Box<dyn ToolObject>>,
    pub(crate) sampling: SamplingConfig,
    pub(crate) max_tool_rounds: usize,
    pub(crate) checkpoint_store: Option<Arc<dyn CheckpointStore>>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    ///
    /// Sampling is deterministic unless [`with_temperature`] says otherwise.
    ///
    /// [`with_temperature`]: Self::with_temperature
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            system_prompt: None,
            tools: vec![],
            sampling: SamplingConfig::deterministic(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            checkpoint_store: None,
        }
    }

    /// Sets the instructions placed before the history in every request.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        let tool = Box::new(AnyTool(tool));
        self.tools.push(tool);
        self
    }

    /// Sets the sampling temperature.
    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.sampling.temperature = Some(temperature);
        self
    }

    /// Sets how many Acting steps a single turn may take.
    #[inline]
    pub fn with_max_tool_rounds(mut self, max_tool_rounds: usize) -> Self {
        self.max_tool_rounds = max_tool_rounds;
        self
    }

    /// Sets where conversations are kept between turns. Defaults to a
    /// [`MemoryCheckpointStore`].
    #[inline]
    pub fn with_checkpoint_store(
        mut self,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        self.checkpoint_store = Some(store);
        self
    }

    /// Builds the agent.
    pub fn build(self) -> Result<Agent, BuildError> {
        let AgentBuilder {
            model_client,
            system_prompt,
            tools,
            sampling,
            max_tool_rounds,
            checkpoint_store,
        } = self;

        if max_tool_rounds == 0 {
            return Err(BuildError::ZeroToolRounds);
        }
        let tool_manager = ToolManager::with_tools(tools)
            .map_err(|dup| BuildError::DuplicateTool(dup.0))?;
        let checkpoint_store = checkpoint_store
            .unwrap_or_else(|| Arc::new(MemoryCheckpointStore::default()));

        Ok(Agent::from_parts(
            model_client,
            system_prompt,
            tool_manager,
            sampling,
            max_tool_rounds,
            checkpoint_store,
        ))
    }
}
