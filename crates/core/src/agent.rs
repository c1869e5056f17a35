mod builder;
mod error;
#[cfg(test)]
mod tests;
mod turn;

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use gym_agent_model::{ModelMessage, SamplingConfig};
use tokio::sync::Mutex;

use crate::checkpoint::CheckpointStore;
use crate::conversation::Conversation;
use crate::model_client::ModelClient;
use crate::relay::{self, DoneGuard, EventStream, StreamEvent};
use crate::tool::Manager as ToolManager;
pub use builder::{AgentBuilder, DEFAULT_MAX_TOOL_ROUNDS};
pub use error::{BuildError, Error, ErrorKind};

/// Where the control loop goes after a Reasoning step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    /// Execute the requested tools, then reason again.
    Act,
    /// The turn is over.
    Terminate,
}

/// Decides the next step from the latest message of the conversation.
///
/// Only an assistant message carrying tool calls leads to [`Route::Act`],
/// a missing message terminates as well.
#[inline]
pub fn route(latest: Option<&ModelMessage>) -> Route {
    match latest {
        Some(msg) if !msg.tool_calls().is_empty() => Route::Act,
        _ => Route::Terminate,
    }
}

/// A chat agent, which owns a model client, a toolset and the checkpoints
/// of every thread.
///
/// The agent is cheap to clone, clones share everything. Turns of
/// different threads run independently, turns of the same thread run one
/// after another.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

pub(crate) struct AgentInner {
    model_client: ModelClient,
    system_prompt: Option<String>,
    tool_manager: ToolManager,
    sampling: SamplingConfig,
    max_tool_rounds: usize,
    checkpoint_store: Arc<dyn CheckpointStore>,
    thread_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Agent {
    fn from_parts(
        model_client: ModelClient,
        system_prompt: Option<String>,
        tool_manager: ToolManager,
        sampling: SamplingConfig,
        max_tool_rounds: usize,
        checkpoint_store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            inner: Arc::new(AgentInner {
                model_client,
                system_prompt,
                tool_manager,
                sampling,
                max_tool_rounds,
                checkpoint_store,
                thread_locks: Default::default(),
            }),
        }
    }

    /// Runs one turn on a thread and returns the updated conversation.
    ///
    /// On failure the thread keeps the messages committed so far: the user
    /// input and every completed tool round.
    pub async fn run_turn(
        &self,
        thread_id: &str,
        input: impl Into<String>,
    ) -> Result<Conversation, Error> {
        self.inner.run_turn(thread_id, input.into(), None).await
    }

    /// Starts a turn in the background and returns its events.
    ///
    /// Must be called within a tokio runtime.
    pub fn stream_turn(
        &self,
        thread_id: impl Into<String>,
        input: impl Into<String>,
    ) -> EventStream {
        let (sender, stream) = relay::channel();
        let inner = Arc::clone(&self.inner);
        let thread_id = thread_id.into();
        let input = input.into();
        tokio::spawn(async move {
            let _done = DoneGuard(sender.clone());
            if let Err(err) = inner.run_turn(&thread_id, input, Some(&sender)).await
            {
                error!("turn on thread {thread_id} failed: {err}");
                sender.send(StreamEvent::Error(err.to_string()));
            }
        });
        stream
    }

    /// Returns the committed conversation of a thread.
    pub async fn conversation(
        &self,
        thread_id: &str,
    ) -> Result<Conversation, Error> {
        self.inner
            .checkpoint_store
            .load(thread_id)
            .await
            .map_err(Error::checkpoint)
    }
}

impl AgentInner {
    fn thread_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.thread_locks.lock().unwrap_or_else(|e| e.into_inner());
        // Forget the locks nobody is waiting for.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(thread_id.to_owned()).or_default())
    }
}
