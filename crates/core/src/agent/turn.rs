use gym_agent_model::{ModelMessage, ModelRequest};
use tracing::Instrument;

use super::{AgentInner, Error, Route, route};
use crate::conversation::Conversation;
use crate::relay::{EventSender, StreamEvent};

impl AgentInner {
    pub(super) async fn run_turn(
        &self,
        thread_id: &str,
        input: String,
        events: Option<&EventSender>,
    ) -> Result<Conversation, Error> {
        let lock = self.thread_lock(thread_id);
        let _guard = lock.lock().await;

        self.run_turn_locked(thread_id, input, events)
            .instrument(info_span!("turn", thread_id))
            .await
    }

    async fn run_turn_locked(
        &self,
        thread_id: &str,
        input: String,
        events: Option<&EventSender>,
    ) -> Result<Conversation, Error> {
        let mut conversation = self.load(thread_id).await?;
        conversation
            .push(ModelMessage::User(input))
            .map_err(Error::invalid_conversation)?;
        self.save(thread_id, &conversation).await?;

        let mut tool_rounds = 0;
        loop {
            // Reasoning.
            let request = self.build_model_request(&conversation);
            let on_delta = {
                let events = events.cloned();
                move |delta: String| {
                    if let Some(events) = &events {
                        events.send(StreamEvent::Token(delta));
                    }
                }
            };
            let response = self
                .model_client
                .send_request(request, on_delta)
                .await
                .map_err(Error::model_invocation)?;
            let message = ModelMessage::Assistant(response.into_message());

            match route(Some(&message)) {
                Route::Terminate => {
                    conversation
                        .push(message)
                        .map_err(Error::invalid_conversation)?;
                    self.save(thread_id, &conversation).await?;
                    info!("turn finished after {tool_rounds} tool rounds");
                    return Ok(conversation);
                }
                Route::Act => {
                    if tool_rounds >= self.max_tool_rounds {
                        warn!(
                            "model asked for tools again after {tool_rounds} rounds"
                        );
                        return Err(Error::tool_rounds_exceeded());
                    }
                    tool_rounds += 1;
                }
            }

            // Acting.
            let results = self
                .tool_manager
                .handle_requests(message.tool_calls(), |name| {
                    if let Some(events) = events {
                        events.send(StreamEvent::ToolStarted(name.to_owned()));
                    }
                })
                .await;

            // The tool calls and their results are committed together.
            conversation
                .push(message)
                .map_err(Error::invalid_conversation)?;
            for result in results {
                conversation
                    .push(ModelMessage::Tool(result))
                    .map_err(Error::invalid_conversation)?;
            }
            self.save(thread_id, &conversation).await?;
        }
    }

    fn build_model_request(&self, conversation: &Conversation) -> ModelRequest {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        if let Some(system_prompt) = &self.system_prompt {
            messages.push(ModelMessage::System(system_prompt.clone()));
        }
        messages.extend_from_slice(conversation.messages());
        ModelRequest {
            messages,
            tools: self.tool_manager.definitions(),
            sampling: self.sampling,
        }
    }

    #[inline]
    async fn load(&self, thread_id: &str) -> Result<Conversation, Error> {
        self.checkpoint_store
            .load(thread_id)
            .await
            .map_err(Error::checkpoint)
    }

    #[inline]
    async fn save(
        &self,
        thread_id: &str,
        conversation: &Conversation,
    ) -> Result<(), Error> {
        self.checkpoint_store
            .save(thread_id, conversation)
            .await
            .map_err(Error::checkpoint)
    }
}
