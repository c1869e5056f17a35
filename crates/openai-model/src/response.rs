use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use gym_agent_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    ToolCallRequest,
};
use pin_project_lite::pin_project;
use serde_json::Value;

use crate::Error;
use crate::io::{Sse, SseError};
use crate::proto::{ChatCompletionChunk, ToolCall};

struct PartialState {
    sse: Sse,
    id: Option<String>,
    tool_calls: Vec<ToolCall>,
    // This field records the index of the tool calls that are generated but not
    // yet sent to the model user. They are only handed out after the model has
    // finished, when their arguments are complete.
    pending_tool_call_idx: VecDeque<usize>,
    // This field will be cleared after the response returns the complete event.
    pending_finish_reason: Option<ModelFinishReason>,
    // Set once the server reported a finish reason, nothing is read after that.
    finished: bool,
}

impl PartialState {
    fn finish(&mut self, reason: Option<&str>) {
        let reason = if reason == Some("tool_calls") || !self.tool_calls.is_empty()
        {
            ModelFinishReason::ToolCalls
        } else {
            ModelFinishReason::Stop
        };
        self.pending_finish_reason = Some(reason);
        self.finished = true;
    }

    fn merge_tool_call(&mut self, tool_call: ToolCall) {
        let Some(partial_tool_call) = self
            .tool_calls
            .iter_mut()
            .find(|t| t.index == tool_call.index)
        else {
            self.pending_tool_call_idx.push_back(self.tool_calls.len());
            self.tool_calls.push(tool_call);
            return;
        };
        // Patch the partial tool call.
        if let Some(id) = tool_call.id {
            partial_tool_call.id.get_or_insert_default().push_str(&id);
        }
        if let Some(ty) = tool_call.r#type {
            partial_tool_call.r#type.get_or_insert_default().push_str(&ty);
        }
        if let Some(function) = tool_call.function {
            match partial_tool_call.function {
                Some(ref mut partial_func) => {
                    if let Some(name) = function.name {
                        partial_func.name.get_or_insert_default().push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        partial_func
                            .arguments
                            .get_or_insert_default()
                            .push_str(&arguments);
                    }
                }
                None => partial_tool_call.function = Some(function),
            }
        }
    }

    fn tool_call_request(&self, idx: usize) -> ToolCallRequest {
        let tool_call = &self.tool_calls[idx];
        let id = tool_call.id.clone().unwrap_or_default();
        let function = tool_call.function.as_ref();
        let name = function.and_then(|f| f.name.clone()).unwrap_or_default();
        // Malformed arguments are passed through as a string, so that the
        // tool reports them instead of silently seeing no arguments.
        let arguments = match function.and_then(|f| f.arguments.as_deref()) {
            None => Value::Null,
            Some(args) if args.trim().is_empty() => Value::Null,
            Some(args) => serde_json::from_str::<Value>(args)
                .unwrap_or_else(|_| Value::String(args.to_owned())),
        };
        ToolCallRequest {
            id,
            name,
            arguments,
        }
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    /// A streaming chat completion.
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub(crate) fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            id: None,
            tool_calls: Default::default(),
            pending_tool_call_idx: Default::default(),
            pending_finish_reason: Default::default(),
            finished: false,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<ModelResponseEvent>, PartialState), Error> {
    let mut message_delta = None;

    while !partial_state.finished {
        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => {
                return Err(Error::new(
                    "stream ended before the response finished",
                    ErrorKind::Transport,
                ));
            }
            Err(SseError::ChunksError(err)) => {
                return Err(Error::new(err.0, ErrorKind::Transport));
            }
            Err(SseError::InvalidPayload) => {
                return Err(Error::new(
                    "malformed event stream",
                    ErrorKind::InvalidResponse,
                ));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            partial_state.finish(None);
            break;
        }

        let mut chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::InvalidResponse)
            })?;
        if partial_state.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id
        {
            return Err(Error::new(
                "chunk id mismatch",
                ErrorKind::InvalidResponse,
            ));
        };

        // Usage reports come without choices.
        let Some(choice) = chunk.choices.pop() else {
            continue;
        };

        // Deltas are applied before the finish reason, some servers send
        // both in the same chunk.
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                message_delta = Some(content);
            }
        }
        for tool_call in choice.delta.tool_calls.into_iter().flatten() {
            partial_state.merge_tool_call(tool_call);
        }

        if let Some(finish_reason) = choice.finish_reason.as_deref() {
            if finish_reason == "content_filter" {
                return Err(Error::new(
                    "the response was filtered",
                    ErrorKind::Moderated,
                ));
            }
            partial_state.finish(Some(finish_reason));
        }

        if message_delta.is_some() {
            break;
        }
    }

    // The order of events are important. Always emit message delta first, then
    // emit pending tool calls, and finally emit pending finish reason if any.

    if let Some(message_delta) = message_delta {
        return Ok((
            Some(ModelResponseEvent::MessageDelta(message_delta)),
            partial_state,
        ));
    }

    if let Some(idx) = partial_state.pending_tool_call_idx.pop_front() {
        let request = partial_state.tool_call_request(idx);
        return Ok((Some(ModelResponseEvent::ToolCall(request)), partial_state));
    }

    if let Some(finish_reason) = partial_state.pending_finish_reason.take() {
        return Ok((
            Some(ModelResponseEvent::Completed(finish_reason)),
            partial_state,
        ));
    }

    Ok((None, partial_state))
}
