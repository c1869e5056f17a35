//! A local fake model for testing purpose.

mod preset;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use gym_agent_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: Vec<PresetEvent>,
    event_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if this.event_idx > this.events.len() {
            // In case this method is called after completion.
            return Poll::Ready(Ok(None));
        }

        let delay = this.delay;
        let timer = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(timer.as_mut().poll(cx));
        this.sleep = None;

        let Some(preset_event) = this.events.get(this.event_idx) else {
            this.event_idx += 1;
            let has_tool_call = this
                .events
                .iter()
                .any(|event| matches!(event, PresetEvent::ToolCall(_)));
            return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                if has_tool_call {
                    ModelFinishReason::ToolCalls
                } else {
                    ModelFinishReason::Stop
                },
            ))));
        };

        let event = match preset_event {
            PresetEvent::MessageDelta(msg) => {
                ModelResponseEvent::MessageDelta(msg.clone())
            }
            PresetEvent::ToolCall(req) => ModelResponseEvent::ToolCall(req.clone()),
            PresetEvent::Error(msg) => {
                // Nothing more will be produced after a broken stream.
                this.event_idx = this.events.len() + 1;
                return Poll::Ready(Err(Error::new(
                    msg.clone(),
                    ErrorKind::Transport,
                )));
            }
        };
        this.event_idx += 1;
        Poll::Ready(Ok(Some(event)))
    }
}

#[derive(Default)]
struct Journal {
    attempts: HashMap<usize, u64>,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how the
/// model should respond to a request. A response is selected by counting
/// the assistant messages already present in the request, so the first
/// preset answers the first model call of a conversation, the second one
/// answers the call after that (usually the one following the tool
/// results), and so on across turns. If there are no enough responses in
/// the script, an error will be returned.
///
/// Clones share the same journal, keep one around to inspect the requests
/// after handing the provider over to an agent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Vec<PresetResponse>,
    delay: Option<Duration>,
    journal: Arc<Mutex<Journal>>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.script.push(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns all the requests received so far.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.journal
            .lock()
            .map(|journal| journal.requests.clone())
            .unwrap_or_default()
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let step_idx = req
            .messages
            .iter()
            .filter(|msg| matches!(msg, ModelMessage::Assistant(_)))
            .count();

        let attempt = {
            let mut journal = self.journal.lock().unwrap_or_else(|e| e.into_inner());
            journal.requests.push(req.clone());
            let attempt = journal.attempts.entry(step_idx).or_default();
            *attempt += 1;
            *attempt
        };

        let result = 'blk: {
            let Some(preset) = self.script.get(step_idx) else {
                break 'blk Err(Error::new(
                    "no enough steps",
                    ErrorKind::RateLimitExceeded,
                ));
            };
            if let Some(failures) = preset.failures {
                if failures == 0 || attempt <= failures {
                    break 'blk Err(Error::new(
                        "preset failure",
                        ErrorKind::Transport,
                    ));
                }
            }
            Ok(TestModelResponse {
                events: preset.events.clone(),
                event_idx: 0,
                delay: self.delay.unwrap_or(Duration::from_millis(1)),
                sleep: None,
            })
        };
        ready(result)
    }
}
