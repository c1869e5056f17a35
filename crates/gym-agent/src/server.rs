//! The HTTP surface of the assistant.
//!
//! `POST /chat` takes `{"message": "...", "threadId": "..."}` and streams the
//! turn back as server-sent events:
//!
//! ```text
//! data: {"type":"token","content":"Hajur, "}
//! data: {"type":"token","content":"namaste!"}
//! data: [DONE]
//! ```
//!
//! A failed turn sends `{"type":"error","content":"Stream interrupted"}`
//! before the terminator. With [`AppState::stream_tool_events`] enabled,
//! `{"type":"tool","name":"..."}` is sent whenever a tool starts.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{Stream, StreamExt};
use gym_agent_core::Agent;
use gym_agent_core::relay::{EventStream, StreamEvent};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::Error;
use crate::assistant;
use crate::config::Config;

/// The thread used by requests that do not name one.
pub const DEFAULT_THREAD_ID: &str = "default";

const STREAM_INTERRUPTED: &str = "Stream interrupted";

/// Shared state of the handlers.
#[derive(Clone)]
pub struct AppState {
    agent: Agent,
    stream_tool_events: bool,
}

impl AppState {
    /// Creates the state serving turns of `agent`.
    #[inline]
    pub fn new(agent: Agent) -> Self {
        Self {
            agent,
            stream_tool_events: false,
        }
    }

    /// Sets whether tool activity is forwarded to clients.
    #[inline]
    pub fn stream_tool_events(mut self, enabled: bool) -> Self {
        self.stream_tool_events = enabled;
        self
    }
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(rename = "threadId", default)]
    thread_id: Option<String>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Record<'a> {
    Token { content: &'a str },
    Tool { name: &'a str },
    Error { content: &'a str },
}

/// Creates the router of the HTTP API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the assistant described by `config` until the process is stopped.
pub async fn serve(config: &Config) -> Result<(), Error> {
    let agent = assistant::build_from_config(config)?;
    let state = AppState::new(agent).stream_tool_events(config.stream_tool_events);

    let listener = TcpListener::bind(config.bind_addr()).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn chat(State(state): State<AppState>, body: Bytes) -> Response {
    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            error!("[chat] malformed request: {err}");
            return internal_error();
        }
    };
    let thread_id = request
        .thread_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| DEFAULT_THREAD_ID.to_owned());
    info!("[chat] new turn on thread {thread_id}");

    let events = state.agent.stream_turn(thread_id, request.message);
    let sse = Sse::new(records(events, state.stream_tool_events));
    (
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        sse,
    )
        .into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal Server Error" })),
    )
        .into_response()
}

/// Maps the events of a turn to SSE records. The stream always ends with
/// `[DONE]`.
fn records(
    mut events: EventStream,
    stream_tool_events: bool,
) -> impl Stream<Item = Result<Event, axum::Error>> + Send + 'static {
    async_stream::stream! {
        while let Some(event) = events.next().await {
            match event {
                StreamEvent::Token(content) if !content.is_empty() => {
                    yield Event::default().json_data(Record::Token { content: &content });
                }
                StreamEvent::Token(_) => {}
                StreamEvent::ToolStarted(name) if stream_tool_events => {
                    yield Event::default().json_data(Record::Tool { name: &name });
                }
                StreamEvent::ToolStarted(_) => {}
                StreamEvent::Error(_) => {
                    yield Event::default().json_data(Record::Error {
                        content: STREAM_INTERRUPTED,
                    });
                }
                StreamEvent::Done => {
                    yield Ok(Event::default().data("[DONE]"));
                }
            }
        }
    }
}
