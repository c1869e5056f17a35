use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use gym_agent_model::{
    AssistantMessage, ErrorKind as ModelErrorKind, ModelMessage,
    ToolCallRequest,
};
use gym_agent_test_model::{PresetEvent, PresetResponse, TestModelProvider};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::time::sleep;

use crate::checkpoint::{self, CheckpointStore, MemoryCheckpointStore};
use crate::conversation::Conversation;
use crate::relay::StreamEvent;
use crate::tool::ToolResult;
use crate::{AgentBuilder, BuildError, ErrorKind, Route, Tool, route};

static QUERY_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "object",
        "properties": { "query": { "type": "string" } },
        "required": ["query"]
    })
});

static EMPTY_SCHEMA: LazyLock<Value> =
    LazyLock::new(|| json!({ "type": "object", "properties": {} }));

#[derive(Deserialize)]
struct QueryInput {
    query: String,
}

/// Answers slower than [`FakeCompany`], so that results would come back
/// out of order if they were collected by completion.
struct FakeSearch;

impl Tool for FakeSearch {
    type Input = QueryInput;

    fn name(&self) -> &str {
        "search_product"
    }

    fn description(&self) -> &str {
        "Searches the catalog"
    }

    fn parameter_schema(&self) -> &Value {
        &QUERY_SCHEMA
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            sleep(Duration::from_millis(20)).await;
            if input.query.contains("treadmill") {
                Ok("**Cardio Pro T90** (Cardio)\nA folding treadmill.".to_owned())
            } else {
                Ok(format!("No products match \"{}\".", input.query))
            }
        }
    }
}

struct FakeCompany;

impl Tool for FakeCompany {
    type Input = Map<String, Value>;

    fn name(&self) -> &str {
        "search_company"
    }

    fn description(&self) -> &str {
        "Describes the company"
    }

    fn parameter_schema(&self) -> &Value {
        &EMPTY_SCHEMA
    }

    fn execute(
        &self,
        _input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async { Ok("Wellness Fitness Center, Butwal".to_owned()) }
    }
}

/// Crashes instead of answering.
struct BrokenTool;

impl Tool for BrokenTool {
    type Input = Map<String, Value>;

    fn name(&self) -> &str {
        "get_products"
    }

    fn description(&self) -> &str {
        "Lists products"
    }

    fn parameter_schema(&self) -> &Value {
        &EMPTY_SCHEMA
    }

    fn execute(
        &self,
        _input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async {
            let products: Vec<String> = Vec::new();
            Ok(products[3].clone())
        }
    }
}

/// Loads fine but refuses to save anything.
struct ReadOnlyStore;

#[async_trait]
impl CheckpointStore for ReadOnlyStore {
    async fn load(
        &self,
        _thread_id: &str,
    ) -> Result<Conversation, checkpoint::Error> {
        Ok(Conversation::default())
    }

    async fn save(
        &self,
        _thread_id: &str,
        _conversation: &Conversation,
    ) -> Result<(), checkpoint::Error> {
        Err(checkpoint::Error::new("read-only"))
    }
}

fn tool_call(id: &str, name: &str, arguments: Value) -> PresetEvent {
    PresetEvent::ToolCall(ToolCallRequest {
        id: id.to_owned(),
        name: name.to_owned(),
        arguments,
    })
}

fn builder(provider: &TestModelProvider) -> AgentBuilder {
    AgentBuilder::with_model_provider(provider.clone())
        .with_system_prompt("You are a gym equipment consultant.")
        .with_tool(FakeSearch)
        .with_tool(FakeCompany)
}

fn assistant_text(msg: &ModelMessage) -> &str {
    match msg {
        ModelMessage::Assistant(msg) => &msg.content,
        other => panic!("expected an assistant message, got {other:?}"),
    }
}

#[test]
fn test_route() {
    assert_eq!(route(None), Route::Terminate);
    assert_eq!(
        route(Some(&ModelMessage::User("hi".to_owned()))),
        Route::Terminate
    );
    assert_eq!(
        route(Some(&ModelMessage::Assistant(AssistantMessage::text("")))),
        Route::Terminate
    );
    assert_eq!(
        route(Some(&ModelMessage::Assistant(AssistantMessage {
            content: "Checking".to_owned(),
            tool_calls: vec![ToolCallRequest {
                id: "c1".to_owned(),
                name: "search_company".to_owned(),
                arguments: json!({}),
            }],
        }))),
        Route::Act
    );
}

#[test]
fn test_build_errors() {
    let provider = TestModelProvider::default();
    let err = builder(&provider).with_tool(FakeCompany).build().err();
    assert_eq!(
        err,
        Some(BuildError::DuplicateTool("search_company".to_owned()))
    );

    let err = builder(&provider).with_max_tool_rounds(0).build().err();
    assert_eq!(err, Some(BuildError::ZeroToolRounds));
}

#[tokio::test(start_paused = true)]
async fn test_simple_message() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_text([
        "Namaste! ",
        "How can I help?",
    ]));
    let agent = builder(&provider).build().unwrap();

    let conversation = agent.run_turn("t1", "Hello").await.unwrap();
    assert_eq!(
        conversation.messages(),
        &[
            ModelMessage::User("Hello".to_owned()),
            ModelMessage::Assistant(AssistantMessage::text(
                "Namaste! How can I help?"
            )),
        ]
    );
    assert_eq!(agent.conversation("t1").await.unwrap(), conversation);

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].messages[0],
        ModelMessage::System("You are a gym equipment consultant.".to_owned())
    );
    assert_eq!(requests[0].sampling.temperature, Some(0.0));
    let tool_names: Vec<_> =
        requests[0].tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tool_names, vec!["search_product", "search_company"]);
}

#[tokio::test(start_paused = true)]
async fn test_two_tool_calls_in_one_round() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_events([
        tool_call("c1", "search_product", json!({ "query": "treadmill" })),
        tool_call("c2", "search_company", json!({})),
    ]));
    provider.add_response(PresetResponse::with_text([
        "We have the Cardio Pro T90.",
    ]));
    let agent = builder(&provider).with_temperature(0.3).build().unwrap();

    let conversation =
        agent.run_turn("t1", "Any treadmills?").await.unwrap();
    let messages = conversation.messages();
    assert_eq!(messages.len(), 5);
    assert_eq!(messages[1].tool_calls().len(), 2);
    match (&messages[2], &messages[3]) {
        (ModelMessage::Tool(first), ModelMessage::Tool(second)) => {
            assert_eq!(first.id, "c1");
            assert!(first.content.contains("Cardio Pro T90"));
            assert_eq!(second.id, "c2");
            assert_eq!(second.content, "Wellness Fitness Center, Butwal");
        }
        other => panic!("unexpected messages: {other:?}"),
    }
    assert_eq!(assistant_text(&messages[4]), "We have the Cardio Pro T90.");

    // Reasoning is re-entered exactly once.
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 5);
    assert_eq!(requests[1].sampling.temperature, Some(0.3));
}

#[tokio::test(start_paused = true)]
async fn test_tool_failures_do_not_abort() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_events([
        tool_call("c1", "search_product", json!({ "q": "bench" })),
        tool_call("c2", "launch_rocket", json!({})),
    ]));
    provider.add_response(PresetResponse::with_text(["Sorry about that."]));
    let agent = builder(&provider).build().unwrap();

    let conversation = agent.run_turn("t1", "Benches?").await.unwrap();
    let results: Vec<_> = conversation
        .messages()
        .iter()
        .filter_map(|msg| match msg {
            ModelMessage::Tool(result) => Some(result.content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].starts_with("Error: Invalid input: "));
    assert_eq!(
        results[1],
        "Error: Tool not found: no tool named `launch_rocket`"
    );
    assert_eq!(conversation.last_assistant_text(), Some("Sorry about that."));
}

#[tokio::test(start_paused = true)]
async fn test_model_failure_keeps_user_message() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_text(["never"]).with_failures(0));
    let agent = builder(&provider).build().unwrap();

    let err = agent.run_turn("t1", "Hello").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelInvocation);
    assert_eq!(err.model_error_kind(), Some(ModelErrorKind::Transport));

    let conversation = agent.conversation("t1").await.unwrap();
    assert_eq!(
        conversation.messages(),
        &[ModelMessage::User("Hello".to_owned())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failure_after_tool_round() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_events([tool_call(
        "c1",
        "search_company",
        json!({}),
    )]));
    provider.add_response(PresetResponse::with_events([
        PresetEvent::MessageDelta("We are ".to_owned()),
        PresetEvent::Error("connection reset".to_owned()),
    ]));
    let agent = builder(&provider).build().unwrap();

    let err = agent.run_turn("t1", "Who are you?").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelInvocation);

    // The completed tool round is kept, the broken answer is not.
    let conversation = agent.conversation("t1").await.unwrap();
    assert_eq!(conversation.len(), 3);
    assert!(matches!(conversation.latest(), Some(ModelMessage::Tool(_))));
}

#[tokio::test(start_paused = true)]
async fn test_tool_rounds_bound() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_events([tool_call(
        "c1",
        "search_company",
        json!({}),
    )]));
    provider.add_response(PresetResponse::with_events([tool_call(
        "c2",
        "search_company",
        json!({}),
    )]));
    let agent = builder(&provider).with_max_tool_rounds(1).build().unwrap();

    let err = agent.run_turn("t1", "Loop forever").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ToolRoundsExceeded);
    assert_eq!(provider.requests().len(), 2);

    let conversation = agent.conversation("t1").await.unwrap();
    assert_eq!(conversation.len(), 3);
    assert_eq!(conversation.messages()[1].tool_calls()[0].id, "c1");
}

#[tokio::test(start_paused = true)]
async fn test_multi_turn_history() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_text(["Hi there."]));
    provider.add_response(PresetResponse::with_text(["You're welcome."]));
    let agent = builder(&provider).build().unwrap();

    agent.run_turn("t1", "Hello").await.unwrap();
    let conversation = agent.run_turn("t1", "Thanks").await.unwrap();
    assert_eq!(conversation.len(), 4);

    let requests = provider.requests();
    assert_eq!(
        requests[1].messages,
        vec![
            ModelMessage::System(
                "You are a gym equipment consultant.".to_owned()
            ),
            ModelMessage::User("Hello".to_owned()),
            ModelMessage::Assistant(AssistantMessage::text("Hi there.")),
            ModelMessage::User("Thanks".to_owned()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_threads_are_isolated() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_text(["Hello!"]));
    let agent = builder(&provider).build().unwrap();

    agent.run_turn("alice", "Hi").await.unwrap();
    agent.run_turn("bob", "Hi").await.unwrap();
    assert_eq!(agent.conversation("alice").await.unwrap().len(), 2);
    assert_eq!(agent.conversation("bob").await.unwrap().len(), 2);
    assert!(agent.conversation("carol").await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_same_thread_is_serialized() {
    let mut provider = TestModelProvider::default();
    provider.set_delay(Duration::from_millis(5));
    provider.add_response(PresetResponse::with_text(["First."]));
    provider.add_response(PresetResponse::with_text(["Second."]));
    let agent = builder(&provider).build().unwrap();

    let (first, second) = tokio::join!(
        agent.run_turn("t1", "one"),
        agent.run_turn("t1", "two")
    );
    first.unwrap();
    second.unwrap();

    let conversation = agent.conversation("t1").await.unwrap();
    let messages = conversation.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(assistant_text(&messages[1]), "First.");
    assert_eq!(assistant_text(&messages[3]), "Second.");
}

#[tokio::test(start_paused = true)]
async fn test_stream_turn() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_events([
        PresetEvent::MessageDelta("Let me check. ".to_owned()),
        tool_call("c1", "search_product", json!({ "query": "treadmill" })),
    ]));
    provider.add_response(PresetResponse::with_text([
        "We have ",
        "the Cardio Pro T90.",
    ]));
    let agent = builder(&provider).build().unwrap();

    let events: Vec<_> = agent.stream_turn("t1", "Treadmills?").collect().await;
    assert_eq!(
        events,
        vec![
            StreamEvent::Token("Let me check. ".to_owned()),
            StreamEvent::ToolStarted("search_product".to_owned()),
            StreamEvent::Token("We have ".to_owned()),
            StreamEvent::Token("the Cardio Pro T90.".to_owned()),
            StreamEvent::Done,
        ]
    );
    assert_eq!(agent.conversation("t1").await.unwrap().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_stream_turn_error() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_events([
        PresetEvent::MessageDelta("Half".to_owned()),
        PresetEvent::Error("connection reset".to_owned()),
    ]));
    let agent = builder(&provider).build().unwrap();

    let events: Vec<_> = agent.stream_turn("t1", "Hi").collect().await;
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], StreamEvent::Token("Half".to_owned()));
    assert!(matches!(events[1], StreamEvent::Error(_)));
    assert_eq!(events[2], StreamEvent::Done);
}

#[tokio::test(start_paused = true)]
async fn test_stream_turn_panic() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_events([tool_call(
        "c1",
        "get_products",
        json!({}),
    )]));
    let agent = builder(&provider).with_tool(BrokenTool).build().unwrap();

    let events: Vec<_> = agent.stream_turn("t1", "Show me").collect().await;
    assert_eq!(
        events,
        vec![
            StreamEvent::ToolStarted("get_products".to_owned()),
            StreamEvent::Error("turn panicked".to_owned()),
            StreamEvent::Done,
        ]
    );
    // The tool round never completed, only the user message is kept.
    assert_eq!(agent.conversation("t1").await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_stream_still_commits() {
    let mut provider = TestModelProvider::default();
    provider.set_delay(Duration::from_millis(10));
    provider.add_response(PresetResponse::with_text(["Still ", "here."]));
    let agent = builder(&provider).build().unwrap();

    let mut stream = agent.stream_turn("t1", "Hello");
    assert_eq!(
        stream.next().await,
        Some(StreamEvent::Token("Still ".to_owned()))
    );
    drop(stream);

    for _ in 0..100 {
        if agent.conversation("t1").await.unwrap().len() == 2 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    let conversation = agent.conversation("t1").await.unwrap();
    assert_eq!(conversation.last_assistant_text(), Some("Still here."));
}

#[tokio::test(start_paused = true)]
async fn test_checkpoint_failure() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_text(["unused"]));
    let agent = builder(&provider)
        .with_checkpoint_store(Arc::new(ReadOnlyStore))
        .build()
        .unwrap();

    let err = agent.run_turn("t1", "Hello").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Checkpoint);
    assert!(provider.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shared_checkpoint_store() {
    let store = Arc::new(MemoryCheckpointStore::default());
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_text(["Hi."]));
    let agent = builder(&provider)
        .with_checkpoint_store(store.clone())
        .build()
        .unwrap();

    agent.run_turn("t1", "Hello").await.unwrap();
    assert_eq!(store.thread_count().await, 1);
    assert_eq!(store.load("t1").await.unwrap().len(), 2);
}
