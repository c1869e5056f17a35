use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ToolCallRequest;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelRequest {
    /// The input messages, system instructions first.
    pub messages: Vec<ModelMessage>,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
    /// How the model should sample its output.
    pub sampling: SamplingConfig,
}

/// Sampling parameters forwarded to the model.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SamplingConfig {
    /// The sampling temperature. `None` leaves it to the provider default.
    pub temperature: Option<f32>,
}

impl SamplingConfig {
    /// A configuration that asks for the most deterministic output.
    #[inline]
    pub fn deterministic() -> Self {
        Self {
            temperature: Some(0.0),
        }
    }
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "content", rename_all = "snake_case")]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// An assistant reply, which may carry tool call requests.
    Assistant(AssistantMessage),
    /// A tool call result.
    Tool(ToolCallResult),
}

impl ModelMessage {
    /// Returns the tool call requests carried by this message.
    ///
    /// Only assistant messages can carry tool calls, the slice is empty for
    /// the other roles.
    #[inline]
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            ModelMessage::Assistant(msg) => &msg.tool_calls,
            _ => &[],
        }
    }
}

/// A message generated by the model.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// The generated text, may be empty when the model only calls tools.
    pub content: String,
    /// Tool calls requested by the model, in the order they were generated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AssistantMessage {
    /// Creates a text-only assistant message.
    #[inline]
    pub fn text<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
            tool_calls: vec![],
        }
    }
}

/// The result of calling a tool.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The unique identifier of the tool call request this answers.
    pub id: String,
    /// The result of the tool call.
    pub content: String,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_tool_calls_accessor() {
        let msg = ModelMessage::Assistant(AssistantMessage {
            content: String::new(),
            tool_calls: vec![ToolCallRequest {
                id: "call_1".to_owned(),
                name: "search_company".to_owned(),
                arguments: json!({}),
            }],
        });
        assert_eq!(msg.tool_calls().len(), 1);
        assert!(ModelMessage::User("hi".to_owned()).tool_calls().is_empty());
    }

    #[test]
    fn test_message_serde_shape() {
        let msg = ModelMessage::Assistant(AssistantMessage::text("Namaste!"));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({ "role": "assistant", "content": { "content": "Namaste!" } })
        );
        let back: ModelMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }
}
