use std::future::ready;
use std::pin::Pin;

use futures_util::future::join_all;
use gym_agent_model::{ModelTool, ToolCallRequest, ToolCallResult};
use tracing::Instrument;

use crate::tool::{Error, ToolObject, ToolResult};

type ToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// A second tool was registered under an existing name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateTool(pub String);

/// An object that manages toolset and handles requests from the model.
///
/// Tools keep their registration order, which is also the order their
/// definitions are presented to the model.
#[derive(Default)]
pub struct Manager {
    tools: Vec<Box<dyn ToolObject>>,
}

impl Manager {
    pub fn with_tools(
        tools: Vec<Box<dyn ToolObject>>,
    ) -> Result<Self, DuplicateTool> {
        let mut manager = Self::default();
        for tool in tools {
            manager.add_tool(tool)?;
        }
        Ok(manager)
    }

    pub fn add_tool(
        &mut self,
        tool: Box<dyn ToolObject>,
    ) -> Result<(), DuplicateTool> {
        if self.find(tool.name()).is_some() {
            return Err(DuplicateTool(tool.name().to_owned()));
        }
        self.tools.push(tool);
        Ok(())
    }

    #[inline]
    fn find(&self, name: &str) -> Option<&dyn ToolObject> {
        self.tools
            .iter()
            .find(|tool| tool.name() == name)
            .map(|tool| tool.as_ref())
    }

    #[inline]
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools
            .iter()
            .map(|tool| ModelTool {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect()
    }

    /// Runs all requests concurrently and returns one result per request,
    /// in the order of `requests`. Failures are rendered into the result
    /// text so the model can react to them.
    ///
    /// `on_started` is called with the tool name right before a tool is
    /// dispatched.
    pub async fn handle_requests(
        &self,
        requests: &[ToolCallRequest],
        on_started: impl Fn(&str),
    ) -> Vec<ToolCallResult> {
        let futures: Vec<_> = requests
            .iter()
            .map(|req| {
                let fut: ToolFuture = match self.find(&req.name) {
                    Some(tool) => {
                        trace!(
                            "spawning a tool ({}) with args: {:?}",
                            req.id, req.arguments
                        );
                        on_started(&req.name);
                        tool.execute(req.arguments.clone())
                    }
                    None => {
                        warn!("tool not found: {}", req.name);
                        Box::pin(ready(Err(Error::not_found().with_reason(
                            format!("no tool named `{}`", req.name),
                        ))))
                    }
                };
                let id = req.id.clone();
                let name = req.name.clone();
                async move {
                    let content = match fut.await {
                        Ok(output) => output,
                        Err(err) => {
                            warn!("tool {name} failed: {err}");
                            format!("Error: {err}")
                        }
                    };
                    ToolCallResult { id, content }
                }
                .instrument(debug_span!("tool execute", tool = %req.name))
            })
            .collect();

        join_all(futures)
            .instrument(debug_span!("tool manager", count = requests.len()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use serde::Deserialize;
    use serde_json::{Value, json};

    use super::*;
    use crate::tool::{AnyTool, Tool};

    static EMPTY_SCHEMA: &Value = &Value::Null;

    #[derive(Deserialize)]
    struct SleepInput {
        millis: u64,
    }

    struct SleepTool(&'static str);

    impl Tool for SleepTool {
        type Input = SleepInput;

        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "Sleeps for a while"
        }

        fn parameter_schema(&self) -> &Value {
            EMPTY_SCHEMA
        }

        fn execute(
            &self,
            input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            let name = self.0;
            async move {
                tokio::time::sleep(Duration::from_millis(input.millis)).await;
                Ok(format!("{name} woke up"))
            }
        }
    }

    struct NoArgsTool;

    impl Tool for NoArgsTool {
        type Input = serde_json::Map<String, Value>;

        fn name(&self) -> &str {
            "no_args"
        }

        fn description(&self) -> &str {
            "Takes nothing"
        }

        fn parameter_schema(&self) -> &Value {
            EMPTY_SCHEMA
        }

        fn execute(
            &self,
            _input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            ready(Err(Error::execution_error().with_reason("nothing to do")))
        }
    }

    fn boxed<T: Tool>(tool: T) -> Box<dyn ToolObject> {
        Box::new(AnyTool(tool))
    }

    fn request(id: &str, name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_owned(),
            name: name.to_owned(),
            arguments,
        }
    }

    #[test]
    fn test_duplicate_and_order() {
        let mut manager = Manager::default();
        manager.add_tool(boxed(SleepTool("slow"))).unwrap();
        manager.add_tool(boxed(NoArgsTool)).unwrap();
        assert_eq!(
            manager.add_tool(boxed(SleepTool("slow"))),
            Err(DuplicateTool("slow".to_owned()))
        );

        let names: Vec<_> =
            manager.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["slow", "no_args"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_keep_request_order() {
        let manager = Manager::with_tools(vec![
            boxed(SleepTool("slow")),
            boxed(SleepTool("fast")),
        ])
        .unwrap();

        let started = Mutex::new(vec![]);
        let results = manager
            .handle_requests(
                &[
                    request("1", "slow", json!({ "millis": 50 })),
                    request("2", "fast", json!({ "millis": 1 })),
                ],
                |name| started.lock().unwrap().push(name.to_owned()),
            )
            .await;

        assert_eq!(*started.lock().unwrap(), vec!["slow", "fast"]);
        assert_eq!(
            results,
            vec![
                ToolCallResult {
                    id: "1".to_owned(),
                    content: "slow woke up".to_owned(),
                },
                ToolCallResult {
                    id: "2".to_owned(),
                    content: "fast woke up".to_owned(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_failures_become_results() {
        let manager =
            Manager::with_tools(vec![boxed(SleepTool("slow")), boxed(NoArgsTool)])
        .unwrap();

        let results = manager
            .handle_requests(
                &[
                    request("1", "slow", json!({ "seconds": 1 })),
                    request("2", "missing", json!({})),
                    request("3", "no_args", Value::Null),
                ],
                |_| {},
            )
            .await;

        assert_eq!(results.len(), 3);
        assert!(
            results[0]
                .content
                .starts_with("Error: Invalid input: missing field `millis`")
        );
        assert_eq!(
            results[1].content,
            "Error: Tool not found: no tool named `missing`"
        );
        // Null arguments reach the tool as an empty object.
        assert_eq!(results[2].content, "Error: Execution error: nothing to do");
    }
}
