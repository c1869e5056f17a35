use std::sync::Arc;

use gym_agent_core::tool::{Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

use crate::catalog::Catalog;

#[derive(Deserialize, JsonSchema)]
pub struct SearchCompanyParameters {}

/// A tool returning the company profile.
pub struct SearchCompanyTool {
    catalog: Arc<Catalog>,
    parameter_schema: Value,
}

impl SearchCompanyTool {
    /// Creates a new company tool over `catalog`.
    #[inline]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        SearchCompanyTool {
            catalog,
            parameter_schema: schema_for!(SearchCompanyParameters).to_value(),
        }
    }
}

impl Tool for SearchCompanyTool {
    type Input = SearchCompanyParameters;

    fn name(&self) -> &str {
        "search_company"
    }

    fn description(&self) -> &str {
        "Company Details when user asks (example: what or who are you, what company are you or where are you located and so on)"
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        _input: SearchCompanyParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        std::future::ready(Ok(self.catalog.company().to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_idempotent() {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let tool = SearchCompanyTool::new(Arc::clone(&catalog));
        let first = tool.execute(SearchCompanyParameters {}).await.unwrap();
        for _ in 0..3 {
            let again = tool.execute(SearchCompanyParameters {}).await.unwrap();
            assert_eq!(again, first);
        }
        assert_eq!(first, catalog.company());
    }

    #[test]
    fn test_accepts_any_object() {
        let parsed: Result<SearchCompanyParameters, _> =
            serde_json::from_value(serde_json::json!({ "topic": "location" }));
        assert!(parsed.is_ok());
        let schema = SearchCompanyTool::new(Arc::new(Catalog::new(vec![], "")))
            .parameter_schema()
            .clone();
        assert_eq!(schema["type"], "object");
    }
}
