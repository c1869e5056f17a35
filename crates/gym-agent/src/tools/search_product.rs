use std::sync::Arc;

use gym_agent_core::tool::{Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

use crate::catalog::{Catalog, Product};

const MAX_RESULTS: usize = 5;

#[derive(Deserialize, JsonSchema)]
pub struct SearchProductParameters {
    #[schemars(description = "ANY keyword: 'cardio', 'treadmill', '100kg'")]
    query: String,
}

/// A tool for searching products by keyword.
///
/// Matches are plain case-insensitive substrings of a product's searchable
/// text, returned in catalog order without ranking.
pub struct SearchProductTool {
    catalog: Arc<Catalog>,
    parameter_schema: Value,
}

impl SearchProductTool {
    /// Creates a new search tool over `catalog`.
    #[inline]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        SearchProductTool {
            catalog,
            parameter_schema: schema_for!(SearchProductParameters).to_value(),
        }
    }
}

impl Tool for SearchProductTool {
    type Input = SearchProductParameters;

    fn name(&self) -> &str {
        "search_product"
    }

    fn description(&self) -> &str {
        "Smart search ALL product fields with ONE query"
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: SearchProductParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let output = search(&self.catalog, &input.query);
        debug!("search_product({:?}) done", input.query);
        std::future::ready(Ok(output))
    }
}

fn search(catalog: &Catalog, query: &str) -> String {
    let needle = query.to_lowercase();
    let blocks = catalog
        .lookup(|product| product.searchable_text().contains(&needle))
        .take(MAX_RESULTS)
        .map(format_product)
        .collect::<Vec<_>>();
    if blocks.is_empty() {
        return format!(
            "No products match \"{query}\". Try: treadmill, Multi-Station, 100kg, Cardio"
        );
    }
    blocks.join("\n\n")
}

fn format_product(product: &Product) -> String {
    format!(
        "**{}** ({})\n{}",
        product.name, product.category, product.description
    )
}
