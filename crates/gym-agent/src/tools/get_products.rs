use std::sync::Arc;

use gym_agent_core::tool::{Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

use crate::catalog::{Catalog, Product};

const DEFAULT_COUNT: usize = 5;
const MAX_COUNT: usize = 20;

#[derive(Deserialize, JsonSchema)]
pub struct GetProductsParameters {
    #[schemars(description = "Number of products to show (5, 10, 20). Default: 5")]
    number: Option<String>,
}

/// A tool for listing the featured products.
pub struct GetProductsTool {
    catalog: Arc<Catalog>,
    parameter_schema: Value,
}

impl GetProductsTool {
    /// Creates a new listing tool over `catalog`.
    #[inline]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        GetProductsTool {
            catalog,
            parameter_schema: schema_for!(GetProductsParameters).to_value(),
        }
    }
}

impl Tool for GetProductsTool {
    type Input = GetProductsParameters;

    fn name(&self) -> &str {
        "get_products"
    }

    fn description(&self) -> &str {
        "Get featured products. Use 'number' for custom count (5, 10, 20)"
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: GetProductsParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let count = parse_count(input.number.as_deref());
        let products = &self.catalog.all()[..count.min(self.catalog.all().len())];
        debug!("get_products listing {} products", products.len());
        let output = if products.is_empty() {
            "No products are available right now.".to_owned()
        } else {
            products
                .iter()
                .map(format_product)
                .collect::<Vec<_>>()
                .join("\n\n")
        };
        std::future::ready(Ok(output))
    }
}

fn format_product(product: &Product) -> String {
    format!(
        "**{}** ({}): {}",
        product.name, product.category, product.description
    )
}

/// Reads the leading integer of `number` the lenient way models expect:
/// `"10 items"` is 10, anything without a positive leading integer falls
/// back to the default.
fn parse_count(number: Option<&str>) -> usize {
    let Some(number) = number else {
        return DEFAULT_COUNT;
    };
    let number = number.trim_start();
    let (negative, rest) = match number.as_bytes().first() {
        Some(b'-') => (true, &number[1..]),
        Some(b'+') => (false, &number[1..]),
        _ => (false, number),
    };
    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return DEFAULT_COUNT;
    }
    let count = match rest[..digits_len].parse::<u64>() {
        Ok(count) => count,
        // Too many digits for any catalog.
        Err(_) if !negative => return MAX_COUNT,
        Err(_) => return DEFAULT_COUNT,
    };
    if negative || count == 0 {
        return DEFAULT_COUNT;
    }
    usize::try_from(count).map_or(MAX_COUNT, |count| count.min(MAX_COUNT))
}
