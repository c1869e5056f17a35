//! The tools the assistant uses to answer from the catalog.

mod get_products;
mod search_company;
mod search_product;

pub use get_products::GetProductsTool;
pub use search_company::SearchCompanyTool;
pub use search_product::SearchProductTool;
