//! The read-only product and company catalog.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const BUILTIN_CATALOG: &str = include_str!("data/catalog.json");

/// Error type for loading a [`Catalog`].
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        /// Path of the catalog file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// The catalog is not valid JSON of the expected shape.
    #[error("Invalid catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A piece of equipment on sale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Display name, e.g. `Cardio Pro T90`.
    pub name: String,
    /// Category, e.g. `Cardio`.
    pub category: String,
    /// Free-text description.
    pub description: String,
    /// Technical specifications.
    #[serde(default)]
    pub specs: BTreeMap<String, String>,
    /// Warranty clauses.
    #[serde(default)]
    pub warranty: Vec<String>,
    /// Shipping clauses.
    #[serde(default)]
    pub shipping: Vec<String>,
    /// Price as displayed to customers, if published.
    #[serde(default)]
    pub price: Option<String>,
}

impl Product {
    /// Returns the lowercased text a product search matches against.
    pub fn searchable_text(&self) -> String {
        let specs = self
            .specs
            .values()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        [
            self.name.as_str(),
            &self.description,
            &self.category,
            &specs,
            &self.warranty.join(" "),
            &self.shipping.join(" "),
        ]
        .join(" ")
        .to_lowercase()
    }
}

/// The products and the company profile, fixed for the lifetime of the
/// process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    products: Vec<Product>,
    company: String,
}

impl Catalog {
    /// Creates a catalog from its records.
    #[inline]
    pub fn new(products: Vec<Product>, company: impl Into<String>) -> Self {
        Self {
            products,
            company: company.into(),
        }
    }

    /// Loads the catalog compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Parses a catalog from JSON text.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a catalog from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_owned(),
            source,
        })?;
        let catalog = Self::from_json(&json)?;
        info!(
            "loaded {} products from {}",
            catalog.products.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Returns every product in insertion order.
    #[inline]
    pub fn all(&self) -> &[Product] {
        &self.products
    }

    /// Returns the products matching `predicate`, in insertion order.
    pub fn lookup<'a, P>(
        &'a self,
        mut predicate: P,
    ) -> impl Iterator<Item = &'a Product> + 'a
    where
        P: FnMut(&Product) -> bool + 'a,
    {
        self.products.iter().filter(move |product| predicate(product))
    }

    /// Returns the company profile.
    #[inline]
    pub fn company(&self) -> &str {
        &self.company
    }
}
