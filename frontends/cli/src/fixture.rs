//! Canned analytics data for offline runs.
//!
//! ```json
//! {
//!   "apis": [{ "name": "PizzaShack", "version": "1.0.0" }],
//!   "queries": { "query": [["PizzaShack", "1.0.0", 12]] }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use apim_widgets::catalog::{ApiDescriptor, FakeApiCatalogClient};
use apim_widgets::channel::FakeDataProvider;
use apim_widgets_api::Row;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub apis: Vec<ApiDescriptor>,
    /// Rows answered for each query name.
    #[serde(default)]
    pub queries: BTreeMap<String, Vec<Row>>,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse fixture {}", path.display()))
    }

    pub fn provider(&self) -> FakeDataProvider {
        self.queries
            .iter()
            .fold(FakeDataProvider::new(), |provider, (name, rows)| {
                provider.with_rows(name.as_str(), rows.clone())
            })
    }

    pub fn catalog(&self) -> FakeApiCatalogClient {
        FakeApiCatalogClient::new(self.apis.clone())
    }
}
