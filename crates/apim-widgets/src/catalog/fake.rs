//! In-memory API catalog.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{extract_proxy_error, ApiCatalogClient, ApiDescriptor, CatalogError, CatalogResult};

#[derive(Debug, Default)]
pub struct FakeApiCatalogClient {
    apis: RwLock<Vec<ApiDescriptor>>,
    /// Raw error body to answer with instead of the list.
    error_body: RwLock<Option<String>>,
}

impl FakeApiCatalogClient {
    pub fn new(apis: Vec<ApiDescriptor>) -> Self {
        Self {
            apis: RwLock::new(apis),
            error_body: RwLock::new(None),
        }
    }

    pub async fn add_api(&self, api: ApiDescriptor) {
        self.apis.write().await.push(api);
    }

    /// Fail every following call as if the backend returned `body`.
    pub async fn fail_with(&self, body: impl Into<String>) {
        *self.error_body.write().await = Some(body.into());
    }

    pub async fn recover(&self) {
        *self.error_body.write().await = None;
    }
}

#[async_trait]
impl ApiCatalogClient for FakeApiCatalogClient {
    async fn list_apis(&self) -> CatalogResult<Vec<ApiDescriptor>> {
        if let Some(body) = self.error_body.read().await.as_deref() {
            tracing::debug!("[FakeApiCatalogClient] failing with '{}'", body);
            return Err(CatalogError::ProxyError(extract_proxy_error(body)));
        }
        Ok(self.apis.read().await.clone())
    }
}
