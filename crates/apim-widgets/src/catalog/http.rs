use async_trait::async_trait;
use url::Url;

use super::{extract_proxy_error, ApiCatalogClient, ApiDescriptor, ApiListResponse, CatalogError, CatalogResult};

/// Path of the API list below the portal context.
pub const APIS_PATH: &str = "apis/analytics/v1.0/apim/apis";

/// Reads the API list from `<base>/apis/analytics/v1.0/apim/apis`.
#[derive(Debug, Clone)]
pub struct HttpApiCatalogClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpApiCatalogClient {
    /// `base` is the portal origin plus context path, e.g.
    /// `https://host:9643/analytics-dashboard`.
    pub fn new(base: &Url) -> CatalogResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("apim-widgets/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_client(client, base)
    }

    pub fn with_client(client: reqwest::Client, base: &Url) -> CatalogResult<Self> {
        Ok(Self {
            client,
            endpoint: endpoint_for(base)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn endpoint_for(base: &Url) -> CatalogResult<Url> {
    let mut root = base.clone();
    if !root.path().ends_with('/') {
        let path = format!("{}/", root.path());
        root.set_path(&path);
    }
    root.join(APIS_PATH).map_err(|e| CatalogError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl ApiCatalogClient for HttpApiCatalogClient {
    async fn list_apis(&self) -> CatalogResult<Vec<ApiDescriptor>> {
        tracing::debug!("[HttpApiCatalogClient] GET {}", self.endpoint);
        let response = self.client.get(self.endpoint.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_proxy_error(&body);
            tracing::warn!("[HttpApiCatalogClient] {} from {}: {}", status, self.endpoint, message);
            return Err(CatalogError::ProxyError(message));
        }

        let body: ApiListResponse = response.json().await?;
        tracing::debug!("[HttpApiCatalogClient] {} APIs", body.list.len());
        Ok(body.list)
    }
}
