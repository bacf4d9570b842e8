//! The API catalog: which APIs exist, as reported by the analytics REST
//! endpoint. The error analysis widget uses it to populate its selectors.

pub mod fake;
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use fake::FakeApiCatalogClient;
pub use http::{HttpApiCatalogClient, APIS_PATH};

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The backend answered with an error body; the message is shown as is.
    #[error("{0}")]
    ProxyError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid catalog URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl CatalogError {
    /// Text for the widget's error view.
    pub fn display_message(&self) -> String {
        match self {
            CatalogError::ProxyError(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDescriptor {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ApiDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            provider: None,
            context: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

/// `{ "list": [...] }` as returned by the APIs endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ApiListResponse {
    #[serde(default)]
    pub list: Vec<ApiDescriptor>,
}

/// Source of the API list.
///
/// Implemented by [`HttpApiCatalogClient`] against the analytics REST API and
/// by [`FakeApiCatalogClient`] for tests and offline runs.
#[async_trait]
pub trait ApiCatalogClient: Send + Sync {
    async fn list_apis(&self) -> CatalogResult<Vec<ApiDescriptor>>;
}

/// Message of a `"<code>: <message>"` error body. Colons after the first one
/// are dropped along with the code.
pub fn extract_proxy_error(body: &str) -> String {
    body.split(':').skip(1).collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_proxy_error() {
        assert_eq!(extract_proxy_error("500: Backend unavailable"), "Backend unavailable");
        assert_eq!(extract_proxy_error("401: Unauthorized: token expired"), "Unauthorized token expired");
        assert_eq!(extract_proxy_error("no code here"), "");
    }

    #[test]
    fn test_list_response_shape() {
        let json = r#"{"count":1,"list":[{"name":"PizzaShack","version":"1.0.0","provider":"admin","id":"x"}]}"#;
        let parsed: ApiListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.list,
            vec![ApiDescriptor::new("PizzaShack", "1.0.0").with_provider("admin")]
        );
    }

    #[test]
    fn test_display_message_is_verbatim_for_proxy_errors() {
        let err = CatalogError::ProxyError("Backend unavailable".into());
        assert_eq!(err.display_message(), "Backend unavailable");
    }
}
