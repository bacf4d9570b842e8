use std::sync::Arc;
use std::time::Duration;

use apim_widgets_api::Row;
use async_trait::async_trait;
use thiserror::Error;

use crate::query::QueryDescriptor;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Query '{0}' is not served by this provider")]
    UnknownQuery(String),

    #[error("Query '{query}' failed: {message}")]
    Failed { query: String, message: String },

    #[error("Query '{query}' timed out after {timeout:?}")]
    Timeout { query: String, timeout: Duration },
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Executes resolved queries against the analytics backend.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn execute(&self, query: &QueryDescriptor) -> ProviderResult<Vec<Row>>;
}

/// A provider with a deadline. Widgets use [`QueryChannel::fetch`], which
/// turns every failure into an empty result.
#[derive(Clone)]
pub struct QueryChannel {
    provider: Arc<dyn DataProvider>,
    timeout: Duration,
}

impl QueryChannel {
    pub fn new(provider: Arc<dyn DataProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn try_fetch(&self, query: &QueryDescriptor) -> ProviderResult<Vec<Row>> {
        match tokio::time::timeout(self.timeout, self.provider.execute(query)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                query: query.query_name.clone(),
                timeout: self.timeout,
            }),
        }
    }

    /// Rows of `query`, or none when the query fails or times out.
    pub async fn fetch(&self, query: &QueryDescriptor) -> Vec<Row> {
        match self.try_fetch(query).await {
            Ok(rows) => {
                tracing::debug!(
                    "[QueryChannel] '{}' returned {} rows",
                    query.query_name,
                    rows.len()
                );
                rows
            }
            Err(e) => {
                tracing::warn!("[QueryChannel] {}; showing no data", e);
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for QueryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryChannel")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
