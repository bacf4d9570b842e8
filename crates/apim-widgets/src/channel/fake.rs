//! In-memory data provider.
//!
//! Serves canned rows per query name so widgets can run end to end without an
//! analytics backend. Every executed descriptor is recorded for assertions.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use apim_widgets_api::Row;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::provider::{DataProvider, ProviderError, ProviderResult};
use crate::query::QueryDescriptor;

#[derive(Debug, Clone)]
struct CannedResponse {
    query_name: String,
    /// Only answer when `{{token}}` resolved to this value.
    when: Option<(String, String)>,
    rows: Vec<Row>,
}

impl CannedResponse {
    fn matches(&self, query: &QueryDescriptor) -> bool {
        if self.query_name != query.query_name {
            return false;
        }
        match &self.when {
            None => true,
            Some((token, value)) => query.query_values.get(token) == Some(value),
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeDataProvider {
    responses: RwLock<Vec<CannedResponse>>,
    failing: RwLock<HashSet<String>>,
    latency: Option<Duration>,
    executed: RwLock<Vec<QueryDescriptor>>,
    calls: AtomicUsize,
}

impl FakeDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Answer `query_name` with `rows`.
    pub fn with_rows(mut self, query_name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.responses.get_mut().push(CannedResponse {
            query_name: query_name.into(),
            when: None,
            rows,
        });
        self
    }

    /// Answer `query_name` with `rows` only when `token` (given without
    /// braces) was bound to `value`. Takes precedence over [`with_rows`].
    ///
    /// [`with_rows`]: FakeDataProvider::with_rows
    pub fn with_rows_when(
        mut self,
        query_name: impl Into<String>,
        token: &str,
        value: impl Into<String>,
        rows: Vec<Row>,
    ) -> Self {
        self.responses.get_mut().push(CannedResponse {
            query_name: query_name.into(),
            when: Some((format!("{{{{{}}}}}", token), value.into())),
            rows,
        });
        self
    }

    pub async fn set_rows(&self, query_name: impl Into<String>, rows: Vec<Row>) {
        let query_name = query_name.into();
        let mut responses = self.responses.write().await;
        responses.retain(|r| !(r.query_name == query_name && r.when.is_none()));
        responses.push(CannedResponse {
            query_name,
            when: None,
            rows,
        });
    }

    pub async fn fail_query(&self, query_name: impl Into<String>) {
        self.failing.write().await.insert(query_name.into());
    }

    pub async fn executed(&self) -> Vec<QueryDescriptor> {
        self.executed.read().await.clone()
    }

    pub async fn executed_names(&self) -> Vec<String> {
        self.executed
            .read()
            .await
            .iter()
            .map(|q| q.query_name.clone())
            .collect()
    }

    /// Number of `execute` calls, including ones still sleeping.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataProvider for FakeDataProvider {
    async fn execute(&self, query: &QueryDescriptor) -> ProviderResult<Vec<Row>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("[FakeDataProvider] execute '{}'", query.query_name);
        self.executed.write().await.push(query.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.read().await.contains(&query.query_name) {
            return Err(ProviderError::Failed {
                query: query.query_name.clone(),
                message: "injected failure".to_string(),
            });
        }

        let responses = self.responses.read().await;
        let specific = responses
            .iter()
            .rev()
            .find(|r| r.when.is_some() && r.matches(query));
        let generic = || responses.iter().rev().find(|r| r.when.is_none() && r.matches(query));
        specific
            .or_else(generic)
            .map(|r| r.rows.clone())
            .ok_or_else(|| ProviderError::UnknownQuery(query.query_name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::QueryChannel;
    use apim_widgets_api::Value;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn descriptor(name: &str, values: &[(&str, &str)]) -> QueryDescriptor {
        QueryDescriptor {
            query_name: name.to_string(),
            query_values: values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            query_text: String::new(),
            publishing_limit: None,
        }
    }

    #[tokio::test]
    async fn test_serves_canned_rows_and_records_calls() {
        let fake = FakeDataProvider::new().with_rows("query", vec![vec![Value::Integer(7)]]);
        let rows = fake.execute(&descriptor("query", &[])).await.unwrap();
        assert_eq!(rows, vec![vec![Value::Integer(7)]]);
        assert_eq!(fake.executed_names().await, vec!["query"]);
        assert_eq!(fake.call_count(), 1);
    }

    #[tokio::test]
    async fn test_specific_response_wins() {
        let fake = FakeDataProvider::new()
            .with_rows("query", vec![vec![Value::Integer(1)]])
            .with_rows_when("query", "from", "100", vec![vec![Value::Integer(2)]]);
        let hit = fake
            .execute(&descriptor("query", &[("{{from}}", "100")]))
            .await
            .unwrap();
        let miss = fake
            .execute(&descriptor("query", &[("{{from}}", "200")]))
            .await
            .unwrap();
        assert_eq!(hit[0][0], Value::Integer(2));
        assert_eq!(miss[0][0], Value::Integer(1));
    }

    #[tokio::test]
    async fn test_unknown_and_failing_queries() {
        let fake = FakeDataProvider::new().with_rows("query", Vec::new());
        assert_eq!(
            fake.execute(&descriptor("other", &[])).await,
            Err(ProviderError::UnknownQuery("other".into()))
        );
        fake.fail_query("query").await;
        assert!(matches!(
            fake.execute(&descriptor("query", &[])).await,
            Err(ProviderError::Failed { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_timeout_degrades_to_no_rows() {
        let fake = FakeDataProvider::new()
            .with_latency(Duration::from_secs(10))
            .with_rows("query", vec![vec![Value::Integer(1)]]);
        let channel = QueryChannel::new(Arc::new(fake), Duration::from_secs(1));
        let q = descriptor("query", &[]);

        assert!(matches!(
            channel.try_fetch(&q).await,
            Err(ProviderError::Timeout { .. })
        ));
        assert!(channel.fetch(&q).await.is_empty());
    }
}
