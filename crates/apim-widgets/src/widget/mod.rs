//! Widgets and the shell that runs them.
//!
//! A widget turns published parameters into a [`WidgetView`]: it builds its
//! filter conditions, resolves its query templates, runs them over the data
//! channel and projects the rows. The [`WidgetShell`] owns the lifecycle:
//! configuration on mount, one cancellable query task per parameter change,
//! and teardown on unmount.

pub mod api_created;
pub mod api_created_summary;
pub mod backend_usage;
pub mod error_analysis;
pub mod registry;
pub mod shell;
pub mod throttled_summary;
pub mod top_faulty;
pub mod top_throttled;

use std::sync::Arc;
use std::time::Duration;

use apim_widgets_api::{Row, WidgetView};
use async_trait::async_trait;

use crate::catalog::ApiCatalogClient;
use crate::channel::{DataProvider, PublishedParameters, QueryChannel};
use crate::config::{RuntimeConfig, WidgetConfigSource, WidgetConfiguration};
use crate::error::Result;
use crate::query::{QueryDescriptor, TemplateBindings, TemplateCatalog, TemplateResolver};
use crate::state::{DrillDown, GlobalStateStore};

pub use api_created::ApiCreatedAnalytics;
pub use api_created_summary::ApiCreatedSummary;
pub use backend_usage::ApiBackendUsage;
pub use error_analysis::ApiErrorAnalysis;
pub use registry::WidgetRegistry;
pub use shell::{AttachedWidget, WidgetShell};
pub use throttled_summary::ApiThrottledSummary;
pub use top_faulty::TopFaultyApis;
pub use top_throttled::TopThrottledOverTime;

/// One dashboard widget.
#[async_trait]
pub trait AnalyticsWidget: Send + Sync {
    /// Widget id; also the directory holding its `widgetConf.json`.
    fn name(&self) -> &'static str;

    /// Global state key of the widget's persisted choices, if any.
    fn state_key(&self) -> Option<&'static str> {
        None
    }

    /// Re-run the queries periodically while parameters stay unchanged.
    fn refresh_interval(&self) -> Option<Duration> {
        None
    }

    /// Whether `params` carry enough to query. A widget that is not ready
    /// shows no data.
    fn is_ready(&self, params: &PublishedParameters) -> bool {
        params.has_dimension() && params.has_time_range()
    }

    async fn refresh(&self, ctx: &WidgetContext, params: &PublishedParameters) -> Result<WidgetView>;
}

/// Process-wide collaborators shared by every mounted widget.
#[derive(Clone)]
pub struct WidgetServices {
    pub store: GlobalStateStore,
    pub channel: QueryChannel,
    pub catalog: Arc<dyn ApiCatalogClient>,
    pub configs: Arc<dyn WidgetConfigSource>,
    pub runtime: RuntimeConfig,
}

impl WidgetServices {
    pub fn new(
        runtime: RuntimeConfig,
        provider: Arc<dyn DataProvider>,
        catalog: Arc<dyn ApiCatalogClient>,
        configs: Arc<dyn WidgetConfigSource>,
    ) -> Self {
        Self {
            store: GlobalStateStore::new(),
            channel: QueryChannel::new(provider, runtime.query_timeout),
            catalog,
            configs,
            runtime,
        }
    }

    pub fn with_store(mut self, store: GlobalStateStore) -> Self {
        self.store = store;
        self
    }
}

/// Everything one mounted widget needs to refresh.
pub struct WidgetContext {
    services: WidgetServices,
    configuration: WidgetConfiguration,
    resolver: TemplateResolver,
}

impl WidgetContext {
    pub fn new(services: WidgetServices, configuration: WidgetConfiguration) -> Self {
        let catalog = TemplateCatalog::from_provider_config(&configuration.provider_config);
        let resolver = TemplateResolver::new(catalog).with_mode(services.runtime.resolve_mode);
        Self {
            services,
            configuration,
            resolver,
        }
    }

    pub fn store(&self) -> &GlobalStateStore {
        &self.services.store
    }

    pub fn catalog(&self) -> &dyn ApiCatalogClient {
        self.services.catalog.as_ref()
    }

    pub fn runtime(&self) -> &RuntimeConfig {
        &self.services.runtime
    }

    pub fn configuration(&self) -> &WidgetConfiguration {
        &self.configuration
    }

    pub fn resolver(&self) -> &TemplateResolver {
        &self.resolver
    }

    pub fn resolve(&self, query_name: &str, bindings: &TemplateBindings) -> Result<QueryDescriptor> {
        Ok(self.resolver.resolve(query_name, bindings)?)
    }

    /// Resolve and run `query_name`. Provider failures come back as no rows.
    pub async fn run_query(
        &self,
        query_name: &str,
        bindings: &TemplateBindings,
        publishing_limit: Option<i64>,
    ) -> Result<Vec<Row>> {
        let mut descriptor = self.resolve(query_name, bindings)?;
        if let Some(limit) = publishing_limit {
            descriptor = descriptor.with_publishing_limit(limit);
        }
        tracing::debug!(
            "[WidgetContext] Running '{}' with {} bindings",
            descriptor.query_name,
            descriptor.query_values.len()
        );
        Ok(self.services.channel.fetch(&descriptor).await)
    }

    /// Link builder and target page when the widget is configured to drill
    /// down.
    pub fn drill_down(&self) -> Option<(DrillDown, &str)> {
        let page = self.configuration.options.drill_down.as_deref()?;
        let runtime = &self.services.runtime;
        Some((
            DrillDown::new(runtime.context_path.clone(), runtime.dashboard.clone()),
            page,
        ))
    }
}

impl std::fmt::Debug for WidgetContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetContext")
            .field("configuration", &self.configuration)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}
