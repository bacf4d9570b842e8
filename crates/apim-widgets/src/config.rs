//! Runtime and per-widget configuration.
//!
//! `RuntimeConfig` holds process-wide settings, built in code or read from
//! the environment. `WidgetConfiguration` mirrors the `widgetConf.json`
//! document the hosting dashboard serves for every widget; its provider
//! config carries the widget's named query templates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::query::ResolveMode;

pub const ENV_CONTEXT_PATH: &str = "APIM_CONTEXT_PATH";
pub const ENV_WIDGET_CONFIG_DIR: &str = "APIM_WIDGET_CONFIG_DIR";
pub const ENV_QUERY_TIMEOUT_MS: &str = "APIM_QUERY_TIMEOUT_MS";
pub const ENV_ANALYTICS_URL: &str = "APIM_ANALYTICS_URL";
pub const ENV_DASHBOARD: &str = "APIM_DASHBOARD";

/// Name of the per-widget configuration document.
pub const WIDGET_CONF_FILE: &str = "widgetConf.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No configuration for widget '{0}'")]
    NotFound(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value '{value}' for {name}: {reason}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Process-wide settings.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Path prefix of the dashboard web app, used for drill-down links.
    pub context_path: String,
    /// Dashboard the widgets are placed on; drill-down links stay within it.
    pub dashboard: String,
    /// Directory holding `<widget>/widgetConf.json`.
    pub widget_config_dir: PathBuf,
    /// Base URL of the analytics REST API (None = no API catalog).
    pub analytics_url: Option<Url>,
    /// Queries taking longer than this degrade to "no data".
    pub query_timeout: Duration,
    /// Row limit used when no valid limit is stored.
    pub default_limit: i64,
    pub resolve_mode: ResolveMode,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self {
            context_path: String::new(),
            dashboard: "apimanalytics".to_string(),
            widget_config_dir: PathBuf::from("widgets"),
            analytics_url: None,
            query_timeout: Duration::from_secs(30),
            default_limit: crate::state::DEFAULT_LIMIT,
            resolve_mode: ResolveMode::Strict,
        }
    }

    /// Defaults overridden by `APIM_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Ok(path) = env::var(ENV_CONTEXT_PATH) {
            config.context_path = path;
        }
        if let Ok(dashboard) = env::var(ENV_DASHBOARD) {
            config.dashboard = dashboard;
        }
        if let Ok(dir) = env::var(ENV_WIDGET_CONFIG_DIR) {
            config.widget_config_dir = PathBuf::from(dir);
        }
        if let Ok(raw) = env::var(ENV_QUERY_TIMEOUT_MS) {
            let ms = raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidEnv {
                name: ENV_QUERY_TIMEOUT_MS,
                value: raw.clone(),
                reason: e.to_string(),
            })?;
            config.query_timeout = Duration::from_millis(ms);
        }
        if let Ok(raw) = env::var(ENV_ANALYTICS_URL) {
            let url = Url::parse(&raw).map_err(|e| ConfigError::InvalidEnv {
                name: ENV_ANALYTICS_URL,
                value: raw.clone(),
                reason: e.to_string(),
            })?;
            config.analytics_url = Some(url);
        }

        Ok(config)
    }

    pub fn with_context_path(mut self, path: impl Into<String>) -> Self {
        self.context_path = path.into();
        self
    }

    pub fn with_dashboard(mut self, dashboard: impl Into<String>) -> Self {
        self.dashboard = dashboard.into();
        self
    }

    pub fn with_widget_config_dir(mut self, dir: PathBuf) -> Self {
        self.widget_config_dir = dir;
        self
    }

    pub fn with_analytics_url(mut self, url: Url) -> Self {
        self.analytics_url = Some(url);
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_default_limit(mut self, limit: i64) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn with_resolve_mode(mut self, mode: ResolveMode) -> Self {
        self.resolve_mode = mode;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// `providerConfig` of a widget configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub configs: ProviderConfigs,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderConfigs {
    #[serde(rename = "type", default)]
    pub provider_type: String,
    #[serde(default)]
    pub config: ProviderSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    #[serde(default)]
    pub query_data: QueryData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publishing_limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publishing_interval: Option<u64>,
    /// Provider-specific settings passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `queryData`: the named query templates plus, once a query is issued, the
/// selected template and its placeholder values.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_values: Option<BTreeMap<String, String>>,
    #[serde(flatten)]
    pub templates: BTreeMap<String, String>,
}

impl ProviderConfig {
    pub fn new(provider_type: impl Into<String>) -> Self {
        Self {
            configs: ProviderConfigs {
                provider_type: provider_type.into(),
                config: ProviderSettings::default(),
            },
        }
    }

    pub fn with_template(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.configs
            .config
            .query_data
            .templates
            .insert(name.into(), text.into());
        self
    }

    pub fn templates(&self) -> &BTreeMap<String, String> {
        &self.configs.config.query_data.templates
    }
}

/// Widget `options` from the hosting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetOptions {
    /// Dashboard page opened when a row is clicked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drill_down: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfiguration {
    pub provider_config: ProviderConfig,
    #[serde(default)]
    pub options: WidgetOptions,
}

impl WidgetConfiguration {
    pub fn new(provider_config: ProviderConfig) -> Self {
        Self {
            provider_config,
            options: WidgetOptions::default(),
        }
    }

    pub fn with_drill_down(mut self, page: impl Into<String>) -> Self {
        self.options.drill_down = Some(page.into());
        self
    }

    /// Parse a `widgetConf.json` document. The configuration is read from the
    /// document's `configs` member when present, otherwise from the root.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let doc: serde_json::Value = serde_json::from_str(json)?;
        let nested = doc
            .get("configs")
            .filter(|configs| configs.get("providerConfig").is_some())
            .cloned();
        serde_json::from_value(nested.unwrap_or(doc))
    }
}

/// Where widget configurations come from.
#[async_trait]
pub trait WidgetConfigSource: Send + Sync {
    async fn load(&self, widget: &str) -> Result<WidgetConfiguration, ConfigError>;
}

/// Reads `<root>/<widget>/widgetConf.json`.
#[derive(Debug, Clone)]
pub struct DirectoryConfigSource {
    root: PathBuf,
}

impl DirectoryConfigSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, widget: &str) -> PathBuf {
        self.root.join(widget).join(WIDGET_CONF_FILE)
    }
}

#[async_trait]
impl WidgetConfigSource for DirectoryConfigSource {
    async fn load(&self, widget: &str) -> Result<WidgetConfiguration, ConfigError> {
        let path = self.path_for(widget);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(widget.to_string()))
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        tracing::debug!("[DirectoryConfigSource] Loaded {}", path.display());
        WidgetConfiguration::from_json_str(&raw).map_err(|source| ConfigError::Parse { path, source })
    }
}

/// In-memory configurations keyed by widget name.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    configs: HashMap<String, WidgetConfiguration>,
}

impl StaticConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, widget: impl Into<String>, config: WidgetConfiguration) -> Self {
        self.configs.insert(widget.into(), config);
        self
    }
}

#[async_trait]
impl WidgetConfigSource for StaticConfigSource {
    async fn load(&self, widget: &str) -> Result<WidgetConfiguration, ConfigError> {
        self.configs
            .get(widget)
            .cloned()
            .ok_or_else(|| ConfigError::NotFound(widget.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONF: &str = r#"{
        "name": "APIM Api Backend Usage",
        "id": "APIMApiBackendUsageSummary",
        "configs": {
            "providerConfig": {
                "configs": {
                    "type": "SiddhiStoreDataProvider",
                    "config": {
                        "siddhiApp": "@App:name('APIMBackendUsage') ...",
                        "queryData": {
                            "apiusagequery": "from ApiUsage {{filterCondition}} limit {{limit}}"
                        },
                        "publishingInterval": 360
                    }
                }
            },
            "options": { "drillDown": "api-analytics", "header": true }
        }
    }"#;

    #[test]
    fn test_parse_hosting_document() {
        let conf = WidgetConfiguration::from_json_str(CONF).unwrap();
        let provider = &conf.provider_config;
        assert_eq!(provider.configs.provider_type, "SiddhiStoreDataProvider");
        assert_eq!(provider.configs.config.publishing_interval, Some(360));
        assert!(provider.templates().contains_key("apiusagequery"));
        assert!(provider.configs.config.extra.contains_key("siddhiApp"));
        assert_eq!(conf.options.drill_down.as_deref(), Some("api-analytics"));
    }

    #[test]
    fn test_parse_bare_configuration() {
        let json = r#"{"providerConfig": {"configs": {"config": {"queryData": {"q": "x"}}}}}"#;
        let conf = WidgetConfiguration::from_json_str(json).unwrap();
        assert_eq!(conf.provider_config.templates().get("q").map(String::as_str), Some("x"));
        assert_eq!(conf.options, WidgetOptions::default());
    }

    #[test]
    fn test_query_data_round_trips_selected_query() {
        let mut provider = ProviderConfig::new("RDBMSBatchDataProvider").with_template("query", "select 1");
        provider.configs.config.query_data.query_name = Some("query".into());
        let json = serde_json::to_value(&provider).unwrap();
        assert_eq!(json["configs"]["config"]["queryData"]["queryName"], "query");
        assert_eq!(json["configs"]["config"]["queryData"]["query"], "select 1");
    }

    #[tokio::test]
    async fn test_directory_source_reads_widget_conf() {
        let dir = tempfile::tempdir().unwrap();
        let widget_dir = dir.path().join("APIMApiBackendUsageSummary");
        std::fs::create_dir_all(&widget_dir).unwrap();
        std::fs::write(widget_dir.join(WIDGET_CONF_FILE), CONF).unwrap();

        let source = DirectoryConfigSource::new(dir.path());
        let conf = source.load("APIMApiBackendUsageSummary").await.unwrap();
        assert!(conf.provider_config.templates().contains_key("apiusagequery"));
    }

    #[tokio::test]
    async fn test_directory_source_missing_widget() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryConfigSource::new(dir.path());
        assert!(matches!(
            source.load("Nope").await,
            Err(ConfigError::NotFound(name)) if name == "Nope"
        ));
    }

    #[tokio::test]
    async fn test_directory_source_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let widget_dir = dir.path().join("Broken");
        std::fs::create_dir_all(&widget_dir).unwrap();
        std::fs::write(widget_dir.join(WIDGET_CONF_FILE), "{ not json").unwrap();

        let source = DirectoryConfigSource::new(dir.path());
        assert!(matches!(source.load("Broken").await, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_runtime_config_builder() {
        let config = RuntimeConfig::new()
            .with_context_path("/analytics-dashboard")
            .with_query_timeout(Duration::from_millis(250))
            .with_default_limit(10);
        assert_eq!(config.context_path, "/analytics-dashboard");
        assert_eq!(config.query_timeout, Duration::from_millis(250));
        assert_eq!(config.default_limit, 10);
        assert_eq!(config.resolve_mode, ResolveMode::Strict);
    }
}
