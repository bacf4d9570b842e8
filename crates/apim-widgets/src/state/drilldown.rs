//! Links to other dashboard pages that open with preset widget state.

use serde_json::json;
use url::{Position, Url};

use crate::query::filter::ApiSelection;

/// Builds `<context>/dashboards/<dashboard>/<page>?widgetStates=<json>` links.
#[derive(Debug, Clone)]
pub struct DrillDown {
    context_path: String,
    dashboard: String,
}

impl DrillDown {
    pub fn new(context_path: impl Into<String>, dashboard: impl Into<String>) -> Self {
        Self {
            context_path: context_path.into(),
            dashboard: dashboard.into(),
        }
    }

    /// Open `page` with the API selector preset to `apis`.
    pub fn api_url(&self, page: &str, apis: &[ApiSelection]) -> String {
        let op: Vec<_> = apis
            .iter()
            .map(|api| {
                json!({
                    "name": api.name,
                    "version": api.version.clone().unwrap_or_default(),
                    "provider": api.provider.clone().unwrap_or_default(),
                })
            })
            .collect();
        self.url(page, &json!({ "dmSelc": { "dm": "api", "op": op } }))
    }

    /// Open `page` with the date-time range picker preset to `range`
    /// (e.g. `1day`).
    pub fn time_range_url(&self, page: &str, range: &str) -> String {
        self.url(page, &json!({ "dtrp": { "tr": range } }))
    }

    fn url(&self, page: &str, states: &serde_json::Value) -> String {
        // Only the path and query are kept; the origin is a placeholder.
        let mut url = match Url::parse("http://dashboard.invalid/") {
            Ok(url) => url,
            Err(_) => return String::new(),
        };
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.clear();
            segments.extend(self.context_path.split('/').filter(|s| !s.is_empty()));
            segments.extend(["dashboards", self.dashboard.as_str(), page]);
        }
        url.query_pairs_mut()
            .append_pair("widgetStates", &states.to_string());
        url[Position::BeforePath..].to_string()
    }
}

/// API name and version of a composite `"<name> (<provider>)"` table cell.
pub fn api_from_display(apiname: &str, version: &str) -> ApiSelection {
    let (name, provider) = match apiname.rfind(" (") {
        Some(idx) if apiname.ends_with(')') => {
            (&apiname[..idx], Some(&apiname[idx + 2..apiname.len() - 1]))
        }
        _ => (apiname, None),
    };
    let selection = ApiSelection::new(name.trim()).with_version(version);
    match provider {
        Some(p) => selection.with_provider(p),
        None => selection,
    }
}
