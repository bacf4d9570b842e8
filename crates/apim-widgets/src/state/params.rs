//! Typed entries of the global state store.

use serde::{Deserialize, Serialize};

use super::{GlobalStateStore, StateError, DEFAULT_LIMIT};

/// Key of the date-time range picker state.
pub const DTRP_KEY: &str = "dtrp";
pub const ERROR_ANALYSIS_KEY: &str = "erroranalysis";
pub const API_CREATED_KEY: &str = "apiCreatedStats";
pub const BACKEND_USAGE_KEY: &str = "apibackendusage";
pub const TOP_FAULTY_KEY: &str = "topfaultyapis";

/// State of the date-time range picker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateTimeRangeParams {
    /// Auto-sync mode: refreshes triggered by the picker do not show a
    /// loading state.
    #[serde(default)]
    pub sync: bool,
    /// Selected range shortcut, e.g. `1day`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tr: Option<String>,
}

impl DateTimeRangeParams {
    pub fn load(store: &GlobalStateStore) -> Self {
        store.get_or_default(DTRP_KEY)
    }
}

/// Persisted row limit of a top-N widget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitParams {
    #[serde(default)]
    pub limit: Option<i64>,
}

impl LimitParams {
    /// The stored limit under `key`, replaced by (and persisted as) `default`
    /// when unset or not positive.
    pub fn load(store: &GlobalStateStore, key: &str, default: i64) -> Result<i64, StateError> {
        let params: LimitParams = store.get_or_default(key);
        match params.limit {
            Some(limit) if limit > 0 => Ok(limit),
            _ => {
                Self::store(store, key, Some(default))?;
                Ok(default)
            }
        }
    }

    pub fn load_default(store: &GlobalStateStore, key: &str) -> Result<i64, StateError> {
        Self::load(store, key, DEFAULT_LIMIT)
    }

    pub fn store(store: &GlobalStateStore, key: &str, limit: Option<i64>) -> Result<(), StateError> {
        store.set(key, &LimitParams { limit })
    }

    /// Read the limit text box: minus signs are dropped and anything from the
    /// first `.` on is ignored. `None` when no digits remain.
    pub fn parse_input(text: &str) -> Option<i64> {
        let cleaned: String = text.chars().filter(|c| *c != '-').collect();
        let integral = cleaned.split('.').next().unwrap_or_default().trim();
        let digits: String = integral.chars().take_while(char::is_ascii_digit).collect();
        digits.parse().ok()
    }
}

/// Selections of the API error analysis widget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorAnalysisParams {
    #[serde(default)]
    pub api_selected: String,
    #[serde(default)]
    pub api_version: String,
    /// GraphQL operations, each `"<operation> (<method>)"`.
    #[serde(default)]
    pub operation_selected: Vec<String>,
    /// REST resource, `"<template> (<method>)"`.
    #[serde(default)]
    pub resource_selected: String,
}

impl ErrorAnalysisParams {
    pub fn load(store: &GlobalStateStore) -> Self {
        store.get_or_default(ERROR_ANALYSIS_KEY)
    }

    pub fn save(&self, store: &GlobalStateStore) -> Result<(), StateError> {
        store.set(ERROR_ANALYSIS_KEY, self)
    }

    /// Whether enough is selected to run the main query.
    pub fn is_complete(&self) -> bool {
        !self.api_selected.is_empty()
            && !self.api_version.is_empty()
            && (!self.operation_selected.is_empty() || !self.resource_selected.is_empty())
    }

    /// Select an API; version and resource choices are cleared.
    pub fn select_api(&mut self, api: impl Into<String>) {
        self.api_selected = api.into();
        self.api_version.clear();
        self.operation_selected.clear();
        self.resource_selected.clear();
    }

    pub fn select_version(&mut self, version: impl Into<String>) {
        self.api_version = version.into();
        self.operation_selected.clear();
        self.resource_selected.clear();
    }

    /// Add the operation, or remove it when already selected.
    pub fn toggle_operation(&mut self, operation: &str) {
        match self.operation_selected.iter().position(|o| o == operation) {
            Some(idx) => {
                self.operation_selected.remove(idx);
            }
            None => self.operation_selected.push(operation.to_string()),
        }
    }

    /// Select a single REST resource; operation choices are cleared.
    pub fn select_resource(&mut self, resource: impl Into<String>) {
        self.resource_selected = resource.into();
        self.operation_selected.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_defaults_and_persists() {
        let store = GlobalStateStore::new();
        assert_eq!(LimitParams::load(&store, API_CREATED_KEY, 5).unwrap(), 5);
        assert_eq!(
            store.get_raw(API_CREATED_KEY),
            Some(serde_json::json!({"limit": 5}))
        );
    }

    #[test]
    fn test_non_positive_limit_is_reset() {
        let store = GlobalStateStore::new();
        store.set_raw(BACKEND_USAGE_KEY, serde_json::json!({"limit": -3}));
        assert_eq!(LimitParams::load_default(&store, BACKEND_USAGE_KEY).unwrap(), 5);
        store.set_raw(BACKEND_USAGE_KEY, serde_json::json!({"limit": 0}));
        assert_eq!(LimitParams::load_default(&store, BACKEND_USAGE_KEY).unwrap(), 5);
        store.set_raw(BACKEND_USAGE_KEY, serde_json::json!({"limit": 12}));
        assert_eq!(LimitParams::load_default(&store, BACKEND_USAGE_KEY).unwrap(), 12);
    }

    #[test]
    fn test_parse_limit_input() {
        assert_eq!(LimitParams::parse_input("10"), Some(10));
        assert_eq!(LimitParams::parse_input("-7"), Some(7));
        assert_eq!(LimitParams::parse_input("3.9"), Some(3));
        assert_eq!(LimitParams::parse_input("12abc"), Some(12));
        assert_eq!(LimitParams::parse_input(""), None);
        assert_eq!(LimitParams::parse_input(".5"), None);
        assert_eq!(LimitParams::parse_input("abc"), None);
    }

    #[test]
    fn test_dtrp_defaults_when_missing() {
        let store = GlobalStateStore::new();
        assert_eq!(DateTimeRangeParams::load(&store), DateTimeRangeParams::default());
        store.set_raw(DTRP_KEY, serde_json::json!({"sync": true, "tr": "1day"}));
        let dtrp = DateTimeRangeParams::load(&store);
        assert!(dtrp.sync);
        assert_eq!(dtrp.tr.as_deref(), Some("1day"));
    }

    #[test]
    fn test_error_analysis_wire_names() {
        let params = ErrorAnalysisParams {
            api_selected: "PizzaShack".into(),
            api_version: "1.0.0".into(),
            operation_selected: vec![],
            resource_selected: "/menu (GET)".into(),
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["apiSelected"], "PizzaShack");
        assert_eq!(json["resourceSelected"], "/menu (GET)");
        assert!(params.is_complete());
    }

    #[test]
    fn test_error_analysis_selection_flow() {
        let mut params = ErrorAnalysisParams::default();
        params.select_api("StarWars");
        params.select_version("1.0.0");
        params.toggle_operation("hero (QUERY)");
        params.toggle_operation("droid (QUERY)");
        params.toggle_operation("hero (QUERY)");
        assert_eq!(params.operation_selected, vec!["droid (QUERY)"]);
        params.select_resource("/menu (GET)");
        assert!(params.operation_selected.is_empty());
        params.select_api("PizzaShack");
        assert!(params.api_version.is_empty());
        assert!(!params.is_complete());
    }
}
