use std::collections::BTreeMap;
use std::sync::Arc;

use super::{
    AnalyticsWidget, ApiBackendUsage, ApiCreatedAnalytics, ApiCreatedSummary, ApiErrorAnalysis, ApiThrottledSummary,
    TopFaultyApis, TopThrottledOverTime,
};

/// Widgets by id.
#[derive(Clone, Default)]
pub struct WidgetRegistry {
    widgets: BTreeMap<&'static str, Arc<dyn AnalyticsWidget>>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every widget this crate ships.
    pub fn builtin() -> Self {
        Self::new()
            .with(ApiCreatedAnalytics::new())
            .with(ApiCreatedSummary::new())
            .with(ApiBackendUsage::new())
            .with(TopFaultyApis::new())
            .with(ApiErrorAnalysis::new())
            .with(ApiThrottledSummary::new())
            .with(TopThrottledOverTime::new())
    }

    pub fn with(mut self, widget: impl AnalyticsWidget + 'static) -> Self {
        self.register(Arc::new(widget));
        self
    }

    /// Add `widget`, replacing one registered under the same name.
    pub fn register(&mut self, widget: Arc<dyn AnalyticsWidget>) {
        if self.widgets.insert(widget.name(), widget.clone()).is_some() {
            tracing::warn!("[WidgetRegistry] Replaced widget {}", widget.name());
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AnalyticsWidget>> {
        self.widgets.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.widgets.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }
}

impl std::fmt::Debug for WidgetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.widgets.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_widgets() {
        let registry = WidgetRegistry::builtin();
        assert_eq!(registry.len(), 7);
        assert!(registry.get("APIMApiCreated").is_some());
        assert!(registry.get("APIMApiErrorAnalysis").is_some());
        assert!(registry.get("Unknown").is_none());
        let names: Vec<_> = registry.names().collect();
        assert!(names.contains(&"Top10ThrottledApisOverTime"));
    }
}
