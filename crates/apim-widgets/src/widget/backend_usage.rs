//! Backend usage per API: hits against each API's backend destination.

use apim_widgets_api::WidgetView;
use async_trait::async_trait;

use super::{AnalyticsWidget, WidgetContext};
use crate::channel::PublishedParameters;
use crate::error::Result;
use crate::projection::{project, schemas};
use crate::query::{Dimension, FilterBuilder, FilterSchema, TemplateBindings, TokenValue};
use crate::state::params::BACKEND_USAGE_KEY;
use crate::state::LimitParams;

pub const NAME: &str = "APIMApiBackendUsageSummary";
const QUERY: &str = "apiusagequery";

#[derive(Debug, Clone, Copy, Default)]
pub struct ApiBackendUsage;

impl ApiBackendUsage {
    pub fn new() -> Self {
        Self
    }

    /// Persist a limit typed into the limit box. An empty box stores no
    /// limit; the next refresh falls back to the default.
    pub fn set_limit(ctx: &WidgetContext, input: &str) -> Result<Option<i64>> {
        let limit = LimitParams::parse_input(input);
        LimitParams::store(ctx.store(), BACKEND_USAGE_KEY, limit)?;
        Ok(limit)
    }
}

#[async_trait]
impl AnalyticsWidget for ApiBackendUsage {
    fn name(&self) -> &'static str {
        NAME
    }

    fn state_key(&self) -> Option<&'static str> {
        Some(BACKEND_USAGE_KEY)
    }

    async fn refresh(&self, ctx: &WidgetContext, params: &PublishedParameters) -> Result<WidgetView> {
        let limit = LimitParams::load(ctx.store(), BACKEND_USAGE_KEY, ctx.runtime().default_limit)?;
        let Some((from, to)) = params.time_range() else {
            return Ok(WidgetView::no_data());
        };
        if params.selections.is_empty() {
            return Ok(WidgetView::no_data());
        }

        let filter = FilterBuilder::new(FilterSchema::stream()).build(Dimension::Api, &params.selections)?;
        let bindings = TemplateBindings::new()
            .bind("filterCondition", filter)
            .bind("from", TokenValue::Timestamp(from))
            .bind("to", TokenValue::Timestamp(to))
            .bind("per", params.granularity.as_str())
            .bind("limit", limit);
        let rows = ctx.run_query(QUERY, &bindings, None).await?;

        Ok(WidgetView::ready(project(Some(&rows), &schemas::backend_usage())?))
    }
}
