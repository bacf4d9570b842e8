//! Throttled request counts of the ten most throttled APIs, one line per API.

use apim_widgets_api::WidgetView;
use async_trait::async_trait;

use super::{AnalyticsWidget, WidgetContext};
use crate::channel::PublishedParameters;
use crate::error::Result;
use crate::projection::{pivot_time_series, project, schemas, series_names};
use crate::query::{TemplateBindings, TokenValue};

pub const NAME: &str = "Top10ThrottledApisOverTime";
const QUERY: &str = "query";
const TOP_N: i64 = 10;
/// Option list naming the plotted APIs.
pub const API_OPTIONS: &str = "apis";

#[derive(Debug, Clone, Copy, Default)]
pub struct TopThrottledOverTime;

impl TopThrottledOverTime {
    pub fn new() -> Self {
        Self
    }

    /// Link to the configured drill-down page (same time range, no
    /// preselected API).
    pub fn drill_down_url(ctx: &WidgetContext, range: &str) -> Option<String> {
        let (drill_down, page) = ctx.drill_down()?;
        Some(drill_down.time_range_url(page, range))
    }
}

#[async_trait]
impl AnalyticsWidget for TopThrottledOverTime {
    fn name(&self) -> &'static str {
        NAME
    }

    fn is_ready(&self, params: &PublishedParameters) -> bool {
        params.has_time_range()
    }

    async fn refresh(&self, ctx: &WidgetContext, params: &PublishedParameters) -> Result<WidgetView> {
        let Some((from, to)) = params.time_range() else {
            return Ok(WidgetView::no_data());
        };
        let bindings = TemplateBindings::new()
            .bind("from", TokenValue::Timestamp(from))
            .bind("to", TokenValue::Timestamp(to))
            .bind("per", params.granularity.as_str())
            .bind("limit", TOP_N);
        let rows = ctx.run_query(QUERY, &bindings, None).await?;

        let records = project(Some(&rows), &schemas::top_throttled())?;
        let chart = pivot_time_series(&rows, 0, 1, 2);
        let apis = series_names(&chart);
        Ok(WidgetView::ready(records)
            .with_chart(chart)
            .with_options(API_OPTIONS, apis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::FakeDataProvider;
    use crate::widget::testing;
    use apim_widgets_api::{Value, WidgetStatus};
    use std::sync::Arc;

    const TEMPLATE: &str = "from Throttled within {{from}}, {{to}} per '{{per}}' limit {{limit}}";

    #[tokio::test]
    async fn test_one_series_per_api() {
        let fake = Arc::new(FakeDataProvider::new().with_rows(
            QUERY,
            vec![
                vec!["Pizza".into(), Value::Integer(1_000), Value::Integer(4)],
                vec!["Weather".into(), Value::Integer(1_000), Value::Integer(1)],
                vec!["Pizza".into(), Value::Integer(2_000), Value::Integer(2)],
            ],
        ));
        let ctx = testing::context(fake.clone(), &[(QUERY, TEMPLATE)]);
        let params = PublishedParameters {
            from: Some(0),
            to: Some(5_000),
            ..PublishedParameters::default()
        };

        let view = TopThrottledOverTime.refresh(&ctx, &params).await.unwrap();
        assert_eq!(view.status, WidgetStatus::Ready);
        let chart = view.chart.as_ref().unwrap();
        assert_eq!(chart.metadata.names, vec!["Pizza", "Weather", "TIME"]);
        assert_eq!(chart.metadata.types, vec!["linear", "linear", "time"]);
        assert_eq!(chart.data.len(), 2);
        assert_eq!(view.options[API_OPTIONS], vec!["Pizza", "Weather"]);
        assert_eq!(fake.executed().await[0].query_values["{{limit}}"], "10");
    }
}
