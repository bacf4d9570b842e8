//! APIs created over a time range: a table of the APIs and a chart of how
//! many were created per time bucket.

use apim_widgets_api::{Record, WidgetView};
use async_trait::async_trait;

use super::{AnalyticsWidget, WidgetContext};
use crate::channel::PublishedParameters;
use crate::error::Result;
use crate::projection::timefmt::{format_millis, QUERY_TIME_FORMAT};
use crate::projection::{bucket_by_time, project, schemas, time_series_chart};
use crate::query::{Dimension, FilterBuilder, FilterSchema, TemplateBindings};
use crate::state::drilldown::api_from_display;
use crate::state::params::API_CREATED_KEY;
use crate::state::LimitParams;

pub const NAME: &str = "APIMApiCreatedAnalytics";
const QUERY: &str = "query";
const COUNT_COLUMN: &str = "Count";

#[derive(Debug, Clone, Copy, Default)]
pub struct ApiCreatedAnalytics;

impl ApiCreatedAnalytics {
    pub fn new() -> Self {
        Self
    }

    /// Link to the configured drill-down page for a table row.
    pub fn drill_down_url(ctx: &WidgetContext, record: &Record) -> Option<String> {
        let (drill_down, page) = ctx.drill_down()?;
        let apiname = record.get("apiname")?.to_string();
        let version = record.get("apiversion")?.to_string();
        Some(drill_down.api_url(page, &[api_from_display(&apiname, &version)]))
    }
}

#[async_trait]
impl AnalyticsWidget for ApiCreatedAnalytics {
    fn name(&self) -> &'static str {
        NAME
    }

    fn state_key(&self) -> Option<&'static str> {
        Some(API_CREATED_KEY)
    }

    async fn refresh(&self, ctx: &WidgetContext, params: &PublishedParameters) -> Result<WidgetView> {
        let limit = LimitParams::load(ctx.store(), API_CREATED_KEY, ctx.runtime().default_limit)?;
        let Some((from, to)) = params.time_range() else {
            return Ok(WidgetView::no_data());
        };
        if params.selections.is_empty() {
            return Ok(WidgetView::no_data());
        }
        let (Some(time_from), Some(time_to)) = (
            format_millis(from, QUERY_TIME_FORMAT),
            format_millis(to, QUERY_TIME_FORMAT),
        ) else {
            tracing::warn!("[ApiCreatedAnalytics] Time range {}..{} is out of range", from, to);
            return Ok(WidgetView::no_data());
        };

        let filter = FilterBuilder::new(FilterSchema::sql()).build(Dimension::Api, &params.selections)?;
        let bindings = TemplateBindings::new()
            .bind("timeFrom", time_from)
            .bind("timeTo", time_to)
            .bind("filterCondition", filter);
        let rows = ctx.run_query(QUERY, &bindings, Some(limit)).await?;

        let records = project(Some(&rows), &schemas::api_created())?;
        let buckets = bucket_by_time(&rows, schemas::API_CREATED_TIME_COLUMN, params.granularity);
        Ok(WidgetView::ready(records).with_chart(time_series_chart(&buckets, COUNT_COLUMN)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::FakeDataProvider;
    use crate::projection::Granularity;
    use crate::query::{ApiSelection, Selection};
    use crate::widget::testing;
    use apim_widgets_api::{Value, WidgetStatus};
    use std::sync::Arc;

    const TEMPLATE: &str =
        "select * from AM_API where CREATED_TIME between '{{timeFrom}}' and '{{timeTo}}' {{filterCondition}}";

    fn params(selections: Vec<Selection>) -> PublishedParameters {
        PublishedParameters {
            dimension: Some(Dimension::Api),
            selections,
            from: Some(1_704_067_200_000),
            to: Some(1_704_153_600_000),
            granularity: Granularity::Day,
        }
    }

    fn row(name: &str, created: &str) -> Vec<Value> {
        vec![name.into(), "1.0.0".into(), created.into(), "admin".into()]
    }

    #[tokio::test]
    async fn test_table_and_chart() {
        let fake = Arc::new(FakeDataProvider::new().with_rows(
            QUERY,
            vec![
                row("PizzaShack", "2024-01-01T10:00:00Z"),
                row("Weather", "2024-01-01T14:00:00Z"),
                row("Pets", "2024-01-02T09:00:00Z"),
            ],
        ));
        let ctx = testing::context(fake.clone(), &[(QUERY, TEMPLATE)]);
        let pizza = ApiSelection::new("PizzaShack").with_version("1.0.0").with_provider("admin");

        let view = ApiCreatedAnalytics
            .refresh(&ctx, &params(vec![pizza.into()]))
            .await
            .unwrap();

        assert_eq!(view.status, WidgetStatus::Ready);
        assert_eq!(view.records[0]["apiname"], Value::from("PizzaShack (admin)"));
        assert_eq!(view.records[0]["createdtime"], Value::from("2024-Jan-01 10:00:00 AM"));
        let chart = view.chart.unwrap();
        assert_eq!(chart.data.len(), 2);
        assert_eq!(chart.data[0][0], Value::Integer(2));

        let executed = fake.executed().await;
        assert_eq!(executed[0].publishing_limit, Some(5));
        assert_eq!(executed[0].query_values["{{timeFrom}}"], "2024-01-01 00:00:00");
        assert_eq!(
            executed[0].query_values["{{filterCondition}}"],
            "AND (API_NAME='PizzaShack' AND API_VERSION='1.0.0' AND CREATED_BY='admin')"
        );
    }

    #[tokio::test]
    async fn test_all_selection_has_no_filter() {
        let fake = Arc::new(FakeDataProvider::new().with_rows(QUERY, Vec::new()));
        let ctx = testing::context(fake.clone(), &[(QUERY, TEMPLATE)]);
        let view = ApiCreatedAnalytics
            .refresh(&ctx, &params(vec![Selection::all()]))
            .await
            .unwrap();
        assert_eq!(view.status, WidgetStatus::NoData);
        assert_eq!(fake.executed().await[0].query_values["{{filterCondition}}"], "");
    }

    #[tokio::test]
    async fn test_empty_selection_skips_query() {
        let fake = Arc::new(FakeDataProvider::new());
        let ctx = testing::context(fake.clone(), &[(QUERY, TEMPLATE)]);
        let view = ApiCreatedAnalytics.refresh(&ctx, &params(Vec::new())).await.unwrap();
        assert_eq!(view.status, WidgetStatus::NoData);
        assert_eq!(fake.call_count(), 0);
    }
}
