//! The APIs with the most faulty calls, as a table and a pie.

use apim_widgets_api::{Record, WidgetView};
use async_trait::async_trait;

use super::{AnalyticsWidget, WidgetContext};
use crate::channel::PublishedParameters;
use crate::error::Result;
use crate::projection::{project, schemas, summarize_pie};
use crate::query::{ApiSelection, TemplateBindings, TokenValue};
use crate::state::params::TOP_FAULTY_KEY;
use crate::state::LimitParams;

pub const NAME: &str = "APIMTopFaultyApis";
const QUERY: &str = "query";

#[derive(Debug, Clone, Copy, Default)]
pub struct TopFaultyApis;

impl TopFaultyApis {
    pub fn new() -> Self {
        Self
    }

    pub fn set_limit(ctx: &WidgetContext, input: &str) -> Result<Option<i64>> {
        let limit = LimitParams::parse_input(input);
        LimitParams::store(ctx.store(), TOP_FAULTY_KEY, limit)?;
        Ok(limit)
    }

    pub fn drill_down_url(ctx: &WidgetContext, record: &Record) -> Option<String> {
        let (drill_down, page) = ctx.drill_down()?;
        let api = ApiSelection::new(record.get("apiname")?.to_string())
            .with_version(record.get("version")?.to_string());
        Some(drill_down.api_url(page, &[api]))
    }
}

#[async_trait]
impl AnalyticsWidget for TopFaultyApis {
    fn name(&self) -> &'static str {
        NAME
    }

    fn state_key(&self) -> Option<&'static str> {
        Some(TOP_FAULTY_KEY)
    }

    fn is_ready(&self, params: &PublishedParameters) -> bool {
        params.has_time_range()
    }

    async fn refresh(&self, ctx: &WidgetContext, params: &PublishedParameters) -> Result<WidgetView> {
        let limit = LimitParams::load(ctx.store(), TOP_FAULTY_KEY, ctx.runtime().default_limit)?;
        let Some((from, to)) = params.time_range() else {
            return Ok(WidgetView::no_data());
        };

        let bindings = TemplateBindings::new()
            .bind("from", TokenValue::Timestamp(from))
            .bind("to", TokenValue::Timestamp(to))
            .bind("per", params.granularity.as_str())
            .bind("limit", limit);
        let rows = ctx.run_query(QUERY, &bindings, None).await?;
        let records = project(Some(&rows), &schemas::top_faulty())?;
        if records.is_empty() {
            return Ok(WidgetView::no_data());
        }

        let pie = summarize_pie(&records, "apiname", "faultcount");
        Ok(WidgetView::ready(records).with_pie(pie))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::FakeDataProvider;
    use crate::config::{ProviderConfig, WidgetConfiguration};
    use crate::widget::testing;
    use apim_widgets_api::{Value, WidgetStatus};
    use std::sync::Arc;

    const TEMPLATE: &str = "from FaultyApis within {{from}}, {{to}} per '{{per}}' limit {{limit}}";

    fn params() -> PublishedParameters {
        PublishedParameters {
            from: Some(0),
            to: Some(10),
            ..PublishedParameters::default()
        }
    }

    #[tokio::test]
    async fn test_pie_shares() {
        let fake = Arc::new(FakeDataProvider::new().with_rows(
            QUERY,
            vec![
                vec!["a".into(), "1".into(), Value::Integer(3)],
                vec!["b".into(), "1".into(), Value::Integer(1)],
            ],
        ));
        let ctx = testing::context(fake, &[(QUERY, TEMPLATE)]);
        assert!(TopFaultyApis.is_ready(&params()));

        let view = TopFaultyApis.refresh(&ctx, &params()).await.unwrap();
        assert_eq!(view.status, WidgetStatus::Ready);
        let pie = view.pie.unwrap();
        assert_eq!(pie.legend, vec!["a : 75.00%", "b : 25.00%"]);
    }

    #[tokio::test]
    async fn test_no_rows_is_no_data() {
        let fake = Arc::new(FakeDataProvider::new().with_rows(QUERY, Vec::new()));
        let ctx = testing::context(fake, &[(QUERY, TEMPLATE)]);
        let view = TopFaultyApis.refresh(&ctx, &params()).await.unwrap();
        assert_eq!(view.status, WidgetStatus::NoData);
        assert!(view.pie.is_none());
    }

    #[test]
    fn test_drill_down_url() {
        let fake = Arc::new(FakeDataProvider::new());
        let mut ctx = testing::context(fake.clone(), &[]);
        let mut record = Record::new();
        record.insert("apiname".into(), "PizzaShack".into());
        record.insert("version".into(), "1.0.0".into());
        assert_eq!(TopFaultyApis::drill_down_url(&ctx, &record), None);

        let services = ctx.services.clone();
        ctx = WidgetContext::new(
            services,
            WidgetConfiguration::new(ProviderConfig::new("x")).with_drill_down("api-analytics"),
        );
        let url = TopFaultyApis::drill_down_url(&ctx, &record).unwrap();
        assert!(url.starts_with("/dashboards/apimanalytics/api-analytics?widgetStates="));
        assert!(url.contains("PizzaShack"));
    }
}
