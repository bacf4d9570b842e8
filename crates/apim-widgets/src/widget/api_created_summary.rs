//! Count of all APIs and of those created in the last seven days. Needs no
//! published parameters and refreshes every minute on its own.

use std::sync::Arc;
use std::time::Duration;

use apim_widgets_api::{Record, Value, WidgetView};
use async_trait::async_trait;
use chrono::Utc;

use super::{AnalyticsWidget, WidgetContext};
use crate::channel::PublishedParameters;
use crate::error::Result;
use crate::projection::timefmt::{format_millis, QUERY_TIME_FORMAT};
use crate::query::TemplateBindings;

pub const NAME: &str = "APIMApiCreated";
const TOTAL_QUERY: &str = "totalQuery";
const WEEK_QUERY: &str = "weekQuery";
const WEEK_MILLIS: i64 = 7 * 24 * 60 * 60 * 1000;
const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Two digits at least: `5` reads `05`.
pub fn padded_count(count: usize) -> String {
    format!("{:02}", count)
}

#[derive(Clone)]
pub struct ApiCreatedSummary {
    now_millis: Clock,
}

impl ApiCreatedSummary {
    pub fn new() -> Self {
        Self::with_clock(|| Utc::now().timestamp_millis())
    }

    /// Use `clock` (epoch millis) instead of the system time.
    pub fn with_clock(clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        Self {
            now_millis: Arc::new(clock),
        }
    }
}

impl Default for ApiCreatedSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ApiCreatedSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCreatedSummary").finish_non_exhaustive()
    }
}

#[async_trait]
impl AnalyticsWidget for ApiCreatedSummary {
    fn name(&self) -> &'static str {
        NAME
    }

    fn refresh_interval(&self) -> Option<Duration> {
        Some(REFRESH_INTERVAL)
    }

    fn is_ready(&self, _params: &PublishedParameters) -> bool {
        true
    }

    async fn refresh(&self, ctx: &WidgetContext, _params: &PublishedParameters) -> Result<WidgetView> {
        // Each query answers one row per API, so the row count is the count.
        let total = ctx.run_query(TOTAL_QUERY, &TemplateBindings::new(), None).await?.len();

        let now = (self.now_millis)();
        let (Some(week_start), Some(week_end)) = (
            format_millis(now - WEEK_MILLIS, QUERY_TIME_FORMAT),
            format_millis(now, QUERY_TIME_FORMAT),
        ) else {
            tracing::warn!("[ApiCreatedSummary] Clock reading {} is out of range", now);
            return Ok(WidgetView::no_data());
        };
        let bindings = TemplateBindings::new()
            .bind("weekStart", week_start)
            .bind("weekEnd", week_end);
        let this_week = ctx.run_query(WEEK_QUERY, &bindings, None).await?.len();
        tracing::debug!("[ApiCreatedSummary] {} APIs, {} created this week", total, this_week);

        let mut record = Record::new();
        record.insert("total".into(), Value::String(padded_count(total)));
        record.insert("thisweek".into(), Value::String(padded_count(this_week)));
        Ok(WidgetView::ready(vec![record]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::FakeDataProvider;
    use crate::widget::testing;
    use apim_widgets_api::{Row, WidgetStatus};

    const TOTAL: &str = "select API_ID from AM_API";
    const WEEK: &str = "select API_ID from AM_API where CREATED_TIME between '{{weekStart}}' and '{{weekEnd}}'";
    /// 2024-01-08 12:00:00 UTC
    const NOW: i64 = 1_704_715_200_000;

    fn rows(n: usize) -> Vec<Row> {
        (0..n).map(|i| vec![Value::Integer(i as i64)]).collect()
    }

    #[test]
    fn test_padded_count() {
        assert_eq!(padded_count(0), "00");
        assert_eq!(padded_count(7), "07");
        assert_eq!(padded_count(10), "10");
        assert_eq!(padded_count(123), "123");
    }

    #[tokio::test]
    async fn test_counts_all_and_last_week() {
        let fake = Arc::new(
            FakeDataProvider::new()
                .with_rows(TOTAL_QUERY, rows(12))
                .with_rows_when(WEEK_QUERY, "weekStart", "2024-01-01 12:00:00", rows(3)),
        );
        let ctx = testing::context(fake.clone(), &[(TOTAL_QUERY, TOTAL), (WEEK_QUERY, WEEK)]);
        let widget = ApiCreatedSummary::with_clock(|| NOW);

        let view = widget.refresh(&ctx, &PublishedParameters::default()).await.unwrap();
        assert_eq!(view.status, WidgetStatus::Ready);
        assert_eq!(view.records[0]["total"], Value::from("12"));
        assert_eq!(view.records[0]["thisweek"], Value::from("03"));

        // Total first, then the week window ending now.
        assert_eq!(fake.executed_names().await, vec![TOTAL_QUERY, WEEK_QUERY]);
        let week = &fake.executed().await[1];
        assert_eq!(week.query_values["{{weekEnd}}"], "2024-01-08 12:00:00");
    }

    #[tokio::test]
    async fn test_no_apis_reads_zero() {
        let fake = Arc::new(FakeDataProvider::new());
        let ctx = testing::context(fake, &[(TOTAL_QUERY, TOTAL), (WEEK_QUERY, WEEK)]);
        let view = ApiCreatedSummary::with_clock(|| NOW)
            .refresh(&ctx, &PublishedParameters::default())
            .await
            .unwrap();
        assert_eq!(view.records[0]["total"], Value::from("00"));
        assert_eq!(view.records[0]["thisweek"], Value::from("00"));
    }

    #[test]
    fn test_refreshes_every_minute_without_parameters() {
        let widget = ApiCreatedSummary::new();
        assert_eq!(widget.refresh_interval(), Some(Duration::from_secs(60)));
        assert!(widget.is_ready(&PublishedParameters::default()));
    }
}
