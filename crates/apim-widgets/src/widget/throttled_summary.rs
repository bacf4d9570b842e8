//! Throttled requests in the last 24 hours compared with the 24 hours
//! before. Refreshes every minute on its own.

use std::sync::Arc;
use std::time::Duration;

use apim_widgets_api::{SummaryDelta, Value, WidgetView};
use async_trait::async_trait;
use chrono::Utc;

use super::{AnalyticsWidget, WidgetContext};
use crate::channel::PublishedParameters;
use crate::error::Result;
use crate::projection::{schemas, Granularity};
use crate::query::{TemplateBindings, TokenValue};

pub const NAME: &str = "APIMApiThrottledSummary";
const QUERY: &str = "query";
const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;
const REFRESH_INTERVAL: Duration = Duration::from_secs(60);
/// Range preset of the drill-down target.
const DRILL_DOWN_RANGE: &str = "1day";

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

#[derive(Clone)]
pub struct ApiThrottledSummary {
    now_millis: Clock,
}

impl ApiThrottledSummary {
    pub fn new() -> Self {
        Self::with_clock(|| Utc::now().timestamp_millis())
    }

    /// Use `clock` (epoch millis) instead of the system time.
    pub fn with_clock(clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        Self {
            now_millis: Arc::new(clock),
        }
    }

    pub fn drill_down_url(ctx: &WidgetContext) -> Option<String> {
        let (drill_down, page) = ctx.drill_down()?;
        Some(drill_down.time_range_url(page, DRILL_DOWN_RANGE))
    }

    async fn count(&self, ctx: &WidgetContext, from: i64, to: i64) -> Result<i64> {
        let bindings = TemplateBindings::new()
            .bind("apiCreator", "")
            .bind("from", TokenValue::Timestamp(from))
            .bind("to", TokenValue::Timestamp(to))
            .bind("per", Granularity::Day.as_str());
        let rows = ctx.run_query(QUERY, &bindings, None).await?;
        let Some(first) = rows.first().filter(|row| !row.is_empty()) else {
            return Ok(0);
        };
        let record = schemas::throttled_count().project_row(0, first)?;
        Ok(record.get("count").and_then(Value::as_i64).unwrap_or(0))
    }
}

impl Default for ApiThrottledSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ApiThrottledSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiThrottledSummary").finish_non_exhaustive()
    }
}

#[async_trait]
impl AnalyticsWidget for ApiThrottledSummary {
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
        let now = (self.now_millis)();
        let day_start = now - DAY_MILLIS;
        let (this_day, last_day) = tokio::join!(
            self.count(ctx, day_start, now),
            self.count(ctx, day_start - DAY_MILLIS, day_start),
        );
        // More throttling is bad news.
        let summary = SummaryDelta::compute(this_day?, last_day?, true);
        tracing::debug!(
            "[ApiThrottledSummary] {} throttled today, {} the day before",
            summary.current,
            summary.previous
        );
        Ok(WidgetView::no_data().with_summary(summary))
    }
}
