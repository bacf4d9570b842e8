//! View types handed from the widget engine to a renderer.
//!
//! A `WidgetView` is everything a renderer needs for one widget at one point
//! in time: a status, the projected table records and whichever of the chart,
//! pie and summary payloads the widget produces. Renderers never see raw
//! result rows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Record, Value};

/// Lifecycle status of a widget view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum WidgetStatus {
    /// Inputs changed and a query is in flight.
    Loading,
    Ready,
    /// The query failed, timed out or returned no rows.
    NoData,
    /// The widget configuration could not be loaded. Terminal.
    FaultyConfiguration,
    /// The backend answered with an error body; the message is shown verbatim.
    ProxyError(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetView {
    pub status: WidgetStatus,

    /// Projected table records, already keyed by field name.
    pub records: Vec<Record>,

    pub chart: Option<ChartData>,

    pub pie: Option<PieSummary>,

    pub summary: Option<SummaryDelta>,

    /// Option lists for filter controls (e.g. "api" -> names, "version" -> versions).
    pub options: BTreeMap<String, Vec<String>>,
}

impl WidgetView {
    fn with_status(status: WidgetStatus) -> Self {
        Self {
            status,
            records: Vec::new(),
            chart: None,
            pie: None,
            summary: None,
            options: BTreeMap::new(),
        }
    }

    pub fn loading() -> Self {
        Self::with_status(WidgetStatus::Loading)
    }

    pub fn no_data() -> Self {
        Self::with_status(WidgetStatus::NoData)
    }

    pub fn faulty_configuration() -> Self {
        Self::with_status(WidgetStatus::FaultyConfiguration)
    }

    pub fn proxy_error(message: impl Into<String>) -> Self {
        Self::with_status(WidgetStatus::ProxyError(message.into()))
    }

    /// Ready view over `records`. An empty record set is reported as no data.
    pub fn ready(records: Vec<Record>) -> Self {
        let status = if records.is_empty() {
            WidgetStatus::NoData
        } else {
            WidgetStatus::Ready
        };
        Self {
            records,
            ..Self::with_status(status)
        }
    }

    pub fn with_chart(mut self, chart: ChartData) -> Self {
        if !chart.data.is_empty() {
            self.status = WidgetStatus::Ready;
        }
        self.chart = Some(chart);
        self
    }

    pub fn with_pie(mut self, pie: PieSummary) -> Self {
        self.pie = Some(pie);
        self
    }

    pub fn with_summary(mut self, summary: SummaryDelta) -> Self {
        self.status = WidgetStatus::Ready;
        self.summary = Some(summary);
        self
    }

    pub fn with_options(mut self, control: impl Into<String>, options: Vec<String>) -> Self {
        self.options.insert(control.into(), options);
        self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, WidgetStatus::FaultyConfiguration)
    }

    pub fn has_data(&self) -> bool {
        matches!(self.status, WidgetStatus::Ready)
    }
}

impl Default for WidgetView {
    fn default() -> Self {
        Self::loading()
    }
}

/// Column metadata of a chart data set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartMetadata {
    pub names: Vec<String>,
    /// One of `linear`, `ordinal` or `time` per column.
    pub types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartData {
    pub metadata: ChartMetadata,
    pub data: Vec<Vec<Value>>,
}

impl ChartData {
    pub fn new(names: Vec<String>, types: Vec<String>) -> Self {
        Self {
            metadata: ChartMetadata { names, types },
            data: Vec::new(),
        }
    }

    pub fn with_rows(mut self, data: Vec<Vec<Value>>) -> Self {
        self.data = data;
        self
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.metadata.names.iter().position(|n| n == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieSlice {
    pub label: String,
    pub value: f64,
    /// Share of the total, rounded to two decimals.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PieSummary {
    pub slices: Vec<PieSlice>,
    /// Legend entries in slice order, e.g. `"PizzaShack : 75.00%"`.
    pub legend: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Up => "▲",
            Trend::Down => "▼",
            Trend::Flat => "",
        }
    }
}

/// Current-period count compared against the previous period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryDelta {
    pub current: i64,
    pub previous: i64,
    /// `current - previous`, negated when a rise is bad news (e.g. throttling).
    pub difference: i64,
    pub trend: Trend,
    /// False when the difference should be shown as a regression.
    pub favourable: bool,
    /// `" (12.50%)"`, only present when `previous > 0`.
    pub percent_label: Option<String>,
}

impl SummaryDelta {
    pub fn compute(current: i64, previous: i64, negative: bool) -> Self {
        let mut difference = current - previous;
        if negative {
            difference = -difference;
        }

        let trend = if difference == 0 {
            Trend::Flat
        } else if current > previous {
            Trend::Up
        } else {
            Trend::Down
        };

        let percent_label = (previous > 0).then(|| {
            let percentage = difference.abs() as f64 * 100.0 / previous as f64;
            format!(" ({:.2}%)", percentage)
        });

        Self {
            current,
            previous,
            difference,
            trend,
            favourable: difference >= 0,
            percent_label,
        }
    }
}
