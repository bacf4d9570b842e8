//! Types shared between the APIM widget engine and the layers that render it.

pub mod value;
pub mod widget_spec;

use std::collections::HashMap;

pub use value::Value;
pub use widget_spec::{
    ChartData, ChartMetadata, PieSlice, PieSummary, SummaryDelta, Trend, WidgetStatus, WidgetView,
};

/// Positional result tuple as returned by the analytics query engine.
pub type Row = Vec<Value>;

/// Projected row keyed by field name.
pub type Record = HashMap<String, Value>;
