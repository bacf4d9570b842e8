//! Reshaping of raw result rows into records, buckets, charts and summaries.

pub mod buckets;
pub mod chart;
pub mod projector;
pub mod schemas;
pub mod summary;
pub mod timefmt;

pub use buckets::{as_pairs, bucket_by_time, TimeBucket};
pub use chart::{pivot_time_series, series_names, time_series_chart};
pub use projector::{project, FieldSource, FieldSpec, ProjectionError, RecordSchema};
pub use summary::{short_number, summarize_pie, SummaryDelta};
pub use timefmt::{parse_timestamp, Granularity};
