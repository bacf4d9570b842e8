use std::collections::BTreeMap;

use apim_widgets_api::{Row, Value};
use serde::{Deserialize, Serialize};

use super::timefmt::{parse_timestamp, Granularity};

/// Number of rows falling into one time bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucket {
    /// Bucket start formatted with the granularity's key format.
    pub key: String,
    pub count: u64,
    /// Bucket start in epoch milliseconds.
    pub timestamp_millis: i64,
}

/// Count rows per time bucket of `granularity`, ordered by time.
///
/// Rows whose time column is missing or unparseable are skipped.
pub fn bucket_by_time(rows: &[Row], column: usize, granularity: Granularity) -> Vec<TimeBucket> {
    let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
    let mut skipped = 0usize;

    for row in rows {
        match row.get(column).and_then(parse_timestamp) {
            Some(t) => {
                let start = granularity.truncate(t).timestamp_millis();
                *counts.entry(start).or_default() += 1;
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!(
            "[bucket_by_time] Skipped {} rows without a usable time in column {}",
            skipped,
            column
        );
    }

    counts
        .into_iter()
        .filter_map(|(millis, count)| {
            let start = chrono::DateTime::from_timestamp_millis(millis)?;
            Some(TimeBucket {
                key: granularity.bucket_key(start),
                count,
                timestamp_millis: millis,
            })
        })
        .collect()
}

/// `[[count, millis], ...]`, the series shape time charts consume.
pub fn as_pairs(buckets: &[TimeBucket]) -> Vec<Vec<Value>> {
    buckets
        .iter()
        .map(|b| {
            vec![
                Value::Integer(b.count as i64),
                Value::Integer(b.timestamp_millis),
            ]
        })
        .collect()
}
