//! Chart-ready data sets.

use std::collections::{BTreeMap, HashMap};

use apim_widgets_api::{ChartData, Row, Value};

use super::buckets::{as_pairs, TimeBucket};
use super::timefmt::parse_timestamp;

pub const TIME_COLUMN: &str = "TIME";
pub const LINEAR: &str = "linear";
pub const TIME: &str = "time";

/// Two-column `[count, time]` chart over time buckets.
pub fn time_series_chart(buckets: &[TimeBucket], count_name: &str) -> ChartData {
    ChartData::new(
        vec![count_name.to_string(), TIME_COLUMN.to_string()],
        vec![LINEAR.to_string(), TIME.to_string()],
    )
    .with_rows(as_pairs(buckets))
}

/// Pivot `(series, time, value)` rows into one column per series plus a
/// trailing `TIME` column.
///
/// Series keep their order of first appearance and rows are sorted by time.
/// A series without a value at some time gets 0 there. Rows with an
/// unparseable time are dropped.
pub fn pivot_time_series(
    rows: &[Row],
    series_column: usize,
    time_column: usize,
    value_column: usize,
) -> ChartData {
    let mut series: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut by_time: BTreeMap<i64, HashMap<usize, f64>> = BTreeMap::new();

    for row in rows {
        let (Some(name), Some(time)) = (row.get(series_column), row.get(time_column)) else {
            continue;
        };
        let Some(t) = parse_timestamp(time) else {
            continue;
        };
        let name = name.to_string();
        let idx = *index.entry(name.clone()).or_insert_with(|| {
            series.push(name);
            series.len() - 1
        });
        let value = row.get(value_column).and_then(Value::as_f64).unwrap_or(0.0);
        *by_time
            .entry(t.timestamp_millis())
            .or_default()
            .entry(idx)
            .or_default() += value;
    }

    let data = by_time
        .into_iter()
        .map(|(millis, values)| {
            let mut out: Vec<Value> = (0..series.len())
                .map(|i| number_value(values.get(&i).copied().unwrap_or(0.0)))
                .collect();
            out.push(Value::Integer(millis));
            out
        })
        .collect();

    let mut names = series.clone();
    names.push(TIME_COLUMN.to_string());
    let mut types = vec![LINEAR.to_string(); series.len()];
    types.push(TIME.to_string());

    ChartData::new(names, types).with_rows(data)
}

/// Series names of a pivoted chart, i.e. every column but `TIME`.
pub fn series_names(chart: &ChartData) -> Vec<String> {
    chart
        .metadata
        .names
        .iter()
        .filter(|n| n.as_str() != TIME_COLUMN)
        .cloned()
        .collect()
}

fn number_value(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        Value::Integer(v as i64)
    } else {
        Value::Float(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::buckets::bucket_by_time;
    use crate::projection::timefmt::Granularity;

    fn row(api: &str, millis: i64, count: i64) -> Row {
        vec![Value::from(api), Value::Integer(millis), Value::Integer(count)]
    }

    #[test]
    fn test_time_series_chart_metadata() {
        let rows = vec![vec![Value::Integer(60_000)], vec![Value::Integer(61_000)]];
        let chart = time_series_chart(&bucket_by_time(&rows, 0, Granularity::Minute), "COUNT");
        assert_eq!(chart.metadata.names, vec!["COUNT", "TIME"]);
        assert_eq!(chart.metadata.types, vec!["linear", "time"]);
        assert_eq!(chart.data, vec![vec![Value::Integer(2), Value::Integer(60_000)]]);
    }

    #[test]
    fn test_pivot_fills_gaps_with_zero() {
        let rows = vec![
            row("Pizza", 2_000, 4),
            row("Calc", 1_000, 1),
            row("Pizza", 1_000, 2),
        ];
        let chart = pivot_time_series(&rows, 0, 1, 2);
        assert_eq!(chart.metadata.names, vec!["Pizza", "Calc", "TIME"]);
        assert_eq!(chart.metadata.types, vec!["linear", "linear", "time"]);
        assert_eq!(
            chart.data,
            vec![
                vec![Value::Integer(2), Value::Integer(1), Value::Integer(1_000)],
                vec![Value::Integer(4), Value::Integer(0), Value::Integer(2_000)],
            ]
        );
        assert_eq!(series_names(&chart), vec!["Pizza", "Calc"]);
    }

    #[test]
    fn test_pivot_sums_duplicate_points() {
        let rows = vec![row("Pizza", 1_000, 1), row("Pizza", 1_000, 2)];
        let chart = pivot_time_series(&rows, 0, 1, 2);
        assert_eq!(chart.data, vec![vec![Value::Integer(3), Value::Integer(1_000)]]);
    }

    #[test]
    fn test_pivot_empty() {
        let chart = pivot_time_series(&[], 0, 1, 2);
        assert_eq!(chart.metadata.names, vec!["TIME"]);
        assert!(chart.data.is_empty());
    }
}
