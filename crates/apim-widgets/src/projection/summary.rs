//! Pie summaries and period-over-period deltas.

use apim_widgets_api::{PieSlice, PieSummary, Record};

pub use apim_widgets_api::SummaryDelta;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Share of each record's `value_field` in the total, labelled by `label_field`.
///
/// Missing or non-numeric values count as zero; a zero total yields 0.00% for
/// every slice.
pub fn summarize_pie(records: &[Record], label_field: &str, value_field: &str) -> PieSummary {
    let pairs: Vec<(String, f64)> = records
        .iter()
        .map(|r| {
            let label = r.get(label_field).map(|v| v.to_string()).unwrap_or_default();
            let value = r.get(value_field).and_then(|v| v.as_f64()).unwrap_or(0.0);
            (label, value)
        })
        .collect();
    let total: f64 = pairs.iter().map(|(_, v)| v).sum();

    let slices: Vec<PieSlice> = pairs
        .into_iter()
        .map(|(label, value)| {
            let percentage = if total > 0.0 {
                round2(value / total * 100.0)
            } else {
                0.0
            };
            PieSlice {
                label,
                value,
                percentage,
            }
        })
        .collect();
    let legend = slices
        .iter()
        .map(|s| format!("{} : {:.2}%", s.label, s.percentage))
        .collect();

    PieSummary { slices, legend }
}

/// Compact count: `999`, `1.2K`, `3.4M`, `5B`.
pub fn short_number(n: i64) -> String {
    const UNITS: [&str; 4] = ["K", "M", "B", "T"];

    let sign = if n < 0 { "-" } else { "" };
    let mut value = n.unsigned_abs() as f64;
    if value < 1000.0 {
        return format!("{}{}", sign, n.unsigned_abs());
    }

    let mut unit = 0;
    value /= 1000.0;
    while unit + 1 < UNITS.len() && (value * 10.0).round() / 10.0 >= 1000.0 {
        value /= 1000.0;
        unit += 1;
    }

    let rounded = (value * 10.0).round() / 10.0;
    let digits = if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{:.1}", rounded)
    };
    format!("{}{}{}", sign, digits, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use apim_widgets_api::Value;

    fn record(name: &str, count: i64) -> Record {
        Record::from([
            ("apiname".to_string(), Value::from(name)),
            ("count".to_string(), Value::Integer(count)),
        ])
    }

    #[test]
    fn test_pie_percentages_and_labels() {
        let pie = summarize_pie(&[record("a", 3), record("b", 1)], "apiname", "count");
        assert_eq!(pie.legend, vec!["a : 75.00%", "b : 25.00%"]);
        assert_eq!(pie.slices[0].percentage, 75.0);
        assert_eq!(pie.slices[1].value, 1.0);
    }

    #[test]
    fn test_pie_rounds_to_two_decimals() {
        let pie = summarize_pie(
            &[record("a", 1), record("b", 1), record("c", 1)],
            "apiname",
            "count",
        );
        assert_eq!(pie.slices[0].percentage, 33.33);
        assert_eq!(pie.legend[2], "c : 33.33%");
    }

    #[test]
    fn test_pie_zero_total() {
        let pie = summarize_pie(&[record("a", 0)], "apiname", "count");
        assert_eq!(pie.legend, vec!["a : 0.00%"]);
    }

    #[test]
    fn test_pie_empty() {
        let pie = summarize_pie(&[], "apiname", "count");
        assert!(pie.slices.is_empty());
        assert!(pie.legend.is_empty());
    }

    #[test]
    fn test_short_number() {
        assert_eq!(short_number(0), "0");
        assert_eq!(short_number(999), "999");
        assert_eq!(short_number(1000), "1K");
        assert_eq!(short_number(1234), "1.2K");
        assert_eq!(short_number(-1234), "-1.2K");
        assert_eq!(short_number(999_960), "1M");
        assert_eq!(short_number(3_400_000), "3.4M");
        assert_eq!(short_number(5_000_000_000), "5B");
    }
}
