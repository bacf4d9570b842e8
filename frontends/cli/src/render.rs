//! Terminal rendering of a widget view.

use std::collections::BTreeSet;

use apim_widgets::table::{self, TableViewState};
use apim_widgets_api::{ChartData, PieSummary, Record, SummaryDelta, WidgetStatus, WidgetView};
use comfy_table::{Cell, Color, Table};

pub fn status_line(name: &str, status: &WidgetStatus) -> String {
    match status {
        WidgetStatus::Loading => format!("{}: loading", name),
        WidgetStatus::Ready => format!("{}: ready", name),
        WidgetStatus::NoData => format!("{}: no data available", name),
        WidgetStatus::FaultyConfiguration => format!("{}: cannot fetch provider configuration", name),
        WidgetStatus::ProxyError(message) => format!("{}: {}", name, message),
    }
}

/// Everything the view carries, section by section.
pub fn view(name: &str, view: &WidgetView, state: &TableViewState) -> String {
    let mut sections = vec![status_line(name, &view.status)];
    if let Some(summary) = &view.summary {
        sections.push(summary_line(summary));
    }
    if !view.records.is_empty() {
        sections.push(records(&view.records, state));
    }
    if let Some(pie) = &view.pie {
        sections.push(pie_legend(pie));
    }
    if let Some(chart) = &view.chart {
        sections.push(chart_table(chart).to_string());
    }
    for (control, options) in &view.options {
        sections.push(format!("{}: {}", control, options.join(", ")));
    }
    sections.join("\n\n")
}

fn summary_line(summary: &SummaryDelta) -> String {
    let line = format!(
        "{} (previous {}) {}{}",
        summary.current,
        summary.previous,
        summary.trend.arrow(),
        summary.percent_label.as_deref().unwrap_or("")
    );
    if summary.favourable {
        line
    } else {
        format!("{} [regression]", line)
    }
}

/// One page of records plus a page footer.
pub fn records(data: &[Record], state: &TableViewState) -> String {
    let page = table::view(data, state);
    let columns: BTreeSet<&str> = data.iter().flat_map(|r| r.keys().map(String::as_str)).collect();

    let mut out = Table::new();
    out.set_header(columns.iter().map(|c| {
        let cell = Cell::new(c);
        if *c == state.sort_column {
            cell.fg(Color::Cyan)
        } else {
            cell
        }
    }));
    for record in &page.rows {
        out.add_row(
            columns
                .iter()
                .map(|c| Cell::new(record.get(*c).map(ToString::to_string).unwrap_or_default())),
        );
    }

    format!(
        "{}\npage {}/{} ({} rows)",
        out,
        state.page + 1,
        page.page_count.max(1),
        page.total_count
    )
}

fn chart_table(chart: &ChartData) -> Table {
    let mut out = Table::new();
    out.set_header(chart.metadata.names.iter().map(Cell::new));
    for row in &chart.data {
        out.add_row(row.iter().map(|v| Cell::new(v.to_string())));
    }
    out
}

fn pie_legend(pie: &PieSummary) -> String {
    pie.legend.join("\n")
}
