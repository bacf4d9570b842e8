//! Client-side table engine: search, stable sort and pagination over an
//! in-memory record set. The view is recomputed from scratch on every call.

use std::cmp::{Ordering, Reverse};

use apim_widgets_api::{Record, Value};
use serde::{Deserialize, Serialize};

use crate::projection::timefmt::parse_timestamp;

pub const DEFAULT_ROWS_PER_PAGE: usize = 5;
pub const DEFAULT_FILTER_COLUMN: &str = "apiname";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Interaction state of one table. Lives as long as the widget is mounted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableViewState {
    pub query: String,
    pub filter_column: String,
    pub sort_column: String,
    pub direction: SortDirection,
    pub page: usize,
    pub rows_per_page: usize,
}

impl TableViewState {
    pub fn new(sort_column: impl Into<String>) -> Self {
        Self {
            query: String::new(),
            filter_column: DEFAULT_FILTER_COLUMN.to_string(),
            sort_column: sort_column.into(),
            direction: SortDirection::Asc,
            page: 0,
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
        }
    }

    pub fn with_filter_column(mut self, column: impl Into<String>) -> Self {
        self.filter_column = column.into();
        self
    }

    pub fn with_rows_per_page(mut self, rows: usize) -> Self {
        self.rows_per_page = rows;
        self
    }

    /// Header click: the active column flips direction, any other column
    /// becomes active in descending order.
    pub fn request_sort(&mut self, column: &str) {
        let active_desc = self.sort_column == column && self.direction == SortDirection::Desc;
        self.direction = if active_desc {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        };
        self.sort_column = column.to_string();
        self.page = 0;
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.page = 0;
    }

    pub fn set_filter_column(&mut self, column: impl Into<String>) {
        self.filter_column = column.into();
        self.page = 0;
    }

    pub fn set_rows_per_page(&mut self, rows: usize) {
        self.rows_per_page = rows;
        self.page = 0;
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page;
    }
}

/// One rendered page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableView {
    pub rows: Vec<Record>,
    /// Number of records matching the search, across all pages.
    pub total_count: usize,
    pub page_count: usize,
    /// Padding rows needed to keep the page height stable.
    pub empty_rows: usize,
}

/// Records matching the search, sorted. Pagination is applied on top of this.
pub fn filter_and_sort(data: &[Record], state: &TableViewState) -> Vec<Record> {
    let needle = state.query.to_lowercase();
    let mut rows: Vec<Record> = data
        .iter()
        .filter(|record| {
            needle.is_empty()
                || cell(record, &state.filter_column)
                    .to_string()
                    .to_lowercase()
                    .contains(&needle)
        })
        .cloned()
        .collect();

    let column = state.sort_column.as_str();
    // Keys are computed once per record; the cached-key sort keeps equal keys
    // in input order in both directions.
    match state.direction {
        SortDirection::Asc => rows.sort_by_cached_key(|r| SortKey::of(column, cell(r, column))),
        SortDirection::Desc => {
            rows.sort_by_cached_key(|r| Reverse(SortKey::of(column, cell(r, column))))
        }
    }
    rows
}

/// Page `state.page` of the filtered and sorted records. Pages past the end
/// are empty; the page is never clamped.
pub fn view(data: &[Record], state: &TableViewState) -> TableView {
    let rows = filter_and_sort(data, state);
    let total_count = rows.len();
    let rpp = state.rows_per_page;

    let page_count = if rpp == 0 { 0 } else { total_count.div_ceil(rpp) };
    let start = state.page.saturating_mul(rpp);
    let remaining = total_count.saturating_sub(start);
    let page_rows: Vec<Record> = rows.into_iter().skip(start).take(rpp).collect();

    TableView {
        rows: page_rows,
        total_count,
        page_count,
        empty_rows: rpp - rpp.min(remaining),
    }
}

static NULL: Value = Value::Null;

fn cell<'a>(record: &'a Record, column: &str) -> &'a Value {
    record.get(column).unwrap_or(&NULL)
}

/// Position of a cell in the column order. Cells of different classes order
/// by class, so every pair of cells is comparable the same way.
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Null,
    Boolean(bool),
    Number(f64),
    Timestamp(i64),
    Text(String),
    Array(String),
    Object(String),
}

impl SortKey {
    /// Strings that parse as timestamps key by time, unless the column holds
    /// versions (`2.0` would otherwise read as a date).
    fn of(column: &str, value: &Value) -> Self {
        match value {
            Value::Null => SortKey::Null,
            Value::Boolean(b) => SortKey::Boolean(*b),
            Value::Integer(i) => SortKey::Number(*i as f64),
            Value::Float(x) => SortKey::Number(*x),
            Value::String(s) => {
                let as_time = if is_version_column(column) {
                    None
                } else {
                    parse_timestamp(value)
                };
                match as_time {
                    Some(t) => SortKey::Timestamp(t.timestamp_millis()),
                    None => SortKey::Text(s.to_lowercase()),
                }
            }
            Value::Array(_) => SortKey::Array(value.to_string().to_lowercase()),
            Value::Object(_) => SortKey::Object(value.to_string().to_lowercase()),
        }
    }

    fn class(&self) -> u8 {
        match self {
            SortKey::Null => 0,
            SortKey::Boolean(_) => 1,
            SortKey::Number(_) => 2,
            SortKey::Timestamp(_) => 3,
            SortKey::Text(_) => 4,
            SortKey::Array(_) => 5,
            SortKey::Object(_) => 6,
        }
    }
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Boolean(x), SortKey::Boolean(y)) => x.cmp(y),
            (SortKey::Number(x), SortKey::Number(y)) => x.total_cmp(y),
            (SortKey::Timestamp(x), SortKey::Timestamp(y)) => x.cmp(y),
            (SortKey::Text(x), SortKey::Text(y))
            | (SortKey::Array(x), SortKey::Array(y))
            | (SortKey::Object(x), SortKey::Object(y)) => x.cmp(y),
            _ => self.class().cmp(&other.class()),
        }
    }
}

fn is_version_column(column: &str) -> bool {
    column.to_lowercase().contains("version")
}

/// Ascending order of two cells of `column`.
///
/// Cells order by kind first: empty, boolean, number, timestamp string,
/// other string. Numbers compare numerically, timestamp strings by time and
/// other strings case-insensitively. In a version column no string counts
/// as a timestamp.
pub fn compare_values(column: &str, a: &Value, b: &Value) -> Ordering {
    SortKey::of(column, a).cmp(&SortKey::of(column, b))
}
