//! Positional row to named record projection.

use apim_widgets_api::{Record, Row, Value};
use thiserror::Error;

use super::timefmt::parse_timestamp;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("Row {row} of '{schema}' has {actual} columns, expected at least {expected}")]
    ArityMismatch {
        schema: String,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Row {row} of '{schema}': field '{field}' expects {expected}")]
    TypeMismatch {
        schema: String,
        row: usize,
        field: String,
        expected: &'static str,
    },
}

/// Where a record field takes its value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// Copy a column as-is.
    Column(usize),
    /// `"<primary> (<secondary>)"`, e.g. an API name with its creator.
    Composite { primary: usize, secondary: usize },
    /// Format a timestamp column with a chrono pattern.
    Timestamp { column: usize, pattern: &'static str },
    /// Numeric column rounded to `decimals` places.
    Number { column: usize, decimals: u32 },
}

impl FieldSource {
    fn max_column(&self) -> usize {
        match self {
            FieldSource::Column(c) => *c,
            FieldSource::Composite { primary, secondary } => (*primary).max(*secondary),
            FieldSource::Timestamp { column, .. } => *column,
            FieldSource::Number { column, .. } => *column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub source: FieldSource,
}

/// Named fields of one widget's records, each bound to tuple positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    name: String,
    fields: Vec<FieldSpec>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, source: FieldSource) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            source,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Minimum number of columns a row needs.
    pub fn arity(&self) -> usize {
        self.fields
            .iter()
            .map(|f| f.source.max_column() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Project a single row. `index` is only used in error reports.
    pub fn project_row(&self, index: usize, row: &Row) -> Result<Record, ProjectionError> {
        let expected = self.arity();
        if row.len() < expected {
            return Err(ProjectionError::ArityMismatch {
                schema: self.name.clone(),
                row: index,
                expected,
                actual: row.len(),
            });
        }

        let mut record = Record::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = match &field.source {
                FieldSource::Column(c) => row[*c].clone(),
                FieldSource::Composite { primary, secondary } => {
                    Value::String(format!("{} ({})", row[*primary], row[*secondary]))
                }
                FieldSource::Timestamp { column, pattern } => match &row[*column] {
                    Value::Null => Value::Null,
                    cell => {
                        let t = parse_timestamp(cell)
                            .ok_or_else(|| self.type_mismatch(index, field, "a timestamp"))?;
                        Value::String(t.format(pattern).to_string())
                    }
                },
                FieldSource::Number { column, decimals } => match &row[*column] {
                    Value::Null => Value::Null,
                    cell => {
                        let n = cell
                            .as_f64()
                            .ok_or_else(|| self.type_mismatch(index, field, "a number"))?;
                        round_number(n, *decimals)
                    }
                },
            };
            record.insert(field.name.clone(), value);
        }
        Ok(record)
    }

    fn type_mismatch(&self, row: usize, field: &FieldSpec, expected: &'static str) -> ProjectionError {
        ProjectionError::TypeMismatch {
            schema: self.name.clone(),
            row,
            field: field.name.clone(),
            expected,
        }
    }
}

fn round_number(n: f64, decimals: u32) -> Value {
    if decimals == 0 {
        return Value::Integer(n.round() as i64);
    }
    let factor = 10f64.powi(decimals as i32);
    Value::Float((n * factor).round() / factor)
}

/// Project result rows into records. Absent or empty input yields no records.
pub fn project(rows: Option<&[Row]>, schema: &RecordSchema) -> Result<Vec<Record>, ProjectionError> {
    let Some(rows) = rows else {
        return Ok(Vec::new());
    };
    rows.iter()
        .enumerate()
        .map(|(i, row)| schema.project_row(i, row))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::timefmt::CREATED_TIME_FORMAT;

    fn schema() -> RecordSchema {
        RecordSchema::new("apiCreated")
            .field("apiname", FieldSource::Composite { primary: 0, secondary: 3 })
            .field("apiversion", FieldSource::Column(1))
            .field(
                "createdtime",
                FieldSource::Timestamp { column: 2, pattern: CREATED_TIME_FORMAT },
            )
    }

    fn row() -> Row {
        vec![
            Value::from("PizzaShack"),
            Value::from("1.0.0"),
            Value::Integer(1_700_000_000_000),
            Value::from("admin"),
        ]
    }

    #[test]
    fn test_empty_and_absent_rows() {
        assert_eq!(project(None, &schema()).unwrap(), Vec::<Record>::new());
        assert_eq!(project(Some(&[][..]), &schema()).unwrap(), Vec::<Record>::new());
    }

    #[test]
    fn test_arity_is_max_column_plus_one() {
        assert_eq!(schema().arity(), 4);
        assert_eq!(RecordSchema::new("empty").arity(), 0);
    }

    #[test]
    fn test_projects_composite_and_timestamp() {
        let records = project(Some(&[row()][..]), &schema()).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r["apiname"], Value::from("PizzaShack (admin)"));
        assert_eq!(r["apiversion"], Value::from("1.0.0"));
        assert_eq!(r["createdtime"], Value::from("2023-Nov-14 10:13:20 PM"));
    }

    #[test]
    fn test_short_row_is_rejected() {
        let mut short = row();
        short.pop();
        let err = project(Some(&[row(), short][..]), &schema()).unwrap_err();
        assert_eq!(
            err,
            ProjectionError::ArityMismatch {
                schema: "apiCreated".into(),
                row: 1,
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn test_unparseable_timestamp_is_a_type_mismatch() {
        let mut bad = row();
        bad[2] = Value::from("yesterday");
        assert!(matches!(
            project(Some(&[bad][..]), &schema()),
            Err(ProjectionError::TypeMismatch { field, .. }) if field == "createdtime"
        ));
    }

    #[test]
    fn test_number_rounding() {
        let schema = RecordSchema::new("latency")
            .field("avg", FieldSource::Number { column: 0, decimals: 2 })
            .field("hits", FieldSource::Number { column: 1, decimals: 0 });
        let records = project(Some(&[vec![Value::Float(12.3456), Value::from("41.6")]][..]), &schema)
            .unwrap();
        assert_eq!(records[0]["avg"], Value::Float(12.35));
        assert_eq!(records[0]["hits"], Value::Integer(42));
    }
}
