//! Record schemas of the built-in widgets, one per result shape.

use super::projector::{FieldSource, RecordSchema};
use super::timefmt::{AXIS_TIME_FORMAT, CREATED_TIME_FORMAT};

/// `[apiName, apiVersion, createdTime, createdBy]`
pub fn api_created() -> RecordSchema {
    RecordSchema::new("apiCreated")
        .field("apiname", FieldSource::Composite { primary: 0, secondary: 3 })
        .field("apiversion", FieldSource::Column(1))
        .field(
            "createdtime",
            FieldSource::Timestamp { column: 2, pattern: CREATED_TIME_FORMAT },
        )
}

/// Time column of [`api_created`] rows.
pub const API_CREATED_TIME_COLUMN: usize = 2;

/// `[apiName, apiVersion, apiCreator, context, destination, hits]`
pub fn backend_usage() -> RecordSchema {
    RecordSchema::new("backendUsage")
        .field("apiname", FieldSource::Composite { primary: 0, secondary: 2 })
        .field("version", FieldSource::Column(1))
        .field("context", FieldSource::Column(3))
        .field("destination", FieldSource::Column(4))
        .field("hits", FieldSource::Number { column: 5, decimals: 0 })
}

/// `[apiName, apiVersion, faultCount]`
pub fn top_faulty() -> RecordSchema {
    RecordSchema::new("topFaulty")
        .field("apiname", FieldSource::Column(0))
        .field("version", FieldSource::Column(1))
        .field("faultcount", FieldSource::Number { column: 2, decimals: 0 })
}

/// `[apiId, apiName, apiVersion]`
pub fn api_ids() -> RecordSchema {
    RecordSchema::new("apiIds")
        .field("id", FieldSource::Column(0))
        .field("name", FieldSource::Column(1))
        .field("version", FieldSource::Column(2))
}

/// `[resourceTemplate, method]`
pub fn api_resources() -> RecordSchema {
    RecordSchema::new("apiResources")
        .field("resource", FieldSource::Column(0))
        .field("method", FieldSource::Column(1))
}

/// `[resourceTemplate, time, method, errorCount]`
pub fn error_analysis() -> RecordSchema {
    RecordSchema::new("errorAnalysis")
        .field(
            "time",
            FieldSource::Timestamp { column: 1, pattern: AXIS_TIME_FORMAT },
        )
        .field("count", FieldSource::Number { column: 3, decimals: 0 })
        .field("resource", FieldSource::Column(0))
}

/// `[throttledCount]`
pub fn throttled_count() -> RecordSchema {
    RecordSchema::new("throttledCount").field("count", FieldSource::Number { column: 0, decimals: 0 })
}

/// `[apiName, time, throttledCount]`
pub fn top_throttled() -> RecordSchema {
    RecordSchema::new("topThrottled")
        .field("apiname", FieldSource::Column(0))
        .field("time", FieldSource::Column(1))
        .field("count", FieldSource::Number { column: 2, decimals: 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::project;
    use apim_widgets_api::Value;

    #[test]
    fn test_arities() {
        assert_eq!(api_created().arity(), 4);
        assert_eq!(backend_usage().arity(), 6);
        assert_eq!(top_faulty().arity(), 3);
        assert_eq!(api_ids().arity(), 3);
        assert_eq!(api_resources().arity(), 2);
        assert_eq!(error_analysis().arity(), 4);
        assert_eq!(throttled_count().arity(), 1);
        assert_eq!(top_throttled().arity(), 3);
    }

    #[test]
    fn test_backend_usage_record() {
        let row = vec![
            Value::from("PizzaShack"),
            Value::from("1.0.0"),
            Value::from("admin"),
            Value::from("/pizzashack/1.0.0"),
            Value::from("https://localhost:9443/am/sample/pizzashack/v1/api/"),
            Value::Integer(17),
        ];
        let records = project(Some(&[row][..]), &backend_usage()).unwrap();
        let r = &records[0];
        assert_eq!(r["apiname"], Value::from("PizzaShack (admin)"));
        assert_eq!(r["context"], Value::from("/pizzashack/1.0.0"));
        assert_eq!(r["hits"], Value::Integer(17));
    }

    #[test]
    fn test_error_analysis_uses_24_hour_axis() {
        let row = vec![
            Value::from("/menu"),
            Value::from("2024-01-01T15:30:00Z"),
            Value::from("GET"),
            Value::Integer(3),
        ];
        let records = project(Some(&[row][..]), &error_analysis()).unwrap();
        assert_eq!(records[0]["time"], Value::from("2024/01/01 15:30"));
        assert_eq!(records[0]["count"], Value::Integer(3));
        assert_eq!(records[0]["resource"], Value::from("/menu"));
    }
}
