//! Filter condition building.
//!
//! Widgets splice a filter condition into the WHERE-like clause of their
//! query template. A condition is built from the dimension the user drilled
//! into and the values selected for it: every selection becomes a
//! parenthesized conjunction, selections are ORed together and the result is
//! prefixed with `AND `. The `All` sentinel (or no selection) means no filter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::literal::quote;

/// The selection value meaning "do not filter this dimension".
pub const ALL: &str = "All";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("Unknown filter dimension '{0}'")]
    UnknownDimension(String),

    #[error("Malformed resource '{0}': expected '<pattern> (<method>)'")]
    MalformedResource(String),

    #[error("No resources given for an operations condition")]
    EmptyOperations,
}

/// Dimension a dashboard can drill into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Api,
    Version,
    Application,
    Resource,
    Operation,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Api => "api",
            Dimension::Version => "version",
            Dimension::Application => "app",
            Dimension::Resource => "resource",
            Dimension::Operation => "operation",
        }
    }
}

impl FromStr for Dimension {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api" => Ok(Dimension::Api),
            "version" => Ok(Dimension::Version),
            "app" | "application" => Ok(Dimension::Application),
            "resource" => Ok(Dimension::Resource),
            "operation" => Ok(Dimension::Operation),
            other => Err(FilterError::UnknownDimension(other.to_string())),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An API picked in a selector, identified by name, version and creator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiSelection {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

impl ApiSelection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            provider: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

/// One selected value of a dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selection {
    Api(ApiSelection),
    Value(String),
}

impl Selection {
    pub fn all() -> Self {
        Selection::Value(ALL.to_string())
    }

    /// Whether this is the `All` sentinel, in either its object or string form.
    pub fn is_all(&self) -> bool {
        match self {
            Selection::Api(api) => api.name == ALL,
            Selection::Value(v) => v == ALL,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Selection::Api(api) => &api.name,
            Selection::Value(v) => v,
        }
    }
}

impl From<ApiSelection> for Selection {
    fn from(api: ApiSelection) -> Self {
        Selection::Api(api)
    }
}

impl From<&str> for Selection {
    fn from(v: &str) -> Self {
        Selection::Value(v.to_string())
    }
}

/// Equality operator flavour of the target query language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseStyle {
    /// `ATTR='v'` as understood by the relational store.
    Sql,
    /// `attr=='v'` as understood by the stream processor.
    Stream,
}

impl ClauseStyle {
    fn equals(&self, attribute: &str, value: &str) -> String {
        let op = match self {
            ClauseStyle::Sql => "=",
            ClauseStyle::Stream => "==",
        };
        format!("{}{}{}", attribute, op, quote(value))
    }
}

/// Attribute names a widget's query uses for each dimension.
///
/// `api_creator` is optional since not every table records who created the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSchema {
    pub style: ClauseStyle,
    pub api_name: String,
    pub api_version: String,
    pub api_creator: Option<String>,
    pub application: String,
    pub resource: String,
    pub method: String,
}

impl FilterSchema {
    /// Column names of the relational API metadata tables.
    pub fn sql() -> Self {
        Self {
            style: ClauseStyle::Sql,
            api_name: "API_NAME".into(),
            api_version: "API_VERSION".into(),
            api_creator: Some("CREATED_BY".into()),
            application: "APPLICATION_NAME".into(),
            resource: "API_RESOURCE_TEMPLATE".into(),
            method: "API_METHOD".into(),
        }
    }

    /// Attribute names of the stream aggregations.
    pub fn stream() -> Self {
        Self {
            style: ClauseStyle::Stream,
            api_name: "apiName".into(),
            api_version: "apiVersion".into(),
            api_creator: None,
            application: "applicationName".into(),
            resource: "apiResourceTemplate".into(),
            method: "apiMethod".into(),
        }
    }

    pub fn with_creator(mut self, attribute: impl Into<String>) -> Self {
        self.api_creator = Some(attribute.into());
        self
    }

    pub fn without_creator(mut self) -> Self {
        self.api_creator = None;
        self
    }
}

/// A serialized boolean expression, possibly empty (no filter).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterExpression(String);

impl FilterExpression {
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for FilterExpression {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A compound resource value split into its template and HTTP method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub pattern: String,
    pub method: String,
}

impl ResourceRef {
    pub fn new(pattern: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            method: method.into(),
        }
    }

    /// The `"<pattern> (<method>)"` form shown in selectors.
    pub fn display_value(&self) -> String {
        format!("{} ({})", self.pattern, self.method)
    }
}

/// Split `"<pattern> (<method>)"` on the last `" ("`.
///
/// Patterns may themselves contain `" ("`, so only the final occurrence is the
/// delimiter.
pub fn split_resource(value: &str) -> Result<ResourceRef, FilterError> {
    let malformed = || FilterError::MalformedResource(value.to_string());

    let body = value.strip_suffix(')').ok_or_else(malformed)?;
    let idx = body.rfind(" (").ok_or_else(malformed)?;
    let pattern = &body[..idx];
    let method = &body[idx + 2..];
    if pattern.is_empty() || method.is_empty() {
        return Err(malformed());
    }
    Ok(ResourceRef::new(pattern, method))
}

/// Builds dimension filter conditions for one query dialect.
#[derive(Debug, Clone)]
pub struct FilterBuilder {
    schema: FilterSchema,
}

impl FilterBuilder {
    pub fn new(schema: FilterSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &FilterSchema {
        &self.schema
    }

    /// Build the `AND (...) OR (...)` condition for `selections` of `dimension`.
    ///
    /// Returns an empty expression when nothing is selected or the first
    /// selection is `All`.
    pub fn build(
        &self,
        dimension: Dimension,
        selections: &[Selection],
    ) -> Result<FilterExpression, FilterError> {
        match self.disjunction(dimension, selections)? {
            Some(joined) => Ok(FilterExpression(format!("AND {}", joined))),
            None => Ok(FilterExpression::empty()),
        }
    }

    /// OR-join of the selection clauses without the `AND ` prefix.
    pub fn any_of(
        &self,
        dimension: Dimension,
        selections: &[Selection],
    ) -> Result<FilterExpression, FilterError> {
        Ok(self
            .disjunction(dimension, selections)?
            .map(FilterExpression)
            .unwrap_or_default())
    }

    fn disjunction(
        &self,
        dimension: Dimension,
        selections: &[Selection],
    ) -> Result<Option<String>, FilterError> {
        match selections.first() {
            None => return Ok(None),
            Some(first) if first.is_all() => return Ok(None),
            Some(_) => {}
        }

        let clauses = selections
            .iter()
            .map(|selection| self.clause(dimension, selection))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(clauses.join(" OR ")))
    }

    fn clause(&self, dimension: Dimension, selection: &Selection) -> Result<String, FilterError> {
        let style = self.schema.style;
        let parts = match (dimension, selection) {
            (Dimension::Api, Selection::Api(api)) | (Dimension::Version, Selection::Api(api)) => {
                let mut parts = vec![style.equals(&self.schema.api_name, &api.name)];
                if let Some(version) = &api.version {
                    parts.push(style.equals(&self.schema.api_version, version));
                }
                if let (Some(attr), Some(provider)) = (&self.schema.api_creator, &api.provider) {
                    parts.push(style.equals(attr, provider));
                }
                parts
            }
            (Dimension::Api, Selection::Value(name)) => {
                vec![style.equals(&self.schema.api_name, name)]
            }
            (Dimension::Version, Selection::Value(version)) => {
                vec![style.equals(&self.schema.api_version, version)]
            }
            (Dimension::Application, selection) => {
                vec![style.equals(&self.schema.application, selection.name())]
            }
            (Dimension::Resource, selection) | (Dimension::Operation, selection) => {
                let resource = split_resource(selection.name())?;
                vec![
                    style.equals(&self.schema.resource, &resource.pattern),
                    style.equals(&self.schema.method, &resource.method),
                ]
            }
        };
        Ok(format!("({})", parts.join(" AND ")))
    }

    /// `(resource=='p' AND method=='M')` for a single REST resource.
    pub fn resource_condition(&self, resource: &ResourceRef) -> String {
        let style = self.schema.style;
        format!(
            "({} AND {})",
            style.equals(&self.schema.resource, &resource.pattern),
            style.equals(&self.schema.method, &resource.method)
        )
    }

    /// Condition for a set of GraphQL operations sharing one query.
    ///
    /// Each operation name must be contained in the resource template. The
    /// operations of one query share a method, and the last one is used.
    /// Returns the condition together with the number of operations.
    pub fn operations_condition(
        &self,
        operations: &[ResourceRef],
    ) -> Result<(String, usize), FilterError> {
        let last = operations.last().ok_or(FilterError::EmptyOperations)?;
        let contains = operations
            .iter()
            .map(|op| format!("str:contains({},{})", self.schema.resource, quote(&op.pattern)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let condition = format!(
            "(({}) AND {})",
            contains,
            self.schema.style.equals(&self.schema.method, &last.method)
        );
        Ok((condition, operations.len()))
    }

    /// `(apiName=='n' AND apiVersion=='v' AND <inner>)`.
    pub fn api_scoped_condition(&self, api: &str, version: &str, inner: &str) -> String {
        let style = self.schema.style;
        format!(
            "({} AND {} AND {})",
            style.equals(&self.schema.api_name, api),
            style.equals(&self.schema.api_version, version),
            inner
        )
    }
}
