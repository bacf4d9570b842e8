//! Query template resolution.
//!
//! Widget provider configurations carry named query templates whose text
//! contains `{{token}}` placeholders. Resolving a template substitutes every
//! placeholder with its bound value and yields a [`QueryDescriptor`] that the
//! data channel can execute.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

use super::filter::FilterExpression;
use crate::config::ProviderConfig;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown query template '{0}'")]
    UnknownTemplate(String),

    #[error("Template '{template}' references unbound token '{{{{{token}}}}}'")]
    UnboundToken { template: String, token: String },
}

/// Named query texts available to one widget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateCatalog {
    templates: HashMap<String, String>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_provider_config(config: &ProviderConfig) -> Self {
        Self {
            templates: config.templates().clone().into_iter().collect(),
        }
    }

    pub fn with_template(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.templates.insert(name.into(), text.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Value bound to a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TokenValue {
    Text(String),
    Integer(i64),
    /// Epoch milliseconds.
    Timestamp(i64),
    Filter(FilterExpression),
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenValue::Text(s) => f.write_str(s),
            TokenValue::Integer(i) => write!(f, "{}", i),
            TokenValue::Timestamp(ms) => write!(f, "{}", ms),
            TokenValue::Filter(expr) => f.write_str(expr.as_str()),
        }
    }
}

impl From<&str> for TokenValue {
    fn from(s: &str) -> Self {
        TokenValue::Text(s.to_string())
    }
}

impl From<String> for TokenValue {
    fn from(s: String) -> Self {
        TokenValue::Text(s)
    }
}

impl From<i64> for TokenValue {
    fn from(i: i64) -> Self {
        TokenValue::Integer(i)
    }
}

impl From<FilterExpression> for TokenValue {
    fn from(expr: FilterExpression) -> Self {
        TokenValue::Filter(expr)
    }
}

/// Ordered token bindings. Tokens are stored without their braces; binding a
/// token twice replaces the earlier value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateBindings {
    entries: Vec<(String, TokenValue)>,
}

impl TemplateBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, token: impl Into<String>, value: impl Into<TokenValue>) -> Self {
        self.set(token, value);
        self
    }

    pub fn set(&mut self, token: impl Into<String>, value: impl Into<TokenValue>) {
        let token = token.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(t, _)| *t == token) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((token, value)),
        }
    }

    pub fn get(&self, token: &str) -> Option<&TokenValue> {
        self.entries
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TokenValue)> {
        self.entries.iter().map(|(t, v)| (t.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A fully substituted query, ready to hand to the data channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    pub query_name: String,
    /// `{{token}}` -> stringified value, as the hosting channel expects.
    pub query_values: BTreeMap<String, String>,
    pub query_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publishing_limit: Option<i64>,
}

impl QueryDescriptor {
    pub fn with_publishing_limit(mut self, limit: i64) -> Self {
        self.publishing_limit = Some(limit);
        self
    }

    /// Copy of `base` with `queryData.queryName`/`queryValues` and the
    /// publishing limit set from this descriptor.
    pub fn to_provider_config(&self, base: &ProviderConfig) -> ProviderConfig {
        let mut config = base.clone();
        let settings = &mut config.configs.config;
        settings.query_data.query_name = Some(self.query_name.clone());
        settings.query_data.query_values = Some(self.query_values.clone());
        if let Some(limit) = self.publishing_limit {
            settings.publishing_limit = Some(limit);
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    /// Placeholders without a binding are an error.
    #[default]
    Strict,
    /// Placeholders without a binding are left in the text.
    Lenient,
}

#[derive(Debug, Clone)]
pub struct TemplateResolver {
    catalog: TemplateCatalog,
    mode: ResolveMode,
}

impl TemplateResolver {
    pub fn new(catalog: TemplateCatalog) -> Self {
        Self {
            catalog,
            mode: ResolveMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ResolveMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ResolveMode {
        self.mode
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// Substitute `bindings` into the template named `name`.
    ///
    /// Substitution is a single left-to-right pass, so a bound value that
    /// itself contains `{{...}}` is never expanded again.
    pub fn resolve(
        &self,
        name: &str,
        bindings: &TemplateBindings,
    ) -> Result<QueryDescriptor, TemplateError> {
        let text = self
            .catalog
            .get(name)
            .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))?;

        let mut out = String::with_capacity(text.len());
        for segment in Segments::new(text) {
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Token { name: token, raw } => match bindings.get(token) {
                    Some(value) => out.push_str(&value.to_string()),
                    None => match self.mode {
                        ResolveMode::Strict => {
                            return Err(TemplateError::UnboundToken {
                                template: name.to_string(),
                                token: token.to_string(),
                            })
                        }
                        ResolveMode::Lenient => {
                            tracing::debug!(
                                "[TemplateResolver] Leaving unbound token {} in '{}'",
                                raw,
                                name
                            );
                            out.push_str(raw);
                        }
                    },
                },
            }
        }

        let query_values = bindings
            .iter()
            .map(|(token, value)| (format!("{}{}{}", OPEN, token, CLOSE), value.to_string()))
            .collect();

        Ok(QueryDescriptor {
            query_name: name.to_string(),
            query_values,
            query_text: out,
            publishing_limit: None,
        })
    }

    /// Recover the token values from a text resolved from template `name`.
    ///
    /// Each value is matched up to the next literal segment of the template,
    /// so recovery is exact when values do not contain that segment.
    pub fn recover(&self, name: &str, resolved: &str) -> Option<BTreeMap<String, String>> {
        let text = self.catalog.get(name)?;
        let segments: Vec<Segment<'_>> = Segments::new(text).collect();
        let mut values = BTreeMap::new();
        let mut rest = resolved;

        for (idx, segment) in segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => rest = rest.strip_prefix(lit)?,
                Segment::Token { name: token, .. } => {
                    let end = match segments.get(idx + 1) {
                        Some(Segment::Literal(next)) => rest.find(next)?,
                        _ => rest.len(),
                    };
                    let value = &rest[..end];
                    if let Some(previous) = values.get(*token) {
                        if previous != value {
                            return None;
                        }
                    }
                    values.insert(token.to_string(), value.to_string());
                    rest = &rest[end..];
                }
            }
        }

        rest.is_empty().then_some(values)
    }
}

/// Distinct placeholder names of `text` in order of first appearance.
pub fn placeholders(text: &str) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    for segment in Segments::new(text) {
        if let Segment::Token { name, .. } = segment {
            if !seen.iter().any(|s| s == name) {
                seen.push(name.to_string());
            }
        }
    }
    seen
}

enum Segment<'a> {
    Literal(&'a str),
    Token { name: &'a str, raw: &'a str },
}

/// Splits template text into literal runs and `{{token}}` placeholders. An
/// opening `{{` without a matching `}}` is literal text.
struct Segments<'a> {
    rest: &'a str,
}

impl<'a> Segments<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }

        let rest = self.rest;
        let Some(open) = rest.find(OPEN) else {
            self.rest = "";
            return Some(Segment::Literal(rest));
        };
        if open > 0 {
            self.rest = &rest[open..];
            return Some(Segment::Literal(&rest[..open]));
        }

        let after_open = &rest[OPEN.len()..];
        match after_open.find(CLOSE) {
            Some(close) if is_token_name(&after_open[..close]) => {
                let raw_len = OPEN.len() + close + CLOSE.len();
                self.rest = &rest[raw_len..];
                Some(Segment::Token {
                    name: &after_open[..close],
                    raw: &rest[..raw_len],
                })
            }
            _ => {
                // Not a placeholder: emit the braces as text and keep scanning.
                self.rest = after_open;
                Some(Segment::Literal(&rest[..OPEN.len()]))
            }
        }
    }
}

fn is_token_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    const USAGE: &str = "from ApiUsage on timestamp >= {{from}} and timestamp <= {{to}} \
                         per '{{per}}' {{filterCondition}} limit {{limit}}";

    fn resolver() -> TemplateResolver {
        TemplateResolver::new(TemplateCatalog::new().with_template("apiusagequery", USAGE))
    }

    #[test]
    fn test_resolve_substitutes_every_occurrence() {
        let catalog = TemplateCatalog::new().with_template("q", "{{a}} and {{a}}");
        let resolver = TemplateResolver::new(catalog);
        let out = resolver
            .resolve("q", &TemplateBindings::new().bind("a", "x"))
            .unwrap();
        assert_eq!(out.query_text, "x and x");
    }

    #[test]
    fn test_resolve_builds_query_values() {
        let bindings = TemplateBindings::new()
            .bind("from", TokenValue::Timestamp(1_000))
            .bind("to", TokenValue::Timestamp(2_000))
            .bind("per", "day")
            .bind("filterCondition", FilterExpression::empty())
            .bind("limit", 5_i64);
        let out = resolver().resolve("apiusagequery", &bindings).unwrap();

        assert_eq!(
            out.query_text,
            "from ApiUsage on timestamp >= 1000 and timestamp <= 2000 per 'day'  limit 5"
        );
        assert_eq!(out.query_values.get("{{limit}}").map(String::as_str), Some("5"));
        assert_eq!(out.query_values.get("{{filterCondition}}").map(String::as_str), Some(""));
        assert_eq!(out.query_name, "apiusagequery");
    }

    #[test]
    fn test_unknown_template() {
        let err = resolver()
            .resolve("missing", &TemplateBindings::new())
            .unwrap_err();
        assert_eq!(err, TemplateError::UnknownTemplate("missing".into()));
    }

    #[test]
    fn test_strict_rejects_unbound_token() {
        let bindings = TemplateBindings::new().bind("from", TokenValue::Timestamp(1));
        let err = resolver().resolve("apiusagequery", &bindings).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnboundToken {
                template: "apiusagequery".into(),
                token: "to".into()
            }
        );
    }

    #[test]
    fn test_lenient_keeps_unbound_token() {
        let resolver = resolver().with_mode(ResolveMode::Lenient);
        let bindings = TemplateBindings::new().bind("per", "hour");
        let out = resolver.resolve("apiusagequery", &bindings).unwrap();
        assert!(out.query_text.contains("{{from}}"));
        assert!(out.query_text.contains("per 'hour'"));
    }

    #[test]
    fn test_values_are_not_expanded_twice() {
        let catalog = TemplateCatalog::new().with_template("q", "{{a}}|{{b}}");
        let resolver = TemplateResolver::new(catalog);
        let bindings = TemplateBindings::new().bind("a", "{{b}}").bind("b", "y");
        assert_eq!(resolver.resolve("q", &bindings).unwrap().query_text, "{{b}}|y");
    }

    #[test]
    fn test_rebinding_replaces_in_place() {
        let bindings = TemplateBindings::new().bind("a", "1").bind("b", "2").bind("a", "3");
        let order: Vec<_> = bindings.iter().map(|(t, v)| (t.to_string(), v.to_string())).collect();
        assert_eq!(order, vec![("a".into(), "3".into()), ("b".into(), "2".into())]);
    }

    #[test]
    fn test_placeholders_are_distinct_and_ordered() {
        assert_eq!(
            placeholders("{{b}} {{a}} {{b}} {{ bad }} {{open"),
            vec!["b".to_string(), "a".to_string()]
        );
    }

    #[test]
    fn test_recover_bindings() {
        let bindings = TemplateBindings::new()
            .bind("from", TokenValue::Timestamp(10))
            .bind("to", TokenValue::Timestamp(20))
            .bind("per", "month")
            .bind("filterCondition", "AND (apiName=='a')")
            .bind("limit", 3_i64);
        let resolver = resolver();
        let out = resolver.resolve("apiusagequery", &bindings).unwrap();
        let recovered = resolver.recover("apiusagequery", &out.query_text).unwrap();
        assert_eq!(recovered.get("per").map(String::as_str), Some("month"));
        assert_eq!(
            recovered.get("filterCondition").map(String::as_str),
            Some("AND (apiName=='a')")
        );
        assert_eq!(recovered.len(), 5);
    }
}
