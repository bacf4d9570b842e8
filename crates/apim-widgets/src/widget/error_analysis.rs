//! Error counts over time for one resource (or a set of GraphQL operations)
//! of one API version.
//!
//! A refresh walks four steps: the API catalog, the id of every catalogued
//! API, the resources of the selected API and finally the error counts. The
//! API, version and resource choices persist under the `erroranalysis` key
//! and are reset to the first valid entry when they no longer exist.

use std::collections::BTreeMap;

use apim_widgets_api::{Record, WidgetView};
use async_trait::async_trait;

use super::{AnalyticsWidget, WidgetContext};
use crate::channel::PublishedParameters;
use crate::error::Result;
use crate::projection::{project, schemas};
use crate::query::{
    split_resource, ApiSelection, ClauseStyle, Dimension, FilterBuilder, FilterSchema, ResourceRef, Selection,
    TemplateBindings, TokenValue,
};
use crate::state::params::ERROR_ANALYSIS_KEY;
use crate::state::{ErrorAnalysisParams, GlobalStateStore};

pub const NAME: &str = "APIMApiErrorAnalysis";
const API_ID_QUERY: &str = "apiidquery";
const RESOURCE_QUERY: &str = "resourcequery";
const MAIN_QUERY: &str = "mainquery";

pub const API_OPTIONS: &str = "apis";
pub const VERSION_OPTIONS: &str = "versions";
pub const RESOURCE_OPTIONS: &str = "resources";

/// Catalogued APIs resolved to their analytics ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiIndex {
    /// Distinct names, sorted case-insensitively.
    pub names: Vec<String>,
    /// Versions per name, in result order.
    pub versions: BTreeMap<String, Vec<String>>,
    rows: Vec<(String, String, String)>,
}

impl ApiIndex {
    /// Build from `[id, name, version]` records.
    pub fn from_records(records: &[Record]) -> Self {
        let mut index = Self::default();
        for record in records {
            let field = |name: &str| record.get(name).map(|v| v.to_string()).unwrap_or_default();
            let (id, name, version) = (field("id"), field("name"), field("version"));
            if !index.names.contains(&name) {
                index.names.push(name.clone());
            }
            index.versions.entry(name.clone()).or_default().push(version.clone());
            index.rows.push((id, name, version));
        }
        index.names.sort_by_key(|n| n.to_lowercase());
        index
    }

    pub fn versions_of(&self, api: &str) -> &[String] {
        self.versions.get(api).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn id_of(&self, api: &str, version: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|(_, n, v)| n == api && v == version)
            .map(|(id, _, _)| id.as_str())
    }

    /// Replace choices that are missing or no longer exist with the first
    /// valid entry. Returns whether anything changed.
    pub fn normalize(&self, params: &mut ErrorAnalysisParams) -> bool {
        let before = params.clone();
        if params.api_selected.is_empty() || !self.names.contains(&params.api_selected) {
            if let Some(first) = self.names.first() {
                params.api_selected = first.clone();
            }
        }
        let versions = self.versions_of(&params.api_selected);
        if params.api_version.is_empty() || !versions.contains(&params.api_version) {
            params.api_version = versions.first().cloned().unwrap_or_default();
        }
        *params != before
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApiErrorAnalysis;

impl ApiErrorAnalysis {
    pub fn new() -> Self {
        Self
    }

    /// Apply a selector change to the persisted choices, e.g.
    /// `|p| p.select_api("PizzaShack")`.
    pub fn update_selection(
        store: &GlobalStateStore,
        change: impl FnOnce(&mut ErrorAnalysisParams),
    ) -> Result<ErrorAnalysisParams> {
        let mut params = ErrorAnalysisParams::load(store);
        change(&mut params);
        params.save(store)?;
        Ok(params)
    }

    async fn api_index(&self, ctx: &WidgetContext) -> Result<Option<ApiIndex>> {
        let apis = ctx.catalog().list_apis().await?;
        if apis.is_empty() {
            tracing::debug!("[ApiErrorAnalysis] API catalog is empty");
            return Ok(None);
        }

        // Table column names compared with the stream operator.
        let schema = FilterSchema {
            style: ClauseStyle::Stream,
            ..FilterSchema::sql()
        };
        let selections: Vec<Selection> = apis
            .iter()
            .map(|api| ApiSelection::new(api.name.clone()).with_version(api.version.clone()).into())
            .collect();
        let condition = FilterBuilder::new(schema).any_of(Dimension::Api, &selections)?;

        let bindings = TemplateBindings::new().bind("apiCondition", condition);
        let rows = ctx.run_query(API_ID_QUERY, &bindings, None).await?;
        let records = project(Some(&rows), &schemas::api_ids())?;
        Ok(Some(ApiIndex::from_records(&records)))
    }

    async fn resources(&self, ctx: &WidgetContext, api_id: &str) -> Result<Vec<String>> {
        let bindings = TemplateBindings::new().bind("apiID", api_id);
        let rows = ctx.run_query(RESOURCE_QUERY, &bindings, None).await?;
        let records = project(Some(&rows), &schemas::api_resources())?;
        Ok(records
            .iter()
            .filter_map(|r| Some(ResourceRef::new(r.get("resource")?.to_string(), r.get("method")?.to_string())))
            .map(|r| r.display_value())
            .collect())
    }

    /// `{{querystring}}` and `{{numberOfCommas}}` for the selection.
    fn main_condition(params: &ErrorAnalysisParams) -> Result<(String, i64)> {
        let builder = FilterBuilder::new(FilterSchema::stream());
        let (resources, count) = if !params.operation_selected.is_empty() {
            let operations = params
                .operation_selected
                .iter()
                .map(|op| split_resource(op))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            builder.operations_condition(&operations)?
        } else {
            let resource = split_resource(&params.resource_selected)?;
            (builder.resource_condition(&resource), 1)
        };
        let condition = builder.api_scoped_condition(
            &params.api_selected,
            &params.api_version,
            &format!("({})", resources),
        );
        Ok((condition, count as i64 - 1))
    }
}

#[async_trait]
impl AnalyticsWidget for ApiErrorAnalysis {
    fn name(&self) -> &'static str {
        NAME
    }

    fn state_key(&self) -> Option<&'static str> {
        Some(ERROR_ANALYSIS_KEY)
    }

    fn is_ready(&self, params: &PublishedParameters) -> bool {
        params.has_time_range()
    }

    async fn refresh(&self, ctx: &WidgetContext, params: &PublishedParameters) -> Result<WidgetView> {
        let Some((from, to)) = params.time_range() else {
            return Ok(WidgetView::no_data());
        };
        let Some(index) = self.api_index(ctx).await? else {
            return Ok(WidgetView::no_data());
        };

        let mut selection = ErrorAnalysisParams::load(ctx.store());
        if index.normalize(&mut selection) {
            tracing::debug!(
                "[ApiErrorAnalysis] Selection reset to {} {}",
                selection.api_selected,
                selection.api_version
            );
            selection.save(ctx.store())?;
        }

        let apis = index.names.as_slice();
        let versions = index.versions_of(&selection.api_selected);
        let Some(api_id) = index.id_of(&selection.api_selected, &selection.api_version) else {
            return Ok(options_view(Vec::new(), apis, versions, Vec::new()));
        };
        let resources = self.resources(ctx, api_id).await?;
        if !selection.is_complete() {
            return Ok(options_view(Vec::new(), apis, versions, resources));
        }

        let (querystring, commas) = Self::main_condition(&selection)?;
        let bindings = TemplateBindings::new()
            .bind("timeFrom", TokenValue::Timestamp(from))
            .bind("timeTo", TokenValue::Timestamp(to))
            .bind("per", params.granularity.as_str())
            .bind("querystring", querystring)
            .bind("numberOfCommas", commas);
        let rows = ctx.run_query(MAIN_QUERY, &bindings, None).await?;
        let records = project(Some(&rows), &schemas::error_analysis())?;
        selection.save(ctx.store())?;

        Ok(options_view(records, apis, versions, resources))
    }
}

fn options_view(records: Vec<Record>, apis: &[String], versions: &[String], resources: Vec<String>) -> WidgetView {
    WidgetView::ready(records)
        .with_options(API_OPTIONS, apis.to_vec())
        .with_options(VERSION_OPTIONS, versions.to_vec())
        .with_options(RESOURCE_OPTIONS, resources)
}
