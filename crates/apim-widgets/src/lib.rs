//! Analytics widgets for the API manager dashboard.
//!
//! ## Modules
//! - `query` - filter conditions, literal quoting, query template resolution
//! - `projection` - row projection, time bucketing, chart and summary shaping
//! - `table` - client-side sort, filter and pagination of projected records
//! - `state` - the global state store and the typed parameters kept in it
//! - `channel` - the query data channel and the parameter publisher bus
//! - `catalog` - the API catalog REST client
//! - `config` - per-widget configuration and runtime settings
//! - `widget` - the seven widgets and the shell running them

pub mod catalog;
pub mod channel;
pub mod config;
pub mod error;
pub mod projection;
pub mod query;
pub mod state;
pub mod table;
pub mod widget;

pub use apim_widgets_api;
pub use error::{Result, WidgetError};
pub use widget::{AnalyticsWidget, WidgetContext, WidgetRegistry, WidgetServices, WidgetShell};
