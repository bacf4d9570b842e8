use apim_widgets_api::WidgetView;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::channel::ProviderError;
use crate::config::ConfigError;
use crate::projection::ProjectionError;
use crate::query::{FilterError, TemplateError};
use crate::state::StateError;

/// Anything that can go wrong while a widget refreshes.
#[derive(Debug, Error)]
pub enum WidgetError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    State(#[from] StateError),
}

pub type Result<T> = std::result::Result<T, WidgetError>;

impl WidgetError {
    /// The view a widget falls back to. Configuration problems are permanent,
    /// backend error bodies are shown, everything else reads as no data.
    pub fn into_view(self) -> WidgetView {
        match self {
            WidgetError::Config(_) => WidgetView::faulty_configuration(),
            WidgetError::Catalog(e) => WidgetView::proxy_error(e.display_message()),
            _ => WidgetView::no_data(),
        }
    }
}
