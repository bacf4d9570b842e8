//! Query construction: filter conditions, literal quoting and template
//! resolution.

pub mod filter;
pub mod literal;
pub mod template;

pub use filter::{
    split_resource, ApiSelection, ClauseStyle, Dimension, FilterBuilder, FilterError,
    FilterExpression, FilterSchema, ResourceRef, Selection, ALL,
};
pub use template::{
    placeholders, QueryDescriptor, ResolveMode, TemplateBindings, TemplateCatalog, TemplateError,
    TemplateResolver, TokenValue,
};
