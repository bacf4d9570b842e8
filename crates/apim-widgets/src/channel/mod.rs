//! Data-provider channel: query execution, cancellable subscriptions and the
//! parameter publisher.

pub mod fake;
pub mod provider;
pub mod publisher;
pub mod subscription;

pub use fake::FakeDataProvider;
pub use provider::{DataProvider, ProviderError, ProviderResult, QueryChannel};
pub use publisher::{MergeOutcome, ParameterBus, ParameterMessage, PublishedParameters};
pub use subscription::Subscription;
