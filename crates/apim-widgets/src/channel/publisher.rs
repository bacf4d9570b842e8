//! Parameters published by other widgets (date-time range picker, API
//! selectors) and how a widget folds them into its state.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::projection::timefmt::Granularity;
use crate::query::filter::{Dimension, Selection};

/// A message on the publisher channel. Every field is optional: the range
/// picker sends only the time fields, selectors only `dm` and `op`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity: Option<String>,
    /// Drill-down dimension, e.g. `api`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<Vec<Selection>>,
}

impl ParameterMessage {
    pub fn time_range(from: i64, to: i64, granularity: Granularity) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            granularity: Some(granularity.as_str().to_string()),
            ..Self::default()
        }
    }

    pub fn selection(dimension: Dimension, op: Vec<Selection>) -> Self {
        Self {
            dm: Some(dimension.as_str().to_string()),
            op: Some(op),
            ..Self::default()
        }
    }

    pub fn with_time_range(mut self, from: i64, to: i64, granularity: Granularity) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self.granularity = Some(granularity.as_str().to_string());
        self
    }
}

/// What a merge changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Neither a dimension nor a time range: nothing to do.
    Ignored,
    Updated {
        /// Whether the widget should show a loading state while re-querying.
        show_loading: bool,
    },
}

/// The parameters a widget has accumulated so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishedParameters {
    pub dimension: Option<Dimension>,
    pub selections: Vec<Selection>,
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub granularity: Granularity,
}

impl PublishedParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `msg` in. A dimension with a time range replaces both, a bare
    /// dimension keeps the time range, a bare time range keeps the
    /// selections. `sync` is the range picker's auto-sync flag; synced time
    /// updates refresh silently.
    pub fn merge(&mut self, msg: &ParameterMessage, sync: bool) -> MergeOutcome {
        let dimension = msg.dm.as_deref().and_then(|dm| match dm.parse::<Dimension>() {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::warn!("[PublishedParameters] {}", e);
                None
            }
        });
        let has_time = msg.from.is_some();

        match (dimension, has_time) {
            (Some(d), true) => {
                self.set_selection(d, msg);
                self.set_time(msg);
                MergeOutcome::Updated { show_loading: !sync }
            }
            (Some(d), false) => {
                self.set_selection(d, msg);
                MergeOutcome::Updated { show_loading: true }
            }
            (None, true) => {
                self.set_time(msg);
                MergeOutcome::Updated { show_loading: !sync }
            }
            (None, false) => MergeOutcome::Ignored,
        }
    }

    fn set_selection(&mut self, dimension: Dimension, msg: &ParameterMessage) {
        self.dimension = Some(dimension);
        self.selections = msg.op.clone().unwrap_or_default();
    }

    fn set_time(&mut self, msg: &ParameterMessage) {
        self.from = msg.from;
        self.to = msg.to;
        self.granularity = msg
            .granularity
            .as_deref()
            .map(Granularity::from_name)
            .unwrap_or_default();
    }

    pub fn time_range(&self) -> Option<(i64, i64)> {
        Some((self.from?, self.to?))
    }

    pub fn has_time_range(&self) -> bool {
        self.time_range().is_some()
    }

    pub fn has_dimension(&self) -> bool {
        self.dimension.is_some()
    }
}

/// Fan-out of parameter messages to every listening widget.
#[derive(Debug, Clone)]
pub struct ParameterBus {
    sender: broadcast::Sender<ParameterMessage>,
}

impl ParameterBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to current listeners; returns how many received it.
    pub fn publish(&self, msg: ParameterMessage) -> usize {
        self.sender.send(msg).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ParameterMessage> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ParameterBus {
    fn default() -> Self {
        Self::new(64)
    }
}
