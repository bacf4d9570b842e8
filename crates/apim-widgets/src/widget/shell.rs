use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use apim_widgets_api::WidgetView;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use super::{AnalyticsWidget, WidgetContext, WidgetServices};
use crate::channel::{MergeOutcome, ParameterBus, ParameterMessage, PublishedParameters, Subscription};
use crate::state::DateTimeRangeParams;

/// How long unmount waits for an in-flight query to wind down.
const UNMOUNT_GRACE: Duration = Duration::from_secs(5);

/// A mounted widget.
///
/// Every parameter change replaces the pending query task. Views are
/// published over a watch channel and tagged with the generation of the
/// change that produced them, so a task that lost the race never overwrites
/// a newer view.
pub struct WidgetShell {
    id: Uuid,
    widget: Arc<dyn AnalyticsWidget>,
    context: Option<Arc<WidgetContext>>,
    params: PublishedParameters,
    views: Arc<watch::Sender<WidgetView>>,
    generation: Arc<AtomicU64>,
    subscription: Option<Subscription>,
}

impl WidgetShell {
    /// Load the widget's configuration. Without one the widget is stuck in
    /// the faulty-configuration view and ignores all input.
    pub async fn mount(widget: Arc<dyn AnalyticsWidget>, services: &WidgetServices) -> Self {
        let (views, _) = watch::channel(WidgetView::loading());
        let mut shell = Self {
            id: Uuid::new_v4(),
            widget,
            context: None,
            params: PublishedParameters::new(),
            views: Arc::new(views),
            generation: Arc::new(AtomicU64::new(0)),
            subscription: None,
        };

        let name = shell.widget.name();
        match services.configs.load(name).await {
            Ok(configuration) => {
                tracing::info!("[WidgetShell] Mounted {} ({})", name, shell.id);
                shell.context = Some(Arc::new(WidgetContext::new(services.clone(), configuration)));
                if shell.widget.is_ready(&shell.params) {
                    shell.start(true);
                }
            }
            Err(e) => {
                tracing::warn!("[WidgetShell] {} has no usable configuration: {}", name, e);
                shell.views.send_replace(WidgetView::faulty_configuration());
            }
        }
        shell
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.widget.name()
    }

    pub fn is_faulty(&self) -> bool {
        self.context.is_none()
    }

    pub fn context(&self) -> Option<&WidgetContext> {
        self.context.as_deref()
    }

    pub fn params(&self) -> &PublishedParameters {
        &self.params
    }

    pub fn views(&self) -> watch::Receiver<WidgetView> {
        self.views.subscribe()
    }

    pub fn current_view(&self) -> WidgetView {
        self.views.borrow().clone()
    }

    /// Fold a published message in and re-query if it changed anything.
    pub fn publish(&mut self, msg: &ParameterMessage) -> MergeOutcome {
        let Some(ctx) = self.context.as_ref() else {
            tracing::debug!("[WidgetShell] {} ignores parameters: faulty configuration", self.name());
            return MergeOutcome::Ignored;
        };
        let sync = DateTimeRangeParams::load(ctx.store()).sync;
        let outcome = self.params.merge(msg, sync);
        if let MergeOutcome::Updated { show_loading } = outcome {
            self.start(show_loading);
        }
        outcome
    }

    /// Re-query with the current parameters, e.g. after a selection or limit
    /// change persisted in the store.
    pub fn refresh(&mut self) {
        if self.context.is_some() {
            self.start(true);
        }
    }

    fn start(&mut self, show_loading: bool) {
        let Some(ctx) = self.context.clone() else {
            return;
        };
        if let Some(previous) = self.subscription.take() {
            previous.unsubscribe();
        }

        let ready = self.widget.is_ready(&self.params);
        let generation = &self.generation;
        let mut current = 0;
        // The generation moves while the view lock is held, so a task
        // checking it under the same lock cannot slip a stale view in.
        self.views.send_if_modified(|view| {
            current = generation.fetch_add(1, Ordering::SeqCst) + 1;
            if !ready {
                *view = WidgetView::no_data();
                true
            } else if show_loading {
                *view = WidgetView::loading();
                true
            } else {
                false
            }
        });
        if !ready {
            tracing::debug!("[WidgetShell] {} is waiting for parameters", self.name());
            return;
        }

        let widget = self.widget.clone();
        let params = self.params.clone();
        let views = self.views.clone();
        let generation = self.generation.clone();
        let name = widget.name();

        self.subscription = Some(Subscription::spawn(name, move |_| async move {
            loop {
                let view = match widget.refresh(&ctx, &params).await {
                    Ok(view) => view,
                    Err(e) => {
                        tracing::warn!("[WidgetShell] {} refresh failed: {}", name, e);
                        e.into_view()
                    }
                };
                let delivered = views.send_if_modified(|slot| {
                    if generation.load(Ordering::SeqCst) == current {
                        *slot = view;
                        true
                    } else {
                        false
                    }
                });
                if !delivered {
                    tracing::debug!("[WidgetShell] {} dropped a stale view", name);
                    break;
                }
                match widget.refresh_interval() {
                    Some(period) => tokio::time::sleep(period).await,
                    None => break,
                }
            }
        }));
    }

    /// Cancel pending work and release the widget.
    pub async fn unmount(mut self) {
        let generation = &self.generation;
        // Same lock as delivery: once this returns no task can publish.
        self.views.send_if_modified(|_| {
            generation.fetch_add(1, Ordering::SeqCst);
            false
        });
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe_and_wait(UNMOUNT_GRACE).await;
        }
        tracing::info!("[WidgetShell] Unmounted {} ({})", self.name(), self.id);
    }

    /// Hand the shell to a task that feeds it every message on `bus`.
    pub fn attach(self, bus: &ParameterBus) -> AttachedWidget {
        let mut messages = bus.subscribe();
        let views = self.views();
        let name = self.name();

        let listener = Subscription::spawn(name, move |_| async move {
            let mut shell = self;
            loop {
                match messages.recv().await {
                    Ok(msg) => {
                        shell.publish(&msg);
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!("[WidgetShell] {} missed {} parameter messages", name, missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            shell.unmount().await;
        });

        AttachedWidget {
            name,
            views,
            listener,
        }
    }
}

impl std::fmt::Debug for WidgetShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetShell")
            .field("id", &self.id)
            .field("widget", &self.name())
            .field("params", &self.params)
            .field("faulty", &self.is_faulty())
            .finish()
    }
}

/// A shell driven by a [`ParameterBus`].
#[derive(Debug)]
pub struct AttachedWidget {
    name: &'static str,
    views: watch::Receiver<WidgetView>,
    listener: Subscription,
}

impl AttachedWidget {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn views(&self) -> watch::Receiver<WidgetView> {
        self.views.clone()
    }

    pub fn current_view(&self) -> WidgetView {
        self.views.borrow().clone()
    }

    /// Stop listening; the shell and its pending query are dropped.
    pub async fn detach(self) {
        self.listener.unsubscribe_and_wait(UNMOUNT_GRACE).await;
    }
}
