use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A widget's in-flight query work.
///
/// The task is raced against a cancellation token, so unsubscribing drops the
/// pending query at its next await point and its result is never delivered.
/// Dropping the handle unsubscribes.
pub struct Subscription {
    id: Uuid,
    widget: String,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Spawn `work` for `widget`. The closure receives the subscription's
    /// token for work that wants to poll it between steps.
    pub fn spawn<F, Fut>(widget: impl Into<String>, work: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let widget = widget.into();
        let token = CancellationToken::new();
        let fut = work(token.clone());
        let token_for_task = token.clone();
        let label = widget.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token_for_task.cancelled() => {
                    tracing::debug!("[Subscription] {} ({}) cancelled", label, id);
                }
                _ = fut => {}
            }
        });

        tracing::debug!("[Subscription] {} ({}) subscribed", widget, id);
        Self {
            id,
            widget,
            token,
            task: Some(task),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn widget(&self) -> &str {
        &self.widget
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Neither cancelled nor finished.
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn unsubscribe(&self) {
        self.token.cancel();
    }

    /// Cancel and wait (bounded) for the task to wind down.
    pub async fn unsubscribe_and_wait(mut self, grace: Duration) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            match tokio::time::timeout(grace, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("[Subscription] {} task panicked: {}", self.widget, e),
                Err(_) => tracing::warn!("[Subscription] {} did not stop within {:?}", self.widget, grace),
            }
        }
    }

    /// Wait for the work to complete without cancelling it.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("[Subscription] {} task panicked: {}", self.widget, e);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("widget", &self.widget)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_prevents_completion() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let sub = Subscription::spawn("w", move |_| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            flag.store(true, Ordering::SeqCst);
        });
        assert!(sub.is_active());

        sub.unsubscribe();
        assert!(!sub.is_active());
        sub.unsubscribe_and_wait(Duration::from_secs(1)).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!done.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let sub = Subscription::spawn("w", move |_| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            flag.store(true, Ordering::SeqCst);
        });
        drop(sub);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_join_runs_to_completion() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let sub = Subscription::spawn("w", move |_| async move {
            flag.store(true, Ordering::SeqCst);
        });
        let first = sub.id();
        sub.join().await;
        assert!(done.load(Ordering::SeqCst));

        let other = Subscription::spawn("w", |_| async {});
        assert_ne!(first, other.id());
    }
}
