//! Ordered fan-out of auth change notifications.
//!
//! DESIGN
//! ======
//! Each subscriber owns an unbounded queue, so a slow consumer never causes a
//! notification to be dropped or reordered. Subscriptions unregister
//! themselves on drop; `unsubscribe` is the explicit spelling of the same.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;
use tracing::debug;

use super::types::AuthChange;

#[derive(Default)]
struct FeedInner {
    next_id: u64,
    subscribers: Vec<(u64, mpsc::UnboundedSender<AuthChange>)>,
}

/// Registry of live subscriptions for one gateway client.
#[derive(Clone, Default)]
pub struct ChangeFeed {
    inner: Arc<Mutex<FeedInner>>,
}

impl ChangeFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn subscribe(&self) -> AuthSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.next_id += 1;
        let id = inner.next_id;
        inner.subscribers.push((id, tx));
        debug!(subscription = id, "auth change subscription opened");
        AuthSubscription { id, feed: Arc::downgrade(&self.inner), rx }
    }

    /// Deliver `change` to every live subscriber in registration order.
    pub fn emit(&self, change: AuthChange) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(event = %change.event, user_id = change.user_id(), subscribers = inner.subscribers.len(), "auth change");
        inner
            .subscribers
            .retain(|(_, tx)| tx.send(change.clone()).is_ok());
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .len()
    }
}

/// Handle for one subscription. Notifications arrive in emission order.
pub struct AuthSubscription {
    id: u64,
    feed: Weak<Mutex<FeedInner>>,
    rx: mpsc::UnboundedReceiver<AuthChange>,
}

impl AuthSubscription {
    /// Wait for the next notification. `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<AuthChange> {
        self.rx.recv().await
    }

    /// Stop receiving. Dropping the handle is what unregisters it from the feed.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.upgrade() {
            let mut inner = feed.lock().unwrap_or_else(PoisonError::into_inner);
            inner.subscribers.retain(|(id, _)| *id != self.id);
            debug!(subscription = self.id, "auth change subscription closed");
        }
    }
}

#[cfg(test)]
#[path = "feed_test.rs"]
mod tests;
