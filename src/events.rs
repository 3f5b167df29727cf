//! Synchronous observer list for hub events.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

/// Token returned by [`Notifier::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(Uuid);

/// Delivers one event type to every subscriber, in registration order.
///
/// Delivery runs on the caller of [`Notifier::notify`]. Nothing is buffered:
/// a subscriber only sees events raised after it registered.
pub struct Notifier<T> {
    subscribers: Mutex<Vec<(Subscription, Callback<T>)>>,
}

impl<T> Default for Notifier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Notifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl<T> Notifier<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe<F: Fn(&T) + Send + Sync + 'static>(&self, callback: F) -> Subscription {
        let token = Subscription(Uuid::new_v4());
        self.lock().push((token, Arc::new(callback)));
        token
    }

    /// Returns false if the token was not (or no longer) registered.
    pub fn unsubscribe(&self, token: Subscription) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|(id, _)| *id != token);
        subscribers.len() != before
    }

    pub fn notify(&self, event: &T) {
        // Snapshot so callbacks may (un)subscribe without deadlocking.
        let callbacks: Vec<Callback<T>> = self.lock().iter().map(|(_, cb)| cb.clone()).collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(Subscription, Callback<T>)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
