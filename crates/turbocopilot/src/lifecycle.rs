//! Listener registration with explicit and RAII unsubscription
//!
//! Provides:
//! - [`Subscription`]: handle returned by `Session::on` and
//!   `CopilotClient::on_lifecycle`; call [`Subscription::unsubscribe`] to stop
//! - [`SubscriptionGuard`]: unsubscribes when dropped
//!
//! # Example
//!
//! ```ignore
//! // Option 1: explicit
//! let subscription = session.on(|event| println!("{}", event.event_type));
//! // ...
//! subscription.unsubscribe();
//!
//! // Option 2: RAII
//! {
//!     let _guard = session.on(|event| println!("{}", event.event_type)).into_guard();
//!     // ... listen ...
//! } // Unsubscribed on drop
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::warn;

/// Shared listener callback
pub(crate) type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct ListenerTable<E> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener<E>)>>,
}

/// Ordered set of listeners
///
/// Listeners are called on a snapshot, never under the lock, so a listener may
/// subscribe or unsubscribe from inside its callback.
pub(crate) struct ListenerSet<E> {
    table: Arc<ListenerTable<E>>,
}

impl<E> Clone for ListenerSet<E> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
        }
    }
}

impl<E: 'static> ListenerSet<E> {
    pub(crate) fn new() -> Self {
        Self {
            table: Arc::new(ListenerTable {
                next_id: AtomicU64::new(1),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a listener
    pub(crate) fn add(&self, listener: Listener<E>) -> Subscription {
        let id = self.table.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut listeners) = self.table.listeners.lock() {
            listeners.push((id, listener));
        }

        let table: Weak<ListenerTable<E>> = Arc::downgrade(&self.table);
        Subscription::new(move || {
            if let Some(table) = table.upgrade()
                && let Ok(mut listeners) = table.listeners.lock()
            {
                listeners.retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }

    /// Current listeners, in registration order
    pub(crate) fn snapshot(&self) -> Vec<Listener<E>> {
        self.table
            .listeners
            .lock()
            .map(|listeners| listeners.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }

    /// Deliver one event to every listener
    ///
    /// A panicking listener is logged and skipped; the others still run.
    pub(crate) fn emit(&self, event: &E) {
        for listener in self.snapshot() {
            if std::panic::catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!("Event listener panicked");
            }
        }
    }

    /// Remove every listener
    pub(crate) fn clear(&self) {
        if let Ok(mut listeners) = self.table.listeners.lock() {
            listeners.clear();
        }
    }

    /// Number of registered listeners
    pub(crate) fn len(&self) -> usize {
        self.table
            .listeners
            .lock()
            .map(|listeners| listeners.len())
            .unwrap_or(0)
    }
}

/// Handle to a registered listener
///
/// Dropping the handle keeps the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) or convert it with
/// [`into_guard`](Self::into_guard).
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new<F>(unsubscribe: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Stop receiving events
    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }

    /// Unsubscribe automatically when the guard drops
    pub fn into_guard(mut self) -> SubscriptionGuard {
        match self.unsubscribe.take() {
            Some(unsubscribe) => SubscriptionGuard::new(unsubscribe),
            None => SubscriptionGuard::new(|| {}),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// RAII guard for automatic cleanup
///
/// Runs its cleanup when dropped, even if the scope exits early.
pub struct SubscriptionGuard {
    on_drop: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl SubscriptionGuard {
    /// Create a guard with a cleanup function
    pub fn new<F>(on_drop: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            on_drop: Some(Box::new(on_drop)),
        }
    }

    /// Consume the guard without running cleanup
    pub fn into_inner(mut self) -> Option<Box<dyn FnOnce() + Send + Sync>> {
        self.on_drop.take()
    }

    /// Manually run cleanup and consume the guard
    pub fn cleanup(mut self) {
        if let Some(cleanup) = self.on_drop.take() {
            cleanup();
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(cleanup) = self.on_drop.take() {
            cleanup();
        }
    }
}
