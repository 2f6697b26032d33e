#![forbid(unsafe_code)]

//! Cancellable registrations.
//!
//! A [`Subscription`] is a shared cancellation flag plus the cleanup actions
//! that must run when it closes. It closes either because the consumer called
//! [`unsubscribe`](Subscription::unsubscribe) or because the producer issued a
//! terminal signal.
//!
//! Dropping a `Subscription` handle does not cancel it. View-model code that
//! wants teardown-on-drop wraps it in a [`SubscriptionGuard`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_subscription_id() -> u64 {
    NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed)
}

type Teardown = Box<dyn FnOnce()>;

struct SubscriptionInner {
    id: u64,
    closed: Cell<bool>,
    teardowns: RefCell<Vec<Teardown>>,
}

/// Handle to a live (or closed) registration.
///
/// Cloning shares the same flag: closing any clone closes them all.
#[derive(Clone)]
pub struct Subscription {
    inner: Rc<SubscriptionInner>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.id)
            .field("closed", &self.inner.closed.get())
            .field("teardowns", &self.inner.teardowns.borrow().len())
            .finish()
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscription {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(SubscriptionInner {
                id: next_subscription_id(),
                closed: Cell::new(false),
                teardowns: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Unique identifier (for tracing/logging).
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Register a cleanup action. On an already-closed subscription it runs
    /// immediately.
    pub fn add(&self, teardown: impl FnOnce() + 'static) {
        if self.is_closed() {
            teardown();
            return;
        }
        self.inner.teardowns.borrow_mut().push(Box::new(teardown));
    }

    /// Close `child` whenever `self` closes.
    pub fn add_child(&self, child: Subscription) {
        self.add(move || {
            child.unsubscribe();
        });
    }

    /// Close the subscription and run its cleanup actions in registration
    /// order.
    ///
    /// Returns `true` only for the call that actually closed it.
    pub fn unsubscribe(&self) -> bool {
        if self.inner.closed.replace(true) {
            return false;
        }
        debug!(message = "subscription.close", subscription_id = self.inner.id);
        let teardowns = std::mem::take(&mut *self.inner.teardowns.borrow_mut());
        for teardown in teardowns {
            teardown();
        }
        true
    }

    /// Wrap in a guard that unsubscribes on drop.
    #[must_use]
    pub fn guard(self) -> SubscriptionGuard {
        SubscriptionGuard { subscription: self }
    }
}

/// RAII guard that automatically unsubscribes on drop.
#[derive(Debug)]
#[must_use = "dropping the guard cancels the subscription immediately"]
pub struct SubscriptionGuard {
    subscription: Subscription,
}

impl SubscriptionGuard {
    #[must_use]
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}
