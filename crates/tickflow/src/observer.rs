#![forbid(unsafe_code)]

//! Consumer-side handlers and the per-subscription delivery gate.
//!
//! Producers never call an [`Observer`] directly. They push into a
//! [`Subscriber`], which owns the observer together with its
//! [`Subscription`] and enforces the delivery contract:
//!
//! 1. `on_next` calls arrive in emission order.
//! 2. At most one terminal call (`on_error` xor `on_complete`).
//! 3. Nothing is delivered after the terminal call or after cancellation,
//!    including signals that were queued before cancellation.
//! 4. A signal raised from inside a handler is queued and delivered once the
//!    running handler returns, never nested inside it.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::debug;

use crate::error::StreamError;
use crate::subscription::Subscription;

/// Receives stream notifications.
pub trait Observer<T> {
    fn on_next(&mut self, value: T);

    fn on_error(&mut self, error: StreamError) {
        let _ = error;
    }

    fn on_complete(&mut self) {}
}

/// One signal travelling from producer to consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification<T> {
    Next(T),
    Error(StreamError),
    Complete,
}

impl<T> Notification<T> {
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Next(_))
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Next(_) => "next",
            Self::Error(_) => "error",
            Self::Complete => "complete",
        }
    }
}

/// Closure-backed [`Observer`].
///
/// ```
/// use tickflow::Callbacks;
///
/// let callbacks = Callbacks::new(|v: u64| println!("{v}"))
///     .on_error(|e| eprintln!("{e}"))
///     .on_complete(|| println!("completed!"));
/// # drop(callbacks);
/// ```
pub struct Callbacks<T> {
    next: Box<dyn FnMut(T)>,
    error: Option<Box<dyn FnMut(StreamError)>>,
    complete: Option<Box<dyn FnMut()>>,
}

impl<T> Callbacks<T> {
    pub fn new(on_next: impl FnMut(T) + 'static) -> Self {
        Self {
            next: Box::new(on_next),
            error: None,
            complete: None,
        }
    }

    #[must_use]
    pub fn on_error(mut self, on_error: impl FnMut(StreamError) + 'static) -> Self {
        self.error = Some(Box::new(on_error));
        self
    }

    #[must_use]
    pub fn on_complete(mut self, on_complete: impl FnMut() + 'static) -> Self {
        self.complete = Some(Box::new(on_complete));
        self
    }
}

impl<T> Observer<T> for Callbacks<T> {
    fn on_next(&mut self, value: T) {
        (self.next)(value);
    }

    fn on_error(&mut self, error: StreamError) {
        if let Some(handler) = self.error.as_mut() {
            handler(error);
        }
    }

    fn on_complete(&mut self) {
        if let Some(handler) = self.complete.as_mut() {
            handler();
        }
    }
}

/// Observer that keeps every notification it receives.
///
/// Clones share the same log, so one clone can be handed to `subscribe`
/// while another is inspected.
#[derive(Debug)]
pub struct Recorder<T> {
    log: Rc<RefCell<Vec<Notification<T>>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            log: Rc::clone(&self.log),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Recorder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.log.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }

    /// Whether a terminal notification has been recorded.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.log.borrow().iter().any(Notification::is_terminal)
    }
}

impl<T: Clone> Recorder<T> {
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification<T>> {
        self.log.borrow().clone()
    }

    /// Only the `Next` payloads, in order.
    #[must_use]
    pub fn values(&self) -> Vec<T> {
        self.log
            .borrow()
            .iter()
            .filter_map(|n| match n {
                Notification::Next(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }
}

impl<T> Observer<T> for Recorder<T> {
    fn on_next(&mut self, value: T) {
        self.log.borrow_mut().push(Notification::Next(value));
    }

    fn on_error(&mut self, error: StreamError) {
        self.log.borrow_mut().push(Notification::Error(error));
    }

    fn on_complete(&mut self) {
        self.log.borrow_mut().push(Notification::Complete);
    }
}

struct SubscriberInner<T> {
    observer: RefCell<Box<dyn Observer<T>>>,
    pending: RefCell<VecDeque<Notification<T>>>,
    dispatching: Cell<bool>,
    /// Set once a terminal signal has been accepted.
    stopped: Cell<bool>,
    subscription: Subscription,
}

/// Producer-facing side of one subscription.
///
/// Cloning creates a new handle to the **same** gate.
pub struct Subscriber<T> {
    inner: Rc<SubscriberInner<T>>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("subscription", &self.inner.subscription)
            .field("stopped", &self.inner.stopped.get())
            .field("pending", &self.inner.pending.borrow().len())
            .finish()
    }
}

impl<T: 'static> Subscriber<T> {
    pub fn new(observer: impl Observer<T> + 'static) -> Self {
        Self {
            inner: Rc::new(SubscriberInner {
                observer: RefCell::new(Box::new(observer)),
                pending: RefCell::new(VecDeque::new()),
                dispatching: Cell::new(false),
                stopped: Cell::new(false),
                subscription: Subscription::new(),
            }),
        }
    }

    #[must_use]
    pub fn subscription(&self) -> &Subscription {
        &self.inner.subscription
    }

    /// True once a terminal signal was accepted or the consumer cancelled.
    /// Producers should stop emitting.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.stopped.get() || self.inner.subscription.is_closed()
    }

    pub fn next(&self, value: T) {
        self.deliver(Notification::Next(value));
    }

    pub fn error(&self, error: StreamError) {
        self.deliver(Notification::Error(error));
    }

    pub fn complete(&self) {
        self.deliver(Notification::Complete);
    }

    pub fn deliver(&self, notification: Notification<T>) {
        if self.is_closed() {
            return;
        }
        if notification.is_terminal() {
            self.inner.stopped.set(true);
        }
        self.inner.pending.borrow_mut().push_back(notification);
        if self.inner.dispatching.replace(true) {
            // An outer frame is already draining the queue.
            return;
        }
        self.drain();
        self.inner.dispatching.set(false);
    }

    fn drain(&self) {
        loop {
            let next = self.inner.pending.borrow_mut().pop_front();
            let Some(notification) = next else {
                return;
            };
            if self.inner.subscription.is_closed() {
                self.inner.pending.borrow_mut().clear();
                return;
            }
            match notification {
                Notification::Next(value) => self.inner.observer.borrow_mut().on_next(value),
                Notification::Error(error) => {
                    debug!(
                        message = "stream.terminal",
                        subscription_id = self.inner.subscription.id(),
                        signal = "error",
                        error_kind = error.kind()
                    );
                    self.inner.subscription.unsubscribe();
                    self.inner.observer.borrow_mut().on_error(error);
                }
                Notification::Complete => {
                    debug!(
                        message = "stream.terminal",
                        subscription_id = self.inner.subscription.id(),
                        signal = "complete"
                    );
                    self.inner.subscription.unsubscribe();
                    self.inner.observer.borrow_mut().on_complete();
                }
            }
        }
    }
}
