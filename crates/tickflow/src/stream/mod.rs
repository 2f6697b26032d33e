#![forbid(unsafe_code)]

//! Push streams.
//!
//! A [`Stream`] is a cheap, cloneable handle to a [`Source`]. Subscribing
//! builds a fresh [`Subscriber`] gate around the observer, hands it to the
//! source, and returns the gate's [`Subscription`].
//!
//! # Variants
//!
//! - [`interval`]: counters `0, 1, 2, ...` on a scheduler, one independent
//!   timer per subscription.
//! - [`create_manual`]: driven by a producer closure through an [`Emitter`].
//! - Transformed streams from [`Stream::map`], [`Stream::filter`] and their
//!   fallible `try_` forms. Subscribing to one subscribes upstream and links
//!   the two subscriptions, so cancelling the outer one cancels both.
//!
//! # Example
//!
//! ```
//! use tickflow::{interval, EventLoop, Recorder};
//! use web_time::Duration;
//!
//! let event_loop = EventLoop::lab();
//! let evens = interval(event_loop.scheduler(), Duration::from_millis(100))
//!     .unwrap()
//!     .map(|x| x * 2)
//!     .filter(|x| x % 10 != 0);
//!
//! let rec = Recorder::new();
//! let sub = evens.subscribe(rec.clone());
//! event_loop.advance(Duration::from_millis(700)).unwrap();
//! sub.unsubscribe();
//!
//! assert_eq!(rec.values(), vec![2, 4, 6, 8, 12]);
//! ```

mod interval;
mod manual;
mod transform;

use std::fmt::Display;
use std::rc::Rc;

use tracing::debug;

use crate::error::StreamError;
use crate::observer::{Callbacks, Observer, Subscriber};
use crate::subscription::Subscription;

pub use interval::{interval, interval_ms};
pub use manual::{Emitter, create_manual};

use transform::Transform;

/// Something that can feed one subscriber.
pub trait Source<T> {
    /// Start producing into `subscriber`. Called once per subscription.
    fn attach(&self, subscriber: Subscriber<T>);

    /// Short label for logs.
    fn kind(&self) -> &'static str;
}

/// Shared handle to a producer of values over time.
pub struct Stream<T> {
    source: Rc<dyn Source<T>>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            source: Rc::clone(&self.source),
        }
    }
}

impl<T> std::fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("kind", &self.source.kind())
            .finish()
    }
}

impl<T: 'static> Stream<T> {
    pub fn from_source(source: impl Source<T> + 'static) -> Self {
        Self {
            source: Rc::new(source),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.source.kind()
    }

    /// Register `observer` and start the producer.
    ///
    /// The returned [`Subscription`] may already be closed if the producer
    /// terminated synchronously.
    pub fn subscribe(&self, observer: impl Observer<T> + 'static) -> Subscription {
        let subscriber = Subscriber::new(observer);
        let subscription = subscriber.subscription().clone();
        debug!(
            message = "stream.subscribe",
            subscription_id = subscription.id(),
            kind = self.source.kind()
        );
        self.source.attach(subscriber);
        subscription
    }

    /// Subscribe with only a value handler.
    pub fn subscribe_fn(&self, on_next: impl FnMut(T) + 'static) -> Subscription {
        self.subscribe(Callbacks::new(on_next))
    }

    /// Replace each value `v` with `f(v)`.
    #[must_use]
    pub fn map<U: 'static>(&self, f: impl Fn(T) -> U + 'static) -> Stream<U> {
        Stream::from_source(Transform::new(
            self.clone(),
            "map",
            move |v| Ok(Some(f(v))),
        ))
    }

    /// Like [`map`](Self::map), but an `Err` from `f` ends the output stream
    /// with [`StreamError::TransformFailure`] and cancels upstream.
    #[must_use]
    pub fn try_map<U, E>(&self, f: impl Fn(T) -> Result<U, E> + 'static) -> Stream<U>
    where
        U: 'static,
        E: Display,
    {
        Stream::from_source(Transform::new(self.clone(), "try_map", move |v| {
            f(v).map(Some)
                .map_err(|e| StreamError::transform(e.to_string()))
        }))
    }

    /// Forward only values for which `pred` holds; the rest are dropped
    /// silently.
    #[must_use]
    pub fn filter(&self, pred: impl Fn(&T) -> bool + 'static) -> Stream<T> {
        Stream::from_source(Transform::new(self.clone(), "filter", move |v| {
            Ok(pred(&v).then_some(v))
        }))
    }

    /// Fallible [`filter`](Self::filter); failure is handled as in
    /// [`try_map`](Self::try_map).
    #[must_use]
    pub fn try_filter<E>(&self, pred: impl Fn(&T) -> Result<bool, E> + 'static) -> Stream<T>
    where
        E: Display,
    {
        Stream::from_source(Transform::new(self.clone(), "try_filter", move |v| {
            match pred(&v) {
                Ok(keep) => Ok(keep.then_some(v)),
                Err(e) => Err(StreamError::transform(e.to_string())),
            }
        }))
    }
}
