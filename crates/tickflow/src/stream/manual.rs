#![forbid(unsafe_code)]

//! Manual event source.
//!
//! The producer closure runs once per subscription and receives an
//! [`Emitter`]. It decides when values, an error, or completion happen,
//! typically by scheduling delayed callbacks. The per-subscription state
//! machine is `Active -> Errored | Completed`; both end states absorb every
//! later emitter call.

use std::rc::Rc;

use super::{Source, Stream};
use crate::error::StreamError;
use crate::observer::Subscriber;

/// Producer-side handle into one subscription.
pub struct Emitter<T> {
    subscriber: Subscriber<T>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            subscriber: self.subscriber.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("subscriber", &self.subscriber)
            .finish()
    }
}

impl<T: 'static> Emitter<T> {
    pub fn next(&self, value: T) {
        self.subscriber.next(value);
    }

    pub fn error(&self, error: StreamError) {
        self.subscriber.error(error);
    }

    pub fn complete(&self) {
        self.subscriber.complete();
    }

    /// Whether further calls would be ignored (terminated or cancelled).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.subscriber.is_closed()
    }

    /// Run `teardown` when this subscription ends, for whatever reason.
    pub fn add_teardown(&self, teardown: impl FnOnce() + 'static) {
        self.subscriber.subscription().add(teardown);
    }
}

/// Build a stream from a producer closure, invoked once per subscription.
///
/// ```
/// use tickflow::{create_manual, Notification, Recorder, StreamError};
///
/// let stream = create_manual(|emitter| {
///     emitter.next("package");
///     emitter.error(StreamError::producer("Does not work"));
///     emitter.next("never emitted");
/// });
/// let rec = Recorder::new();
/// stream.subscribe(rec.clone());
/// assert_eq!(
///     rec.notifications(),
///     vec![
///         Notification::Next("package"),
///         Notification::Error(StreamError::producer("Does not work")),
///     ]
/// );
/// ```
pub fn create_manual<T: 'static>(setup: impl Fn(Emitter<T>) + 'static) -> Stream<T> {
    Stream::from_source(Manual {
        setup: Rc::new(setup),
    })
}

struct Manual<T> {
    setup: Rc<dyn Fn(Emitter<T>)>,
}

impl<T: 'static> Source<T> for Manual<T> {
    fn attach(&self, subscriber: Subscriber<T>) {
        (self.setup)(Emitter { subscriber });
    }

    fn kind(&self) -> &'static str {
        "manual"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{Notification, Recorder};
    use crate::scheduler::{EventLoop, Scheduler};
    use std::cell::Cell;
    use web_time::Duration;

    /// Producer that schedules each step `at` milliseconds after subscription.
    fn scripted(lp: &EventLoop, script: Vec<(u64, Notification<&'static str>)>) -> Stream<&'static str> {
        let scheduler = lp.scheduler();
        let script = Rc::new(script);
        create_manual(move |emitter| {
            for (at, step) in script.iter().cloned() {
                let emitter = emitter.clone();
                // Left armed on purpose: the subscriber gate drops late signals.
                let _ = scheduler.schedule(
                    Duration::from_millis(at),
                    Box::new(move || match step {
                        Notification::Next(v) => emitter.next(v),
                        Notification::Error(e) => emitter.error(e),
                        Notification::Complete => emitter.complete(),
                    }),
                );
            }
        })
    }

    #[test]
    fn error_cuts_off_later_values() {
        let lp = EventLoop::lab();
        let stream = scripted(
            &lp,
            vec![
                (2000, Notification::Next("first package")),
                (4000, Notification::Next("second package")),
                (5000, Notification::Error(StreamError::producer("this does not work"))),
                (6000, Notification::Next("third package")),
            ],
        );
        let rec = Recorder::new();
        let sub = stream.subscribe(rec.clone());
        lp.run_until_idle();
        assert_eq!(
            rec.notifications(),
            vec![
                Notification::Next("first package"),
                Notification::Next("second package"),
                Notification::Error(StreamError::producer("this does not work")),
            ]
        );
        assert!(sub.is_closed());
    }

    #[test]
    fn complete_twice_completes_once() {
        let stream = create_manual(|emitter: Emitter<u8>| {
            emitter.complete();
            emitter.complete();
        });
        let rec = Recorder::new();
        stream.subscribe(rec.clone());
        assert_eq!(rec.notifications(), vec![Notification::Complete]);
    }

    #[test]
    fn error_and_complete_are_mutually_exclusive() {
        let stream = create_manual(|emitter: Emitter<u8>| {
            emitter.complete();
            emitter.error(StreamError::producer("too late"));
        });
        let rec = Recorder::new();
        stream.subscribe(rec.clone());
        assert_eq!(rec.notifications(), vec![Notification::Complete]);
    }

    #[test]
    fn cancel_before_scheduled_emission_sees_nothing() {
        let lp = EventLoop::lab();
        let stream = scripted(
            &lp,
            vec![
                (10, Notification::Next("a")),
                (20, Notification::Complete),
            ],
        );
        let rec = Recorder::new();
        let sub = stream.subscribe(rec.clone());
        sub.unsubscribe();
        lp.run_until_idle();
        assert!(rec.is_empty());
    }

    #[test]
    fn setup_runs_once_per_subscription() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let stream = create_manual(move |emitter: Emitter<u32>| {
            counter.set(counter.get() + 1);
            emitter.next(counter.get());
        });
        let a = Recorder::new();
        let b = Recorder::new();
        stream.subscribe(a.clone());
        stream.subscribe(b.clone());
        assert_eq!(calls.get(), 2);
        assert_eq!(a.values(), vec![1]);
        assert_eq!(b.values(), vec![2]);
    }

    #[test]
    fn teardown_cancels_producer_timers() {
        let lp = EventLoop::lab();
        let scheduler = lp.scheduler();
        let stream = create_manual(move |emitter: Emitter<u32>| {
            let tick_emitter = emitter.clone();
            let mut handle = scheduler.schedule(
                Duration::from_millis(100),
                Box::new(move || tick_emitter.next(1)),
            );
            emitter.add_teardown(move || handle.cancel());
        });
        let rec = Recorder::new();
        let sub = stream.subscribe(rec.clone());
        assert_eq!(lp.pending(), 1);
        sub.unsubscribe();
        assert_eq!(lp.pending(), 0);
        assert!(rec.is_empty());
    }
}
