#![forbid(unsafe_code)]

//! Multicast source.
//!
//! A [`Subject`] is pushed from the outside (e.g. a shared "user activated"
//! service event) and fans each signal out to every live subscriber, in
//! registration order. Unlike [`create_manual`](crate::create_manual), all
//! subscribers share one producer.
//!
//! Once a subject terminates, later subscribers receive the same terminal
//! signal immediately and nothing else.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::StreamError;
use crate::observer::{Observer, Subscriber};
use crate::stream::{Source, Stream};

enum Terminal {
    Error(StreamError),
    Complete,
}

struct SubjectState<T> {
    subscribers: Vec<Subscriber<T>>,
    terminal: Option<Terminal>,
}

/// Push-driven stream shared by all of its subscribers.
///
/// Cloning creates a new handle to the **same** subject.
pub struct Subject<T> {
    state: Rc<RefCell<SubjectState<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T> std::fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Subject")
            .field("subscribers", &state.subscribers.len())
            .field("terminated", &state.terminal.is_some())
            .finish()
    }
}

impl<T: Clone + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Subject<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SubjectState {
                subscribers: Vec::new(),
                terminal: None,
            })),
        }
    }

    /// Deliver `value` to every live subscriber.
    pub fn next(&self, value: T) {
        for subscriber in self.live() {
            subscriber.next(value.clone());
        }
    }

    pub fn error(&self, error: StreamError) {
        for subscriber in self.terminate(Terminal::Error(error.clone())) {
            subscriber.error(error.clone());
        }
    }

    pub fn complete(&self) {
        for subscriber in self.terminate(Terminal::Complete) {
            subscriber.complete();
        }
    }

    /// Live subscribers, after pruning cancelled ones.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.live().len()
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state.borrow().terminal.is_some()
    }

    #[must_use]
    pub fn as_stream(&self) -> Stream<T> {
        Stream::from_source(SubjectSource {
            subject: self.clone(),
        })
    }

    /// Snapshot of live subscribers. Delivery happens outside the borrow so
    /// handlers may subscribe, cancel, or push into this subject.
    fn live(&self) -> Vec<Subscriber<T>> {
        let mut state = self.state.borrow_mut();
        if state.terminal.is_some() {
            return Vec::new();
        }
        state.subscribers.retain(|s| !s.is_closed());
        state.subscribers.clone()
    }

    fn terminate(&self, terminal: Terminal) -> Vec<Subscriber<T>> {
        let mut state = self.state.borrow_mut();
        if state.terminal.is_some() {
            return Vec::new();
        }
        state.terminal = Some(terminal);
        std::mem::take(&mut state.subscribers)
    }
}

/// A subject can itself subscribe to a stream, multicasting it.
impl<T: Clone + 'static> Observer<T> for Subject<T> {
    fn on_next(&mut self, value: T) {
        self.next(value);
    }

    fn on_error(&mut self, error: StreamError) {
        Subject::error(self, error);
    }

    fn on_complete(&mut self) {
        Subject::complete(self);
    }
}

struct SubjectSource<T> {
    subject: Subject<T>,
}

impl<T: Clone + 'static> Source<T> for SubjectSource<T> {
    fn attach(&self, subscriber: Subscriber<T>) {
        let replay = {
            let mut state = self.subject.state.borrow_mut();
            match &state.terminal {
                Some(Terminal::Error(e)) => Some(Terminal::Error(e.clone())),
                Some(Terminal::Complete) => Some(Terminal::Complete),
                None => {
                    state.subscribers.push(subscriber.clone());
                    None
                }
            }
        };
        match replay {
            Some(Terminal::Error(e)) => subscriber.error(e),
            Some(Terminal::Complete) => subscriber.complete(),
            None => {
                // Drop the entry as soon as the subscription ends.
                let id = subscriber.subscription().id();
                let state: Weak<RefCell<SubjectState<T>>> = Rc::downgrade(&self.subject.state);
                subscriber.subscription().add(move || {
                    if let Some(state) = state.upgrade() {
                        state
                            .borrow_mut()
                            .subscribers
                            .retain(|s| s.subscription().id() != id);
                    }
                });
            }
        }
    }

    fn kind(&self) -> &'static str {
        "subject"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{Notification, Recorder};
    use crate::scheduler::EventLoop;
    use crate::stream::interval;
    use web_time::Duration;

    #[test]
    fn multicasts_in_registration_order() {
        let subject = Subject::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for name in ["first", "second"] {
            let order = Rc::clone(&order);
            subject
                .as_stream()
                .subscribe_fn(move |id: u32| order.borrow_mut().push((name, id)));
        }
        subject.next(1);
        subject.next(2);
        assert_eq!(
            *order.borrow(),
            vec![("first", 1), ("second", 1), ("first", 2), ("second", 2)]
        );
    }

    #[test]
    fn cancelled_subscriber_is_pruned() {
        let subject = Subject::new();
        let a = Recorder::new();
        let b = Recorder::new();
        let sub_a = subject.as_stream().subscribe(a.clone());
        let _sub_b = subject.as_stream().subscribe(b.clone());
        assert_eq!(subject.observer_count(), 2);
        sub_a.unsubscribe();
        subject.next(7);
        assert!(a.is_empty());
        assert_eq!(b.values(), vec![7]);
        assert_eq!(subject.observer_count(), 1);
    }

    #[test]
    fn unsubscribing_releases_the_subscriber_without_a_push() {
        let subject: Subject<u32> = Subject::new();
        let kept = Recorder::new();
        let _kept = subject.as_stream().subscribe(kept.clone());
        for _ in 0..1000 {
            subject.as_stream().subscribe(Recorder::new()).unsubscribe();
        }
        assert_eq!(subject.state.borrow().subscribers.len(), 1);
        assert_eq!(format!("{subject:?}"), "Subject { subscribers: 1, terminated: false }");
        subject.next(5);
        assert_eq!(kept.values(), vec![5]);
    }

    #[test]
    fn late_subscriber_gets_terminal_only() {
        let subject: Subject<u8> = Subject::new();
        subject.next(1);
        subject.error(StreamError::producer("gone"));
        subject.next(2);
        let rec = Recorder::new();
        let sub = subject.as_stream().subscribe(rec.clone());
        assert_eq!(
            rec.notifications(),
            vec![Notification::Error(StreamError::producer("gone"))]
        );
        assert!(sub.is_closed());
        assert!(subject.is_terminated());
    }

    #[test]
    fn complete_reaches_everyone_once() {
        let subject: Subject<u8> = Subject::new();
        let a = Recorder::new();
        let b = Recorder::new();
        subject.as_stream().subscribe(a.clone());
        subject.as_stream().subscribe(b.clone());
        subject.complete();
        subject.complete();
        assert_eq!(a.notifications(), vec![Notification::Complete]);
        assert_eq!(b.notifications(), vec![Notification::Complete]);
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn handler_may_push_back_into_subject() {
        let subject = Subject::new();
        let echo = subject.clone();
        let rec = Recorder::new();
        subject.as_stream().subscribe_fn(move |v: u32| {
            if v < 3 {
                echo.next(v + 1);
            }
        });
        subject.as_stream().subscribe(rec.clone());
        subject.next(0);
        assert_eq!(rec.values(), vec![1, 2, 3, 0]);
    }

    #[test]
    fn subject_multicasts_a_single_interval() {
        let lp = EventLoop::lab();
        let subject = Subject::new();
        let upstream = interval(lp.scheduler(), Duration::from_millis(10))
            .unwrap()
            .subscribe(subject.clone());
        let a = Recorder::new();
        let b = Recorder::new();
        subject.as_stream().subscribe(a.clone());
        lp.advance(Duration::from_millis(10)).unwrap();
        subject.as_stream().subscribe(b.clone());
        lp.advance(Duration::from_millis(20)).unwrap();
        upstream.unsubscribe();
        assert_eq!(a.values(), vec![0, 1, 2]);
        assert_eq!(b.values(), vec![1, 2]);
        assert!(lp.is_idle());
    }
}
