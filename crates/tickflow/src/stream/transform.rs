#![forbid(unsafe_code)]

use std::rc::Rc;

use super::{Source, Stream};
use crate::error::{Result, StreamError};
use crate::observer::{Observer, Subscriber};

/// Per-value step: `Ok(Some(u))` forwards, `Ok(None)` drops, `Err` terminates.
type Step<T, U> = Rc<dyn Fn(T) -> Result<Option<U>>>;

/// A stream layered over an upstream it does not own.
pub(super) struct Transform<T, U> {
    upstream: Stream<T>,
    kind: &'static str,
    step: Step<T, U>,
}

impl<T, U> Transform<T, U> {
    pub(super) fn new(
        upstream: Stream<T>,
        kind: &'static str,
        step: impl Fn(T) -> Result<Option<U>> + 'static,
    ) -> Self {
        Self {
            upstream,
            kind,
            step: Rc::new(step),
        }
    }
}

impl<T: 'static, U: 'static> Source<U> for Transform<T, U> {
    fn attach(&self, downstream: Subscriber<U>) {
        let forward = Forward {
            downstream: downstream.clone(),
            step: Rc::clone(&self.step),
        };
        let upstream = self.upstream.subscribe(forward);
        downstream.subscription().add_child(upstream);
    }

    fn kind(&self) -> &'static str {
        self.kind
    }
}

struct Forward<T, U> {
    downstream: Subscriber<U>,
    step: Step<T, U>,
}

impl<T, U: 'static> Observer<T> for Forward<T, U> {
    fn on_next(&mut self, value: T) {
        if self.downstream.is_closed() {
            return;
        }
        match (self.step)(value) {
            Ok(Some(out)) => self.downstream.next(out),
            Ok(None) => {}
            Err(error) => self.downstream.error(error),
        }
    }

    fn on_error(&mut self, error: StreamError) {
        self.downstream.error(error);
    }

    fn on_complete(&mut self) {
        self.downstream.complete();
    }
}
