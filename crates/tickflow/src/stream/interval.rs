#![forbid(unsafe_code)]

//! Timer sequence generator.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;
use web_time::{Duration, Instant};

use super::{Source, Stream};
use crate::error::{Result, StreamError};
use crate::observer::Subscriber;
use crate::scheduler::{Scheduler, TimerHandle, deadline_after};

/// Emit `0, 1, 2, ...` every `period` on `scheduler` until cancelled.
///
/// Tick `k` is due `(k + 1) * period` after subscription; deadlines are
/// computed from the subscription instant, so a slow handler does not push
/// later ticks back.
///
/// # Errors
///
/// `InvalidArgument` when `period` is zero or too large to schedule.
pub fn interval(scheduler: Rc<dyn Scheduler>, period: Duration) -> Result<Stream<u64>> {
    if period.is_zero() {
        return Err(StreamError::invalid("interval period must be positive"));
    }
    if scheduler.now().checked_add(period).is_none() {
        return Err(StreamError::invalid(format!(
            "interval period {period:?} overflows the clock"
        )));
    }
    Ok(Stream::from_source(Interval { scheduler, period }))
}

/// [`interval`] with a signed millisecond period.
///
/// # Errors
///
/// `InvalidArgument` when `period_ms <= 0`.
pub fn interval_ms(scheduler: Rc<dyn Scheduler>, period_ms: i64) -> Result<Stream<u64>> {
    let ms = u64::try_from(period_ms)
        .ok()
        .filter(|ms| *ms > 0)
        .ok_or_else(|| {
            StreamError::invalid(format!("interval period must be positive, got {period_ms}ms"))
        })?;
    interval(scheduler, Duration::from_millis(ms))
}

struct Interval {
    scheduler: Rc<dyn Scheduler>,
    period: Duration,
}

impl Source<u64> for Interval {
    fn attach(&self, subscriber: Subscriber<u64>) {
        let timer = Rc::new(RefCell::new(TimerHandle::inert()));
        let ticker = Ticker {
            scheduler: Rc::clone(&self.scheduler),
            period: self.period,
            subscriber: subscriber.clone(),
            timer: Rc::clone(&timer),
        };
        let first_due = deadline_after(self.scheduler.now(), self.period);
        ticker.arm(0, first_due);
        subscriber.subscription().add(move || timer.borrow_mut().cancel());
    }

    fn kind(&self) -> &'static str {
        "interval"
    }
}

/// Per-subscription timer state. Re-arms itself after every tick.
struct Ticker {
    scheduler: Rc<dyn Scheduler>,
    period: Duration,
    subscriber: Subscriber<u64>,
    /// Handle of the currently armed tick, cancelled on teardown.
    timer: Rc<RefCell<TimerHandle>>,
}

impl Ticker {
    fn arm(self, tick: u64, due: Instant) {
        let delay = due.saturating_duration_since(self.scheduler.now());
        let scheduler = Rc::clone(&self.scheduler);
        let slot = Rc::clone(&self.timer);
        let handle = scheduler.schedule(delay, Box::new(move || self.fire(tick, due)));
        *slot.borrow_mut() = handle;
    }

    fn fire(self, tick: u64, due: Instant) {
        if self.subscriber.is_closed() {
            return;
        }
        trace!(message = "interval.tick", tick);
        self.subscriber.next(tick);
        // The handler may have cancelled.
        if self.subscriber.is_closed() {
            return;
        }
        // Past the end of the clock there is nothing left to tick.
        if let Some(next_due) = due.checked_add(self.period) {
            self.arm(tick + 1, next_due);
        }
    }
}
