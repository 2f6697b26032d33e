#![forbid(unsafe_code)]

//! Deferred task scheduling.
//!
//! Streams never reach for an ambient timer. They receive a [`Scheduler`]
//! (a delay plus a callback in, a [`TimerHandle`] out) and re-enter the loop
//! through it. [`EventLoop`] is the single-threaded implementation used by
//! both production code and tests.
//!
//! # Invariants
//!
//! 1. Tasks run one at a time, never concurrently with each other.
//! 2. Tasks due at the same instant run in scheduling order.
//! 3. A cancelled task never runs, even if it was already due.
//! 4. No loop state is borrowed while a task runs, so tasks may schedule or
//!    cancel other tasks freely.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use tickflow::scheduler::{EventLoop, Scheduler};
//! use web_time::Duration;
//!
//! let event_loop = EventLoop::lab();
//! let fired = Rc::new(Cell::new(false));
//! let flag = Rc::clone(&fired);
//! let _handle = event_loop.schedule(Duration::from_millis(5), Box::new(move || flag.set(true)));
//!
//! event_loop.advance(Duration::from_millis(4)).unwrap();
//! assert!(!fired.get());
//! event_loop.advance(Duration::from_millis(1)).unwrap();
//! assert!(fired.get());
//! ```

use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::rc::{Rc, Weak};

use tracing::trace;
use web_time::{Duration, Instant};

use crate::clock::{Clock, LabClock};
use crate::error::{Result, StreamError};

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce()>;

/// The injected scheduling capability.
pub trait Scheduler {
    /// Current time as seen by this scheduler.
    fn now(&self) -> Instant;

    /// Run `task` once, `delay` from now.
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;
}

/// Cancellation token for a scheduled task.
///
/// Dropping the handle does **not** cancel the task; cancellation is always
/// explicit. Cancelling twice, or after the task ran, is a no-op.
#[must_use = "dropping a TimerHandle leaves the task scheduled"]
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to cancel.
    pub fn inert() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Whether `cancel` has already been called (or there was nothing to cancel).
    #[must_use]
    pub fn is_spent(&self) -> bool {
        self.cancel.is_none()
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("spent", &self.is_spent())
            .finish()
    }
}

/// Tuning knobs for [`EventLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventLoopConfig {
    /// Upper bound on tasks executed by a single [`EventLoop::turn`].
    pub max_tasks_per_turn: usize,
    /// Longest real-time sleep while waiting for the next deadline.
    pub idle_poll: Duration,
}

/// Deadline used when `now + delay` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `now + delay`, clamped to a far-future deadline on overflow.
pub(crate) fn deadline_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_turn: 1024,
            idle_poll: Duration::from_millis(10),
        }
    }
}

struct LoopInner {
    config: EventLoopConfig,
    clock: Clock,
    /// Min-heap of `(due, task_id)`. Cancelled ids are skipped lazily.
    queue: BinaryHeap<Reverse<(Instant, u64)>>,
    tasks: HashMap<u64, Task>,
    next_id: u64,
    executed: u64,
}

/// Single-threaded timer queue.
///
/// Cloning an `EventLoop` creates a new handle to the **same** queue.
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<RefCell<LoopInner>>,
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EventLoop")
            .field("lab", &inner.clock.is_lab())
            .field("pending", &inner.tasks.len())
            .field("executed", &inner.executed)
            .finish()
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    /// Real-time loop with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(Clock::Real, EventLoopConfig::default())
    }

    #[must_use]
    pub fn with_config(config: EventLoopConfig) -> Self {
        Self::build(Clock::Real, config)
    }

    /// Loop driven by a fresh [`LabClock`].
    #[must_use]
    pub fn lab() -> Self {
        Self::build(Clock::Lab(LabClock::new()), EventLoopConfig::default())
    }

    #[must_use]
    pub fn lab_with_config(config: EventLoopConfig) -> Self {
        Self::build(Clock::Lab(LabClock::new()), config)
    }

    fn build(clock: Clock, config: EventLoopConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(LoopInner {
                config,
                clock,
                queue: BinaryHeap::new(),
                tasks: HashMap::new(),
                next_id: 1,
                executed: 0,
            })),
        }
    }

    /// This loop as an injectable scheduler.
    #[must_use]
    pub fn scheduler(&self) -> Rc<dyn Scheduler> {
        Rc::new(self.clone())
    }

    #[inline]
    #[must_use]
    pub fn is_lab(&self) -> bool {
        self.inner.borrow().clock.is_lab()
    }

    #[must_use]
    pub fn config(&self) -> EventLoopConfig {
        self.inner.borrow().config
    }

    /// Number of scheduled tasks that have neither run nor been cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.borrow().tasks.len()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Total tasks executed over the loop's lifetime.
    #[must_use]
    pub fn executed(&self) -> u64 {
        self.inner.borrow().executed
    }

    /// Deadline of the earliest live task.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        let mut inner = self.inner.borrow_mut();
        while let Some(&Reverse((due, id))) = inner.queue.peek() {
            if inner.tasks.contains_key(&id) {
                return Some(due);
            }
            inner.queue.pop();
        }
        None
    }

    /// Run every task due at the current time, up to `max_tasks_per_turn`.
    ///
    /// Returns the number of tasks executed.
    pub fn turn(&self) -> usize {
        let (now, budget) = {
            let inner = self.inner.borrow();
            (inner.clock.now(), inner.config.max_tasks_per_turn)
        };
        let mut ran = 0;
        while ran < budget {
            let Some((task_id, task)) = self.pop_due(now) else {
                break;
            };
            trace!(message = "loop.task", task_id);
            task();
            ran += 1;
        }
        self.inner.borrow_mut().executed += ran as u64;
        ran
    }

    /// Move a lab clock forward by `delta`, running every task that falls due
    /// on the way, each at its own deadline.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if this loop runs on the real clock.
    pub fn advance(&self, delta: Duration) -> Result<usize> {
        let clock = self.lab_clock()?;
        let target = deadline_after(clock.now(), delta);
        let mut ran = 0;
        while let Some(due) = self.next_deadline() {
            if due > target {
                break;
            }
            clock.advance_to(due);
            ran += self.turn();
        }
        clock.advance_to(target);
        Ok(ran)
    }

    /// Run until no tasks remain. Lab loops jump straight to each deadline;
    /// real loops sleep until it.
    ///
    /// A live interval subscription keeps the loop busy forever, so callers
    /// cancel it (typically from a handler) before relying on this returning.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while let Some(due) = self.next_deadline() {
            self.wait_until(due);
            ran += self.turn();
        }
        ran
    }

    /// Run for `span` of loop time, then return even if tasks remain.
    pub fn run_for(&self, span: Duration) -> usize {
        let end = deadline_after(self.now(), span);
        let mut ran = 0;
        loop {
            match self.next_deadline() {
                Some(due) if due <= end => {
                    self.wait_until(due);
                    ran += self.turn();
                }
                _ => {
                    self.wait_until(end);
                    return ran;
                }
            }
        }
    }

    fn lab_clock(&self) -> Result<LabClock> {
        match &self.inner.borrow().clock {
            Clock::Lab(clock) => Ok(clock.clone()),
            Clock::Real => Err(StreamError::invalid("advance requires a lab clock")),
        }
    }

    fn wait_until(&self, target: Instant) {
        let (clock, poll) = {
            let inner = self.inner.borrow();
            (inner.clock.clone(), inner.config.idle_poll)
        };
        match clock {
            Clock::Lab(lab) => lab.advance_to(target),
            Clock::Real => loop {
                let now = Instant::now();
                if now >= target {
                    break;
                }
                std::thread::sleep((target - now).min(poll));
            },
        }
    }

    fn pop_due(&self, now: Instant) -> Option<(u64, Task)> {
        let mut inner = self.inner.borrow_mut();
        while let Some(&Reverse((due, id))) = inner.queue.peek() {
            if !inner.tasks.contains_key(&id) {
                inner.queue.pop();
                continue;
            }
            if due > now {
                return None;
            }
            inner.queue.pop();
            return inner.tasks.remove(&id).map(|task| (id, task));
        }
        None
    }
}

impl Scheduler for EventLoop {
    fn now(&self) -> Instant {
        self.inner.borrow().clock.now()
    }

    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            let due = deadline_after(inner.clock.now(), delay);
            inner.queue.push(Reverse((due, id)));
            inner.tasks.insert(id, task);
            id
        };
        let weak: Weak<RefCell<LoopInner>> = Rc::downgrade(&self.inner);
        TimerHandle::new(move || {
            if let Some(inner) = weak.upgrade() {
                // Drop the task outside the borrow; its captures may touch the loop.
                let removed = inner.borrow_mut().tasks.remove(&id);
                drop(removed);
            }
        })
    }
}
