#![forbid(unsafe_code)]

//! Single-threaded push streams for view-model code.
//!
//! - [`interval`] ticks `0, 1, 2, ...` on an injected [`Scheduler`].
//! - [`create_manual`] is driven by a producer closure through an [`Emitter`].
//! - [`Stream::map`] / [`Stream::filter`] (and their `try_` forms) compose.
//! - [`Subject`] multicasts externally pushed signals.
//! - [`Subscription`] cancels, idempotently; [`SubscriptionGuard`] cancels on
//!   drop.
//!
//! Everything runs on one thread: [`EventLoop`] executes deferred tasks one
//! at a time, and a lab-clock loop makes timer behaviour reproducible in
//! tests.
//!
//! # Invariants
//!
//! 1. Values reach a handler in emission order.
//! 2. At most one terminal signal per subscription; none after cancellation.
//! 3. Cancellation is synchronous: a delivery scheduled earlier but not yet
//!    run never reaches the handler.
//! 4. Cancelling twice is a no-op, and so is emitting after a terminal signal.

pub mod clock;
pub mod error;
pub mod observer;
pub mod scheduler;
pub mod stream;
pub mod subject;
pub mod subscription;

pub use clock::{Clock, LabClock};
pub use error::{Result, StreamError};
pub use observer::{Callbacks, Notification, Observer, Recorder, Subscriber};
pub use scheduler::{EventLoop, EventLoopConfig, Scheduler, Task, TimerHandle};
pub use stream::{Emitter, Source, Stream, create_manual, interval, interval_ms};
pub use subject::Subject;
pub use subscription::{Subscription, SubscriptionGuard};
