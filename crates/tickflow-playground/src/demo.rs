#![forbid(unsafe_code)]

//! The two playground pipelines, runnable on any [`EventLoop`].

use std::cell::RefCell;
use std::rc::Rc;

use tickflow::{
    Callbacks, Emitter, EventLoop, Scheduler, StreamError, Subscription, create_manual, interval,
};
use tracing::info;
use web_time::Duration;

use crate::error::{PlaygroundError, Result};

/// How the manual script ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualScript {
    Error,
    Complete,
}

/// Run `interval -> map(x * 2) -> filter(x % 10 != 0)` until `outputs`
/// values have been seen, then cancel from inside the handler.
pub fn interval_demo(event_loop: &EventLoop, period: Duration, outputs: usize) -> Result<Vec<u64>> {
    if outputs == 0 {
        return Err(PlaygroundError::invalid("outputs must be at least 1"));
    }
    let seen = Rc::new(RefCell::new(Vec::with_capacity(outputs)));
    let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

    let handler_seen = Rc::clone(&seen);
    let handler_slot = Rc::clone(&slot);
    let subscription = interval(event_loop.scheduler(), period)?
        .map(|x| x * 2)
        .filter(|x| x % 10 != 0)
        .subscribe_fn(move |value| {
            info!(message = "playground.interval", value);
            let mut seen = handler_seen.borrow_mut();
            seen.push(value);
            if seen.len() >= outputs {
                if let Some(sub) = handler_slot.borrow().as_ref() {
                    sub.unsubscribe();
                }
            }
        });
    *slot.borrow_mut() = Some(subscription);

    event_loop.run_until_idle();
    slot.borrow_mut().take();
    let values = seen.borrow().clone();
    Ok(values)
}

/// Scripted manual source: values at 2s and 4s, a terminal signal at 5s,
/// and a value at 6s that is never observed. Delays are divided by
/// `speedup`.
pub fn manual_demo(event_loop: &EventLoop, script: ManualScript, speedup: f64) -> Result<Vec<String>> {
    if !(speedup.is_finite() && speedup > 0.0) {
        return Err(PlaygroundError::invalid(format!(
            "speedup must be a positive number, got {speedup}"
        )));
    }
    let scale = |ms: u64| {
        Duration::try_from_secs_f64(ms as f64 / 1000.0 / speedup).map_err(|err| {
            PlaygroundError::invalid(format!("speedup {speedup} gives an unusable delay: {err}"))
        })
    };

    let scheduler = event_loop.scheduler();
    let steps = [
        (scale(2000)?, Some("first package")),
        (scale(4000)?, Some("second package")),
        (scale(5000)?, None),
        (scale(6000)?, Some("third package")),
    ];
    let packages = create_manual(move |emitter: Emitter<&'static str>| {
        for (delay, step) in steps {
            let emitter = emitter.clone();
            let _ = scheduler.schedule(
                delay,
                Box::new(move || match (step, script) {
                    (Some(package), _) => emitter.next(package),
                    (None, ManualScript::Error) => {
                        emitter.error(StreamError::producer("this does not work"));
                    }
                    (None, ManualScript::Complete) => emitter.complete(),
                }),
            );
        }
    });

    let transcript = Rc::new(RefCell::new(Vec::new()));
    let on_next = Rc::clone(&transcript);
    let on_error = Rc::clone(&transcript);
    let on_complete = Rc::clone(&transcript);
    let _subscription = packages.subscribe(
        Callbacks::new(move |package: &'static str| {
            info!(message = "playground.manual", package);
            on_next.borrow_mut().push(package.to_string());
        })
        .on_error(move |error| {
            info!(message = "playground.manual", error = %error);
            on_error.borrow_mut().push(format!("error: {error}"));
        })
        .on_complete(move || {
            info!(message = "playground.manual", completed = true);
            on_complete.borrow_mut().push("completed!".to_string());
        }),
    );

    event_loop.run_until_idle();
    let lines = transcript.borrow().clone();
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_demo_stops_after_requested_outputs() {
        let lp = EventLoop::lab();
        let values = interval_demo(&lp, Duration::from_millis(1000), 5).unwrap();
        assert_eq!(values, vec![2, 4, 6, 8, 12]);
        assert!(lp.is_idle());
    }

    #[test]
    fn interval_demo_rejects_zero_outputs() {
        let lp = EventLoop::lab();
        assert!(matches!(
            interval_demo(&lp, Duration::from_millis(1), 0),
            Err(PlaygroundError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn interval_demo_propagates_stream_errors() {
        let lp = EventLoop::lab();
        let err = interval_demo(&lp, Duration::ZERO, 1).unwrap_err();
        assert!(matches!(err, PlaygroundError::Stream(StreamError::InvalidArgument { .. })));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn manual_demo_never_shows_third_package() {
        let lp = EventLoop::lab();
        let lines = manual_demo(&lp, ManualScript::Error, 1.0).unwrap();
        assert_eq!(
            lines,
            vec!["first package", "second package", "error: this does not work"]
        );
    }

    #[test]
    fn manual_demo_can_complete_instead() {
        let lp = EventLoop::lab();
        let lines = manual_demo(&lp, ManualScript::Complete, 4.0).unwrap();
        assert_eq!(lines, vec!["first package", "second package", "completed!"]);
    }

    #[test]
    fn manual_demo_speedup_shrinks_timeline() {
        let lp = EventLoop::lab();
        let start = lp.now();
        manual_demo(&lp, ManualScript::Error, 2.0).unwrap();
        assert_eq!(lp.now() - start, Duration::from_secs(3));
    }

    #[test]
    fn manual_demo_rejects_bad_speedup() {
        let lp = EventLoop::lab();
        for speedup in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e-20, f64::MIN_POSITIVE] {
            let err = manual_demo(&lp, ManualScript::Error, speedup).unwrap_err();
            assert_eq!(err.exit_code(), 2, "{speedup}");
        }
    }
}
