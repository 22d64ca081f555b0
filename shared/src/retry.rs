//! Bounded timeout and retry primitives driven by an injected timer.

use std::future::Future;
use std::time::Duration;

use futures::future::{Either, LocalBoxFuture, select};
use futures::pin_mut;

/// Source of delays. The browser client backs this with `setTimeout`; tests
/// use timers that resolve immediately or never.
pub trait Timer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed;

/// Race `future` against a deadline. The losing future is dropped, which cancels it.
pub async fn with_timeout<T, F>(timer: &T, deadline: Duration, future: F) -> Result<F::Output, Elapsed>
where
    T: Timer + ?Sized,
    F: Future,
{
    let sleep = timer.sleep(deadline);
    pin_mut!(future);
    match select(future, sleep).await {
        Either::Left((output, _)) => Ok(output),
        Either::Right(((), _)) => Err(Elapsed),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub backoff: Duration,
}

/// How a bounded retry loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempt: u32 },
    Exhausted { attempts: u32 },
    Canceled { attempt: u32 },
}

/// What one attempt reported back to the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult<T> {
    Done(T),
    Failed,
    Canceled,
}

/// Run up to `policy.max_attempts` attempts, each bounded by `attempt_timeout`,
/// sleeping `backoff` between them. `cleanup` runs after every attempt that did
/// not succeed (timed out, failed or canceled) with the attempt number, so the
/// caller can tear down anything the attempt left behind.
pub async fn retry_bounded<T, Tm, A, Fut, C>(
    timer: &Tm,
    policy: RetryPolicy,
    mut attempt: A,
    mut cleanup: C,
) -> RetryOutcome<T>
where
    Tm: Timer + ?Sized,
    A: FnMut(u32) -> Fut,
    Fut: Future<Output = AttemptResult<T>>,
    C: FnMut(u32),
{
    for n in 1..=policy.max_attempts {
        match with_timeout(timer, policy.attempt_timeout, attempt(n)).await {
            Ok(AttemptResult::Done(value)) => {
                return RetryOutcome::Succeeded { value, attempt: n };
            }
            Ok(AttemptResult::Canceled) => {
                cleanup(n);
                return RetryOutcome::Canceled { attempt: n };
            }
            Ok(AttemptResult::Failed) => {
                tracing::debug!(attempt = n, "attempt failed");
                cleanup(n);
            }
            Err(Elapsed) => {
                tracing::debug!(attempt = n, "attempt timed out");
                cleanup(n);
            }
        }
        if n < policy.max_attempts {
            timer.sleep(policy.backoff).await;
        }
    }
    RetryOutcome::Exhausted {
        attempts: policy.max_attempts,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures::FutureExt;
    use futures::executor::block_on;
    use std::cell::RefCell;

    /// Records requested durations. Sleeps matching `never` hang forever; the rest
    /// resolve immediately.
    #[derive(Default)]
    pub(crate) struct FakeTimer {
        pub(crate) slept: RefCell<Vec<Duration>>,
        pub(crate) never: Option<Duration>,
    }

    impl FakeTimer {
        /// Deadlines of this length never fire, so only the work itself can finish first.
        pub(crate) fn hanging(duration: Duration) -> Self {
            Self {
                slept: RefCell::default(),
                never: Some(duration),
            }
        }
    }

    impl Timer for FakeTimer {
        fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
            self.slept.borrow_mut().push(duration);
            if self.never == Some(duration) {
                futures::future::pending().boxed_local()
            } else {
                futures::future::ready(()).boxed_local()
            }
        }
    }

    const POLICY: RetryPolicy = RetryPolicy {
        max_attempts: 2,
        attempt_timeout: Duration::from_secs(10),
        backoff: Duration::from_secs(1),
    };

    #[test]
    fn timeout_lets_ready_future_win() {
        let timer = FakeTimer::default();
        let result = block_on(with_timeout(&timer, Duration::from_secs(30), async { 7 }));
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn timeout_fires_for_pending_future() {
        let timer = FakeTimer::default();
        let result = block_on(with_timeout(
            &timer,
            Duration::from_secs(30),
            futures::future::pending::<()>(),
        ));
        assert_eq!(result, Err(Elapsed));
    }

    #[test]
    fn first_success_stops_the_loop() {
        let timer = FakeTimer::hanging(POLICY.attempt_timeout);
        let cleanups = RefCell::new(Vec::new());
        let outcome = block_on(retry_bounded(
            &timer,
            POLICY,
            |_| async { AttemptResult::Done("ok") },
            |n| cleanups.borrow_mut().push(n),
        ));
        assert_eq!(outcome, RetryOutcome::Succeeded { value: "ok", attempt: 1 });
        assert!(cleanups.borrow().is_empty());
    }

    #[test]
    fn timed_out_attempts_are_cleaned_up_and_backed_off() {
        let timer = FakeTimer::default();
        let cleanups = RefCell::new(Vec::new());
        let outcome: RetryOutcome<()> = block_on(retry_bounded(
            &timer,
            POLICY,
            |_| futures::future::pending(),
            |n| cleanups.borrow_mut().push(n),
        ));
        assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 2 });
        assert_eq!(*cleanups.borrow(), vec![1, 2]);
        assert_eq!(
            *timer.slept.borrow(),
            vec![
                Duration::from_secs(10),
                Duration::from_secs(1),
                Duration::from_secs(10)
            ]
        );
    }

    #[test]
    fn second_attempt_can_succeed() {
        let timer = FakeTimer::hanging(POLICY.attempt_timeout);
        let outcome = block_on(retry_bounded(
            &timer,
            POLICY,
            |n| async move {
                if n == 1 {
                    AttemptResult::Failed
                } else {
                    AttemptResult::Done(n)
                }
            },
            |_| {},
        ));
        assert_eq!(outcome, RetryOutcome::Succeeded { value: 2, attempt: 2 });
    }

    #[test]
    fn cancellation_ends_without_retry() {
        let timer = FakeTimer::hanging(POLICY.attempt_timeout);
        let cleanups = RefCell::new(Vec::new());
        let outcome: RetryOutcome<()> = block_on(retry_bounded(
            &timer,
            POLICY,
            |_| async { AttemptResult::Canceled },
            |n| cleanups.borrow_mut().push(n),
        ));
        assert_eq!(outcome, RetryOutcome::Canceled { attempt: 1 });
        assert_eq!(*cleanups.borrow(), vec![1]);
    }
}
