//! One-shot deadline timer owned by a single connection task.

use std::future::poll_fn;
use std::pin::Pin;
use std::task::Poll;
use std::time::Duration;

use tokio::time::{Instant, Sleep, sleep_until};
use tracing::trace;

/// Identifies one arming of a [`DeadlineTimer`].
///
/// Handles of earlier arms go stale as soon as the timer is armed again,
/// cancelling a stale handle does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    generation: u64,
}

/// The deadline of an armed timer elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expired {
    pub handle: TimerHandle,
    pub armed_at: Instant,
    pub fired_at: Instant,
}

impl Expired {
    pub fn elapsed(&self) -> Duration {
        self.fired_at.saturating_duration_since(self.armed_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Idle,
    Armed { handle: TimerHandle, armed_at: Instant },
    Cancelled,
    Fired,
}

/// A one-shot countdown that can be armed, cancelled and awaited.
///
/// The timer never runs on its own: it fires while [`DeadlineTimer::expired`]
/// is being polled, which the owning connection does from the same
/// `select!` that reads the socket. A firing therefore never overlaps with
/// another event of the same connection.
#[derive(Debug)]
pub struct DeadlineTimer {
    sleep: Option<Pin<Box<Sleep>>>,
    slot: Slot,
    generation: u64,
}

impl DeadlineTimer {
    pub fn new() -> Self {
        Self { sleep: None, slot: Slot::Idle, generation: 0 }
    }

    /// Schedules a firing `duration` from now.
    ///
    /// `None` means the deadline is disabled: nothing is scheduled and no
    /// handle is returned. Arming an already armed timer replaces the
    /// previous deadline.
    pub fn arm(&mut self, duration: Option<Duration>) -> Option<TimerHandle> {
        let duration = duration?;

        let armed_at = Instant::now();
        self.generation += 1;
        let handle = TimerHandle { generation: self.generation };

        let deadline = armed_at + duration;
        match self.sleep.as_mut() {
            Some(sleep) => sleep.as_mut().reset(deadline),
            None => self.sleep = Some(Box::pin(sleep_until(deadline))),
        }
        self.slot = Slot::Armed { handle, armed_at };
        trace!(generation = handle.generation, timeout_ms = duration.as_millis(), "deadline armed");
        Some(handle)
    }

    /// Prevents `handle` from firing.
    ///
    /// Returns whether an armed deadline was actually cancelled; stale,
    /// fired or already cancelled handles are ignored.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.slot {
            Slot::Armed { handle: armed, .. } if armed == handle => {
                self.slot = Slot::Cancelled;
                trace!(generation = handle.generation, "deadline cancelled");
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.slot, Slot::Armed { .. })
    }

    pub fn is_fired(&self) -> bool {
        self.slot == Slot::Fired
    }

    /// Resolves once the armed deadline elapses.
    ///
    /// Stays pending forever when the timer is idle, cancelled, disabled or
    /// has already fired, so it can sit in a `select!` branch unconditionally.
    pub async fn expired(&mut self) -> Expired {
        poll_fn(|cx| {
            let (Slot::Armed { handle, armed_at }, Some(sleep)) = (self.slot, self.sleep.as_mut()) else {
                return Poll::Pending;
            };

            match sleep.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    self.slot = Slot::Fired;
                    Poll::Ready(Expired { handle, armed_at, fired_at: Instant::now() })
                }
                Poll::Pending => Poll::Pending,
            }
        })
        .await
    }
}

impl Default for DeadlineTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_duration() {
        let mut timer = DeadlineTimer::new();
        let handle = timer.arm(Some(Duration::from_millis(600))).unwrap();

        advance(Duration::from_millis(599)).await;
        assert!(timer.expired().now_or_never().is_none());

        advance(Duration::from_millis(1)).await;
        let expired = timer.expired().now_or_never().unwrap();
        assert_eq!(expired.handle, handle);
        assert_eq!(expired.elapsed(), Duration::from_millis(600));
        assert!(timer.is_fired());

        // never a second time
        advance(Duration::from_secs(10)).await;
        assert!(timer.expired().now_or_never().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_never_fires() {
        let mut timer = DeadlineTimer::new();
        assert!(timer.arm(None).is_none());
        assert!(!timer.is_armed());

        advance(Duration::from_secs(3600)).await;
        assert!(timer.expired().now_or_never().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let mut timer = DeadlineTimer::new();
        let handle = timer.arm(Some(Duration::from_millis(100))).unwrap();

        assert!(timer.cancel(handle));
        assert!(!timer.cancel(handle));

        advance(Duration::from_millis(200)).await;
        assert!(timer.expired().now_or_never().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_fire_is_noop() {
        let mut timer = DeadlineTimer::new();
        let handle = timer.arm(Some(Duration::from_millis(100))).unwrap();

        advance(Duration::from_millis(100)).await;
        assert!(timer.expired().now_or_never().is_some());

        assert!(!timer.cancel(handle));
        assert!(timer.is_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_makes_old_handle_stale() {
        let mut timer = DeadlineTimer::new();
        let first = timer.arm(Some(Duration::from_millis(100))).unwrap();
        let second = timer.arm(Some(Duration::from_millis(300))).unwrap();

        assert!(!timer.cancel(first));
        assert!(timer.is_armed());

        advance(Duration::from_millis(150)).await;
        assert!(timer.expired().now_or_never().is_none());

        advance(Duration::from_millis(150)).await;
        assert_eq!(timer.expired().now_or_never().map(|expired| expired.handle), Some(second));
    }
}
