//! Minimum-interval throttle shared by every outbound call of a dispatcher

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default request ceiling (requests per second)
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 199;

/// Spacing between calls for a requests-per-second ceiling
///
/// Zero means unthrottled.
pub fn interval_for(requests_per_second: u32) -> Duration {
    if requests_per_second == 0 {
        Duration::ZERO
    } else {
        Duration::from_secs(1) / requests_per_second
    }
}

#[derive(Debug)]
struct ThrottleState {
    /// Issue time of the most recent outbound call
    last_call: Option<Instant>,
    min_interval: Duration,
}

/// Keeps consecutive outbound calls at least `min_interval` apart
///
/// `reserve` is the only critical section: it reads the last call time,
/// picks the issue time for the caller and stamps it before the lock is
/// released. Callers then sleep on their own, so concurrent callers are
/// spaced by their reservations rather than by holding the lock.
#[derive(Debug)]
pub struct Throttle {
    state: Mutex<ThrottleState>,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::per_second(DEFAULT_REQUESTS_PER_SECOND)
    }
}

impl Throttle {
    /// Creates a throttle with the given minimum spacing
    pub fn new(min_interval: Duration) -> Self {
        Self {
            state: Mutex::new(ThrottleState {
                last_call: None,
                min_interval,
            }),
        }
    }

    /// Creates a throttle allowing `requests_per_second` calls per second
    pub fn per_second(requests_per_second: u32) -> Self {
        Self::new(interval_for(requests_per_second))
    }

    /// Current minimum spacing
    pub fn min_interval(&self) -> Duration {
        self.state.lock().min_interval
    }

    /// Changes the minimum spacing for future reservations
    pub fn set_min_interval(&self, min_interval: Duration) {
        self.state.lock().min_interval = min_interval;
    }

    /// Issue time of the most recent reserved call
    pub fn last_call(&self) -> Option<Instant> {
        self.state.lock().last_call
    }

    /// Claims the next call slot and records it as the last call
    ///
    /// Returns the instant at which the caller may issue its request.
    pub fn reserve(&self) -> Instant {
        let now = Instant::now();
        let mut state = self.state.lock();
        let slot = match state.last_call {
            Some(last) => now.max(last + state.min_interval),
            None => now,
        };
        state.last_call = Some(slot);
        slot
    }

    /// Waits until the caller is allowed to issue a call
    ///
    /// Sleeps only for the remaining part of the interval, if any.
    pub async fn acquire(&self) {
        let slot = self.reserve();
        let now = Instant::now();
        if slot > now {
            debug!(wait = ?(slot - now), "throttling outbound call");
            tokio::time::sleep_until(slot).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_interval_for_default_rate() {
        assert_eq!(interval_for(199), Duration::from_nanos(5_025_125));
        assert_eq!(interval_for(1), Duration::from_secs(1));
        assert_eq!(interval_for(0), Duration::ZERO);
    }

    #[test]
    fn test_first_reservation_is_immediate() {
        let throttle = Throttle::new(Duration::from_secs(10));
        let before = Instant::now();

        let slot = throttle.reserve();

        assert!(slot >= before);
        assert!(slot <= Instant::now());
        assert_eq!(throttle.last_call(), Some(slot));
    }

    #[test]
    fn test_reservations_are_spaced() {
        let throttle = Throttle::new(Duration::from_secs(10));

        let first = throttle.reserve();
        let second = throttle.reserve();
        let third = throttle.reserve();

        assert!(second - first >= Duration::from_secs(10));
        assert!(third - second >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_acquire_spacing_between_sequential_calls() {
        let interval = Duration::from_millis(20);
        let throttle = Throttle::new(interval);
        let start = Instant::now();

        for _ in 0..4 {
            throttle.acquire().await;
        }

        assert!(start.elapsed() >= interval * 3);
    }

    #[tokio::test]
    async fn test_acquire_spacing_between_concurrent_calls() {
        let interval = Duration::from_millis(20);
        let throttle = Arc::new(Throttle::new(interval));
        let start = Instant::now();

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let throttle = Arc::clone(&throttle);
                tokio::spawn(async move {
                    throttle.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut issued = Vec::new();
        for task in tasks {
            issued.push(task.await.expect("task should not panic"));
        }
        issued.sort();

        assert!(*issued.last().unwrap() - start >= interval * 4);
    }

    #[tokio::test]
    async fn test_zero_interval_never_waits() {
        let throttle = Throttle::per_second(0);
        let start = Instant::now();

        for _ in 0..100 {
            throttle.acquire().await;
        }

        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
