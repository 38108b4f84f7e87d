//! Request pacing toward a fixed target rate

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sub-threshold deltas are scheduler noise; sleeping on them would busy-loop.
const JITTER_THRESHOLD: Duration = Duration::from_millis(100);

/// Paces outbound requests so the observed rate converges to
/// `requests_per_second` by injecting delays.
///
/// A rate of `None` (or zero) disables pacing entirely. One instance is
/// normally owned by a single worker's HTTP client, but the contract holds
/// under concurrent callers: the request slot is reserved and the delay
/// computed under one lock, with only the sleep itself outside it.
pub struct RateThrottle {
    requests_per_second: Option<f64>,
    state: Mutex<ThrottleState>,
}

struct ThrottleState {
    total_requests: u64,
    started: Instant,
}

impl RateThrottle {
    pub fn new(requests_per_second: Option<f64>) -> Self {
        let rate = requests_per_second.filter(|r| *r > 0.0);
        Self {
            requests_per_second: rate,
            state: Mutex::new(ThrottleState {
                total_requests: 0,
                started: Instant::now(),
            }),
        }
    }

    /// Account for one outgoing request, sleeping if we are ahead of the
    /// target rate. Returns the injected delay (zero when none was needed).
    pub fn pace(&self) -> Duration {
        let Some(rate) = self.requests_per_second else {
            return Duration::ZERO;
        };

        let delay = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let ideal = Duration::from_secs_f64(state.total_requests as f64 / rate);
            state.total_requests += 1;
            ideal.saturating_sub(state.started.elapsed())
        };

        if delay > JITTER_THRESHOLD {
            std::thread::sleep(delay);
            delay
        } else {
            Duration::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn unset_rate_never_delays() {
        let throttle = RateThrottle::new(None);
        let start = Instant::now();
        for _ in 0..1000 {
            assert_eq!(throttle.pace(), Duration::ZERO);
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn zero_rate_never_delays() {
        let throttle = RateThrottle::new(Some(0.0));
        assert_eq!(throttle.pace(), Duration::ZERO);
    }

    #[test]
    fn converges_to_target_rate() {
        // 5 requests at 10 req/s: ideal elapsed for the 5th is 400ms,
        // so the whole run must take at least (M-1)/R within tolerance.
        let throttle = RateThrottle::new(Some(10.0));
        let start = Instant::now();
        for _ in 0..5 {
            throttle.pace();
        }
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn sub_threshold_delay_is_skipped() {
        // 1000 req/s means per-request spacing of 1ms, well under the
        // jitter threshold — pace() should never sleep.
        let throttle = RateThrottle::new(Some(1000.0));
        let start = Instant::now();
        for _ in 0..20 {
            throttle.pace();
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn shared_across_threads() {
        let throttle = std::sync::Arc::new(RateThrottle::new(Some(20.0)));
        let start = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let t = throttle.clone();
                std::thread::spawn(move || {
                    for _ in 0..3 {
                        t.pace();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        // 12 requests at 20 req/s: last slot's ideal elapsed is 550ms.
        assert!(start.elapsed() >= Duration::from_millis(450));
    }
}
