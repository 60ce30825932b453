// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-source polling rate limiter
//!
//! Each sensor source thread polls its transport at a configured rate.
//! The limiter tracks the last poll instant; the source loop asks
//! `should_poll_now` and sleeps `time_until_next_poll` otherwise.

use std::time::{Duration, Instant};

pub struct RateLimiter {
    interval: Duration,
    last_poll: Option<Instant>,
}

impl RateLimiter {
    /// `rate_hz` at or below zero disables limiting (poll every pass)
    pub fn new(rate_hz: f64) -> Self {
        Self {
            interval: Self::interval_for(rate_hz),
            last_poll: None,
        }
    }

    fn interval_for(rate_hz: f64) -> Duration {
        if rate_hz > 0.0 {
            Duration::from_secs_f64(1.0 / rate_hz)
        } else {
            Duration::ZERO
        }
    }

    /// True when enough time has elapsed since the last recorded poll.
    /// Records the poll instant when it returns true.
    pub fn should_poll_now(&mut self) -> bool {
        let now = Instant::now();
        let due = match self.last_poll {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        };
        if due {
            self.last_poll = Some(now);
        }
        due
    }

    /// Remaining wait before the next poll is due
    pub fn time_until_next_poll(&self) -> Duration {
        match self.last_poll {
            None => Duration::ZERO,
            Some(last) => self.interval.saturating_sub(last.elapsed()),
        }
    }

    pub fn set_rate(&mut self, rate_hz: f64) {
        self.interval = Self::interval_for(rate_hz);
    }

    pub fn rate_hz(&self) -> f64 {
        if self.interval.is_zero() {
            0.0
        } else {
            1.0 / self.interval.as_secs_f64()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_poll_is_always_due() {
        let mut limiter = RateLimiter::new(1.0);
        assert!(limiter.should_poll_now());
        assert!(!limiter.should_poll_now());
    }

    #[test]
    fn zero_rate_never_limits() {
        let mut limiter = RateLimiter::new(0.0);
        for _ in 0..5 {
            assert!(limiter.should_poll_now());
        }
    }

    #[test]
    fn becomes_due_after_interval() {
        let mut limiter = RateLimiter::new(100.0); // 10ms
        assert!(limiter.should_poll_now());
        assert!(!limiter.should_poll_now());
        std::thread::sleep(Duration::from_millis(15));
        assert!(limiter.should_poll_now());
    }

    #[test]
    fn reports_remaining_wait() {
        let mut limiter = RateLimiter::new(2.0); // 500ms
        assert_eq!(limiter.time_until_next_poll(), Duration::ZERO);
        limiter.should_poll_now();
        let wait = limiter.time_until_next_poll();
        assert!(wait > Duration::from_millis(400));
        assert!(wait <= Duration::from_millis(500));
    }

    #[test]
    fn rate_roundtrips() {
        let limiter = RateLimiter::new(10.0);
        assert!((limiter.rate_hz() - 10.0).abs() < 1e-9);
    }
}
