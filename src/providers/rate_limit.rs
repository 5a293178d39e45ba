//! Local backpressure: at most `max_calls` calls per sliding `window`.
//!
//! A call that would exceed the window waits for a free slot instead of failing.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        let max_calls = max_calls.max(1);
        Self {
            max_calls,
            window,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    pub fn capacity(&self) -> (usize, Duration) {
        (self.max_calls, self.window)
    }

    /// Wait until a call is permitted, then record it.
    ///
    /// The lock is held while waiting, so concurrent callers are admitted in order.
    pub async fn acquire(&self) {
        let mut calls = self.calls.lock().await;
        loop {
            let now = Instant::now();
            while calls
                .front()
                .is_some_and(|&t| now.duration_since(t) >= self.window)
            {
                calls.pop_front();
            }

            if calls.len() < self.max_calls {
                calls.push_back(now);
                return;
            }

            if let Some(&oldest) = calls.front() {
                let wait = self.window.saturating_sub(now.duration_since(oldest));
                debug!("Rate limit reached ({} per {:?}), waiting {:?}", self.max_calls, self.window, wait);
                tokio::time::sleep(wait).await;
            }
        }
    }
}
