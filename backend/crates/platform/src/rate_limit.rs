//! Rate Limiting Infrastructure
//!
//! Fixed-window arithmetic shared by every rate-limit store. The counters
//! themselves live in durable storage; this module only decides which
//! window a timestamp falls into and how to report usage.

use std::time::Duration;

/// Rate limit configuration for one bucket family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// `max_requests` per hour
    pub fn per_hour(max_requests: u32) -> Self {
        Self::new(max_requests, 3600)
    }

    pub fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }

    /// Window containing `now_ms` for this configuration
    pub fn window_at(&self, now_ms: i64) -> FixedWindow {
        FixedWindow::containing(now_ms, self.window_ms())
    }
}

/// A fixed time bucket `[start_ms, end_ms)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl FixedWindow {
    /// Truncate `now_ms` down to a multiple of `window_ms`
    pub fn containing(now_ms: i64, window_ms: i64) -> Self {
        let window_ms = window_ms.max(1);
        let start_ms = now_ms.div_euclid(window_ms) * window_ms;
        Self {
            start_ms,
            end_ms: start_ms + window_ms,
        }
    }
}

/// Usage of one bucket, as observed at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub used: u32,
    pub ceiling: u32,
    pub reset_at_ms: i64,
}

impl RateLimitSnapshot {
    pub fn remaining(&self) -> u32 {
        self.ceiling.saturating_sub(self.used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.ceiling
    }

    /// Whole seconds until the window resets (at least 1)
    pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
        let ms = (self.reset_at_ms - now_ms).max(0) as u64;
        ms.div_ceil(1000).max(1)
    }
}
