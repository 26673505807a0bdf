//! Rate-limited warning logger
//!
//! A misconfigured pipeline can reject every document of every batch. This
//! logger emits at most one warning per interval and reports how many were
//! suppressed in between.
//!
//! ```ignore
//! use docsink_sinks::util::RateLimitedLogger;
//!
//! let logger = RateLimitedLogger::default();
//! for failure in &report.permanent {
//!     logger.warn("document rejected", &failure.error, &failure.document.to_string());
//! }
//! ```

use std::borrow::Cow;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default interval between emitted warnings
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Longest context string included in a warning, in bytes
pub const MAX_CONTEXT_LOG_LENGTH: usize = 256;

/// Logs at most once per interval, counting what it drops
pub struct RateLimitedLogger {
    min_interval: Duration,
    last_log_time: Mutex<Option<Instant>>,
    /// Events since the last emitted warning
    pending: AtomicU64,
    total: AtomicU64,
}

impl RateLimitedLogger {
    /// Create a logger emitting at most once per `min_interval`
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_log_time: Mutex::new(None),
            pending: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// Record an event and emit a warning unless one went out recently
    ///
    /// `context` is truncated to [`MAX_CONTEXT_LOG_LENGTH`]. Returns whether
    /// the warning was emitted.
    pub fn warn(&self, message: &str, error: &dyn Display, context: &str) -> bool {
        self.pending.fetch_add(1, Ordering::Relaxed);
        let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;

        if !self.try_acquire() {
            return false;
        }

        let suppressed = self.pending.swap(0, Ordering::Relaxed).saturating_sub(1);
        let context = truncate(context, MAX_CONTEXT_LOG_LENGTH);
        if suppressed > 0 {
            tracing::warn!(
                error = %error,
                context = %context,
                suppressed_count = suppressed,
                total,
                "{message} (rate-limited)"
            );
        } else {
            tracing::warn!(error = %error, context = %context, total, "{message}");
        }
        true
    }

    fn try_acquire(&self) -> bool {
        let mut last = self.last_log_time.lock();
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Events recorded since the last emitted warning
    pub fn pending_count(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }

    /// Events ever recorded
    pub fn total_count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl Default for RateLimitedLogger {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_INTERVAL)
    }
}

/// Cut `text` to at most `max` bytes on a char boundary
fn truncate(text: &str, max: usize) -> Cow<'_, str> {
    if text.len() <= max {
        return Cow::Borrowed(text);
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    Cow::Owned(format!("{}... ({} bytes)", &text[..end], text.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_warning_emitted() {
        let logger = RateLimitedLogger::new(Duration::from_secs(10));
        assert!(logger.warn("rejected", &"bad value", "{}"));
        assert_eq!(logger.total_count(), 1);
        assert_eq!(logger.pending_count(), 0);
    }

    #[test]
    fn test_rapid_warnings_suppressed() {
        let logger = RateLimitedLogger::new(Duration::from_secs(10));
        assert!(logger.warn("rejected", &"bad value", ""));

        for _ in 0..5 {
            assert!(!logger.warn("rejected", &"bad value", ""));
        }
        assert_eq!(logger.total_count(), 6);
        assert_eq!(logger.pending_count(), 5);
    }

    #[test]
    fn test_zero_interval_never_suppresses() {
        let logger = RateLimitedLogger::new(Duration::ZERO);
        assert!(logger.warn("a", &"e", ""));
        assert!(logger.warn("b", &"e", ""));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");

        let long = "é".repeat(200);
        let cut = truncate(&long, MAX_CONTEXT_LOG_LENGTH);
        assert!(cut.starts_with(&"é".repeat(128)));
        assert!(cut.ends_with("... (400 bytes)"));
    }
}
