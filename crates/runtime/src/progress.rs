//! Wall-clock deadlines and progress reporting (§5 "Cancellation and
//! timeouts").
//!
//! Workers never block on a deadline directly: [`Deadline::expired`]
//! is a plain, lock-free check the scheduler makes between rule
//! firings, and [`spawn_reporter`] runs on its own thread so a
//! worker's hot loop never touches stderr.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Copy)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    pub fn none() -> Self {
        Deadline { expires_at: None }
    }

    pub fn after(duration: Duration) -> Self {
        Deadline { expires_at: Some(Instant::now() + duration) }
    }

    pub fn expired(&self) -> bool {
        matches!(self.expires_at, Some(at) if Instant::now() >= at)
    }
}

/// Spawns a background thread that prints an "explored N states"
/// summary to stderr every `interval`, until `stop` is observed set.
/// Returns the thread's join handle; the caller sets `stop` and joins
/// once exploration ends so the final count is accurate.
pub fn spawn_reporter(
    explored: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
    interval: Duration,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        while !stop.load(Ordering::Acquire) {
            std::thread::sleep(interval);
            if stop.load(Ordering::Acquire) {
                break;
            }
            let count = explored.load(Ordering::Relaxed);
            let _ = writeln!(std::io::stderr(), "rumur: explored {count} states");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_deadline_with_no_expiry_never_expires() {
        assert!(!Deadline::none().expired());
    }

    #[test]
    fn a_past_deadline_is_immediately_expired() {
        let deadline = Deadline::after(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(deadline.expired());
    }

    #[test]
    fn a_future_deadline_has_not_expired_yet() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(!deadline.expired());
    }
}
