// src/engine/tracker.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

/// Countdown latch the invoking thread blocks on until every node has been
/// accounted for (run, failed or skipped).
///
/// Counting down is a single atomic subtraction; the mutex is only taken by
/// the thread that brings the count to zero and by the waiter.
#[derive(Debug)]
pub struct CompletionTracker {
    remaining: AtomicUsize,
    done: Mutex<bool>,
    cv: Condvar,
}

impl CompletionTracker {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
            done: Mutex::new(count == 0),
            cv: Condvar::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Account for `n` finished nodes.
    ///
    /// Returns `true` if this call released the waiter.
    pub fn count_down(&self, n: usize) -> bool {
        if n == 0 {
            return false;
        }
        let prev = self.remaining.fetch_sub(n, Ordering::AcqRel);
        debug_assert!(prev >= n, "completion tracker counted below zero");
        if prev != n {
            return false;
        }

        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        *done = true;
        self.cv.notify_all();
        true
    }

    /// Block until the count reaches zero.
    pub fn wait(&self) {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        while !*done {
            done = self.cv.wait(done).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::thread;

    #[test]
    fn zero_count_never_blocks() {
        let tracker = CompletionTracker::new(0);
        tracker.wait();
        assert_eq!(tracker.remaining(), 0);
    }

    #[test]
    fn only_the_last_count_down_releases() {
        let tracker = CompletionTracker::new(3);
        assert!(!tracker.count_down(1));
        assert!(!tracker.count_down(0));
        assert!(tracker.count_down(2));
        assert_eq!(tracker.remaining(), 0);
        tracker.wait();
    }

    #[test]
    fn waiter_is_released_by_other_threads() {
        let tracker = Arc::new(CompletionTracker::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let t = Arc::clone(&tracker);
                thread::spawn(move || {
                    t.count_down(1);
                })
            })
            .collect();

        tracker.wait();
        assert_eq!(tracker.remaining(), 0);
        for h in handles {
            h.join().unwrap();
        }
    }
}
