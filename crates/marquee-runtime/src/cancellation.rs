//! Cooperative shutdown for the stage loop.
//!
//! A [`CancellationSource`] is held by whoever may end the loop (the host,
//! a stdin reader, a deadline); the loop polls the matching
//! [`CancellationToken`] between frames. The first cancellation wins and its
//! [`CancelReason`] is kept so the host can report why the stage ended.
//!
//! # Example
//!
//! ```
//! use marquee_runtime::cancellation::{CancelReason, CancellationSource};
//! use std::time::Duration;
//!
//! let source = CancellationSource::new();
//! let token = source.token();
//!
//! let worker = std::thread::spawn(move || token.wait_timeout(Duration::from_secs(5)));
//! source.cancel(CancelReason::Requested);
//!
//! assert_eq!(worker.join().unwrap(), Some(CancelReason::Requested));
//! ```

#![forbid(unsafe_code)]

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use web_time::{Duration, Instant};

/// Why the stage was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The host or user asked to quit.
    Requested,
    /// A configured run duration elapsed.
    Deadline,
    /// The input source closed.
    InputClosed,
}

struct Shared {
    reason: Mutex<Option<CancelReason>>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Option<CancelReason>> {
        self.reason.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Cloneable view of a cancellation source.
#[derive(Clone)]
pub struct CancellationToken {
    shared: Arc<Shared>,
}

/// The side that triggers cancellation.
///
/// Dropping the source does not cancel; call [`cancel`](Self::cancel).
pub struct CancellationSource {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("reason", &self.reason())
            .finish()
    }
}

impl std::fmt::Debug for CancellationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationSource")
            .field("reason", &*self.shared.lock())
            .finish()
    }
}

impl CancellationSource {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                reason: Mutex::new(None),
                wake: Condvar::new(),
            }),
        }
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Cancel with `reason`. Returns `false` if already cancelled, in which
    /// case the first reason is kept.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        let mut slot = self.shared.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason);
        self.shared.wake.notify_all();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.lock().is_some()
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        *self.shared.lock()
    }

    /// Block until cancelled or `timeout` elapses. Returns the reason if
    /// cancelled. A timeout past the end of the clock waits until cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<CancelReason> {
        let deadline = Instant::now().checked_add(timeout);
        let mut slot = self.shared.lock();
        loop {
            if let Some(reason) = *slot {
                return Some(reason);
            }
            let remaining = deadline.map_or(Duration::MAX, |d| {
                d.saturating_duration_since(Instant::now())
            });
            if remaining.is_zero() {
                return None;
            }
            slot = self
                .shared
                .wake
                .wait_timeout(slot, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }
}
