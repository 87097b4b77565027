#![forbid(unsafe_code)]

//! Virtual-clock timer queue owned by a single engine.
//!
//! Every engine in this crate keeps its own [`TimerQueue`] and moves time
//! forward only through `tick(dt)`. Nothing is shared, so there is no global
//! timer that can outlive the engine that scheduled it: dropping the engine
//! drops its queue and every pending timer with it.
//!
//! # Draining
//!
//! Timers are popped one at a time with [`TimerQueue::poll`], in due order,
//! and the clock jumps to each timer's due time before the caller sees it.
//! Handlers therefore observe a consistent `now()` and any cancellation they
//! perform takes effect before the next timer is considered:
//!
//! ```
//! use std::time::Duration;
//! use marquee_core::timer::TimerQueue;
//!
//! let mut queue = TimerQueue::new();
//! let _tick = queue.every(Duration::from_millis(100), "tick").unwrap();
//!
//! let deadline = queue.now() + Duration::from_millis(250);
//! let mut fired = Vec::new();
//! while let Some(timer) = queue.poll(deadline) {
//!     fired.push((timer.at, timer.event));
//! }
//! queue.settle(deadline);
//!
//! assert_eq!(fired.len(), 2);
//! assert_eq!(queue.now(), Duration::from_millis(250));
//! ```
//!
//! # Invariants
//!
//! 1. `now()` never decreases.
//! 2. Timers due at the same instant fire in creation order.
//! 3. A cancelled timer never fires.
//! 4. A recurring timer fires once per elapsed period, even when a single
//!    deadline spans several periods.
//! 5. Recurring periods are non-zero (rejected on scheduling).
//! 6. Due times saturate at `Duration::MAX`. A recurring timer whose next
//!    due time would pass it is retired after its last firing.

use std::fmt;
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Identity of a scheduled timer, unique within one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Owned handle to a pending timer.
///
/// Not `Clone`: cancelling consumes it, so a timer can be cancelled at most
/// once through its handle.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping the handle makes the timer uncancellable"]
pub struct TimerHandle {
    id: TimerId,
}

impl TimerHandle {
    #[inline]
    pub fn id(&self) -> TimerId {
        self.id
    }
}

/// Whether a timer re-arms after firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Once,
    Every(Duration),
}

/// A timer popped from the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Fired<E> {
    pub id: TimerId,
    /// Queue time at which the timer was due.
    pub at: Duration,
    pub event: E,
}

struct Entry<E> {
    id: TimerId,
    due: Duration,
    repeat: Repeat,
    event: E,
}

/// Single-owner queue of deferred and recurring timers carrying events `E`.
pub struct TimerQueue<E> {
    now: Duration,
    next_id: u64,
    /// Sorted by `(due, id)`.
    entries: Vec<Entry<E>>,
}

impl<E> fmt::Debug for TimerQueue<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("now", &self.now)
            .field("pending", &self.entries.len())
            .field("next_due", &self.next_due())
            .finish()
    }
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TimerQueue<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Current queue time.
    #[inline]
    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of pending timers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Due time of the earliest pending timer.
    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        self.entries.first().map(|e| e.due)
    }

    /// Fire `event` once, `delay` from now.
    pub fn after(&mut self, delay: Duration, event: E) -> TimerHandle {
        let due = self.now.saturating_add(delay);
        self.schedule(due, Repeat::Once, event)
    }

    /// Fire `event` every `period`, first at `now + period`.
    pub fn every(&mut self, period: Duration, event: E) -> Result<TimerHandle> {
        ConfigError::require_period(period, "recurring timer")?;
        let due = self.now.saturating_add(period);
        Ok(self.schedule(due, Repeat::Every(period), event))
    }

    /// Cancel a pending timer. Returns `false` if it already fired (one-shot)
    /// or was removed by [`cancel_all`](Self::cancel_all).
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.position(handle.id) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer, returning how many were removed.
    pub fn cancel_all(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    #[must_use]
    pub fn is_pending(&self, handle: &TimerHandle) -> bool {
        self.position(handle.id).is_some()
    }

    /// Move the clock forward to `deadline` (never backward).
    pub fn settle(&mut self, deadline: Duration) {
        if deadline > self.now {
            self.now = deadline;
        }
    }

    /// Collapse every period of a recurring timer that is due by `deadline`
    /// into one step, returning how many periods elapsed.
    ///
    /// The clock moves to the last of those firings and the timer is re-armed
    /// one period after it. Other timers are not interleaved, so this is for
    /// an engine whose only pending timer is `handle`. One-shot and unknown
    /// timers are left alone and report zero.
    pub fn skip_elapsed(&mut self, handle: &TimerHandle, deadline: Duration) -> u128 {
        let Some(idx) = self.position(handle.id) else {
            return 0;
        };
        let entry = &self.entries[idx];
        let Repeat::Every(period) = entry.repeat else {
            return 0;
        };
        if entry.due > deadline {
            return 0;
        }
        let period_ns = period.as_nanos();
        let periods = (deadline - entry.due).as_nanos() / period_ns + 1;
        let last = entry
            .due
            .saturating_add(duration_from_nanos((periods - 1) * period_ns));

        let mut entry = self.entries.remove(idx);
        self.settle(last);
        if let Some(next) = last.checked_add(period) {
            entry.due = next;
            self.insert(entry);
        }
        periods
    }

    fn schedule(&mut self, due: Duration, repeat: Repeat, event: E) -> TimerHandle {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.insert(Entry {
            id,
            due,
            repeat,
            event,
        });
        TimerHandle { id }
    }

    fn insert(&mut self, entry: Entry<E>) {
        let key = (entry.due, entry.id);
        let idx = self.entries.partition_point(|e| (e.due, e.id) <= key);
        self.entries.insert(idx, entry);
    }

    fn position(&self, id: TimerId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }
}

impl<E: Clone> TimerQueue<E> {
    /// Pop the earliest timer due at or before `deadline`.
    ///
    /// The clock moves to the timer's due time. Recurring timers are re-armed
    /// one period later before this returns.
    pub fn poll(&mut self, deadline: Duration) -> Option<Fired<E>> {
        if self.entries.first()?.due > deadline {
            return None;
        }
        let entry = self.entries.remove(0);
        self.settle(entry.due);

        let fired = Fired {
            id: entry.id,
            at: entry.due,
            event: entry.event.clone(),
        };
        if let Repeat::Every(period) = entry.repeat {
            if let Some(due) = entry.due.checked_add(period) {
                self.insert(Entry { due, ..entry });
            }
        }
        Some(fired)
    }
}

fn duration_from_nanos(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let secs = u64::try_from(nanos / NANOS_PER_SEC).unwrap_or(u64::MAX);
    let subsec = u32::try_from(nanos % NANOS_PER_SEC).unwrap_or(0);
    Duration::new(secs, subsec)
}

/// Caller-facing token for one run of an engine.
///
/// Returned by an engine's `start()` and consumed by its `stop()`. Each start
/// bumps the engine's generation, so a handle from an earlier run cannot stop
/// a later one.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "keep the run handle to stop the engine on teardown"]
pub struct RunHandle {
    generation: u64,
}

impl RunHandle {
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Generation bookkeeping behind [`RunHandle`].
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Lifecycle {
    generation: u64,
    active: bool,
}

impl Lifecycle {
    pub(crate) fn begin(&mut self) -> RunHandle {
        self.generation += 1;
        self.active = true;
        RunHandle {
            generation: self.generation,
        }
    }

    /// End the run identified by `handle`. Stale or already-ended runs are
    /// left alone and `false` is returned.
    pub(crate) fn end(&mut self, handle: RunHandle) -> bool {
        if handle.generation != self.generation || !self.active {
            return false;
        }
        self.active = false;
        true
    }

    /// The run ended on its own.
    pub(crate) fn finish(&mut self) {
        self.active = false;
    }

    #[inline]
    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}
