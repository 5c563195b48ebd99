//! Cooperative timer pool.
//!
//! Every timed behavior in the arena (spawning, shields, freezes, flashing,
//! delayed removals) is an entry in a [`TimerPool`]. Entries carry a plain
//! data payload instead of a closure; the owner of the pool decides what a
//! payload means when it fires.
//!
//! The pool is advanced by elapsed milliseconds once per simulation tick.
//! An entry fires whenever its accumulator is strictly greater than its
//! interval, once per elapsed interval, so a large `elapsed_ms` fires the
//! same entry several times.
//!
//! # Mutation while firing
//!
//! Firing is split in two calls so the caller can mutate the pool from a
//! handler: [`TimerPool::begin_tick`] advances every current entry and
//! returns a snapshot of handles, and [`TimerPool::take_due`] pops one due
//! firing for one handle. Entries cancelled mid-tick stop firing, entries
//! added mid-tick wait for the next tick.
//!
//! ```
//! use tank_core::timer::{Repeat, TimerPool};
//!
//! let mut pool = TimerPool::new();
//! pool.schedule(100, "blink", Repeat::Forever);
//!
//! let mut fired = Vec::new();
//! pool.tick(250, |_, _, event| fired.push(event));
//! assert_eq!(fired, vec!["blink", "blink"]);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Opaque handle identifying one scheduled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Raw handle value (for logs and protocol output).
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// How many times an entry fires before it removes itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Repeat {
    /// Fire until cancelled.
    Forever,
    /// Fire this many times, then remove.
    Times(u32),
}

impl Repeat {
    /// Fire exactly once.
    pub const ONCE: Self = Self::Times(1);

    /// Convert the classic signed convention (`-1` = infinite).
    #[must_use]
    pub const fn from_count(count: i32) -> Self {
        if count < 0 {
            Self::Forever
        } else {
            Self::Times(count as u32)
        }
    }

    const fn exhausted_after(self, fires: u32) -> bool {
        match self {
            Self::Forever => false,
            Self::Times(n) => fires >= n,
        }
    }
}

/// One scheduled entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerEntry<E> {
    /// Interval between firings in milliseconds.
    pub interval_ms: u32,
    /// Payload handed back on every firing.
    pub event: E,
    /// Firing budget.
    pub repeat: Repeat,
    /// Milliseconds accumulated since the last firing.
    pub elapsed_ms: u32,
    /// Number of times this entry has fired.
    pub fires: u32,
}

/// Single-threaded scheduler of delayed and repeating events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerPool<E> {
    entries: BTreeMap<TimerHandle, TimerEntry<E>>,
    next_handle: u64,
}

impl<E> Default for TimerPool<E> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_handle: 1,
        }
    }
}

impl<E: Clone> TimerPool<E> {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `event` to fire every `interval_ms` milliseconds.
    ///
    /// An interval of zero is treated as one millisecond.
    pub fn schedule(&mut self, interval_ms: u32, event: E, repeat: Repeat) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.insert(
            handle,
            TimerEntry {
                interval_ms: interval_ms.max(1),
                event,
                repeat,
                elapsed_ms: 0,
                fires: 0,
            },
        );
        handle
    }

    /// Remove an entry. Unknown or already-finished handles are ignored.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.entries.remove(&handle).is_some()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// True if the handle still refers to a live entry.
    #[must_use]
    pub fn contains(&self, handle: TimerHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Look up an entry.
    #[must_use]
    pub fn get(&self, handle: TimerHandle) -> Option<&TimerEntry<E>> {
        self.entries.get(&handle)
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entries are scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in scheduling order.
    pub fn iter(&self) -> impl Iterator<Item = (TimerHandle, &TimerEntry<E>)> {
        self.entries.iter().map(|(handle, entry)| (*handle, entry))
    }

    /// Add `elapsed_ms` to every current entry and return their handles in
    /// scheduling order.
    pub fn begin_tick(&mut self, elapsed_ms: u32) -> Vec<TimerHandle> {
        for entry in self.entries.values_mut() {
            entry.elapsed_ms = entry.elapsed_ms.saturating_add(elapsed_ms);
        }
        self.entries.keys().copied().collect()
    }

    /// Pop one due firing for `handle`.
    ///
    /// Returns `None` once the entry is no longer due or no longer exists.
    /// A finite entry is removed before its last payload is returned.
    pub fn take_due(&mut self, handle: TimerHandle) -> Option<E> {
        let entry = self.entries.get_mut(&handle)?;
        if entry.elapsed_ms <= entry.interval_ms {
            return None;
        }
        entry.elapsed_ms -= entry.interval_ms;
        entry.fires += 1;
        let event = entry.event.clone();
        if entry.repeat.exhausted_after(entry.fires) {
            self.entries.remove(&handle);
        }
        Some(event)
    }

    /// Advance all entries and invoke `on_fire` for every due firing.
    ///
    /// The handler receives the pool itself, so it may schedule or cancel
    /// entries while the tick is in progress.
    pub fn tick<F>(&mut self, elapsed_ms: u32, mut on_fire: F)
    where
        F: FnMut(&mut Self, TimerHandle, E),
    {
        for handle in self.begin_tick(elapsed_ms) {
            while let Some(event) = self.take_due(handle) {
                on_fire(self, handle, event);
            }
        }
    }
}
