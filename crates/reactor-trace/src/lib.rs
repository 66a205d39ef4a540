// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A black-box [`reactor_core::DispatchObserver`]: a fixed-size ring of
//! recent dispatch events plus a flat set of per-outcome counters.
//!
//! Pushing into the ring is guarded by a [`critical_section::Mutex`], the
//! same primitive `reactor-core`'s inbox uses — recording a trace entry is
//! safe to call from the same contexts a dispatch step itself runs in.
//! Counters are independent atomics so they can be read without taking the
//! ring's lock at all.

#![cfg_attr(not(test), no_std)]

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;
use reactor_core::{DispatchObserver, DispatchOutcome};

/// One recorded dispatch step.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct DispatchEvent {
    pub entity_id: u16,
    pub signal_id: u16,
    pub src_id: u16,
    pub state: u16,
    pub timestamp: u32,
}

#[derive(Copy, Clone, Debug, Default)]
struct Slot {
    event: DispatchEvent,
    count: u32,
}

/// `N`-entry ring with last-entry de-duplication, the same trick
/// `lib/ringbuf`'s `RecordEntry` impl uses: a repeat of the most recently
/// written event bumps its count instead of consuming a new slot.
struct Ring<const N: usize> {
    slots: [Slot; N],
    /// Index the next *new* entry will be written to.
    next: usize,
    /// How many of `slots` hold a real entry (saturates at `N`).
    filled: usize,
}

impl<const N: usize> Ring<N> {
    const EMPTY_SLOT: Slot = Slot {
        event: DispatchEvent {
            entity_id: 0,
            signal_id: 0,
            src_id: 0,
            state: 0,
            timestamp: 0,
        },
        count: 0,
    };

    const fn new() -> Self {
        Self {
            slots: [Self::EMPTY_SLOT; N],
            next: 0,
            filled: 0,
        }
    }

    fn record(&mut self, event: DispatchEvent) {
        if self.filled > 0 {
            let last = (self.next + N - 1) % N;
            if self.slots[last].event == event {
                self.slots[last].count = self.slots[last].count.saturating_add(1);
                return;
            }
        }
        self.slots[self.next] = Slot { event, count: 1 };
        self.next = (self.next + 1) % N;
        self.filled = (self.filled + 1).min(N);
    }

    /// The recorded entries, oldest first, each paired with its repeat
    /// count.
    fn for_each(&self, mut f: impl FnMut(DispatchEvent, u32)) {
        let start = if self.filled < N {
            0
        } else {
            self.next
        };
        for i in 0..self.filled {
            let slot = self.slots[(start + i) % N];
            f(slot.event, slot.count);
        }
    }
}

/// Per-[`DispatchOutcome`] totals, tracked independently of the ring so a
/// variant's lifetime count survives its entries being overwritten.
#[derive(Default)]
pub struct DispatchCounters {
    pub matched: AtomicU32,
    pub filtered: AtomicU32,
    pub handled: AtomicU32,
    pub unmatched: AtomicU32,
}

impl DispatchCounters {
    const fn new() -> Self {
        Self {
            matched: AtomicU32::new(0),
            filtered: AtomicU32::new(0),
            handled: AtomicU32::new(0),
            unmatched: AtomicU32::new(0),
        }
    }

    fn bump(&self, outcome: DispatchOutcome) {
        let counter = match outcome {
            DispatchOutcome::Matched => &self.matched,
            DispatchOutcome::Filtered => &self.filtered,
            DispatchOutcome::Handled => &self.handled,
            DispatchOutcome::Unmatched => &self.unmatched,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn matched(&self) -> u32 {
        self.matched.load(Ordering::Relaxed)
    }

    pub fn filtered(&self) -> u32 {
        self.filtered.load(Ordering::Relaxed)
    }

    pub fn handled(&self) -> u32 {
        self.handled.load(Ordering::Relaxed)
    }

    pub fn unmatched(&self) -> u32 {
        self.unmatched.load(Ordering::Relaxed)
    }
}

/// A fixed-capacity trace sink: the last `N` dispatch events plus lifetime
/// counts per outcome. Implements [`DispatchObserver`], so it plugs directly
/// into `dispatch_with_observer`/`dispatch_all_with_observer`.
pub struct Trace<const N: usize = 32, const PAYLOAD: usize = 4> {
    ring: Mutex<RefCell<Ring<N>>>,
    counters: DispatchCounters,
}

impl<const N: usize, const PAYLOAD: usize> Trace<N, PAYLOAD> {
    pub const fn new() -> Self {
        Self {
            ring: Mutex::new(RefCell::new(Ring::new())),
            counters: DispatchCounters::new(),
        }
    }

    pub fn counters(&self) -> &DispatchCounters {
        &self.counters
    }

    /// Calls `f` once per recorded entry, oldest first, with its repeat
    /// count.
    pub fn for_each_entry(&self, f: impl FnMut(DispatchEvent, u32)) {
        critical_section::with(|cs| self.ring.borrow(cs).borrow().for_each(f));
    }

    /// Number of distinct entries currently held (after de-duplication;
    /// bounded by `N`).
    pub fn entry_count(&self) -> usize {
        critical_section::with(|cs| self.ring.borrow(cs).borrow().filled)
    }
}

impl<const N: usize, const PAYLOAD: usize> Default for Trace<N, PAYLOAD> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, const PAYLOAD: usize> DispatchObserver<PAYLOAD> for Trace<N, PAYLOAD> {
    fn on_dispatch(
        &self,
        entity_id: u16,
        signal_id: u16,
        src_id: u16,
        state: u16,
        timestamp: u32,
        outcome: DispatchOutcome,
    ) {
        let event = DispatchEvent {
            entity_id,
            signal_id,
            src_id,
            state,
            timestamp,
        };
        critical_section::with(|cs| self.ring.borrow(cs).borrow_mut().record(event));
        self.counters.bump(outcome);
    }
}
