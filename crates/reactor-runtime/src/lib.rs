// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The tight loop a board's `main` drives: drain every entity's inbox,
//! deliver `SIG_TIMEOUT` to coroutines whose wait has matured, and idle when
//! there was nothing to do.

#![cfg_attr(not(test), no_std)]

use reactor_abi::{deadline_elapsed, Clock, Idle, Signal, SIG_TIMEOUT};
use reactor_core::{dispatch_all, Registry};

/// Runs one cycle over every entity in `registry`:
///
/// 1. `dispatch_all` on each entity, in id order.
/// 2. Deliver `SIG_TIMEOUT` to any entity whose coroutine's wait has
///    matured (`flow_wait_until != 0 && flow_wait_until <= now`).
/// 3. If nothing was processed this cycle, idle until `idle_ms` have
///    elapsed or the earliest pending `flow_wait_until`, whichever is
///    sooner.
///
/// Returns the count of signals processed in step 1. The caller is
/// expected to call this in a tight loop.
pub fn run<
    const PAYLOAD: usize,
    const SCRATCH: usize,
    const MIXINS: usize,
    const MW: usize,
    const INBOX: usize,
    const MAX_ENTITIES: usize,
>(
    registry: &Registry<PAYLOAD, SCRATCH, MIXINS, MW, INBOX, MAX_ENTITIES>,
    clock: &dyn Clock,
    idle: &dyn Idle,
    idle_ms: u32,
) -> u32 {
    let now_ms = clock.now_ms();
    let mut processed = 0u32;

    for id in registry.ids() {
        let Some(mut entity) = registry.get(id) else {
            continue;
        };
        if !entity.is_active() || entity.is_suspended() {
            continue;
        }
        if let Ok(n) = dispatch_all(&mut entity, now_ms, Some(registry)) {
            processed += n;
        }
    }

    let mut earliest_wait = None;
    for id in registry.ids() {
        let Some(entity) = registry.get(id) else {
            continue;
        };
        let until = entity.flow_wait_until();
        if until == 0 {
            continue;
        }
        if deadline_elapsed(until, now_ms) {
            let _ = entity.inbox_push(Signal::synthetic(SIG_TIMEOUT, now_ms));
        } else {
            let remaining = until.wrapping_sub(now_ms);
            earliest_wait = Some(earliest_wait.map_or(remaining, |w: u32| w.min(remaining)));
        }
    }

    if processed == 0 {
        let wait_ms = earliest_wait.map_or(idle_ms, |w| w.min(idle_ms));
        let deadline = now_ms.wrapping_add(wait_ms);
        while !deadline_elapsed(deadline, clock.now_ms()) {
            idle.idle();
        }
    }

    processed
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use reactor_core::{Entity, Rule, StateDef};

    struct FakeClock(Cell<u32>);
    impl Clock for FakeClock {
        fn now_ms(&self) -> u32 {
            self.0.get()
        }
    }

    /// Advances a shared fake clock by one millisecond per idle tick, and
    /// counts how many ticks it took — otherwise a test driving [`run`]
    /// against a clock that never moves would spin forever waiting for its
    /// deadline to elapse.
    struct AdvancingIdle<'a> {
        clock: &'a FakeClock,
        ticks: Cell<u32>,
    }
    impl<'a> Idle for AdvancingIdle<'a> {
        fn idle(&self) {
            self.clock.0.set(self.clock.0.get() + 1);
            self.ticks.set(self.ticks.get() + 1);
        }
    }

    const PING: u16 = 0x100;
    const S: u16 = 1;
    static STATES: &[StateDef<4, 64>] = &[StateDef {
        id: S,
        parent_id: 0,
        on_entry: None,
        on_exit: None,
        rules: &[Rule::new(PING, 0, None)],
    }];

    #[test]
    fn run_drains_every_entity() {
        let mut reg: Registry<4, 64, 4, 4, 8, 2> = Registry::new();
        reg.register(Entity::new(1, "a", STATES, S)).unwrap();
        reg.register(Entity::new(2, "b", STATES, S)).unwrap();
        reg.get(1).unwrap().start(0, None);
        reg.get(2).unwrap().start(0, None);
        reg.get(1).unwrap().inbox_push(Signal::new(PING, 0)).unwrap();
        reg.get(2).unwrap().inbox_push(Signal::new(PING, 0)).unwrap();

        let clock = FakeClock(Cell::new(0));
        let idle = AdvancingIdle {
            clock: &clock,
            ticks: Cell::new(0),
        };
        let processed = run(&reg, &clock, &idle, 10);

        assert_eq!(processed, 2);
        assert_eq!(idle.ticks.get(), 0);
    }

    #[test]
    fn run_idles_when_nothing_processed() {
        let mut reg: Registry<4, 64, 4, 4, 8, 1> = Registry::new();
        reg.register(Entity::new(1, "a", STATES, S)).unwrap();
        reg.get(1).unwrap().start(0, None);

        let clock = FakeClock(Cell::new(0));
        let idle = AdvancingIdle {
            clock: &clock,
            ticks: Cell::new(0),
        };
        let processed = run(&reg, &clock, &idle, 5);

        assert_eq!(processed, 0);
        assert!(idle.ticks.get() > 0);
    }
}
