// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stackless coroutine operators ("uFlows") for actions running under
//! [`reactor_core`].
//!
//! An action is an ordinary `fn(&mut ActionCtx, &Signal) -> u16`: it cannot
//! block, so a coroutine that spans several dispatches has to save its own
//! resume point and read it back on re-entry. [`FlowState`] is where that
//! resume point lives; the functions in this module are the primitive
//! operations a coroutine body is built from. There is no generated state
//! machine — a coroutine is written as an explicit `match` over
//! [`resume_point`], with each arm calling the operator it's blocked on and
//! returning [`STAY`] when that operator isn't ready yet:
//!
//! ```ignore
//! fn blink_then_done(cx: &mut ActionCtx<'_, 4, 64>, sig: &Signal<4>) -> u16 {
//!     match reactor_flow::resume_point(cx) {
//!         0 => {
//!             if !reactor_flow::await_time(cx, 500, 0, cx.now_ms()) {
//!                 return STAY;
//!             }
//!             reactor_flow::yield_to(cx, 1)
//!         }
//!         1 => {
//!             if !reactor_flow::await_signal(cx, 0x0400, 1, sig) {
//!                 return STAY;
//!             }
//!             let _ = cx.emit_self(Signal::new(0x0500, cx.id()));
//!             reactor_flow::end(cx)
//!         }
//!         _ => reactor_flow::end(cx),
//!     }
//! }
//! ```
//!
//! `AwaitTime`/`AwaitAnyWithTimeout` measure elapsed time against whichever
//! clock reading the dispatcher took for the step the action is running
//! under ([`ActionCtx::now_ms`]) — with timestamps disabled that reading is
//! always the same value the run loop supplies, which still advances
//! monotonically, just not from a hardware clock.

#![cfg_attr(not(test), no_std)]

use reactor_abi::{deadline_elapsed, Signal, SIG_NONE, STATE_STAY};
use reactor_core::ActionCtx;

/// Convenience re-export: the "stay in the current state" sentinel every
/// blocked operator arm should return.
pub const STAY: u16 = STATE_STAY;

/// Reserved `flow_wait_sig` marker meaning "blocked on any of an
/// externally-supplied id list" rather than a single signal id. No real
/// signal is ever assigned this id (user ids live below `0xFFFF`, and every
/// system id is `< SIG_USER_BASE`).
const AWAIT_ANY_MARKER: u16 = 0xFFFF;

/// `Begin`: the coroutine's current resume point. A fresh entity (one whose
/// flow has never run, or was last cleared by [`end`] or [`reset`]) reads 0.
pub fn resume_point<const PAYLOAD: usize, const SCRATCH: usize>(
    cx: &ActionCtx<'_, PAYLOAD, SCRATCH>,
) -> u16 {
    cx.flow().flow_line
}

/// `End`: clears all coroutine bookkeeping so the next entry starts at the
/// top. Always returns [`STAY`] for the caller to propagate.
pub fn end<const PAYLOAD: usize, const SCRATCH: usize>(cx: &mut ActionCtx<'_, PAYLOAD, SCRATCH>) -> u16 {
    cx.flow_mut().reset();
    STAY
}

/// `FlowReset`: identical to [`end`] — exposed under its own name for
/// coroutines that want to restart themselves from an arbitrary step rather
/// than from having reached the final arm.
pub fn reset<const PAYLOAD: usize, const SCRATCH: usize>(cx: &mut ActionCtx<'_, PAYLOAD, SCRATCH>) {
    cx.flow_mut().reset();
}

/// `Yield`: unconditionally saves `resume_line` and stays. The coroutine
/// will see `resume_line` out of [`resume_point`] on its very next dispatch,
/// regardless of which signal arrives.
pub fn yield_to<const PAYLOAD: usize, const SCRATCH: usize>(
    cx: &mut ActionCtx<'_, PAYLOAD, SCRATCH>,
    resume_line: u16,
) -> u16 {
    cx.flow_mut().flow_line = resume_line;
    STAY
}

/// `FlowGoto`: clears coroutine bookkeeping and returns `state` as the
/// action's next-state — a coroutine can end itself *into* a transition
/// rather than just going idle.
pub fn goto_state<const PAYLOAD: usize, const SCRATCH: usize>(
    cx: &mut ActionCtx<'_, PAYLOAD, SCRATCH>,
    state: u16,
) -> u16 {
    cx.flow_mut().reset();
    state
}

/// `AwaitSignal`: blocks until a signal with id `id` is dispatched to this
/// entity. Returns `true` once it has arrived (and clears the wait); `false`
/// while still blocked, having armed the wait and saved `resume_line` on
/// first call.
pub fn await_signal<const PAYLOAD: usize, const SCRATCH: usize>(
    cx: &mut ActionCtx<'_, PAYLOAD, SCRATCH>,
    id: u16,
    resume_line: u16,
    signal: &Signal<PAYLOAD>,
) -> bool {
    let armed = cx.flow().flow_wait_sig;
    if armed == SIG_NONE {
        // The dispatch that enters this await may already carry the signal
        // it's waiting for (a coroutine transitioning straight into a wait
        // on the signal that triggered it) — check before arming so that
        // case completes without an extra round trip.
        if signal.id == id {
            return true;
        }
        cx.flow_mut().flow_wait_sig = id;
        cx.flow_mut().flow_line = resume_line;
        return false;
    }
    if signal.id != armed {
        return false;
    }
    cx.flow_mut().flow_wait_sig = SIG_NONE;
    true
}

/// `AwaitAny`: like [`await_signal`], but ready on any signal whose id is in
/// `ids`. `ids` must be the same list on every call for one wait — it is not
/// itself part of the saved state.
pub fn await_any<const PAYLOAD: usize, const SCRATCH: usize>(
    cx: &mut ActionCtx<'_, PAYLOAD, SCRATCH>,
    ids: &[u16],
    resume_line: u16,
    signal: &Signal<PAYLOAD>,
) -> bool {
    let armed = cx.flow().flow_wait_sig == AWAIT_ANY_MARKER;
    if !armed {
        if ids.contains(&signal.id) {
            return true;
        }
        cx.flow_mut().flow_wait_sig = AWAIT_ANY_MARKER;
        cx.flow_mut().flow_line = resume_line;
        return false;
    }
    if !ids.contains(&signal.id) {
        return false;
    }
    cx.flow_mut().flow_wait_sig = SIG_NONE;
    true
}

/// `AwaitTime`: blocks until `delay_ms` have elapsed, measured from the
/// dispatch step that first armed the wait. `delay_ms == 0` still requires
/// one more dispatch to observe the elapsed deadline — the coroutine
/// advances on the *next* dispatch, not the one that armed it.
pub fn await_time<const PAYLOAD: usize, const SCRATCH: usize>(
    cx: &mut ActionCtx<'_, PAYLOAD, SCRATCH>,
    delay_ms: u32,
    resume_line: u16,
    now_ms: u32,
) -> bool {
    let until = cx.flow().flow_wait_until;
    if until == 0 {
        cx.flow_mut().flow_wait_until = now_ms.wrapping_add(delay_ms);
        cx.flow_mut().flow_line = resume_line;
        return false;
    }
    if deadline_elapsed(until, now_ms) {
        cx.flow_mut().flow_wait_until = 0;
        true
    } else {
        false
    }
}

/// `AwaitCond`: blocks until `cond` is true, re-evaluated by the caller on
/// every dispatch (the predicate itself is not part of the saved state).
pub fn await_cond<const PAYLOAD: usize, const SCRATCH: usize>(
    cx: &mut ActionCtx<'_, PAYLOAD, SCRATCH>,
    resume_line: u16,
    cond: bool,
) -> bool {
    if cond {
        true
    } else {
        cx.flow_mut().flow_line = resume_line;
        false
    }
}

/// What woke an [`await_any_with_timeout`] wait.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Woken {
    Signal(u16),
    TimedOut,
}

/// The supplemented `AwaitAnyWithTimeout` combinator: races [`await_any`]
/// against a deadline so a coroutine can never be stranded waiting on a
/// signal that never arrives. Returns `None` while still blocked.
pub fn await_any_with_timeout<const PAYLOAD: usize, const SCRATCH: usize>(
    cx: &mut ActionCtx<'_, PAYLOAD, SCRATCH>,
    ids: &[u16],
    timeout_ms: u32,
    resume_line: u16,
    now_ms: u32,
    signal: &Signal<PAYLOAD>,
) -> Option<Woken> {
    let armed = cx.flow().flow_wait_sig == AWAIT_ANY_MARKER;
    if !armed {
        if ids.contains(&signal.id) {
            return Some(Woken::Signal(signal.id));
        }
        cx.flow_mut().flow_wait_sig = AWAIT_ANY_MARKER;
        cx.flow_mut().flow_wait_until = now_ms.wrapping_add(timeout_ms);
        cx.flow_mut().flow_line = resume_line;
        return None;
    }
    if ids.contains(&signal.id) {
        cx.flow_mut().flow_wait_sig = SIG_NONE;
        cx.flow_mut().flow_wait_until = 0;
        return Some(Woken::Signal(signal.id));
    }
    let until = cx.flow().flow_wait_until;
    if deadline_elapsed(until, now_ms) {
        cx.flow_mut().flow_wait_sig = SIG_NONE;
        cx.flow_mut().flow_wait_until = 0;
        return Some(Woken::TimedOut);
    }
    None
}

#[cfg(test)]
mod tests {
    use reactor_core::{Entity, EmitSink, Rule, StateDef};

    use super::*;

    const BEGIN: u16 = 1;
    const DONE_SIG: u16 = 0x0500;
    const WAKE_SIG: u16 = 0x0400;
    const KICK: u16 = 0x0001;

    struct FixedClock(u32);
    impl reactor_abi::Clock for FixedClock {
        fn now_ms(&self) -> u32 {
            self.0
        }
    }

    // scenario: AwaitTime(500) then AwaitSignal(WAKE_SIG) then self-emit DONE_SIG.
    fn blink_flow(cx: &mut ActionCtx<'_, 4, 64>, sig: &Signal<4>) -> u16 {
        match resume_point(cx) {
            0 => {
                if !await_time(cx, 500, 0, cx.now_ms()) {
                    return STAY;
                }
                yield_to(cx, 1)
            }
            1 => {
                if !await_signal(cx, WAKE_SIG, 1, sig) {
                    return STAY;
                }
                let _ = cx.emit_self(Signal::new(DONE_SIG, cx.id()));
                end(cx)
            }
            _ => end(cx),
        }
    }

    // A coroutine still needs a rule per signal id it cares about — there is
    // no wildcard match, so KICK (the periodic nudge that lets it re-check
    // its timer) and WAKE_SIG both route to the same action.
    static FLOW_STATES: &[StateDef<4, 64>] = &[StateDef {
        id: BEGIN,
        parent_id: 0,
        on_entry: None,
        on_exit: None,
        rules: &[
            Rule::new(KICK, 0, Some(blink_flow)),
            Rule::new(WAKE_SIG, 0, Some(blink_flow)),
        ],
    }];

    #[test]
    fn coroutine_times_out_then_waits_for_signal_then_completes() {
        let mut reg: reactor_core::Registry<4, 64, 4, 4, 8, 1> = reactor_core::Registry::new();
        reg.register(Entity::new(9, "flow", FLOW_STATES, BEGIN)).unwrap();
        reg.get(9).unwrap().start(0, Some(&reg));

        reg.emit(9, Signal::new(KICK, 0)).unwrap();
        {
            let mut e = reg.get(9).unwrap();
            reactor_core::dispatch_all(&mut e, 0, Some(&reg)).unwrap();
        }
        // First dispatch only arms the timer; no further signals queued yet.
        assert_eq!(reg.get(9).unwrap().inbox_len(), 0);

        // Nothing else to dispatch until the producer re-kicks it with a
        // later clock reading — emulate the run loop redelivering KICK once
        // the timer matures.
        reg.emit(9, Signal::new(KICK, 0)).unwrap();
        {
            let mut e = reg.get(9).unwrap();
            reactor_core::dispatch_all(&mut e, 600, Some(&reg)).unwrap();
        }

        // A single dispatch here, not `dispatch_all` — the action's own
        // self-emitted `DONE_SIG` lands in the same inbox, and draining it
        // in the same call would swallow the signal this assertion checks.
        reg.emit(9, Signal::new(WAKE_SIG, 0)).unwrap();
        {
            let mut e = reg.get(9).unwrap();
            let clock = FixedClock(600);
            reactor_core::dispatch(&mut e, 0, 600, &clock, &reactor_abi::SpinIdle, Some(&reg)).unwrap();
        }

        // The coroutine emitted DONE_SIG to itself and then reset.
        let popped = reg.get(9).unwrap().inbox_pop().unwrap();
        assert_eq!(popped.id, DONE_SIG);
        assert_eq!(reg.get(9).unwrap().inbox_len(), 0);
    }

    #[test]
    fn await_any_wakes_on_either_id() {
        let mut flow = reactor_core::FlowState::new();
        let mut scratch = [0u8; 4];
        let mut push = |_: Signal<4>| Ok(());
        let mut cx = ActionCtx::<'_, 4, 4>::new(1, 0, &mut flow, &mut scratch, &mut push, None);

        let unrelated = Signal::<4>::new(0x00, 0);
        assert!(!await_any(&mut cx, &[0x10, 0x11], 5, &unrelated));
        assert_eq!(resume_point(&cx), 5);
        let wake = Signal::<4>::new(0x11, 0);
        assert!(await_any(&mut cx, &[0x10, 0x11], 5, &wake));
    }

    #[test]
    fn await_any_with_timeout_times_out_when_nothing_arrives() {
        let mut flow = reactor_core::FlowState::new();
        let mut scratch = [0u8; 4];
        let mut push = |_: Signal<4>| Ok(());
        let mut cx = ActionCtx::<'_, 4, 4>::new(1, 0, &mut flow, &mut scratch, &mut push, None);

        let other = Signal::<4>::new(0x99, 0);
        assert!(await_any_with_timeout(&mut cx, &[0x10], 100, 5, 0, &other).is_none());
        assert_eq!(
            await_any_with_timeout(&mut cx, &[0x10], 100, 5, 150, &other),
            Some(Woken::TimedOut)
        );
    }
}
