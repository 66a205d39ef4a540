// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coroutine timing, end to end through a registered entity rather than a
//! bare `ActionCtx`.

use reactor_abi::{Clock, Signal, SpinIdle};
use reactor_core::{dispatch, dispatch_all, EmitSink, Entity, Registry, Rule, StateDef};
use reactor_flow::{await_signal, await_time, end, resume_point, yield_to, STAY};

const BEGIN: u16 = 1;
const KICK: u16 = 0x0001;
const WAKE: u16 = 0x0400;
const DONE: u16 = 0x0500;

struct FixedClock(u32);
impl Clock for FixedClock {
    fn now_ms(&self) -> u32 {
        self.0
    }
}

fn blink_flow(cx: &mut reactor_core::ActionCtx<'_, 4, 64>, sig: &Signal<4>) -> u16 {
    match resume_point(cx) {
        0 => {
            if !await_time(cx, 500, 0, cx.now_ms()) {
                return STAY;
            }
            yield_to(cx, 1)
        }
        1 => {
            if !await_signal(cx, WAKE, 1, sig) {
                return STAY;
            }
            let _ = cx.emit_self(Signal::new(DONE, cx.id()));
            end(cx)
        }
        _ => end(cx),
    }
}

static FLOW_STATES: &[StateDef<4, 64>] = &[StateDef {
    id: BEGIN,
    parent_id: 0,
    on_entry: None,
    on_exit: None,
    rules: &[
        Rule::new(KICK, 0, Some(blink_flow)),
        Rule::new(WAKE, 0, Some(blink_flow)),
    ],
}];

#[test]
fn coroutine_times_out_then_waits_for_signal_then_completes() {
    let mut reg: Registry<4, 64, 4, 4, 8, 1> = Registry::new();
    reg.register(Entity::new(1, "flow", FLOW_STATES, BEGIN)).unwrap();
    reg.get(1).unwrap().start(0, Some(&reg));

    reg.emit(1, Signal::new(KICK, 0)).unwrap();
    dispatch_all(&mut reg.get(1).unwrap(), 0, Some(&reg)).unwrap();
    assert_eq!(reg.get(1).unwrap().inbox_len(), 0);

    reg.emit(1, Signal::new(KICK, 0)).unwrap();
    dispatch_all(&mut reg.get(1).unwrap(), 600, Some(&reg)).unwrap();

    reg.emit(1, Signal::new(WAKE, 0)).unwrap();
    let clock = FixedClock(600);
    dispatch(&mut reg.get(1).unwrap(), 0, 600, &clock, &SpinIdle, Some(&reg)).unwrap();

    let popped = reg.get(1).unwrap().inbox_pop().unwrap();
    assert_eq!(popped.id, DONE);
    assert_eq!(reg.get(1).unwrap().inbox_len(), 0);
}
