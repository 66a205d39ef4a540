// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The canonical two-state demo: a button toggles an LED between `OFF` and
//! `ON`. Driven by [`reactor_runtime::run`] over a one-entity registry, with
//! a wall-clock [`Clock`] standing in for a board's timer peripheral.

use std::time::Instant;

use reactor_abi::{Clock, Signal, SpinIdle};
use reactor_core::{ActionCtx, Entity, Registry, Rule, StateDef};

const BTN: u16 = 0x0100;
const OFF: u16 = 1;
const ON: u16 = 2;

fn set_led_high(_cx: &mut ActionCtx<'_, 4, 64>, _sig: &Signal<4>) -> u16 {
    println!("LED: on");
    0
}

fn set_led_low(_cx: &mut ActionCtx<'_, 4, 64>, _sig: &Signal<4>) -> u16 {
    println!("LED: off");
    0
}

static STATES: &[StateDef<4, 64>] = &[
    StateDef {
        id: OFF,
        parent_id: 0,
        on_entry: None,
        on_exit: None,
        rules: &[Rule::new(BTN, ON, Some(set_led_high))],
    },
    StateDef {
        id: ON,
        parent_id: 0,
        on_entry: None,
        on_exit: None,
        rules: &[Rule::new(BTN, OFF, Some(set_led_low))],
    },
];

struct WallClock(Instant);
impl Clock for WallClock {
    fn now_ms(&self) -> u32 {
        self.0.elapsed().as_millis() as u32
    }
}

fn main() {
    let mut registry: Registry<4, 64, 4, 4, 8, 1> = Registry::new();
    registry.register(Entity::new(1, "led", STATES, OFF)).unwrap();
    registry.get(1).unwrap().start(0, None);

    let clock = WallClock(Instant::now());
    let idle = SpinIdle;

    for press in 0..4 {
        println!("press #{press}: BTN");
        registry.get(1).unwrap().inbox_push(Signal::new(BTN, 0)).unwrap();
        reactor_runtime::run(&registry, &clock, &idle, 0);
    }

    let state = registry.get(1).unwrap().current_state();
    println!("final state: {}", if state == ON { "ON" } else { "OFF" });
}
