// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A supervisor entity watching a worker entity, in the spirit of
//! `task/jefe`: on `SIG_DYING` it counts the failure and sends
//! `SIG_REVIVE` back to the reporting entity, rather than restarting a
//! kernel task.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use reactor_abi::{Clock, Signal, SpinIdle, SIG_DYING, SIG_REVIVE};
use reactor_core::{ActionCtx, Entity, Registry, Rule, StateDef};

const SUPERVISOR: u16 = 1;
const WORKER: u16 = 10;

const SUPERVISING: u16 = 1;
const RUNNING: u16 = 1;
const DEAD: u16 = 2;
const CRASH: u16 = 0x0100;

static RESTARTS: AtomicU32 = AtomicU32::new(0);

fn handle_dying(cx: &mut ActionCtx<'_, 4, 64>, sig: &Signal<4>) -> u16 {
    let restarts = RESTARTS.fetch_add(1, Ordering::Relaxed) + 1;
    println!("supervisor: entity {} reported dying (restart #{restarts})", sig.src_id);
    let _ = cx.emit_to(sig.src_id, Signal::new(SIG_REVIVE, cx.id()));
    0
}

fn report_dying(cx: &mut ActionCtx<'_, 4, 64>, _sig: &Signal<4>) -> u16 {
    println!("worker: crashed, reporting to supervisor");
    let _ = cx.emit_to(SUPERVISOR, Signal::new(SIG_DYING, cx.id()));
    0
}

fn on_revive(_cx: &mut ActionCtx<'_, 4, 64>, _sig: &Signal<4>) -> u16 {
    println!("worker: revived");
    0
}

static SUPERVISOR_STATES: &[StateDef<4, 64>] = &[StateDef {
    id: SUPERVISING,
    parent_id: 0,
    on_entry: None,
    on_exit: None,
    rules: &[Rule::new(SIG_DYING, 0, Some(handle_dying))],
}];

static WORKER_STATES: &[StateDef<4, 64>] = &[
    StateDef {
        id: RUNNING,
        parent_id: 0,
        on_entry: None,
        on_exit: None,
        rules: &[Rule::new(CRASH, DEAD, Some(report_dying))],
    },
    StateDef {
        id: DEAD,
        parent_id: 0,
        on_entry: None,
        on_exit: None,
        rules: &[Rule::new(SIG_REVIVE, RUNNING, Some(on_revive))],
    },
];

struct WallClock(Instant);
impl Clock for WallClock {
    fn now_ms(&self) -> u32 {
        self.0.elapsed().as_millis() as u32
    }
}

fn main() {
    let mut registry: Registry<4, 64, 4, 4, 8, 2> = Registry::new();
    registry
        .register(Entity::new(SUPERVISOR, "jefe", SUPERVISOR_STATES, SUPERVISING))
        .unwrap();
    registry
        .register(Entity::new(WORKER, "worker", WORKER_STATES, RUNNING))
        .unwrap();

    {
        let mut sup = registry.get(SUPERVISOR).unwrap();
        sup.mark_supervisor();
        sup.start(0, None);
    }
    {
        let mut worker = registry.get(WORKER).unwrap();
        worker.mark_supervised();
        worker.start(0, None);
    }

    let clock = WallClock(Instant::now());
    let idle = SpinIdle;

    registry.get(WORKER).unwrap().inbox_push(Signal::new(CRASH, 0)).unwrap();

    for _ in 0..3 {
        reactor_runtime::run(&registry, &clock, &idle, 0);
    }

    let worker_state = registry.get(WORKER).unwrap().current_state();
    println!(
        "worker final state: {}, total restarts: {}",
        if worker_state == RUNNING { "RUNNING" } else { "DEAD" },
        RESTARTS.load(Ordering::Relaxed)
    );
}
