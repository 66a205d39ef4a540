// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic fanout, end to end through a registered entity table rather than a
//! standalone [`EmitSink`] stub.

use reactor_abi::Signal;
use reactor_bus::TopicBus;
use reactor_core::{Entity, Registry, StateDef};

const UI_TOPIC: u16 = 0x0500;

static STATES: &[StateDef<4, 64>] = &[StateDef {
    id: 1,
    parent_id: 0,
    on_entry: None,
    on_exit: None,
    rules: &[],
}];

#[test]
fn topic_fanout_delivers_to_every_subscriber() {
    let mut registry: Registry<4, 64, 4, 4, 8, 4> = Registry::new();
    for (id, name) in [(1u16, "a"), (2, "b"), (3, "c")] {
        registry.register(Entity::new(id, name, STATES, 1)).unwrap();
        registry.get(id).unwrap().start(0, None);
    }

    let bus: TopicBus<4, 4, 4> = TopicBus::new();
    bus.subscribe(1, UI_TOPIC).unwrap();
    bus.subscribe(2, UI_TOPIC).unwrap();
    bus.subscribe(3, UI_TOPIC).unwrap();

    const UI: u16 = 99;
    let delivered = bus.publish(Signal::new(UI_TOPIC, UI), &registry);

    assert_eq!(delivered, 3);
    for id in [1, 2, 3] {
        assert_eq!(registry.get(id).unwrap().inbox_len(), 1);
    }
}
