// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

bitflags::bitflags! {
    /// Entity status flags, as tracked in the entity control block.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct EntityFlags: u32 {
        /// Set once `start` has run `SYS_INIT`/`SYS_ENTRY`; cleared on `stop`.
        const ACTIVE = 1 << 0;
        /// Toggled by `suspend`/`resume`. A suspended entity still accepts
        /// emissions (they queue up to inbox capacity) but `dispatch` refuses
        /// to run its pipeline (`InvalidArg`) until resumed.
        const SUSPENDED = 1 << 1;
        /// Set while a coroutine hosted by one of this entity's actions is
        /// mid-await; `flow_line != 0` iff this flag is set.
        const FLOW_RUNNING = 1 << 2;
        /// This entity is supervised: its `SYS_DYING` reports go to the
        /// designated supervisor entity (a collaborator concern; the engine
        /// only carries the bit).
        const SUPERVISED = 1 << 3;
        /// This entity acts as a supervisor for others.
        const SUPERVISOR = 1 << 4;
    }
}
