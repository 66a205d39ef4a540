// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The fixed-capacity entity table the run loop dispatches against.
//!
//! Each slot is wrapped in a [`StaticCell`], a single-writer RAII guard:
//! taking a [`StaticRef`] for an entity is how the dispatcher gets exclusive
//! access to it for the duration of one dispatch step, and trying to take a
//! second one while the first is still alive panics instead of aliasing.
//! Emitting
//! to a *different* entity while one is being dispatched only ever takes a
//! transient borrow on the target's own slot, so it never conflicts with the
//! in-flight dispatch unless the caller names the entity that is currently
//! being dispatched — which [`crate::action::ActionCtx::emit_to`] already
//! refuses before it gets here.

use reactor_abi::DispatchError;

use crate::action::EmitSink;
use crate::entity::Entity;
use crate::static_cell::{StaticCell, StaticRef};

/// A fixed-capacity table of entities, addressed by id.
///
/// `MAX_ENTITIES` bounds the table; registration beyond capacity fails with
/// `NoMemory` rather than growing. All entities in one registry share the
/// same `PAYLOAD`/`SCRATCH`/`MIXINS`/`MW`/`INBOX` sizing — a single
/// application-wide configuration, not a per-entity one.
pub struct Registry<
    const PAYLOAD: usize = 4,
    const SCRATCH: usize = 64,
    const MIXINS: usize = 4,
    const MW: usize = 4,
    const INBOX: usize = 8,
    const MAX_ENTITIES: usize = 8,
> {
    ids: [Option<u16>; MAX_ENTITIES],
    cells: [StaticCell<Entity<PAYLOAD, SCRATCH, MIXINS, MW, INBOX>>; MAX_ENTITIES],
}

impl<
        const PAYLOAD: usize,
        const SCRATCH: usize,
        const MIXINS: usize,
        const MW: usize,
        const INBOX: usize,
        const MAX_ENTITIES: usize,
    > Registry<PAYLOAD, SCRATCH, MIXINS, MW, INBOX, MAX_ENTITIES>
{
    const EMPTY_STATES: &'static [crate::state::StateDef<PAYLOAD, SCRATCH>] = &[];

    /// An empty registry. `MAX_ENTITIES` slots, all unoccupied.
    pub fn new() -> Self {
        Self {
            ids: [None; MAX_ENTITIES],
            cells: core::array::from_fn(|_| {
                StaticCell::new(Entity::new(0, "", Self::EMPTY_STATES, 0))
            }),
        }
    }

    /// Registers `entity` under its own id. `AlreadyExists` if that id is
    /// already registered; `NoMemory` if the table is full.
    pub fn register(
        &mut self,
        entity: Entity<PAYLOAD, SCRATCH, MIXINS, MW, INBOX>,
    ) -> Result<(), DispatchError> {
        let id = entity.id();
        if self.ids.contains(&Some(id)) {
            return Err(DispatchError::AlreadyExists);
        }
        let free = self
            .ids
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(DispatchError::NoMemory)?;
        *self.cells[free].borrow_mut() = entity;
        self.ids[free] = Some(id);
        Ok(())
    }

    /// Removes the entity registered under `id`. `NotFound` if no such
    /// entity is registered.
    pub fn unregister(&mut self, id: u16) -> Result<(), DispatchError> {
        let slot = self.slot_of(id).ok_or(DispatchError::NotFound)?;
        *self.cells[slot].borrow_mut() = Entity::new(0, "", Self::EMPTY_STATES, 0);
        self.ids[slot] = None;
        Ok(())
    }

    /// Takes exclusive access to the entity registered under `id` for the
    /// duration of one dispatch step. Panics if a [`StaticRef`] for the same
    /// slot is already outstanding.
    pub fn get(
        &self,
        id: u16,
    ) -> Option<StaticRef<'_, Entity<PAYLOAD, SCRATCH, MIXINS, MW, INBOX>>> {
        let slot = self.slot_of(id)?;
        Some(self.cells[slot].borrow_mut())
    }

    /// Ids of all registered entities, in slot order.
    pub fn ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.ids.iter().filter_map(|slot| *slot)
    }

    pub fn len(&self) -> usize {
        self.ids.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot_of(&self, id: u16) -> Option<usize> {
        self.ids.iter().position(|slot| *slot == Some(id))
    }
}

impl<
        const PAYLOAD: usize,
        const SCRATCH: usize,
        const MIXINS: usize,
        const MW: usize,
        const INBOX: usize,
        const MAX_ENTITIES: usize,
    > Default for Registry<PAYLOAD, SCRATCH, MIXINS, MW, INBOX, MAX_ENTITIES>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<
        const PAYLOAD: usize,
        const SCRATCH: usize,
        const MIXINS: usize,
        const MW: usize,
        const INBOX: usize,
        const MAX_ENTITIES: usize,
    > EmitSink<PAYLOAD> for Registry<PAYLOAD, SCRATCH, MIXINS, MW, INBOX, MAX_ENTITIES>
{
    fn emit(&self, target: u16, signal: reactor_abi::Signal<PAYLOAD>) -> Result<(), DispatchError> {
        let entity = self.get(target).ok_or(DispatchError::NotFound)?;
        entity.inbox().try_push(signal)
    }
}

impl<
        const PAYLOAD: usize,
        const SCRATCH: usize,
        const MIXINS: usize,
        const MW: usize,
        const INBOX: usize,
        const MAX_ENTITIES: usize,
    > Registry<PAYLOAD, SCRATCH, MIXINS, MW, INBOX, MAX_ENTITIES>
{
    /// Enqueues a copy of `signal` into every registered entity's inbox, in
    /// id order. Returns the count actually delivered; a full inbox at any
    /// entity is counted as a drop and does not abort the remaining
    /// deliveries. Prefer the topic bus over this for anything but a true
    /// all-entities notification — broadcast is O(`MAX_ENTITIES`).
    pub fn broadcast(&self, signal: reactor_abi::Signal<PAYLOAD>) -> u32 {
        let mut delivered = 0u32;
        for id in self.ids() {
            if self.emit(id, signal).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateDef;

    const STATES: &[StateDef<4, 64>] = &[StateDef {
        id: 1,
        parent_id: 0,
        on_entry: None,
        on_exit: None,
        rules: &[],
    }];

    #[test]
    fn register_then_get_round_trips() {
        let mut reg: Registry<4, 64, 4, 4, 8, 4> = Registry::new();
        reg.register(Entity::new(7, "alpha", STATES, 1)).unwrap();
        let e = reg.get(7).unwrap();
        assert_eq!(e.id(), 7);
        assert_eq!(e.name(), "alpha");
    }

    #[test]
    fn register_duplicate_id_rejected() {
        let mut reg: Registry<4, 64, 4, 4, 8, 2> = Registry::new();
        reg.register(Entity::new(1, "a", STATES, 1)).unwrap();
        assert_eq!(
            reg.register(Entity::new(1, "b", STATES, 1)),
            Err(DispatchError::AlreadyExists)
        );
    }

    #[test]
    fn register_beyond_capacity_fails() {
        let mut reg: Registry<4, 64, 4, 4, 8, 1> = Registry::new();
        reg.register(Entity::new(1, "a", STATES, 1)).unwrap();
        assert_eq!(
            reg.register(Entity::new(2, "b", STATES, 1)),
            Err(DispatchError::NoMemory)
        );
    }

    #[test]
    fn unregister_frees_the_slot() {
        let mut reg: Registry<4, 64, 4, 4, 8, 1> = Registry::new();
        reg.register(Entity::new(1, "a", STATES, 1)).unwrap();
        reg.unregister(1).unwrap();
        assert!(reg.get(1).is_none());
        reg.register(Entity::new(2, "b", STATES, 1)).unwrap();
        assert!(reg.get(2).is_some());
    }

    #[test]
    fn emit_delivers_into_target_inbox() {
        let mut reg: Registry<4, 64, 4, 4, 8, 2> = Registry::new();
        reg.register(Entity::new(1, "a", STATES, 1)).unwrap();
        reg.register(Entity::new(2, "b", STATES, 1)).unwrap();
        reg.emit(2, reactor_abi::Signal::new(0x100, 1)).unwrap();
        let target = reg.get(2).unwrap();
        assert_eq!(target.inbox().len(), 1);
    }

    #[test]
    fn broadcast_delivers_to_every_entity_and_counts_drops() {
        let mut reg: Registry<4, 64, 4, 4, 1, 3> = Registry::new();
        reg.register(Entity::new(1, "a", STATES, 1)).unwrap();
        reg.register(Entity::new(2, "b", STATES, 1)).unwrap();
        reg.register(Entity::new(3, "c", STATES, 1)).unwrap();
        // Fill entity 2's one-slot inbox ahead of time so its broadcast copy
        // is dropped.
        reg.emit(2, reactor_abi::Signal::new(0x100, 0)).unwrap();

        let delivered = reg.broadcast(reactor_abi::Signal::new(0x101, 0));

        assert_eq!(delivered, 2);
        assert_eq!(reg.get(1).unwrap().inbox_len(), 1);
        assert_eq!(reg.get(2).unwrap().inbox_len(), 1);
        assert_eq!(reg.get(3).unwrap().inbox_len(), 1);
    }

    #[test]
    #[should_panic]
    fn double_borrow_of_same_entity_panics() {
        let mut reg: Registry<4, 64, 4, 4, 8, 1> = Registry::new();
        reg.register(Entity::new(1, "a", STATES, 1)).unwrap();
        let _first = reg.get(1).unwrap();
        let _second = reg.get(1).unwrap();
    }
}
