// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use reactor_abi::{DispatchError, Signal, SIG_ENTRY, SIG_EXIT, SIG_INIT};

use crate::action::{ActionCtx, EmitSink, FlowState};
use crate::flags::EntityFlags;
use crate::inbox::Inbox;
use crate::middleware::MiddlewareSlot;
use crate::mixin::Mixin;
use crate::state::{find_state, StateDef};

/// Per-entity state: id, current state, flags, inbox, coroutine resume
/// point, scratch memory, attached mixins, and middleware chain.
///
/// `MIXINS` and `MW` are the fixed sizes of the mixin-attachment and
/// middleware arrays (`MAX_MIXINS_PER_ENTITY`, `MAX_MIDDLEWARE`); `INBOX` is
/// the inbox capacity (`INBOX_SIZE`); `SCRATCH` is the coroutine scratch
/// buffer size (`SCRATCHPAD_SIZE`); `PAYLOAD` is the inline payload width
/// (`SIGNAL_PAYLOAD_SIZE`). All are compile-time bounds, never resized.
pub struct Entity<
    const PAYLOAD: usize = 4,
    const SCRATCH: usize = 64,
    const MIXINS: usize = 4,
    const MW: usize = 4,
    const INBOX: usize = 8,
> {
    id: u16,
    name: &'static str,
    states: &'static [StateDef<PAYLOAD, SCRATCH>],
    initial_state: u16,
    current_state: u16,
    flags: EntityFlags,
    mixins: [Option<Mixin<PAYLOAD, SCRATCH>>; MIXINS],
    middleware: [Option<MiddlewareSlot<PAYLOAD>>; MW],
    flow: FlowState,
    scratch: [u8; SCRATCH],
    user_data: Option<u32>,
    inbox: Inbox<PAYLOAD, INBOX>,
}

impl<const PAYLOAD: usize, const SCRATCH: usize, const MIXINS: usize, const MW: usize, const INBOX: usize>
    Entity<PAYLOAD, SCRATCH, MIXINS, MW, INBOX>
{
    const NO_MIXIN: Option<Mixin<PAYLOAD, SCRATCH>> = None;
    const NO_MIDDLEWARE: Option<MiddlewareSlot<PAYLOAD>> = None;

    /// Builds an entity in `init` state: registered to `id`, not yet
    /// started.
    pub const fn new(
        id: u16,
        name: &'static str,
        states: &'static [StateDef<PAYLOAD, SCRATCH>],
        initial_state: u16,
    ) -> Self {
        Self {
            id,
            name,
            states,
            initial_state,
            current_state: initial_state,
            flags: EntityFlags::empty(),
            mixins: [Self::NO_MIXIN; MIXINS],
            middleware: [Self::NO_MIDDLEWARE; MW],
            flow: FlowState::new(),
            scratch: [0; SCRATCH],
            user_data: None,
            inbox: Inbox::new(),
        }
    }

    pub const fn id(&self) -> u16 {
        self.id
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn current_state(&self) -> u16 {
        self.current_state
    }

    pub const fn is_active(&self) -> bool {
        self.flags.contains(EntityFlags::ACTIVE)
    }

    pub const fn is_suspended(&self) -> bool {
        self.flags.contains(EntityFlags::SUSPENDED)
    }

    pub fn flags(&self) -> EntityFlags {
        self.flags
    }

    pub fn is_supervised(&self) -> bool {
        self.flags.contains(EntityFlags::SUPERVISED)
    }

    pub fn is_supervisor(&self) -> bool {
        self.flags.contains(EntityFlags::SUPERVISOR)
    }

    /// Marks this entity as supervised: a collaborator's concern (which
    /// entity its `SYS_DYING` reports go to) the engine only carries the bit
    /// for.
    pub fn mark_supervised(&mut self) {
        self.flags.insert(EntityFlags::SUPERVISED);
    }

    /// Marks this entity as acting as a supervisor for others.
    pub fn mark_supervisor(&mut self) {
        self.flags.insert(EntityFlags::SUPERVISOR);
    }

    pub fn user_data(&self) -> Option<u32> {
        self.user_data
    }

    pub fn set_user_data(&mut self, handle: u32) {
        self.user_data = Some(handle);
    }

    pub(crate) fn inbox(&self) -> &Inbox<PAYLOAD, INBOX> {
        &self.inbox
    }

    /// Number of signals currently queued in this entity's inbox.
    pub fn inbox_len(&self) -> usize {
        self.inbox.len()
    }

    /// The coroutine's pending wake deadline, or 0 if it isn't waiting on a
    /// timer. A run loop polls this to know when to deliver `SIG_TIMEOUT`.
    pub fn flow_wait_until(&self) -> u32 {
        self.flow.flow_wait_until
    }

    /// Pushes a signal directly into this entity's own inbox. Prefer
    /// emitting through a registry so producers don't need a reference to
    /// the entity itself; this exists for callers (tests, a run loop wiring
    /// its own external interrupt sources) that already hold one.
    pub fn inbox_push(&self, signal: Signal<PAYLOAD>) -> Result<(), DispatchError> {
        self.inbox.try_push(signal)
    }

    /// Pops one signal from this entity's inbox without waiting.
    pub fn inbox_pop(&self) -> Option<Signal<PAYLOAD>> {
        self.inbox.try_pop()
    }

    /// `in_state(e, s)`: true when `current_state == s`, or when HSM is
    /// enabled and `s` is an ancestor of `current_state` via `parent_id`
    /// chains. Traversal is bounded by the state table
    /// length to guarantee termination even if a table is misconfigured
    /// with a cycle.
    #[cfg(feature = "hsm")]
    pub fn in_state(&self, s: u16) -> bool {
        let mut cur = self.current_state;
        for _ in 0..=self.states.len() {
            if cur == s {
                return true;
            }
            match find_state(self.states, cur) {
                Some(def) if def.has_parent() => cur = def.parent_id,
                _ => return false,
            }
        }
        false
    }

    #[cfg(not(feature = "hsm"))]
    pub fn in_state(&self, s: u16) -> bool {
        self.current_state == s
    }

    /// Attaches a mixin to the first free slot. `NoMemory` if the
    /// mixin-attachment array is full. Keeps the array sorted ascending by
    /// priority, ties broken by attachment order, so rule lookup can walk
    /// it in order without re-sorting.
    pub fn bind_mixin(&mut self, mixin: Mixin<PAYLOAD, SCRATCH>) -> Result<(), DispatchError> {
        let free = self
            .mixins
            .iter()
            .position(|m| m.is_none())
            .ok_or(DispatchError::NoMemory)?;
        self.mixins[free] = Some(mixin);
        let mut i = free;
        while i > 0 {
            let (a, b) = (self.mixins[i - 1], self.mixins[i]);
            match (a, b) {
                (Some(a), Some(b)) if a.priority > b.priority => {
                    self.mixins.swap(i - 1, i);
                    i -= 1;
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Detaches a mixin by name. `NotFound` if it isn't attached.
    pub fn unbind_mixin(&mut self, name: &str) -> Result<(), DispatchError> {
        for slot in self.mixins.iter_mut() {
            if slot.map(|m| m.name == name).unwrap_or(false) {
                *slot = None;
                return Ok(());
            }
        }
        Err(DispatchError::NotFound)
    }

    /// Registers a middleware function at `priority`, keeping the array
    /// sorted ascending by priority with registration order preserved on
    /// ties. `NoMemory` if the middleware array is full.
    pub fn register_middleware(
        &mut self,
        func: crate::middleware::MiddlewareFn<PAYLOAD>,
        ctx: usize,
        priority: u8,
    ) -> Result<(), DispatchError> {
        let free = self
            .middleware
            .iter()
            .position(|s| s.is_none())
            .ok_or(DispatchError::NoMemory)?;
        self.middleware[free] = Some(MiddlewareSlot {
            func,
            ctx,
            priority,
            enabled: true,
        });
        // Insertion sort by priority; stable w.r.t. registration order
        // because we only ever swap an element backward past strictly
        // greater priorities.
        let mut i = free;
        while i > 0 {
            let (a, b) = (self.middleware[i - 1], self.middleware[i]);
            match (a, b) {
                (Some(a), Some(b)) if a.priority > b.priority => {
                    self.middleware.swap(i - 1, i);
                    i -= 1;
                }
                _ => break,
            }
        }
        Ok(())
    }

    pub fn unregister_middleware(&mut self, ctx: usize) -> Result<(), DispatchError> {
        for slot in self.middleware.iter_mut() {
            if slot.map(|s| s.ctx == ctx).unwrap_or(false) {
                *slot = None;
                return Ok(());
            }
        }
        Err(DispatchError::NotFound)
    }

    /// Enables or disables a registered middleware slot without
    /// unregistering it — a disabled slot is skipped by the dispatch
    /// pipeline but keeps its place in priority order.
    pub fn set_middleware_enabled(&mut self, ctx: usize, enabled: bool) -> Result<(), DispatchError> {
        for slot in self.middleware_slots_mut() {
            if slot.ctx == ctx {
                slot.enabled = enabled;
                return Ok(());
            }
        }
        Err(DispatchError::NotFound)
    }

    pub fn is_middleware_enabled(&self, ctx: usize) -> Option<bool> {
        self.middleware_slots().find(|s| s.ctx == ctx).map(|s| s.enabled)
    }

    pub(crate) fn middleware_slots(&self) -> impl Iterator<Item = &MiddlewareSlot<PAYLOAD>> {
        self.middleware.iter().filter_map(|s| s.as_ref())
    }

    pub(crate) fn middleware_slots_mut(
        &mut self,
    ) -> impl Iterator<Item = &mut MiddlewareSlot<PAYLOAD>> {
        self.middleware.iter_mut().filter_map(|s| s.as_mut())
    }

    pub(crate) fn mixins(&self) -> impl Iterator<Item = &Mixin<PAYLOAD, SCRATCH>> {
        self.mixins.iter().filter_map(|m| m.as_ref())
    }

    /// `start`: enters `initial_state`, delivering `SYS_INIT` then
    /// `SYS_ENTRY` to it. A no-op if already active.
    pub fn start(&mut self, now_ms: u32, emit_sink: Option<&dyn EmitSink<PAYLOAD>>) {
        if self.is_active() {
            return;
        }
        self.flags.insert(EntityFlags::ACTIVE);
        self.current_state = self.initial_state;
        let init = Signal::synthetic(SIG_INIT, now_ms);
        self.run_entry_exit_action(self.initial_state, false, &init, emit_sink);
        let entry = Signal::synthetic(SIG_ENTRY, now_ms);
        self.run_entry_exit_action(self.initial_state, false, &entry, emit_sink);
    }

    /// `stop`: fires the current state's `on_exit` and clears `ACTIVE`.
    pub fn stop(&mut self, now_ms: u32, emit_sink: Option<&dyn EmitSink<PAYLOAD>>) {
        if !self.is_active() {
            return;
        }
        let exit = Signal::synthetic(SIG_EXIT, now_ms);
        self.run_entry_exit_action(self.current_state, true, &exit, emit_sink);
        self.flags.remove(EntityFlags::ACTIVE);
    }

    pub fn suspend(&mut self) {
        self.flags.insert(EntityFlags::SUSPENDED);
    }

    pub fn resume(&mut self) {
        self.flags.remove(EntityFlags::SUSPENDED);
    }

    /// Forces the state to `target` without rule matching, still firing
    /// exit/entry. Calling this twice with the same target fires exit+entry
    /// exactly once each time — there is no short-circuit for "already
    /// there".
    pub fn set_state(
        &mut self,
        target: u16,
        now_ms: u32,
        emit_sink: Option<&dyn EmitSink<PAYLOAD>>,
    ) {
        self.transition_to(target, now_ms, emit_sink);
    }

    pub(crate) fn transition_to(
        &mut self,
        target: u16,
        now_ms: u32,
        emit_sink: Option<&dyn EmitSink<PAYLOAD>>,
    ) {
        if target == self.current_state || target == 0 {
            return;
        }
        let exit = Signal::synthetic(SIG_EXIT, now_ms);
        self.run_entry_exit_action(self.current_state, true, &exit, emit_sink);
        self.current_state = target;
        let entry = Signal::synthetic(SIG_ENTRY, now_ms);
        self.run_entry_exit_action(self.current_state, false, &entry, emit_sink);
    }

    fn run_entry_exit_action(
        &mut self,
        state_id: u16,
        exit: bool,
        signal: &Signal<PAYLOAD>,
        emit_sink: Option<&dyn EmitSink<PAYLOAD>>,
    ) {
        let action = find_state(self.states, state_id).and_then(|s| if exit { s.on_exit } else { s.on_entry });
        if let Some(action) = action {
            // Return value is ignored: entry/exit cannot initiate further
            // transitions within the same dispatch step.
            let _ = self.run_action(action, signal.timestamp, signal, emit_sink);
        }
    }

    /// Calls `action` with a freshly built [`ActionCtx`] borrowing this
    /// entity's own scratch/flow/inbox — the "self emit" path never
    /// re-enters the registry.
    pub(crate) fn run_action(
        &mut self,
        action: crate::rule::Action<PAYLOAD, SCRATCH>,
        now_ms: u32,
        signal: &Signal<PAYLOAD>,
        emit_sink: Option<&dyn EmitSink<PAYLOAD>>,
    ) -> u16 {
        let inbox = &self.inbox;
        let mut push = |s: Signal<PAYLOAD>| inbox.try_push(s);
        let mut cx = ActionCtx::new(self.id, now_ms, &mut self.flow, &mut self.scratch, &mut push, emit_sink);
        action(&mut cx, signal)
    }

    pub(crate) fn states(&self) -> &'static [StateDef<PAYLOAD, SCRATCH>] {
        self.states
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static STATES: &[StateDef<4, 64>] = &[StateDef {
        id: 1,
        parent_id: 0,
        on_entry: None,
        on_exit: None,
        rules: &[],
    }];

    #[test]
    fn supervision_flags_are_independent_and_off_by_default() {
        let mut e: Entity<4, 64, 4, 4, 8> = Entity::new(1, "a", STATES, 1);
        assert!(!e.is_supervised());
        assert!(!e.is_supervisor());

        e.mark_supervised();
        assert!(e.is_supervised());
        assert!(!e.is_supervisor());

        e.mark_supervisor();
        assert!(e.is_supervised());
        assert!(e.is_supervisor());
    }
}
