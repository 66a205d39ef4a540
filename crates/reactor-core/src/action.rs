// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use reactor_abi::{DispatchError, Signal};

/// Coroutine ("uFlow") bookkeeping stored in the entity.
///
/// `flow_line` is the resume point: an opaque step index chosen by the
/// action's own `Begin`/`Yield`/`Await*` bookkeeping, not interpreted by the
/// engine. `flow_wait_sig`/`flow_wait_until` record what the coroutine is
/// blocked on.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct FlowState {
    pub flow_line: u16,
    pub flow_wait_sig: u16,
    pub flow_wait_until: u32,
}

impl FlowState {
    pub const fn new() -> Self {
        Self {
            flow_line: 0,
            flow_wait_sig: 0,
            flow_wait_until: 0,
        }
    }

    /// Clears the resume point, blocking signal, and deadline — the
    /// coroutine's next `Begin` starts from the top.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Capability an [`ActionCtx`] uses to emit to an entity *other than itself*.
///
/// Implemented by [`crate::Registry`]; abstracted behind a trait so
/// `ActionCtx` doesn't need to carry the registry's full const-generic
/// parameter list.
pub trait EmitSink<const PAYLOAD: usize> {
    /// Emits to `target`. Must not be called with the id of the entity whose
    /// action is currently running — that entity's control block is already
    /// mutably borrowed for the duration of the dispatch, so re-entering it
    /// here would deadlock/panic; use [`ActionCtx::emit_self`] instead.
    fn emit(&self, target: u16, signal: Signal<PAYLOAD>) -> Result<(), DispatchError>;
}

/// The context handed to every action, entry, and exit function.
///
/// Bundles exactly what an action may touch: its own entity id, its
/// coroutine state, its scratch buffer, and two emission capabilities —
/// pushing into its own inbox directly (no re-borrow involved) and emitting
/// to any other registered entity via the shared registry.
pub struct ActionCtx<'a, const PAYLOAD: usize = 4, const SCRATCH: usize = 64> {
    pub(crate) id: u16,
    pub(crate) now_ms: u32,
    pub(crate) flow: &'a mut FlowState,
    pub(crate) scratch: &'a mut [u8; SCRATCH],
    pub(crate) self_push: &'a mut dyn FnMut(Signal<PAYLOAD>) -> Result<(), DispatchError>,
    pub(crate) emit_sink: Option<&'a dyn EmitSink<PAYLOAD>>,
}

impl<'a, const PAYLOAD: usize, const SCRATCH: usize> ActionCtx<'a, PAYLOAD, SCRATCH> {
    /// Builds a context directly, without an [`crate::Entity`] around it —
    /// for crates that unit-test coroutine/action bodies against a bare
    /// `FlowState`/scratch buffer rather than a full registered entity.
    pub fn new(
        id: u16,
        now_ms: u32,
        flow: &'a mut FlowState,
        scratch: &'a mut [u8; SCRATCH],
        self_push: &'a mut dyn FnMut(Signal<PAYLOAD>) -> Result<(), DispatchError>,
        emit_sink: Option<&'a dyn EmitSink<PAYLOAD>>,
    ) -> Self {
        Self {
            id,
            now_ms,
            flow,
            scratch,
            self_push,
            emit_sink,
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    /// The dispatcher's clock reading for the step this action is running
    /// under — the same value coroutine timers should measure against.
    pub fn now_ms(&self) -> u32 {
        self.now_ms
    }

    pub fn flow(&self) -> &FlowState {
        self.flow
    }

    pub fn flow_mut(&mut self) -> &mut FlowState {
        self.flow
    }

    pub fn scratch(&self) -> &[u8; SCRATCH] {
        self.scratch
    }

    pub fn scratch_mut(&mut self) -> &mut [u8; SCRATCH] {
        self.scratch
    }

    /// Pushes `signal` into this same entity's own inbox — e.g. a flow
    /// that emits its own completion signal to itself.
    pub fn emit_self(&mut self, signal: Signal<PAYLOAD>) -> Result<(), DispatchError> {
        let signal = self.stamp(signal);
        (self.self_push)(signal)
    }

    /// Emits `signal` to a *different* registered entity.
    pub fn emit_to(&self, target: u16, signal: Signal<PAYLOAD>) -> Result<(), DispatchError> {
        if target == self.id {
            return Err(DispatchError::InvalidArg);
        }
        self.emit_sink
            .ok_or(DispatchError::InvalidArg)?
            .emit(target, self.stamp(signal))
    }

    /// With the `timestamps` feature enabled, stamps `signal` with this
    /// step's clock reading before it leaves the action; otherwise leaves it
    /// untouched (timestamp stays whatever the caller built it with, 0 by
    /// default from [`Signal::new`]).
    fn stamp(&self, signal: Signal<PAYLOAD>) -> Signal<PAYLOAD> {
        if cfg!(feature = "timestamps") {
            signal.with_timestamp(self.now_ms)
        } else {
            signal
        }
    }
}
