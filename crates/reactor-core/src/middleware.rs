// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use reactor_abi::Signal;

/// The verdict a middleware function returns for one signal.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Verdict {
    /// Let the signal proceed to the next middleware, then rule matching.
    Continue,
    /// Stop the pipeline here; no rule matching occurs. Not an error.
    Handled,
    /// Drop the signal entirely; statistics are incremented.
    Filtered,
    /// The signal value was mutated in place; proceed as `Continue`.
    Transform,
}

/// Context passed to a middleware function alongside the signal itself.
#[derive(Copy, Clone, Debug)]
pub struct MiddlewareCtx {
    pub entity_id: u16,
    pub now_ms: u32,
    /// Opaque per-slot context handle, set at [`register_middleware`] time
    /// and interpreted only by the middleware implementation (an index into
    /// a collaborator's own table, a packed small value, etc).
    ///
    /// [`register_middleware`]: crate::Entity::register_middleware
    pub ctx: usize,
}

pub type MiddlewareFn<const PAYLOAD: usize = 4> =
    fn(MiddlewareCtx, &mut Signal<PAYLOAD>) -> Verdict;

/// Per-entity middleware slot. Slots are stored in a
/// fixed-size array and walked in ascending `priority`, registration order
/// breaking ties.
#[derive(Copy, Clone)]
pub struct MiddlewareSlot<const PAYLOAD: usize = 4> {
    pub(crate) func: MiddlewareFn<PAYLOAD>,
    pub(crate) ctx: usize,
    pub(crate) priority: u8,
    pub(crate) enabled: bool,
}

impl<const PAYLOAD: usize> core::fmt::Debug for MiddlewareSlot<PAYLOAD> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MiddlewareSlot")
            .field("ctx", &self.ctx)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .finish()
    }
}
