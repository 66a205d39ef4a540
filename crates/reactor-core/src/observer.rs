// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The black-box hook: an optional per-dispatch callback, invoked once per
//! processed signal. `reactor-trace` is the reference implementor, recording
//! each call into a ring buffer and a set of per-outcome counters, but the
//! trait itself carries no dependency on that crate — any collaborator
//! (an external trace sink, a test spy) can implement it.

use crate::dispatcher::DispatchOutcome;

/// Observes one step of the dispatch pipeline after it has run.
pub trait DispatchObserver<const PAYLOAD: usize = 4> {
    /// Called once per signal a `dispatch`/`dispatch_all` step processed,
    /// after the pipeline (middleware, rule lookup, action, transition) has
    /// fully run. `state` is the entity's state *after* any transition this
    /// step applied.
    fn on_dispatch(
        &self,
        entity_id: u16,
        signal_id: u16,
        src_id: u16,
        state: u16,
        timestamp: u32,
        outcome: DispatchOutcome,
    );
}
