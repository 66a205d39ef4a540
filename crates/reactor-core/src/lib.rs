// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The dispatch engine: entities, states, rules, mixins, middleware, the
//! inbox, and the single-signal pipeline that ties them together.

#![cfg_attr(not(test), no_std)]

mod action;
mod dispatcher;
mod entity;
mod flags;
mod inbox;
mod middleware;
mod mixin;
mod observer;
mod registry;
mod rule;
mod state;
mod static_cell;

pub use action::{ActionCtx, EmitSink, FlowState};
pub use dispatcher::{
    dispatch, dispatch_all, dispatch_all_with_observer, dispatch_with_observer, DispatchOutcome,
};
pub use entity::Entity;
pub use flags::EntityFlags;
pub use inbox::Inbox;
pub use middleware::{MiddlewareCtx, MiddlewareFn, MiddlewareSlot, Verdict};
pub use mixin::Mixin;
pub use observer::DispatchObserver;
pub use registry::Registry;
pub use rule::{Action, Rule};
pub use state::StateDef;
