// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Errors the engine surfaces to callers.
///
/// There is deliberately no `Ok` variant: engine calls return
/// `Result<T, DispatchError>`, so success is just `Ok(T)`. Errors that occur
/// *inside* a dispatch cycle (an unmatched rule, a middleware filtering the
/// signal) are not represented here — per the propagation policy, those are
/// normal outcomes and `dispatch` reports them as `Ok`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DispatchError {
    /// A null target, an inactive entity, or some other caller-supplied
    /// argument that cannot be acted on.
    InvalidArg,
    /// A fixed-capacity table (topic table, subscriber list, mixin array,
    /// middleware array) is full.
    NoMemory,
    /// An entity's inbox is at capacity; the signal was dropped.
    QueueFull,
    /// No entity or topic subscription matched the lookup.
    NotFound,
    /// The entity is not in a state that permits the requested operation
    /// (e.g. dispatching to a suspended or inactive entity).
    InvalidState,
    /// No signal arrived within the requested wait.
    Timeout,
    /// The requested id is already registered.
    AlreadyExists,
    /// The requested feature is compiled out (e.g. HSM parent traversal with
    /// the `hsm` feature disabled).
    Disabled,
}
