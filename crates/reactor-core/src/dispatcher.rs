// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The single-signal pipeline: middleware pass, rule lookup, action
//! execution, transition.

use reactor_abi::{Clock, DispatchError, Idle, Signal};

use crate::action::EmitSink;
use crate::entity::Entity;
use crate::middleware::{MiddlewareCtx, Verdict};
use crate::observer::DispatchObserver;
use crate::rule::{find_rule, Rule};
use crate::state::find_state;

/// What happened to the one signal a [`dispatch`] call processed. Not an
/// error: an unmatched or filtered signal is a normal outcome, reported to
/// the caller as `Ok`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DispatchOutcome {
    /// A rule matched; its action (if any) ran and any resulting
    /// transition was applied.
    Matched,
    /// Middleware returned `Filtered`; the signal was dropped before rule
    /// lookup.
    Filtered,
    /// Middleware returned `Handled`; the pipeline stopped before rule
    /// lookup, but this is not a drop (the middleware owns the outcome).
    Handled,
    /// No rule matched in the current state, its mixins, or (if enabled)
    /// its HSM parent chain.
    Unmatched,
}

/// Pops one signal from `entity`'s inbox, waiting up to `timeout_ms`, and
/// runs it through the full pipeline. `InvalidArg` if the entity is
/// inactive or suspended; `Timeout` if no signal arrived within the wait.
pub fn dispatch<const PAYLOAD: usize, const SCRATCH: usize, const MIXINS: usize, const MW: usize, const INBOX: usize>(
    entity: &mut Entity<PAYLOAD, SCRATCH, MIXINS, MW, INBOX>,
    timeout_ms: u32,
    now_ms: u32,
    clock: &dyn Clock,
    idle: &dyn Idle,
    emit_sink: Option<&dyn EmitSink<PAYLOAD>>,
) -> Result<DispatchOutcome, DispatchError> {
    dispatch_with_observer(entity, timeout_ms, now_ms, clock, idle, emit_sink, None)
}

/// As [`dispatch`], but invokes `observer` (if present) with the outcome of
/// the one signal processed.
pub fn dispatch_with_observer<const PAYLOAD: usize, const SCRATCH: usize, const MIXINS: usize, const MW: usize, const INBOX: usize>(
    entity: &mut Entity<PAYLOAD, SCRATCH, MIXINS, MW, INBOX>,
    timeout_ms: u32,
    now_ms: u32,
    clock: &dyn Clock,
    idle: &dyn Idle,
    emit_sink: Option<&dyn EmitSink<PAYLOAD>>,
    observer: Option<&dyn DispatchObserver<PAYLOAD>>,
) -> Result<DispatchOutcome, DispatchError> {
    if !entity.is_active() || entity.is_suspended() {
        return Err(DispatchError::InvalidArg);
    }
    let signal = entity
        .inbox()
        .pop_wait(timeout_ms, clock, idle)
        .ok_or(DispatchError::Timeout)?;
    Ok(run_pipeline(entity, signal, now_ms, emit_sink, observer))
}

/// Drains `entity`'s inbox non-blockingly, running the pipeline on each
/// signal in turn. Returns the count processed (does not count signals
/// that never arrived — there's no waiting here at all).
pub fn dispatch_all<const PAYLOAD: usize, const SCRATCH: usize, const MIXINS: usize, const MW: usize, const INBOX: usize>(
    entity: &mut Entity<PAYLOAD, SCRATCH, MIXINS, MW, INBOX>,
    now_ms: u32,
    emit_sink: Option<&dyn EmitSink<PAYLOAD>>,
) -> Result<u32, DispatchError> {
    dispatch_all_with_observer(entity, now_ms, emit_sink, None)
}

/// As [`dispatch_all`], but invokes `observer` (if present) once per signal
/// drained, after its pipeline step has fully run.
pub fn dispatch_all_with_observer<const PAYLOAD: usize, const SCRATCH: usize, const MIXINS: usize, const MW: usize, const INBOX: usize>(
    entity: &mut Entity<PAYLOAD, SCRATCH, MIXINS, MW, INBOX>,
    now_ms: u32,
    emit_sink: Option<&dyn EmitSink<PAYLOAD>>,
    observer: Option<&dyn DispatchObserver<PAYLOAD>>,
) -> Result<u32, DispatchError> {
    if !entity.is_active() || entity.is_suspended() {
        return Err(DispatchError::InvalidArg);
    }
    let mut count = 0u32;
    while let Some(signal) = entity.inbox().try_pop() {
        run_pipeline(entity, signal, now_ms, emit_sink, observer);
        count += 1;
    }
    Ok(count)
}

fn run_pipeline<const PAYLOAD: usize, const SCRATCH: usize, const MIXINS: usize, const MW: usize, const INBOX: usize>(
    entity: &mut Entity<PAYLOAD, SCRATCH, MIXINS, MW, INBOX>,
    mut signal: Signal<PAYLOAD>,
    now_ms: u32,
    emit_sink: Option<&dyn EmitSink<PAYLOAD>>,
    observer: Option<&dyn DispatchObserver<PAYLOAD>>,
) -> DispatchOutcome {
    let entity_id = entity.id();
    let signal_id = signal.id;
    let src_id = signal.src_id;
    let timestamp = signal.timestamp;

    let report = |outcome: DispatchOutcome, entity: &Entity<PAYLOAD, SCRATCH, MIXINS, MW, INBOX>| {
        if let Some(observer) = observer {
            observer.on_dispatch(
                entity_id,
                signal_id,
                src_id,
                entity.current_state(),
                timestamp,
                outcome,
            );
        }
        outcome
    };

    let mut stopped = None;
    for slot in entity.middleware_slots_mut() {
        if !slot.enabled {
            continue;
        }
        let ctx = MiddlewareCtx {
            entity_id,
            now_ms,
            ctx: slot.ctx,
        };
        match (slot.func)(ctx, &mut signal) {
            Verdict::Continue | Verdict::Transform => {}
            Verdict::Handled => {
                stopped = Some(DispatchOutcome::Handled);
                break;
            }
            Verdict::Filtered => {
                stopped = Some(DispatchOutcome::Filtered);
                break;
            }
        }
    }
    if let Some(outcome) = stopped {
        return report(outcome, entity);
    }

    let rule = match find_applicable_rule(entity, signal.id) {
        Some(rule) => rule,
        None => return report(DispatchOutcome::Unmatched, entity),
    };

    let action_next = rule
        .action
        .map(|action| entity.run_action(action, now_ms, &signal, emit_sink))
        .unwrap_or(0);
    let effective = if action_next != 0 {
        action_next
    } else {
        rule.next_state
    };
    if effective != 0 {
        entity.transition_to(effective, now_ms, emit_sink);
    }
    report(DispatchOutcome::Matched, entity)
}

fn find_applicable_rule<const PAYLOAD: usize, const SCRATCH: usize, const MIXINS: usize, const MW: usize, const INBOX: usize>(
    entity: &Entity<PAYLOAD, SCRATCH, MIXINS, MW, INBOX>,
    signal_id: u16,
) -> Option<Rule<PAYLOAD, SCRATCH>> {
    let current = entity.current_state();

    if let Some(state) = find_state(entity.states(), current) {
        if let Some(rule) = find_rule(state.rules, signal_id) {
            return Some(*rule);
        }
    }

    for mixin in entity.mixins() {
        if let Some(rule) = find_rule(mixin.rules, signal_id) {
            return Some(*rule);
        }
    }

    #[cfg(feature = "hsm")]
    {
        let mut parent_id = find_state(entity.states(), current)
            .filter(|s| s.has_parent())
            .map(|s| s.parent_id);
        let mut depth = 0usize;
        while let Some(id) = parent_id {
            depth += 1;
            if depth > entity.states().len() {
                break;
            }
            let Some(state) = find_state(entity.states(), id) else {
                break;
            };
            if let Some(rule) = find_rule(state.rules, signal_id) {
                return Some(*rule);
            }
            parent_id = state.has_parent().then_some(state.parent_id);
        }
    }

    None
}
