// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use reactor_abi::Signal;

use crate::action::ActionCtx;

/// An action function hosted by a rule, or a state's `on_entry`/`on_exit`.
///
/// Returns the `u16` override for the next state: `0` means "no override,
/// use the rule's declared `next_state`" (or, for entry/exit actions, the
/// return value is ignored entirely).
pub type Action<const PAYLOAD: usize = 4, const SCRATCH: usize = 64> =
    fn(&mut ActionCtx<'_, PAYLOAD, SCRATCH>, &Signal<PAYLOAD>) -> u16;

/// A static triple binding a signal id to a next state and an optional
/// action, scoped to a state, a mixin, or a parent in the HSM chain.
///
/// `next_state == 0` means "stay in the current state". Rule tables are
/// `'static` arrays supplied by the application; the engine never owns or
/// allocates them.
#[derive(Copy, Clone, Debug)]
pub struct Rule<const PAYLOAD: usize = 4, const SCRATCH: usize = 64> {
    pub signal_id: u16,
    pub next_state: u16,
    pub action: Option<Action<PAYLOAD, SCRATCH>>,
}

impl<const PAYLOAD: usize, const SCRATCH: usize> Rule<PAYLOAD, SCRATCH> {
    pub const fn new(
        signal_id: u16,
        next_state: u16,
        action: Option<Action<PAYLOAD, SCRATCH>>,
    ) -> Self {
        Self {
            signal_id,
            next_state,
            action,
        }
    }

    pub(crate) fn matches(&self, signal_id: u16) -> bool {
        self.signal_id == signal_id
    }
}

/// Looks up the first rule in `rules` whose `signal_id` matches, in
/// declaration order ("first match wins").
pub(crate) fn find_rule<const PAYLOAD: usize, const SCRATCH: usize>(
    rules: &[Rule<PAYLOAD, SCRATCH>],
    signal_id: u16,
) -> Option<&Rule<PAYLOAD, SCRATCH>> {
    rules.iter().find(|r| r.matches(signal_id))
}
