// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::rule::{Action, Rule};

/// A named node in an FSM: a rule table plus optional entry/exit actions and
/// an optional HSM parent.
///
/// `parent_id == 0` means top-level (no parent). States are held in
/// `'static` tables; the engine resolves `parent_id` by scanning the same
/// table at dispatch time rather than storing a back-pointer, so the table
/// can be a plain `'static` slice with no self-referential construction.
#[derive(Copy, Clone, Debug)]
pub struct StateDef<const PAYLOAD: usize = 4, const SCRATCH: usize = 64> {
    pub id: u16,
    pub parent_id: u16,
    pub on_entry: Option<Action<PAYLOAD, SCRATCH>>,
    pub on_exit: Option<Action<PAYLOAD, SCRATCH>>,
    pub rules: &'static [Rule<PAYLOAD, SCRATCH>],
}

impl<const PAYLOAD: usize, const SCRATCH: usize> StateDef<PAYLOAD, SCRATCH> {
    pub const fn has_parent(&self) -> bool {
        self.parent_id != 0
    }
}

/// Looks up a state by id in a state table.
pub(crate) fn find_state<const PAYLOAD: usize, const SCRATCH: usize>(
    states: &[StateDef<PAYLOAD, SCRATCH>],
    id: u16,
) -> Option<&StateDef<PAYLOAD, SCRATCH>> {
    states.iter().find(|s| s.id == id)
}
