// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::rule::Rule;

/// A state-agnostic, named rule table attachable to multiple entities.
/// Mixins are consulted in ascending priority after the current state's
/// own rules and before any HSM parent.
#[derive(Copy, Clone, Debug)]
pub struct Mixin<const PAYLOAD: usize = 4, const SCRATCH: usize = 64> {
    pub name: &'static str,
    pub priority: u8,
    pub rules: &'static [Rule<PAYLOAD, SCRATCH>],
}
