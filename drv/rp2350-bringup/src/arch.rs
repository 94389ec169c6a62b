// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Architecture-specific register access.
//!
//! On ARM this provides [`Mmio`], which talks to the real device. Host builds
//! get no real implementation at all; tests use the simulated register file in
//! `fake` instead.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "arm")] {
        mod arm_m;
        pub use arm_m::*;
    }
}

#[cfg(test)]
pub(crate) mod fake;
