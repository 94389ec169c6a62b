// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CoreSight unlock for the trace subsystem.
//!
//! The trace macrocell's configuration registers ignore writes until the
//! unlock key lands in the lock-access register. We write it, check the lock
//! status once, and write it once more if the lock still reads as set. Then we
//! give the downstream domains a short settling delay and fence everything, so
//! that trace configuration issued afterwards (by the debugger or by later
//! code) sees a fully unlocked, clocked unit.
//!
//! A lock that is still set after the second key write is accepted without
//! complaint. The only trace of it is the ringbuf entry and the `retried` flag
//! in the report; the visible symptom would be a trace capture that comes back
//! empty.

use ringbuf::*;

use crate::regs::{coresight, RegisterAccess};

/// What the unlock sequence did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UnlockReport {
    /// One, or two if the lock status still read as locked after the first.
    pub key_writes: u8,
    pub retried: bool,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    KeyWritten,
    LockStatus(u32),
    Retried,
    Settled { spins: u32 },
}

ringbuf!(Trace, 8, Trace::None);

/// Unlocks the trace subsystem, then spins `stabilization_spins` no-ops and
/// issues both barriers.
pub fn unlock_trace(
    hw: &impl RegisterAccess,
    stabilization_spins: u32,
) -> UnlockReport {
    hw.write(coresight::LAR, coresight::UNLOCK_KEY);
    ringbuf_entry!(Trace::KeyWritten);

    let status = hw.read(coresight::LSR);
    ringbuf_entry!(Trace::LockStatus(status));

    let retried = status & coresight::LSR_LOCKED != 0;
    if retried {
        hw.write(coresight::LAR, coresight::UNLOCK_KEY);
        hw.full_barrier();
        ringbuf_entry!(Trace::Retried);
    }

    hw.spin(stabilization_spins);
    hw.full_barrier();
    ringbuf_entry!(Trace::Settled {
        spins: stabilization_spins
    });

    UnlockReport {
        key_writes: if retried { 2 } else { 1 },
        retried,
    }
}
