// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Blocking waits.
//!
//! Every wait in the boot path goes through [`spin_until`]. With
//! [`Patience::Forever`], which is what the firmware uses, a wait returns only
//! once its condition holds, and it never yields or sleeps: the waiting core
//! spends all of its cycles polling. The liveness assumption is that the
//! hardware (or the peer core) eventually reports ready. If it doesn't, the
//! core stays here, and that is the intended outcome.
//!
//! [`Patience::Polls`] bounds the wait. It exists so the boot path can be
//! exercised in tests and so that handshakes with a peer that might never
//! answer (launching core 1) can give up.

use crate::regs::{Reg, RegisterAccess};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Patience {
    /// Block until the condition holds, however long that takes.
    Forever,
    /// Evaluate the condition at most this many times.
    Polls(u32),
}

/// Identifies which wait gave up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WaitPoint {
    PowerDone,
    ResetDone,
    Peer,
}

/// A bounded wait ran out of polls. Never produced under
/// [`Patience::Forever`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WaitTimeout {
    pub point: WaitPoint,
    /// The last value observed, masked to the bits being waited on.
    pub observed: u32,
    pub polls: u32,
}

/// Evaluates `ready` until it returns `true`, calling `relax` between
/// evaluations.
///
/// Returns `Ok(n)` where `n` counts evaluations including the one that
/// succeeded, or `Err(n)` if `patience` ran out after `n` evaluations.
/// `Patience::Polls(0)` gives up without evaluating `ready` at all.
pub fn spin_until(
    patience: Patience,
    mut ready: impl FnMut() -> bool,
    mut relax: impl FnMut(),
) -> Result<u32, u32> {
    let mut polls = 0u32;
    loop {
        if let Patience::Polls(limit) = patience {
            if polls >= limit {
                return Err(polls);
            }
        }
        if polls != 0 {
            relax();
        }
        polls = polls.saturating_add(1);
        if ready() {
            return Ok(polls);
        }
    }
}

/// Polls `reg` until every bit of `mask` reads as 1, issuing a no-op between
/// reads. A partially-set mask never satisfies the wait.
pub fn wait_for_bits(
    hw: &impl RegisterAccess,
    reg: Reg,
    mask: u32,
    patience: Patience,
    point: WaitPoint,
) -> Result<u32, WaitTimeout> {
    let mut observed = 0;
    spin_until(
        patience,
        || {
            observed = hw.read(reg) & mask;
            observed == mask
        },
        || hw.nop(),
    )
    .map_err(|polls| WaitTimeout {
        point,
        observed,
        polls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::fake::FakeRegs;
    use crate::regs::psm;

    #[test]
    fn ready_immediately_is_one_poll() {
        assert_eq!(spin_until(Patience::Forever, || true, || ()), Ok(1));
    }

    #[test]
    fn relax_runs_between_polls_only() {
        let mut left = 3;
        let mut relaxed = 0;
        let r = spin_until(
            Patience::Forever,
            || {
                left -= 1;
                left == 0
            },
            || relaxed += 1,
        );
        assert_eq!(r, Ok(3));
        assert_eq!(relaxed, 2);
    }

    #[test]
    fn bounded_wait_gives_up_after_limit() {
        let mut evaluated = 0;
        let r = spin_until(
            Patience::Polls(5),
            || {
                evaluated += 1;
                false
            },
            || (),
        );
        assert_eq!(r, Err(5));
        assert_eq!(evaluated, 5);
    }

    #[test]
    fn zero_polls_never_evaluates() {
        let mut evaluated = 0;
        let mut relaxed = 0;
        let r = spin_until(
            Patience::Polls(0),
            || {
                evaluated += 1;
                true
            },
            || relaxed += 1,
        );
        assert_eq!(r, Err(0));
        assert_eq!((evaluated, relaxed), (0, 0));
    }

    #[test]
    fn bounded_wait_does_not_relax_after_last_poll() {
        let mut relaxed = 0;
        let r = spin_until(Patience::Polls(3), || false, || relaxed += 1);
        assert_eq!(r, Err(3));
        assert_eq!(relaxed, 2);
    }

    #[test]
    fn bounded_wait_succeeding_on_last_poll() {
        let mut n = 0;
        let r = spin_until(
            Patience::Polls(4),
            || {
                n += 1;
                n == 4
            },
            || (),
        );
        assert_eq!(r, Ok(4));
    }

    #[test]
    fn partial_mask_never_satisfies() {
        let hw = FakeRegs::new();
        hw.set(psm::DONE, 0b0111_1110);

        let r = wait_for_bits(
            &hw,
            psm::DONE,
            0x7f,
            Patience::Polls(1000),
            WaitPoint::PowerDone,
        );

        assert_eq!(
            r,
            Err(WaitTimeout {
                point: WaitPoint::PowerDone,
                observed: 0b0111_1110,
                polls: 1000,
            })
        );
        assert_eq!(hw.reads_of(psm::DONE), 1000);
    }

    #[test]
    fn extra_bits_outside_mask_are_ignored() {
        let hw = FakeRegs::new();
        hw.set(psm::DONE, 0xFFFF_FFFF);

        let r = wait_for_bits(
            &hw,
            psm::DONE,
            0x7f,
            Patience::Forever,
            WaitPoint::PowerDone,
        );
        assert_eq!(r, Ok(1));
    }
}
