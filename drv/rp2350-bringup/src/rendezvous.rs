// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Two-core rendezvous.
//!
//! [`rendezvous`] is a symmetric, single-use barrier. Each core announces that
//! it has arrived and then blocks until it sees that the other core has too,
//! so neither call returns before both cores have made it. Cores announce
//! through a [`Mailbox`]:
//!
//! - [`FifoMailbox`] uses the SIO inter-core FIFO, which is what the firmware
//!   does. Each core owns its own instance over its own view of the FIFO.
//! - [`FlagMailbox`] is a pair of atomic flags in shared memory. It works for
//!   any two execution contexts, which includes host threads.
//!
//! The barrier trusts the `me` it is given. Passing the identity of the other
//! core makes each side wait on itself and the barrier does not hold.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::regs::{sio, RegisterAccess};
use crate::wait::{spin_until, Patience, WaitPoint, WaitTimeout};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CoreId {
    Core0 = 0,
    Core1 = 1,
}

impl CoreId {
    /// Reads the SIO CPUID register of the calling core.
    pub fn current(hw: &impl RegisterAccess) -> Self {
        Self::from_cpuid(hw.read(sio::CPUID))
    }

    pub fn from_cpuid(raw: u32) -> Self {
        if raw & 1 == 0 {
            CoreId::Core0
        } else {
            CoreId::Core1
        }
    }

    pub fn peer(self) -> Self {
        match self {
            CoreId::Core0 => CoreId::Core1,
            CoreId::Core1 => CoreId::Core0,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// How one core tells the other it has arrived.
pub trait Mailbox {
    /// Announces that `me` has reached the checkpoint, waiting as long as
    /// `patience` allows for room to do so. `Err` carries the polls spent.
    fn post(&self, me: CoreId, patience: Patience) -> Result<(), u32>;

    /// Checks, without blocking, whether the peer of `me` has announced.
    fn peer_arrived(&self, me: CoreId) -> bool;
}

/// Announces arrival of `me` and blocks until the peer has arrived too.
///
/// Returns the number of times the mailbox was checked for the peer. Under
/// [`Patience::Forever`] this never returns while the peer is absent. A
/// bounded `patience` applies to posting and to waiting separately.
pub fn rendezvous(
    mailbox: &impl Mailbox,
    me: CoreId,
    patience: Patience,
) -> Result<u32, WaitTimeout> {
    let timeout = |polls| WaitTimeout {
        point: WaitPoint::Peer,
        observed: 0,
        polls,
    };
    mailbox.post(me, patience).map_err(timeout)?;
    spin_until(patience, || mailbox.peer_arrived(me), core::hint::spin_loop)
        .map_err(timeout)
}

/// Arrival flags in shared memory, one per core.
pub struct FlagMailbox {
    arrived: [AtomicBool; 2],
}

impl FlagMailbox {
    pub const fn new() -> Self {
        Self {
            arrived: [AtomicBool::new(false), AtomicBool::new(false)],
        }
    }
}

impl Default for FlagMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox for FlagMailbox {
    fn post(&self, me: CoreId, _patience: Patience) -> Result<(), u32> {
        // Release: everything this core did before arriving is visible to a
        // peer that observes the flag.
        self.arrived[me.index()].store(true, Ordering::Release);
        Ok(())
    }

    fn peer_arrived(&self, me: CoreId) -> bool {
        self.arrived[me.peer().index()].load(Ordering::Acquire)
    }
}

/// Word a core pushes into the FIFO to announce arrival; the low bit is the
/// sender's core number.
pub const FIFO_TOKEN: u32 = 0x5259_4E00;

pub const fn fifo_token(core: CoreId) -> u32 {
    FIFO_TOKEN | core as u32
}

/// Rendezvous over the SIO inter-core FIFO.
///
/// Not shareable between cores: the FIFO's read side is per-core, and this
/// remembers whether the peer's token has been popped already. Words other
/// than the peer's token are popped and dropped.
pub struct FifoMailbox<'a, A> {
    hw: &'a A,
    seen: Cell<bool>,
}

impl<'a, A: RegisterAccess> FifoMailbox<'a, A> {
    pub fn new(hw: &'a A) -> Self {
        Self {
            hw,
            seen: Cell::new(false),
        }
    }
}

impl<A: RegisterAccess> Mailbox for FifoMailbox<'_, A> {
    fn post(&self, me: CoreId, patience: Patience) -> Result<(), u32> {
        spin_until(
            patience,
            || self.hw.read(sio::FIFO_ST) & sio::FIFO_ST_RDY != 0,
            || self.hw.nop(),
        )?;
        self.hw.write(sio::FIFO_WR, fifo_token(me));
        Ok(())
    }

    fn peer_arrived(&self, me: CoreId) -> bool {
        if !self.seen.get()
            && self.hw.read(sio::FIFO_ST) & sio::FIFO_ST_VLD != 0
            && self.hw.read(sio::FIFO_RD) == fifo_token(me.peer())
        {
            self.seen.set(true);
        }
        self.seen.get()
    }
}
