// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Starting core 1 through the bootrom's FIFO handshake.
//!
//! Out of reset, core 1 sits in the bootrom waiting on its end of the SIO
//! FIFO. Core 0 sends it a fixed sequence of words and the bootrom echoes each
//! one back; once the last word is echoed, core 1 jumps to the entry point
//! with the stack and vector table it was given.

use crate::regs::{sio, RegisterAccess};
use crate::wait::{spin_until, Patience};
use ringbuf::*;

/// What the core 1 bootrom needs to start executing our code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Core1Launch {
    pub vector_table: u32,
    pub stack_top: u32,
    pub entry: u32,
}

impl Core1Launch {
    /// The handshake words, in order. The leading zeros resynchronise the
    /// bootrom's state machine and the 1 is the launch command.
    pub fn words(&self) -> [u32; 6] {
        [0, 0, 1, self.vector_table, self.stack_top, self.entry]
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Full handshakes to try before giving up.
    pub attempts: u32,
    /// Polls allowed for each FIFO response.
    pub response_polls: u32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Attempt(u32),
    StuckFifo,
    NoRoom { word: u32 },
    NoEcho { word: u32 },
    BadEcho { sent: u32, got: u32 },
    Started,
    Unresponsive,
}

// Only core 0 launches.
ringbuf!(Trace, 16, Trace::None);

/// Runs the launch handshake up to `config.attempts` times, starting over
/// whenever core 1 answers out of step. `sev` wakes the other core from its
/// wait-for-event.
///
/// Returns `true` once every word has come back as its own echo.
pub fn launch_core1(
    hw: &impl RegisterAccess,
    launch: &Core1Launch,
    config: LaunchConfig,
    mut sev: impl FnMut(),
) -> bool {
    let patience = Patience::Polls(config.response_polls);
    for attempt in 0..config.attempts {
        ringbuf_entry!(Trace::Attempt(attempt));
        if send_launch(hw, launch, patience, &mut sev) {
            ringbuf_entry!(Trace::Started);
            return true;
        }
    }
    ringbuf_entry!(Trace::Unresponsive);
    false
}

fn send_launch(
    hw: &impl RegisterAccess,
    launch: &Core1Launch,
    patience: Patience,
    sev: &mut impl FnMut(),
) -> bool {
    for word in launch.words() {
        if word == 0 {
            if !drain_fifo(hw, patience) {
                ringbuf_entry!(Trace::StuckFifo);
                return false;
            }
            sev();
        }

        if !fifo_wait(hw, sio::FIFO_ST_RDY, patience) {
            ringbuf_entry!(Trace::NoRoom { word });
            return false;
        }
        hw.write(sio::FIFO_WR, word);
        sev();

        if !fifo_wait(hw, sio::FIFO_ST_VLD, patience) {
            ringbuf_entry!(Trace::NoEcho { word });
            return false;
        }
        let got = hw.read(sio::FIFO_RD);
        if got != word {
            ringbuf_entry!(Trace::BadEcho { sent: word, got });
            return false;
        }
    }
    true
}

fn fifo_wait(hw: &impl RegisterAccess, mask: u32, patience: Patience) -> bool {
    spin_until(
        patience,
        || hw.read(sio::FIFO_ST) & mask != 0,
        || hw.nop(),
    )
    .is_ok()
}

/// Pops whatever is waiting in our receive side of the FIFO.
fn drain_fifo(hw: &impl RegisterAccess, patience: Patience) -> bool {
    spin_until(
        patience,
        || hw.read(sio::FIFO_ST) & sio::FIFO_ST_VLD == 0,
        || {
            hw.read(sio::FIFO_RD);
        },
    )
    .is_ok()
}
