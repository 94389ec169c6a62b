// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hardware bring-up for the RP2350 with the ETM trace macrocell.
//!
//! This crate takes both Cortex-M33 cores of an RP2350 from reset to a point
//! where the trace macrocell's preconditions hold (power domains forced on,
//! the peripherals it depends on out of reset, trace clocks gated on, and the
//! CoreSight lock opened), and then lines the two cores up at a rendezvous
//! before either goes on to its own configuration.
//!
//! # Structure
//!
//! - [`regs`] is the register access layer: typed register handles, the
//!   [`RegisterAccess`] capability, and the register map.
//! - [`wait`] holds the one blocking primitive everything else uses.
//! - [`sequencer`] forces power domains on, releases resets, and gates clocks.
//! - [`unlock`] opens the trace subsystem's CoreSight lock.
//! - [`launch`] talks core 1 out of the bootrom.
//! - [`rendezvous`] is the two-party barrier between the cores.
//! - [`dispatch`] is the per-core boot path, as two forward-only state
//!   machines.
//! - [`trace_buffer`] is the storage the trace hardware writes into.
//!
//! Nothing here touches a register except through a [`RegisterAccess`]
//! implementation, so the whole sequence can run against a simulated register
//! file on the host. On ARM targets, [`arch::Mmio`] is the real thing.
//!
//! # Failure policy
//!
//! Bring-up is fail-stop. Every readiness wait is unbounded in the production
//! configuration, and if the hardware never reports ready the core spins
//! there until someone attaches a debugger or pulls reset. Bounded waits exist
//! (see [`wait::Patience`]) but only to make the sequence testable.

#![cfg_attr(target_os = "none", no_std)]

pub mod arch;
pub mod dispatch;
pub mod launch;
pub mod regs;
pub mod rendezvous;
pub mod sequencer;
pub mod trace_buffer;
pub mod unlock;
pub mod wait;

pub use regs::{Reg, RegisterAccess};

use dispatch::{Pin, TickPeriod};
use sequencer::BringupConfig;

/// Core 0 settings for the boot path.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Core0Config {
    /// Pin driving the status LED.
    pub led: Pin,
    /// Number of no-ops the LED stays lit for after core 1 starts.
    pub indication_spins: u32,
}

/// Core 1 settings for the boot path.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Core1Config {
    /// Period of core 1's tick timer.
    pub tick: TickPeriod,
    /// Ticks per heartbeat LED toggle.
    pub heartbeat_divider: u32,
}

/// All static configuration for both cores' boot paths. The app generates one
/// of these at build time from its `app.toml`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BootConfig {
    pub bringup: BringupConfig,
    pub core0: Core0Config,
    pub core1: Core1Config,
}

impl BootConfig {
    /// The configuration the original board firmware hard-coded.
    pub const DEFAULT: Self = Self {
        bringup: BringupConfig::DEFAULT,
        core0: Core0Config {
            led: Pin(25),
            indication_spins: 500_000,
        },
        core1: Core1Config {
            tick: TickPeriod::from_ms(100),
            heartbeat_divider: 10,
        },
    };
}

impl Default for BootConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
