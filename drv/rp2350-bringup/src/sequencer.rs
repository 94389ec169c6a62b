// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power, reset, and clock sequencing for the trace subsystem.
//!
//! The hardware dependencies run one way: a power domain must be up before
//! anything in it leaves reset, and a peripheral must be out of reset before
//! it is clocked or touched. [`sequence_hardware`] walks that order:
//!
//! 1. Debug enable and authentication, unconditionally.
//! 2. Force the required power domains on.
//! 3. Wait until the PSM reports *all* of them done.
//! 4. Release the required peripheral resets.
//! 5. Wait until the reset controller reports *all* of them done.
//! 6. Turn on the system and peripheral clock gates.
//!
//! Steps 3 and 5 are the long blocking waits in the boot path. Under the
//! production [`Patience::Forever`] they hang if the hardware never comes up,
//! and we would rather hang than carry on with half the chip powered.
//!
//! Only core 0 runs this. Nothing here guards against a concurrent writer.

use ringbuf::*;

use crate::regs::{clocks, psm, resets, scs, RegisterAccess};
use crate::unlock::{unlock_trace, UnlockReport};
use crate::wait::{wait_for_bits, Patience, WaitPoint, WaitTimeout};

bitflags::bitflags! {
    /// Power domains, at the bit positions the PSM force-on and done
    /// registers use in this bring-up.
    ///
    /// Bits without a name here are kept as-is, so a board that needs a
    /// different mask can supply it raw.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct PowerDomains: u32 {
        const SYS = 1 << 0;
        const PROC0 = 1 << 1;
        const PROC1 = 1 << 2;
        const SIO = 1 << 3;
        const VREG_AND_CHIP_RESET = 1 << 4;
        const XIP = 1 << 5;
        /// All SRAM banks.
        const SRAM = 1 << 6;

        const _ = !0;
    }
}

bitflags::bitflags! {
    /// Peripheral reset lines that the trace capture path depends on.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Resets: u32 {
        const DMA = 1 << 2;
        /// The random number generator. The capture tooling may use it too.
        const TRNG = 1 << 8;
        const SYSCFG = 1 << 24;

        const _ = !0;
    }
}

/// What the sequencer needs to know.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BringupConfig {
    /// Domains forced on and waited for.
    pub power_domains: PowerDomains,
    /// Reset lines released and waited for.
    pub resets: Resets,
    /// Applies to every blocking wait in the boot path: both readiness waits
    /// and the rendezvous.
    pub patience: Patience,
    /// No-ops spent after unlocking the trace subsystem, letting downstream
    /// domains settle.
    pub stabilization_spins: u32,
}

impl BringupConfig {
    pub const DEFAULT: Self = Self {
        power_domains: PowerDomains::SYS
            .union(PowerDomains::PROC0)
            .union(PowerDomains::PROC1)
            .union(PowerDomains::SIO)
            .union(PowerDomains::VREG_AND_CHIP_RESET)
            .union(PowerDomains::XIP)
            .union(PowerDomains::SRAM),
        resets: Resets::DMA.union(Resets::TRNG).union(Resets::SYSCFG),
        patience: Patience::Forever,
        stabilization_spins: 100,
    };
}

impl Default for BringupConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// How long each wait took, in polls.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SequenceReport {
    pub power_polls: u32,
    pub reset_polls: u32,
}

/// Everything core 0 learned while bringing the hardware up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BringupReport {
    pub sequence: SequenceReport,
    pub unlock: UnlockReport,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    DebugEnabled,
    PowerForced(u32),
    PowerDone { polls: u32 },
    ResetsReleased(u32),
    ResetsDone { polls: u32 },
    ClocksEnabled,
    Timeout(WaitTimeout),
}

ringbuf!(Trace, 16, Trace::None);

/// Runs steps 1 through 6 above.
pub fn sequence_hardware(
    hw: &impl RegisterAccess,
    config: &BringupConfig,
) -> Result<SequenceReport, WaitTimeout> {
    hw.write(scs::DHCSR, scs::DHCSR_KEY_DEBUGEN);
    hw.write(scs::DBGAUTHSTATUS, scs::DBGAUTHSTATUS_ALL);
    ringbuf_entry!(Trace::DebugEnabled);

    let domains = config.power_domains.bits();
    hw.set_bits(psm::FRCE_ON, domains);
    ringbuf_entry!(Trace::PowerForced(domains));

    let power_polls = wait_for_bits(
        hw,
        psm::DONE,
        domains,
        config.patience,
        WaitPoint::PowerDone,
    )
    .inspect_err(|e| ringbuf_entry!(Trace::Timeout(*e)))?;
    ringbuf_entry!(Trace::PowerDone { polls: power_polls });

    let lines = config.resets.bits();
    hw.clear_bits(resets::RESET, lines);
    ringbuf_entry!(Trace::ResetsReleased(lines));

    let reset_polls = wait_for_bits(
        hw,
        resets::RESET_DONE,
        lines,
        config.patience,
        WaitPoint::ResetDone,
    )
    .inspect_err(|e| ringbuf_entry!(Trace::Timeout(*e)))?;
    ringbuf_entry!(Trace::ResetsDone { polls: reset_polls });

    hw.set_bits(clocks::CLK_SYS_CTRL, clocks::ENABLE);
    hw.set_bits(clocks::CLK_PERI_CTRL, clocks::ENABLE);
    ringbuf_entry!(Trace::ClocksEnabled);

    Ok(SequenceReport {
        power_polls,
        reset_polls,
    })
}

/// Sequences the hardware and then unlocks the trace subsystem, leaving the
/// trace macrocell's preconditions satisfied.
pub fn bring_up(
    hw: &impl RegisterAccess,
    config: &BringupConfig,
) -> Result<BringupReport, WaitTimeout> {
    let sequence = sequence_hardware(hw, config)?;
    let unlock = unlock_trace(hw, config.stabilization_spins);
    Ok(BringupReport { sequence, unlock })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::fake::{Event, FakeRegs};
    use crate::regs::{coresight, Reg};
    use proptest::prelude::*;
    use proptest::test_runner::TestRunner;
    use serial_test::serial;

    fn ready_fake(config: &BringupConfig) -> FakeRegs {
        let hw = FakeRegs::new();
        hw.set(psm::DONE, config.power_domains.bits());
        hw.set(resets::RESET_DONE, config.resets.bits());
        hw
    }

    fn first_write(hw: &FakeRegs, reg: Reg) -> Option<usize> {
        hw.position(|e| matches!(e, Event::Write(r, _) if *r == reg))
    }

    fn first_full_read(hw: &FakeRegs, reg: Reg, mask: u32) -> Option<usize> {
        hw.position(|e| {
            matches!(e, Event::Read(r, v) if *r == reg && v & mask == mask)
        })
    }

    #[test]
    fn default_masks() {
        let c = BringupConfig::DEFAULT;
        assert_eq!(c.power_domains.bits(), 0b111_1111);
        assert_eq!(c.resets.bits(), (1 << 2) | (1 << 8) | (1 << 24));
        assert_eq!(c.patience, Patience::Forever);
        assert_eq!(c.stabilization_spins, 100);
    }

    #[test]
    #[serial]
    fn steps_in_order() {
        let config = BringupConfig::DEFAULT;
        let hw = ready_fake(&config);
        hw.set(resets::RESET, 0x1FFF_FFFF);

        let report = sequence_hardware(&hw, &config).unwrap();
        assert_eq!(
            report,
            SequenceReport {
                power_polls: 1,
                reset_polls: 1
            }
        );

        assert_eq!(
            hw.events(),
            [
                Event::Write(scs::DHCSR, 0xA05F_0001),
                Event::Write(scs::DBGAUTHSTATUS, 0xF),
                Event::Read(psm::FRCE_ON, 0),
                Event::Write(psm::FRCE_ON, 0x7f),
                Event::Read(psm::DONE, 0x7f),
                Event::Read(resets::RESET, 0x1FFF_FFFF),
                Event::Write(resets::RESET, 0x1EFF_FEFB),
                Event::Read(resets::RESET_DONE, 0x0100_0104),
                Event::Read(clocks::CLK_SYS_CTRL, 0),
                Event::Write(clocks::CLK_SYS_CTRL, 1 << 11),
                Event::Read(clocks::CLK_PERI_CTRL, 0),
                Event::Write(clocks::CLK_PERI_CTRL, 1 << 11),
            ]
        );
    }

    #[test]
    #[serial]
    fn force_on_preserves_existing_bits() {
        let config = BringupConfig::DEFAULT;
        let hw = ready_fake(&config);
        hw.set(psm::FRCE_ON, 1 << 20);

        sequence_hardware(&hw, &config).unwrap();

        assert_eq!(hw.value(psm::FRCE_ON), (1 << 20) | 0x7f);
    }

    /// The done register gains one bit per poll, starting from nothing: the
    /// sequencer has to read it exactly seven times.
    #[test]
    #[serial]
    fn power_done_one_bit_per_poll() {
        let config = BringupConfig::DEFAULT;
        let hw = ready_fake(&config);
        hw.script(psm::DONE, (1..=7).map(|n| (1u32 << n) - 1));

        let report = sequence_hardware(&hw, &config).unwrap();

        assert_eq!(report.power_polls, 7);
        assert_eq!(hw.reads_of(psm::DONE), 7);
        // Nothing downstream of the wait was touched before the seventh read.
        let full = first_full_read(&hw, psm::DONE, 0x7f).unwrap();
        assert!(first_write(&hw, resets::RESET).unwrap() > full);
    }

    #[test]
    #[serial]
    fn clocks_wait_for_every_reset_bit() {
        let config = BringupConfig::DEFAULT;
        let hw = ready_fake(&config);
        // DMA first, then TRNG, then SYSCFG.
        hw.script(
            resets::RESET_DONE,
            [0, 1 << 2, (1 << 2) | (1 << 8), config.resets.bits()],
        );

        let report = sequence_hardware(&hw, &config).unwrap();

        assert_eq!(report.reset_polls, 4);
        let full =
            first_full_read(&hw, resets::RESET_DONE, config.resets.bits())
                .unwrap();
        assert!(first_write(&hw, clocks::CLK_SYS_CTRL).unwrap() > full);
        assert!(first_write(&hw, clocks::CLK_PERI_CTRL).unwrap() > full);
    }

    #[test]
    #[serial]
    fn bounded_power_wait_stops_before_resets() {
        let config = BringupConfig {
            patience: Patience::Polls(50),
            ..BringupConfig::DEFAULT
        };
        let hw = ready_fake(&config);
        hw.set(psm::DONE, 0x3f);

        let err = sequence_hardware(&hw, &config).unwrap_err();

        assert_eq!(
            err,
            WaitTimeout {
                point: WaitPoint::PowerDone,
                observed: 0x3f,
                polls: 50,
            }
        );
        assert!(hw.writes_to(resets::RESET).is_empty());
        assert!(hw.writes_to(clocks::CLK_SYS_CTRL).is_empty());
    }

    #[test]
    #[serial]
    fn bounded_reset_wait_stops_before_clocks() {
        let config = BringupConfig {
            patience: Patience::Polls(10),
            ..BringupConfig::DEFAULT
        };
        let hw = ready_fake(&config);
        hw.set(resets::RESET_DONE, 1 << 2);

        let err = sequence_hardware(&hw, &config).unwrap_err();

        assert_eq!(err.point, WaitPoint::ResetDone);
        assert_eq!(err.observed, 1 << 2);
        assert!(hw.writes_to(clocks::CLK_SYS_CTRL).is_empty());
        assert!(hw.writes_to(clocks::CLK_PERI_CTRL).is_empty());
    }

    #[test]
    #[serial]
    fn custom_masks_are_used_verbatim() {
        let config = BringupConfig {
            power_domains: PowerDomains::from_bits_retain(1 << 23 | 1 << 24),
            resets: Resets::from_bits_retain(1 << 6),
            ..BringupConfig::DEFAULT
        };
        let hw = ready_fake(&config);
        hw.set(resets::RESET, !0);

        sequence_hardware(&hw, &config).unwrap();

        assert_eq!(hw.writes_to(psm::FRCE_ON), [1 << 23 | 1 << 24]);
        assert_eq!(hw.writes_to(resets::RESET), [!(1u32 << 6)]);
    }

    #[test]
    #[serial]
    fn bring_up_unlocks_after_clocks() {
        let config = BringupConfig::DEFAULT;
        let hw = ready_fake(&config);

        let report = bring_up(&hw, &config).unwrap();

        assert_eq!(report.unlock.key_writes, 1);
        let clocks_done = first_write(&hw, clocks::CLK_PERI_CTRL).unwrap();
        let unlock = first_write(&hw, coresight::LAR).unwrap();
        assert!(unlock > clocks_done);
    }

    /// Whatever order the domains come up in, and however many polls it
    /// takes, the reset controller is not touched until a read of the done
    /// register shows the whole mask.
    #[test]
    #[serial]
    fn resets_never_precede_full_power_mask() {
        let strategy = (1u32..=0x7f)
            .prop_flat_map(|mask| {
                (Just(mask), prop::collection::vec(0u32..=0x7f, 0..20))
            });

        TestRunner::default()
            .run(&strategy, |(mask, partials)| {
                let config = BringupConfig {
                    power_domains: PowerDomains::from_bits_retain(mask),
                    ..BringupConfig::DEFAULT
                };
                let hw = ready_fake(&config);
                let mut script: Vec<u32> = partials.clone();
                script.push(mask);
                hw.script(psm::DONE, script);

                sequence_hardware(&hw, &config).unwrap();

                let full = first_full_read(&hw, psm::DONE, mask).unwrap();
                let released = first_write(&hw, resets::RESET).unwrap();
                prop_assert!(released > full);

                let expected = partials
                    .iter()
                    .position(|p| p & mask == mask)
                    .map(|i| i + 1)
                    .unwrap_or(partials.len() + 1);
                prop_assert_eq!(hw.reads_of(psm::DONE), expected);
                Ok(())
            })
            .unwrap();
    }
}
