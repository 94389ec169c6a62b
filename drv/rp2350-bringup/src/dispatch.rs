// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-core boot paths.
//!
//! Each core runs its own forward-only state machine. The only point the two
//! share is the rendezvous:
//!
//! ```text
//! core 0: Reset -> InterruptsDisabled -> HardwareSequenced -> PinConfigured
//!           -> Core1StartRequested -+-> LedIndication -> Rendezvous
//!                                   +-> HaltLoop
//! core 1: Reset -> FifoStatusCleared -> ExclusiveAccessConfigured
//!           -> Rendezvous -> TimerConfigured -> IdleLoop
//! ```
//!
//! Core 0 is the only core that writes the sequencer's registers, and it does
//! so before it starts core 1. Core 1 touches nothing but its own private
//! registers until after the rendezvous, so nothing core 1 configures can
//! happen before core 0 has finished sequencing.
//!
//! Anything the boot path needs from the board outside the bring-up registers
//! comes through [`Board`].

use ringbuf::*;

use crate::regs::{scs, sio, RegisterAccess};
use crate::rendezvous::{rendezvous, CoreId, Mailbox};
use crate::sequencer::{bring_up, BringupReport};
use crate::wait::WaitTimeout;
use crate::BootConfig;

/// A GPIO number.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Pin(pub u8);

/// Period of a periodic timer, in milliseconds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TickPeriod {
    ms: u32,
}

impl TickPeriod {
    pub const fn from_ms(ms: u32) -> Self {
        Self { ms }
    }

    pub const fn ms(self) -> u32 {
        self.ms
    }
}

/// Board services the boot path consumes.
pub trait Board {
    /// Masks interrupts on the calling core.
    fn disable_interrupts(&mut self);

    /// Makes `pin` a software-driven output.
    fn configure_pin(&mut self, pin: Pin);

    fn set_pin(&mut self, pin: Pin, high: bool);

    fn toggle_pin(&mut self, pin: Pin);

    /// Launches core 1. Returns `false` if it could not be started.
    fn start_second_core(&mut self) -> bool;

    /// Starts the calling core's periodic tick with interrupts.
    fn configure_periodic_timer(&mut self, period: TickPeriod);

    /// Re-arms the tick from inside its own interrupt.
    fn reload_timer(&mut self, period: TickPeriod);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Core0State {
    Reset,
    InterruptsDisabled,
    HardwareSequenced,
    PinConfigured,
    Core1StartRequested { started: bool },
    LedIndication,
    /// Terminal: both cores are past the rendezvous and bring-up is complete.
    Rendezvous,
    /// Terminal: something failed; the core should spin until reset.
    HaltLoop,
}

impl Core0State {
    pub fn is_terminal(self) -> bool {
        matches!(self, Core0State::Rendezvous | Core0State::HaltLoop)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Core1State {
    Reset,
    FifoStatusCleared,
    ExclusiveAccessConfigured,
    Rendezvous,
    TimerConfigured,
    IdleLoop,
}

impl Core1State {
    pub fn is_terminal(self) -> bool {
        matches!(self, Core1State::IdleLoop)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Core0Exit {
    BringupComplete,
    Halted,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Core1Exit {
    Idle,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Identity(CoreId),
    Core0(Core0State),
    Core1(Core1State),
    Bringup(BringupReport),
    Timeout(WaitTimeout),
}

// One ring per core, so the cores never contend for a borrow.
ringbuf!(CORE0_RINGBUF, Trace, 16, Trace::None);
ringbuf!(CORE1_RINGBUF, Trace, 16, Trace::None);

/// Core 0's boot path.
pub struct Core0<'a, A, B, M> {
    hw: &'a A,
    board: B,
    mailbox: &'a M,
    config: BootConfig,
    me: CoreId,
    state: Core0State,
    report: Option<BringupReport>,
}

impl<'a, A, B, M> Core0<'a, A, B, M>
where
    A: RegisterAccess,
    B: Board,
    M: Mailbox,
{
    pub fn new(
        hw: &'a A,
        board: B,
        mailbox: &'a M,
        config: BootConfig,
    ) -> Self {
        Self {
            hw,
            board,
            mailbox,
            config,
            me: CoreId::Core0,
            state: Core0State::Reset,
            report: None,
        }
    }

    pub fn state(&self) -> Core0State {
        self.state
    }

    /// What bring-up found, once the hardware has been sequenced.
    pub fn report(&self) -> Option<BringupReport> {
        self.report
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    /// Makes one transition and returns the new state. Terminal states stay
    /// put.
    pub fn step(&mut self) -> Core0State {
        let next = match self.state {
            Core0State::Reset => {
                self.me = CoreId::current(self.hw);
                ringbuf_entry!(CORE0_RINGBUF, Trace::Identity(self.me));
                self.board.disable_interrupts();
                Core0State::InterruptsDisabled
            }
            Core0State::InterruptsDisabled => {
                match bring_up(self.hw, &self.config.bringup) {
                    Ok(report) => {
                        ringbuf_entry!(CORE0_RINGBUF, Trace::Bringup(report));
                        self.report = Some(report);
                        Core0State::HardwareSequenced
                    }
                    Err(e) => {
                        ringbuf_entry!(CORE0_RINGBUF, Trace::Timeout(e));
                        Core0State::HaltLoop
                    }
                }
            }
            Core0State::HardwareSequenced => {
                self.board.configure_pin(self.config.core0.led);
                Core0State::PinConfigured
            }
            Core0State::PinConfigured => Core0State::Core1StartRequested {
                started: self.board.start_second_core(),
            },
            Core0State::Core1StartRequested { started: true } => {
                let led = self.config.core0.led;
                self.board.set_pin(led, true);
                self.hw.spin(self.config.core0.indication_spins);
                self.board.set_pin(led, false);
                Core0State::LedIndication
            }
            Core0State::Core1StartRequested { started: false } => {
                Core0State::HaltLoop
            }
            Core0State::LedIndication => {
                match rendezvous(
                    self.mailbox,
                    self.me,
                    self.config.bringup.patience,
                ) {
                    Ok(_) => Core0State::Rendezvous,
                    Err(e) => {
                        ringbuf_entry!(CORE0_RINGBUF, Trace::Timeout(e));
                        Core0State::HaltLoop
                    }
                }
            }
            s @ (Core0State::Rendezvous | Core0State::HaltLoop) => return s,
        };
        ringbuf_entry!(CORE0_RINGBUF, Trace::Core0(next));
        self.state = next;
        next
    }

    /// Steps until a terminal state.
    pub fn run(&mut self) -> Core0Exit {
        loop {
            match self.step() {
                Core0State::Rendezvous => return Core0Exit::BringupComplete,
                Core0State::HaltLoop => return Core0Exit::Halted,
                _ => (),
            }
        }
    }
}

/// Core 1's boot path.
pub struct Core1<'a, A, B, M> {
    hw: &'a A,
    board: B,
    mailbox: &'a M,
    config: BootConfig,
    me: CoreId,
    state: Core1State,
}

impl<'a, A, B, M> Core1<'a, A, B, M>
where
    A: RegisterAccess,
    B: Board,
    M: Mailbox,
{
    pub fn new(
        hw: &'a A,
        board: B,
        mailbox: &'a M,
        config: BootConfig,
    ) -> Self {
        Self {
            hw,
            board,
            mailbox,
            config,
            me: CoreId::Core1,
            state: Core1State::Reset,
        }
    }

    pub fn state(&self) -> Core1State {
        self.state
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    /// Makes one transition and returns the new state. `IdleLoop` stays put.
    ///
    /// If a bounded rendezvous gives up, core 1 goes straight to `IdleLoop`
    /// without starting its timer.
    pub fn step(&mut self) -> Core1State {
        let next = match self.state {
            Core1State::Reset => {
                self.me = CoreId::current(self.hw);
                ringbuf_entry!(CORE1_RINGBUF, Trace::Identity(self.me));
                // The launch handshake leaves sticky flags behind.
                self.hw.write(sio::FIFO_ST, sio::FIFO_ST_CLEAR_ALL);
                Core1State::FifoStatusCleared
            }
            Core1State::FifoStatusCleared => {
                self.hw.set_bits(scs::ACTLR, scs::ACTLR_EXTEXCLALL);
                self.hw.data_barrier();
                // The bootrom starts us with interrupts enabled; drop anything
                // that latched on the way here.
                self.hw.write(scs::NVIC_ICPR0, !0);
                Core1State::ExclusiveAccessConfigured
            }
            Core1State::ExclusiveAccessConfigured => {
                match rendezvous(
                    self.mailbox,
                    self.me,
                    self.config.bringup.patience,
                ) {
                    Ok(_) => Core1State::Rendezvous,
                    Err(e) => {
                        ringbuf_entry!(CORE1_RINGBUF, Trace::Timeout(e));
                        Core1State::IdleLoop
                    }
                }
            }
            Core1State::Rendezvous => {
                self.board.configure_periodic_timer(self.config.core1.tick);
                Core1State::TimerConfigured
            }
            Core1State::TimerConfigured => Core1State::IdleLoop,
            Core1State::IdleLoop => return Core1State::IdleLoop,
        };
        ringbuf_entry!(CORE1_RINGBUF, Trace::Core1(next));
        self.state = next;
        next
    }

    pub fn run(&mut self) -> Core1Exit {
        while !self.step().is_terminal() {}
        Core1Exit::Idle
    }
}

/// Tick handler state for core 1's heartbeat LED.
pub struct Heartbeat {
    led: Pin,
    period: TickPeriod,
    divider: u32,
    count: u32,
}

impl Heartbeat {
    /// Toggles `led` once every `divider` ticks of `period`. A divider of 0
    /// behaves like 1.
    pub const fn new(led: Pin, period: TickPeriod, divider: u32) -> Self {
        Self {
            led,
            period,
            divider,
            count: 0,
        }
    }

    /// Re-arms the timer and advances the count. Returns whether the LED was
    /// toggled.
    ///
    /// Does not log: this runs in interrupt context on core 1 and could
    /// otherwise land in the middle of the boot path's own ring entry.
    pub fn on_tick(&mut self, board: &mut impl Board) -> bool {
        board.reload_timer(self.period);
        self.count += 1;
        if self.count >= self.divider {
            board.toggle_pin(self.led);
            self.count = 0;
            true
        } else {
            false
        }
    }
}

/// Core 0's terminal failure state. Only a reset gets out.
pub fn halt_loop(hw: &impl RegisterAccess) -> ! {
    loop {
        hw.nop();
    }
}

/// Where a core spins once its boot path is done. On core 1 everything from
/// here on happens in the tick interrupt.
pub fn idle_loop(hw: &impl RegisterAccess) -> ! {
    loop {
        hw.nop();
    }
}
