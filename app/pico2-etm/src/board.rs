// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pico 2 board services: the status LED, SysTick, and launching core 1.

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};
use drv_rp2350_bringup::arch::Mmio;
use drv_rp2350_bringup::dispatch::{Board, Pin, TickPeriod};
use drv_rp2350_bringup::launch::{launch_core1, Core1Launch};
use drv_rp2350_bringup::regs::{sio, Access, Reg, RegisterAccess};
use drv_rp2350_bringup::wait::spin_until;
use ringbuf::*;

use crate::config;

/// Per-pin control registers sit at 8-byte strides from here, status first.
const IO_BANK0: Reg = Reg::read_write(0x4002_8000);
/// Pad controls, one word per pin after the voltage-select word.
const PADS_BANK0: Reg = Reg::read_write(0x4003_8000);

const FUNCSEL_SIO: u32 = 5;
const PAD_OD: u32 = 1 << 7;
const PAD_ISO: u32 = 1 << 8;

const SYST_RELOAD_MAX: u32 = 0x00FF_FFFF;

const fn gpio_ctrl(pin: Pin) -> Reg {
    IO_BANK0.offset(8 * pin.0 as u32 + 4, Access::ReadWrite)
}

const fn pad_ctrl(pin: Pin) -> Reg {
    PADS_BANK0.offset(4 + 4 * pin.0 as u32, Access::ReadWrite)
}

const fn bit(pin: Pin) -> u32 {
    1 << pin.0
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    GpioOutOfReset,
    GpioStuckInReset,
    PinConfigured(u8),
    NoLaunchImage,
}

// Only core 0 records here; core 1's tick handler never logs.
ringbuf!(Trace, 8, Trace::None);

/// Core 0 runs with whatever table the bootrom handed it, and core 1 shares it.
pub fn vector_table() -> u32 {
    // Safety: reading VTOR has no side effects.
    unsafe { (*SCB::PTR).vtor.read() }
}

/// Estimates the core clock in cycles per millisecond from how clk_sys is
/// sourced.
pub fn cycles_per_ms() -> u32 {
    // Safety: we only read a clock control register.
    let p = unsafe { rp235x_pac::Peripherals::steal() };
    if p.CLOCKS.clk_sys_ctrl().read().src().is_clk_ref() {
        // This is the reset state, so we'll assume we launched directly from
        // flash running on the ROSC.
        config::ROSC_CYCLES_PER_MS
    } else {
        config::PLL_CYCLES_PER_MS
    }
}

fn syst() -> SYST {
    // Safety: each core has its own SysTick at this address, and only core 1
    // ever programs it.
    unsafe { cortex_m::Peripherals::steal() }.SYST
}

pub struct Pico2 {
    hw: Mmio,
    cycles_per_ms: u32,
    core1: Option<Core1Launch>,
}

impl Pico2 {
    pub fn new(hw: Mmio) -> Self {
        Self {
            hw,
            cycles_per_ms: cycles_per_ms(),
            core1: None,
        }
    }

    /// Lets this board launch core 1 with `launch`.
    pub fn with_core1(mut self, launch: Core1Launch) -> Self {
        self.core1 = Some(launch);
        self
    }

    fn reload_for(&self, period: TickPeriod) -> u32 {
        self.cycles_per_ms
            .saturating_mul(period.ms())
            .saturating_sub(1)
            .min(SYST_RELOAD_MAX)
    }

    fn release_gpio(&self) {
        // Safety: we only touch the IO_BANK0 and PADS_BANK0 reset bits, and
        // only core 0 does this.
        let p = unsafe { rp235x_pac::Peripherals::steal() };
        p.RESETS
            .reset()
            .modify(|_, w| w.io_bank0().clear_bit().pads_bank0().clear_bit());
        let released = spin_until(
            config::BOOT_CONFIG.bringup.patience,
            || {
                let done = p.RESETS.reset_done().read();
                done.io_bank0().bit() && done.pads_bank0().bit()
            },
            || self.hw.nop(),
        );
        match released {
            Ok(_) => ringbuf_entry!(Trace::GpioOutOfReset),
            Err(_) => ringbuf_entry!(Trace::GpioStuckInReset),
        }
    }
}

impl Board for Pico2 {
    fn disable_interrupts(&mut self) {
        cortex_m::interrupt::disable();
    }

    fn configure_pin(&mut self, pin: Pin) {
        self.release_gpio();
        self.hw.write(sio::GPIO_OE_CLR, bit(pin));
        self.hw.write(sio::GPIO_OUT_CLR, bit(pin));
        self.hw.write(gpio_ctrl(pin), FUNCSEL_SIO);
        self.hw.clear_bits(pad_ctrl(pin), PAD_ISO | PAD_OD);
        self.hw.write(sio::GPIO_OE_SET, bit(pin));
        ringbuf_entry!(Trace::PinConfigured(pin.0));
    }

    fn set_pin(&mut self, pin: Pin, high: bool) {
        let reg = if high {
            sio::GPIO_OUT_SET
        } else {
            sio::GPIO_OUT_CLR
        };
        self.hw.write(reg, bit(pin));
    }

    fn toggle_pin(&mut self, pin: Pin) {
        self.hw.write(sio::GPIO_OUT_XOR, bit(pin));
    }

    fn start_second_core(&mut self) -> bool {
        let Some(launch) = self.core1 else {
            ringbuf_entry!(Trace::NoLaunchImage);
            return false;
        };
        launch_core1(&self.hw, &launch, config::LAUNCH, cortex_m::asm::sev)
    }

    fn configure_periodic_timer(&mut self, period: TickPeriod) {
        let mut syst = syst();
        syst.set_clock_source(SystClkSource::Core);
        syst.set_reload(self.reload_for(period));
        syst.clear_current();
        syst.enable_interrupt();
        syst.enable_counter();
    }

    fn reload_timer(&mut self, period: TickPeriod) {
        syst().set_reload(self.reload_for(period));
    }
}
