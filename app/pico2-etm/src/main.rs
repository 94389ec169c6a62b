// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pico 2 firmware that prepares both cores and the ETM for instruction
//! trace capture.
//!
//! Core 0 brings the trace subsystem's power, resets, clocks and lock into
//! shape, lights the LED briefly once core 1 is running, and meets core 1 at
//! the rendezvous. From there the debugger owns the ETM: it configures the
//! macrocell and the trace sink against `etm_buffer` and reads the capture out
//! afterwards. Core 1 runs a heartbeat on the LED off its SysTick.

#![no_std]
#![no_main]

mod board;

mod config {
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}

use core::mem::size_of;

use cortex_m_rt::{entry, exception};
use drv_rp2350_bringup::arch::Mmio;
use drv_rp2350_bringup::dispatch::{
    halt_loop, idle_loop, Core0, Core0Exit, Core1, Heartbeat,
};
use drv_rp2350_bringup::launch::Core1Launch;
use drv_rp2350_bringup::rendezvous::FifoMailbox;
use drv_rp2350_bringup::trace_buffer::{
    placement_ok, Align32K, TraceBuffer, TraceBuffer32K,
};
use panic_halt as _;
use ringbuf::*;

use board::Pico2;
use config::BOOT_CONFIG;

/// Image definition to set up the chip for booting
///
/// See datasheet 5.1.4 Image Definitions for more. These specific values come from
/// section 5.9.5. Minimum viable image metadata.
#[link_section = ".image_def"]
#[used]
pub static RP235X_IMAGE_DEF_ARM_MIN: [u32; 5] = [
    0xFFFF_DED3, // START
    0x1021_0142, // PICOBIN_BLOCK_ITEM_1BS_IMAGE_TYPE, (EXE | S-mode | ARM | RP2350)
    0x0000_01FF, // PICOBIN_BLOCK_ITEM_2BS_LAST, (size=1 word)
    0x0000_0000, // next = self
    0xAB12_3579, // END
];

/// Where the trace sink writes. The capture tooling finds it by this symbol
/// name; the linker script puts it in its own size-aligned region and never
/// loads or zeroes it.
#[no_mangle]
#[link_section = ".etm_buffer"]
#[allow(non_upper_case_globals)]
pub static etm_buffer: TraceBuffer32K = Align32K(TraceBuffer::new());

/// Cleared from the debugger to let core 0 past its entry.
#[cfg(feature = "debug-hold")]
#[no_mangle]
pub static HOLD_CORE0: core::sync::atomic::AtomicBool =
    core::sync::atomic::AtomicBool::new(true);

/// Cleared from the debugger to let core 1 past its entry.
#[cfg(feature = "debug-hold")]
#[no_mangle]
pub static HOLD_CORE1: core::sync::atomic::AtomicBool =
    core::sync::atomic::AtomicBool::new(true);

#[cfg(feature = "debug-hold")]
fn hold(flag: &core::sync::atomic::AtomicBool) {
    while flag.load(core::sync::atomic::Ordering::Acquire) {
        cortex_m::asm::nop();
    }
}

const CORE1_STACK_WORDS: usize = 1024;

#[repr(C, align(8))]
struct Core1Stack([u32; CORE1_STACK_WORDS]);

static mut CORE1_STACK: Core1Stack = Core1Stack([0; CORE1_STACK_WORDS]);

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    TraceBuffer { base: u32, placed: bool },
    Core0Done(Core0Exit),
}

ringbuf!(Trace, 4, Trace::None);

#[entry]
fn main() -> ! {
    #[cfg(feature = "debug-hold")]
    hold(&HOLD_CORE0);

    // Safety: the register map is the RP2350's, which is what we run on.
    let hw = unsafe { Mmio::steal() };

    let buf = &etm_buffer.0;
    ringbuf_entry!(Trace::TraceBuffer {
        base: buf.base() as u32,
        placed: placement_ok(buf.base(), buf.len_bytes()),
    });

    let board = Pico2::new(hw).with_core1(core1_launch());
    let mailbox = FifoMailbox::new(&hw);
    let exit = Core0::new(&hw, board, &mailbox, BOOT_CONFIG).run();
    ringbuf_entry!(Trace::Core0Done(exit));

    match exit {
        // Tracing happens from here on, under the debugger's control.
        Core0Exit::BringupComplete => idle_loop(&hw),
        Core0Exit::Halted => halt_loop(&hw),
    }
}

fn core1_launch() -> Core1Launch {
    // Safety: we only take the address. Nothing on core 0 touches the stack,
    // and core 1 only does once it's running on it.
    let base = unsafe { core::ptr::addr_of_mut!(CORE1_STACK) } as usize;
    Core1Launch {
        vector_table: board::vector_table(),
        stack_top: (base + size_of::<Core1Stack>()) as u32,
        entry: core1_entry as usize as u32,
    }
}

extern "C" fn core1_entry() -> ! {
    #[cfg(feature = "debug-hold")]
    hold(&HOLD_CORE1);

    // Safety: same register map, other core.
    let hw = unsafe { Mmio::steal() };
    let mailbox = FifoMailbox::new(&hw);
    Core1::new(&hw, Pico2::new(hw), &mailbox, BOOT_CONFIG).run();
    idle_loop(&hw)
}

#[exception]
fn SysTick() {
    static mut HEARTBEAT: Heartbeat = Heartbeat::new(
        BOOT_CONFIG.core0.led,
        BOOT_CONFIG.core1.tick,
        BOOT_CONFIG.core1.heartbeat_divider,
    );

    // Safety: same register map; only core 1 takes this exception.
    let mut board = Pico2::new(unsafe { Mmio::steal() });
    HEARTBEAT.on_tick(&mut board);
}
