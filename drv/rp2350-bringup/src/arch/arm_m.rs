// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Register access on the Cortex-M33.

use crate::regs::{Reg, RegisterAccess};

/// Direct access to the memory-mapped device.
///
/// This is a zero-sized token; both cores can hold one at the same time. It
/// imposes no mutual exclusion, so which core writes which register is up to
/// the boot path (see [`crate::dispatch`]).
#[derive(Copy, Clone, Debug)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// Produces the register access token.
    ///
    /// # Safety
    ///
    /// The register map in [`crate::regs`] must describe the device this code
    /// is running on, because every handle in it becomes a live pointer.
    pub unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl RegisterAccess for Mmio {
    #[inline(always)]
    fn read(&self, reg: Reg) -> u32 {
        debug_assert!(reg.readable());
        // Safety: our constructor's contract makes `reg` a valid, aligned
        // device register.
        unsafe { core::ptr::read_volatile(reg.addr() as usize as *const u32) }
    }

    #[inline(always)]
    fn write(&self, reg: Reg, value: u32) {
        debug_assert!(reg.writable());
        // Safety: as above.
        unsafe {
            core::ptr::write_volatile(reg.addr() as usize as *mut u32, value)
        }
    }

    #[inline(always)]
    fn data_barrier(&self) {
        cortex_m::asm::dsb();
    }

    #[inline(always)]
    fn instruction_barrier(&self) {
        cortex_m::asm::isb();
    }

    #[inline(always)]
    fn nop(&self) {
        cortex_m::asm::nop();
    }
}
