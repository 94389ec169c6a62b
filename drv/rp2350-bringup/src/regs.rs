// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Register access layer.
//!
//! A [`Reg`] is a handle to one 32-bit memory-mapped register: its address and
//! what it is legal to do to it. Handles are plain values; holding one does
//! nothing. Accesses go through a [`RegisterAccess`] implementation, which on
//! hardware is [`crate::arch::Mmio`] and in tests is a simulated register
//! file.
//!
//! This layer never splits or combines accesses. Each `read` is exactly one
//! 32-bit load and each `write` exactly one 32-bit store, in program order
//! relative to every other access through the same implementation. The
//! [`RegisterAccess::set_bits`] and [`RegisterAccess::clear_bits`] helpers are
//! a read followed by a write, and are *not* atomic; they exist so a
//! read-modify-write shows up as one named step in the caller.

/// What may be done to a register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    ReadOnly,
    WriteOnly,
}

/// Handle to a 32-bit memory-mapped register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Reg {
    addr: u32,
    access: Access,
}

impl Reg {
    pub const fn read_write(addr: u32) -> Self {
        Self {
            addr,
            access: Access::ReadWrite,
        }
    }

    pub const fn read_only(addr: u32) -> Self {
        Self {
            addr,
            access: Access::ReadOnly,
        }
    }

    pub const fn write_only(addr: u32) -> Self {
        Self {
            addr,
            access: Access::WriteOnly,
        }
    }

    /// Handle for the register `offset` bytes into the same block, with the
    /// given discipline.
    pub const fn offset(self, offset: u32, access: Access) -> Self {
        Self {
            addr: self.addr + offset,
            access,
        }
    }

    pub const fn addr(&self) -> u32 {
        self.addr
    }

    pub const fn access(&self) -> Access {
        self.access
    }

    pub const fn readable(&self) -> bool {
        !matches!(self.access, Access::WriteOnly)
    }

    pub const fn writable(&self) -> bool {
        !matches!(self.access, Access::ReadOnly)
    }
}

/// Ordered, uncached access to device registers.
///
/// Implementations must perform every access they are asked to, exactly once
/// and in order. Register access cannot fail: a bad address is a bug in the
/// register map, not a runtime condition.
pub trait RegisterAccess {
    /// One volatile 32-bit load.
    fn read(&self, reg: Reg) -> u32;

    /// One volatile 32-bit store.
    fn write(&self, reg: Reg, value: u32);

    /// All register writes issued before this point are complete before any
    /// access after it.
    fn data_barrier(&self);

    /// Flushes the pipeline so that the effects of earlier control register
    /// writes apply to the instructions that follow.
    fn instruction_barrier(&self);

    /// Burns one iteration of a busy loop.
    fn nop(&self);

    /// Reads `reg`, ORs in `mask`, and writes the result back.
    fn set_bits(&self, reg: Reg, mask: u32) {
        let v = self.read(reg);
        self.write(reg, v | mask);
    }

    /// Reads `reg`, clears the bits in `mask`, and writes the result back.
    fn clear_bits(&self, reg: Reg, mask: u32) {
        let v = self.read(reg);
        self.write(reg, v & !mask);
    }

    /// Both barriers, data first.
    fn full_barrier(&self) {
        self.data_barrier();
        self.instruction_barrier();
    }

    /// Burns `count` iterations of a busy loop.
    fn spin(&self, count: u32) {
        for _ in 0..count {
            self.nop();
        }
    }
}

/// Power-on state machine. Datasheet 7.4.
pub mod psm {
    use super::Reg;

    /// Force the listed domains on.
    pub const FRCE_ON: Reg = Reg::read_write(0x4001_8000);
    /// Domains that have finished powering up.
    pub const DONE: Reg = Reg::read_only(0x4001_800C);
}

/// Reset controller. Datasheet 7.5.
pub mod resets {
    use super::Reg;

    /// A 1 bit holds the corresponding peripheral in reset.
    pub const RESET: Reg = Reg::read_write(0x4002_0000);
    /// A 1 bit means the corresponding peripheral is out of reset.
    pub const RESET_DONE: Reg = Reg::read_only(0x4002_0008);
}

pub mod clocks {
    use super::Reg;

    pub const CLK_SYS_CTRL: Reg = Reg::read_write(0x4001_003C);
    pub const CLK_PERI_CTRL: Reg = Reg::read_write(0x4001_0048);

    /// Clock-gate enable bit, as used in both control registers above.
    pub const ENABLE: u32 = 1 << 11;
}

/// Single-cycle IO block. Each core sees its own view at the same address.
pub mod sio {
    use super::Reg;

    /// Reads 0 on core 0 and 1 on core 1.
    pub const CPUID: Reg = Reg::read_only(0xD000_0000);

    pub const GPIO_OUT_SET: Reg = Reg::write_only(0xD000_0018);
    pub const GPIO_OUT_CLR: Reg = Reg::write_only(0xD000_0020);
    pub const GPIO_OUT_XOR: Reg = Reg::write_only(0xD000_0028);
    pub const GPIO_OE_SET: Reg = Reg::write_only(0xD000_0038);
    pub const GPIO_OE_CLR: Reg = Reg::write_only(0xD000_0040);

    /// Inter-core FIFO status. Writing clears the sticky error flags.
    pub const FIFO_ST: Reg = Reg::read_write(0xD000_0050);
    /// Push to the other core.
    pub const FIFO_WR: Reg = Reg::write_only(0xD000_0054);
    /// Pop from the other core.
    pub const FIFO_RD: Reg = Reg::read_only(0xD000_0058);

    /// FIFO_ST: this core's read side holds data.
    pub const FIFO_ST_VLD: u32 = 1 << 0;
    /// FIFO_ST: this core's write side has room.
    pub const FIFO_ST_RDY: u32 = 1 << 1;
    /// FIFO_ST: every sticky flag, for clearing.
    pub const FIFO_ST_CLEAR_ALL: u32 = 0xFF;
}

/// Cortex-M33 system control space.
pub mod scs {
    use super::Reg;

    /// Auxiliary control.
    pub const ACTLR: Reg = Reg::read_write(0xE000_E008);
    /// ACTLR: external exclusives are used for all shareable memory, which we
    /// need with no MPU (the default map has no shareable Normal memory).
    pub const ACTLR_EXTEXCLALL: u32 = 1 << 29;

    /// First NVIC interrupt clear-pending register.
    pub const NVIC_ICPR0: Reg = Reg::read_write(0xE000_E280);

    /// Debug halting control and status.
    pub const DHCSR: Reg = Reg::read_write(0xE000_EDF0);
    /// DHCSR write key plus C_DEBUGEN.
    pub const DHCSR_KEY_DEBUGEN: u32 = 0xA05F_0001;

    /// Debug authentication status. The M33 implements this as read-only and
    /// ignores the write we issue to it, but the write is part of the
    /// established bring-up sequence so the handle permits it.
    pub const DBGAUTHSTATUS: Reg = Reg::read_write(0xE000_EFB8);
    pub const DBGAUTHSTATUS_ALL: u32 = 0x0000_000F;
}

/// CoreSight lock registers guarding the trace macrocell's configuration.
pub mod coresight {
    use super::Reg;

    /// Lock access.
    pub const LAR: Reg = Reg::write_only(0x5000_0FB0);
    /// Lock status.
    pub const LSR: Reg = Reg::read_only(0x5000_0FB4);

    /// Value that opens the lock.
    pub const UNLOCK_KEY: u32 = 0xC5AC_CE55;
    /// LSR bit we treat as "still locked".
    pub const LSR_LOCKED: u32 = 1 << 0;
}
