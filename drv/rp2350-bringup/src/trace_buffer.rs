// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Storage for captured trace data.
//!
//! The trace sink writes into RAM behind the processor's back, and the
//! capture tooling requires the buffer's base address to be aligned to its
//! size. A [`TraceBuffer`] is just that storage. Firmware gets its address and
//! length and nothing else: there is no way to write into it from here, since
//! once tracing may be active the buffer belongs to the hardware.

use core::cell::UnsafeCell;
use core::mem::{align_of, size_of};

use static_assertions::const_assert_eq;

pub struct TraceBuffer<const WORDS: usize> {
    words: UnsafeCell<[u32; WORDS]>,
}

// Safety: no code path reads or writes the contents; only the address leaves.
unsafe impl<const WORDS: usize> Sync for TraceBuffer<WORDS> {}

impl<const WORDS: usize> TraceBuffer<WORDS> {
    pub const LEN_BYTES: usize = WORDS * size_of::<u32>();

    pub const fn new() -> Self {
        Self {
            words: UnsafeCell::new([0; WORDS]),
        }
    }

    pub fn base(&self) -> usize {
        self.words.get() as usize
    }

    pub const fn len_bytes(&self) -> usize {
        Self::LEN_BYTES
    }
}

impl<const WORDS: usize> Default for TraceBuffer<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

#[repr(C, align(8192))]
pub struct Align8K<T>(pub T);

#[repr(C, align(32768))]
pub struct Align32K<T>(pub T);

pub type TraceBuffer8K = Align8K<TraceBuffer<2048>>;
pub type TraceBuffer32K = Align32K<TraceBuffer<8192>>;

const_assert_eq!(size_of::<TraceBuffer8K>(), 8192);
const_assert_eq!(align_of::<TraceBuffer8K>(), 8192);
const_assert_eq!(size_of::<TraceBuffer32K>(), 32768);
const_assert_eq!(align_of::<TraceBuffer32K>(), 32768);

/// Whether a buffer of `size` bytes at `base` is something the capture
/// tooling can use: a power-of-two size, with the base aligned to it.
pub fn placement_ok(base: usize, size: usize) -> bool {
    size.is_power_of_two() && base & (size - 1) == 0
}
