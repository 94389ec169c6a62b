// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Simulated register file for host tests.
//!
//! Registers start at zero and read back whatever was last written, unless a
//! read script is installed: then successive reads return the scripted values
//! in order, and the final value sticks. Every access is recorded.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};

use crate::regs::{Reg, RegisterAccess};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Read(Reg, u32),
    Write(Reg, u32),
    DataBarrier,
    InstructionBarrier,
    /// A run of consecutive no-ops.
    Nops(u32),
}

#[derive(Default)]
struct Inner {
    values: BTreeMap<u32, u32>,
    scripts: BTreeMap<u32, VecDeque<u32>>,
    events: Vec<Event>,
    nops: u64,
}

#[derive(Default)]
pub struct FakeRegs {
    inner: RefCell<Inner>,
}

impl FakeRegs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Presets a register's value without recording an access.
    pub fn set(&self, reg: Reg, value: u32) {
        self.inner.borrow_mut().values.insert(reg.addr(), value);
    }

    /// Makes reads of `reg` return `values` in order, repeating the last one.
    pub fn script(&self, reg: Reg, values: impl IntoIterator<Item = u32>) {
        let values: VecDeque<u32> = values.into_iter().collect();
        assert!(!values.is_empty(), "empty read script");
        self.inner.borrow_mut().scripts.insert(reg.addr(), values);
    }

    /// Current stored value, without recording an access.
    pub fn value(&self, reg: Reg) -> u32 {
        self.inner
            .borrow()
            .values
            .get(&reg.addr())
            .copied()
            .unwrap_or(0)
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.borrow().events.clone()
    }

    pub fn writes_to(&self, reg: Reg) -> Vec<u32> {
        self.inner
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Write(r, v) if *r == reg => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn reads_of(&self, reg: Reg) -> usize {
        self.inner
            .borrow()
            .events
            .iter()
            .filter(|e| matches!(e, Event::Read(r, _) if *r == reg))
            .count()
    }

    /// Index of the first recorded event matching `pred`.
    pub fn position(&self, pred: impl Fn(&Event) -> bool) -> Option<usize> {
        self.inner.borrow().events.iter().position(pred)
    }

    pub fn nops(&self) -> u64 {
        self.inner.borrow().nops
    }
}

impl RegisterAccess for FakeRegs {
    fn read(&self, reg: Reg) -> u32 {
        assert!(reg.readable(), "read of write-only register {reg:x?}");
        let mut inner = self.inner.borrow_mut();
        let scripted = inner.scripts.get_mut(&reg.addr()).map(|q| {
            if q.len() > 1 {
                q.pop_front().unwrap()
            } else {
                q[0]
            }
        });
        let v = match scripted {
            Some(v) => v,
            None => inner.values.get(&reg.addr()).copied().unwrap_or(0),
        };
        inner.events.push(Event::Read(reg, v));
        v
    }

    fn write(&self, reg: Reg, value: u32) {
        assert!(reg.writable(), "write to read-only register {reg:x?}");
        let mut inner = self.inner.borrow_mut();
        inner.values.insert(reg.addr(), value);
        inner.events.push(Event::Write(reg, value));
    }

    fn data_barrier(&self) {
        self.inner.borrow_mut().events.push(Event::DataBarrier);
    }

    fn instruction_barrier(&self) {
        self.inner.borrow_mut().events.push(Event::InstructionBarrier);
    }

    fn nop(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.nops += 1;
        if let Some(Event::Nops(n)) = inner.events.last_mut() {
            *n += 1;
        } else {
            inner.events.push(Event::Nops(1));
        }
    }
}
