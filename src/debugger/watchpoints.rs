//! Data watchpoints, evaluated against the per-instruction access
//! journal. A matching access latches a break request that the
//! coordinator consumes at the next instruction boundary — execution is
//! never interrupted mid-instruction.

use serde::{Deserialize, Serialize};

use crate::machine::memory::GlobalAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    R,
    W,
    Rw,
}

impl Access {
    fn covers(&self, is_write: bool) -> bool {
        match self {
            Access::R => !is_write,
            Access::W => is_write,
            Access::Rw => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Any,
    Equ,
    Less,
    Greater,
    LessEqu,
    GreaterEqu,
    NotEqu,
}

impl Condition {
    fn check(&self, val: u8, expected: u8) -> bool {
        match self {
            Condition::Any => true,
            Condition::Equ => val == expected,
            Condition::Less => val < expected,
            Condition::Greater => val > expected,
            Condition::LessEqu => val <= expected,
            Condition::GreaterEqu => val >= expected,
            Condition::NotEqu => val != expected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Watchpoint {
    pub access: Access,
    pub global_addr: GlobalAddr,
    pub cond: Condition,
    pub value: u16,
    /// 1 or 2 bytes. A word watchpoint needs both halves to match
    /// before it latches.
    pub len: u8,
    pub active: bool,
    #[serde(skip)]
    break_l: bool,
    #[serde(skip)]
    break_h: bool,
}

impl Watchpoint {
    pub fn new(access: Access, global_addr: GlobalAddr, cond: Condition, value: u16, len: u8) -> Self {
        Self {
            access,
            global_addr,
            cond,
            value,
            len: len.clamp(1, 2),
            active: true,
            break_l: false,
            break_h: false,
        }
    }

    fn reset_latch(&mut self) {
        self.break_l = false;
        self.break_h = false;
    }

    /// Feed one access; true when the watchpoint trips.
    fn check(&mut self, is_write: bool, global_addr: GlobalAddr, val: u8) -> bool {
        if !self.active || !self.access.covers(is_write) {
            return false;
        }
        if global_addr == self.global_addr {
            self.break_l = self.cond.check(val, self.value as u8);
        } else if self.len == 2 && global_addr == self.global_addr + 1 {
            self.break_h = self.cond.check(val, (self.value >> 8) as u8);
        } else {
            return false;
        }
        self.break_l && (self.len == 1 || self.break_h)
    }
}

#[derive(Debug, Default)]
pub struct Watchpoints {
    list: Vec<Watchpoint>,
    break_pending: bool,
}

impl Watchpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, wp: Watchpoint) {
        // One watchpoint per base address; a new one replaces the old.
        self.del(wp.global_addr);
        self.list.push(wp);
    }

    pub fn del(&mut self, global_addr: GlobalAddr) {
        self.list.retain(|w| w.global_addr != global_addr);
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Watchpoint> {
        self.list.iter()
    }

    pub fn reset_latches(&mut self) {
        self.break_pending = false;
        for w in &mut self.list {
            w.reset_latch();
        }
    }

    /// Feed one journaled access.
    pub fn check_access(&mut self, is_write: bool, global_addr: GlobalAddr, val: u8) {
        for w in &mut self.list {
            if w.check(is_write, global_addr, val) {
                self.break_pending = true;
                w.reset_latch();
            }
        }
    }

    /// Consume the pending break latched since the last boundary.
    pub fn take_break(&mut self) -> bool {
        std::mem::take(&mut self.break_pending)
    }
}
