//! Execution trace: a pre-allocated ring appended on every opcode
//! fetch, read back with an optional opcode-class filter.

use serde::{Deserialize, Serialize};

use crate::machine::memory::GlobalAddr;

pub const TRACE_LOG_SIZE: usize = 100_000;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TraceEntry {
    pub global_addr: GlobalAddr,
    pub opcode: u8,
    pub data_l: u8,
    pub data_h: u8,
}

/// Which instructions a trace read-out keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceFilter {
    All,
    /// CALL and conditional calls.
    Calls,
    /// JMP, conditional jumps, PCHL.
    Jumps,
    /// RET, conditional returns.
    Returns,
    Rst,
}

impl TraceFilter {
    pub fn matches(&self, opcode: u8) -> bool {
        match self {
            TraceFilter::All => true,
            TraceFilter::Calls => {
                matches!(opcode, 0xCD | 0xDD | 0xED | 0xFD)
                    || (opcode & 0xC7 == 0xC4)
            }
            TraceFilter::Jumps => {
                matches!(opcode, 0xC3 | 0xCB | 0xE9) || (opcode & 0xC7 == 0xC2)
            }
            TraceFilter::Returns => {
                matches!(opcode, 0xC9 | 0xD9) || (opcode & 0xC7 == 0xC0)
            }
            TraceFilter::Rst => opcode & 0xC7 == 0xC7,
        }
    }
}

pub struct TraceLog {
    entries: Vec<TraceEntry>,
    /// Next write position.
    idx: usize,
    len: usize,
}

impl TraceLog {
    pub fn new() -> Self {
        Self {
            entries: vec![TraceEntry::default(); TRACE_LOG_SIZE],
            idx: 0,
            len: 0,
        }
    }

    pub fn clear(&mut self) {
        self.idx = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, entry: TraceEntry) {
        self.entries[self.idx] = entry;
        self.idx = (self.idx + 1) % self.entries.len();
        self.len = (self.len + 1).min(self.entries.len());
    }

    /// Read up to `lines` matching entries, newest first, skipping the
    /// first `offset` matches.
    pub fn read(&self, offset: usize, lines: usize, filter: TraceFilter) -> Vec<TraceEntry> {
        let mut out = Vec::with_capacity(lines);
        let mut skipped = 0usize;
        for back in 1..=self.len {
            let i = (self.idx + self.entries.len() - back) % self.entries.len();
            let e = self.entries[i];
            if !filter.matches(e.opcode) {
                continue;
            }
            if skipped < offset {
                skipped += 1;
                continue;
            }
            out.push(e);
            if out.len() == lines {
                break;
            }
        }
        out
    }
}
