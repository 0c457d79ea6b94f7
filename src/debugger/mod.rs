//! The debugger: breakpoints, watchpoints, trace ring, memory heat-map,
//! labels, and disassembly windows.
//!
//! The debugger never hooks the CPU directly. Every completed
//! instruction leaves its accesses in the memory journal; the hardware
//! worker hands that journal to `on_instruction` and asks `check_break`
//! at the boundary. Breakpoints and watchpoints are always live; the
//! trace ring and heat-map (tens of megabytes for the full global
//! space) are only allocated while a front-end is attached.

pub mod breakpoints;
pub mod debug_data;
pub mod disasm;
pub mod trace_log;
pub mod watchpoints;

use log::{debug, info};

use crate::machine::memory::{AddrSpace, GlobalAddr, Journal, Memory, GLOBAL_MEMORY_LEN};
use crate::machine::Addr;

pub use breakpoints::{Breakpoint, BreakpointStatus, Breakpoints};
pub use debug_data::DebugData;
pub use disasm::{DisasmLine, LineType};
pub use trace_log::{TraceEntry, TraceFilter, TraceLog};
pub use watchpoints::{Access, Condition, Watchpoint, Watchpoints};

// ── Heat-map ──────────────────────────────────────────────────

/// Cycles after which a touched byte's tint fully fades.
const RECENCY_DECAY_CCS: u64 = 3_000_000;

/// Per-byte access counters over the whole global space, plus the
/// last-touch timestamp driving the memory-view tint.
pub struct HeatMap {
    runs: Vec<u64>,
    reads: Vec<u64>,
    writes: Vec<u64>,
    last_access: Vec<u64>,
}

impl HeatMap {
    fn new() -> Self {
        Self {
            runs: vec![0; GLOBAL_MEMORY_LEN],
            reads: vec![0; GLOBAL_MEMORY_LEN],
            writes: vec![0; GLOBAL_MEMORY_LEN],
            last_access: vec![0; GLOBAL_MEMORY_LEN],
        }
    }

    fn clear(&mut self) {
        self.runs.fill(0);
        self.reads.fill(0);
        self.writes.fill(0);
        self.last_access.fill(0);
    }

    pub fn stats(&self, global_addr: GlobalAddr) -> (u64, u64, u64) {
        let i = global_addr as usize;
        (self.runs[i], self.reads[i], self.writes[i])
    }

    /// 1.0 right after an access, linearly fading to 0.0 over
    /// `RECENCY_DECAY_CCS`.
    pub fn recency(&self, global_addr: GlobalAddr, now_cc: u64) -> f32 {
        let t = self.last_access[global_addr as usize];
        if t == 0 {
            return 0.0;
        }
        let age = now_cc.saturating_sub(t);
        if age >= RECENCY_DECAY_CCS {
            0.0
        } else {
            1.0 - age as f32 / RECENCY_DECAY_CCS as f32
        }
    }

    fn touch_run(&mut self, global_addr: GlobalAddr, cc: u64) {
        let i = global_addr as usize;
        self.runs[i] += 1;
        self.last_access[i] = cc;
    }

    fn touch_read(&mut self, global_addr: GlobalAddr, cc: u64) {
        let i = global_addr as usize;
        self.reads[i] += 1;
        self.last_access[i] = cc;
    }

    fn touch_write(&mut self, global_addr: GlobalAddr, cc: u64) {
        let i = global_addr as usize;
        self.writes[i] += 1;
        self.last_access[i] = cc;
    }
}

/// Trace ring and heat-map together: the allocation attached front-ends
/// pay for.
struct Heavy {
    trace_log: TraceLog,
    heat_map: HeatMap,
}

// ── Debugger ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct DebuggerStatus {
    pub attached: bool,
    pub breakpoints: usize,
    pub watchpoints: usize,
    pub trace_len: usize,
}

pub struct Debugger {
    pub breakpoints: Breakpoints,
    pub watchpoints: Watchpoints,
    pub debug_data: DebugData,
    heavy: Option<Heavy>,
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new()
    }
}

impl Debugger {
    pub fn new() -> Self {
        Self {
            breakpoints: Breakpoints::new(),
            watchpoints: Watchpoints::new(),
            debug_data: DebugData::new(),
            heavy: None,
        }
    }

    // ── Attach lifecycle ──────────────────────────────────────

    pub fn is_attached(&self) -> bool {
        self.heavy.is_some()
    }

    pub fn attach(&mut self) {
        if self.heavy.is_none() {
            info!(
                "debugger attached: trace ring {} entries, heat-map {} bytes per counter",
                trace_log::TRACE_LOG_SIZE,
                GLOBAL_MEMORY_LEN,
            );
            self.heavy = Some(Heavy {
                trace_log: TraceLog::new(),
                heat_map: HeatMap::new(),
            });
        }
    }

    pub fn detach(&mut self) {
        if self.heavy.take().is_some() {
            info!("debugger detached, heavy state freed");
        }
    }

    /// Clear collected state; registered breakpoints, watchpoints, and
    /// labels survive.
    pub fn reset(&mut self) {
        if let Some(h) = self.heavy.as_mut() {
            h.trace_log.clear();
            h.heat_map.clear();
        }
        self.watchpoints.reset_latches();
    }

    pub fn status(&self) -> DebuggerStatus {
        DebuggerStatus {
            attached: self.is_attached(),
            breakpoints: self.breakpoints.iter().count(),
            watchpoints: self.watchpoints.iter().count(),
            trace_len: self.heavy.as_ref().map(|h| h.trace_log.len()).unwrap_or(0),
        }
    }

    pub fn heat_map(&self) -> Option<&HeatMap> {
        self.heavy.as_ref().map(|h| &h.heat_map)
    }

    // ── Per-instruction feed ──────────────────────────────────

    /// Digest one completed instruction's journal: trace, heat-map, and
    /// watchpoint evaluation.
    pub fn on_instruction(&mut self, journal: &Journal, cc: u64) {
        for i in 0..journal.read_len as usize {
            self.watchpoints
                .check_access(false, journal.read_global_addr[i], journal.read[i]);
        }
        for i in 0..journal.write_len as usize {
            self.watchpoints
                .check_access(true, journal.write_global_addr[i], journal.write[i]);
        }

        let Some(heavy) = self.heavy.as_mut() else {
            return;
        };
        if journal.instr_len > 0 {
            heavy.trace_log.push(TraceEntry {
                global_addr: journal.instr_global_addr,
                opcode: journal.instr[0],
                data_l: if journal.instr_len > 1 { journal.instr[1] } else { 0 },
                data_h: if journal.instr_len > 2 { journal.instr[2] } else { 0 },
            });
            heavy.heat_map.touch_run(journal.instr_global_addr, cc);
        }
        for i in 0..journal.read_len as usize {
            heavy.heat_map.touch_read(journal.read_global_addr[i], cc);
        }
        for i in 0..journal.write_len as usize {
            heavy.heat_map.touch_write(journal.write_global_addr[i], cc);
        }
    }

    /// Should execution stop before the instruction at `pc_global`?
    pub fn check_break(&mut self, pc_global: GlobalAddr) -> bool {
        if self.watchpoints.take_break() {
            debug!("watchpoint break before {pc_global:#08x}");
            return true;
        }
        if self.breakpoints.check(pc_global) {
            debug!("breakpoint hit at {pc_global:#08x}");
            return true;
        }
        false
    }

    // ── Disassembly window ────────────────────────────────────

    /// Disassemble `lines` code lines with `before_addr_lines` of them
    /// above `addr`. Label and comment lines are interleaved above
    /// their code line, in addition to the requested code lines.
    pub fn get_disasm(
        &self,
        memory: &Memory,
        addr: Addr,
        lines: usize,
        before_addr_lines: usize,
    ) -> Vec<DisasmLine> {
        let byte_at = |a: Addr| memory.get_byte(a, AddrSpace::Ram);
        let before = before_addr_lines.min(lines.saturating_sub(1));
        let start = disasm::scan_back(&byte_at, addr, before);

        let mut out = Vec::with_capacity(lines * 2);
        let mut a = start;
        let mut emitted = 0usize;
        while emitted < lines {
            if let Some(labels) = self.debug_data.labels(a) {
                out.push(DisasmLine::label(a, labels.join(", ")));
            }
            if let Some(comment) = self.debug_data.comment(a) {
                out.push(DisasmLine::comment(a, format!("; {comment}")));
            }

            let opcode = byte_at(a);
            let data_l = byte_at(a.wrapping_add(1));
            let data_h = byte_at(a.wrapping_add(2));
            let mut line = DisasmLine::code(a, disasm::mnemonic(opcode, data_l, data_h));
            if disasm::has_addr_operand(opcode) {
                let operand = (data_h as Addr) << 8 | data_l as Addr;
                line.consts = self.debug_data.names_for_operand(operand);
            }
            if let Some(h) = self.heavy.as_ref() {
                let global_addr = memory.global_addr_of(a, AddrSpace::Ram);
                let (runs, reads, writes) = h.heat_map.stats(global_addr);
                line.runs = runs;
                line.reads = reads;
                line.writes = writes;
            }
            out.push(line);

            a = a.wrapping_add(disasm::cmd_len(opcode) as Addr);
            emitted += 1;
        }
        out
    }

    // ── Trace read-out ────────────────────────────────────────

    pub fn get_trace_log(&self, offset: usize, lines: usize, filter: TraceFilter) -> Vec<String> {
        let Some(h) = self.heavy.as_ref() else {
            return Vec::new();
        };
        h.trace_log
            .read(offset, lines, filter)
            .iter()
            .map(|e| {
                format!(
                    "0x{:06X}: {}",
                    e.global_addr,
                    disasm::mnemonic(e.opcode, e.data_l, e.data_h),
                )
            })
            .collect()
    }
}
