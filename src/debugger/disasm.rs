//! 8080 disassembly: instruction lengths, mnemonic rendering, and the
//! upstream back-scan used to open a window above an arbitrary address.
//!
//! Undocumented opcodes execute as their documented aliases and are
//! rendered with a `*` suffix.

use serde::{Deserialize, Serialize};

use crate::machine::memory::Addr;

pub const CMD_BYTES_MAX: usize = 3;

const REGS: [&str; 8] = ["B", "C", "D", "E", "H", "L", "M", "A"];
const PAIRS: [&str; 4] = ["B", "D", "H", "SP"];
const CONDS: [&str; 8] = ["NZ", "Z", "NC", "C", "PO", "PE", "P", "M"];
const ALU_OPS: [&str; 8] = ["ADD", "ADC", "SUB", "SBB", "ANA", "XRA", "ORA", "CMP"];
const ALU_IMM_OPS: [&str; 8] = ["ADI", "ACI", "SUI", "SBI", "ANI", "XRI", "ORI", "CPI"];

/// Instruction length in bytes, matching what the CPU executes (aliases
/// included).
pub fn cmd_len(opcode: u8) -> usize {
    match opcode {
        0x01 | 0x11 | 0x21 | 0x31 => 3,
        0x22 | 0x2A | 0x32 | 0x3A => 3,
        0xC3 | 0xCB | 0xCD | 0xDD | 0xED | 0xFD => 3,
        o if o & 0xC7 == 0xC2 || o & 0xC7 == 0xC4 => 3,
        0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => 2,
        0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => 2,
        0xD3 | 0xDB => 2,
        _ => 1,
    }
}

/// True when the last operand is a 16-bit address (candidate for label
/// substitution in the window builder).
pub fn has_addr_operand(opcode: u8) -> bool {
    matches!(opcode, 0x22 | 0x2A | 0x32 | 0x3A | 0xC3 | 0xCB | 0xCD | 0xDD | 0xED | 0xFD)
        || opcode & 0xC7 == 0xC2
        || opcode & 0xC7 == 0xC4
}

/// Render one instruction. `data_l`/`data_h` are the operand bytes (in
/// fetch order) and are ignored for short instructions.
pub fn mnemonic(opcode: u8, data_l: u8, data_h: u8) -> String {
    let imm16 = || format!("0x{:04X}", (data_h as u16) << 8 | data_l as u16);
    let imm8 = || format!("0x{data_l:02X}");
    let ddd = ((opcode >> 3) & 7) as usize;
    let sss = (opcode & 7) as usize;
    let rp = ((opcode >> 4) & 3) as usize;
    let ccc = ((opcode >> 3) & 7) as usize;

    match opcode {
        0x00 => "NOP".into(),
        0x08 | 0x10 | 0x18 | 0x20 | 0x28 | 0x30 | 0x38 => "NOP*".into(),
        0x01 | 0x11 | 0x21 | 0x31 => format!("LXI {},{}", PAIRS[rp], imm16()),
        0x02 | 0x12 => format!("STAX {}", PAIRS[rp]),
        0x0A | 0x1A => format!("LDAX {}", PAIRS[rp]),
        0x22 => format!("SHLD {}", imm16()),
        0x2A => format!("LHLD {}", imm16()),
        0x32 => format!("STA {}", imm16()),
        0x3A => format!("LDA {}", imm16()),
        0x03 | 0x13 | 0x23 | 0x33 => format!("INX {}", PAIRS[rp]),
        0x0B | 0x1B | 0x2B | 0x3B => format!("DCX {}", PAIRS[rp]),
        0x09 | 0x19 | 0x29 | 0x39 => format!("DAD {}", PAIRS[rp]),
        0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => format!("INR {}", REGS[ddd]),
        0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => format!("DCR {}", REGS[ddd]),
        0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
            format!("MVI {},{}", REGS[ddd], imm8())
        }
        0x07 => "RLC".into(),
        0x0F => "RRC".into(),
        0x17 => "RAL".into(),
        0x1F => "RAR".into(),
        0x27 => "DAA".into(),
        0x2F => "CMA".into(),
        0x37 => "STC".into(),
        0x3F => "CMC".into(),
        0x76 => "HLT".into(),
        0x40..=0x7F => format!("MOV {},{}", REGS[ddd], REGS[sss]),
        0x80..=0xBF => format!("{} {}", ALU_OPS[((opcode >> 3) & 7) as usize], REGS[sss]),
        0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
            format!("{} {}", ALU_IMM_OPS[((opcode >> 3) & 7) as usize], imm8())
        }
        0xC3 => format!("JMP {}", imm16()),
        0xCB => format!("JMP* {}", imm16()),
        o if o & 0xC7 == 0xC2 => format!("J{} {}", CONDS[ccc], imm16()),
        0xCD => format!("CALL {}", imm16()),
        0xDD | 0xED | 0xFD => format!("CALL* {}", imm16()),
        o if o & 0xC7 == 0xC4 => format!("C{} {}", CONDS[ccc], imm16()),
        0xC9 => "RET".into(),
        0xD9 => "RET*".into(),
        o if o & 0xC7 == 0xC0 => format!("R{}", CONDS[ccc]),
        o if o & 0xC7 == 0xC7 => format!("RST {}", (o >> 3) & 7),
        0xC1 | 0xD1 | 0xE1 => format!("POP {}", PAIRS[rp]),
        0xF1 => "POP PSW".into(),
        0xC5 | 0xD5 | 0xE5 => format!("PUSH {}", PAIRS[rp]),
        0xF5 => "PUSH PSW".into(),
        0xE3 => "XTHL".into(),
        0xE9 => "PCHL".into(),
        0xEB => "XCHG".into(),
        0xF9 => "SPHL".into(),
        0xD3 => format!("OUT {}", imm8()),
        0xDB => format!("IN {}", imm8()),
        0xF3 => "DI".into(),
        0xFB => "EI".into(),
        _ => format!("DB 0x{opcode:02X}"),
    }
}

// ── Disassembly window lines ──────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineType {
    Code,
    Label,
    Comment,
}

/// Per-line statistics from the heat-map; `u64::MAX` means "not
/// collected".
pub const STATS_UNKNOWN: u64 = u64::MAX;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisasmLine {
    pub line_type: LineType,
    pub addr: Addr,
    pub text: String,
    /// Label names associated with the instruction's address operand.
    pub consts: String,
    pub runs: u64,
    pub reads: u64,
    pub writes: u64,
}

impl DisasmLine {
    pub fn code(addr: Addr, text: String) -> Self {
        Self {
            line_type: LineType::Code,
            addr,
            text,
            consts: String::new(),
            runs: STATS_UNKNOWN,
            reads: STATS_UNKNOWN,
            writes: STATS_UNKNOWN,
        }
    }

    pub fn label(addr: Addr, text: String) -> Self {
        Self {
            line_type: LineType::Label,
            ..Self::code(addr, text)
        }
    }

    pub fn comment(addr: Addr, text: String) -> Self {
        Self {
            line_type: LineType::Comment,
            ..Self::code(addr, text)
        }
    }
}

// ── Back-scan ─────────────────────────────────────────────────

/// Find the address `lines` instructions above `target`.
///
/// 8080 instructions are 1–3 bytes, so there is no unique upstream
/// parse. Several candidate starting offsets are tried; the first whose
/// decoded length chain lands exactly on `target` with enough
/// instructions wins. A stream that never aligns falls back to one
/// byte per line.
pub fn scan_back(byte_at: &dyn Fn(Addr) -> u8, target: Addr, lines: usize) -> Addr {
    if lines == 0 || target == 0 {
        return target;
    }
    let reach = (lines * CMD_BYTES_MAX).min(target as usize);

    // In a consistent stream the instruction start `lines` above the
    // target sits somewhere in [target - 3*lines, target - lines], so
    // one of these candidates decodes cleanly into the target.
    for k in lines..=reach {
        let start = target as usize - k;
        let mut addr = start;
        let mut boundaries: Vec<usize> = Vec::new();
        while addr < target as usize {
            boundaries.push(addr);
            addr += cmd_len(byte_at(addr as Addr));
        }
        if addr == target as usize && boundaries.len() >= lines {
            return boundaries[boundaries.len() - lines] as Addr;
        }
    }

    target.saturating_sub(lines as Addr)
}
