//! Shared helpers: build a bare machine and run programs on it without
//! the worker thread.
#![allow(dead_code)]

use vector06c::machine::Machine;
use vector06c::HardwareConfig;

/// Minimal boot image; tests place their programs in RAM.
pub fn machine() -> Machine {
    Machine::new(&HardwareConfig::default(), &[0x76]).expect("machine")
}

/// Load `program` at `addr`, point the CPU at it, and drop the ROM
/// overlay so fetches come from RAM.
pub fn load_program(m: &mut Machine, addr: u16, program: &[u8]) {
    m.memory.set_ram(addr, program);
    m.memory.set_rom_enable(false);
    m.cpu.pc = addr;
}

/// Execute one instruction and return the t-states it took.
pub fn step_instr(m: &mut Machine) -> u64 {
    let before = m.cpu.cc;
    m.execute_instruction();
    m.cpu.cc - before
}

/// Execute `n` instructions.
pub fn run_instrs(m: &mut Machine, n: usize) {
    for _ in 0..n {
        m.execute_instruction();
    }
}
