//! Disassembly back-scan, breakpoints, watchpoints, trace log, and the
//! debug-data file.

mod common;

use rand::prelude::*;

use common::{load_program, machine, run_instrs};
use vector06c::debugger::{
    disasm, Access, Breakpoint, Condition, Debugger, LineType, TraceFilter, Watchpoint,
};
use vector06c::machine::AddrSpace;

// ── Disassembly ───────────────────────────────────────────────

/// Generate a self-consistent stream of random instructions, returning
/// (bytes, instruction start offsets).
fn random_code_stream(rng: &mut StdRng, len: usize) -> (Vec<u8>, Vec<usize>) {
    let mut bytes = Vec::with_capacity(len + 3);
    let mut starts = Vec::new();
    while bytes.len() < len {
        starts.push(bytes.len());
        let opcode: u8 = rng.gen();
        bytes.push(opcode);
        for _ in 1..disasm::cmd_len(opcode) {
            bytes.push(rng.gen());
        }
    }
    (bytes, starts)
}

#[test]
fn back_scan_lands_on_target() {
    let mut rng = StdRng::seed_from_u64(0x1CEB00DA);
    let debugger = Debugger::new();

    for _ in 0..20 {
        let mut m = machine();
        let base = 0x1000u16;
        let (bytes, starts) = random_code_stream(&mut rng, 600);
        m.memory.set_ram(base, &bytes);
        m.memory.set_rom_enable(false);

        // Pick targets far enough in that a full window exists above.
        for &target_off in starts.iter().filter(|&&s| s > 60).take(8) {
            let target = base + target_off as u16;
            let n = 11;
            let before = 5;
            let lines = debugger.get_disasm(&m.memory, target, n, before);

            let code: Vec<_> = lines
                .iter()
                .filter(|l| l.line_type == LineType::Code)
                .collect();
            assert_eq!(code.len(), n);
            assert_eq!(code[before].addr, target, "window centered on target");
            // The lines below the target follow the real stream.
            assert!(starts.contains(&((code[before + 1].addr - base) as usize)));
        }
    }
}

#[test]
fn disasm_interleaves_labels_and_comments() {
    let mut m = machine();
    m.memory.set_ram(0x0200, &[0x3E, 0x42, 0xC3, 0x00, 0x02]);
    m.memory.set_rom_enable(false);

    let mut debugger = Debugger::new();
    debugger.debug_data.add_label(0x0200, "entry");
    debugger.debug_data.set_comment(0x0200, "reload A");
    debugger.debug_data.add_label(0x0200, "start");

    let lines = debugger.get_disasm(&m.memory, 0x0200, 2, 0);
    assert_eq!(lines[0].line_type, LineType::Label);
    assert_eq!(lines[0].text, "entry, start");
    assert_eq!(lines[1].line_type, LineType::Comment);
    assert_eq!(lines[2].line_type, LineType::Code);
    assert_eq!(lines[2].text, "MVI A,0x42");

    // The JMP operand picks up the label as a const annotation.
    assert_eq!(lines[3].text, "JMP 0x0200");
    assert!(lines[3].consts.contains("entry"));
}

// ── Breakpoints ───────────────────────────────────────────────

#[test]
fn breakpoint_fires_and_auto_deletes() {
    let mut debugger = Debugger::new();
    let mut bp = Breakpoint::new(0x0203);
    bp.auto_delete = true;
    debugger.breakpoints.add(bp);

    assert!(!debugger.check_break(0x0200));
    assert!(debugger.check_break(0x0203));
    // Consumed by the hit.
    assert!(!debugger.check_break(0x0203));
}

#[test]
fn disabled_breakpoint_stays_silent() {
    use vector06c::debugger::BreakpointStatus;

    let mut debugger = Debugger::new();
    debugger.breakpoints.add(Breakpoint::new(0x0300));
    debugger
        .breakpoints
        .set_status(0x0300, BreakpointStatus::Disabled);
    assert!(!debugger.check_break(0x0300));
    debugger
        .breakpoints
        .set_status(0x0300, BreakpointStatus::Active);
    assert!(debugger.check_break(0x0300));
}

// ── Watchpoints ───────────────────────────────────────────────

#[test]
fn watchpoint_trips_on_matching_store() {
    // MVI A,0x42; STA 0x8000 — watchpoint {W, 0x8000, ==, 0x42}.
    let mut m = machine();
    load_program(&mut m, 0x0200, &[0x3E, 0x42, 0x32, 0x00, 0x80]);
    let mut debugger = Debugger::new();
    debugger.watchpoints.add(Watchpoint::new(
        Access::W,
        0x8000,
        Condition::Equ,
        0x42,
        1,
    ));

    m.execute_instruction();
    debugger.on_instruction(m.memory.journal(), m.cpu.cc);
    assert!(!debugger.check_break(m.cpu.pc as u32), "MVI must not trip");

    m.execute_instruction();
    debugger.on_instruction(m.memory.journal(), m.cpu.cc);
    assert!(debugger.check_break(m.cpu.pc as u32), "store of 0x42 trips");
    assert!(!debugger.check_break(m.cpu.pc as u32), "latch consumed");
}

#[test]
fn watchpoint_condition_filters_value() {
    // Same store, but the watchpoint wants 0x43.
    let mut m = machine();
    load_program(&mut m, 0x0200, &[0x3E, 0x42, 0x32, 0x00, 0x80]);
    let mut debugger = Debugger::new();
    debugger.watchpoints.add(Watchpoint::new(
        Access::W,
        0x8000,
        Condition::Equ,
        0x43,
        1,
    ));
    run_instrs(&mut m, 2);
    debugger.on_instruction(m.memory.journal(), m.cpu.cc);
    assert!(!debugger.check_break(m.cpu.pc as u32));
}

#[test]
fn word_watchpoint_needs_both_halves() {
    // SHLD 0x6000 writes L then H; the word watchpoint latches only
    // when both halves matched.
    let mut m = machine();
    load_program(&mut m, 0x0200, &[0x21, 0x34, 0x12, 0x22, 0x00, 0x60]);
    let mut debugger = Debugger::new();
    debugger.watchpoints.add(Watchpoint::new(
        Access::W,
        0x6000,
        Condition::Equ,
        0x1234,
        2,
    ));

    m.execute_instruction(); // LXI H
    debugger.on_instruction(m.memory.journal(), m.cpu.cc);
    assert!(!debugger.check_break(m.cpu.pc as u32));

    m.execute_instruction(); // SHLD
    debugger.on_instruction(m.memory.journal(), m.cpu.cc);
    assert!(debugger.check_break(m.cpu.pc as u32));
}

#[test]
fn read_watchpoint_ignores_writes() {
    let mut m = machine();
    // STA then LDA of the same byte.
    load_program(&mut m, 0x0200, &[0x3E, 0x07, 0x32, 0x00, 0x70, 0x3A, 0x00, 0x70]);
    let mut debugger = Debugger::new();
    debugger.watchpoints.add(Watchpoint::new(
        Access::R,
        0x7000,
        Condition::Any,
        0,
        1,
    ));

    run_instrs(&mut m, 2);
    debugger.on_instruction(m.memory.journal(), m.cpu.cc);
    assert!(!debugger.check_break(m.cpu.pc as u32), "write ignored");

    m.execute_instruction(); // LDA
    debugger.on_instruction(m.memory.journal(), m.cpu.cc);
    assert!(debugger.check_break(m.cpu.pc as u32), "read trips");
}

// ── Trace log / heat-map ──────────────────────────────────────

#[test]
fn trace_log_records_fetches_with_filter() {
    let mut m = machine();
    // MVI A,1; CALL 0x0300; (at 0x0300) RET; NOP
    load_program(&mut m, 0x0200, &[0x3E, 0x01, 0xCD, 0x00, 0x03]);
    m.memory.set_ram(0x0300, &[0xC9]);
    m.cpu.sp = 0x7F00;

    let mut debugger = Debugger::new();
    debugger.attach();
    for _ in 0..3 {
        m.execute_instruction();
        debugger.on_instruction(m.memory.journal(), m.cpu.cc);
    }

    let all = debugger.get_trace_log(0, 10, TraceFilter::All);
    assert_eq!(all.len(), 3);
    // Newest first.
    assert!(all[0].contains("RET"));
    assert!(all[1].contains("CALL 0x0300"));

    let calls = debugger.get_trace_log(0, 10, TraceFilter::Calls);
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("CALL"));
}

#[test]
fn heat_map_counts_runs_reads_writes() {
    let mut m = machine();
    // LXI H,0x4000; MOV A,M; MOV M,A
    load_program(&mut m, 0x0200, &[0x21, 0x00, 0x40, 0x7E, 0x77]);
    let mut debugger = Debugger::new();
    debugger.attach();
    for _ in 0..3 {
        m.execute_instruction();
        debugger.on_instruction(m.memory.journal(), m.cpu.cc);
    }

    let heat = debugger.heat_map().expect("attached");
    let (runs, _, _) = heat.stats(0x0200);
    assert_eq!(runs, 1);
    let (_, reads, writes) = heat.stats(0x4000);
    assert_eq!(reads, 1);
    assert_eq!(writes, 1);
    assert!(heat.recency(0x4000, m.cpu.cc) > 0.9);

    debugger.detach();
    assert!(debugger.heat_map().is_none());
}

// ── Debug-data file ───────────────────────────────────────────

#[test]
fn debug_data_file_roundtrip() {
    let mut a = Debugger::new();
    a.debug_data.add_label(0x0100, "boot");
    a.debug_data.add_const(0x8000, "SCREEN");
    a.debug_data.set_comment(0x0100, "entry point");
    a.breakpoints.add(Breakpoint::new(0x0105));
    a.watchpoints.add(Watchpoint::new(
        Access::Rw,
        0x8000,
        Condition::Any,
        0,
        1,
    ));

    let path = std::env::temp_dir().join(format!("vector06c-dbg-{}.json", std::process::id()));
    a.debug_data
        .save(&path, &a.breakpoints, &a.watchpoints)
        .expect("save");

    let mut b = Debugger::new();
    {
        let Debugger {
            debug_data,
            breakpoints,
            watchpoints,
            ..
        } = &mut b;
        debug_data.load(&path, breakpoints, watchpoints).expect("load");
    }
    std::fs::remove_file(&path).ok();

    assert_eq!(b.debug_data.labels(0x0100), Some(&["boot".to_string()][..]));
    assert_eq!(b.debug_data.comment(0x0100), Some("entry point"));
    assert!(b.debug_data.names_for_operand(0x8000).contains("SCREEN"));
    assert!(b.breakpoints.get(0x0105).is_some());
    assert_eq!(b.watchpoints.iter().count(), 1);
}

// ── Journal vs debugger wiring sanity ─────────────────────────

#[test]
fn stack_reads_feed_watchpoints() {
    // POP B reads two stack bytes; an R watchpoint on the stack sees
    // them.
    let mut m = machine();
    m.cpu.sp = 0x7EFE;
    m.memory.write(0x7EFE, 0xCD, AddrSpace::Stack);
    m.memory.write(0x7EFF, 0xAB, AddrSpace::Stack);
    load_program(&mut m, 0x0200, &[0xC1]);

    let mut debugger = Debugger::new();
    debugger.watchpoints.add(Watchpoint::new(
        Access::R,
        0x7EFE,
        Condition::Equ,
        0xCD,
        1,
    ));
    m.execute_instruction();
    debugger.on_instruction(m.memory.journal(), m.cpu.cc);
    assert!(debugger.check_break(m.cpu.pc as u32));
    assert_eq!(m.cpu.bc(), 0xABCD);
}
