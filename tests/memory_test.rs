//! Address decoding: ROM overlay, RAM-disk data mapping, stack mapping,
//! and the mapping-conflict guard.

mod common;

use common::{load_program, machine, run_instrs};
use vector06c::machine::memory::{AddrSpace, MAIN_MEMORY_LEN, RAM_DISK_LEN, RAM_DISK_PAGE_LEN};

#[test]
fn write_then_read_roundtrip() {
    let mut m = machine();
    for &space in &[AddrSpace::Ram, AddrSpace::Stack] {
        m.memory.write(0x4321, 0x5A, space);
        assert_eq!(m.memory.get_byte(0x4321, space), 0x5A);
    }
}

#[test]
fn rom_overlay_shadows_reads_not_writes() {
    // Boot byte 0x76 lands at 0x0100.
    let mut m = machine();
    assert!(m.memory.is_rom_enabled());
    assert_eq!(m.memory.get_byte(0x0100, AddrSpace::Ram), 0x76);

    // The write lands in the RAM underneath; the read still sees ROM.
    m.memory.write(0x0100, 0x11, AddrSpace::Ram);
    assert_eq!(m.memory.get_byte(0x0100, AddrSpace::Ram), 0x76);

    // Dropping the overlay reveals the write.
    m.memory.set_rom_enable(false);
    assert_eq!(m.memory.get_byte(0x0100, AddrSpace::Ram), 0x11);
}

#[test]
fn any_out_disables_rom() {
    // OUT 0xFF (an unhandled port) still drops the overlay.
    let mut m = machine();
    load_program(&mut m, 0x0200, &[0xD3, 0xFF]);
    m.memory.set_rom_enable(true);
    run_instrs(&mut m, 1);
    assert!(!m.memory.is_rom_enabled());
}

#[test]
fn data_mapping_diverts_enabled_ranges() {
    let mut m = machine();
    // Disk 0: page 1 for data, ranges 0x8000 and 0xA000 enabled.
    m.memory.set_ram_disk_mode(0, 0b0110_0001).expect("mapping");

    m.memory.write(0x8000, 0xAA, AddrSpace::Ram);
    let ga = m.memory.global_addr_of(0x8000, AddrSpace::Ram);
    assert_eq!(
        ga as usize,
        MAIN_MEMORY_LEN + RAM_DISK_PAGE_LEN + 0x8000,
    );
    assert_eq!(m.memory.get_byte_global(ga), 0xAA);
    // Main RAM at the same address is untouched.
    assert_eq!(m.memory.get_byte_global(0x8000), 0x00);

    // 0xE000 is not enabled by this mapping: plain RAM.
    assert_eq!(
        m.memory.global_addr_of(0xE000, AddrSpace::Ram) as usize,
        0xE000,
    );
}

#[test]
fn stack_mapping_claims_all_stack_accesses() {
    // Scenario: disk 0, modeStack on, pageStack 2; SP at 0xFFFE;
    // LXI B,0x1234; PUSH B.
    let mut m = machine();
    m.memory.set_ram_disk_mode(0, 0b0001_1000).expect("mapping");
    m.cpu.sp = 0xFFFE;
    load_program(&mut m, 0x0200, &[0x01, 0x34, 0x12, 0xC5]);
    run_instrs(&mut m, 2);

    assert_eq!(m.memory.get_byte(0xFFFC, AddrSpace::Stack), 0x34);
    assert_eq!(m.memory.get_byte(0xFFFD, AddrSpace::Stack), 0x12);
    // Main RAM unchanged; a non-stack read does not see the pushes.
    assert_eq!(m.memory.get_byte_global(0xFFFC), 0x00);
    assert_eq!(m.memory.get_byte_global(0xFFFD), 0x00);
    assert_eq!(m.memory.get_byte(0xFFFC, AddrSpace::Ram), 0x00);

    assert_eq!(
        m.memory.global_addr_of(0xFFFC, AddrSpace::Stack) as usize,
        MAIN_MEMORY_LEN + 2 * RAM_DISK_PAGE_LEN + 0xFFFC,
    );

    // Stack mapping grabs low addresses too.
    assert_eq!(
        m.memory.global_addr_of(0x1000, AddrSpace::Stack) as usize,
        MAIN_MEMORY_LEN + 2 * RAM_DISK_PAGE_LEN + 0x1000,
    );
}

#[test]
fn lowest_disk_wins_stack_tie() {
    let mut m = machine();
    m.memory.set_ram_disk_mode(2, 0b0001_0000).expect("mapping");
    m.memory.set_ram_disk_mode(1, 0b0001_0100).expect("mapping");
    // Disk 1 is the lowest-indexed disk with stack mode: page 1.
    assert_eq!(
        m.memory.global_addr_of(0x0000, AddrSpace::Stack) as usize,
        MAIN_MEMORY_LEN + RAM_DISK_LEN + RAM_DISK_PAGE_LEN,
    );
}

#[test]
fn overlapping_data_ranges_rejected() {
    let mut m = machine();
    m.memory.set_ram_disk_mode(0, 0b0100_0000).expect("first mapping");
    // Disk 1 also claims 0x8000-0x9FFF: conflict.
    assert!(m.memory.set_ram_disk_mode(1, 0b0100_0001).is_err());

    // The lossy port path keeps the old mapping.
    m.memory.set_ram_disk_mode_lossy(1, 0b0100_0001);
    assert_eq!(m.memory.mapping(1).data, 0);

    // Disjoint ranges are fine.
    m.memory.set_ram_disk_mode(1, 0b1000_0000).expect("disjoint mapping");
}

#[test]
fn mapping_ports_drive_the_banking() {
    // OUT 0x10 installs the disk-0 mapping; IN 0x10 reads it back.
    let mut m = machine();
    load_program(
        &mut m,
        0x0200,
        &[
            0x3E, 0b0100_0001, // MVI A: page 1, range 0x8000
            0xD3, 0x10, // OUT 0x10
            0x3E, 0x5A, // MVI A,0x5A
            0x32, 0x00, 0x80, // STA 0x8000
            0xDB, 0x10, // IN 0x10
        ],
    );
    run_instrs(&mut m, 5);
    assert_eq!(m.cpu.a, 0b0100_0001);
    assert_eq!(
        m.memory
            .get_byte_global((MAIN_MEMORY_LEN + RAM_DISK_PAGE_LEN + 0x8000) as u32),
        0x5A,
    );
    assert_eq!(m.memory.get_byte_global(0x8000), 0x00);
}

#[test]
fn journal_records_instruction_and_writes() {
    // STA 0x4000 journals three instruction bytes and one write with
    // its pre-image.
    let mut m = machine();
    m.memory.set_ram(0x4000, &[0x77]);
    load_program(&mut m, 0x0200, &[0x3E, 0x55, 0x32, 0x00, 0x40]);
    run_instrs(&mut m, 2);

    let j = m.memory.journal();
    assert_eq!(j.instr_len, 3);
    assert_eq!(j.instr_global_addr, 0x0202);
    assert_eq!(&j.instr[..], &[0x32, 0x00, 0x40]);
    assert_eq!(j.write_len, 1);
    assert_eq!(j.write_global_addr[0], 0x4000);
    assert_eq!(j.before_write[0], 0x77);
    assert_eq!(j.write[0], 0x55);
}
