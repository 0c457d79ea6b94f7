//! Port latches, keyboard matrix, and commit plumbing.

mod common;

use common::{load_program, machine, run_instrs};

#[test]
fn border_port_latches_index_and_mode() {
    // MVI A,0x17; OUT 0x02: index 7, 512-mode bit set.
    let mut m = machine();
    load_program(&mut m, 0x0200, &[0x3E, 0x17, 0xD3, 0x02]);
    run_instrs(&mut m, 2);
    assert_eq!(m.io.palette_idx(), 0x07);
    assert!(m.io.mode_512());

    // The raster-visible mode flips once the commit drained (the OUT's
    // own rasterized pixels already passed the window).
    assert!(m.display.mode_512());
    assert_eq!(m.display.border_idx(), 0x07);
}

#[test]
fn scroll_and_keyboard_share_port_3() {
    let mut m = machine();
    // Column 1 selected (active low), scroll follows the same latch.
    load_program(&mut m, 0x0200, &[0x3E, 0xFD, 0xD3, 0x03]);
    run_instrs(&mut m, 2);
    assert_eq!(m.io.scroll(), 0xFD);

    // Key 11 = column 1, row 3.
    m.io.keyboard.set_key(11, true);
    let rows = m.io.port_in(0x02, &m.memory);
    assert_eq!(rows, !(1u8 << 3));

    m.io.keyboard.set_key(11, false);
    let rows = m.io.port_in(0x02, &m.memory);
    assert_eq!(rows, 0xFF);
}

#[test]
fn unselected_column_reads_idle() {
    let mut m = machine();
    m.io.keyboard.set_key(11, true); // column 1
    load_program(&mut m, 0x0200, &[0x3E, 0xFF, 0xD3, 0x03]); // no column selected
    run_instrs(&mut m, 2);
    assert_eq!(m.io.port_in(0x02, &m.memory), 0xFF);
}

#[test]
fn tape_and_modifiers_on_port_1() {
    let mut m = machine();
    m.io.tape_in = true;
    m.io.keyboard.set_key(64, true); // first modifier
    let v = m.io.port_in(0x01, &m.memory);
    assert_eq!(v & 0x10, 0x10);
    assert_eq!(v >> 5, 0x01);
}

#[test]
fn joystick_port() {
    let mut m = machine();
    assert_eq!(m.io.port_in(0x06, &m.memory), 0xFF);
    m.io.joystick = 0xEE;
    assert_eq!(m.io.port_in(0x06, &m.memory), 0xEE);
}

#[test]
fn unhandled_input_port_floats_high() {
    let mut m = machine();
    assert_eq!(m.io.port_in(0x42, &m.memory), 0xFF);
}
