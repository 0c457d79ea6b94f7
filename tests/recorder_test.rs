//! Recorder reversibility: reverse playback restores the machine
//! bit-exactly, forward playback returns to where it left.

mod common;

use common::{load_program, machine};
use vector06c::machine::Machine;
use vector06c::recorder::Recorder;

/// A busy little program: walks HL over RAM incrementing bytes, so
/// every frame carries plenty of journaled writes.
///
/// ```text
/// 0x0200: LXI H,0x4000
/// 0x0203: INR M
/// 0x0204: INX H
/// 0x0205: MOV A,H
/// 0x0206: CPI 0x50
/// 0x0208: JNZ 0x0203
/// 0x020B: JMP 0x0200
/// ```
const WORKLOAD: [u8; 14] = [
    0x21, 0x00, 0x40, 0x34, 0x23, 0x7C, 0xFE, 0x50, 0xC2, 0x03, 0x02, 0xC3, 0x00, 0x02,
];

fn workload_machine() -> Machine {
    let mut m = machine();
    load_program(&mut m, 0x0200, &WORKLOAD);
    m.cpu.sp = 0x3F00;
    m
}

/// CPU + RAM + latch fingerprint for bit-exact comparison.
fn fingerprint(m: &Machine) -> (String, Vec<u8>, usize, usize, u64) {
    let cpu = format!(
        "{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}{:02x} pc{:04x} sp{:04x} f{:02x} mc{} cc{}",
        m.cpu.a, m.cpu.b, m.cpu.c, m.cpu.d, m.cpu.e, m.cpu.h, m.cpu.l,
        m.cpu.pc, m.cpu.sp, m.cpu.flags_byte(), m.cpu.mc, m.cpu.cc,
    );
    (
        cpu,
        m.memory.ram().to_vec(),
        m.display.raster_line(),
        m.display.raster_pixel(),
        m.display.frame_num(),
    )
}

/// Drive the machine like the worker does: instruction steps feeding
/// the recorder, until `frames` full frames elapsed.
fn run_frames(m: &mut Machine, rec: &mut Recorder, frames: u64) {
    let target = m.display.frame_num() + frames;
    while m.display.frame_num() < target {
        if m.execute_instruction() {
            rec.update(m);
        }
    }
}

#[test]
fn reverse_restores_reset_state() {
    let mut m = workload_machine();
    let mut rec = Recorder::new(&m);
    let initial = fingerprint(&m);

    run_frames(&mut m, &mut rec, 10);
    assert_ne!(fingerprint(&m).1, initial.1, "workload must dirty RAM");

    let played = rec.play_reverse(10, &mut m);
    assert_eq!(played, 10);
    assert_eq!(fingerprint(&m), initial);
}

#[test]
fn reverse_then_forward_is_identity() {
    let mut m = workload_machine();
    let mut rec = Recorder::new(&m);

    run_frames(&mut m, &mut rec, 8);
    let live = fingerprint(&m);

    for n in 1..=8usize {
        assert_eq!(rec.play_reverse(n, &mut m), n);
        assert_eq!(rec.play_forward(n, &mut m), n);
        assert_eq!(fingerprint(&m), live, "reverse {n} / forward {n}");
    }
}

#[test]
fn reverse_from_mid_frame() {
    let mut m = workload_machine();
    let mut rec = Recorder::new(&m);

    run_frames(&mut m, &mut rec, 3);
    // A few hundred more instructions into the fourth frame.
    for _ in 0..300 {
        if m.execute_instruction() {
            rec.update(&m);
        }
    }
    let live = fingerprint(&m);

    // One step back lands on the start of the in-progress frame.
    assert_eq!(rec.play_reverse(1, &mut m), 1);
    assert_eq!(m.display.frame_num(), 3);

    assert_eq!(rec.play_forward(1, &mut m), 1);
    assert_eq!(fingerprint(&m), live);
}

#[test]
fn history_is_bounded_by_ring_depth() {
    let mut m = workload_machine();
    let mut rec = Recorder::new(&m);

    run_frames(&mut m, &mut rec, 5);
    // Only 5 frames of history exist.
    assert_eq!(rec.play_reverse(100, &mut m), 5);
    assert_eq!(m.display.frame_num(), 0);
}

#[test]
fn resume_after_reverse_truncates_future() {
    let mut m = workload_machine();
    let mut rec = Recorder::new(&m);

    run_frames(&mut m, &mut rec, 6);
    rec.play_reverse(3, &mut m);
    assert_eq!(m.display.frame_num(), 3);

    // Executing again rebuilds history from here.
    run_frames(&mut m, &mut rec, 2);
    assert_eq!(m.display.frame_num(), 5);

    // The old frames 3..6 are gone; we can reverse through the new
    // timeline back to reset.
    assert_eq!(rec.play_reverse(100, &mut m), 5);
    assert_eq!(m.display.frame_num(), 0);
}
