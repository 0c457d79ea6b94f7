//! Reverse-step recorder: a fixed ring of per-frame machine snapshots
//! plus the write journal accumulated during each frame.
//!
//! A slot holds the machine state at the *start* of its frame and every
//! RAM write made during that frame (address, pre-image, new value).
//! Reverse playback undoes the current frame's writes newest-first and
//! restores its snapshot; forward playback reapplies a frame's writes
//! and restores the next snapshot. Pixels are not snapshotted — they
//! are a pure function of the restored state and re-rasterize on the
//! next run.

use log::{info, warn};

use crate::machine::cpu::Cpu;
use crate::machine::display::DisplayUpdate;
use crate::machine::io::Io;
use crate::machine::memory::{GlobalAddr, MemoryUpdate};
use crate::machine::Machine;

/// Ring depth: how many frames the past reaches back.
pub const STATES_LEN: usize = 60;
/// Pre-allocated write records per frame slot. A full frame of
/// back-to-back stores stays under this; overflow is the saturation
/// condition, not a reallocation.
pub const FRAME_JOURNAL_CAPACITY: usize = 16 * 1024;

#[derive(Debug, Clone, Copy)]
struct WriteRec {
    global_addr: GlobalAddr,
    before: u8,
    after: u8,
}

#[derive(Clone)]
struct Snapshot {
    cpu: Cpu,
    memory: MemoryUpdate,
    io: Io,
    display: DisplayUpdate,
}

impl Snapshot {
    fn of(machine: &Machine) -> Self {
        Self {
            cpu: machine.cpu.clone(),
            memory: machine.memory.snapshot_update(),
            io: machine.io.clone(),
            display: machine.display.snapshot_update(),
        }
    }

    fn restore(&self, machine: &mut Machine) {
        machine.cpu = self.cpu.clone();
        machine.memory.restore_update(&self.memory);
        machine.io = self.io.clone();
        machine.display.restore_update(&self.display);
    }
}

struct FrameSlot {
    snapshot: Snapshot,
    writes: Vec<WriteRec>,
}

/// Where playback currently sits relative to the live recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayPos {
    Live,
    /// At the snapshot `n` frames behind the newest one.
    AtSnapshot(usize),
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct RecorderInfo {
    /// Frames that can still be stepped back.
    pub frames_back: usize,
    /// Frames that can be stepped forward again.
    pub frames_forward: usize,
    pub saturated: bool,
}

pub struct Recorder {
    states: Vec<FrameSlot>,
    /// Slot of the frame currently being recorded.
    state_idx: usize,
    /// Valid snapshots in the ring.
    state_len: usize,
    frame_num: u64,
    /// Live position is exactly the newest snapshot (no instruction has
    /// run since the last rotation).
    at_boundary: bool,
    pos: PlayPos,
    live_state: Option<Snapshot>,
    saturated: bool,
}

impl Recorder {
    pub fn new(machine: &Machine) -> Self {
        let mut states = Vec::with_capacity(STATES_LEN);
        for _ in 0..STATES_LEN {
            states.push(FrameSlot {
                snapshot: Snapshot::of(machine),
                writes: Vec::with_capacity(FRAME_JOURNAL_CAPACITY),
            });
        }
        let mut r = Self {
            states,
            state_idx: 0,
            state_len: 0,
            frame_num: 0,
            at_boundary: true,
            pos: PlayPos::Live,
            live_state: None,
            saturated: false,
        };
        r.reset(machine);
        r
    }

    /// Restart history from the machine's current state.
    pub fn reset(&mut self, machine: &Machine) {
        self.state_idx = 0;
        self.state_len = 1;
        self.frame_num = machine.display.frame_num();
        self.at_boundary = true;
        self.pos = PlayPos::Live;
        self.live_state = None;
        self.saturated = false;
        self.states[0].snapshot = Snapshot::of(machine);
        self.states[0].writes.clear();
    }

    // ── Recording (worker, per instruction boundary) ──────────

    /// Digest one completed instruction: journal its writes, rotate on
    /// a frame boundary.
    pub fn update(&mut self, machine: &Machine) {
        if self.pos != PlayPos::Live {
            // Execution resumed from a rewound position: the future that
            // was recorded beyond it is no longer this timeline.
            self.resume_from_playback(machine);
        }
        self.at_boundary = false;

        let journal = machine.memory.journal();
        if journal.write_len > 0 {
            let slot = &mut self.states[self.state_idx];
            for i in 0..journal.write_len as usize {
                if slot.writes.len() == FRAME_JOURNAL_CAPACITY {
                    if !self.saturated {
                        warn!("recorder saturated: frame journal exceeded {FRAME_JOURNAL_CAPACITY} writes");
                    }
                    self.saturated = true;
                    break;
                }
                slot.writes.push(WriteRec {
                    global_addr: journal.write_global_addr[i],
                    before: journal.before_write[i],
                    after: journal.write[i],
                });
            }
        }

        if machine.display.frame_num() != self.frame_num {
            if self.saturated {
                // History before the saturated frame cannot be replayed
                // consistently; start over from here.
                info!("recorder ring reset after saturation");
                self.reset(machine);
                return;
            }
            self.frame_num = machine.display.frame_num();
            self.state_idx = (self.state_idx + 1) % STATES_LEN;
            self.state_len = (self.state_len + 1).min(STATES_LEN);
            self.states[self.state_idx].snapshot = Snapshot::of(machine);
            self.states[self.state_idx].writes.clear();
            self.at_boundary = true;
        }
    }

    // ── Playback (worker, machine stopped) ────────────────────

    /// Step `frames` back. Returns how many were actually played.
    pub fn play_reverse(&mut self, frames: usize, machine: &mut Machine) -> usize {
        let mut played = 0;
        for _ in 0..frames {
            match self.pos {
                PlayPos::Live => {
                    self.live_state = Some(Snapshot::of(machine));
                    if self.at_boundary {
                        // Live state equals the newest snapshot; a step
                        // back means undoing the previous frame.
                        if self.state_len < 2 {
                            break;
                        }
                        self.undo_slot(self.back_slot(1), machine);
                        self.pos = PlayPos::AtSnapshot(1);
                    } else {
                        self.undo_slot(self.state_idx, machine);
                        self.pos = PlayPos::AtSnapshot(0);
                    }
                }
                PlayPos::AtSnapshot(n) => {
                    if n + 1 >= self.state_len {
                        break;
                    }
                    self.undo_slot(self.back_slot(n + 1), machine);
                    self.pos = PlayPos::AtSnapshot(n + 1);
                }
            }
            played += 1;
        }
        played
    }

    /// Step `frames` forward again. Returns how many were played.
    pub fn play_forward(&mut self, frames: usize, machine: &mut Machine) -> usize {
        let mut played = 0;
        for _ in 0..frames {
            match self.pos {
                PlayPos::Live => break,
                PlayPos::AtSnapshot(0) => {
                    // Back into the partially recorded live frame.
                    let Some(live) = self.live_state.take() else {
                        self.pos = PlayPos::Live;
                        break;
                    };
                    self.redo_writes(self.state_idx, machine);
                    live.restore(machine);
                    self.pos = PlayPos::Live;
                }
                PlayPos::AtSnapshot(n) => {
                    let slot = self.back_slot(n);
                    self.redo_writes(slot, machine);
                    if n == 1 {
                        self.states[self.state_idx].snapshot.restore(machine);
                        self.pos = if self.at_boundary {
                            // Boundary live state is the newest snapshot
                            // itself; we are home.
                            self.live_state = None;
                            PlayPos::Live
                        } else {
                            PlayPos::AtSnapshot(0)
                        };
                    } else {
                        let next = self.back_slot(n - 1);
                        self.states[next].snapshot.restore(machine);
                        self.pos = PlayPos::AtSnapshot(n - 1);
                    }
                }
            }
            played += 1;
        }
        played
    }

    pub fn info(&self) -> RecorderInfo {
        let (back, forward) = match self.pos {
            PlayPos::Live => {
                let back = if self.at_boundary {
                    self.state_len.saturating_sub(1)
                } else {
                    self.state_len
                };
                (back, 0)
            }
            PlayPos::AtSnapshot(n) => (
                self.state_len.saturating_sub(n + 1),
                n + if self.at_boundary { 0 } else { 1 },
            ),
        };
        RecorderInfo {
            frames_back: back,
            frames_forward: forward,
            saturated: self.saturated,
        }
    }

    // ── Internals ─────────────────────────────────────────────

    fn back_slot(&self, n: usize) -> usize {
        (self.state_idx + STATES_LEN - n) % STATES_LEN
    }

    /// Undo a frame: pre-images newest-first, then its start snapshot.
    fn undo_slot(&self, slot: usize, machine: &mut Machine) {
        for rec in self.states[slot].writes.iter().rev() {
            machine.memory.set_byte_global(rec.global_addr, rec.before);
        }
        self.states[slot].snapshot.restore(machine);
    }

    fn redo_writes(&self, slot: usize, machine: &mut Machine) {
        for rec in self.states[slot].writes.iter() {
            machine.memory.set_byte_global(rec.global_addr, rec.after);
        }
    }

    /// The rewound position becomes the new head of history.
    fn resume_from_playback(&mut self, machine: &Machine) {
        if let PlayPos::AtSnapshot(n) = self.pos {
            let new_idx = self.back_slot(n);
            self.state_len -= n;
            self.state_idx = new_idx;
            self.states[new_idx].writes.clear();
            self.frame_num = machine.display.frame_num();
        }
        self.pos = PlayPos::Live;
        self.live_state = None;
        self.at_boundary = true;
    }
}
