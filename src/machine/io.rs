//! Port dispatch and the on-board latches: palette index, screen mode,
//! vertical scroll, keyboard matrix, tape, joystick, RAM-disk mapping.
//!
//! Writes that change what the raster shows (palette data, border index,
//! screen mode) do not reach the display immediately: they are queued and
//! become visible `COMMIT_DELAY_PXLS` raster pixels after the `OUT`
//! completes. Pixels produced inside that window still use the old
//! values — the "color pollution" artifact of the real machine.

use std::collections::VecDeque;

use log::debug;

use super::memory::Memory;

/// Raster-pixel latency of palette/border/mode commits.
pub const COMMIT_DELAY_PXLS: u16 = 4;

/// A display-visible port effect, delivered to the raster after the
/// pollution window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortCommit {
    Palette { idx: u8, val: u8 },
    Border { idx: u8 },
    Mode { mode_512: bool },
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    commit: PortCommit,
    delay_pxls: u16,
}

// ── Keyboard matrix ───────────────────────────────────────────

/// 8×8 key matrix plus the three modifier keys. Scan-code translation
/// belongs to the shell; keys arrive here as matrix coordinates.
#[derive(Debug, Clone, Default)]
pub struct Keyboard {
    /// One byte per column; a set bit is a held key.
    rows: [u8; 8],
    /// Bit 0: SS, bit 1: US, bit 2: RUS/LAT.
    modifiers: u8,
}

/// Key ids 0..=63 address the matrix as `column * 8 + row`; 64..=66 are
/// the modifier keys.
pub const KEY_MOD_BASE: u8 = 64;

impl Keyboard {
    pub fn set_key(&mut self, key: u8, pressed: bool) {
        if key >= KEY_MOD_BASE {
            let bit = 1 << (key - KEY_MOD_BASE).min(2);
            if pressed {
                self.modifiers |= bit;
            } else {
                self.modifiers &= !bit;
            }
            return;
        }
        let col = (key >> 3) as usize;
        let bit = 1 << (key & 7);
        if pressed {
            self.rows[col] |= bit;
        } else {
            self.rows[col] &= !bit;
        }
    }

    /// Row readback for the active-low column mask.
    fn read_rows(&self, column_mask: u8) -> u8 {
        let mut rows = 0u8;
        for (col, &r) in self.rows.iter().enumerate() {
            if column_mask & (1 << col) == 0 {
                rows |= r;
            }
        }
        !rows
    }

    fn modifiers(&self) -> u8 {
        self.modifiers
    }
}

// ── I/O unit ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Io {
    /// PPI1 control word, stored for readback only.
    ppi1_control: u8,
    /// PPI1 port C output: bit 0 tape-out, bit 3 RUS/LAT LED.
    port_c: u8,
    /// Palette/border index latch (port 2, low nibble).
    palette_idx: u8,
    /// 512-pixel mode bit (port 2, bit 4).
    mode_512: bool,
    /// Port 3: keyboard column mask, which is also the vertical scroll
    /// register — one physical latch serving both (the idle keyboard
    /// mask 0xFF doubles as "no scroll").
    scroll: u8,

    pub keyboard: Keyboard,
    pub joystick: u8,
    pub tape_in: bool,
    /// Status byte the FDD driver refreshes before reads of port 0x18.
    pub fdd_status: u8,

    commits: VecDeque<Pending>,
}

impl Default for Io {
    fn default() -> Self {
        Self::new()
    }
}

impl Io {
    pub fn new() -> Self {
        Self {
            ppi1_control: 0,
            port_c: 0,
            palette_idx: 0,
            mode_512: false,
            scroll: 0xFF,
            keyboard: Keyboard::default(),
            joystick: 0xFF,
            tape_in: false,
            fdd_status: 0,
            commits: VecDeque::new(),
        }
    }

    pub fn reset(&mut self) {
        let keyboard = std::mem::take(&mut self.keyboard);
        *self = Self::new();
        // Held keys survive a machine reset.
        self.keyboard = keyboard;
    }

    // ── CPU port access ───────────────────────────────────────

    pub fn port_in(&mut self, port: u8, memory: &Memory) -> u8 {
        match port {
            0x00 => self.ppi1_control,
            0x01 => {
                let tape = if self.tape_in { 0x10 } else { 0 };
                (self.keyboard.modifiers() << 5) | tape | (self.port_c & 0x0F)
            }
            0x02 => self.keyboard.read_rows(self.scroll),
            0x06 => self.joystick,
            0x10..=0x17 => memory.mapping((port - 0x10) as usize).data,
            0x18 => self.fdd_status,
            _ => 0xFF,
        }
    }

    /// Any OUT switches the boot-ROM overlay off — that is how the boot
    /// code hands the low addresses over to RAM.
    pub fn port_out(&mut self, port: u8, val: u8, memory: &mut Memory) {
        memory.set_rom_enable(false);

        match port {
            0x00 => self.ppi1_control = val,
            0x01 => self.port_c = val,
            0x02 => {
                self.palette_idx = val & 0x0F;
                let mode_512 = val & 0x10 != 0;
                self.push_commit(PortCommit::Border { idx: self.palette_idx });
                if mode_512 != self.mode_512 {
                    self.mode_512 = mode_512;
                    self.push_commit(PortCommit::Mode { mode_512 });
                }
            }
            0x03 => self.scroll = val,
            0x0C..=0x0F => {
                self.push_commit(PortCommit::Palette {
                    idx: self.palette_idx,
                    val,
                });
            }
            0x10..=0x17 => memory.set_ram_disk_mode_lossy((port - 0x10) as usize, val),
            0x18..=0x1B => {
                // FDD command surface; byte mechanics live in the
                // external controller model.
            }
            _ => debug!("out to unhandled port {port:#04x} = {val:#04x}"),
        }
    }

    // ── Raster-side commit drain ──────────────────────────────

    /// Advance the pollution window by `pixels` and hand every commit
    /// that has left it to `apply`, in write order.
    pub fn advance_commits(&mut self, pixels: u16, mut apply: impl FnMut(PortCommit)) {
        for p in self.commits.iter_mut() {
            p.delay_pxls = p.delay_pxls.saturating_sub(pixels);
        }
        while let Some(p) = self.commits.front().copied() {
            if p.delay_pxls > 0 {
                break;
            }
            self.commits.pop_front();
            apply(p.commit);
        }
    }

    fn push_commit(&mut self, commit: PortCommit) {
        self.commits.push_back(Pending {
            commit,
            delay_pxls: COMMIT_DELAY_PXLS,
        });
    }

    // ── Latch readback (requests, display) ────────────────────

    /// CPU-visible scroll latch; the display samples it per scanline.
    pub fn scroll(&self) -> u8 {
        self.scroll
    }

    pub fn palette_idx(&self) -> u8 {
        self.palette_idx
    }

    pub fn mode_512(&self) -> bool {
        self.mode_512
    }
}
