//! Raster-timed display unit.
//!
//! The raster advances four pixels per CPU clock, sixteen per machine
//! cycle, so the picture is produced in lock-step with instruction
//! execution — mid-scanline palette tricks and the pollution artifact
//! come out exactly as on hardware. A frame is 312 scanlines of 192 CPU
//! cycles each; the vertical interrupt is raised at a configurable pixel
//! of the first post-vsync line.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use super::io::{Io, PortCommit};
use super::memory::Memory;

pub const FRAME_W: usize = 768;
pub const FRAME_H: usize = 312;
pub const FRAME_LEN: usize = FRAME_W * FRAME_H;

pub const SCAN_VSYNC: usize = 22;
pub const SCAN_VBLANK_TOP: usize = 18;
pub const SCAN_VBLANK_BOTTOM: usize = 16;
pub const SCAN_ACTIVE_AREA_TOP: usize = SCAN_VSYNC + SCAN_VBLANK_TOP;
pub const ACTIVE_AREA_W: usize = 512;
pub const ACTIVE_AREA_H: usize = 256;
/// First active-area pixel of a scanline.
pub const BORDER_LEFT: usize = 137;
pub const BORDER_RIGHT: usize = BORDER_LEFT + ACTIVE_AREA_W;

/// Pixels rasterized per CPU clock cycle.
pub const PXLS_PER_CC: usize = 4;
/// Pixels rasterized per (four t-state) machine cycle.
pub const RASTERIZED_PXLS_MAX: usize = 16;

/// CPU cycles per scanline and per full frame.
pub const SCANLINE_CCS: usize = FRAME_W / PXLS_PER_CC;
pub const FRAME_CCS: usize = SCANLINE_CCS * FRAME_H;

/// Default raster pixel of line `SCAN_VSYNC` at which IRQ asserts.
pub const IRQ_COMMIT_PXL: u16 = 72;

pub const FULL_PALETTE_LEN: usize = 256;

pub type FrameBuffer = Vec<u32>;

/// Vector color byte to ARGB8888: red bits 0-2, green bits 3-5, blue
/// bits 6-7.
pub fn vector_color_to_argb(v: u8) -> u32 {
    let r = ((v & 0x07) as u32 * 255) / 7;
    let g = (((v >> 3) & 0x07) as u32 * 255) / 7;
    let b = (((v >> 6) & 0x03) as u32 * 255) / 3;
    0xFF00_0000 | r << 16 | g << 8 | b
}

// ── Cross-thread frame hand-off ───────────────────────────────

struct ExchangeInner {
    buffer: FrameBuffer,
    frame_num: u64,
}

/// The only path pixels take out of the emulation worker. The worker
/// copies the finished frame in under the lock at VSYNC; readers copy it
/// out under the same lock.
pub struct FrameExchange {
    inner: Mutex<ExchangeInner>,
    fresh: Condvar,
}

impl FrameExchange {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(ExchangeInner {
                buffer: vec![0; FRAME_LEN],
                frame_num: 0,
            }),
            fresh: Condvar::new(),
        })
    }

    fn publish(&self, buffer: &[u32], frame_num: u64) {
        let mut inner = self.inner.lock().expect("frame exchange poisoned");
        inner.buffer.copy_from_slice(buffer);
        inner.frame_num = frame_num;
        self.fresh.notify_all();
    }

    /// Copy the latest completed frame into `out`. With `vsync` the call
    /// waits (bounded) for a frame newer than `last_seen` first; without
    /// it the current back buffer is taken as-is. Returns the frame
    /// number copied.
    pub fn read_into(&self, out: &mut FrameBuffer, vsync: bool, last_seen: u64) -> u64 {
        let mut inner = self.inner.lock().expect("frame exchange poisoned");
        if vsync {
            // Bounded wait: a stopped machine produces no frames and the
            // renderer must not hang on it.
            let deadline = Duration::from_millis(100);
            while inner.frame_num <= last_seen {
                let (guard, timeout) = self
                    .fresh
                    .wait_timeout(inner, deadline)
                    .expect("frame exchange poisoned");
                inner = guard;
                if timeout.timed_out() {
                    break;
                }
            }
        }
        out.resize(FRAME_LEN, 0);
        out.copy_from_slice(&inner.buffer);
        inner.frame_num
    }
}

// ── Recorder snapshot ─────────────────────────────────────────

/// Display state the recorder snapshots per frame (pixels excluded —
/// they are reproduced by re-rasterization).
#[derive(Debug, Clone)]
pub struct DisplayUpdate {
    pub frame_num: u64,
    pub palette: [u32; FULL_PALETTE_LEN],
    pub border_idx: u8,
    pub mode_512: bool,
    pub scroll_latched: u8,
    pub line: usize,
    pub pixel: usize,
    pub irq: bool,
}

// ── Display ───────────────────────────────────────────────────

pub struct Display {
    buffer: FrameBuffer,
    line: usize,
    pixel: usize,

    palette: [u32; FULL_PALETTE_LEN],
    /// Raster-visible copies of the I/O latches; they lag the CPU-side
    /// latches by the pollution window.
    border_idx: u8,
    mode_512: bool,
    /// Scroll sampled once per scanline.
    scroll_latched: u8,

    frame_num: u64,
    /// One-shot interrupt pulse for the current machine cycle.
    irq: bool,
    irq_commit_pxl: usize,

    exchange: Arc<FrameExchange>,
}

impl Display {
    pub fn new(irq_commit_pxl: u16) -> Self {
        let mut palette = [0u32; FULL_PALETTE_LEN];
        for (i, p) in palette.iter_mut().enumerate() {
            *p = vector_color_to_argb(i as u8);
        }
        Self {
            buffer: vec![0; FRAME_LEN],
            line: 0,
            pixel: 0,
            palette,
            border_idx: 0,
            mode_512: false,
            scroll_latched: 0xFF,
            frame_num: 0,
            irq: false,
            irq_commit_pxl: irq_commit_pxl as usize,
            exchange: FrameExchange::new(),
        }
    }

    pub fn reset(&mut self) {
        let exchange = Arc::clone(&self.exchange);
        *self = Self::new(self.irq_commit_pxl as u16);
        self.exchange = exchange;
    }

    pub fn exchange(&self) -> Arc<FrameExchange> {
        Arc::clone(&self.exchange)
    }

    // ── Rasterization ─────────────────────────────────────────

    /// Advance the raster by `pixels` (a multiple of `PXLS_PER_CC`),
    /// draining I/O commits as their pollution window expires.
    pub fn rasterize(&mut self, memory: &Memory, io: &mut Io, pixels: usize) {
        for _ in 0..pixels / PXLS_PER_CC {
            if self.pixel == 0 {
                self.scroll_latched = io.scroll();
            }
            if self.line == SCAN_VSYNC
                && (self.pixel..self.pixel + PXLS_PER_CC).contains(&self.irq_commit_pxl)
            {
                self.irq = true;
            }

            self.draw_chunk(memory);

            // Commits become raster-visible only now: the four pixels
            // just drawn still used the old latches.
            let palette = &mut self.palette;
            let border_idx = &mut self.border_idx;
            let mode_512 = &mut self.mode_512;
            io.advance_commits(PXLS_PER_CC as u16, |commit| match commit {
                PortCommit::Palette { idx, val } => {
                    palette[idx as usize] = vector_color_to_argb(val)
                }
                PortCommit::Border { idx } => *border_idx = idx,
                PortCommit::Mode { mode_512: m } => *mode_512 = m,
            });

            self.pixel += PXLS_PER_CC;
            if self.pixel == FRAME_W {
                self.pixel = 0;
                self.line += 1;
                if self.line == FRAME_H {
                    self.line = 0;
                    self.frame_num += 1;
                    self.exchange.publish(&self.buffer, self.frame_num);
                }
            }
        }
    }

    fn draw_chunk(&mut self, memory: &Memory) {
        let row = self.line * FRAME_W;
        let active_row = (SCAN_ACTIVE_AREA_TOP..SCAN_ACTIVE_AREA_TOP + ACTIVE_AREA_H)
            .contains(&self.line);

        for i in 0..PXLS_PER_CC {
            let px = self.pixel + i;
            let color = if active_row && (BORDER_LEFT..BORDER_RIGHT).contains(&px) {
                let idx = self.active_color_idx(memory, px - BORDER_LEFT);
                self.palette[idx as usize]
            } else {
                self.palette[self.border_idx as usize]
            };
            self.buffer[row + px] = color;
        }
    }

    /// Color index for active-area pixel `ax` (0..512) of the current
    /// line. The screen is four 8 KB planes at 0x8000/0xA000/0xC000/
    /// 0xE000, column-major, 32 bytes per plane per line. 256-pixel
    /// mode combines one bit of each plane and doubles each pixel;
    /// 512-pixel mode pairs the planes — even pixels take 8/A as index
    /// bits 3:2, odd pixels take C/E as bits 1:0.
    fn active_color_idx(&self, memory: &Memory, ax: usize) -> u8 {
        let y = self.line - SCAN_ACTIVE_AREA_TOP;
        let src_y = (y + self.scroll_latched as usize + 1) & 0xFF;

        let k = ax >> 1;
        let byte_col = k >> 3;
        let bit = 7 - (k & 7);
        let offset = ((byte_col << 8) | (0xFF - src_y)) as u16;
        let planes = memory.get_screen_bytes(offset);

        let b8 = (planes >> 24 >> bit) as u8 & 1;
        let ba = (planes >> 16 >> bit) as u8 & 1;
        let bc = (planes >> 8 >> bit) as u8 & 1;
        let be = (planes >> bit) as u8 & 1;

        if self.mode_512 {
            if ax & 1 == 0 {
                b8 << 3 | ba << 2
            } else {
                bc << 1 | be
            }
        } else {
            b8 << 3 | ba << 2 | bc << 1 | be
        }
    }

    // ── State access ──────────────────────────────────────────

    /// One-shot IRQ pulse; consumed by the coordinator each machine
    /// cycle.
    pub fn take_irq(&mut self) -> bool {
        std::mem::take(&mut self.irq)
    }

    pub fn frame_num(&self) -> u64 {
        self.frame_num
    }

    pub fn raster_line(&self) -> usize {
        self.line
    }

    pub fn raster_pixel(&self) -> usize {
        self.pixel
    }

    pub fn scroll_latched(&self) -> u8 {
        self.scroll_latched
    }

    pub fn mode_512(&self) -> bool {
        self.mode_512
    }

    pub fn border_idx(&self) -> u8 {
        self.border_idx
    }

    pub fn palette(&self) -> &[u32; FULL_PALETTE_LEN] {
        &self.palette
    }

    /// The in-progress raster buffer (tests, memory viewers).
    pub fn buffer(&self) -> &[u32] {
        &self.buffer
    }

    // ── Recorder snapshot ─────────────────────────────────────

    pub fn snapshot_update(&self) -> DisplayUpdate {
        DisplayUpdate {
            frame_num: self.frame_num,
            palette: self.palette,
            border_idx: self.border_idx,
            mode_512: self.mode_512,
            scroll_latched: self.scroll_latched,
            line: self.line,
            pixel: self.pixel,
            irq: self.irq,
        }
    }

    pub fn restore_update(&mut self, update: &DisplayUpdate) {
        self.frame_num = update.frame_num;
        self.palette = update.palette;
        self.border_idx = update.border_idx;
        self.mode_512 = update.mode_512;
        self.scroll_latched = update.scroll_latched;
        self.line = update.line;
        self.pixel = update.pixel;
        self.irq = update.irq;
    }
}
