//! Hardware coordinator. One worker thread owns the machine, the
//! debugger, and the recorder, and is the only code that touches them;
//! external callers post typed requests over a bounded channel and
//! block on the typed reply. While RUN, the worker interleaves one
//! machine cycle of emulation with a non-blocking drain of the request
//! queue, so control latency is bounded by a single machine cycle.

pub mod request;

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use log::{info, warn};

use crate::config::HardwareConfig;
use crate::debugger::Debugger;
use crate::error::{Error, Result};
use crate::machine::display::{FrameBuffer, FrameExchange, FRAME_CCS};
use crate::machine::memory::AddrSpace;
use crate::machine::Machine;
use crate::recorder::Recorder;

pub use request::{
    DisplayData, KeyAction, MemoryModes, RegFlags, Regs, Reply, Request,
};

const REQUEST_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Run,
    Stop,
    Exit,
}

// ── Handle ────────────────────────────────────────────────────

/// Client-side handle: the request channel plus the framebuffer
/// hand-off. Dropping it shuts the worker down.
pub struct Hardware {
    req_tx: Sender<Request>,
    reply_rx: Receiver<Reply>,
    /// Pairs each request with its reply when several threads submit.
    req_lock: Mutex<()>,
    exchange: Arc<FrameExchange>,
    gpu_buffer: FrameBuffer,
    last_frame_seen: u64,
    worker: Option<JoinHandle<()>>,
}

impl Hardware {
    pub fn new(config: HardwareConfig) -> Result<Self> {
        let boot_data = std::fs::read(&config.boot_data_path).map_err(|e| {
            Error::config(format!(
                "cannot read boot data {}: {e}",
                config.boot_data_path.display(),
            ))
        })?;
        let mut machine = Machine::new(&config, &boot_data)?;

        if let Some(path) = &config.ram_disk_data_path {
            match std::fs::read(path) {
                Ok(data) => machine.memory.load_ram_disk(&data),
                Err(e) => warn!("ram-disk data {} not loaded: {e}", path.display()),
            }
        }

        let exchange = machine.display.exchange();
        let (req_tx, req_rx) = bounded::<Request>(REQUEST_QUEUE_DEPTH);
        let (reply_tx, reply_rx) = bounded::<Reply>(REQUEST_QUEUE_DEPTH);

        let worker = thread::Builder::new()
            .name("hardware".into())
            .spawn(move || {
                Worker::new(machine, config, req_rx, reply_tx).run();
            })
            .map_err(|e| Error::config(format!("cannot spawn hardware worker: {e}")))?;

        Ok(Self {
            req_tx,
            reply_rx,
            req_lock: Mutex::new(()),
            exchange,
            gpu_buffer: Vec::new(),
            last_frame_seen: 0,
            worker: Some(worker),
        })
    }

    /// Post a request and block for its reply.
    pub fn request(&self, req: Request) -> Reply {
        let _guard = self.req_lock.lock().expect("request lock poisoned");
        if self.req_tx.send(req).is_err() {
            return Reply::error("hardware worker is gone");
        }
        self.reply_rx
            .recv()
            .unwrap_or_else(|_| Reply::error("hardware worker is gone"))
    }

    /// JSON entry point for external shells. An unknown operation or a
    /// malformed payload is rejected without touching the machine.
    pub fn request_json(&self, json: &serde_json::Value) -> Reply {
        match serde_json::from_value::<Request>(json.clone()) {
            Ok(req) => self.request(req),
            Err(e) => Reply::error(format!("bad request: {e}")),
        }
    }

    /// The cross-thread pixel path. With `vsync` the call waits
    /// (bounded) for a frame newer than the last one seen; the returned
    /// buffer stays valid until the next call.
    pub fn get_frame(&mut self, vsync: bool) -> &FrameBuffer {
        self.last_frame_seen = self
            .exchange
            .read_into(&mut self.gpu_buffer, vsync, self.last_frame_seen);
        &self.gpu_buffer
    }
}

impl Drop for Hardware {
    fn drop(&mut self) {
        let _ = self.req_tx.send(Request::Exit);
        let _ = self.reply_rx.recv();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

// ── Worker ────────────────────────────────────────────────────

struct Worker {
    machine: Machine,
    debugger: Debugger,
    recorder: Recorder,
    status: Status,
    config: HardwareConfig,
    req_rx: Receiver<Request>,
    reply_tx: Sender<Reply>,
}

impl Worker {
    fn new(
        machine: Machine,
        config: HardwareConfig,
        req_rx: Receiver<Request>,
        reply_tx: Sender<Reply>,
    ) -> Self {
        let recorder = Recorder::new(&machine);
        Self {
            machine,
            debugger: Debugger::new(),
            recorder,
            status: Status::Stop,
            config,
            req_rx,
            reply_tx,
        }
    }

    fn run(mut self) {
        info!("hardware worker started");
        loop {
            match self.status {
                Status::Exit => break,
                Status::Run => {
                    if self.machine.execute_machine_cycle() {
                        self.after_instruction();
                        if self.debugger.check_break(self.machine.pc_global()) {
                            info!(
                                "stopped by debugger at pc {:#06x}",
                                self.machine.cpu.pc,
                            );
                            self.status = Status::Stop;
                        }
                    }
                    self.drain_requests(false);
                }
                Status::Stop => self.drain_requests(true),
            }
        }
        self.save_ram_disk();
        info!("hardware worker exiting");
    }

    /// Instruction boundary: hand the journal to the debugger and the
    /// recorder.
    fn after_instruction(&mut self) {
        self.debugger
            .on_instruction(self.machine.memory.journal(), self.machine.cpu.cc);
        self.recorder.update(&self.machine);
    }

    fn drain_requests(&mut self, blocking: bool) {
        if blocking {
            match self.req_rx.recv() {
                Ok(req) => self.handle(req),
                Err(_) => {
                    self.status = Status::Exit;
                    return;
                }
            }
        }
        loop {
            match self.req_rx.try_recv() {
                Ok(req) => self.handle(req),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.status = Status::Exit;
                    break;
                }
            }
        }
    }

    fn handle(&mut self, req: Request) {
        let reply = self.dispatch(req);
        let _ = self.reply_tx.send(reply);
    }

    /// A mutating request arriving while RUN stops the machine first.
    fn implicit_stop(&mut self, what: &str) {
        if self.status == Status::Run {
            info!("{what} while RUN: stopping first");
            self.status = Status::Stop;
        }
    }

    fn require_stopped(&self, what: &str) -> std::result::Result<(), Reply> {
        if self.status == Status::Run {
            Err(Reply::error(format!("{what} requires STOP status")))
        } else {
            Ok(())
        }
    }

    fn dispatch(&mut self, req: Request) -> Reply {
        match req {
            Request::Run => {
                if self.status != Status::Run {
                    info!("status: RUN");
                }
                self.status = Status::Run;
                Reply::Ok
            }
            Request::Stop => {
                if self.status != Status::Stop {
                    info!("status: STOP");
                }
                self.status = Status::Stop;
                Reply::Ok
            }
            Request::Exit => {
                info!("status: EXIT");
                self.status = Status::Exit;
                Reply::Ok
            }
            Request::IsRunning => Reply::IsRunning {
                is_running: self.status == Status::Run,
            },

            Request::Reset => {
                self.implicit_stop("RESET");
                self.machine.reset();
                self.recorder.reset(&self.machine);
                Reply::Ok
            }
            Request::Restart => {
                self.implicit_stop("RESTART");
                self.machine
                    .restart(self.config.ram_disk_clear_after_restart);
                self.recorder.reset(&self.machine);
                Reply::Ok
            }

            Request::ExecuteInstr { count } => {
                if let Err(e) = self.require_stopped("EXECUTE_INSTR") {
                    return e;
                }
                let count = count.unwrap_or(1);
                for _ in 0..count {
                    if self.machine.execute_instruction() {
                        self.after_instruction();
                    }
                }
                Reply::Ok
            }
            Request::ExecuteFrame => {
                if let Err(e) = self.require_stopped("EXECUTE_FRAME") {
                    return e;
                }
                let start = self.machine.display.frame_num();
                // Bounded: two frames of cycles covers any instruction
                // straddling the wrap.
                let mut budget = 2 * FRAME_CCS;
                while self.machine.display.frame_num() == start && budget > 0 {
                    if self.machine.execute_machine_cycle() {
                        self.after_instruction();
                    }
                    budget -= 1;
                }
                // Land on an instruction boundary past the wrap.
                while !self.machine.cpu.is_instruction_done() {
                    if self.machine.execute_machine_cycle() {
                        self.after_instruction();
                    }
                }
                Reply::Ok
            }

            Request::SetMem { addr, data } => {
                self.implicit_stop("SET_MEM");
                self.machine.memory.set_ram(addr, &data);
                Reply::Ok
            }
            Request::GetRegs => {
                let cpu = &self.machine.cpu;
                Reply::Regs(Regs {
                    a: cpu.a,
                    b: cpu.b,
                    c: cpu.c,
                    d: cpu.d,
                    e: cpu.e,
                    h: cpu.h,
                    l: cpu.l,
                    pc: cpu.pc,
                    sp: cpu.sp,
                    cc: cpu.cc,
                    flags: RegFlags {
                        s: cpu.flag_s,
                        z: cpu.flag_z,
                        ac: cpu.flag_ac,
                        p: cpu.flag_p,
                        c: cpu.flag_c,
                    },
                    inte: cpu.inte,
                    iff: cpu.iff,
                    hlta: cpu.hlta,
                })
            }
            Request::GetByteRam { addr } => Reply::Byte {
                data: self.machine.memory.get_byte(addr, AddrSpace::Ram),
            },
            Request::GetWordStack { addr } => {
                let lo = self.machine.memory.get_byte(addr, AddrSpace::Stack);
                let hi = self
                    .machine
                    .memory
                    .get_byte(addr.wrapping_add(1), AddrSpace::Stack);
                Reply::Word {
                    data: (hi as u16) << 8 | lo as u16,
                }
            }
            Request::GetDisplayData => Reply::DisplayData(DisplayData {
                raster_line: self.machine.display.raster_line(),
                raster_pixel: self.machine.display.raster_pixel(),
                frame_num: self.machine.display.frame_num(),
                scroll: self.machine.display.scroll_latched(),
            }),
            Request::GetMemoryModes => {
                let mut mappings = [0u8; crate::machine::memory::RAM_DISK_MAX];
                for (i, m) in mappings.iter_mut().enumerate() {
                    *m = self.machine.memory.mapping(i).data;
                }
                Reply::MemoryModes(MemoryModes {
                    mappings,
                    rom_enabled: self.machine.memory.is_rom_enabled(),
                })
            }

            Request::LoadFdd { drive, data, path } => {
                self.implicit_stop("LOAD_FDD");
                match self.machine.fdd.mount(drive, data, path) {
                    Ok(()) => {
                        self.machine.io.fdd_status = self.machine.fdd.status_byte();
                        Reply::Ok
                    }
                    Err(e) => e.into(),
                }
            }
            Request::GetFddImage { drive } => match self.machine.fdd.image(drive) {
                Some(data) => Reply::FddImage {
                    data: data.to_vec(),
                },
                None => Reply::error(format!("drive {drive} has no image")),
            },
            Request::GetFddInfo { drive } => match self.machine.fdd.info(drive) {
                Ok(info) => Reply::FddInfo(info),
                Err(e) => e.into(),
            },
            Request::SaveFdd { drive } => match self.machine.fdd.save(drive, None) {
                Ok(()) => Reply::Ok,
                Err(e) => e.into(),
            },

            Request::KeyHandling { key, action } => {
                self.machine
                    .io
                    .keyboard
                    .set_key(key, action == KeyAction::Press);
                Reply::Ok
            }

            Request::DebugAttach => {
                self.debugger.attach();
                Reply::DebuggerStatus(self.debugger.status())
            }
            Request::DebugDetach => {
                self.debugger.detach();
                Reply::DebuggerStatus(self.debugger.status())
            }
            Request::DebugReset => {
                self.debugger.reset();
                Reply::Ok
            }
            Request::DebugAddBreakpoint { breakpoint } => {
                self.debugger.breakpoints.add(breakpoint);
                Reply::Ok
            }
            Request::DebugDelBreakpoint { global_addr } => {
                self.debugger.breakpoints.del(global_addr);
                Reply::Ok
            }
            Request::DebugAddWatchpoint { watchpoint } => {
                self.debugger.watchpoints.add(watchpoint);
                Reply::Ok
            }
            Request::DebugDelWatchpoint { global_addr } => {
                self.debugger.watchpoints.del(global_addr);
                Reply::Ok
            }
            Request::DebugGetDisasm {
                addr,
                lines,
                before_addr_lines,
            } => Reply::Disasm {
                lines: self.debugger.get_disasm(
                    &self.machine.memory,
                    addr,
                    lines,
                    before_addr_lines,
                ),
            },
            Request::DebugGetTraceLog {
                offset,
                lines,
                filter,
            } => Reply::TraceLog {
                lines: self.debugger.get_trace_log(offset, lines, filter),
            },
            Request::DebugLoadData { path } => {
                let Worker { debugger, .. } = self;
                match debugger.debug_data.load(
                    &path,
                    &mut debugger.breakpoints,
                    &mut debugger.watchpoints,
                ) {
                    Ok(()) => Reply::Ok,
                    Err(e) => e.into(),
                }
            }
            Request::DebugSaveData { path } => {
                match self.debugger.debug_data.save(
                    &path,
                    &self.debugger.breakpoints,
                    &self.debugger.watchpoints,
                ) {
                    Ok(()) => Reply::Ok,
                    Err(e) => e.into(),
                }
            }

            Request::DebugRecorderReset => {
                self.recorder.reset(&self.machine);
                Reply::Ok
            }
            Request::DebugRecorderPlayReverse { frames } => {
                if let Err(e) = self.require_stopped("DEBUG_RECORDER_PLAY_REVERSE") {
                    return e;
                }
                let played = self.recorder.play_reverse(frames, &mut self.machine);
                Reply::Played { frames: played }
            }
            Request::DebugRecorderPlayForward { frames } => {
                if let Err(e) = self.require_stopped("DEBUG_RECORDER_PLAY_FORWARD") {
                    return e;
                }
                let played = self.recorder.play_forward(frames, &mut self.machine);
                Reply::Played { frames: played }
            }
            Request::DebugRecorderInfo => Reply::RecorderInfo(self.recorder.info()),
        }
    }

    /// Persist RAM-disk content on shutdown when a backing file is
    /// configured.
    fn save_ram_disk(&self) {
        let Some(path) = &self.config.ram_disk_data_path else {
            return;
        };
        if let Err(e) = std::fs::write(path, self.machine.memory.ram_disk_bytes()) {
            warn!("ram-disk data not saved to {}: {e}", path.display());
        } else {
            info!("ram-disk data saved to {}", path.display());
        }
    }
}
