//! Typed request/reply messages of the control channel. Everything is
//! serde-serializable, so external shells can speak JSON over the same
//! surface (`Hardware::request_json`); a payload that fails to decode
//! becomes an error reply and changes nothing.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::debugger::{Breakpoint, DebuggerStatus, DisasmLine, TraceFilter, Watchpoint};
use crate::machine::fdd::FddInfo;
use crate::machine::memory::{GlobalAddr, RAM_DISK_MAX};
use crate::recorder::RecorderInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    Press,
    Release,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Run,
    Stop,
    Exit,
    Reset,
    Restart,
    IsRunning,
    ExecuteInstr {
        #[serde(default)]
        count: Option<u32>,
    },
    ExecuteFrame,
    SetMem {
        addr: u16,
        data: Vec<u8>,
    },
    GetRegs,
    GetByteRam {
        addr: u16,
    },
    GetWordStack {
        addr: u16,
    },
    GetDisplayData,
    GetMemoryModes,
    LoadFdd {
        drive: usize,
        data: Vec<u8>,
        #[serde(default)]
        path: Option<PathBuf>,
    },
    GetFddImage {
        drive: usize,
    },
    GetFddInfo {
        drive: usize,
    },
    SaveFdd {
        drive: usize,
    },
    KeyHandling {
        key: u8,
        action: KeyAction,
    },
    DebugAttach,
    DebugDetach,
    DebugReset,
    DebugAddBreakpoint {
        breakpoint: Breakpoint,
    },
    DebugDelBreakpoint {
        global_addr: GlobalAddr,
    },
    DebugAddWatchpoint {
        watchpoint: Watchpoint,
    },
    DebugDelWatchpoint {
        global_addr: GlobalAddr,
    },
    DebugGetDisasm {
        addr: u16,
        lines: usize,
        before_addr_lines: usize,
    },
    DebugGetTraceLog {
        offset: usize,
        lines: usize,
        filter: TraceFilter,
    },
    DebugLoadData {
        path: PathBuf,
    },
    DebugSaveData {
        path: PathBuf,
    },
    DebugRecorderReset,
    DebugRecorderPlayReverse {
        frames: usize,
    },
    DebugRecorderPlayForward {
        frames: usize,
    },
    DebugRecorderInfo,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RegFlags {
    pub s: bool,
    pub z: bool,
    pub ac: bool,
    pub p: bool,
    pub c: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Regs {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub pc: u16,
    pub sp: u16,
    pub cc: u64,
    pub flags: RegFlags,
    pub inte: bool,
    pub iff: bool,
    pub hlta: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DisplayData {
    pub raster_line: usize,
    pub raster_pixel: usize,
    pub frame_num: u64,
    pub scroll: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemoryModes {
    pub mappings: [u8; RAM_DISK_MAX],
    pub rom_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "reply", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reply {
    Ok,
    Error { message: String },
    IsRunning { is_running: bool },
    Regs(Regs),
    Byte { data: u8 },
    Word { data: u16 },
    DisplayData(DisplayData),
    MemoryModes(MemoryModes),
    FddImage { data: Vec<u8> },
    FddInfo(FddInfo),
    Disasm { lines: Vec<DisasmLine> },
    TraceLog { lines: Vec<String> },
    DebuggerStatus(DebuggerStatus),
    RecorderInfo(RecorderInfo),
    Played { frames: usize },
}

impl Reply {
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error {
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, Reply::Error { .. })
    }
}

impl From<crate::error::Error> for Reply {
    fn from(e: crate::error::Error) -> Self {
        Reply::error(e.to_string())
    }
}
