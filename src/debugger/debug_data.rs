//! Labels, consts, and comments attached to addresses, plus the JSON
//! debug-data file that persists them together with breakpoint and
//! watchpoint lists.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::machine::memory::Addr;

use super::breakpoints::{Breakpoint, Breakpoints};
use super::watchpoints::{Watchpoint, Watchpoints};

#[derive(Debug, Default)]
pub struct DebugData {
    /// Code labels; an address can carry several names.
    labels: HashMap<Addr, Vec<String>>,
    /// Labels used as constants / data pointers.
    consts: HashMap<Addr, Vec<String>>,
    comments: HashMap<Addr, String>,
}

impl DebugData {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Labels ────────────────────────────────────────────────

    pub fn labels(&self, addr: Addr) -> Option<&[String]> {
        self.labels.get(&addr).map(Vec::as_slice)
    }

    pub fn add_label(&mut self, addr: Addr, label: impl Into<String>) {
        let label = label.into();
        let list = self.labels.entry(addr).or_default();
        if !list.contains(&label) {
            list.push(label);
        }
    }

    pub fn del_label(&mut self, addr: Addr, label: &str) {
        if let Some(list) = self.labels.get_mut(&addr) {
            list.retain(|l| l != label);
            if list.is_empty() {
                self.labels.remove(&addr);
            }
        }
    }

    pub fn rename_label(&mut self, addr: Addr, old: &str, new: impl Into<String>) {
        if let Some(list) = self.labels.get_mut(&addr) {
            if let Some(slot) = list.iter_mut().find(|l| *l == old) {
                *slot = new.into();
            }
        }
    }

    // ── Consts ────────────────────────────────────────────────

    pub fn consts(&self, addr: Addr) -> Option<&[String]> {
        self.consts.get(&addr).map(Vec::as_slice)
    }

    pub fn add_const(&mut self, addr: Addr, name: impl Into<String>) {
        let name = name.into();
        let list = self.consts.entry(addr).or_default();
        if !list.contains(&name) {
            list.push(name);
        }
    }

    pub fn del_const(&mut self, addr: Addr, name: &str) {
        if let Some(list) = self.consts.get_mut(&addr) {
            list.retain(|l| l != name);
            if list.is_empty() {
                self.consts.remove(&addr);
            }
        }
    }

    // ── Comments ──────────────────────────────────────────────

    pub fn comment(&self, addr: Addr) -> Option<&str> {
        self.comments.get(&addr).map(String::as_str)
    }

    pub fn set_comment(&mut self, addr: Addr, comment: impl Into<String>) {
        self.comments.insert(addr, comment.into());
    }

    pub fn del_comment(&mut self, addr: Addr) {
        self.comments.remove(&addr);
    }

    pub fn clear(&mut self) {
        self.labels.clear();
        self.consts.clear();
        self.comments.clear();
    }

    /// Names attached to `addr` for operand annotation: consts first,
    /// then labels.
    pub fn names_for_operand(&self, addr: Addr) -> String {
        let mut names: Vec<&str> = Vec::new();
        if let Some(cs) = self.consts(addr) {
            names.extend(cs.iter().map(String::as_str));
        }
        if let Some(ls) = self.labels(addr) {
            names.extend(ls.iter().map(String::as_str));
        }
        names.join(", ")
    }

    // ── File format ───────────────────────────────────────────

    pub fn load(
        &mut self,
        path: &Path,
        breakpoints: &mut Breakpoints,
        watchpoints: &mut Watchpoints,
    ) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        let file: DebugDataFile = serde_json::from_str(&text)
            .map_err(|e| Error::Debugger(format!("bad debug-data file {}: {e}", path.display())))?;

        self.clear();
        for (addr, names) in file.labels {
            let addr = parse_addr(&addr)?;
            for n in names {
                self.add_label(addr, n);
            }
        }
        for (addr, names) in file.consts {
            let addr = parse_addr(&addr)?;
            for n in names {
                self.add_const(addr, n);
            }
        }
        for (addr, comment) in file.comments {
            self.set_comment(parse_addr(&addr)?, comment);
        }

        breakpoints.clear();
        for bp in file.breakpoints {
            breakpoints.add(bp);
        }
        watchpoints.clear();
        for wp in file.watchpoints {
            watchpoints.add(wp);
        }

        info!("debug data loaded from {}", path.display());
        Ok(())
    }

    pub fn save(
        &self,
        path: &Path,
        breakpoints: &Breakpoints,
        watchpoints: &Watchpoints,
    ) -> Result<()> {
        let file = DebugDataFile {
            labels: to_addr_map(&self.labels),
            consts: to_addr_map(&self.consts),
            comments: self
                .comments
                .iter()
                .map(|(a, c)| (format_addr(*a), c.clone()))
                .collect(),
            breakpoints: breakpoints.iter().cloned().collect(),
            watchpoints: watchpoints.iter().cloned().collect(),
        };
        let text = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::Debugger(format!("debug-data encode: {e}")))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DebugDataFile {
    #[serde(default)]
    labels: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    consts: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    comments: BTreeMap<String, String>,
    #[serde(default)]
    breakpoints: Vec<Breakpoint>,
    #[serde(default)]
    watchpoints: Vec<Watchpoint>,
}

fn format_addr(addr: Addr) -> String {
    format!("0x{addr:04X}")
}

fn parse_addr(s: &str) -> Result<Addr> {
    let hex = s.trim_start_matches("0x").trim_start_matches("0X");
    Addr::from_str_radix(hex, 16)
        .map_err(|_| Error::Debugger(format!("bad address key {s:?} in debug data")))
}

fn to_addr_map(map: &HashMap<Addr, Vec<String>>) -> BTreeMap<String, Vec<String>> {
    map.iter().map(|(a, v)| (format_addr(*a), v.clone())).collect()
}
