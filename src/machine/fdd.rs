//! Floppy-drive image container. Byte-level controller mechanics live in
//! the external shell; the core keeps the mounted images, their
//! track/side geometry, and the dirty flag used for save-on-exit.

use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Error, Result};

pub const DRIVES_MAX: usize = 4;
pub const FDD_SIDES: usize = 2;
pub const FDD_TRACKS: usize = 82;
pub const FDD_SECTORS_PER_TRACK: usize = 5;
pub const FDD_SECTOR_LEN: usize = 1024;
/// Standard image size: 839 680 bytes.
pub const FDD_SIZE_MAX: usize = FDD_SIDES * FDD_TRACKS * FDD_SECTORS_PER_TRACK * FDD_SECTOR_LEN;

#[derive(Debug, Default)]
struct Drive {
    data: Vec<u8>,
    path: Option<PathBuf>,
    updated: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FddInfo {
    pub mounted: bool,
    pub updated: bool,
    pub path: Option<PathBuf>,
    pub len: usize,
}

#[derive(Debug, Default)]
pub struct Fdd {
    drives: [Drive; DRIVES_MAX],
}

impl Fdd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&mut self, drive_idx: usize, data: Vec<u8>, path: Option<PathBuf>) -> Result<()> {
        let drive = self
            .drives
            .get_mut(drive_idx)
            .ok_or_else(|| Error::request(format!("drive index {drive_idx} out of range")))?;
        if data.len() > FDD_SIZE_MAX {
            return Err(Error::request(format!(
                "FDD image too large: {} bytes, max {FDD_SIZE_MAX}",
                data.len(),
            )));
        }
        info!(
            "fdd {drive_idx}: mounted {} bytes{}",
            data.len(),
            path.as_deref().map(|p| format!(" from {}", p.display())).unwrap_or_default(),
        );
        drive.data = data;
        drive.path = path;
        drive.updated = false;
        Ok(())
    }

    pub fn image(&self, drive_idx: usize) -> Option<&[u8]> {
        self.drives
            .get(drive_idx)
            .filter(|d| !d.data.is_empty())
            .map(|d| d.data.as_slice())
    }

    pub fn info(&self, drive_idx: usize) -> Result<FddInfo> {
        let drive = self
            .drives
            .get(drive_idx)
            .ok_or_else(|| Error::request(format!("drive index {drive_idx} out of range")))?;
        Ok(FddInfo {
            mounted: !drive.data.is_empty(),
            updated: drive.updated,
            path: drive.path.clone(),
            len: drive.data.len(),
        })
    }

    /// Mark an image as modified by the controller shell.
    pub fn set_updated(&mut self, drive_idx: usize) {
        if let Some(d) = self.drives.get_mut(drive_idx) {
            d.updated = true;
        }
    }

    /// One status bit per mounted drive, surfaced on the FDD status port.
    pub fn status_byte(&self) -> u8 {
        self.drives
            .iter()
            .enumerate()
            .filter(|(_, d)| !d.data.is_empty())
            .fold(0u8, |acc, (i, _)| acc | 1 << i)
    }

    /// Write a dirty image back to its file (user save).
    pub fn save(&mut self, drive_idx: usize, path_override: Option<&Path>) -> Result<()> {
        let drive = self
            .drives
            .get_mut(drive_idx)
            .ok_or_else(|| Error::request(format!("drive index {drive_idx} out of range")))?;
        let path = path_override
            .map(Path::to_path_buf)
            .or_else(|| drive.path.clone())
            .ok_or_else(|| Error::request(format!("drive {drive_idx} has no backing path")))?;
        std::fs::write(&path, &drive.data)?;
        drive.path = Some(path);
        drive.updated = false;
        Ok(())
    }
}
