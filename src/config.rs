// Construction-time settings for the emulation core. The launcher (or an
// embedding shell) fills this in; the core never touches a settings file
// on its own.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How the hardware is put together at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Boot ROM image, loaded once at construction.
    pub boot_data_path: PathBuf,
    /// Optional RAM-disk backing file. Loaded at construction, written
    /// back on save.
    pub ram_disk_data_path: Option<PathBuf>,
    /// Wipe the RAM-disk pages on RESTART instead of keeping their
    /// content.
    pub ram_disk_clear_after_restart: bool,
    /// Raster pixel of the first post-vsync line at which the vertical
    /// interrupt asserts. Tunable; 72 matches the reference titles
    /// tried so far.
    pub irq_commit_pixel: u16,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            boot_data_path: PathBuf::new(),
            ram_disk_data_path: None,
            ram_disk_clear_after_restart: true,
            irq_commit_pixel: crate::machine::display::IRQ_COMMIT_PXL,
        }
    }
}

impl HardwareConfig {
    pub fn new(boot_data_path: impl Into<PathBuf>) -> Self {
        Self {
            boot_data_path: boot_data_path.into(),
            ..Self::default()
        }
    }
}
