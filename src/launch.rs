/// Launch encoder
///
/// Native apps and ROMs launch through `psgm:` URIs; extracted PSP content
/// goes through an external loader that reads its configuration from a
/// fixed-layout binary file written just before the launch URI is issued.
/// That file is the one bit-exact wire artifact in the system.
use std::fs::File;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::category::{CategoryId, Registry, RETROARCH_TITLE_ID};
use crate::error::{Result, ShelfError};
use crate::paths::Paths;
use crate::state::data::{Game, GameKind};

/// Total size of the boot descriptor record
pub const BOOT_RECORD_LEN: usize = 320;
/// Offset where the NUL-terminated content path starts
pub const BOOT_PATH_OFFSET: usize = 64;
/// Magic bytes at offset 0
pub const BOOT_MAGIC: [u8; 3] = [0x41, 0x42, 0x42];

/// Launch mask passed to the OS primitive
pub const LAUNCH_MASK: u32 = 0xFFFFF;
/// Title id of the external loader that consumes the boot descriptor
pub const LOADER_TITLE_ID: &str = "ADRLANCHR";

/// The OS app-launch primitive. Fire-and-forget: the OS gives nothing back.
pub trait AppLauncher: Send + Sync {
    fn launch_by_uri(&self, mask: u32, uri: &str);
}

/// Configurable knobs for an emulated PSP boot.
///
/// Serialized to JSON for profile storage; serialized by hand into the
/// boot descriptor for the loader.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootSettings {
    pub driver: u8,
    pub execute: u8,
    pub ps_button_mode: u8,
    pub suspend_threads: u8,
    pub plugins: u8,
    pub nonpdrm: u8,
    pub high_memory: u8,
    /// Checked against the defaults like every other field, but never
    /// written into the descriptor - the loader picks it up elsewhere.
    pub cpu_speed: u8,
}

impl Default for BootSettings {
    fn default() -> Self {
        BootSettings {
            driver: 0,
            execute: 0,
            ps_button_mode: 0,
            suspend_threads: 1,
            plugins: 1,
            nonpdrm: 0,
            high_memory: 0,
            cpu_speed: 0,
        }
    }
}

impl BootSettings {
    /// Convert to JSON string for profile storage
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Serialize the fixed-layout boot descriptor.
///
/// Record length is constant regardless of path length; the path field is
/// bounded by the record end and NUL-padded. The defaults flag at offset 12
/// is 1 only when every configurable field matches the compiled-in
/// defaults.
pub fn encode_boot_descriptor(settings: &BootSettings, rom_path: &str) -> [u8; BOOT_RECORD_LEN] {
    let mut record = [0u8; BOOT_RECORD_LEN];
    record[0..3].copy_from_slice(&BOOT_MAGIC);
    record[4] = settings.driver;
    record[8] = settings.execute;
    record[12] = if settings.is_default() { 1 } else { 0 };
    record[20] = settings.ps_button_mode;
    record[24] = settings.suspend_threads;
    record[32] = settings.plugins;
    record[36] = settings.nonpdrm;
    record[40] = settings.high_memory;

    let path = rom_path.as_bytes();
    let len = path.len().min(BOOT_RECORD_LEN - BOOT_PATH_OFFSET - 1);
    record[BOOT_PATH_OFFSET..BOOT_PATH_OFFSET + len].copy_from_slice(&path[..len]);

    record
}

/// Launch one catalog entry.
///
/// Failures of the OS primitive itself are not observable; an `Err` here
/// only ever means the boot descriptor could not be written, which is
/// terminal to this launch attempt and nothing else.
pub fn launch(
    registry: &Registry,
    paths: &Paths,
    os: &dyn AppLauncher,
    game: &Game,
    settings: &BootSettings,
) -> Result<()> {
    if game.kind == GameKind::Bubble {
        let uri = format!("psgm:play?titleid={}", game.id);
        os.launch_by_uri(LAUNCH_MASK, &uri);
        return Ok(());
    }

    // Extracted PS1 content still boots through the RetroArch core, not the
    // loader, as long as the category is wired to it.
    let ps1_via_retroarch = registry
        .by_label(&game.category)
        .map(|info| info.id == CategoryId::Ps1 && info.launcher_title_id == RETROARCH_TITLE_ID)
        .unwrap_or(false);

    if game.kind == GameKind::Rom || ps1_via_retroarch {
        return launch_rom(registry, os, game);
    }

    let record = encode_boot_descriptor(settings, &game.rom_path);
    if let Some(parent) = paths.boot_bin.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(&paths.boot_bin)?;
    file.write_all(&record)?;

    let uri = format!("psgm:play?titleid={}", LOADER_TITLE_ID);
    os.launch_by_uri(LAUNCH_MASK, &uri);
    Ok(())
}

/// ROM launch: route through the category's designated launcher.
fn launch_rom(registry: &Registry, os: &dyn AppLauncher, game: &Game) -> Result<()> {
    let info = registry
        .by_label(&game.category)
        .ok_or_else(|| ShelfError::UnknownCategory(game.category.clone()))?;

    let uri = if info.launcher_title_id == RETROARCH_TITLE_ID || info.id == CategoryId::Ps1 {
        // Two-parameter form: the frontend needs to know which core to spin up.
        format!(
            "psgm:play?titleid={}&param={}&param2={}",
            RETROARCH_TITLE_ID, info.core, game.rom_path
        )
    } else {
        // Standalone emulators take the content path directly.
        format!(
            "psgm:play?titleid={}&param={}",
            info.launcher_title_id, game.rom_path
        )
    };
    os.launch_by_uri(LAUNCH_MASK, &uri);
    Ok(())
}
