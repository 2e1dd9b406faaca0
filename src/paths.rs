/// Filesystem layout for the launcher.
///
/// Every component takes a `&Paths` instead of reaching for globals, so the
/// whole library can be pointed at a scratch directory in tests or at the
/// real device layout on a console.
use std::path::{Path, PathBuf};

/// All well-known paths used by the library core.
#[derive(Debug, Clone)]
pub struct Paths {
    /// SQLite game cache file
    pub cache_db: PathBuf,
    /// Per-game staging area for extracted param.sfo / icon0.png pairs
    pub staging_dir: PathBuf,
    /// Folder holding PSP ISO/CSO images
    pub iso_dir: PathBuf,
    /// Folder holding PSP EBOOT packages
    pub eboot_dir: PathBuf,
    /// Boot descriptor consumed by the external loader
    pub boot_bin: PathBuf,
    /// Root under which each ROM category keeps its own folder
    pub roms_root: PathBuf,
    /// System app metadata root (icon0.png / pic0.png per installed title)
    pub appmeta_dir: PathBuf,
}

impl Paths {
    /// Lay everything out under a single root directory.
    ///
    /// This is the shape used on desktop hosts and in tests.
    pub fn under(root: &Path) -> Self {
        Paths {
            cache_db: root.join("cache.db"),
            staging_dir: root.join("data"),
            iso_dir: root.join("pspemu").join("ISO"),
            eboot_dir: root.join("pspemu").join("PSP").join("GAME"),
            boot_bin: root.join("loader").join("boot.bin"),
            roms_root: root.join("roms"),
            appmeta_dir: root.join("appmeta"),
        }
    }

    /// The on-device layout.
    ///
    /// Partitions on the console are addressed as `ux0:`/`ur0:` prefixes,
    /// which the OS resolves like ordinary path roots.
    pub fn vita() -> Self {
        Paths {
            cache_db: PathBuf::from("ux0:data/GSHL00001/cache.db"),
            staging_dir: PathBuf::from("ux0:data/GSHL00001/data"),
            iso_dir: PathBuf::from("ux0:pspemu/ISO"),
            eboot_dir: PathBuf::from("ux0:pspemu/PSP/GAME"),
            boot_bin: PathBuf::from("ux0:app/ADRLANCHR/data/boot.bin"),
            roms_root: PathBuf::from("ux0:roms"),
            appmeta_dir: PathBuf::from("ur0:appmeta"),
        }
    }
}

impl Default for Paths {
    /// Host layout under the user's data directory:
    /// - Linux: ~/.local/share/game-shelf
    /// - macOS: ~/Library/Application Support/game-shelf
    /// - Windows: %APPDATA%\game-shelf
    fn default() -> Self {
        let mut root = dirs::data_dir()
            .or_else(dirs::home_dir)
            .expect("Could not determine user data directory");
        root.push("game-shelf");
        Paths::under(&root)
    }
}
