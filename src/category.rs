/// Category registry
///
/// A fixed, compile-time enumerated set of content categories, each with its
/// own storage folder, extension filters and launch behavior. The registry
/// is built once at startup from a `Paths` and never mutated afterwards;
/// both id and label lookups are total over the registered set.
use std::collections::HashMap;
use std::path::PathBuf;

use crate::paths::Paths;
use crate::state::data::{GameKind, ViewMode};

/// Every category the launcher knows about.
///
/// Adding a platform means adding a variant here and a row in
/// `Registry::new` - the compiler enforces the rest through `ALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryId {
    Favorites = 0,
    Vita,
    Psp,
    Ps1,
    PsMini,
    PsMobile,
    Homebrew,
    Nes,
    Snes,
    Gb,
    Gbc,
    Gba,
    N64,
    GameGear,
    MasterSystem,
    MegaDrive,
    Neogeo,
}

impl CategoryId {
    /// All categories, in display order.
    pub const ALL: &'static [CategoryId] = &[
        CategoryId::Favorites,
        CategoryId::Vita,
        CategoryId::Psp,
        CategoryId::Ps1,
        CategoryId::PsMini,
        CategoryId::PsMobile,
        CategoryId::Homebrew,
        CategoryId::Nes,
        CategoryId::Snes,
        CategoryId::Gb,
        CategoryId::Gbc,
        CategoryId::Gba,
        CategoryId::N64,
        CategoryId::GameGear,
        CategoryId::MasterSystem,
        CategoryId::MegaDrive,
        CategoryId::Neogeo,
    ];

    pub const COUNT: usize = CategoryId::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Categories whose content is plain ROM files in a per-platform folder.
pub const ROM_CATEGORIES: &[CategoryId] = &[
    CategoryId::Ps1,
    CategoryId::Nes,
    CategoryId::Snes,
    CategoryId::Gb,
    CategoryId::Gbc,
    CategoryId::Gba,
    CategoryId::N64,
    CategoryId::GameGear,
    CategoryId::MasterSystem,
    CategoryId::MegaDrive,
    CategoryId::Neogeo,
];

/// Title id of the RetroArch frontend used for most emulator cores
pub const RETROARCH_TITLE_ID: &str = "RETROVITA";
/// Title id of the standalone N64 emulator
pub const DAEDALUS_TITLE_ID: &str = "DEDALOX64";

/// Static definition of one category.
#[derive(Debug, Clone)]
pub struct CategoryInfo {
    pub id: CategoryId,
    /// Short stable key; stored in cache rows and game entries
    pub label: &'static str,
    /// Display title
    pub title: &'static str,
    /// Folder scanned for this category's ROM files
    pub roms_dir: PathBuf,
    /// Folder holding pre-rendered per-ROM icons
    pub icons_dir: PathBuf,
    /// Accepted file extensions, lowercase, including the dot
    pub extensions: &'static [&'static str],
    /// Title-id prefixes used to classify native and extracted content
    pub title_id_prefixes: &'static [&'static str],
    /// Emulator core passed to the ROM launcher
    pub core: &'static str,
    /// Title id of the app that launches this category's ROMs
    pub launcher_title_id: &'static str,
    /// Content kind produced by a targeted rescan of this category
    pub rom_kind: GameKind,
    pub view_mode: ViewMode,
}

impl CategoryInfo {
    pub fn is_rom(&self) -> bool {
        ROM_CATEGORIES.contains(&self.id)
    }
}

/// The registry itself: one `CategoryInfo` per `CategoryId`.
pub struct Registry {
    infos: Vec<CategoryInfo>,
    by_label: HashMap<&'static str, usize>,
}

impl Registry {
    /// Build the full category table under the given filesystem layout.
    pub fn new(paths: &Paths) -> Self {
        let root = &paths.roms_root;

        // One row per CategoryId::ALL entry, same order.
        let mut infos = Vec::with_capacity(CategoryId::COUNT);
        let mut row = |id: CategoryId,
                       label: &'static str,
                       title: &'static str,
                       folder: &str,
                       extensions: &'static [&'static str],
                       title_id_prefixes: &'static [&'static str],
                       core: &'static str,
                       launcher_title_id: &'static str,
                       rom_kind: GameKind,
                       view_mode: ViewMode| {
            let roms_dir = if folder.is_empty() {
                PathBuf::new()
            } else {
                root.join(folder)
            };
            let icons_dir = if folder.is_empty() {
                PathBuf::new()
            } else {
                root.join(folder).join("icons")
            };
            infos.push(CategoryInfo {
                id,
                label,
                title,
                roms_dir,
                icons_dir,
                extensions,
                title_id_prefixes,
                core,
                launcher_title_id,
                rom_kind,
                view_mode,
            });
        };

        use CategoryId::*;
        use GameKind::{Bubble, Rom};
        use ViewMode::{Grid, List};

        row(Favorites, "favorites", "Favorites", "", &[], &[], "", "", Bubble, Grid);
        row(
            Vita,
            "vita",
            "Vita",
            "",
            &[],
            &["PCSA", "PCSB", "PCSC", "PCSD", "PCSE", "PCSF", "PCSG", "PCSH", "PCSI"],
            "",
            "",
            Bubble,
            Grid,
        );
        row(
            Psp,
            "psp",
            "PSP",
            "",
            &[],
            &[
                "ULES", "ULUS", "ULJS", "ULJM", "ULAS", "ULKS", "UCES", "UCUS", "UCJS",
                "UCAS", "UCKS", "NPEH", "NPUH", "NPJH", "NPHH",
            ],
            "",
            "",
            GameKind::PspIso,
            Grid,
        );
        row(
            Ps1,
            "ps1",
            "PS1",
            "PS1",
            &[".bin", ".cue", ".img", ".pbp", ".chd"],
            &["NPEF", "NPUF", "NPJF", "NPUI", "NPEE"],
            "app0:pcsx_rearmed_libretro.self",
            RETROARCH_TITLE_ID,
            Rom,
            Grid,
        );
        row(
            PsMini,
            "psmini",
            "PS Minis",
            "",
            &[],
            &["NPEZ", "NPUZ", "NPJZ", "NPHZ"],
            "",
            "",
            GameKind::PspIso,
            Grid,
        );
        row(PsMobile, "psmobile", "PS Mobile", "", &[], &["NPNA", "NPOA"], "", "", Bubble, Grid);
        row(Homebrew, "homebrew", "Homebrew", "", &[], &[], "", "", Bubble, Grid);
        row(
            Nes,
            "nes",
            "NES",
            "NES",
            &[".nes", ".fds", ".unf"],
            &[],
            "app0:fceumm_libretro.self",
            RETROARCH_TITLE_ID,
            Rom,
            List,
        );
        row(
            Snes,
            "snes",
            "SNES",
            "SNES",
            &[".smc", ".sfc", ".fig"],
            &[],
            "app0:snes9x2005_libretro.self",
            RETROARCH_TITLE_ID,
            Rom,
            List,
        );
        row(
            Gb,
            "gb",
            "Game Boy",
            "GB",
            &[".gb", ".dmg"],
            &[],
            "app0:gambatte_libretro.self",
            RETROARCH_TITLE_ID,
            Rom,
            List,
        );
        row(
            Gbc,
            "gbc",
            "Game Boy Color",
            "GBC",
            &[".gbc"],
            &[],
            "app0:gambatte_libretro.self",
            RETROARCH_TITLE_ID,
            Rom,
            List,
        );
        row(
            Gba,
            "gba",
            "Game Boy Advance",
            "GBA",
            &[".gba"],
            &[],
            "app0:vba_next_libretro.self",
            RETROARCH_TITLE_ID,
            Rom,
            List,
        );
        row(
            N64,
            "n64",
            "Nintendo 64",
            "N64",
            &[".n64", ".v64", ".z64"],
            &[],
            "",
            DAEDALUS_TITLE_ID,
            Rom,
            List,
        );
        row(
            GameGear,
            "gamegear",
            "Game Gear",
            "GameGear",
            &[".gg"],
            &[],
            "app0:genesis_plus_gx_libretro.self",
            RETROARCH_TITLE_ID,
            Rom,
            List,
        );
        row(
            MasterSystem,
            "mastersystem",
            "Master System",
            "MasterSystem",
            &[".sms"],
            &[],
            "app0:genesis_plus_gx_libretro.self",
            RETROARCH_TITLE_ID,
            Rom,
            List,
        );
        row(
            MegaDrive,
            "megadrive",
            "Mega Drive",
            "MegaDrive",
            &[".md", ".gen", ".smd"],
            &[],
            "app0:genesis_plus_gx_libretro.self",
            RETROARCH_TITLE_ID,
            Rom,
            List,
        );
        row(
            Neogeo,
            "neogeo",
            "Neo Geo",
            "NeoGeo",
            &[".zip"],
            &[],
            "app0:fbalpha2012_libretro.self",
            RETROARCH_TITLE_ID,
            Rom,
            List,
        );

        let by_label = infos
            .iter()
            .enumerate()
            .map(|(i, info)| (info.label, i))
            .collect();

        Registry { infos, by_label }
    }

    /// Definition for a category id. Total: every id has exactly one row.
    pub fn get(&self, id: CategoryId) -> &CategoryInfo {
        &self.infos[id.index()]
    }

    /// Look a category up by its stable label.
    pub fn by_label(&self, label: &str) -> Option<&CategoryInfo> {
        self.by_label.get(label).map(|&i| &self.infos[i])
    }

    pub fn is_rom_category(&self, id: CategoryId) -> bool {
        ROM_CATEGORIES.contains(&id)
    }

    /// Label lookup restricted to ROM-capable categories.
    ///
    /// An unmatched label is a caller error, reported as `None` rather than
    /// a panic.
    pub fn rom_category_by_label(&self, label: &str) -> Option<&CategoryInfo> {
        self.by_label(label).filter(|info| info.is_rom())
    }

    pub fn all(&self) -> impl Iterator<Item = &CategoryInfo> {
        self.infos.iter()
    }

    /// Classify a native title id by its prefix.
    ///
    /// Categories are checked in reverse registry order so the more specific
    /// platform buckets win; anything unmatched lands in Homebrew.
    pub fn classify_title_id(&self, title_id: &str) -> &CategoryInfo {
        for info in self.infos.iter().skip(1).rev() {
            if matches_prefixes(title_id, info.title_id_prefixes) {
                return info;
            }
        }
        self.get(CategoryId::Homebrew)
    }
}

/// True if `id` starts with any of the given prefixes.
pub fn matches_prefixes(id: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| id.starts_with(p))
}

/// Step forward through the category ring.
pub fn next_category(id: CategoryId, step: usize) -> CategoryId {
    CategoryId::ALL[(id.index() + step) % CategoryId::COUNT]
}

/// Step backward through the category ring.
pub fn previous_category(id: CategoryId, step: usize) -> CategoryId {
    let step = step % CategoryId::COUNT;
    CategoryId::ALL[(id.index() + CategoryId::COUNT - step) % CategoryId::COUNT]
}
