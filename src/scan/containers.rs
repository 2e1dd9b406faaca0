/// Container source: ISO/CSO disc images and EBOOT packages
///
/// Containers need their metadata pulled out before they can be cataloged:
/// each candidate gets a synthetic id and a staging folder, the extractor
/// collaborator drops a param.sfo and icon0.png there, and the SFO fields
/// decide which category the game lands in. Extraction internals live
/// behind the `ContainerExtractor` trait - this module only orchestrates.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Result as SqlResult;

use crate::category::{matches_prefixes, CategoryId, CategoryInfo, Registry};
use crate::paths::Paths;
use crate::scan::roms::{extension_of, is_rom_extension, list_files};
use crate::state::cache::GameCache;
use crate::state::catalog::Catalog;
use crate::state::data::{Game, GameKind, SharedProgress, TextureHandle};

/// Accepted disc image extensions
pub const PSP_ISO_EXTENSIONS: &[&str] = &[".iso", ".cso"];
/// Accepted package extensions
pub const EBOOT_EXTENSIONS: &[&str] = &[".pbp"];

/// Synthetic id prefixes; the 4-digit sequence is per scan run
pub const ISO_ID_PREFIX: &str = "SHLP";
pub const EBOOT_ID_PREFIX: &str = "SHLE";

/// One container format's extraction routine (ISO, CSO or EBOOT).
///
/// `extract` may fail on a malformed archive; the scanner catches that per
/// entry and moves on.
pub trait ContainerExtractor: Send + Sync {
    /// Cheap signature check - does this file belong to this format?
    fn is_container(&self, path: &Path) -> bool;
    /// Pull param.sfo and icon0.png out of the container.
    fn extract(&self, path: &Path, sfo_out: &Path, icon_out: &Path) -> Result<(), String>;
}

/// Reader for the structured param.sfo metadata blob.
pub trait SfoReader: Send + Sync {
    /// Value of a string field, or None when the field is absent.
    fn get_string(&self, raw: &[u8], field: &str) -> Option<String>;
}

/// Where an extracted game's staged metadata lives.
pub fn staging_dir_for(paths: &Paths, id: &str) -> PathBuf {
    paths.staging_dir.join(id)
}

/// Decide the destination category from extracted SFO fields.
///
/// Rules, in order: the "ME" tag is legacy PS1 content no matter what the
/// disc id says; "UG" or a known handheld disc-id prefix is a full PSP
/// title; everything else is a mini.
fn classify<'r>(
    registry: &'r Registry,
    tag: Option<&str>,
    disc_id: Option<&str>,
) -> &'r CategoryInfo {
    let psp = registry.get(CategoryId::Psp);
    match tag {
        Some("ME") => registry.get(CategoryId::Ps1),
        Some("UG") => psp,
        _ if disc_id.is_some_and(|id| matches_prefixes(id, psp.title_id_prefixes)) => psp,
        _ => registry.get(CategoryId::PsMini),
    }
}

/// Build the Game for one container, running extraction and classification.
///
/// Errors out only when the extractor itself fails; a container that
/// extracts but yields no readable metadata falls back to a filename title
/// in the PSP category.
fn populate_container_game(
    registry: &Registry,
    paths: &Paths,
    sfo: &dyn SfoReader,
    name: &str,
    rom_path: PathBuf,
    id: String,
    kind: GameKind,
    extract: impl FnOnce(&Path, &Path, &Path) -> Result<(), String>,
) -> Result<Game, String> {
    let stage = staging_dir_for(paths, &id);
    fs::create_dir_all(&stage).map_err(|e| format!("staging dir: {}", e))?;
    let sfo_path = stage.join("param.sfo");
    let icon_path = stage.join("icon0.png");

    extract(&rom_path, &sfo_path, &icon_path)?;

    let stem = match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    };

    let (title, category) = match fs::read(&sfo_path) {
        Ok(raw) => {
            let title = sfo
                .get_string(&raw, "TITLE")
                .map(|t| t.replace('\n', " "))
                .unwrap_or_else(|| stem.to_string());
            let tag = sfo.get_string(&raw, "CATEGORY");
            let disc_id = sfo.get_string(&raw, "DISC_ID");
            let info = classify(registry, tag.as_deref(), disc_id.as_deref());
            (title, info)
        }
        // No readable metadata at all: filename title, PSP bucket.
        Err(_) => (stem.to_string(), registry.get(CategoryId::Psp)),
    };

    Ok(Game {
        id,
        kind,
        title,
        rom_path: rom_path.to_string_lossy().to_string(),
        category: category.label.to_string(),
        favorite: false,
        tex: TextureHandle::PLACEHOLDER,
    })
}

/// Scan the ISO folder for disc images.
pub fn scan_iso_games(
    catalog: &mut Catalog,
    cache: &GameCache,
    registry: &Registry,
    paths: &Paths,
    extractors: &[Arc<dyn ContainerExtractor>],
    sfo: &dyn SfoReader,
    progress: &SharedProgress,
) -> SqlResult<()> {
    let files = list_files(&paths.iso_dir);
    progress.begin(
        files.len(),
        format!(
            "Scanning for ISO games in the {} folder",
            paths.iso_dir.display()
        ),
    );

    let mut scanned = 0usize;
    for name in files {
        let accepted = extension_of(&name)
            .map(|ext| is_rom_extension(&ext, PSP_ISO_EXTENSIONS))
            .unwrap_or(false);
        if !accepted {
            progress.drop_expected();
            continue;
        }

        let rom_path = paths.iso_dir.join(&name);
        let id = format!("{}{:04}", ISO_ID_PREFIX, scanned);
        let result = populate_container_game(
            registry,
            paths,
            sfo,
            &name,
            rom_path,
            id,
            GameKind::PspIso,
            |path, sfo_out, icon_out| {
                // First extractor that recognizes the format wins; a file no
                // extractor claims still goes through the metadata fallback.
                for ex in extractors {
                    if ex.is_container(path) {
                        return ex.extract(path, sfo_out, icon_out);
                    }
                }
                Ok(())
            },
        );

        match result {
            Ok(game) => {
                if let Some(info) = registry.by_label(&game.category) {
                    catalog.insert(info.id, game.clone(), cache)?;
                    progress.advance(&game);
                    scanned += 1;
                }
            }
            Err(e) => {
                eprintln!("⚠️  Skipping {}: {}", name, e);
                progress.drop_expected();
            }
        }
    }

    Ok(())
}

/// Scan the EBOOT folder for packages.
pub fn scan_eboot_games(
    catalog: &mut Catalog,
    cache: &GameCache,
    registry: &Registry,
    paths: &Paths,
    extractor: &dyn ContainerExtractor,
    sfo: &dyn SfoReader,
    progress: &SharedProgress,
) -> SqlResult<()> {
    let files = list_files(&paths.eboot_dir);
    progress.begin(
        files.len(),
        format!(
            "Scanning for EBOOT games in the {} folder",
            paths.eboot_dir.display()
        ),
    );

    let mut scanned = 0usize;
    for name in files {
        let accepted = extension_of(&name)
            .map(|ext| is_rom_extension(&ext, EBOOT_EXTENSIONS))
            .unwrap_or(false);
        if !accepted {
            progress.drop_expected();
            continue;
        }

        let rom_path = paths.eboot_dir.join(&name);
        let id = format!("{}{:04}", EBOOT_ID_PREFIX, scanned);
        let result = populate_container_game(
            registry,
            paths,
            sfo,
            &name,
            rom_path,
            id,
            GameKind::Eboot,
            |path, sfo_out, icon_out| extractor.extract(path, sfo_out, icon_out),
        );

        match result {
            Ok(game) => {
                if let Some(info) = registry.by_label(&game.category) {
                    catalog.insert(info.id, game.clone(), cache)?;
                    progress.advance(&game);
                    scanned += 1;
                }
            }
            Err(e) => {
                eprintln!("⚠️  Skipping {}: {}", name, e);
                progress.drop_expected();
            }
        }
    }

    Ok(())
}
