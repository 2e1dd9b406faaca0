/// ROM folder source
///
/// Each ROM-capable category owns one flat folder. Candidate files are
/// filtered by the category's extension set, capped on composed path
/// length, and inserted into both the catalog and the cache.
use std::path::Path;

use rusqlite::Result as SqlResult;
use walkdir::WalkDir;

use crate::category::CategoryInfo;
use crate::state::cache::GameCache;
use crate::state::catalog::Catalog;
use crate::state::data::{Game, GameKind, SharedProgress, TextureHandle};

/// Longest composed ROM path the loader side accepts
pub const MAX_ROM_PATH_LEN: usize = 192;
/// Display titles are cut at this many characters
pub const MAX_TITLE_LEN: usize = 126;

/// Flat, non-recursive file listing of a folder.
///
/// A missing folder is simply an empty category, not an error.
pub fn list_files(dir: &Path) -> Vec<String> {
    WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect()
}

/// The filename's extension including the dot, lowercased.
pub fn extension_of(name: &str) -> Option<String> {
    name.rfind('.').map(|idx| name[idx..].to_lowercase())
}

/// Full-string extension match against a category's accepted set.
pub fn is_rom_extension(ext: &str, filters: &[&str]) -> bool {
    filters.contains(&ext)
}

/// Scan one category's ROM folder into the catalog and cache.
pub fn scan_rom_category(
    catalog: &mut Catalog,
    cache: &GameCache,
    info: &CategoryInfo,
    progress: &SharedProgress,
) -> SqlResult<()> {
    let files = list_files(&info.roms_dir);
    progress.begin(
        files.len(),
        format!(
            "Scanning for {} games in the {} folder",
            info.title,
            info.roms_dir.display()
        ),
    );

    let mut scanned = 0usize;
    for name in files {
        let rom_path = info.roms_dir.join(&name).to_string_lossy().to_string();
        let accepted = extension_of(&name)
            .map(|ext| is_rom_extension(&ext, info.extensions))
            .unwrap_or(false)
            && rom_path.len() < MAX_ROM_PATH_LEN;

        if !accepted {
            progress.drop_expected();
            continue;
        }

        let stem = match name.rfind('.') {
            Some(idx) => &name[..idx],
            None => name.as_str(),
        };
        let title: String = stem.chars().take(MAX_TITLE_LEN).collect();

        let game = Game {
            id: format!("{}{:04}", info.label, scanned),
            kind: GameKind::Rom,
            title,
            rom_path,
            category: info.label.to_string(),
            favorite: false,
            tex: TextureHandle::PLACEHOLDER,
        };

        catalog.insert(info.id, game.clone(), cache)?;
        progress.advance(&game);
        scanned += 1;

        if scanned % 100 == 0 {
            println!("⏳ Scanned {} {} roms...", scanned, info.title);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{CategoryId, Registry};
    use crate::paths::Paths;
    use std::fs;
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (Registry, Paths) {
        let paths = Paths::under(dir.path());
        (Registry::new(&paths), paths)
    }

    #[test]
    fn test_extension_filter_is_case_insensitive_full_match() {
        assert!(is_rom_extension(
            &extension_of("Mario.NES").unwrap(),
            &[".nes", ".fds"]
        ));
        assert!(!is_rom_extension(
            &extension_of("Mario.nes.bak").unwrap(),
            &[".nes"]
        ));
        assert_eq!(extension_of("no-extension"), None);
    }

    #[test]
    fn test_rom_scan_filters_inserts_and_reports() {
        let dir = TempDir::new().unwrap();
        let (registry, paths) = setup(&dir);
        let info = registry.get(CategoryId::Nes).clone();

        fs::create_dir_all(&info.roms_dir).unwrap();
        fs::write(info.roms_dir.join("Alpha.nes"), b"x").unwrap();
        fs::write(info.roms_dir.join("Beta.FDS"), b"x").unwrap();
        fs::write(info.roms_dir.join("notes.txt"), b"x").unwrap();

        let cache = GameCache::open(&paths).unwrap();
        let mut catalog = Catalog::new(&registry);
        let progress = SharedProgress::new();

        scan_rom_category(&mut catalog, &cache, &info, &progress).unwrap();

        let games = &catalog.state(CategoryId::Nes).games;
        assert_eq!(games.len(), 2);
        assert!(games.iter().all(|g| g.kind == GameKind::Rom));
        assert!(games.iter().all(|g| g.category == "nes"));
        assert_eq!(cache.cached_count().unwrap(), 2);

        let snap = progress.snapshot();
        assert_eq!(snap.games_scanned, 2);
        assert_eq!(snap.games_to_scan, 2);
    }

    #[test]
    fn test_overlong_composed_paths_are_skipped() {
        let dir = TempDir::new().unwrap();
        let (registry, paths) = setup(&dir);
        let info = registry.get(CategoryId::Nes).clone();

        fs::create_dir_all(&info.roms_dir).unwrap();
        let long_name = format!("{}.nes", "x".repeat(MAX_ROM_PATH_LEN));
        fs::write(info.roms_dir.join(&long_name), b"x").unwrap();
        fs::write(info.roms_dir.join("ok.nes"), b"x").unwrap();

        let cache = GameCache::open(&paths).unwrap();
        let mut catalog = Catalog::new(&registry);
        let progress = SharedProgress::new();

        scan_rom_category(&mut catalog, &cache, &info, &progress).unwrap();

        assert_eq!(catalog.state(CategoryId::Nes).games.len(), 1);
        assert_eq!(progress.snapshot().games_to_scan, 1);
    }

    #[test]
    fn test_titles_are_truncated_to_max_chars() {
        let dir = TempDir::new().unwrap();
        let (registry, paths) = setup(&dir);
        let info = registry.get(CategoryId::Nes).clone();

        fs::create_dir_all(&info.roms_dir).unwrap();
        // Long title but short enough composed path
        let name = format!("{}.nes", "t".repeat(MAX_TITLE_LEN + 20));
        let _ = fs::write(info.roms_dir.join(&name), b"x");

        let cache = GameCache::open(&paths).unwrap();
        let mut catalog = Catalog::new(&registry);
        let progress = SharedProgress::new();
        scan_rom_category(&mut catalog, &cache, &info, &progress).unwrap();

        let games = &catalog.state(CategoryId::Nes).games;
        if let Some(game) = games.first() {
            assert_eq!(game.title.chars().count(), MAX_TITLE_LEN);
        }
    }
}
