/// Content discovery pipeline
///
/// Three independent sources populate the catalog:
/// - the native app database (native.rs), re-read on every start
/// - per-category ROM folders (roms.rs)
/// - ISO/CSO and EBOOT containers needing metadata extraction (containers.rs)
///
/// The two expensive sources only ever run against a missing cache file;
/// once the cache exists, a bulk load replaces them entirely.

pub mod containers;
pub mod native;
pub mod roms;

use std::sync::Arc;

use crate::category::{Registry, ROM_CATEGORIES};
use crate::error::Result;
use crate::paths::Paths;
use crate::state::cache::GameCache;
use crate::state::catalog::Catalog;
use crate::state::data::SharedProgress;

use containers::{ContainerExtractor, SfoReader};
use native::AppRegistry;

/// Run a complete population pass over every source.
///
/// The native source always runs live. For everything else the cache file
/// decides: if it exists the catalog is bulk-loaded from it, otherwise all
/// scanners run once against a fresh cache. Favorites, sort order and page
/// counts are re-derived for every category at the end.
#[allow(clippy::too_many_arguments)]
pub fn scan_all(
    registry: &Registry,
    paths: &Paths,
    catalog: &mut Catalog,
    apps: &dyn AppRegistry,
    iso_extractors: &[Arc<dyn ContainerExtractor>],
    eboot_extractor: &dyn ContainerExtractor,
    sfo: &dyn SfoReader,
    progress: &SharedProgress,
) -> Result<()> {
    native::scan_native(catalog, registry, apps, progress);

    if GameCache::exists(paths) {
        let cache = GameCache::open(paths)?;
        catalog.load_from_cache(&cache, registry, progress)?;
    } else {
        let cache = GameCache::open(paths)?;
        for &id in ROM_CATEGORIES {
            roms::scan_rom_category(catalog, &cache, registry.get(id), progress)?;
        }
        containers::scan_iso_games(
            catalog,
            &cache,
            registry,
            paths,
            iso_extractors,
            sfo,
            progress,
        )?;
        containers::scan_eboot_games(
            catalog,
            &cache,
            registry,
            paths,
            eboot_extractor,
            sfo,
            progress,
        )?;
    }

    // Favorites come from their own table, over a fresh connection.
    {
        let cache = GameCache::open(paths)?;
        catalog.load_favorites(&cache, registry)?;
    }

    for info in registry.all() {
        catalog.sort(info.id);
        catalog.state_mut(info.id).page_num = 1;
        catalog.set_max_page(info.id);
    }

    Ok(())
}
