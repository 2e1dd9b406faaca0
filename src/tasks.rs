/// Background task orchestrator
///
/// Rescans and image-window loads run off the interactive path as blocking
/// tasks on the runtime's worker pool. At most one scan task and one
/// image-load task exist at a time; the single-slot handles make that
/// structural instead of relying on UI-mode conventions. Tasks report
/// through `ShelfContext` - the front end polls, nothing is pushed.
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::category::{CategoryId, ROM_CATEGORIES};
use crate::error::{Result, ShelfError};
use crate::images;
use crate::scan;
use crate::state::cache::GameCache;
use crate::state::data::{GameKind, GuiMode, ViewMode};
use crate::{Collaborators, ShelfContext};

/// Holds at most one running task and refuses to start another while it
/// is still going.
pub struct TaskSlot {
    handle: Option<JoinHandle<()>>,
}

impl TaskSlot {
    pub fn new() -> Self {
        TaskSlot { handle: None }
    }

    /// True while the held task is still running. A finished task frees the
    /// slot as a side effect.
    pub fn is_busy(&mut self) -> bool {
        if let Some(handle) = &self.handle {
            if handle.is_finished() {
                self.handle = None;
            }
        }
        self.handle.is_some()
    }

    /// Spawn a blocking task into the slot, or refuse if one is in flight.
    pub fn try_spawn_blocking(&mut self, f: impl FnOnce() + Send + 'static) -> Result<()> {
        if self.is_busy() {
            return Err(ShelfError::TaskBusy);
        }
        self.handle = Some(tokio::task::spawn_blocking(f));
        Ok(())
    }

    /// Wait for the held task to finish, freeing the slot.
    pub async fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Default for TaskSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the two background task shapes against a shared context.
pub struct Orchestrator {
    ctx: Arc<ShelfContext>,
    collab: Arc<Collaborators>,
    scan_slot: TaskSlot,
    image_slot: TaskSlot,
}

impl Orchestrator {
    pub fn new(ctx: Arc<ShelfContext>, collab: Arc<Collaborators>) -> Self {
        Orchestrator {
            ctx,
            collab,
            scan_slot: TaskSlot::new(),
            image_slot: TaskSlot::new(),
        }
    }

    pub fn context(&self) -> &Arc<ShelfContext> {
        &self.ctx
    }

    /// Kick off the startup population pass: cache load if a cache exists,
    /// full scan otherwise.
    pub fn start_full_scan(&mut self) -> Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let collab = Arc::clone(&self.collab);
        self.scan_slot
            .try_spawn_blocking(move || full_rescan(&ctx, &collab))
    }

    /// User-driven refresh: either rebuild everything from scratch, or
    /// rescan just the category currently on screen.
    pub fn refresh_games(&mut self, all_categories: bool) -> Result<()> {
        if self.scan_slot.is_busy() {
            return Err(ShelfError::TaskBusy);
        }
        self.ctx.progress.begin(1, "");

        if all_categories {
            GameCache::purge(&self.ctx.paths);
            self.start_full_scan()
        } else {
            let category = self.ctx.current();
            let info = self.ctx.registry.get(category);
            let kind = info.rom_kind;
            self.ctx.progress.set_message(format!(
                "Scanning for {} games in the {} folder",
                info.title,
                info.roms_dir.display()
            ));

            let ctx = Arc::clone(&self.ctx);
            let collab = Arc::clone(&self.collab);
            self.scan_slot
                .try_spawn_blocking(move || category_rescan(&ctx, &collab, category, kind))
        }
    }

    /// Queue an icon load for a page the user just navigated to.
    pub fn start_load_images(
        &mut self,
        category: CategoryId,
        prev_page: u32,
        page: u32,
    ) -> Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let collab = Arc::clone(&self.collab);
        self.image_slot.try_spawn_blocking(move || {
            // Debounce: rapid paging issues a burst of requests, and the
            // generation check inside will no-op all but the last one.
            std::thread::sleep(Duration::from_millis(300));
            images::load_page_images(&ctx, collab.textures.as_ref(), category, prev_page, page);
        })
    }

    pub async fn wait_for_scan(&mut self) {
        self.scan_slot.wait().await;
    }

    pub async fn wait_for_images(&mut self) {
        self.image_slot.wait().await;
    }
}

/// Full rescan task body: clear, repopulate, re-derive, land in launcher
/// mode on the first page of the active category.
fn full_rescan(ctx: &ShelfContext, collab: &Collaborators) {
    ctx.set_mode(GuiMode::Scanning);

    let result = {
        let mut catalog = ctx.catalog.lock().unwrap();
        catalog.clear_all();
        scan::scan_all(
            &ctx.registry,
            &ctx.paths,
            &mut catalog,
            collab.apps.as_ref(),
            &collab.iso_extractors,
            collab.eboot_extractor.as_ref(),
            collab.sfo.as_ref(),
            &ctx.progress,
        )
    };
    if let Err(e) = result {
        eprintln!("⚠️  Scan failed: {}", e);
    }

    {
        let mut catalog = ctx.catalog.lock().unwrap();
        if !catalog.state(CategoryId::Favorites).games.is_empty() {
            ctx.set_current(CategoryId::Favorites);
        }
        let current = ctx.current();
        catalog.state_mut(current).page_num = 1;
    }

    ctx.set_mode(GuiMode::Launcher);
    images::load_page_images(ctx, collab.textures.as_ref(), ctx.current(), 1, 1);
}

/// Targeted rescan task body: touch only the entries of one kind, then
/// re-derive sort and paging for the categories that kind can land in.
fn category_rescan(
    ctx: &ShelfContext,
    collab: &Collaborators,
    category: CategoryId,
    kind: GameKind,
) {
    ctx.set_mode(GuiMode::Scanning);

    let result = (|| -> Result<()> {
        let cache = GameCache::open(&ctx.paths)?;
        let mut catalog = ctx.catalog.lock().unwrap();
        let registry = &ctx.registry;
        let rom_like = kind == GameKind::Rom || category == CategoryId::Ps1;

        if rom_like {
            catalog.remove_by_category_and_kind(registry.get(category), kind, &cache)?;
        }
        if kind.is_extracted() {
            // Extracted content classifies across categories, so the purge
            // has to sweep all of them.
            for info in registry.all() {
                if info.id != CategoryId::Favorites {
                    catalog.remove_by_category_and_kind(info, kind, &cache)?;
                }
            }
        }

        if rom_like && ROM_CATEGORIES.contains(&category) {
            scan::roms::scan_rom_category(
                &mut catalog,
                &cache,
                registry.get(category),
                &ctx.progress,
            )?;
        }
        if kind == GameKind::PspIso {
            scan::containers::scan_iso_games(
                &mut catalog,
                &cache,
                registry,
                &ctx.paths,
                &collab.iso_extractors,
                collab.sfo.as_ref(),
                &ctx.progress,
            )?;
        }
        if kind == GameKind::Eboot {
            scan::containers::scan_eboot_games(
                &mut catalog,
                &cache,
                registry,
                &ctx.paths,
                collab.eboot_extractor.as_ref(),
                collab.sfo.as_ref(),
                &ctx.progress,
            )?;
        }

        if rom_like {
            catalog.state_mut(category).page_num = 1;
            catalog.set_max_page(category);
            catalog.sort(category);
            ctx.set_current(category);
        }
        if kind.is_extracted() {
            for id in [CategoryId::Psp, CategoryId::Ps1, CategoryId::PsMini] {
                catalog.state_mut(id).page_num = 1;
                catalog.set_max_page(id);
                catalog.sort(id);
            }
        }
        Ok(())
    })();
    if let Err(e) = result {
        eprintln!("⚠️  Category rescan failed: {}", e);
    }

    let current = ctx.current();
    let grid = {
        let catalog = ctx.catalog.lock().unwrap();
        catalog.state(current).view_mode == ViewMode::Grid
    };

    ctx.set_mode(GuiMode::Launcher);
    if grid {
        images::load_page_images(ctx, collab.textures.as_ref(), current, 1, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::tests::FakeTextures;
    use crate::launch::tests::FakeOs;
    use crate::paths::Paths;
    use crate::scan::containers::tests::{FakeExtractor, FakeSfo};
    use crate::scan::native::tests::FakeApps;
    use std::fs;
    use tempfile::TempDir;

    fn collaborators() -> Collaborators {
        Collaborators {
            apps: Arc::new(FakeApps(vec![(
                "PCSE00001".to_string(),
                "Native Game".to_string(),
            )])),
            iso_extractors: vec![Arc::new(FakeExtractor::with_fields(&[
                ("TITLE", "Disc Game"),
                ("CATEGORY", "UG"),
                ("DISC_ID", "ULUS00001"),
            ]))],
            eboot_extractor: Arc::new(FakeExtractor::with_fields(&[
                ("TITLE", "Pkg Game"),
                ("CATEGORY", "UG"),
            ])),
            sfo: Arc::new(FakeSfo),
            textures: Arc::new(FakeTextures::new()),
            os: Arc::new(FakeOs::new()),
        }
    }

    fn seed_content(paths: &Paths) {
        fs::create_dir_all(&paths.iso_dir).unwrap();
        fs::write(paths.iso_dir.join("disc.iso"), b"x").unwrap();
        let nes_dir = paths.roms_root.join("NES");
        fs::create_dir_all(&nes_dir).unwrap();
        fs::write(nes_dir.join("mario.nes"), b"x").unwrap();
    }

    #[tokio::test]
    async fn test_task_slot_refuses_second_task() {
        let mut slot = TaskSlot::new();
        slot.try_spawn_blocking(|| std::thread::sleep(Duration::from_millis(150)))
            .unwrap();
        let second = slot.try_spawn_blocking(|| {});
        assert!(matches!(second, Err(ShelfError::TaskBusy)));

        slot.wait().await;
        assert!(!slot.is_busy());
        slot.try_spawn_blocking(|| {}).unwrap();
        slot.wait().await;
    }

    #[tokio::test]
    async fn test_full_scan_populates_and_lands_in_launcher_mode() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::under(dir.path());
        seed_content(&paths);

        let ctx = Arc::new(ShelfContext::new(paths.clone()));
        let mut orchestrator = Orchestrator::new(Arc::clone(&ctx), Arc::new(collaborators()));

        orchestrator.start_full_scan().unwrap();
        orchestrator.wait_for_scan().await;

        assert_eq!(ctx.mode(), GuiMode::Launcher);
        assert!(GameCache::exists(&paths));

        let catalog = ctx.catalog.lock().unwrap();
        assert_eq!(catalog.state(CategoryId::Vita).games.len(), 1);
        assert_eq!(catalog.state(CategoryId::Psp).games.len(), 1);
        assert_eq!(catalog.state(CategoryId::Nes).games.len(), 1);
        assert_eq!(catalog.state(CategoryId::Nes).max_page, 1);
        assert_eq!(catalog.state(CategoryId::Nes).page_num, 1);
    }

    #[tokio::test]
    async fn test_second_start_uses_cache_instead_of_scanners() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::under(dir.path());
        seed_content(&paths);

        let ctx = Arc::new(ShelfContext::new(paths.clone()));
        let mut orchestrator = Orchestrator::new(Arc::clone(&ctx), Arc::new(collaborators()));
        orchestrator.start_full_scan().unwrap();
        orchestrator.wait_for_scan().await;

        // Remove the source files; the cache alone must repopulate.
        fs::remove_file(paths.iso_dir.join("disc.iso")).unwrap();
        fs::remove_file(paths.roms_root.join("NES").join("mario.nes")).unwrap();

        let ctx2 = Arc::new(ShelfContext::new(paths.clone()));
        let mut orchestrator2 = Orchestrator::new(Arc::clone(&ctx2), Arc::new(collaborators()));
        orchestrator2.start_full_scan().unwrap();
        orchestrator2.wait_for_scan().await;

        let catalog = ctx2.catalog.lock().unwrap();
        assert_eq!(catalog.state(CategoryId::Psp).games.len(), 1);
        assert_eq!(catalog.state(CategoryId::Nes).games.len(), 1);
    }

    #[tokio::test]
    async fn test_full_refresh_purges_cache_and_rescans() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::under(dir.path());
        seed_content(&paths);

        let ctx = Arc::new(ShelfContext::new(paths.clone()));
        let mut orchestrator = Orchestrator::new(Arc::clone(&ctx), Arc::new(collaborators()));
        orchestrator.start_full_scan().unwrap();
        orchestrator.wait_for_scan().await;

        // New content appears after the first scan built the cache.
        fs::write(paths.roms_root.join("NES").join("zelda.nes"), b"x").unwrap();

        orchestrator.refresh_games(true).unwrap();
        orchestrator.wait_for_scan().await;

        let catalog = ctx.catalog.lock().unwrap();
        assert_eq!(catalog.state(CategoryId::Nes).games.len(), 2);
        assert_eq!(ctx.mode(), GuiMode::Launcher);
    }

    #[tokio::test]
    async fn test_targeted_refresh_touches_only_current_category() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::under(dir.path());
        seed_content(&paths);

        let ctx = Arc::new(ShelfContext::new(paths.clone()));
        let mut orchestrator = Orchestrator::new(Arc::clone(&ctx), Arc::new(collaborators()));
        orchestrator.start_full_scan().unwrap();
        orchestrator.wait_for_scan().await;

        fs::write(paths.roms_root.join("NES").join("zelda.nes"), b"x").unwrap();

        ctx.set_current(CategoryId::Nes);
        orchestrator.refresh_games(false).unwrap();
        orchestrator.wait_for_scan().await;

        let catalog = ctx.catalog.lock().unwrap();
        // NES picked up the new file without duplicate accumulation...
        assert_eq!(catalog.state(CategoryId::Nes).games.len(), 2);
        // ...and the PSP catalog (cache-backed) was left alone.
        assert_eq!(catalog.state(CategoryId::Psp).games.len(), 1);
        assert_eq!(ctx.current(), CategoryId::Nes);
    }

    #[tokio::test]
    async fn test_image_load_task_respects_displayed_page() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::under(dir.path());
        seed_content(&paths);

        let textures = Arc::new(FakeTextures::new());
        let mut collab = collaborators();
        collab.textures = Arc::clone(&textures) as Arc<dyn crate::images::Textures>;

        let ctx = Arc::new(ShelfContext::new(paths.clone()));
        let mut orchestrator = Orchestrator::new(Arc::clone(&ctx), Arc::new(collab));
        orchestrator.start_full_scan().unwrap();
        orchestrator.wait_for_scan().await;

        // Request icons for a page that is not displayed: nothing loads.
        ctx.set_current(CategoryId::Nes);
        orchestrator.start_load_images(CategoryId::Nes, 1, 2).unwrap();
        orchestrator.wait_for_images().await;
        assert!(textures.loaded.lock().unwrap().is_empty());
    }
}
