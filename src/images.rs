/// Pagination and the icon image window
///
/// Pages are 1-based and wrap circularly. Icon textures are only resident
/// for a sliding window of pages around the one on screen; navigating far
/// enough pushes the trailing page out of the window and frees its
/// textures. There is no explicit cancellation for background loads -
/// a load request simply no-ops once the page it was issued for is no
/// longer the one displayed.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::category::{CategoryId, Registry};
use crate::paths::Paths;
use crate::scan::containers::staging_dir_for;
use crate::state::catalog::Catalog;
use crate::state::data::{Game, GameKind, TextureHandle, GAMES_PER_PAGE};
use crate::ShelfContext;

/// Pages kept resident on either side of the displayed one
pub const NUM_CACHED_PAGES: u32 = 5;

/// Step forward `step` pages, wrapping past `max_page` back to 1.
pub fn increment_page(page: u32, step: u32, max_page: u32) -> u32 {
    let max_page = max_page.max(1);
    let mut next = page + step;
    if next > max_page {
        next %= max_page;
    }
    if next == 0 {
        max_page
    } else {
        next
    }
}

/// Step backward `step` pages, wrapping below 1 up to `max_page`.
pub fn decrement_page(page: u32, step: u32, max_page: u32) -> u32 {
    let max_page = max_page.max(1);
    let next = page as i64 - step as i64;
    if next > 0 {
        next as u32
    } else {
        (next + max_page as i64).max(1) as u32
    }
}

/// The texture capability: decode an image file into a handle, free it
/// later. Handle lifetimes follow a strict free-on-evict contract - the
/// window manager is the only caller of `free`.
pub trait Textures: Send + Sync {
    fn load_image_file(&self, path: &Path) -> Option<TextureHandle>;
    fn free(&self, handle: TextureHandle);
}

/// Default texture provider decoding icons with the image crate.
///
/// Decoded RGBA buffers are held in a map keyed by handle; a front end
/// fetches the pixels with `image()` when it uploads to the GPU.
pub struct ImageTextures {
    next: AtomicU32,
    images: Mutex<HashMap<u32, image::RgbaImage>>,
}

impl ImageTextures {
    pub fn new() -> Self {
        ImageTextures {
            // Handle 0 is reserved for the shared placeholder
            next: AtomicU32::new(1),
            images: Mutex::new(HashMap::new()),
        }
    }

    /// Pixels behind a handle, if still resident.
    pub fn image(&self, handle: TextureHandle) -> Option<image::RgbaImage> {
        self.images.lock().unwrap().get(&handle.0).cloned()
    }

    pub fn resident_count(&self) -> usize {
        self.images.lock().unwrap().len()
    }
}

impl Default for ImageTextures {
    fn default() -> Self {
        Self::new()
    }
}

impl Textures for ImageTextures {
    fn load_image_file(&self, path: &Path) -> Option<TextureHandle> {
        let img = image::open(path).ok()?.to_rgba8();
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.images.lock().unwrap().insert(id, img);
        Some(TextureHandle(id))
    }

    fn free(&self, handle: TextureHandle) {
        if handle.is_placeholder() {
            return;
        }
        self.images.lock().unwrap().remove(&handle.0);
    }
}

/// Where a game's icon lives, by content kind.
pub fn icon_path_for(game: &Game, registry: &Registry, paths: &Paths) -> PathBuf {
    let psmobile_label = registry.get(CategoryId::PsMobile).label;
    match game.kind {
        GameKind::Bubble if game.category == psmobile_label => {
            paths.appmeta_dir.join(&game.id).join("pic0.png")
        }
        GameKind::Bubble => paths.appmeta_dir.join(&game.id).join("icon0.png"),
        GameKind::PspIso | GameKind::Eboot => staging_dir_for(paths, &game.id).join("icon0.png"),
        GameKind::Rom => {
            let stem = Path::new(&game.rom_path)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            match registry.by_label(&game.category) {
                Some(info) => info.icons_dir.join(format!("{}.png", stem)),
                None => PathBuf::new(),
            }
        }
    }
}

/// Free every loaded icon in a category, resetting handles to the
/// placeholder before the underlying resource goes away.
pub fn free_category_images(catalog: &mut Catalog, id: CategoryId, textures: &dyn Textures) {
    for game in &mut catalog.state_mut(id).games {
        if !game.tex.is_placeholder() {
            let tex = std::mem::replace(&mut game.tex, TextureHandle::PLACEHOLDER);
            textures.free(tex);
        }
    }
}

/// Load icons for one page, evicting the page that just left the window.
///
/// `prev_page` tells the navigation direction; forward and backward wraps
/// both count. Loading stops as soon as the requested page is no longer the
/// one displayed for the current category - that generation check is the
/// whole cancellation mechanism.
pub fn load_page_images(
    ctx: &ShelfContext,
    textures: &dyn Textures,
    category: CategoryId,
    prev_page: u32,
    page: u32,
) {
    // Evict the page that fell out of the sliding window, if any.
    {
        let mut catalog = ctx.catalog.lock().unwrap();
        let max_page = catalog.state(category).max_page;
        if max_page > NUM_CACHED_PAGES + 5 {
            let del_page = if page > prev_page || (prev_page == max_page && page == 1) {
                decrement_page(page, NUM_CACHED_PAGES, max_page)
            } else if page < prev_page || (prev_page == 1 && page == max_page) {
                increment_page(page, NUM_CACHED_PAGES, max_page)
            } else {
                0
            };

            if del_page > 0 {
                let low = (del_page as usize - 1) * GAMES_PER_PAGE;
                let high = del_page as usize * GAMES_PER_PAGE;
                let state = catalog.state_mut(category);
                let end = high.min(state.games.len());
                for game in &mut state.games[low.min(end)..end] {
                    if !game.tex.is_placeholder() {
                        let tex = std::mem::replace(&mut game.tex, TextureHandle::PLACEHOLDER);
                        textures.free(tex);
                    }
                }
            }
        }
    }

    let low = (page as usize - 1) * GAMES_PER_PAGE;
    let high = page as usize * GAMES_PER_PAGE;

    for idx in low..high {
        // Re-check under the lock on every step: the user may have paged
        // away while the previous icon was decoding.
        let probe = {
            let catalog = ctx.catalog.lock().unwrap();
            let state = catalog.state(category);
            if state.page_num != page || ctx.current() != category {
                return;
            }
            if idx >= state.games.len() {
                return;
            }
            let game = &state.games[idx];
            if game.tex.is_placeholder() {
                Some(game.clone())
            } else {
                None
            }
        };

        let Some(probe) = probe else { continue };

        let icon = icon_path_for(&probe, &ctx.registry, &ctx.paths);
        if !icon.exists() {
            continue;
        }
        let Some(handle) = textures.load_image_file(&icon) else {
            continue;
        };

        let mut catalog = ctx.catalog.lock().unwrap();
        let state = catalog.state_mut(category);
        let still_displayed = state.page_num == page && ctx.current() == category;
        if still_displayed && idx < state.games.len() && probe.matches(&state.games[idx]) {
            state.games[idx].tex = handle;
        } else {
            // Decoded for a page nobody is looking at anymore.
            textures.free(handle);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    /// Counting fake for the texture capability.
    pub struct FakeTextures {
        next: AtomicU32,
        pub loaded: Mutex<HashSet<u32>>,
        pub freed: Mutex<Vec<u32>>,
    }

    impl FakeTextures {
        pub fn new() -> Self {
            FakeTextures {
                next: AtomicU32::new(1),
                loaded: Mutex::new(HashSet::new()),
                freed: Mutex::new(Vec::new()),
            }
        }
    }

    impl Textures for FakeTextures {
        fn load_image_file(&self, _path: &Path) -> Option<TextureHandle> {
            let id = self.next.fetch_add(1, Ordering::Relaxed);
            self.loaded.lock().unwrap().insert(id);
            Some(TextureHandle(id))
        }

        fn free(&self, handle: TextureHandle) {
            self.freed.lock().unwrap().push(handle.0);
        }
    }

    fn context(dir: &TempDir) -> ShelfContext {
        ShelfContext::new(Paths::under(dir.path()))
    }

    fn fill_category(ctx: &ShelfContext, id: CategoryId, count: usize) {
        let mut catalog = ctx.catalog.lock().unwrap();
        let state = catalog.state_mut(id);
        state.games = (0..count)
            .map(|i| Game {
                id: format!("nes{:04}", i),
                kind: GameKind::Rom,
                title: format!("Game {}", i),
                rom_path: format!("/roms/NES/game{}.nes", i),
                category: "nes".to_string(),
                favorite: false,
                tex: TextureHandle::PLACEHOLDER,
            })
            .collect();
        let pages = (state.games.len() + GAMES_PER_PAGE - 1) / GAMES_PER_PAGE;
        state.max_page = pages.max(1) as u32;
    }

    #[test]
    fn test_page_wrap_forward_and_backward() {
        assert_eq!(increment_page(5, 1, 5), 1);
        assert_eq!(decrement_page(1, 1, 5), 5);
        assert_eq!(increment_page(3, 1, 5), 4);
        assert_eq!(decrement_page(3, 1, 5), 2);
        assert_eq!(increment_page(10, 5, 12), 3);
        assert_eq!(decrement_page(2, 5, 12), 9);
        // Floor is always page 1, even for single-page categories.
        assert_eq!(increment_page(1, 1, 1), 1);
        assert_eq!(decrement_page(1, 1, 1), 1);
    }

    #[test]
    fn test_forward_navigation_evicts_exactly_the_trailing_page() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let textures = FakeTextures::new();

        // 12 pages: beyond the cache_depth + 5 threshold.
        fill_category(&ctx, CategoryId::Nes, 12 * GAMES_PER_PAGE);
        ctx.set_current(CategoryId::Nes);
        {
            let mut catalog = ctx.catalog.lock().unwrap();
            let state = catalog.state_mut(CategoryId::Nes);
            state.page_num = 6;
            for (i, game) in state.games.iter_mut().enumerate() {
                game.tex = TextureHandle(i as u32 + 1);
            }
        }

        // Moving 5 -> 6 pushes page 1 out of the window.
        load_page_images(&ctx, &textures, CategoryId::Nes, 5, 6);

        let catalog = ctx.catalog.lock().unwrap();
        let games = &catalog.state(CategoryId::Nes).games;
        for (i, game) in games.iter().enumerate() {
            if i < GAMES_PER_PAGE {
                assert!(game.tex.is_placeholder(), "page 1 entry {} kept its texture", i);
            } else {
                assert!(!game.tex.is_placeholder(), "entry {} lost its texture", i);
            }
        }
        let freed = textures.freed.lock().unwrap();
        let expected: Vec<u32> = (1..=GAMES_PER_PAGE as u32).collect();
        assert_eq!(*freed, expected);
    }

    #[test]
    fn test_backward_navigation_evicts_leading_page() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let textures = FakeTextures::new();

        fill_category(&ctx, CategoryId::Nes, 12 * GAMES_PER_PAGE);
        ctx.set_current(CategoryId::Nes);
        {
            let mut catalog = ctx.catalog.lock().unwrap();
            let state = catalog.state_mut(CategoryId::Nes);
            state.page_num = 5;
            for (i, game) in state.games.iter_mut().enumerate() {
                game.tex = TextureHandle(i as u32 + 1);
            }
        }

        // Moving 6 -> 5 pushes increment_page(5, 5, 12) = page 10 out.
        load_page_images(&ctx, &textures, CategoryId::Nes, 6, 5);

        let catalog = ctx.catalog.lock().unwrap();
        let games = &catalog.state(CategoryId::Nes).games;
        let low = 9 * GAMES_PER_PAGE;
        let high = 10 * GAMES_PER_PAGE;
        for (i, game) in games.iter().enumerate() {
            if i >= low && i < high {
                assert!(game.tex.is_placeholder());
            } else {
                assert!(!game.tex.is_placeholder());
            }
        }
    }

    #[test]
    fn test_forward_wrap_is_recognized_as_forward() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let textures = FakeTextures::new();

        fill_category(&ctx, CategoryId::Nes, 12 * GAMES_PER_PAGE);
        ctx.set_current(CategoryId::Nes);
        {
            let mut catalog = ctx.catalog.lock().unwrap();
            let state = catalog.state_mut(CategoryId::Nes);
            state.page_num = 1;
            for (i, game) in state.games.iter_mut().enumerate() {
                game.tex = TextureHandle(i as u32 + 1);
            }
        }

        // Wrapping 12 -> 1 still counts as forward: decrement_page(1, 5, 12)
        // = page 8 leaves the window.
        load_page_images(&ctx, &textures, CategoryId::Nes, 12, 1);

        let catalog = ctx.catalog.lock().unwrap();
        let games = &catalog.state(CategoryId::Nes).games;
        let low = 7 * GAMES_PER_PAGE;
        let high = 8 * GAMES_PER_PAGE;
        for (i, game) in games.iter().enumerate() {
            if i >= low && i < high {
                assert!(game.tex.is_placeholder());
            } else {
                assert!(!game.tex.is_placeholder());
            }
        }
    }

    #[test]
    fn test_stale_load_requests_self_cancel() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let textures = FakeTextures::new();

        fill_category(&ctx, CategoryId::Nes, 3 * GAMES_PER_PAGE);
        ctx.set_current(CategoryId::Nes);
        {
            let mut catalog = ctx.catalog.lock().unwrap();
            catalog.state_mut(CategoryId::Nes).page_num = 2;
        }

        // Request was for page 1, but the user has moved to page 2.
        load_page_images(&ctx, &textures, CategoryId::Nes, 1, 1);

        assert!(textures.loaded.lock().unwrap().is_empty());
        let catalog = ctx.catalog.lock().unwrap();
        assert!(catalog
            .state(CategoryId::Nes)
            .games
            .iter()
            .all(|g| g.tex.is_placeholder()));
    }

    #[test]
    fn test_displayed_page_loads_icons_that_exist() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let textures = FakeTextures::new();

        fill_category(&ctx, CategoryId::Nes, 2);
        ctx.set_current(CategoryId::Nes);

        // Only game0 has an icon on disk.
        let icons_dir = ctx.registry.get(CategoryId::Nes).icons_dir.clone();
        fs::create_dir_all(&icons_dir).unwrap();
        fs::write(icons_dir.join("game0.png"), b"png").unwrap();

        load_page_images(&ctx, &textures, CategoryId::Nes, 1, 1);

        let catalog = ctx.catalog.lock().unwrap();
        let games = &catalog.state(CategoryId::Nes).games;
        assert!(!games[0].tex.is_placeholder());
        assert!(games[1].tex.is_placeholder());
        assert_eq!(textures.loaded.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_free_category_images_resets_to_placeholder() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let textures = FakeTextures::new();

        fill_category(&ctx, CategoryId::Nes, 4);
        {
            let mut catalog = ctx.catalog.lock().unwrap();
            for game in &mut catalog.state_mut(CategoryId::Nes).games {
                game.tex = TextureHandle(9);
            }
        }

        let mut catalog = ctx.catalog.lock().unwrap();
        free_category_images(&mut catalog, CategoryId::Nes, &textures);
        assert!(catalog
            .state(CategoryId::Nes)
            .games
            .iter()
            .all(|g| g.tex.is_placeholder()));
        assert_eq!(textures.freed.lock().unwrap().len(), 4);
    }
}
